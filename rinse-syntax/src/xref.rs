//! Reading cross-reference tables and streams.

use crate::object::dict::keys::{ENCRYPT, ID, INDEX, INFO, PREV, ROOT, SIZE, W, XREF_STM};
use crate::object::{Dict, Object};
use crate::parse::{read_indirect_object, read_object};
use crate::reader::Reader;
use log::warn;
use memchr::memmem;
use rustc_hash::FxHashSet;
use std::collections::BTreeMap;

/// An entry of the cross-reference table.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum Entry {
    /// The object number is not in use.
    Free,
    /// An object stored at a byte offset in the file.
    Offset { offset: usize, generation: u16 },
    /// An object stored inside an object stream.
    Compressed { container: u32, index: u32 },
}

/// The merged cross-reference information of a file.
#[derive(Debug, Default)]
pub(crate) struct XRef {
    pub(crate) entries: BTreeMap<u32, Entry>,
    pub(crate) trailer: Dict,
}

impl XRef {
    fn insert_if_absent(&mut self, entries: impl IntoIterator<Item = (u32, Entry)>) {
        for (num, entry) in entries {
            self.entries.entry(num).or_insert(entry);
        }
    }
}

struct Section {
    entries: Vec<(u32, Entry)>,
    trailer: Dict,
}

/// Find the offset stored after the last `startxref` keyword.
pub(crate) fn find_startxref(data: &[u8]) -> Option<usize> {
    let pos = memmem::rfind(data, b"startxref")?;
    let mut r = Reader::new_at(data, pos + b"startxref".len());
    r.skip_white_spaces_and_comments();

    usize::try_from(r.read_unsigned()?).ok()
}

/// Read the chain of cross-reference sections starting at the given offset.
///
/// Newer sections take precedence over older ones reachable through `Prev`. Returns `None`
/// if any section in the chain is broken.
pub(crate) fn read_xref(data: &[u8], start: usize) -> Option<XRef> {
    let mut xref = XRef::default();
    let mut visited = FxHashSet::default();
    let mut next = Some(start);
    let mut newest = true;

    while let Some(pos) = next.take() {
        if !visited.insert(pos) {
            warn!("cross-reference chain loops back to offset {pos}");
            break;
        }

        let Some(section) = read_section(data, pos) else {
            warn!("failed to read cross-reference section at offset {pos}");
            return None;
        };

        let (free, used): (Vec<_>, Vec<_>) = section
            .entries
            .into_iter()
            .partition(|(_, entry)| *entry == Entry::Free);

        xref.insert_if_absent(used);

        // In hybrid files, objects stored in object streams are listed as free in the table and
        // only appear in the stream referenced by `XRefStm`.
        if let Some(stm) = section.trailer.get_i64(XREF_STM)
            && let Ok(stm) = usize::try_from(stm)
            && visited.insert(stm)
        {
            match read_section(data, stm) {
                Some(hybrid) => xref.insert_if_absent(hybrid.entries),
                None => warn!("failed to read XRefStm at offset {stm}"),
            }
        }

        xref.insert_if_absent(free);

        next = section
            .trailer
            .get_i64(PREV)
            .and_then(|p| usize::try_from(p).ok());

        if newest {
            xref.trailer = section.trailer;
            newest = false;
        } else {
            for key in [ROOT, INFO, ID, ENCRYPT] {
                if !xref.trailer.contains_key(key)
                    && let Some(value) = section.trailer.get(key)
                {
                    xref.trailer.insert(key, value.clone());
                }
            }
        }
    }

    Some(xref)
}

fn read_section(data: &[u8], pos: usize) -> Option<Section> {
    let mut r = Reader::new_at(data, pos);
    r.skip_white_spaces_and_comments();

    if r.peek_tag(b"xref").is_some() {
        read_table(&mut r)
    } else {
        read_stream(&mut r)
    }
}

fn read_table(r: &mut Reader<'_>) -> Option<Section> {
    r.forward_tag(b"xref")?;
    let mut entries = vec![];

    loop {
        r.skip_white_spaces_and_comments();

        if r.peek_tag(b"trailer").is_some() {
            break;
        }

        let mut start = u32::try_from(r.read_unsigned()?).ok()?;
        r.skip_white_spaces();
        let count = u32::try_from(r.read_unsigned()?).ok()?;

        // Entries are tokenized instead of being read as fixed 20-byte records, so that
        // tables with 19- or 21-byte entries are accepted too.
        for i in 0..count {
            r.skip_white_spaces();
            let offset = usize::try_from(r.read_unsigned()?).ok()?;
            r.skip_white_spaces();
            let generation = r.read_unsigned()?;
            r.skip_white_spaces();

            let entry = match r.read_byte()? {
                b'n' if offset > 0 => Entry::Offset {
                    offset,
                    generation: u16::try_from(generation).unwrap_or(u16::MAX),
                },
                b'n' | b'f' => Entry::Free,
                _ => return None,
            };

            // A common producer bug: a single subsection that starts at 1 but whose first
            // entry is the head of the free list.
            if i == 0
                && start == 1
                && entries.is_empty()
                && entry == Entry::Free
                && generation == 65535
            {
                warn!("cross-reference subsection starts at 1 instead of 0");
                start = 0;
            }

            entries.push((start.checked_add(i)?, entry));
        }
    }

    r.forward_tag(b"trailer")?;

    match read_object(r, true)? {
        Object::Dict(trailer) => Some(Section { entries, trailer }),
        _ => None,
    }
}

fn read_stream(r: &mut Reader<'_>) -> Option<Section> {
    let (_, object) = read_indirect_object(r, &|_| None)?;
    let Object::Stream(stream) = object else {
        return None;
    };

    let widths = stream
        .dict
        .get_array(W)?
        .iter()
        .map(|w| w.as_i64().and_then(|w| usize::try_from(w).ok()))
        .collect::<Option<Vec<_>>>()?;

    let [w1, w2, w3] = widths[..] else {
        warn!("cross-reference stream has an invalid W entry");
        return None;
    };

    if w1.max(w2).max(w3) > 8 {
        warn!("cross-reference stream field is wider than 8 bytes");
        return None;
    }

    let subsections = match stream.dict.get_array(INDEX) {
        Some(index) => index
            .chunks_exact(2)
            .map(|pair| {
                let start = u32::try_from(pair[0].as_i64()?).ok()?;
                let count = u32::try_from(pair[1].as_i64()?).ok()?;
                Some((start, count))
            })
            .collect::<Option<Vec<_>>>()?,
        None => vec![(0, u32::try_from(stream.dict.get_i64(SIZE)?).ok()?)],
    };

    let data = match stream.decoded() {
        Ok(data) => data,
        Err(e) => {
            warn!("failed to decode cross-reference stream: {e}");
            return None;
        }
    };

    let mut entries = vec![];
    let mut fields = Reader::new(&data);

    for (start, count) in subsections {
        for i in 0..count {
            let kind = match w1 {
                0 => 1,
                _ => read_field(&mut fields, w1)?,
            };
            let second = read_field(&mut fields, w2)?;
            let third = read_field(&mut fields, w3)?;
            let num = start.checked_add(i)?;

            let entry = match kind {
                0 => Entry::Free,
                1 => Entry::Offset {
                    offset: usize::try_from(second).ok()?,
                    generation: u16::try_from(third).unwrap_or(u16::MAX),
                },
                2 => Entry::Compressed {
                    container: u32::try_from(second).ok()?,
                    index: u32::try_from(third).ok()?,
                },
                // Unknown entry types are to be treated as references to the null object.
                _ => Entry::Free,
            };

            entries.push((num, entry));
        }
    }

    Some(Section {
        entries,
        trailer: stream.dict,
    })
}

fn read_field(r: &mut Reader<'_>, width: usize) -> Option<u64> {
    let bytes = r.read_bytes(width)?;

    Some(bytes.iter().fold(0, |acc, b| (acc << 8) | u64::from(*b)))
}
