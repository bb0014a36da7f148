//! Writing cross-reference tables and streams.

use crate::write_indirect;
use rinse_syntax::object::dict::keys::{SIZE, TYPE, W, XREF};
use rinse_syntax::object::{Dict, Name, ObjRef, Object, Stream};
use rinse_syntax::write::{Serializer, WriteDirect};
use std::collections::BTreeMap;

/// The location of a written object.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum XRefEntry {
    Offset { offset: usize, generation: u16 },
    Compressed { container: u32, index: u32 },
}

// A row of the cross-reference information, in the field layout of a cross-reference stream.
type Row = (u8, u64, u64);

// Lay out all rows from object 0 up to the highest used number. Unused numbers are linked into
// the free list, headed by object 0.
fn rows(entries: &BTreeMap<u32, XRefEntry>) -> Vec<Row> {
    let size = entries.last_key_value().map(|(num, _)| *num + 1).unwrap_or(1);
    let free = (1..size)
        .filter(|num| !entries.contains_key(num))
        .collect::<Vec<_>>();

    let next_free = |num: u32| -> u64 {
        let pos = free.partition_point(|f| *f <= num);
        free.get(pos).copied().map(u64::from).unwrap_or(0)
    };

    (0..size)
        .map(|num| match entries.get(&num) {
            Some(XRefEntry::Offset { offset, generation }) => {
                (1, *offset as u64, u64::from(*generation))
            }
            Some(XRefEntry::Compressed { container, index }) => {
                (2, u64::from(*container), u64::from(*index))
            }
            None if num == 0 => (0, next_free(0), 65535),
            None => (0, next_free(num), 0),
        })
        .collect()
}

/// Write a classic cross-reference table followed by the trailer.
pub(crate) fn write_table(
    s: &mut Serializer,
    entries: &BTreeMap<u32, XRefEntry>,
    mut trailer: Dict,
) {
    let rows = rows(entries);
    let start = s.len();

    s.raw(format!("xref\n0 {}\n", rows.len()).as_bytes());

    for (kind, field, generation) in &rows {
        let marker = if *kind == 1 { 'n' } else { 'f' };
        s.raw(format!("{field:010} {generation:05} {marker}\r\n").as_bytes());
    }

    trailer.insert(SIZE, rows.len() as i64);

    s.raw(b"trailer\n");
    trailer.write_direct(s);
    s.raw(format!("\nstartxref\n{start}\n%%EOF\n").as_bytes());
}

/// Write a cross-reference stream with the given reference, which lists itself.
pub(crate) fn write_stream(
    s: &mut Serializer,
    entries: &mut BTreeMap<u32, XRefEntry>,
    id: ObjRef,
    mut dict: Dict,
    compress: bool,
) {
    let start = s.len();
    entries.insert(
        id.num,
        XRefEntry::Offset {
            offset: start,
            generation: 0,
        },
    );

    let rows = rows(entries);
    let w2 = rows.iter().map(|r| byte_width(r.1)).max().unwrap_or(1);
    let w3 = rows.iter().map(|r| byte_width(r.2)).max().unwrap_or(1);

    let mut data = Vec::with_capacity(rows.len() * (1 + w2 + w3));

    for (kind, second, third) in rows.iter().copied() {
        data.push(kind);
        data.extend_from_slice(&second.to_be_bytes()[8 - w2..]);
        data.extend_from_slice(&third.to_be_bytes()[8 - w3..]);
    }

    dict.insert(TYPE, Name::new(XREF));
    dict.insert(SIZE, rows.len() as i64);
    dict.insert(
        W,
        vec![
            Object::from(1),
            Object::from(w2 as i64),
            Object::from(w3 as i64),
        ],
    );

    let mut stream = Stream::new(dict, data);

    if compress {
        stream.compress();
    }

    write_indirect(s, id, &Object::Stream(stream));
    s.raw(format!("startxref\n{start}\n%%EOF\n").as_bytes());
}

// The minimal number of bytes needed to store the value, at least one.
fn byte_width(value: u64) -> usize {
    let bits = 64 - value.leading_zeros() as usize;

    bits.div_ceil(8).max(1)
}

#[cfg(test)]
mod tests {
    use super::{XRefEntry, byte_width, rows};
    use std::collections::BTreeMap;

    #[test]
    fn widths() {
        assert_eq!(byte_width(0), 1);
        assert_eq!(byte_width(255), 1);
        assert_eq!(byte_width(256), 2);
        assert_eq!(byte_width(65535), 2);
        assert_eq!(byte_width(1 << 40), 6);
    }

    #[test]
    fn free_list() {
        let offset = |offset| XRefEntry::Offset {
            offset,
            generation: 0,
        };

        let entries = BTreeMap::from([
            (1, offset(10)),
            (3, offset(20)),
            (
                4,
                XRefEntry::Compressed {
                    container: 6,
                    index: 0,
                },
            ),
            (6, offset(30)),
        ]);

        assert_eq!(
            rows(&entries),
            vec![
                (0, 2, 65535),
                (1, 10, 0),
                (0, 5, 0),
                (1, 20, 0),
                (2, 6, 0),
                (0, 0, 0),
                (1, 30, 0),
            ]
        );
    }
}
