//! Reconstructing the object table of a file with a broken cross-reference table.

use crate::object::dict::keys::{CATALOG, ENCRYPT, ID, INFO, PAGES, ROOT, XREF};
use crate::object::{Dict, ObjRef, Object};
use crate::parse::{read_indirect_object, read_object};
use crate::reader::Reader;
use crate::trivia::is_regular_character;
use log::warn;
use std::collections::BTreeMap;

/// The objects and trailer recovered by scanning a file.
#[derive(Debug, Default)]
pub(crate) struct Scanned {
    pub(crate) objects: BTreeMap<ObjRef, Object>,
    pub(crate) trailer: Dict,
}

/// Scan the whole file for `N G obj` headers and `trailer` dictionaries.
///
/// If an object number is defined more than once, the last definition wins. Returns `None`
/// if no usable root could be found.
pub(crate) fn scan(data: &[u8]) -> Option<Scanned> {
    warn!("cross-reference table is broken, scanning the file for objects");

    let mut by_number: BTreeMap<u32, (ObjRef, Object)> = BTreeMap::new();
    let mut candidates = vec![];
    let mut last_catalog = None;
    let mut r = Reader::new(data);

    while !r.at_end() {
        let pos = r.offset();
        let at_boundary = pos == 0 || !is_regular_character(data[pos - 1]);

        if at_boundary && r.peek_byte().is_some_and(|b| b.is_ascii_digit()) {
            let mut attempt = r.clone();
            let resolve_length = |id: ObjRef| {
                by_number
                    .get(&id.num)
                    .and_then(|(_, o)| o.as_i64())
                    .and_then(|l| usize::try_from(l).ok())
            };

            if let Some((id, object)) = read_indirect_object(&mut attempt, &resolve_length) {
                if let Some(dict) = object.as_dict() {
                    if dict.has_type(XREF) {
                        candidates.push(dict.clone());
                    }

                    if dict.has_type(CATALOG) {
                        last_catalog = Some(id);
                    }
                }

                by_number.insert(id.num, (id, object));
                r = attempt;

                continue;
            }
        }

        if at_boundary && r.peek_tag(b"trailer").is_some() {
            r.forward_tag(b"trailer");

            if let Some(Object::Dict(trailer)) = read_object(&mut r, true) {
                candidates.push(trailer);
            }

            continue;
        }

        r.forward();
    }

    let objects: BTreeMap<_, _> = by_number.into_values().collect();
    let has_pages = |root: &Object| {
        let root = match root {
            Object::Ref(id) => objects.get(id),
            other => Some(other),
        };

        root.and_then(Object::as_dict)
            .is_some_and(|d| d.contains_key(PAGES))
    };

    let chosen = candidates
        .iter()
        .rposition(|t| t.get(ROOT).is_some_and(has_pages));

    let mut trailer = match chosen {
        Some(idx) => candidates[idx].clone(),
        None => {
            let catalog = last_catalog?;
            warn!("no usable trailer found, using {catalog} as the document catalog");

            let mut trailer = Dict::new();
            trailer.insert(ROOT, catalog);
            trailer
        }
    };

    // Fill entries that are missing in the chosen trailer from the other candidates.
    for candidate in candidates.iter().rev() {
        for key in [INFO, ID, ENCRYPT] {
            if !trailer.contains_key(key)
                && let Some(value) = candidate.get(key)
            {
                trailer.insert(key, value.clone());
            }
        }
    }

    Some(Scanned { objects, trailer })
}
