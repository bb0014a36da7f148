//! Merging structurally identical objects.

use crate::gc::remap_trailer;
use log::debug;
use rayon::prelude::*;
use rinse_syntax::Document;
use rinse_syntax::object::dict::keys::{DECODE_PARMS, DL, ENCRYPT, FILTER, LENGTH, PAGE};
use rinse_syntax::object::{Dict, ObjRef, Object, Stream};
use rustc_hash::FxHashMap;
use siphasher::sip128::{Hasher128, SipHasher13};
use std::hash::Hash;

// The form in which two candidates are compared.
#[derive(Debug, PartialEq, Eq, Hash)]
enum Canonical<'a> {
    Object(&'a Object),
    // A stream compared by its decoded payload, with the encoding-related entries removed
    // from its dictionary.
    Decoded(Dict, Vec<u8>),
    // A stream that can't be decoded, compared as it is.
    Raw(&'a Stream),
}

fn canonical(object: &Object, compare_streams: bool) -> Option<Canonical<'_>> {
    match object {
        Object::Stream(stream) if compare_streams => match stream.decoded() {
            Ok(data) => {
                let mut dict = stream.dict.clone();
                for key in [LENGTH, FILTER, DECODE_PARMS, DL] {
                    dict.remove(key);
                }

                Some(Canonical::Decoded(dict, data))
            }
            Err(_) => Some(Canonical::Raw(stream)),
        },
        Object::Stream(_) => None,
        // Identical pages are still distinct pages.
        Object::Dict(dict) if dict.has_type(PAGE) => None,
        other => Some(Canonical::Object(other)),
    }
}

pub(crate) fn hash128(value: &impl Hash) -> u128 {
    let mut hasher = SipHasher13::new();
    value.hash(&mut hasher);

    hasher.finish128().as_u128()
}

/// Merge identical objects until no more duplicates are found, returning the number of
/// removed duplicates.
///
/// Streams are only compared if `compare_streams` is set.
pub(crate) fn deduplicate(doc: &mut Document, compare_streams: bool) -> usize {
    let mut merged = 0;
    let mut rounds = 0;

    loop {
        let duplicates = find_duplicates(doc, compare_streams);

        if duplicates.is_empty() {
            break;
        }

        rounds += 1;
        merged += duplicates.len();

        for duplicate in duplicates.keys() {
            doc.objects.remove(duplicate);
        }

        let lookup = |r: ObjRef| Some(duplicates.get(&r).copied().unwrap_or(r));

        doc.objects
            .par_iter_mut()
            .for_each(|(_, object)| object.remap_refs(&lookup));
        remap_trailer(doc, &lookup);
    }

    debug!("merged {merged} duplicate objects in {rounds} rounds");

    merged
}

// Map every duplicate to the object with the lowest reference that is equal to it.
fn find_duplicates(doc: &Document, compare_streams: bool) -> FxHashMap<ObjRef, ObjRef> {
    let encrypt = doc.trailer.get_ref(ENCRYPT);

    let candidates = doc
        .objects
        .par_iter()
        .filter(|(id, _)| Some(**id) != encrypt)
        .filter_map(|(id, object)| Some((*id, canonical(object, compare_streams)?)))
        .map(|(id, canonical)| (hash128(&canonical), id, canonical))
        .collect::<Vec<_>>();

    let mut groups: FxHashMap<u128, Vec<usize>> = FxHashMap::default();
    for (i, (hash, _, _)) in candidates.iter().enumerate() {
        groups.entry(*hash).or_default().push(i);
    }

    let mut duplicates = FxHashMap::default();

    for mut group in groups.into_values().filter(|g| g.len() > 1) {
        group.sort_by_key(|i| candidates[*i].1);

        // Equal hashes don't guarantee equal objects, so a group can have several
        // representatives.
        let mut representatives: Vec<usize> = vec![];

        for i in group {
            let (_, id, canonical) = &candidates[i];

            match representatives
                .iter()
                .find(|r| candidates[**r].2 == *canonical)
            {
                Some(r) => {
                    duplicates.insert(*id, candidates[*r].1);
                }
                None => representatives.push(i),
            }
        }
    }

    duplicates
}

#[cfg(test)]
mod tests {
    use super::{deduplicate, hash128};
    use rinse_syntax::Document;
    use rinse_syntax::object::{Dict, Name, ObjRef, Object, Stream};

    fn r(num: u32) -> Object {
        Object::Ref(ObjRef::new(num, 0))
    }

    fn dict(entries: &[(&str, Object)]) -> Dict {
        entries
            .iter()
            .map(|(k, v)| ((*k).into(), v.clone()))
            .collect()
    }

    fn get(doc: &Document, num: u32) -> &Dict {
        doc.get(ObjRef::new(num, 0)).unwrap().as_dict().unwrap()
    }

    #[test]
    fn numbers_hash_by_value() {
        assert_eq!(hash128(&Object::from(1)), hash128(&Object::from(1.0)));
        assert_ne!(hash128(&Object::from(1)), hash128(&Object::from(1.5)));
        assert_ne!(
            hash128(&Object::Array(vec![1.into(), 2.into()])),
            hash128(&Object::Array(vec![2.into(), 1.into()]))
        );
    }

    #[test]
    fn merge_to_lowest_number() {
        let mut doc = Document::default();
        doc.trailer.insert("Root", r(1));
        doc.insert(ObjRef::new(1, 0), dict(&[("A", r(3)), ("B", r(2)), ("C", r(4))]));
        doc.insert(ObjRef::new(2, 0), dict(&[("X", 1.into())]));
        doc.insert(ObjRef::new(3, 0), dict(&[("X", 1.0.into())]));
        doc.insert(ObjRef::new(4, 0), dict(&[("X", 2.into())]));

        assert_eq!(deduplicate(&mut doc, false), 1);
        assert!(doc.get(ObjRef::new(3, 0)).is_none());
        assert_eq!(get(&doc, 1).get_ref(b"A"), Some(ObjRef::new(2, 0)));
        assert_eq!(get(&doc, 1).get_ref(b"C"), Some(ObjRef::new(4, 0)));
    }

    #[test]
    fn merging_children_makes_parents_equal() {
        let mut doc = Document::default();
        doc.trailer.insert("Root", r(1));
        doc.insert(ObjRef::new(1, 0), Object::Array(vec![r(4), r(5)]));
        doc.insert(ObjRef::new(2, 0), dict(&[("Font", Name::new(b"Helvetica").into())]));
        doc.insert(ObjRef::new(3, 0), dict(&[("Font", Name::new(b"Helvetica").into())]));
        doc.insert(ObjRef::new(4, 0), dict(&[("F1", r(2))]));
        doc.insert(ObjRef::new(5, 0), dict(&[("F1", r(3))]));

        assert_eq!(deduplicate(&mut doc, false), 2);
        assert_eq!(
            doc.get(ObjRef::new(1, 0)),
            Some(&Object::Array(vec![r(4), r(4)]))
        );
    }

    #[test]
    fn pages_are_never_merged() {
        let page = dict(&[("Type", Name::new(b"Page").into())]);
        let mut doc = Document::default();
        doc.insert(ObjRef::new(1, 0), page.clone());
        doc.insert(ObjRef::new(2, 0), page);

        assert_eq!(deduplicate(&mut doc, true), 0);
    }

    #[test]
    fn streams_need_stream_check() {
        let plain = Stream::new(Dict::new(), b"BT ET".to_vec());
        let mut compressed = plain.clone();
        compressed.compress();

        let mut doc = Document::default();
        doc.insert(ObjRef::new(1, 0), compressed.clone());
        doc.insert(ObjRef::new(2, 0), plain.clone());
        doc.insert(ObjRef::new(3, 0), plain);

        assert_eq!(deduplicate(&mut doc.clone(), false), 0);

        assert_eq!(deduplicate(&mut doc, true), 2);
        // The representative keeps its encoding.
        assert_eq!(doc.get(ObjRef::new(1, 0)), Some(&Object::Stream(compressed)));
    }

    #[test]
    fn undecodable_streams_compare_raw() {
        let mut broken = Dict::new();
        broken.insert("Filter", Name::new(b"FlateDecode"));
        let broken = Stream::new(broken, b"not zlib".to_vec());

        let mut doc = Document::default();
        doc.insert(ObjRef::new(1, 0), broken.clone());
        doc.insert(ObjRef::new(2, 0), broken);
        doc.insert(ObjRef::new(3, 0), Stream::new(Dict::new(), b"not zlib".to_vec()));

        assert_eq!(deduplicate(&mut doc, true), 1);
        assert!(doc.get(ObjRef::new(3, 0)).is_some());
    }
}
