//! Removing unreachable objects and renumbering the rest.

use crate::context::Context;
use crate::dedup;
use crate::options::GarbageLevel;
use log::debug;
use rayon::prelude::*;
use rinse_syntax::Document;
use rinse_syntax::object::{ObjRef, Object};
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::BTreeMap;

/// What a garbage collection pass did.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub(crate) struct GcStats {
    pub(crate) removed: usize,
    pub(crate) merged: usize,
}

/// Run garbage collection at the configured level. Duplicates are only merged if `merge` is
/// set.
pub(crate) fn collect(ctx: &mut Context, merge: bool) -> GcStats {
    let level = ctx.settings.garbage;
    let mut stats = GcStats::default();

    if level == GarbageLevel::None {
        return stats;
    }

    let extra_roots = ctx.preserved_metadata().into_iter().collect::<Vec<_>>();
    stats.removed = sweep(&mut ctx.doc, &extra_roots);

    if merge && level >= GarbageLevel::Merge {
        stats.merged = dedup::deduplicate(&mut ctx.doc, level == GarbageLevel::StreamCheck);
    }

    if level >= GarbageLevel::Compact {
        renumber(&mut ctx.doc);
    }

    debug!(
        "garbage collection removed {} objects and merged {}",
        stats.removed, stats.merged
    );

    stats
}

/// Compute the set of objects reachable from the trailer and the given extra roots.
pub(crate) fn mark(doc: &Document, extra_roots: &[ObjRef]) -> FxHashSet<ObjRef> {
    let mut live = FxHashSet::default();
    let mut stack = extra_roots.to_vec();

    for (_, value) in doc.trailer.iter() {
        value.for_each_ref(&mut |r| stack.push(r));
    }

    while let Some(id) = stack.pop() {
        let Some(object) = doc.get(id) else {
            continue;
        };

        if !live.insert(id) {
            continue;
        }

        object.for_each_ref(&mut |r| {
            if !live.contains(&r) {
                stack.push(r);
            }
        });
    }

    live
}

/// Remove all unreachable objects, returning how many were removed.
pub(crate) fn sweep(doc: &mut Document, extra_roots: &[ObjRef]) -> usize {
    let live = mark(doc, extra_roots);
    let before = doc.objects.len();

    doc.objects.retain(|id, _| live.contains(id));

    before - doc.objects.len()
}

/// Number all objects densely from 1 with generation 0, keeping their order. References to
/// missing objects become null.
pub(crate) fn renumber(doc: &mut Document) {
    let map = doc
        .objects
        .keys()
        .zip(1..)
        .map(|(old, new)| (*old, ObjRef::new(new, 0)))
        .collect::<FxHashMap<_, _>>();

    let lookup = |r: ObjRef| map.get(&r).copied();

    let mut objects = std::mem::take(&mut doc.objects)
        .into_iter()
        .collect::<Vec<_>>();

    objects
        .par_iter_mut()
        .for_each(|(_, object)| object.remap_refs(&lookup));

    doc.objects = objects
        .into_iter()
        .filter_map(|(id, object)| Some((lookup(id)?, object)))
        .collect::<BTreeMap<_, _>>();

    remap_trailer(doc, &lookup);
}

/// Rewrite the references in the trailer. The trailer is a direct dictionary, so it is not
/// covered by rewriting the objects.
pub(crate) fn remap_trailer(doc: &mut Document, f: &impl Fn(ObjRef) -> Option<ObjRef>) {
    let mut trailer = Object::Dict(std::mem::take(&mut doc.trailer));
    trailer.remap_refs(f);

    if let Object::Dict(trailer) = trailer {
        doc.trailer = trailer;
    }
}

#[cfg(test)]
mod tests {
    use super::{collect, mark, renumber};
    use crate::context::Context;
    use crate::options::CleanOptions;
    use rinse_syntax::Document;
    use rinse_syntax::object::{Dict, ObjRef, Object};

    fn r(num: u32) -> Object {
        Object::Ref(ObjRef::new(num, 0))
    }

    fn dict(entries: &[(&str, Object)]) -> Dict {
        entries
            .iter()
            .map(|(k, v)| ((*k).into(), v.clone()))
            .collect()
    }

    // 1 -> 3 -> 5 -> 3 is reachable, 2 and 4 are not. 5 also references the missing 9.
    fn document() -> Document {
        let mut doc = Document::default();
        doc.trailer.insert("Root", r(1));
        doc.insert(ObjRef::new(1, 0), dict(&[("A", r(3))]));
        doc.insert(ObjRef::new(2, 0), dict(&[("A", r(1))]));
        doc.insert(ObjRef::new(3, 0), dict(&[("B", r(5))]));
        doc.insert(ObjRef::new(4, 0), 17);
        doc.insert(
            ObjRef::new(5, 0),
            dict(&[("C", Object::Array(vec![r(3), r(9)]))]),
        );
        doc
    }

    fn context(garbage: u8) -> Context {
        let settings = CleanOptions {
            garbage,
            ..CleanOptions::default()
        }
        .validate()
        .unwrap();

        Context::new(document(), settings)
    }

    #[test]
    fn marking_handles_cycles() {
        let live = mark(&document(), &[]);

        assert_eq!(live.len(), 3);
        assert!(!live.contains(&ObjRef::new(2, 0)));
        assert!(!live.contains(&ObjRef::new(9, 0)));
    }

    #[test]
    fn level_zero_keeps_everything() {
        let mut ctx = context(0);
        assert_eq!(collect(&mut ctx, true).removed, 0);
        assert_eq!(ctx.doc.objects.len(), 5);
    }

    #[test]
    fn sweep_keeps_numbers() {
        let mut ctx = context(1);
        assert_eq!(collect(&mut ctx, true).removed, 2);

        let nums = ctx.doc.objects.keys().map(|id| id.num).collect::<Vec<_>>();
        assert_eq!(nums, [1, 3, 5]);
    }

    #[test]
    fn compact_renumbers() {
        let mut ctx = context(2);
        collect(&mut ctx, true);

        let doc = &ctx.doc;
        let ids = doc.objects.keys().copied().collect::<Vec<_>>();
        assert_eq!(ids, [ObjRef::new(1, 0), ObjRef::new(2, 0), ObjRef::new(3, 0)]);

        assert_eq!(doc.trailer.get_ref(b"Root"), Some(ObjRef::new(1, 0)));
        assert_eq!(
            doc.get(ObjRef::new(1, 0)).unwrap().as_dict().unwrap().get_ref(b"A"),
            Some(ObjRef::new(2, 0))
        );
        // The dangling reference to 9 became null.
        let c = doc.get(ObjRef::new(3, 0)).unwrap().as_dict().unwrap().get_array(b"C");
        assert_eq!(c, Some(&[r(2), Object::Null][..]));
    }

    #[test]
    fn renumber_resets_generations() {
        let mut doc = Document::default();
        doc.trailer.insert("Root", Object::Ref(ObjRef::new(4, 2)));
        doc.insert(ObjRef::new(4, 2), dict(&[("Self", Object::Ref(ObjRef::new(4, 2)))]));

        renumber(&mut doc);

        let expected = ObjRef::new(1, 0);
        assert_eq!(doc.trailer.get_ref(b"Root"), Some(expected));
        assert_eq!(
            doc.get(expected).unwrap().as_dict().unwrap().get_ref(b"Self"),
            Some(expected)
        );
    }
}
