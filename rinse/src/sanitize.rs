//! Repairing content streams.
//!
//! In clean mode, the nesting of `q`/`Q`, `BT`/`ET` and marked-content operators is balanced:
//! closing operators that don't match the innermost open one are dropped, as are opening
//! operators that are never closed. In strict mode, operators with the wrong number of operands
//! and text operators outside of text objects are dropped as well.

use crate::context::Context;
use crate::error::Diagnostic;
use crate::options::{SanitizeMode, Settings};
use crate::streams::{Role, finish_stream};
use log::debug;
use rayon::prelude::*;
use rinse_syntax::content::{Content, Operation, parse_content, write_content};
use rinse_syntax::filter::FilterError;
use rinse_syntax::object::dict::keys::{
    ANNOTS, AP, CHAR_PROCS, CONTENTS, D, FONT, FORM, N, R, RESOURCES, SUBTYPE, TYPE3, X_OBJECT,
};
use rinse_syntax::object::{Dict, ObjRef, Object, Stream};
use rinse_syntax::{Document, PageEntry};
use rustc_hash::{FxHashMap, FxHashSet};

/// Repair all content streams of the document.
pub(crate) fn sanitize(ctx: &mut Context) {
    let strict = match ctx.settings.sanitize {
        SanitizeMode::Off => return,
        SanitizeMode::Clean => false,
        SanitizeMode::Strict => true,
    };

    let pages = ctx.doc.page_tree();
    let mut merged = FxHashMap::default();

    for entry in &pages {
        if let Err((object, err)) = merge_contents(&mut ctx.doc, entry.page, &mut merged) {
            ctx.diagnostics.push(Diagnostic::UnsupportedFilter {
                object,
                filter: err.filter_name().to_string(),
            });
        }
    }

    let mut collector = Collector {
        doc: &ctx.doc,
        targets: FxHashSet::default(),
        visited_fonts: FxHashSet::default(),
    };

    for entry in &pages {
        collector.page(entry);
    }

    let targets = collector.targets;
    let settings = &ctx.settings;

    let results = ctx
        .doc
        .objects
        .par_iter_mut()
        .filter(|(id, _)| targets.contains(id))
        .filter_map(|(id, object)| {
            let stream = object.as_stream_mut()?;
            Some((*id, sanitize_stream(stream, strict, settings)))
        })
        .collect::<Vec<_>>();

    debug!("sanitized {} content streams", results.len());

    for (object, result) in results {
        match result {
            Ok(0) => {}
            Ok(dropped) => ctx
                .diagnostics
                .push(Diagnostic::ContentRepaired { object, dropped }),
            Err(err) => ctx.diagnostics.push(Diagnostic::UnsupportedFilter {
                object,
                filter: err.filter_name().to_string(),
            }),
        }
    }
}

// Replace a `Contents` array by a new stream holding the concatenated parts. The parts
// themselves are left untouched since other pages may draw them too. Pages with the same
// array share one merged stream.
fn merge_contents(
    doc: &mut Document,
    page: ObjRef,
    merged: &mut FxHashMap<Vec<ObjRef>, ObjRef>,
) -> Result<(), (ObjRef, FilterError)> {
    let Some(contents) = doc.get(page).and_then(Object::as_dict).and_then(|p| p.get(CONTENTS))
    else {
        return Ok(());
    };

    let parts = match doc.resolve(contents) {
        Object::Array(parts) => parts
            .iter()
            .filter_map(Object::as_obj_ref)
            .filter(|id| matches!(doc.get(*id), Some(Object::Stream(_))))
            .collect::<Vec<_>>(),
        _ => return Ok(()),
    };

    let Some(first) = parts.first().copied() else {
        return Ok(());
    };

    let id = match merged.get(&parts) {
        Some(id) => *id,
        None => {
            let mut data = vec![];
            let mut dict = Dict::new();

            for part in &parts {
                if let Some(stream) = doc.get(*part).and_then(Object::as_stream) {
                    if *part == first {
                        dict = stream.dict.clone();
                    }

                    data.extend(stream.decoded().map_err(|err| (*part, err))?);
                    // Operators must not run into each other across part boundaries.
                    data.push(b'\n');
                }
            }

            let mut stream = Stream::new(dict, vec![]);
            stream.set_unfiltered(data);
            stream.update_length();

            let id = doc.add_object(stream);
            merged.insert(parts, id);
            id
        }
    };

    if let Some(page) = doc.get_mut(page).and_then(Object::as_dict_mut) {
        page.insert(CONTENTS, id);
    }

    Ok(())
}

// Finds all streams that contain content: page contents, form XObjects, Type 3 glyphs and
// annotation appearances.
struct Collector<'a> {
    doc: &'a Document,
    targets: FxHashSet<ObjRef>,
    visited_fonts: FxHashSet<ObjRef>,
}

impl<'a> Collector<'a> {
    fn page(&mut self, entry: &'a PageEntry) {
        let doc = self.doc;

        let Some(page) = doc.get(entry.page).and_then(Object::as_dict) else {
            return;
        };

        if let Some(Object::Ref(id)) = page.get(CONTENTS) {
            self.content(*id);
        }

        if let Some(resources) = page
            .get(RESOURCES)
            .or_else(|| entry.inherited.get(RESOURCES))
        {
            self.resources(resources);
        }

        let annots = page
            .get(ANNOTS)
            .and_then(|a| doc.resolve(a).as_array())
            .unwrap_or_default();

        for annot in annots {
            let Some(ap) = doc
                .resolve_dict(annot)
                .and_then(|a| a.get(AP))
                .and_then(|ap| doc.resolve_dict(ap))
            else {
                continue;
            };

            for key in [N, R, D] {
                let Some(Object::Ref(id)) = ap.get(key) else {
                    continue;
                };

                match doc.get(*id) {
                    Some(Object::Stream(_)) => self.form(*id),
                    // Appearance states.
                    Some(Object::Dict(states)) => {
                        for state in states.iter().filter_map(|(_, s)| s.as_obj_ref()) {
                            self.form(state);
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    fn content(&mut self, id: ObjRef) -> bool {
        matches!(self.doc.get(id), Some(Object::Stream(_))) && self.targets.insert(id)
    }

    fn form(&mut self, id: ObjRef) {
        let doc = self.doc;

        if self.content(id)
            && let Some(resources) = doc
                .get(id)
                .and_then(Object::as_dict)
                .and_then(|d| d.get(RESOURCES))
        {
            self.resources(resources);
        }
    }

    fn resources(&mut self, resources: &'a Object) {
        let doc = self.doc;

        let Some(resources) = doc.resolve_dict(resources) else {
            return;
        };

        if let Some(x_objects) = resources.get(X_OBJECT).and_then(|x| doc.resolve_dict(x)) {
            for (_, x_object) in x_objects.iter() {
                let Some(id) = x_object.as_obj_ref() else {
                    continue;
                };

                let is_form = doc
                    .get(id)
                    .and_then(Object::as_stream)
                    .and_then(|s| s.dict.get_name(SUBTYPE))
                    .is_some_and(|s| &**s == FORM);

                if is_form {
                    self.form(id);
                }
            }
        }

        if let Some(fonts) = resources.get(FONT).and_then(|f| doc.resolve_dict(f)) {
            for (_, font_object) in fonts.iter() {
                if let Object::Ref(id) = font_object
                    && !self.visited_fonts.insert(*id)
                {
                    continue;
                }

                let Some(font) = doc.resolve_dict(font_object) else {
                    continue;
                };

                if font.get_name(SUBTYPE).is_none_or(|s| &**s != TYPE3) {
                    continue;
                }

                if let Some(procs) = font.get(CHAR_PROCS).and_then(|c| doc.resolve_dict(c)) {
                    for id in procs.iter().filter_map(|(_, p)| p.as_obj_ref()) {
                        self.content(id);
                    }
                }

                if let Some(resources) = font.get(RESOURCES) {
                    self.resources(resources);
                }
            }
        }
    }
}

fn sanitize_stream(
    stream: &mut Stream,
    strict: bool,
    settings: &Settings,
) -> Result<usize, FilterError> {
    let data = stream.decoded()?;
    let (operations, dropped) = repair(parse_content(&data), strict);

    stream.set_unfiltered(write_content(&operations));
    finish_stream(stream, Role::Other, settings)?;

    Ok(dropped)
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Nesting {
    State,
    Text,
    MarkedContent,
}

/// Drop unbalanced and, in strict mode, malformed operators, returning the remaining operations
/// and the number of dropped tokens.
pub(crate) fn repair(content: Content, strict: bool) -> (Vec<Operation>, usize) {
    let mut kept: Vec<Option<Operation>> = Vec::with_capacity(content.operations.len());
    let mut stack: Vec<(Nesting, usize)> = vec![];
    let mut dropped = content.trailing.len() + usize::from(content.truncated);

    for operation in content.operations {
        let in_text = stack.iter().any(|(n, _)| *n == Nesting::Text);

        if strict && (!has_valid_operands(&operation) || (!in_text && is_text_operator(&operation)))
        {
            dropped += 1;
            continue;
        }

        let keep = match &*operation.operator {
            b"q" => {
                stack.push((Nesting::State, kept.len()));
                true
            }
            b"BT" if in_text => false,
            b"BT" => {
                stack.push((Nesting::Text, kept.len()));
                true
            }
            b"BMC" | b"BDC" => {
                stack.push((Nesting::MarkedContent, kept.len()));
                true
            }
            b"Q" => close(&mut stack, Nesting::State),
            b"ET" => close(&mut stack, Nesting::Text),
            b"EMC" => close(&mut stack, Nesting::MarkedContent),
            _ => true,
        };

        if keep {
            kept.push(Some(operation));
        } else {
            dropped += 1;
        }
    }

    for (_, index) in stack {
        kept[index] = None;
        dropped += 1;
    }

    (kept.into_iter().flatten().collect(), dropped)
}

fn close(stack: &mut Vec<(Nesting, usize)>, nesting: Nesting) -> bool {
    match stack.last() {
        Some((top, _)) if *top == nesting => {
            stack.pop();
            true
        }
        _ => false,
    }
}

fn is_text_operator(operation: &Operation) -> bool {
    matches!(
        &*operation.operator,
        b"Tj" | b"TJ" | b"'" | b"\"" | b"Td" | b"TD" | b"Tm" | b"T*"
    )
}

fn has_valid_operands(operation: &Operation) -> bool {
    let count = operation.operands.len();

    let expected = match &*operation.operator {
        b"SC" | b"sc" | b"SCN" | b"scn" => return count >= 1,
        b"b" | b"B" | b"b*" | b"B*" | b"BT" | b"BX" | b"EMC" | b"ET" | b"EX" | b"f" | b"F"
        | b"f*" | b"h" | b"n" | b"q" | b"Q" | b"s" | b"S" | b"T*" | b"W" | b"W*" | b"BI" => 0,
        b"BMC" | b"CS" | b"cs" | b"Do" | b"G" | b"g" | b"gs" | b"i" | b"j" | b"J" | b"M"
        | b"MP" | b"ri" | b"sh" | b"Tc" | b"Tj" | b"TJ" | b"TL" | b"Tr" | b"Ts" | b"Tw"
        | b"Tz" | b"w" | b"'" => 1,
        b"BDC" | b"d" | b"d0" | b"DP" | b"l" | b"m" | b"Td" | b"TD" | b"Tf" => 2,
        b"RG" | b"rg" | b"\"" => 3,
        b"K" | b"k" | b"re" | b"v" | b"y" => 4,
        b"c" | b"cm" | b"d1" | b"Tm" => 6,
        _ => return true,
    };

    count == expected
}

#[cfg(test)]
mod tests {
    use super::{repair, sanitize};
    use crate::context::Context;
    use crate::error::Diagnostic;
    use crate::options::CleanOptions;
    use rinse_syntax::Document;
    use rinse_syntax::content::{parse_content, write_content};
    use rinse_syntax::object::{Dict, Name, ObjRef, Object, Stream};

    fn clean(data: &[u8], strict: bool) -> (String, usize) {
        let (operations, dropped) = repair(parse_content(data), strict);
        let written = String::from_utf8(write_content(&operations)).unwrap();

        (written.replace('\n', ";"), dropped)
    }

    #[test]
    fn balanced_content_is_unchanged() {
        let (content, dropped) = clean(b"q 1 0 0 rg BT /F1 12 Tf (a) Tj ET Q", false);

        assert_eq!(content, "q;1 0 0 rg;BT;/F1 12 Tf;(a) Tj;ET;Q;");
        assert_eq!(dropped, 0);
    }

    #[test]
    fn unmatched_state_operators() {
        assert_eq!(clean(b"q 0 g Q Q", false), ("q;0 g;Q;".to_string(), 1));
        assert_eq!(clean(b"q q 0 g Q", false), ("q;0 g;Q;".to_string(), 1));
    }

    #[test]
    fn interleaved_nesting() {
        assert_eq!(clean(b"q BT Q ET", false), ("BT;ET;".to_string(), 2));
        assert_eq!(clean(b"/P BMC q EMC Q", false), ("q;Q;".to_string(), 2));
        assert_eq!(
            clean(b"/Span <</ActualText (x)>> BDC EMC", false),
            ("/Span <</ActualText(x)>> BDC;EMC;".to_string(), 0)
        );
    }

    #[test]
    fn nested_text_objects() {
        assert_eq!(clean(b"BT BT (a) Tj ET", false), ("BT;(a) Tj;ET;".to_string(), 1));
    }

    #[test]
    fn trailing_operands_and_unknown_operators() {
        assert_eq!(clean(b"0 0 m foo 1 1", false), ("0 0 m;foo;".to_string(), 2));
        assert_eq!(clean(b"foo", true), ("foo;".to_string(), 0));
    }

    #[test]
    fn strict_mode() {
        let data = b"1 0 RG (a) Tj /F1 12 Tf 1 0 0 1 scn BT 5 Td (b) Tj ET";

        assert_eq!(
            clean(data, false),
            (
                "1 0 RG;(a) Tj;/F1 12 Tf;1 0 0 1 scn;BT;5 Td;(b) Tj;ET;".to_string(),
                0
            )
        );
        assert_eq!(
            clean(data, true),
            ("/F1 12 Tf;1 0 0 1 scn;BT;(b) Tj;ET;".to_string(), 3)
        );
    }

    fn r(num: u32) -> Object {
        Object::Ref(ObjRef::new(num, 0))
    }

    fn stream(entries: &[(&str, Object)], data: &[u8]) -> Stream {
        let dict = entries
            .iter()
            .map(|(k, v)| ((*k).into(), v.clone()))
            .collect();

        Stream::new(dict, data.to_vec())
    }

    // A page whose contents are split over two streams, the first one compressed, drawing a
    // form that draws itself.
    fn document() -> Document {
        let mut doc = Document::default();
        doc.trailer.insert("Root", r(1));

        let mut catalog = Dict::new();
        catalog.insert("Type", Name::new(b"Catalog"));
        catalog.insert("Pages", r(2));
        doc.insert(ObjRef::new(1, 0), catalog);

        let mut pages = Dict::new();
        pages.insert("Type", Name::new(b"Pages"));
        pages.insert("Kids", vec![r(3)]);
        pages.insert("Count", 1);
        doc.insert(ObjRef::new(2, 0), pages);

        let x_objects = Dict::from_iter([("Fm1".into(), r(6))]);
        let resources = Dict::from_iter([("XObject".into(), x_objects.into())]);

        let mut page = Dict::new();
        page.insert("Type", Name::new(b"Page"));
        page.insert("Parent", r(2));
        page.insert("Contents", vec![r(4), r(5)]);
        page.insert("Resources", resources.clone());
        doc.insert(ObjRef::new(3, 0), page);

        let mut first = stream(&[], b"q 0 0 1 rg");
        first.compress();
        doc.insert(ObjRef::new(4, 0), first);
        doc.insert(ObjRef::new(5, 0), stream(&[], b"/Fm1 Do Q Q"));
        doc.insert(
            ObjRef::new(6, 0),
            stream(
                &[
                    ("Subtype", Name::new(b"Form").into()),
                    ("Resources", resources.into()),
                ],
                b"ET",
            ),
        );

        doc
    }

    #[test]
    fn stage() {
        let settings = CleanOptions {
            clean: true,
            ..CleanOptions::default()
        }
        .validate()
        .unwrap();

        let mut ctx = Context::new(document(), settings);
        sanitize(&mut ctx);

        let merged = ObjRef::new(7, 0);
        let page = ctx.doc.get(ObjRef::new(3, 0)).unwrap().as_dict().unwrap();
        assert_eq!(page.get_ref(b"Contents"), Some(merged));

        let contents = ctx.doc.get(merged).unwrap().as_stream().unwrap();
        assert!(!contents.is_filtered());
        assert_eq!(contents.data, b"q\n0 0 1 rg\n/Fm1 Do\nQ\n");

        // The parts are not modified.
        let first = ctx.doc.get(ObjRef::new(4, 0)).unwrap().as_stream().unwrap();
        assert!(first.is_filtered());
        assert_eq!(first.decoded().unwrap(), b"q 0 0 1 rg");

        let form = ctx.doc.get(ObjRef::new(6, 0)).unwrap().as_stream().unwrap();
        assert_eq!(form.data, b"");

        assert_eq!(
            ctx.diagnostics.as_slice(),
            [
                Diagnostic::ContentRepaired {
                    object: ObjRef::new(6, 0),
                    dropped: 1,
                },
                Diagnostic::ContentRepaired {
                    object: merged,
                    dropped: 1,
                },
            ]
        );
    }

    #[test]
    fn shared_parts_are_merged_per_array() {
        let settings = CleanOptions {
            clean: true,
            ..CleanOptions::default()
        }
        .validate()
        .unwrap();

        let mut doc = document();
        let page = |contents: Vec<Object>| {
            let mut page = Dict::new();
            page.insert("Type", Name::new(b"Page"));
            page.insert("Parent", r(2));
            page.insert("Contents", contents);
            page
        };

        // Same array as the first page, and an array sharing only its first part.
        doc.insert(ObjRef::new(8, 0), page(vec![r(4), r(5)]));
        doc.insert(ObjRef::new(9, 0), page(vec![r(4), r(10)]));
        doc.insert(ObjRef::new(10, 0), stream(&[], b"0 0 5 5 re f"));

        let pages = doc.get_mut(ObjRef::new(2, 0)).unwrap().as_dict_mut().unwrap();
        pages.insert("Kids", vec![r(3), r(8), r(9)]);
        pages.insert("Count", 3);

        let mut ctx = Context::new(doc, settings);
        sanitize(&mut ctx);

        let contents = |page: u32| {
            let page = ctx.doc.get(ObjRef::new(page, 0)).unwrap().as_dict().unwrap();
            page.get_ref(b"Contents").unwrap()
        };

        assert_eq!(contents(3), ObjRef::new(11, 0));
        assert_eq!(contents(8), ObjRef::new(11, 0));
        assert_eq!(contents(9), ObjRef::new(12, 0));

        let data = |id: ObjRef| ctx.doc.get(id).unwrap().as_stream().unwrap().data.clone();
        assert_eq!(data(ObjRef::new(12, 0)), b"0 0 1 rg\n0 0 5 5 re\nf\n");
        assert_eq!(data(ObjRef::new(10, 0)), b"0 0 5 5 re f");
    }
}
