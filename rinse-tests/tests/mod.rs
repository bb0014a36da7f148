use pdf_writer::{Content, Finish, Name, Pdf, Rect, Ref, Str, TextStr};
use rinse::{CleanOptions, Cleaned};
use rinse_syntax::Document;
use rinse_syntax::object::{Dict, ObjRef, Object};

mod sanitize;

pub(crate) const CATALOG: Ref = Ref::new(1);
pub(crate) const PAGE_TREE: Ref = Ref::new(2);
pub(crate) const FONT: Ref = Ref::new(3);
pub(crate) const INFO: Ref = Ref::new(4);

/// The content stream of page `index` (1-based) of [`document`].
pub(crate) fn page_content(index: usize) -> Vec<u8> {
    let mut content = Content::new();
    content.begin_text();
    content.set_font(Name(b"F1"), 12.0);
    content.next_line(20.0, 100.0);
    content.show(Str(format!("Page {index}").as_bytes()));
    content.end_text();
    content.finish()
}

/// Build a document with one page per content stream. All pages share a single font, and the
/// file contains one object that is not referenced from anywhere.
pub(crate) fn build(contents: &[Vec<u8>]) -> Vec<u8> {
    let mut pdf = Pdf::new();
    let mut next = Ref::new(5);

    let page_refs = (0..contents.len()).map(|_| next.bump()).collect::<Vec<_>>();

    pdf.catalog(CATALOG).pages(PAGE_TREE);
    pdf.pages(PAGE_TREE)
        .kids(page_refs.iter().copied())
        .count(page_refs.len() as i32);
    pdf.type1_font(FONT).base_font(Name(b"Helvetica"));
    pdf.document_info(INFO).title(TextStr("Fixture"));

    for (page_ref, content) in page_refs.iter().zip(contents) {
        let content_ref = next.bump();

        let mut page = pdf.page(*page_ref);
        page.parent(PAGE_TREE);
        page.media_box(Rect::new(0.0, 0.0, 200.0, 200.0));
        page.contents(content_ref);
        page.resources().fonts().pair(Name(b"F1"), FONT);
        page.finish();

        pdf.stream(content_ref, content);
    }

    pdf.indirect(next.bump()).primitive(Str(b"unused"));

    pdf.finish()
}

/// A document with `pages` pages, showing their page number.
pub(crate) fn document(pages: usize) -> Vec<u8> {
    build(&(1..=pages).map(page_content).collect::<Vec<_>>())
}

pub(crate) fn clean(data: &[u8], options: &CleanOptions) -> Cleaned {
    rinse::clean(data, options).unwrap()
}

pub(crate) fn load(data: &[u8]) -> Document {
    let doc = rinse_syntax::load(data, b"").unwrap();
    assert!(!doc.repaired, "the output needed repairs");

    doc
}

pub(crate) fn dict(doc: &Document, id: ObjRef) -> &Dict {
    doc.get(id).and_then(Object::as_dict).unwrap()
}

/// The decoded content of each page, in page order.
pub(crate) fn page_contents(doc: &Document) -> Vec<Vec<u8>> {
    doc.pages()
        .into_iter()
        .map(|page| {
            let contents = dict(doc, page).get(b"Contents").unwrap();
            let streams = match contents {
                Object::Array(items) => items.iter().filter_map(Object::as_obj_ref).collect(),
                other => vec![other.as_obj_ref().unwrap()],
            };

            streams
                .into_iter()
                .flat_map(|id| doc.get(id).unwrap().as_stream().unwrap().decoded().unwrap())
                .collect()
        })
        .collect()
}

pub(crate) fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}
