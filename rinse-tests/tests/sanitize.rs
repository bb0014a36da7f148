use crate::{CATALOG, PAGE_TREE, clean, dict, load, page_contents};
use pdf_writer::{Finish, Name, Pdf, Rect, Ref};
use rinse::{CleanOptions, Diagnostic};
use rinse_syntax::content::parse_content;
use rinse_syntax::object::ObjRef;

const PAGE: Ref = Ref::new(3);
const FIRST: Ref = Ref::new(4);
const SECOND: Ref = Ref::new(5);
const FORM: Ref = Ref::new(6);
// Merged page contents are stored in a new object after all existing ones.
const MERGED: ObjRef = ObjRef::new(7, 0);

// A page whose content is split over two streams that are only balanced as a whole, plus an
// unbalanced form.
fn split_content(first: &[u8], second: &[u8]) -> Vec<u8> {
    let mut pdf = Pdf::new();
    pdf.catalog(CATALOG).pages(PAGE_TREE);
    pdf.pages(PAGE_TREE).kids([PAGE]).count(1);

    let mut page = pdf.page(PAGE);
    page.parent(PAGE_TREE);
    page.media_box(Rect::new(0.0, 0.0, 200.0, 200.0));
    page.insert(Name(b"Contents")).array().items([FIRST, SECOND]);
    page.resources().x_objects().pair(Name(b"Fm1"), FORM);
    page.finish();

    pdf.stream(FIRST, first);
    pdf.stream(SECOND, second);
    pdf.form_xobject(FORM, b"q 0 0 1 rg 0 0 10 10 re f")
        .bbox(Rect::new(0.0, 0.0, 10.0, 10.0));

    pdf.finish()
}

fn balanced(content: &[u8]) -> bool {
    let mut depth = 0_i32;

    for operation in parse_content(content).operations {
        match &*operation.operator {
            b"q" => depth += 1,
            b"Q" => depth -= 1,
            _ => {}
        }

        if depth < 0 {
            return false;
        }
    }

    depth == 0
}

fn form(doc: &rinse_syntax::Document) -> Vec<u8> {
    doc.get(ObjRef::new(6, 0))
        .and_then(|o| o.as_stream())
        .unwrap()
        .decoded()
        .unwrap()
}

#[test]
fn split_content_is_merged_and_repaired() {
    let input = split_content(b"q 1 0 0 rg 0 0 m 10 10 l S", b"Q Q /Fm1 Do");
    let options = CleanOptions {
        clean: true,
        garbage: 1,
        ..CleanOptions::default()
    };
    let cleaned = clean(&input, &options);

    assert_eq!(
        cleaned.diagnostics.as_slice(),
        [
            Diagnostic::ContentRepaired {
                object: ObjRef::new(6, 0),
                dropped: 1,
            },
            Diagnostic::ContentRepaired {
                object: MERGED,
                dropped: 1,
            },
        ]
    );

    let doc = load(&cleaned.data);
    let page = doc.pages()[0];
    assert_eq!(dict(&doc, page).get_ref(b"Contents"), Some(MERGED));

    // The parts are no longer referenced.
    assert!(doc.get(ObjRef::new(4, 0)).is_none());
    assert!(doc.get(ObjRef::new(5, 0)).is_none());

    let content = &page_contents(&doc)[0];
    assert_eq!(content, b"q\n1 0 0 rg\n0 0 m\n10 10 l\nS\nQ\n/Fm1 Do\n");
    assert!(balanced(content));
    assert_eq!(form(&doc), b"0 0 1 rg\n0 0 10 10 re\nf\n");
}

#[test]
fn repaired_streams_follow_the_codec_settings() {
    let input = split_content(b"q 0 g", b"Q");
    let options = CleanOptions {
        clean: true,
        compress: true,
        ..CleanOptions::default()
    };
    let doc = load(&clean(&input, &options).data);

    let contents = dict(&doc, doc.pages()[0]).get_ref(b"Contents").unwrap();
    let stream = doc.get(contents).unwrap().as_stream().unwrap();
    assert!(stream.is_filtered());
    assert_eq!(stream.decoded().unwrap(), b"q\n0 g\nQ\n");
}

#[test]
fn strict_mode_drops_malformed_operators() {
    let input = split_content(b"q 1 0 RG 0 0 m 5 5 l S", b"(x) Tj Q");

    let clean_only = clean(
        &input,
        &CleanOptions {
            clean: true,
            ..CleanOptions::default()
        },
    );
    let doc = load(&clean_only.data);
    assert_eq!(
        page_contents(&doc)[0],
        b"q\n1 0 RG\n0 0 m\n5 5 l\nS\n(x) Tj\nQ\n"
    );

    let strict = clean(
        &input,
        &CleanOptions {
            sanitize: true,
            ..CleanOptions::default()
        },
    );
    let doc = load(&strict.data);
    assert_eq!(page_contents(&doc)[0], b"q\n0 0 m\n5 5 l\nS\nQ\n");
    assert!(strict.diagnostics.iter().any(|d| *d
        == Diagnostic::ContentRepaired {
            object: MERGED,
            dropped: 2,
        }));
}

#[test]
fn balanced_content_is_left_alone() {
    let input = split_content(b"q 0 g", b"Q");
    let cleaned = clean(&input, &CleanOptions::default());
    let doc = load(&cleaned.data);

    // Without sanitizing, the parts are kept as they are.
    assert!(dict(&doc, doc.pages()[0]).get_array(b"Contents").is_some());
    assert!(cleaned.diagnostics.is_empty());
}

// Two pages whose contents start with the same stream.
fn shared_part() -> Vec<u8> {
    let first_page = Ref::new(3);
    let second_page = Ref::new(4);
    let shared = Ref::new(5);
    let first = Ref::new(6);
    let second = Ref::new(7);

    let mut pdf = Pdf::new();
    pdf.catalog(CATALOG).pages(PAGE_TREE);
    pdf.pages(PAGE_TREE).kids([first_page, second_page]).count(2);

    for (page_ref, own) in [(first_page, first), (second_page, second)] {
        let mut page = pdf.page(page_ref);
        page.parent(PAGE_TREE);
        page.media_box(Rect::new(0.0, 0.0, 200.0, 200.0));
        page.insert(Name(b"Contents")).array().items([shared, own]);
        page.finish();
    }

    pdf.stream(shared, b"0 g 1 1 5 5 re f");
    pdf.stream(first, b"10 10 4 4 re f");
    pdf.stream(second, b"50 50 9 9 re f");

    pdf.finish()
}

#[test]
fn pages_sharing_a_stream_keep_their_own_content() {
    let options = CleanOptions {
        clean: true,
        ..CleanOptions::default()
    };
    let cleaned = clean(&shared_part(), &options);
    let doc = load(&cleaned.data);

    assert_eq!(
        page_contents(&doc),
        vec![
            b"0 g\n1 1 5 5 re\nf\n10 10 4 4 re\nf\n".to_vec(),
            b"0 g\n1 1 5 5 re\nf\n50 50 9 9 re\nf\n".to_vec(),
        ]
    );
    assert!(cleaned.diagnostics.is_empty());
}

#[test]
fn repeated_pages_share_one_merged_stream() {
    let options = CleanOptions {
        clean: true,
        pages: Some(vec![1, 1]),
        garbage: 2,
        ..CleanOptions::default()
    };
    let doc = load(&clean(&shared_part(), &options).data);

    let expected = b"0 g\n1 1 5 5 re\nf\n10 10 4 4 re\nf\n".to_vec();
    assert_eq!(page_contents(&doc), vec![expected.clone(), expected]);

    let pages = doc.pages();
    assert_eq!(
        dict(&doc, pages[0]).get_ref(b"Contents"),
        dict(&doc, pages[1]).get_ref(b"Contents")
    );
}
