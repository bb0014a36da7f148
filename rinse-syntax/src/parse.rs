//! Parsing of direct and indirect objects.

use crate::object::dict::keys::LENGTH;
use crate::object::{Dict, Name, Number, ObjRef, Object, PdfString, Stream};
use crate::reader::Reader;
use crate::trivia::{is_regular_character, is_white_space_character};
use log::warn;
use memchr::memmem;

// Guards against stack overflows on maliciously nested arrays and dictionaries.
const MAX_DEPTH: usize = 256;

/// Parse a single direct object from the given bytes.
///
/// Object references (`1 0 R`) are recognized. Returns `None` if the data doesn't start with a
/// valid object.
pub fn parse_object(data: &[u8]) -> Option<Object> {
    read_object(&mut Reader::new(data), true)
}

/// Read a direct object. If `allow_refs` is false, object references are not recognized,
/// which is the case in content streams.
pub(crate) fn read_object(r: &mut Reader<'_>, allow_refs: bool) -> Option<Object> {
    let start = r.offset();
    let obj = read_object_inner(r, allow_refs, 0);

    if obj.is_none() {
        r.jump(start);
    }

    obj
}

fn read_object_inner(r: &mut Reader<'_>, allow_refs: bool, depth: usize) -> Option<Object> {
    if depth > MAX_DEPTH {
        warn!("exceeded maximum nesting depth while parsing object");

        return None;
    }

    r.skip_white_spaces_and_comments();

    match r.peek_byte()? {
        b'/' => read_name(r).map(Object::Name),
        b'(' => read_literal_string(r).map(Object::String),
        b'<' => {
            if r.peek_tag(b"<<").is_some() {
                read_dict(r, allow_refs, depth).map(Object::Dict)
            } else {
                read_hex_string(r).map(Object::String)
            }
        }
        b'[' => read_array(r, allow_refs, depth).map(Object::Array),
        b'+' | b'-' | b'.' | b'0'..=b'9' => {
            let number = read_number(r)?;

            if allow_refs
                && let Number::Integer(num) = number
                && let Some(reference) = read_ref_tail(r, num)
            {
                return Some(Object::Ref(reference));
            }

            Some(Object::Number(number))
        }
        _ => match read_keyword(r)? {
            b"true" => Some(Object::Boolean(true)),
            b"false" => Some(Object::Boolean(false)),
            b"null" => Some(Object::Null),
            _ => None,
        },
    }
}

// Tries to read the `G R` part of an object reference whose number has already been read.
// The reader is only advanced on success.
fn read_ref_tail(r: &mut Reader<'_>, num: i64) -> Option<ObjRef> {
    let num = u32::try_from(num).ok()?;
    let mut lookahead = r.clone();

    lookahead.forward_while_1(is_white_space_character)?;
    let generation = u16::try_from(lookahead.read_unsigned()?).ok()?;
    lookahead.forward_while_1(is_white_space_character)?;
    lookahead.forward_tag(b"R")?;

    if lookahead.peek_byte().is_some_and(is_regular_character) {
        return None;
    }

    *r = lookahead;

    Some(ObjRef::new(num, generation))
}

/// Read a run of regular characters, as used for keywords and content stream operators.
pub(crate) fn read_keyword<'a>(r: &mut Reader<'a>) -> Option<&'a [u8]> {
    let start = r.offset();
    r.forward_while_1(is_regular_character)?;

    r.range(start..r.offset())
}

pub(crate) fn read_number(r: &mut Reader<'_>) -> Option<Number> {
    let start = r.offset();
    r.forward_while_1(|b| matches!(b, b'+' | b'-' | b'.' | b'0'..=b'9'))?;
    let token = r.range(start..r.offset())?;

    // Be lenient with doubled signs (`--5`) and signs in the middle of a number (`5-3`), which
    // some producers emit. Anything after the first misplaced sign is ignored.
    let mut negative = false;
    let mut body = token;

    while let Some((&first, rest)) = body.split_first() {
        match first {
            b'-' => negative = !negative,
            b'+' => {}
            _ => break,
        }

        body = rest;
    }

    let end = body
        .iter()
        .position(|b| matches!(b, b'+' | b'-'))
        .unwrap_or(body.len());
    let body = &body[..end];
    let text = std::str::from_utf8(body).ok()?;

    let number = if body.contains(&b'.') {
        let value = if body.iter().any(u8::is_ascii_digit) {
            // A number like `5.` or `.5` parses fine, `1.2.3` does not.
            text.parse::<f64>().ok().or_else(|| {
                let first = text.split('.').take(2).collect::<Vec<_>>().join(".");
                first.parse::<f64>().ok()
            })?
        } else {
            0.0
        };

        Number::Real(if negative { -value } else { value })
    } else if body.is_empty() {
        Number::Integer(0)
    } else {
        match text.parse::<i64>() {
            Ok(i) => Number::Integer(if negative { -i } else { i }),
            Err(_) => {
                let value = text.parse::<f64>().ok()?;
                Number::Real(if negative { -value } else { value })
            }
        }
    };

    Some(number)
}

pub(crate) fn read_name(r: &mut Reader<'_>) -> Option<Name> {
    r.forward_tag(b"/")?;

    let mut bytes = vec![];

    while let Some(b) = r.eat(is_regular_character) {
        if b == b'#'
            && let Some(hex) = r.peek_bytes(2)
            && let (Some(hi), Some(lo)) = (hex_value(hex[0]), hex_value(hex[1]))
        {
            r.read_bytes(2)?;
            bytes.push(hi << 4 | lo);
        } else {
            bytes.push(b);
        }
    }

    Some(Name::new(&bytes))
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

fn read_hex_string(r: &mut Reader<'_>) -> Option<PdfString> {
    r.forward_tag(b"<")?;

    let mut bytes = vec![];
    let mut high = None;

    loop {
        let b = r.read_byte()?;

        if b == b'>' {
            break;
        }

        if is_white_space_character(b) {
            continue;
        }

        let value = hex_value(b)?;

        match high.take() {
            Some(h) => bytes.push(h << 4 | value),
            None => high = Some(value),
        }
    }

    // An odd number of digits behaves as if a trailing zero followed.
    if let Some(h) = high {
        bytes.push(h << 4);
    }

    Some(PdfString::new_hex(bytes))
}

fn read_literal_string(r: &mut Reader<'_>) -> Option<PdfString> {
    r.forward_tag(b"(")?;

    let mut bytes = vec![];
    let mut depth = 1_usize;

    loop {
        let b = r.read_byte()?;

        match b {
            b'(' => {
                depth += 1;
                bytes.push(b);
            }
            b')' => {
                depth -= 1;

                if depth == 0 {
                    break;
                }

                bytes.push(b);
            }
            b'\\' => {
                let escaped = r.read_byte()?;

                match escaped {
                    b'n' => bytes.push(b'\n'),
                    b'r' => bytes.push(b'\r'),
                    b't' => bytes.push(b'\t'),
                    b'b' => bytes.push(0x08),
                    b'f' => bytes.push(0x0c),
                    b'0'..=b'7' => {
                        let mut value = u32::from(escaped - b'0');

                        for _ in 0..2 {
                            match r.eat(|b| (b'0'..=b'7').contains(&b)) {
                                Some(d) => value = value * 8 + u32::from(d - b'0'),
                                None => break,
                            }
                        }

                        bytes.push(value as u8);
                    }
                    // A backslash at the end of a line continues the string on the next line.
                    b'\r' => {
                        r.eat(|b| b == b'\n');
                    }
                    b'\n' => {}
                    other => bytes.push(other),
                }
            }
            // End-of-line markers inside literal strings are normalized to a single newline.
            b'\r' => {
                r.eat(|b| b == b'\n');
                bytes.push(b'\n');
            }
            _ => bytes.push(b),
        }
    }

    Some(PdfString::new(bytes))
}

fn read_array(r: &mut Reader<'_>, allow_refs: bool, depth: usize) -> Option<Vec<Object>> {
    r.forward_tag(b"[")?;

    let mut items = vec![];

    loop {
        r.skip_white_spaces_and_comments();

        if r.forward_tag(b"]").is_some() {
            return Some(items);
        }

        items.push(read_object_inner(r, allow_refs, depth + 1)?);
    }
}

fn read_dict(r: &mut Reader<'_>, allow_refs: bool, depth: usize) -> Option<Dict> {
    r.forward_tag(b"<<")?;

    let mut dict = Dict::new();

    loop {
        r.skip_white_spaces_and_comments();

        if r.forward_tag(b">>").is_some() {
            return Some(dict);
        }

        let key = read_name(r)?;
        r.skip_white_spaces_and_comments();

        // A key directly followed by the end of the dictionary has no value. Treat it as null,
        // which is equivalent to the entry being absent.
        if r.peek_tag(b">>").is_some() {
            warn!("dictionary key /{} has no value", key.as_str());
            continue;
        }

        let value = read_object_inner(r, allow_refs, depth + 1)?;

        if !value.is_null() {
            dict.insert(key, value);
        }
    }
}

/// Read an object header of the form `N G obj`.
pub(crate) fn read_object_header(r: &mut Reader<'_>) -> Option<ObjRef> {
    r.skip_white_spaces_and_comments();

    let num = u32::try_from(r.read_unsigned()?).ok()?;
    r.forward_while_1(is_white_space_character)?;
    let generation = u16::try_from(r.read_unsigned()?).ok()?;
    r.skip_white_spaces_and_comments();
    r.forward_tag(b"obj")?;

    if r.peek_byte().is_some_and(is_regular_character) {
        return None;
    }

    Some(ObjRef::new(num, generation))
}

/// Read a complete indirect object, including a stream payload.
///
/// `resolve_length` is used to resolve an indirect `Length` entry of a stream dictionary.
pub(crate) fn read_indirect_object(
    r: &mut Reader<'_>,
    resolve_length: &dyn Fn(ObjRef) -> Option<usize>,
) -> Option<(ObjRef, Object)> {
    let id = read_object_header(r)?;
    r.skip_white_spaces_and_comments();

    let object = if r.peek_tag(b"endobj").is_some() {
        Object::Null
    } else {
        read_object(r, true)?
    };

    r.skip_white_spaces_and_comments();

    let object = match object {
        Object::Dict(dict) if r.peek_tag(b"stream").is_some() => {
            let length = match dict.get(LENGTH) {
                Some(Object::Ref(length_ref)) => resolve_length(*length_ref),
                Some(other) => other.as_i64().and_then(|l| usize::try_from(l).ok()),
                None => None,
            };

            let data = read_stream_data(r, length)?;

            Object::Stream(Stream::new(dict, data))
        }
        other => other,
    };

    r.skip_white_spaces_and_comments();
    r.forward_tag(b"endobj");

    Some((id, object))
}

fn read_stream_data(r: &mut Reader<'_>, length: Option<usize>) -> Option<Vec<u8>> {
    r.forward_tag(b"stream")?;
    // Some writers put spaces between the keyword and the end-of-line marker.
    r.forward_while(|b| b == b' ');
    r.skip_eol();

    let start = r.offset();

    if let Some(length) = length
        && let Some(data) = r.range(start..start.saturating_add(length))
    {
        let mut after = Reader::new_at(r.data(), start + length);
        after.skip_white_spaces();

        if after.forward_tag(b"endstream").is_some() {
            *r = after;

            return Some(data.to_vec());
        }
    }

    warn!("stream at offset {start} has an invalid length, searching for endstream");

    let tail = r.tail();
    let end = memmem::find(tail, b"endstream")?;
    let mut data = &tail[..end];

    if let Some(stripped) = data.strip_suffix(b"\r\n") {
        data = stripped;
    } else if let Some(stripped) = data
        .strip_suffix(b"\n")
        .or_else(|| data.strip_suffix(b"\r"))
    {
        data = stripped;
    }

    r.jump(start + end + b"endstream".len());

    Some(data.to_vec())
}

#[cfg(test)]
mod tests {
    use super::{parse_object, read_indirect_object};
    use crate::object::{Name, Number, ObjRef, Object};
    use crate::reader::Reader;

    #[test]
    fn numbers() {
        assert_eq!(parse_object(b"42"), Some(Object::from(42)));
        assert_eq!(parse_object(b"-3.5"), Some(Object::from(-3.5)));
        assert_eq!(parse_object(b".5"), Some(Object::from(0.5)));
        assert_eq!(parse_object(b"--7"), Some(Object::from(7)));
        assert_eq!(
            parse_object(b"4."),
            Some(Object::Number(Number::Real(4.0)))
        );
    }

    #[test]
    fn reference_vs_numbers() {
        assert_eq!(parse_object(b"12 0 R"), Some(Object::Ref(ObjRef::new(12, 0))));

        let arr = parse_object(b"[1 2 3 0 R 4]").unwrap();
        assert_eq!(
            arr,
            Object::Array(vec![
                Object::from(1),
                Object::from(2),
                Object::Ref(ObjRef::new(3, 0)),
                Object::from(4),
            ])
        );

        // `RG` is not a reference keyword.
        assert!(parse_object(b"1 0 RG").is_some_and(|o| o == Object::from(1)));
    }

    #[test]
    fn names_and_strings() {
        assert_eq!(
            parse_object(b"/A#20B"),
            Some(Object::Name(Name::new(b"A B")))
        );
        assert_eq!(
            parse_object(b"(a\\(b\\)\\101\\\nc)").unwrap().as_string(),
            Some(&b"a(b)Ac"[..])
        );
        assert_eq!(
            parse_object(b"(nested (parens) ok)").unwrap().as_string(),
            Some(&b"nested (parens) ok"[..])
        );
        assert_eq!(
            parse_object(b"<48 656C6C6F7>").unwrap().as_string(),
            Some(&b"Hellop"[..])
        );
    }

    #[test]
    fn dictionaries() {
        let obj = parse_object(b"<< /Type /Page /Kids [1 0 R] /Empty null % comment\n>>").unwrap();
        let dict = obj.as_dict().unwrap();

        assert!(dict.has_type(b"Page"));
        assert_eq!(dict.get_array(b"Kids").map(<[Object]>::len), Some(1));
        assert!(!dict.contains_key(b"Empty"));
    }

    #[test]
    fn indirect_stream_with_wrong_length() {
        let data = b"7 0 obj\n<< /Length 100 >>\nstream\nhello\nendstream\nendobj";
        let mut r = Reader::new(data);
        let (id, obj) = read_indirect_object(&mut r, &|_| None).unwrap();

        assert_eq!(id, ObjRef::new(7, 0));
        assert_eq!(obj.as_stream().unwrap().data, b"hello");
        assert!(r.at_end());
    }

    #[test]
    fn indirect_stream_with_indirect_length() {
        let data = b"7 0 obj\n<< /Length 8 0 R >>\nstream\r\nab\ncd\r\nendstream\nendobj";
        let mut r = Reader::new(data);
        let (_, obj) = read_indirect_object(&mut r, &|_| Some(5)).unwrap();

        assert_eq!(obj.as_stream().unwrap().data, b"ab\ncd");
    }

    #[test]
    fn deep_nesting_is_rejected() {
        let data = "[".repeat(1000);
        assert!(parse_object(data.as_bytes()).is_none());
    }
}
