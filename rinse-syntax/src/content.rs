//! Tokenizing and re-serializing content streams.
//!
//! Content streams are only handled structurally: a stream is split into operations, each
//! consisting of an operator and the operands that precede it. No operator is interpreted.

use crate::object::dict::keys::{L, LENGTH};
use crate::object::{Dict, Name, Object};
use crate::parse::{read_keyword, read_name, read_object};
use crate::reader::Reader;
use crate::trivia::{is_regular_character, is_white_space_character};
use crate::write::{Serializer, WriteDirect};
use log::warn;
use smallvec::SmallVec;
use std::fmt::{Debug, Formatter};
use std::ops::Deref;

// 6 operands are used for example for `cm` or cubic curves, anything above
// should be pretty rare (for example for DeviceN colors).
const OPERANDS_THRESHOLD: usize = 6;

/// A content stream operator.
#[derive(Clone, PartialEq, Eq)]
pub struct Operator(Name);

impl Operator {
    /// Create a new operator.
    pub fn new(name: &[u8]) -> Self {
        Self(Name::new(name))
    }
}

impl Debug for Operator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.as_str())
    }
}

impl Deref for Operator {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// The dictionary and raw data of an inline image.
#[derive(Debug, Clone, PartialEq)]
pub struct InlineImage {
    /// The image dictionary, with abbreviated keys as they appear in the stream.
    pub dict: Dict,
    /// The image data between `ID` and `EI`.
    pub data: Vec<u8>,
}

/// A single operation of a content stream.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    /// The operator.
    pub operator: Operator,
    /// The operands, in the order they appear in the stream.
    pub operands: SmallVec<[Object; OPERANDS_THRESHOLD]>,
    /// The image of a `BI` operation.
    pub inline_image: Option<Box<InlineImage>>,
}

impl Operation {
    /// Create a new operation.
    pub fn new(operator: &[u8], operands: impl IntoIterator<Item = Object>) -> Self {
        Self {
            operator: Operator::new(operator),
            operands: operands.into_iter().collect(),
            inline_image: None,
        }
    }
}

/// A tokenized content stream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Content {
    /// All complete operations.
    pub operations: Vec<Operation>,
    /// Operands at the end of the stream that are not followed by an operator.
    pub trailing: Vec<Object>,
    /// Whether tokenizing stopped early because of a malformed token.
    pub truncated: bool,
}

/// Tokenize a content stream.
///
/// Tokenizing never fails. If a malformed token is encountered, everything before it is
/// returned and [`Content::truncated`] is set.
pub fn parse_content(data: &[u8]) -> Content {
    let mut content = Content::default();
    let mut stack: SmallVec<[Object; OPERANDS_THRESHOLD]> = SmallVec::new();
    let mut r = Reader::new(data);

    loop {
        r.skip_white_spaces_and_comments();

        let Some(b) = r.peek_byte() else {
            break;
        };

        if matches!(
            b,
            b'/' | b'.' | b'+' | b'-' | b'0'..=b'9' | b'[' | b'<' | b'('
        ) {
            match read_object(&mut r, false) {
                Some(object) => stack.push(object),
                None => {
                    warn!("failed to read operand in content stream at offset {}", r.offset());
                    content.truncated = true;
                    break;
                }
            }

            continue;
        }

        let Some(keyword) = read_keyword(&mut r) else {
            warn!("unexpected delimiter in content stream at offset {}", r.offset());
            content.truncated = true;
            break;
        };

        match keyword {
            b"true" => stack.push(Object::Boolean(true)),
            b"false" => stack.push(Object::Boolean(false)),
            b"null" => stack.push(Object::Null),
            b"BI" => match read_inline_image(&mut r) {
                Some(image) => content.operations.push(Operation {
                    operator: Operator::new(b"BI"),
                    operands: std::mem::take(&mut stack),
                    inline_image: Some(Box::new(image)),
                }),
                None => {
                    warn!("failed to read inline image in content stream");
                    content.truncated = true;
                    break;
                }
            },
            operator => content.operations.push(Operation {
                operator: Operator::new(operator),
                operands: std::mem::take(&mut stack),
                inline_image: None,
            }),
        }
    }

    content.trailing = stack.into_vec();

    content
}

fn read_inline_image(r: &mut Reader<'_>) -> Option<InlineImage> {
    let mut dict = Dict::new();

    loop {
        r.skip_white_spaces_and_comments();

        if r.peek_tag(b"ID").is_some()
            && !r.peek_bytes(3).is_some_and(|b| is_regular_character(b[2]))
        {
            r.forward_tag(b"ID")?;
            break;
        }

        let key = read_name(r)?;
        let value = read_object(r, false)?;
        dict.insert(key, value);
    }

    // A single white-space character separates `ID` from the data.
    r.eat(is_white_space_character);

    let tail = r.tail();

    // Recent files can state the length of the data explicitly.
    let explicit = dict
        .get(L)
        .or_else(|| dict.get(LENGTH))
        .and_then(Object::as_i64)
        .and_then(|l| usize::try_from(l).ok())
        .filter(|l| ends_at_ei(tail, *l));

    let (end, data) = match explicit {
        Some(len) => (len, &tail[..len]),
        None => {
            let end = find_ei(tail)?;
            let data = &tail[..end];

            // Drop the white space that separates the data from `EI`.
            match data.split_last() {
                Some((last, rest)) if is_white_space_character(*last) => (end, rest),
                _ => (end, data),
            }
        }
    };

    let data = data.to_vec();
    r.jump(r.offset() + end);
    r.skip_white_spaces();
    r.forward_tag(b"EI")?;

    Some(InlineImage { dict, data })
}

// Whether `EI` follows after the given length, separated by optional white space.
fn ends_at_ei(data: &[u8], len: usize) -> bool {
    let Some(rest) = data.get(len..) else {
        return false;
    };

    let start = rest
        .iter()
        .position(|b| !is_white_space_character(*b))
        .unwrap_or(rest.len());

    is_ei_at(rest, start)
}

// Find the `EI` that ends the image data. It must be preceded by white space and be followed
// by white space or the end of the stream, which rules out most occurrences inside binary data.
fn find_ei(data: &[u8]) -> Option<usize> {
    let mut offset = 0;

    while let Some(pos) = memchr::memmem::find(&data[offset..], b"EI") {
        let pos = offset + pos;

        if pos > 0 && is_white_space_character(data[pos - 1]) && is_ei_at(data, pos) {
            return Some(pos);
        }

        offset = pos + 1;
    }

    None
}

fn is_ei_at(data: &[u8], pos: usize) -> bool {
    data.get(pos..pos + 2) == Some(b"EI")
        && data
            .get(pos + 2)
            .is_none_or(|b| is_white_space_character(*b))
}

/// Serialize operations, each on its own line.
pub fn write_content(operations: &[Operation]) -> Vec<u8> {
    let mut s = Serializer::new(false);

    for op in operations {
        for operand in &op.operands {
            operand.write_direct(&mut s);
            s.space();
        }

        s.token(&op.operator);

        if let Some(image) = &op.inline_image {
            for (key, value) in image.dict.iter() {
                s.space();
                key.write_direct(&mut s);
                s.space();
                value.write_direct(&mut s);
            }

            s.raw(b" ID\n");
            s.raw(&image.data);
            s.raw(b"\nEI");
        }

        s.newline();
    }

    s.into_bytes()
}
