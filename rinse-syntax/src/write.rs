//! Serializing objects back into PDF syntax.

use crate::object::{Dict, Name, Number, ObjRef, Object, PdfString, Stream};
use crate::trivia::{is_regular_character, is_white_space_character};
use std::io::Write as _;

/// A buffer that PDF objects are serialized into.
///
/// In compact mode, tokens are only separated by a space where two regular characters would
/// otherwise run together. In pretty mode, every dictionary entry is put on its own line and
/// nested dictionaries are indented.
#[derive(Debug, Clone, Default)]
pub struct Serializer {
    buf: Vec<u8>,
    pretty: bool,
    indent: usize,
}

impl Serializer {
    /// Create a new, empty serializer.
    pub fn new(pretty: bool) -> Self {
        Self {
            buf: vec![],
            pretty,
            indent: 0,
        }
    }

    /// Whether the serializer is in pretty mode.
    pub fn is_pretty(&self) -> bool {
        self.pretty
    }

    /// The bytes written so far.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// The number of bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether nothing was written yet.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Consume the serializer and return the written bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Append raw bytes without any separation logic.
    pub fn raw(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Append a token, inserting a space first if it would otherwise merge with the previous
    /// token.
    pub fn token(&mut self, bytes: &[u8]) {
        if let (Some(&last), Some(&first)) = (self.buf.last(), bytes.first())
            && is_regular_character(last)
            && is_regular_character(first)
        {
            self.buf.push(b' ');
        }

        self.buf.extend_from_slice(bytes);
    }

    /// Append a single space, unless the buffer already ends with white space.
    pub fn space(&mut self) {
        if self
            .buf
            .last()
            .is_some_and(|b| !is_white_space_character(*b))
        {
            self.buf.push(b' ');
        }
    }

    /// Append a line break.
    pub fn newline(&mut self) {
        self.buf.push(b'\n');
    }

    fn line_start(&mut self) {
        self.newline();
        for _ in 0..self.indent {
            self.buf.extend_from_slice(b"  ");
        }
    }
}

/// A type that can be written as a direct object.
pub trait WriteDirect {
    /// Serialize the object.
    fn write_direct(&self, s: &mut Serializer);
}

/// Serialize an object into a new buffer.
pub fn to_bytes<T: WriteDirect + ?Sized>(item: &T, pretty: bool) -> Vec<u8> {
    let mut s = Serializer::new(pretty);
    item.write_direct(&mut s);
    s.into_bytes()
}

impl WriteDirect for Object {
    fn write_direct(&self, s: &mut Serializer) {
        match self {
            Self::Null => s.token(b"null"),
            Self::Boolean(b) => b.write_direct(s),
            Self::Number(n) => n.write_direct(s),
            Self::String(string) => string.write_direct(s),
            Self::Name(n) => n.write_direct(s),
            Self::Array(a) => a.write_direct(s),
            Self::Dict(d) => d.write_direct(s),
            Self::Stream(stream) => stream.write_direct(s),
            Self::Ref(r) => r.write_direct(s),
        }
    }
}

impl WriteDirect for bool {
    fn write_direct(&self, s: &mut Serializer) {
        s.token(if *self { b"true" } else { b"false" });
    }
}

impl WriteDirect for Number {
    fn write_direct(&self, s: &mut Serializer) {
        let mut buf = Vec::with_capacity(16);

        match *self {
            Self::Integer(i) => {
                let _ = write!(buf, "{i}");
            }
            Self::Real(r) => {
                // `Display` for floats never uses exponent notation, which PDF doesn't support.
                if !r.is_finite() || r == 0.0 {
                    buf.push(b'0');
                } else {
                    let _ = write!(buf, "{r}");
                }
            }
        }

        s.token(&buf);
    }
}

impl WriteDirect for ObjRef {
    fn write_direct(&self, s: &mut Serializer) {
        s.token(format!("{} {} R", self.num, self.generation).as_bytes());
    }
}

impl WriteDirect for Name {
    fn write_direct(&self, s: &mut Serializer) {
        let mut buf = Vec::with_capacity(self.len() + 1);
        buf.push(b'/');

        for &b in self.iter() {
            if (0x21..=0x7E).contains(&b) && b != b'#' && is_regular_character(b) {
                buf.push(b);
            } else {
                let _ = write!(buf, "#{b:02X}");
            }
        }

        s.token(&buf);
    }
}

impl WriteDirect for PdfString {
    fn write_direct(&self, s: &mut Serializer) {
        let bytes = self.as_bytes();
        let binary = bytes
            .iter()
            .filter(|b| !(0x20..0x7F).contains(*b) && !matches!(b, b'\n' | b'\r' | b'\t'))
            .count();

        let mut buf = Vec::with_capacity(bytes.len() + 2);

        if self.is_hex() || binary * 4 > bytes.len() {
            buf.push(b'<');
            for b in bytes {
                let _ = write!(buf, "{b:02X}");
            }
            buf.push(b'>');
        } else {
            buf.push(b'(');
            for &b in bytes {
                match b {
                    b'(' | b')' | b'\\' => buf.extend_from_slice(&[b'\\', b]),
                    b'\n' => buf.extend_from_slice(b"\\n"),
                    b'\r' => buf.extend_from_slice(b"\\r"),
                    b'\t' => buf.extend_from_slice(b"\\t"),
                    0x20..0x7F => buf.push(b),
                    _ => {
                        let _ = write!(buf, "\\{b:03o}");
                    }
                }
            }
            buf.push(b')');
        }

        s.token(&buf);
    }
}

impl WriteDirect for [Object] {
    fn write_direct(&self, s: &mut Serializer) {
        s.token(b"[");

        for (i, item) in self.iter().enumerate() {
            if i > 0 && s.is_pretty() {
                s.space();
            }

            item.write_direct(s);
        }

        s.token(b"]");
    }
}

impl WriteDirect for Vec<Object> {
    fn write_direct(&self, s: &mut Serializer) {
        self.as_slice().write_direct(s);
    }
}

impl WriteDirect for Dict {
    fn write_direct(&self, s: &mut Serializer) {
        s.token(b"<<");

        if s.is_pretty() {
            if self.is_empty() {
                s.raw(b" >>");
                return;
            }

            s.indent += 1;
            for (key, value) in self.iter() {
                s.line_start();
                key.write_direct(s);
                s.space();
                value.write_direct(s);
            }
            s.indent -= 1;
            s.line_start();
        } else {
            for (key, value) in self.iter() {
                key.write_direct(s);
                value.write_direct(s);
            }
        }

        s.token(b">>");
    }
}

impl WriteDirect for Stream {
    /// Write the stream dictionary followed by the payload. The `Length` entry is written as
    /// it is, so it needs to be up to date.
    fn write_direct(&self, s: &mut Serializer) {
        self.dict.write_direct(s);
        s.raw(b"\nstream\n");
        s.raw(&self.data);
        s.raw(b"\nendstream");
    }
}
