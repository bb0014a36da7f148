//! Character classes of the PDF lexical grammar.

/// Whether the byte is a PDF white-space character.
#[inline(always)]
pub fn is_white_space_character(char: u8) -> bool {
    matches!(char, 0x00 | 0x09 | 0x0a | 0x0c | 0x0d | 0x20)
}

/// Whether the byte is a PDF delimiter character.
#[inline(always)]
pub fn is_delimiter_character(char: u8) -> bool {
    matches!(
        char,
        b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
    )
}

/// Whether the byte is a regular character, i.e. neither white space nor a delimiter.
#[inline(always)]
pub fn is_regular_character(char: u8) -> bool {
    !is_white_space_character(char) && !is_delimiter_character(char)
}

/// Whether the byte is an end-of-line character.
#[inline(always)]
pub fn is_eol_character(char: u8) -> bool {
    matches!(char, 0x0a | 0x0d)
}
