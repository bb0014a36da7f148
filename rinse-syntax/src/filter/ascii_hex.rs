use crate::trivia::is_white_space_character;

pub(crate) fn decode(data: &[u8]) -> Option<Vec<u8>> {
    let mut decoded = Vec::with_capacity(data.len() / 2);
    let mut high = None;

    // We are lenient and don't require a > in the stream.
    for &byte in data {
        let value = match byte {
            b'>' => break,
            b'0'..=b'9' => byte - b'0',
            b'a'..=b'f' => byte - b'a' + 10,
            b'A'..=b'F' => byte - b'A' + 10,
            b if is_white_space_character(b) => continue,
            _ => return None,
        };

        match high.take() {
            Some(h) => decoded.push(h << 4 | value),
            None => high = Some(value),
        }
    }

    if let Some(h) = high {
        decoded.push(h << 4);
    }

    Some(decoded)
}

const LINE_LENGTH: usize = 64;

pub(crate) fn encode(data: &[u8]) -> Vec<u8> {
    const DIGITS: &[u8; 16] = b"0123456789ABCDEF";

    let mut encoded = Vec::with_capacity(data.len() * 2 + data.len() / (LINE_LENGTH / 2) + 2);

    for (i, byte) in data.iter().enumerate() {
        if i > 0 && i % (LINE_LENGTH / 2) == 0 {
            encoded.push(b'\n');
        }

        encoded.push(DIGITS[usize::from(byte >> 4)]);
        encoded.push(DIGITS[usize::from(byte & 0x0f)]);
    }

    encoded.push(b'>');
    encoded
}
