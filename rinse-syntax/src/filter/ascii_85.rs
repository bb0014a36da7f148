use crate::trivia::is_white_space_character;

pub(crate) fn decode(data: &[u8]) -> Option<Vec<u8>> {
    let mut decoded = Vec::with_capacity(data.len() * 4 / 5);
    let mut group = [0_u8; 5];
    let mut len = 0;

    // Some producers still emit the `<~` prefix from PostScript.
    let data = data.strip_prefix(b"<~").unwrap_or(data);

    for &byte in data {
        match byte {
            b'~' => break,
            b'z' if len == 0 => decoded.extend_from_slice(&[0; 4]),
            b'!'..=b'u' => {
                group[len] = byte - b'!';
                len += 1;

                if len == 5 {
                    decoded.extend_from_slice(&word(&group)?);
                    len = 0;
                }
            }
            b if is_white_space_character(b) => {}
            _ => return None,
        }
    }

    if len > 0 {
        // A partial group of n characters yields n - 1 bytes, padded with `u`.
        if len == 1 {
            return None;
        }

        for slot in group.iter_mut().skip(len) {
            *slot = b'u' - b'!';
        }

        decoded.extend_from_slice(&word(&group)?[..len - 1]);
    }

    Some(decoded)
}

fn word(group: &[u8; 5]) -> Option<[u8; 4]> {
    let value = group
        .iter()
        .fold(0_u64, |acc, &d| acc * 85 + u64::from(d));

    // 85^5 > 256^4, the result might not fit in an u32.
    Some(u32::try_from(value).ok()?.to_be_bytes())
}
