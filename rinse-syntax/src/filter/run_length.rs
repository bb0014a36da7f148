const EOD: u8 = 128;

/// Decode run-length data. A missing end-of-data marker is accepted, a run that is cut off
/// is not.
pub(crate) fn decode(mut data: &[u8]) -> Option<Vec<u8>> {
    let mut decoded = Vec::with_capacity(data.len() * 2);

    while let Some((&length, rest)) = data.split_first() {
        data = match length {
            EOD => break,
            // Copy the next `length + 1` bytes literally.
            0..EOD => {
                let (literal, rest) = rest.split_at_checked(usize::from(length) + 1)?;
                decoded.extend_from_slice(literal);
                rest
            }
            // Repeat the next byte `257 - length` times.
            _ => {
                let (&byte, rest) = rest.split_first()?;
                decoded.resize(decoded.len() + 257 - usize::from(length), byte);
                rest
            }
        };
    }

    Some(decoded)
}
