//! Password hashing for the AES-256 security handler (revisions 5 and 6).

use crate::crypto::aes::encrypt_cbc;
use sha2::{Digest, Sha256, Sha384, Sha512};

/// Compute the hash of a password together with a salt and, when dealing with the owner
/// password, the 48-byte `U` value.
///
/// Revision 5 only uses a single round of SHA-256. Revision 6 runs the iterated
/// AES/SHA-2 scheme (Algorithm 2.B in ISO 32000-2).
pub(crate) fn compute_hash(
    password: &[u8],
    salt: &[u8],
    user_key: Option<&[u8]>,
    revision: u8,
) -> Option<[u8; 32]> {
    let mut hasher = Sha256::new();
    hasher.update(password);
    hasher.update(salt);
    if let Some(user_key) = user_key {
        hasher.update(user_key);
    }
    let mut k = hasher.finalize().to_vec();

    if revision == 5 {
        return k.as_slice().try_into().ok();
    }

    let mut round: u16 = 0;

    loop {
        let k1 = {
            let mut single = Vec::with_capacity(password.len() + k.len() + 48);
            single.extend_from_slice(password);
            single.extend_from_slice(&k);

            if let Some(user_key) = user_key {
                single.extend_from_slice(user_key);
            }

            single.repeat(64)
        };

        let iv: [u8; 16] = k.get(16..32)?.try_into().ok()?;
        let e = encrypt_cbc(&k[..16], &iv, &k1, false)?;

        // The first 16 bytes as a big-endian number modulo 3. Since 256 is congruent to 1
        // modulo 3, this is the same as the sum of the bytes modulo 3.
        let selector = e[..16].iter().map(|b| u32::from(*b)).sum::<u32>() % 3;

        k = match selector {
            0 => Sha256::digest(&e).to_vec(),
            1 => Sha384::digest(&e).to_vec(),
            _ => Sha512::digest(&e).to_vec(),
        };

        round += 1;

        if round > 63 {
            let last_byte = *e.last()?;

            if u16::from(last_byte) <= round - 32 {
                break;
            }
        }
    }

    k.get(..32)?.try_into().ok()
}
