//! AES in CBC and ECB mode, on top of the `aes` and `cbc` crates.

use aes::cipher::block_padding::{NoPadding, Pkcs7};
use aes::cipher::{BlockDecrypt, BlockDecryptMut, BlockEncrypt, BlockEncryptMut, KeyInit, KeyIvInit};
use aes::{Aes128, Aes256};

type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;
type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

const BLOCK_SIZE: usize = 16;

/// Encrypt data in CBC mode. The key length selects AES-128 or AES-256.
///
/// Without padding, the data length must be a multiple of the block size.
pub(crate) fn encrypt_cbc(key: &[u8], iv: &[u8; 16], data: &[u8], pad: bool) -> Option<Vec<u8>> {
    if !pad && data.len() % BLOCK_SIZE != 0 {
        return None;
    }

    let encrypted = match (key.len(), pad) {
        (16, true) => Aes128CbcEnc::new_from_slices(key, iv)
            .ok()?
            .encrypt_padded_vec_mut::<Pkcs7>(data),
        (16, false) => Aes128CbcEnc::new_from_slices(key, iv)
            .ok()?
            .encrypt_padded_vec_mut::<NoPadding>(data),
        (32, true) => Aes256CbcEnc::new_from_slices(key, iv)
            .ok()?
            .encrypt_padded_vec_mut::<Pkcs7>(data),
        (32, false) => Aes256CbcEnc::new_from_slices(key, iv)
            .ok()?
            .encrypt_padded_vec_mut::<NoPadding>(data),
        _ => return None,
    };

    Some(encrypted)
}

/// Decrypt data in CBC mode. The key length selects AES-128 or AES-256.
pub(crate) fn decrypt_cbc(key: &[u8], iv: &[u8; 16], data: &[u8], pad: bool) -> Option<Vec<u8>> {
    match (key.len(), pad) {
        (16, true) => Aes128CbcDec::new_from_slices(key, iv)
            .ok()?
            .decrypt_padded_vec_mut::<Pkcs7>(data)
            .ok(),
        (16, false) => Aes128CbcDec::new_from_slices(key, iv)
            .ok()?
            .decrypt_padded_vec_mut::<NoPadding>(data)
            .ok(),
        (32, true) => Aes256CbcDec::new_from_slices(key, iv)
            .ok()?
            .decrypt_padded_vec_mut::<Pkcs7>(data)
            .ok(),
        (32, false) => Aes256CbcDec::new_from_slices(key, iv)
            .ok()?
            .decrypt_padded_vec_mut::<NoPadding>(data)
            .ok(),
        _ => None,
    }
}

/// Encrypt a single block with AES-256 in ECB mode.
pub(crate) fn encrypt_ecb_256(key: &[u8], block: &[u8; 16]) -> Option<[u8; 16]> {
    let cipher = Aes256::new_from_slice(key).ok()?;
    let mut block = aes::Block::clone_from_slice(block);
    cipher.encrypt_block(&mut block);

    let mut out = [0_u8; 16];
    out.copy_from_slice(&block);
    Some(out)
}

/// Decrypt a single block with AES-256 in ECB mode.
pub(crate) fn decrypt_ecb_256(key: &[u8], block: &[u8]) -> Option<[u8; 16]> {
    if block.len() != BLOCK_SIZE {
        return None;
    }

    let cipher = Aes256::new_from_slice(key).ok()?;
    let mut block = aes::Block::clone_from_slice(block);
    cipher.decrypt_block(&mut block);

    let mut out = [0_u8; 16];
    out.copy_from_slice(&block);
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::{decrypt_cbc, decrypt_ecb_256, encrypt_cbc, encrypt_ecb_256};

    #[test]
    fn cbc_round_trip() {
        let iv = [7_u8; 16];

        for key in [[1_u8; 16].as_slice(), [2_u8; 32].as_slice()] {
            let encrypted = encrypt_cbc(key, &iv, b"attack at dawn", true).unwrap();
            assert_eq!(encrypted.len(), 16);
            assert_eq!(
                decrypt_cbc(key, &iv, &encrypted, true).unwrap(),
                b"attack at dawn"
            );
        }
    }

    #[test]
    fn no_padding_requires_full_blocks() {
        assert!(encrypt_cbc(&[0; 16], &[0; 16], &[1; 15], false).is_none());
        assert_eq!(
            encrypt_cbc(&[0; 32], &[0; 16], &[1; 32], false).map(|v| v.len()),
            Some(32)
        );
    }

    #[test]
    fn ecb_round_trip() {
        let key = [9_u8; 32];
        let block = *b"0123456789abcdef";
        let encrypted = encrypt_ecb_256(&key, &block).unwrap();

        assert_ne!(encrypted, block);
        assert_eq!(decrypt_ecb_256(&key, &encrypted).unwrap(), block);
    }
}
