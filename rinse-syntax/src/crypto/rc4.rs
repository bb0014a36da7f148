//! The RC4 stream cipher.

#[derive(Clone)]
pub(crate) struct Rc4 {
    a: u8,
    b: u8,
    s: [u8; 256],
}

impl Rc4 {
    pub(crate) fn new(key: &[u8]) -> Self {
        let mut s = [0_u8; 256];
        // An empty key would divide by zero below, treat it like a single zero byte.
        let key: &[u8] = if key.is_empty() { &[0] } else { key };
        let key_length = key.len();

        for (i, s) in s.iter_mut().enumerate() {
            *s = i as u8;
        }

        let mut j = 0_u8;
        for i in 0..256 {
            let tmp = s[i];
            j = j.wrapping_add(tmp).wrapping_add(key[i % key_length]);
            s[i] = s[usize::from(j)];
            s[usize::from(j)] = tmp;
        }

        Self { a: 0, b: 0, s }
    }

    /// Apply the key stream to the data. Encryption and decryption are the same operation.
    pub(crate) fn apply(&mut self, data: &[u8]) -> Vec<u8> {
        data.iter()
            .map(|byte| {
                self.a = self.a.wrapping_add(1);
                let tmp = self.s[usize::from(self.a)];
                self.b = self.b.wrapping_add(tmp);
                let tmp2 = self.s[usize::from(self.b)];
                self.s[usize::from(self.a)] = tmp2;
                self.s[usize::from(self.b)] = tmp;

                byte ^ self.s[usize::from(tmp.wrapping_add(tmp2))]
            })
            .collect()
    }
}

/// Apply RC4 with the given key to the data.
pub(crate) fn rc4(key: &[u8], data: &[u8]) -> Vec<u8> {
    Rc4::new(key).apply(data)
}

#[cfg(test)]
mod tests {
    use super::rc4;

    fn rc4_decrypt(key: &[u8], input: &[u8]) -> Vec<u8> {
        rc4(key, input)
    }

    #[test]
    fn known_answers() {
        assert_eq!(rc4_decrypt(b"a", &[0x68]), b"x");
        assert_eq!(rc4_decrypt(b"key", &[0x7F, 0x09, 0x47, 0x99]), b"test");
        assert_eq!(
            rc4_decrypt(b"hello", &[0x78, 0x3E, 0xCD, 0x96, 0xCF]),
            b"world"
        );
        assert_eq!(rc4_decrypt(b"\x01\x02", &[0x0C, 0x74, 0xB9]), b"Hi!");
        assert_eq!(rc4_decrypt(b"secret", &[0x80, 0x45, 0xB5]), b"msg");

        assert_eq!(
            rc4_decrypt(
                b"encryption",
                &[
                    0x8A, 0x36, 0x3F, 0x85, 0xDB, 0x9A, 0x62, 0x7C, 0x6C, 0x56, 0x81, 0x89
                ]
            ),
            b"Hello World!"
        );
    }

    #[test]
    fn apply_twice_is_identity() {
        let data = b"PDF uses RC4 for security";
        assert_eq!(rc4(b"key", &rc4(b"key", data)), data);
    }
}
