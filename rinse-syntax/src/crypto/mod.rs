//! The standard security handler.
//!
//! A [`SecurityHandler`] is either opened from the `/Encrypt` dictionary of an existing
//! document (authenticating a password in the process), or created from scratch for one of
//! the supported [`EncryptionAlgorithm`]s. Both kinds can decrypt and encrypt the strings
//! and streams of indirect objects.

use crate::object::dict::keys::{
    AESV2, AESV3, CF, CFM, CRYPT, DECODE_PARMS, ENCRYPT_META_DATA, FILTER, IDENTITY, LENGTH,
    METADATA, NAME, O, OE, P, PERMS, R, STANDARD, STD_CF, STM_F, STR_F, TYPE, U, UE, V, V2, XREF,
};
use crate::object::{Dict, Name, ObjRef, Object, PdfString};
use log::warn;
use std::fmt;

mod aes;
mod hash;
mod rc4;

use rc4::rc4;

const PASSWORD_PADDING: [u8; 32] = [
    0x28, 0xBF, 0x4E, 0x5E, 0x4E, 0x75, 0x8A, 0x41, 0x64, 0x00, 0x4E, 0x56, 0xFF, 0xFA, 0x01, 0x08,
    0x2E, 0x2E, 0x00, 0xB6, 0xD0, 0x68, 0x3E, 0x80, 0x2F, 0x0C, 0xA9, 0xFE, 0x64, 0x53, 0x69, 0x7A,
];

/// The maximum length of a password for revisions 2 to 4.
pub const MAX_LEGACY_PASSWORD_LEN: usize = 32;
/// The maximum length of a password for the AES-256 handler.
pub const MAX_AES256_PASSWORD_LEN: usize = 127;

/// An error that occurred while opening a security handler.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DecryptionError {
    /// The encryption dictionary is missing required entries or is inconsistent.
    InvalidEncryption,
    /// The document uses a security handler or algorithm that is not supported.
    UnsupportedAlgorithm,
    /// Neither the user nor the owner password matched.
    IncorrectPassword,
}

impl fmt::Display for DecryptionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidEncryption => write!(f, "invalid encryption dictionary"),
            Self::UnsupportedAlgorithm => write!(f, "unsupported encryption algorithm"),
            Self::IncorrectPassword => write!(f, "incorrect password"),
        }
    }
}

impl core::error::Error for DecryptionError {}

/// An encryption algorithm of the standard security handler.
#[allow(non_camel_case_types)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum EncryptionAlgorithm {
    /// RC4 with a 40-bit key (revision 2).
    Rc4_40,
    /// RC4 with a 128-bit key (revision 3).
    Rc4_128,
    /// AES-128 in CBC mode (revision 4).
    Aes128,
    /// AES-256 in CBC mode (revision 6).
    Aes256,
}

impl EncryptionAlgorithm {
    /// The revision of the standard security handler used for this algorithm.
    pub fn revision(self) -> u8 {
        match self {
            Self::Rc4_40 => 2,
            Self::Rc4_128 => 3,
            Self::Aes128 => 4,
            Self::Aes256 => 6,
        }
    }

    fn version(self) -> i64 {
        match self {
            Self::Rc4_40 => 1,
            Self::Rc4_128 => 2,
            Self::Aes128 => 4,
            Self::Aes256 => 5,
        }
    }

    fn key_len(self) -> usize {
        match self {
            Self::Rc4_40 => 5,
            Self::Rc4_128 | Self::Aes128 => 16,
            Self::Aes256 => 32,
        }
    }

    /// The maximum accepted password length in bytes.
    pub fn max_password_len(self) -> usize {
        match self {
            Self::Aes256 => MAX_AES256_PASSWORD_LEN,
            _ => MAX_LEGACY_PASSWORD_LEN,
        }
    }
}

/// Whether data belongs to a string or a stream.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CryptTarget {
    /// A string object.
    String,
    /// The payload of a stream.
    Stream,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Cipher {
    Identity,
    Rc4,
    Aes128,
    Aes256,
}

impl Cipher {
    fn from_cfm(name: &[u8]) -> Result<Self, DecryptionError> {
        match name {
            b"None" | IDENTITY => Ok(Self::Identity),
            V2 => Ok(Self::Rc4),
            AESV2 => Ok(Self::Aes128),
            AESV3 => Ok(Self::Aes256),
            _ => Err(DecryptionError::UnsupportedAlgorithm),
        }
    }
}

/// Normalize a permission value so that all reserved bits have their required values.
///
/// Revision 2 has no notion of the extended permissions in bits 9 to 12, so they are set.
pub fn normalize_permissions(permissions: i32, revision: u8) -> i32 {
    let mut p = (permissions as u32 | 0xFFFF_F0C0) & !3;

    if revision == 2 {
        p |= 0x0F00;
    }

    p as i32
}

/// The standard security handler of a document.
#[derive(Debug, Clone)]
pub struct SecurityHandler {
    revision: u8,
    key: Vec<u8>,
    string_cipher: Cipher,
    stream_cipher: Cipher,
    encrypt_metadata: bool,
    permissions: i32,
    dict: Dict,
    file_id: Vec<u8>,
}

impl SecurityHandler {
    /// Open the security handler described by an `/Encrypt` dictionary.
    ///
    /// `id` is the first element of the trailer's `/ID` array. The password is tried as
    /// the user password first and as the owner password second.
    pub fn open(dict: &Dict, id: &[u8], password: &[u8]) -> Result<Self, DecryptionError> {
        let filter = dict
            .get_name(FILTER)
            .ok_or(DecryptionError::InvalidEncryption)?;

        if &**filter != STANDARD {
            return Err(DecryptionError::UnsupportedAlgorithm);
        }

        let version = dict.get_i64(V).unwrap_or(0);
        let revision = dict
            .get_i64(R)
            .and_then(|r| u8::try_from(r).ok())
            .ok_or(DecryptionError::InvalidEncryption)?;
        let encrypt_metadata = dict.get_bool(ENCRYPT_META_DATA).unwrap_or(true);

        let length = match version {
            1 => 40,
            2 => dict.get_i64(LENGTH).unwrap_or(40),
            4 => dict.get_i64(LENGTH).unwrap_or(128),
            5 => 256,
            _ => return Err(DecryptionError::UnsupportedAlgorithm),
        };

        if !(40..=256).contains(&length) || length % 8 != 0 {
            return Err(DecryptionError::InvalidEncryption);
        }

        let (string_cipher, stream_cipher) = match version {
            1 | 2 => (Cipher::Rc4, Cipher::Rc4),
            _ => (
                crypt_filter_cipher(dict, STR_F)?,
                crypt_filter_cipher(dict, STM_F)?,
            ),
        };

        let owner = dict.get_string(O).ok_or(DecryptionError::InvalidEncryption)?;
        let user = dict.get_string(U).ok_or(DecryptionError::InvalidEncryption)?;
        let permissions = dict
            .get_i64(P)
            .map(|p| p as i32)
            .ok_or(DecryptionError::InvalidEncryption)?;

        let mut key = match revision {
            2..=4 => {
                let key_len = if revision == 2 {
                    5
                } else {
                    (length / 8) as usize
                };
                let params = LegacyParams {
                    revision,
                    key_len,
                    owner,
                    permissions,
                    id,
                    encrypt_metadata,
                };

                authenticate_legacy(&params, user, password)?
            }
            5 | 6 => authenticate_aes256(dict, revision, owner, user, password)?,
            _ => return Err(DecryptionError::UnsupportedAlgorithm),
        };

        if version == 4 && key.len() < 16 {
            key.resize(16, 0);
        }

        if revision == 6 {
            check_perms(dict, &key, permissions);
        }

        Ok(Self {
            revision,
            key,
            string_cipher,
            stream_cipher,
            encrypt_metadata,
            permissions,
            dict: dict.clone(),
            file_id: id.to_vec(),
        })
    }

    /// Create a new security handler for the given algorithm and passwords.
    ///
    /// The permissions are normalized, and `id` must be the first element of the
    /// trailer's `/ID` array of the document that is going to be written. Passwords are
    /// truncated to the length the algorithm supports.
    pub fn create(
        algorithm: EncryptionAlgorithm,
        owner_password: &[u8],
        user_password: &[u8],
        permissions: i32,
        id: &[u8],
    ) -> Self {
        let revision = algorithm.revision();
        let key_len = algorithm.key_len();
        let permissions = normalize_permissions(permissions, revision);

        let mut dict = Dict::new();
        dict.insert(FILTER, Name::new(STANDARD));
        dict.insert(V, algorithm.version());
        dict.insert(R, i64::from(revision));
        dict.insert(P, i64::from(permissions));

        let (key, cipher) = match algorithm {
            EncryptionAlgorithm::Aes256 => {
                let owner_password = truncate(owner_password, MAX_AES256_PASSWORD_LEN);
                let user_password = truncate(user_password, MAX_AES256_PASSWORD_LEN);
                let key = rand::random::<[u8; 32]>().to_vec();
                let values = create_aes256_values(&key, owner_password, user_password, permissions);

                dict.insert(LENGTH, 256_i64);
                dict.insert(O, PdfString::new_hex(values.owner));
                dict.insert(OE, PdfString::new_hex(values.owner_key));
                dict.insert(U, PdfString::new_hex(values.user));
                dict.insert(UE, PdfString::new_hex(values.user_key));
                dict.insert(PERMS, PdfString::new_hex(values.perms));

                (key, Cipher::Aes256)
            }
            _ => {
                let owner_password = truncate(owner_password, MAX_LEGACY_PASSWORD_LEN);
                let user_password = truncate(user_password, MAX_LEGACY_PASSWORD_LEN);
                let owner = owner_value(revision, key_len, owner_password, user_password);
                let params = LegacyParams {
                    revision,
                    key_len,
                    owner: &owner,
                    permissions,
                    id,
                    encrypt_metadata: true,
                };
                let key = file_key(&params, user_password);
                let user = user_value(revision, &key, id);

                dict.insert(LENGTH, (key_len * 8) as i64);
                dict.insert(O, PdfString::new_hex(owner));
                dict.insert(U, PdfString::new_hex(user));

                let cipher = if algorithm == EncryptionAlgorithm::Aes128 {
                    Cipher::Aes128
                } else {
                    Cipher::Rc4
                };

                (key, cipher)
            }
        };

        if matches!(
            algorithm,
            EncryptionAlgorithm::Aes128 | EncryptionAlgorithm::Aes256
        ) {
            let (cfm, length) = if algorithm == EncryptionAlgorithm::Aes128 {
                (AESV2, 16_i64)
            } else {
                (AESV3, 32_i64)
            };

            let mut std_cf = Dict::new();
            std_cf.insert(TYPE, Name::new(b"CryptFilter"));
            std_cf.insert(CFM, Name::new(cfm));
            std_cf.insert(b"AuthEvent", Name::new(b"DocOpen"));
            std_cf.insert(LENGTH, length);

            let mut cf = Dict::new();
            cf.insert(STD_CF, std_cf);

            dict.insert(CF, cf);
            dict.insert(STM_F, Name::new(STD_CF));
            dict.insert(STR_F, Name::new(STD_CF));
        }

        Self {
            revision,
            key,
            string_cipher: cipher,
            stream_cipher: cipher,
            encrypt_metadata: true,
            permissions,
            dict,
            file_id: id.to_vec(),
        }
    }

    /// The `/Encrypt` dictionary describing this handler.
    pub fn dict(&self) -> &Dict {
        &self.dict
    }

    /// The revision of the handler.
    pub fn revision(&self) -> u8 {
        self.revision
    }

    /// The permission flags.
    pub fn permissions(&self) -> i32 {
        self.permissions
    }

    /// Whether XMP metadata streams are encrypted.
    pub fn encrypt_metadata(&self) -> bool {
        self.encrypt_metadata
    }

    /// The file encryption key.
    pub fn key(&self) -> &[u8] {
        &self.key
    }

    /// The first element of the file identifier the handler was set up with. Empty if the
    /// document had no identifier.
    pub fn file_id(&self) -> &[u8] {
        &self.file_id
    }

    /// The algorithm that best describes this handler, used to determine the minimum
    /// PDF version of a document using it.
    pub fn algorithm(&self) -> EncryptionAlgorithm {
        let ciphers = [self.string_cipher, self.stream_cipher];

        if ciphers.contains(&Cipher::Aes256) {
            EncryptionAlgorithm::Aes256
        } else if ciphers.contains(&Cipher::Aes128) {
            EncryptionAlgorithm::Aes128
        } else if self.key.len() > 5 {
            EncryptionAlgorithm::Rc4_128
        } else {
            EncryptionAlgorithm::Rc4_40
        }
    }

    /// Decrypt data belonging to the object with the given reference.
    pub fn decrypt(&self, id: ObjRef, data: &[u8], target: CryptTarget) -> Vec<u8> {
        match self.cipher(target) {
            Cipher::Identity => data.to_vec(),
            Cipher::Rc4 => rc4(&self.object_key(id, false), data),
            Cipher::Aes128 => decrypt_aes(&self.object_key(id, true), data),
            Cipher::Aes256 => decrypt_aes(&self.key, data),
        }
    }

    /// Encrypt data belonging to the object with the given reference.
    ///
    /// AES encryption uses a fresh random initialization vector every time.
    pub fn encrypt(&self, id: ObjRef, data: &[u8], target: CryptTarget) -> Vec<u8> {
        match self.cipher(target) {
            Cipher::Identity => data.to_vec(),
            Cipher::Rc4 => rc4(&self.object_key(id, false), data),
            Cipher::Aes128 => encrypt_aes(&self.object_key(id, true), data),
            Cipher::Aes256 => encrypt_aes(&self.key, data),
        }
    }

    /// Decrypt all strings and the stream payload of an indirect object in place.
    pub fn decrypt_object(&self, id: ObjRef, object: &mut Object) {
        self.apply_object(id, object, Self::decrypt);
    }

    /// Encrypt all strings and the stream payload of an indirect object in place.
    pub fn encrypt_object(&self, id: ObjRef, object: &mut Object) {
        self.apply_object(id, object, Self::encrypt);
    }

    fn apply_object(
        &self,
        id: ObjRef,
        object: &mut Object,
        op: impl Fn(&Self, ObjRef, &[u8], CryptTarget) -> Vec<u8>,
    ) {
        object.for_each_string_mut(&mut |s| {
            let data = op(self, id, s.as_bytes(), CryptTarget::String);
            s.set_bytes(data);
        });

        if let Object::Stream(stream) = object
            && self.stream_is_encrypted(&stream.dict)
        {
            stream.data = op(self, id, &stream.data, CryptTarget::Stream);
        }
    }

    fn stream_is_encrypted(&self, dict: &Dict) -> bool {
        if dict.has_type(XREF) {
            return false;
        }

        if !self.encrypt_metadata && dict.has_type(METADATA) {
            return false;
        }

        !has_identity_crypt_filter(dict)
    }

    fn cipher(&self, target: CryptTarget) -> Cipher {
        match target {
            CryptTarget::String => self.string_cipher,
            CryptTarget::Stream => self.stream_cipher,
        }
    }

    /// Algorithm 1: derive the key for a single object.
    fn object_key(&self, id: ObjRef, aes: bool) -> Vec<u8> {
        let n = self.key.len();
        let mut input = self.key.clone();
        input.extend_from_slice(&id.num.to_le_bytes()[..3]);
        input.extend_from_slice(&id.generation.to_le_bytes());

        if aes {
            input.extend_from_slice(b"sAlT");
        }

        let hash = md5::compute(&input).0;
        hash[..(n + 5).min(16)].to_vec()
    }
}

fn crypt_filter_cipher(dict: &Dict, key: &[u8]) -> Result<Cipher, DecryptionError> {
    let Some(name) = dict.get_name(key) else {
        return Ok(Cipher::Identity);
    };

    if &**name == IDENTITY {
        return Ok(Cipher::Identity);
    }

    let filter = dict
        .get_dict(CF)
        .and_then(|cf| cf.get_dict(name))
        .ok_or(DecryptionError::InvalidEncryption)?;

    match filter.get_name(CFM) {
        Some(cfm) => Cipher::from_cfm(cfm),
        None => Ok(Cipher::Identity),
    }
}

fn has_identity_crypt_filter(dict: &Dict) -> bool {
    let first_filter = match dict.get(FILTER) {
        Some(Object::Name(n)) => Some(n),
        Some(Object::Array(a)) => a.first().and_then(Object::as_name),
        _ => None,
    };

    if first_filter.is_none_or(|n| &**n != CRYPT) {
        return false;
    }

    let params = match dict.get(DECODE_PARMS) {
        Some(Object::Dict(d)) => Some(d),
        Some(Object::Array(a)) => a.first().and_then(Object::as_dict),
        _ => None,
    };

    params
        .and_then(|p| p.get_name(NAME))
        .is_none_or(|n| &**n == IDENTITY)
}

fn truncate(password: &[u8], max: usize) -> &[u8] {
    &password[..password.len().min(max)]
}

fn pad_password(password: &[u8]) -> [u8; 32] {
    let password = truncate(password, 32);
    let mut padded = PASSWORD_PADDING;
    padded[..password.len()].copy_from_slice(password);
    padded[password.len()..].copy_from_slice(&PASSWORD_PADDING[..32 - password.len()]);
    padded
}

fn xor_key(key: &[u8], value: u8) -> Vec<u8> {
    key.iter().map(|b| b ^ value).collect()
}

fn decrypt_aes(key: &[u8], data: &[u8]) -> Vec<u8> {
    let Some((iv, data)) = data.split_first_chunk::<16>() else {
        warn!("encrypted data is shorter than an AES block");
        return vec![];
    };

    if let Some(decrypted) = aes::decrypt_cbc(key, iv, data, true) {
        return decrypted;
    }

    match aes::decrypt_cbc(key, iv, data, false) {
        Some(decrypted) => {
            warn!("invalid AES padding, keeping the data unpadded");
            decrypted
        }
        None => {
            warn!("failed to decrypt AES data");
            vec![]
        }
    }
}

fn encrypt_aes(key: &[u8], data: &[u8]) -> Vec<u8> {
    let iv = rand::random::<[u8; 16]>();
    let mut out = iv.to_vec();
    // Keys are always 16 or 32 bytes long and padding accepts any input length.
    out.extend(aes::encrypt_cbc(key, &iv, data, true).unwrap_or_default());
    out
}

struct LegacyParams<'a> {
    revision: u8,
    key_len: usize,
    owner: &'a [u8],
    permissions: i32,
    id: &'a [u8],
    encrypt_metadata: bool,
}

/// Algorithm 2: compute the file encryption key from a user password.
fn file_key(params: &LegacyParams<'_>, user_password: &[u8]) -> Vec<u8> {
    let mut input = pad_password(user_password).to_vec();
    input.extend_from_slice(params.owner);
    input.extend_from_slice(&params.permissions.to_le_bytes());
    input.extend_from_slice(params.id);

    if params.revision >= 4 && !params.encrypt_metadata {
        input.extend_from_slice(&[0xFF; 4]);
    }

    let n = params.key_len.min(16);
    let mut hash = md5::compute(&input).0;

    if params.revision >= 3 {
        for _ in 0..50 {
            hash = md5::compute(&hash[..n]).0;
        }
    }

    hash[..n].to_vec()
}

/// The RC4 key used to compute or unwrap the `O` value (steps a to d of Algorithm 3).
fn owner_key(revision: u8, key_len: usize, owner_password: &[u8]) -> Vec<u8> {
    let mut hash = md5::compute(pad_password(owner_password)).0;

    if revision >= 3 {
        for _ in 0..50 {
            hash = md5::compute(hash).0;
        }
    }

    let n = if revision == 2 { 5 } else { key_len.min(16) };
    hash[..n].to_vec()
}

/// Algorithm 3: compute the `O` value.
fn owner_value(
    revision: u8,
    key_len: usize,
    owner_password: &[u8],
    user_password: &[u8],
) -> Vec<u8> {
    let owner_password = if owner_password.is_empty() {
        user_password
    } else {
        owner_password
    };

    let key = owner_key(revision, key_len, owner_password);
    let mut value = rc4(&key, &pad_password(user_password));

    if revision >= 3 {
        for i in 1..=19 {
            value = rc4(&xor_key(&key, i), &value);
        }
    }

    value
}

/// Algorithms 4 and 5: compute the `U` value.
fn user_value(revision: u8, key: &[u8], id: &[u8]) -> Vec<u8> {
    if revision == 2 {
        return rc4(key, &PASSWORD_PADDING);
    }

    let mut input = PASSWORD_PADDING.to_vec();
    input.extend_from_slice(id);
    let hash = md5::compute(&input).0;

    let mut value = rc4(key, &hash);
    for i in 1..=19 {
        value = rc4(&xor_key(key, i), &value);
    }

    value.resize(32, 0);
    value
}

/// Algorithm 6: check a user password, returning the file key on success.
fn check_user_password(params: &LegacyParams<'_>, user: &[u8], password: &[u8]) -> Option<Vec<u8>> {
    let key = file_key(params, password);
    let expected = user_value(params.revision, &key, params.id);

    let matches = if params.revision == 2 {
        user.get(..32) == Some(&expected[..])
    } else {
        user.get(..16) == Some(&expected[..16])
    };

    matches.then_some(key)
}

fn authenticate_legacy(
    params: &LegacyParams<'_>,
    user: &[u8],
    password: &[u8],
) -> Result<Vec<u8>, DecryptionError> {
    let password = truncate(password, MAX_LEGACY_PASSWORD_LEN);

    if let Some(key) = check_user_password(params, user, password) {
        return Ok(key);
    }

    // Algorithm 7: unwrap the user password from the `O` value using the password as the
    // owner password, then check it like a user password.
    let key = owner_key(params.revision, params.key_len, password);
    let user_password = if params.revision == 2 {
        rc4(&key, params.owner)
    } else {
        let mut value = params.owner.to_vec();
        for i in (0..=19).rev() {
            value = rc4(&xor_key(&key, i), &value);
        }
        value
    };

    check_user_password(params, user, &user_password).ok_or(DecryptionError::IncorrectPassword)
}

fn split_aes256_value(value: &[u8]) -> Result<(&[u8], &[u8], &[u8]), DecryptionError> {
    let value = value.get(..48).ok_or(DecryptionError::InvalidEncryption)?;
    Ok((&value[..32], &value[32..40], &value[40..48]))
}

/// Algorithm 2.A: retrieve the file key for revisions 5 and 6.
fn authenticate_aes256(
    dict: &Dict,
    revision: u8,
    owner: &[u8],
    user: &[u8],
    password: &[u8],
) -> Result<Vec<u8>, DecryptionError> {
    let password = truncate(password, MAX_AES256_PASSWORD_LEN);
    let (owner_hash, owner_validation_salt, owner_key_salt) = split_aes256_value(owner)?;
    let (user_hash, user_validation_salt, user_key_salt) = split_aes256_value(user)?;
    let user = &user[..48];

    let compute = |salt: &[u8], user_key: Option<&[u8]>| {
        hash::compute_hash(password, salt, user_key, revision)
            .ok_or(DecryptionError::InvalidEncryption)
    };

    let (intermediate, wrapped) =
        if compute(owner_validation_salt, Some(user))?.as_slice() == owner_hash {
            (compute(owner_key_salt, Some(user))?, OE)
        } else if compute(user_validation_salt, None)?.as_slice() == user_hash {
            (compute(user_key_salt, None)?, UE)
        } else {
            return Err(DecryptionError::IncorrectPassword);
        };

    let wrapped = dict
        .get_string(wrapped)
        .filter(|w| w.len() == 32)
        .ok_or(DecryptionError::InvalidEncryption)?;

    aes::decrypt_cbc(&intermediate, &[0; 16], wrapped, false)
        .ok_or(DecryptionError::InvalidEncryption)
}

fn check_perms(dict: &Dict, key: &[u8], permissions: i32) {
    let decrypted = dict
        .get_string(PERMS)
        .and_then(|perms| aes::decrypt_ecb_256(key, perms.get(..16)?));

    match decrypted {
        Some(block) if &block[9..12] == b"adb" => {
            if block[..4] != permissions.to_le_bytes() {
                warn!("Perms entry does not match the P entry");
            }
        }
        _ => warn!("invalid Perms entry in encryption dictionary"),
    }
}

struct Aes256Values {
    owner: Vec<u8>,
    owner_key: Vec<u8>,
    user: Vec<u8>,
    user_key: Vec<u8>,
    perms: Vec<u8>,
}

/// Algorithms 8, 9 and 10: compute the `U`, `UE`, `O`, `OE` and `Perms` values.
fn create_aes256_values(
    key: &[u8],
    owner_password: &[u8],
    user_password: &[u8],
    permissions: i32,
) -> Aes256Values {
    let wrap = |intermediate: Option<[u8; 32]>| {
        intermediate
            .and_then(|k| aes::encrypt_cbc(&k, &[0; 16], key, false))
            .unwrap_or_default()
    };

    let user_salts = rand::random::<[u8; 16]>();
    let (user_validation_salt, user_key_salt) = user_salts.split_at(8);
    let mut user = hash::compute_hash(user_password, user_validation_salt, None, 6)
        .map(|h| h.to_vec())
        .unwrap_or_default();
    user.extend_from_slice(&user_salts);
    let user_key = wrap(hash::compute_hash(user_password, user_key_salt, None, 6));

    let owner_salts = rand::random::<[u8; 16]>();
    let (owner_validation_salt, owner_key_salt) = owner_salts.split_at(8);
    let mut owner = hash::compute_hash(owner_password, owner_validation_salt, Some(&user), 6)
        .map(|h| h.to_vec())
        .unwrap_or_default();
    owner.extend_from_slice(&owner_salts);
    let owner_key = wrap(hash::compute_hash(
        owner_password,
        owner_key_salt,
        Some(&user),
        6,
    ));

    let mut block = [0_u8; 16];
    block[..4].copy_from_slice(&permissions.to_le_bytes());
    block[4..8].copy_from_slice(&[0xFF; 4]);
    block[8] = b'T';
    block[9..12].copy_from_slice(b"adb");
    block[12..].copy_from_slice(&rand::random::<[u8; 4]>());
    let perms = aes::encrypt_ecb_256(key, &block)
        .map(|b| b.to_vec())
        .unwrap_or_default();

    Aes256Values {
        owner,
        owner_key,
        user,
        user_key,
        perms,
    }
}

#[cfg(test)]
mod tests {
    use super::{
        CryptTarget, DecryptionError, EncryptionAlgorithm, SecurityHandler, normalize_permissions,
    };
    use crate::object::dict::keys::{FILTER, LENGTH, METADATA, TYPE, XREF};
    use crate::object::{Dict, Name, ObjRef, Object, PdfString, Stream};

    const ID: &[u8] = b"0123456789abcdef";
    const ALGORITHMS: [EncryptionAlgorithm; 4] = [
        EncryptionAlgorithm::Rc4_40,
        EncryptionAlgorithm::Rc4_128,
        EncryptionAlgorithm::Aes128,
        EncryptionAlgorithm::Aes256,
    ];

    #[test]
    fn open_with_user_and_owner_password() {
        for alg in ALGORITHMS {
            let created = SecurityHandler::create(alg, b"owner", b"user", -4, ID);

            let user = SecurityHandler::open(created.dict(), ID, b"user").unwrap();
            assert_eq!(user.key(), created.key(), "{alg:?}");
            assert_eq!(user.revision(), alg.revision());
            assert_eq!(user.algorithm(), alg);

            let owner = SecurityHandler::open(created.dict(), ID, b"owner").unwrap();
            assert_eq!(owner.key(), created.key(), "{alg:?}");
        }
    }

    #[test]
    fn wrong_password() {
        for alg in ALGORITHMS {
            let created = SecurityHandler::create(alg, b"owner", b"user", -4, ID);

            assert_eq!(
                SecurityHandler::open(created.dict(), ID, b"nope").unwrap_err(),
                DecryptionError::IncorrectPassword,
                "{alg:?}"
            );
        }
    }

    #[test]
    fn empty_user_password() {
        for alg in ALGORITHMS {
            let created = SecurityHandler::create(alg, b"owner", b"", -4, ID);
            assert!(SecurityHandler::open(created.dict(), ID, b"").is_ok());
        }
    }

    #[test]
    fn different_id_breaks_legacy_key() {
        let created = SecurityHandler::create(EncryptionAlgorithm::Rc4_128, b"", b"", -4, ID);

        assert!(SecurityHandler::open(created.dict(), b"fedcba9876543210", b"").is_err());
    }

    #[test]
    fn unsupported_handler() {
        let mut dict = Dict::new();
        dict.insert(FILTER, Name::new(b"Adobe.PubSec"));

        assert_eq!(
            SecurityHandler::open(&dict, ID, b"").unwrap_err(),
            DecryptionError::UnsupportedAlgorithm
        );
    }

    #[test]
    fn object_round_trip() {
        for alg in ALGORITHMS {
            let handler = SecurityHandler::create(alg, b"", b"", -1, ID);
            let id = ObjRef::new(12, 0);

            let mut dict = Dict::new();
            dict.insert(b"Title", PdfString::new(b"Quarterly report".to_vec()));
            let original = Object::Stream(Stream::new(dict, b"BT /F1 12 Tf ET".to_vec()));

            let mut object = original.clone();
            handler.encrypt_object(id, &mut object);
            assert_ne!(object, original);

            handler.decrypt_object(id, &mut object);
            assert_eq!(object, original, "{alg:?}");
        }
    }

    #[test]
    fn object_key_depends_on_reference() {
        let handler = SecurityHandler::create(EncryptionAlgorithm::Rc4_128, b"", b"", -1, ID);

        assert_ne!(
            handler.encrypt(ObjRef::new(1, 0), b"text", CryptTarget::String),
            handler.encrypt(ObjRef::new(2, 0), b"text", CryptTarget::String)
        );
    }

    #[test]
    fn xref_and_metadata_streams() {
        let handler = SecurityHandler::create(EncryptionAlgorithm::Aes128, b"", b"", -1, ID);

        let mut dict = Dict::new();
        dict.insert(TYPE, Name::new(XREF));
        let mut xref = Object::Stream(Stream::new(dict, vec![1, 2, 3]));
        handler.encrypt_object(ObjRef::new(5, 0), &mut xref);
        assert_eq!(xref.as_stream().unwrap().data, vec![1, 2, 3]);

        let mut dict = Dict::new();
        dict.insert(TYPE, Name::new(METADATA));
        let mut metadata = Object::Stream(Stream::new(dict, vec![1, 2, 3]));
        handler.encrypt_object(ObjRef::new(6, 0), &mut metadata);
        assert_ne!(metadata.as_stream().unwrap().data, vec![1, 2, 3]);
    }

    #[test]
    fn aes_ciphertext_is_padded_and_prefixed() {
        let handler = SecurityHandler::create(EncryptionAlgorithm::Aes256, b"", b"", -1, ID);
        let encrypted = handler.encrypt(ObjRef::new(1, 0), b"", CryptTarget::String);

        assert_eq!(encrypted.len(), 32);
        assert!(handler
            .decrypt(ObjRef::new(1, 0), &encrypted, CryptTarget::String)
            .is_empty());
    }

    #[test]
    fn permissions() {
        assert_eq!(normalize_permissions(0, 3), 0xFFFF_F0C0_u32 as i32);
        assert_eq!(normalize_permissions(-1, 4), -4);
        assert_eq!(normalize_permissions(0, 2), 0xFFFF_FFC0_u32 as i32);
    }

    #[test]
    fn created_dict_entries() {
        let handler = SecurityHandler::create(EncryptionAlgorithm::Rc4_40, b"o", b"u", -4, ID);
        assert_eq!(handler.dict().get_i64(LENGTH), Some(40));
        assert_eq!(handler.dict().get_string(b"O").map(<[u8]>::len), Some(32));
        assert_eq!(handler.dict().get_string(b"U").map(<[u8]>::len), Some(32));

        let handler = SecurityHandler::create(EncryptionAlgorithm::Aes256, b"o", b"u", -4, ID);
        assert_eq!(handler.dict().get_string(b"O").map(<[u8]>::len), Some(48));
        assert_eq!(handler.dict().get_string(b"OE").map(<[u8]>::len), Some(32));
        assert_eq!(handler.dict().get_string(b"Perms").map(<[u8]>::len), Some(16));
    }
}
