//! Configuring how a document is cleaned.

use crate::error::{Error, Result};
use rinse_syntax::crypto::{EncryptionAlgorithm, normalize_permissions};
use rinse_write::WriteSettings;
use std::fmt;
use std::str::FromStr;

/// How the output is encrypted.
#[allow(non_camel_case_types)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum EncryptionMethod {
    /// Encrypt the output in the same way as the input. An unencrypted input stays
    /// unencrypted.
    #[default]
    Keep,
    /// Write an unencrypted output.
    None,
    /// RC4 with a 40-bit key.
    Rc4_40,
    /// RC4 with a 128-bit key.
    Rc4_128,
    /// AES with a 128-bit key.
    Aes128,
    /// AES with a 256-bit key.
    Aes256,
}

impl EncryptionMethod {
    /// The algorithm used for a new encryption, or `None` if no new encryption is set up.
    pub fn algorithm(self) -> Option<EncryptionAlgorithm> {
        match self {
            Self::Keep | Self::None => None,
            Self::Rc4_40 => Some(EncryptionAlgorithm::Rc4_40),
            Self::Rc4_128 => Some(EncryptionAlgorithm::Rc4_128),
            Self::Aes128 => Some(EncryptionAlgorithm::Aes128),
            Self::Aes256 => Some(EncryptionAlgorithm::Aes256),
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Keep => "keep",
            Self::None => "none",
            Self::Rc4_40 => "rc4-40",
            Self::Rc4_128 => "rc4-128",
            Self::Aes128 => "aes-128",
            Self::Aes256 => "aes-256",
        }
    }
}

impl FromStr for EncryptionMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let method = match s {
            "keep" => Self::Keep,
            "none" => Self::None,
            "rc4-40" => Self::Rc4_40,
            "rc4-128" => Self::Rc4_128,
            "aes-128" => Self::Aes128,
            "aes-256" => Self::Aes256,
            _ => {
                return Err(Error::EncryptionConfig(format!(
                    "unknown encryption method `{s}`"
                )));
            }
        };

        Ok(method)
    }
}

impl fmt::Display for EncryptionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Whether appearance streams are generated for annotations.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum AppearanceMode {
    /// Leave appearance streams alone.
    #[default]
    None,
    /// Generate appearance streams for annotations that don't have a normal appearance.
    CreateMissing,
    /// Replace the appearance streams of all supported annotations.
    RecreateAll,
}

/// How aggressively unused and duplicate objects are removed.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GarbageLevel {
    /// Keep all objects.
    #[default]
    None,
    /// Remove unreachable objects.
    Sweep,
    /// Also renumber the remaining objects densely.
    Compact,
    /// Also merge structurally identical objects.
    Merge,
    /// Also merge streams with identical decoded payloads.
    StreamCheck,
}

impl GarbageLevel {
    /// Convert a numeric level. Levels above 4 are clamped.
    pub fn from_level(level: u8) -> Self {
        match level {
            0 => Self::None,
            1 => Self::Sweep,
            2 => Self::Compact,
            3 => Self::Merge,
            _ => Self::StreamCheck,
        }
    }
}

/// Whether and how content streams are rewritten.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub enum SanitizeMode {
    /// Content streams are left alone.
    #[default]
    Off,
    /// Unbalanced operators are dropped.
    Clean,
    /// Also drop operators with the wrong number of operands or in the wrong context.
    Strict,
}

/// The options for cleaning a document.
///
/// The default options rewrite the document without changing anything beyond its file
/// structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanOptions {
    /// Decode existing stream filters, except image codecs.
    pub decompress: bool,
    /// Flate-compress unfiltered streams that are neither fonts nor images.
    pub compress: bool,
    /// Flate-compress unfiltered font streams.
    pub compress_fonts: bool,
    /// Flate-compress unfiltered image streams.
    pub compress_images: bool,
    /// Hex-encode binary stream data.
    pub ascii: bool,
    /// The garbage collection level from 0 to 4. Higher values are clamped.
    pub garbage: u8,
    /// Linearize the output. Not supported, only reported as a diagnostic.
    pub linearize: bool,
    /// Drop unbalanced operators from content streams.
    pub clean: bool,
    /// Like `clean`, but also drop operators that are malformed or out of context.
    pub sanitize: bool,
    /// Whether to generate annotation appearance streams.
    pub appearance: AppearanceMode,
    /// Keep the document metadata stream and never recompress it.
    pub preserve_metadata: bool,
    /// Pack small objects into object streams.
    pub object_streams: bool,
    /// Write a human-readable file.
    pub pretty: bool,
    /// How to encrypt the output.
    pub encryption: EncryptionMethod,
    /// The owner password of a new encryption.
    pub owner_password: String,
    /// The user password of a new encryption.
    pub user_password: String,
    /// The permissions of a new encryption, as the `P` value of the encryption dictionary.
    pub permissions: i32,
    /// The password to open an encrypted input with.
    pub input_password: String,
    /// The 1-based pages to keep, in output order. Pages may be repeated.
    pub pages: Option<Vec<usize>>,
}

impl Default for CleanOptions {
    fn default() -> Self {
        Self {
            decompress: false,
            compress: false,
            compress_fonts: false,
            compress_images: false,
            ascii: false,
            garbage: 0,
            linearize: false,
            clean: false,
            sanitize: false,
            appearance: AppearanceMode::None,
            preserve_metadata: false,
            object_streams: false,
            pretty: false,
            encryption: EncryptionMethod::Keep,
            owner_password: String::new(),
            user_password: String::new(),
            permissions: -1,
            input_password: String::new(),
            pages: None,
        }
    }
}

impl CleanOptions {
    /// Check the options for consistency and derive the settings used by the pipeline.
    pub fn validate(&self) -> Result<Settings> {
        let algorithm = self.encryption.algorithm();

        let permissions = match algorithm {
            None => {
                if !self.owner_password.is_empty() || !self.user_password.is_empty() {
                    return Err(Error::EncryptionConfig(format!(
                        "passwords can't be set with encryption method `{}`",
                        self.encryption
                    )));
                }

                if self.permissions != -1 {
                    return Err(Error::EncryptionConfig(format!(
                        "permissions can't be set with encryption method `{}`",
                        self.encryption
                    )));
                }

                self.permissions
            }
            Some(algorithm) => {
                let max = algorithm.max_password_len();

                for (kind, password) in [
                    ("owner", &self.owner_password),
                    ("user", &self.user_password),
                ] {
                    if password.len() > max {
                        return Err(Error::EncryptionConfig(format!(
                            "the {kind} password is longer than {max} bytes"
                        )));
                    }
                }

                if algorithm == EncryptionAlgorithm::Rc4_40 && self.permissions & 0x0F00 != 0x0F00
                {
                    return Err(Error::EncryptionConfig(
                        "rc4-40 can't restrict permissions beyond bit 8".to_string(),
                    ));
                }

                normalize_permissions(self.permissions, algorithm.revision())
            }
        };

        let sanitize = if self.sanitize {
            SanitizeMode::Strict
        } else if self.clean {
            SanitizeMode::Clean
        } else {
            SanitizeMode::Off
        };

        Ok(Settings {
            decompress: self.decompress,
            compress: self.compress,
            compress_fonts: self.compress_fonts,
            compress_images: self.compress_images,
            ascii: self.ascii,
            garbage: GarbageLevel::from_level(self.garbage),
            linearize: self.linearize,
            sanitize,
            appearance: self.appearance,
            preserve_metadata: self.preserve_metadata,
            object_streams: self.object_streams,
            pretty: self.pretty || (self.decompress && self.ascii && !self.compress),
            encryption: self.encryption,
            owner_password: self.owner_password.as_bytes().to_vec(),
            user_password: self.user_password.as_bytes().to_vec(),
            permissions,
            input_password: self.input_password.as_bytes().to_vec(),
            pages: self.pages.clone().filter(|p| !p.is_empty()),
        })
    }
}

/// Validated options, with all derived values computed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Decode existing stream filters.
    pub decompress: bool,
    /// Compress streams that are neither fonts nor images.
    pub compress: bool,
    /// Compress font streams.
    pub compress_fonts: bool,
    /// Compress image streams.
    pub compress_images: bool,
    /// Hex-encode binary stream data.
    pub ascii: bool,
    /// The garbage collection level.
    pub garbage: GarbageLevel,
    /// Whether linearization was requested.
    pub linearize: bool,
    /// How content streams are rewritten.
    pub sanitize: SanitizeMode,
    /// Whether appearance streams are generated.
    pub appearance: AppearanceMode,
    /// Keep the metadata stream.
    pub preserve_metadata: bool,
    /// Use object streams.
    pub object_streams: bool,
    /// Write a human-readable file.
    pub pretty: bool,
    /// How the output is encrypted.
    pub encryption: EncryptionMethod,
    /// The owner password.
    pub owner_password: Vec<u8>,
    /// The user password.
    pub user_password: Vec<u8>,
    /// The normalized permissions.
    pub permissions: i32,
    /// The password for the input.
    pub input_password: Vec<u8>,
    /// The pages to keep. Never empty.
    pub pages: Option<Vec<usize>>,
}

impl Settings {
    /// The settings for the writer.
    pub fn write_settings(&self) -> WriteSettings {
        WriteSettings {
            pretty: self.pretty,
            compress_structure: self.compress,
        }
    }
}
