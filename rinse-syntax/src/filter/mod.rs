//! Decoding and encoding of stream filters.
//!
//! All general-purpose filters can be decoded. The image codecs (`DCTDecode`, `JPXDecode`,
//! `JBIG2Decode` and `CCITTFaxDecode`) are recognized but never decoded: rewriting a document
//! must not re-encode images, so streams using them keep these filters.

mod ascii_85;
mod ascii_hex;
mod lzw_flate;
mod run_length;

pub use lzw_flate::flate;

use crate::object::dict::keys::*;
use crate::object::{Dict, Name, Stream};
use std::fmt;

/// A stream filter.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Filter {
    /// `ASCIIHexDecode`.
    AsciiHexDecode,
    /// `ASCII85Decode`.
    Ascii85Decode,
    /// `LZWDecode`.
    LzwDecode,
    /// `FlateDecode`.
    FlateDecode,
    /// `RunLengthDecode`.
    RunLengthDecode,
    /// `CCITTFaxDecode`.
    CcittFaxDecode,
    /// `JBIG2Decode`.
    Jbig2Decode,
    /// `DCTDecode`.
    DctDecode,
    /// `JPXDecode`.
    JpxDecode,
    /// `Crypt`.
    Crypt,
}

/// An error that occurred while decoding a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    /// The filter name is not a known filter.
    Unknown(Name),
    /// The filter is an image codec, which is not decoded.
    Unsupported(Filter),
    /// The data is corrupt.
    Corrupt(Filter),
}

impl fmt::Display for FilterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown(name) => write!(f, "unknown filter /{}", name.as_str()),
            Self::Unsupported(filter) => write!(f, "filter /{} is not decoded", filter.name()),
            Self::Corrupt(filter) => write!(f, "corrupt /{} data", filter.name()),
        }
    }
}

impl core::error::Error for FilterError {}

impl FilterError {
    /// The name of the filter that caused the error.
    pub fn filter_name(&self) -> &str {
        match self {
            Self::Unknown(name) => name.as_str(),
            Self::Unsupported(filter) | Self::Corrupt(filter) => filter.name(),
        }
    }
}

impl Filter {
    /// Look up a filter by its name, including the abbreviations used in inline images.
    pub fn from_name(name: &Name) -> Result<Self, FilterError> {
        let filter = match &**name {
            ASCII_HEX_DECODE | ASCII_HEX_DECODE_ABBREVIATION => Self::AsciiHexDecode,
            ASCII85_DECODE | ASCII85_DECODE_ABBREVIATION => Self::Ascii85Decode,
            LZW_DECODE | LZW_DECODE_ABBREVIATION => Self::LzwDecode,
            FLATE_DECODE | FLATE_DECODE_ABBREVIATION => Self::FlateDecode,
            RUN_LENGTH_DECODE | RUN_LENGTH_DECODE_ABBREVIATION => Self::RunLengthDecode,
            CCITTFAX_DECODE | CCITTFAX_DECODE_ABBREVIATION => Self::CcittFaxDecode,
            DCT_DECODE | DCT_DECODE_ABBREVIATION => Self::DctDecode,
            JBIG2_DECODE => Self::Jbig2Decode,
            JPX_DECODE => Self::JpxDecode,
            CRYPT => Self::Crypt,
            _ => return Err(FilterError::Unknown(name.clone())),
        };

        Ok(filter)
    }

    /// The full name of the filter.
    pub fn name(&self) -> &'static str {
        match self {
            Self::AsciiHexDecode => "ASCIIHexDecode",
            Self::Ascii85Decode => "ASCII85Decode",
            Self::LzwDecode => "LZWDecode",
            Self::FlateDecode => "FlateDecode",
            Self::RunLengthDecode => "RunLengthDecode",
            Self::CcittFaxDecode => "CCITTFaxDecode",
            Self::Jbig2Decode => "JBIG2Decode",
            Self::DctDecode => "DCTDecode",
            Self::JpxDecode => "JPXDecode",
            Self::Crypt => "Crypt",
        }
    }

    /// Whether the filter is an image codec that is kept as is.
    pub fn is_image_codec(&self) -> bool {
        matches!(
            self,
            Self::CcittFaxDecode | Self::Jbig2Decode | Self::DctDecode | Self::JpxDecode
        )
    }

    /// Decode data with this filter.
    pub fn decode(&self, data: &[u8], params: Option<&Dict>) -> Result<Vec<u8>, FilterError> {
        let decoded = match self {
            Self::AsciiHexDecode => ascii_hex::decode(data),
            Self::Ascii85Decode => ascii_85::decode(data),
            Self::RunLengthDecode => run_length::decode(data),
            Self::LzwDecode => lzw_flate::lzw::decode(data, params),
            Self::FlateDecode => flate::decode(data, params),
            // Decryption happens when loading, so only identity crypt filters remain.
            Self::Crypt => Some(data.to_vec()),
            Self::CcittFaxDecode | Self::Jbig2Decode | Self::DctDecode | Self::JpxDecode => {
                return Err(FilterError::Unsupported(*self));
            }
        };

        decoded.ok_or(FilterError::Corrupt(*self))
    }
}

/// The result of decoding the leading, decodable part of a filter chain.
#[derive(Debug, Clone)]
pub struct PartialDecode {
    /// The decoded data.
    pub data: Vec<u8>,
    /// The filters that are still applied to the data.
    pub remaining: Vec<Name>,
    /// The parameters of the remaining filters.
    pub remaining_params: Vec<Option<Dict>>,
}

/// Decode the filters of a stream up to the first image codec.
pub fn decode_leading(stream: &Stream) -> Result<PartialDecode, FilterError> {
    let names = stream.filter_names();
    let params = stream.decode_params();
    let mut data = stream.data.clone();

    for (i, name) in names.iter().enumerate() {
        let filter = Filter::from_name(name)?;

        if filter.is_image_codec() {
            return Ok(PartialDecode {
                data,
                remaining: names[i..].to_vec(),
                remaining_params: params[i..].to_vec(),
            });
        }

        data = filter.decode(&data, params[i].as_ref())?;
    }

    Ok(PartialDecode {
        data,
        remaining: vec![],
        remaining_params: vec![],
    })
}

/// Encode data as ASCII hex, terminated by `>`.
pub fn ascii_hex_encode(data: &[u8]) -> Vec<u8> {
    ascii_hex::encode(data)
}
