// VCDIFF file header parsing (RFC 3284, Section 4.1).
//
// Parsed once, before the first window. Secondary compression and
// application-defined code tables are rejected as unsupported.

use std::io::Read;

use bitflags::bitflags;

use super::error::DecodeError;
use super::varint;

// ---------------------------------------------------------------------------
// VCDIFF magic and version
// ---------------------------------------------------------------------------

pub const VCDIFF_MAGIC: [u8; 4] = [0xD6, 0xC3, 0xC4, 0x00];

/// Low 24 bits of the little-endian stamp.
const MAGIC_STAMP: u32 = 0x00C4_C3D6;

const SUPPORTED_VERSION: u8 = 0x00;

// ---------------------------------------------------------------------------
// Header indicator flags (hdr_ind)
// ---------------------------------------------------------------------------

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct HeaderIndicator: u8 {
        const SECONDARY_COMPRESSION = 1 << 0;
        const CODE_TABLE = 1 << 1;
        const APPLICATION_DATA = 1 << 2;
    }
}

/// Secondary compressor applied to window sections.
///
/// Only `None` can be produced by the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SecondaryCompressor {
    #[default]
    None,
}

// ---------------------------------------------------------------------------
// File header
// ---------------------------------------------------------------------------

/// Parsed VCDIFF file header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Header {
    pub indicator: HeaderIndicator,
    pub secondary_compressor: SecondaryCompressor,
    /// Application-defined header data, decoded as ASCII.
    pub application_data: Option<String>,
}

impl Header {
    /// Decode a VCDIFF file header from a reader.
    pub fn decode<R: Read>(r: &mut R) -> Result<Self, DecodeError> {
        let mut stamp = [0u8; 4];
        r.read_exact(&mut stamp)?;
        let stamp = u32::from_le_bytes(stamp);
        if stamp & 0x00FF_FFFF != MAGIC_STAMP {
            return Err(DecodeError::BadMagic);
        }
        let version = (stamp >> 24) as u8;
        if version != SUPPORTED_VERSION {
            return Err(DecodeError::UnsupportedVersion(version));
        }

        let bits = varint::stream_read_byte(r)?;
        let indicator =
            HeaderIndicator::from_bits(bits).ok_or(DecodeError::UnrecognizedHeaderBits(bits))?;

        if indicator.contains(HeaderIndicator::SECONDARY_COMPRESSION) {
            return Err(DecodeError::NotSupported("secondary compressor"));
        }
        if indicator.contains(HeaderIndicator::CODE_TABLE) {
            return Err(DecodeError::NotSupported("custom code table"));
        }

        let application_data = if indicator.contains(HeaderIndicator::APPLICATION_DATA) {
            let len = varint::stream_read_u32(r)?;
            let data = varint::stream_read_bytes(r, len)?;
            Some(ascii_string(&data))
        } else {
            None
        };

        log::debug!("VCDIFF header: indicator={indicator:?} app_data={application_data:?}");

        Ok(Self {
            indicator,
            secondary_compressor: SecondaryCompressor::None,
            application_data,
        })
    }

    /// Encoded size of this header in bytes.
    pub fn encoded_len(&self) -> usize {
        let app = self
            .application_data
            .as_ref()
            .map_or(0, |s| varint::sizeof_u32(s.len() as u32) + s.len());
        VCDIFF_MAGIC.len() + 1 + app
    }
}

/// Non-ASCII bytes are replaced with `?`.
fn ascii_string(data: &[u8]) -> String {
    data.iter()
        .map(|&b| if b.is_ascii() { b as char } else { '?' })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
