// VCDIFF per-window header and section parsing (RFC 3284, Section 4.2-4.3).
//
// Every field is validated as soon as it is read. The checks defend
// against hostile patches: 32-bit offset overflow, VCD_TARGET segments
// past the decoded output, and window sizes beyond HARD_MAX_WINSIZE.

use std::io::Read;

use bitflags::bitflags;

use super::error::DecodeError;
use super::header::{Header, SecondaryCompressor};
use super::varint::{self, Section};

// ---------------------------------------------------------------------------
// Hard limits
// ---------------------------------------------------------------------------

/// Maximum decoded window size (matches xdelta3 XD3_HARDMAXWINSIZE).
pub const HARD_MAX_WINSIZE: u32 = 1 << 24; // 16 MiB

// ---------------------------------------------------------------------------
// Indicator flags
// ---------------------------------------------------------------------------

bitflags! {
    /// Window indicator (win_ind).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct WindowIndicator: u8 {
        const SOURCE = 1 << 0;
        const TARGET = 1 << 1;
        const ADLER32 = 1 << 2;
    }
}

bitflags! {
    /// Delta indicator (del_ind): which sections are secondary-compressed.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DeltaIndicator: u8 {
        const DATA = 1 << 0;
        const INSTRUCTIONS = 1 << 1;
        const ADDRESSES = 1 << 2;
    }
}

// ---------------------------------------------------------------------------
// Window
// ---------------------------------------------------------------------------

/// One parsed window: header fields plus its three sections.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Window {
    pub indicator: WindowIndicator,
    /// Offset of the copy segment, in the source (VCD_SOURCE) or in the
    /// already decoded target (VCD_TARGET).
    pub source_segment_offset: u32,
    pub source_segment_length: u32,
    /// Absolute output position where this window starts. Computed from
    /// the lengths of all previous windows.
    pub target_window_offset: u32,
    pub target_window_length: u32,
    pub delta_indicator: DeltaIndicator,
    pub checksum: Option<u32>,
    pub data: Section,
    pub instructions: Section,
    pub addresses: Section,
}

impl Window {
    #[inline]
    pub fn has_target(&self) -> bool {
        self.indicator.contains(WindowIndicator::TARGET)
    }

    /// Whether COPY instructions have a segment to read from.
    #[inline]
    pub fn has_copy_segment(&self) -> bool {
        self.indicator
            .intersects(WindowIndicator::SOURCE | WindowIndicator::TARGET)
    }
}

// ---------------------------------------------------------------------------
// Window reader
// ---------------------------------------------------------------------------

/// Reads windows one at a time, tracking the cumulative target offset.
#[derive(Debug, Clone, Default)]
pub struct WindowReader {
    last_window_offset: u32,
    last_window_length: u32,
}

impl WindowReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total output bytes described by the windows read so far.
    pub fn cumulative_output_len(&self) -> u64 {
        u64::from(self.last_window_offset) + u64::from(self.last_window_length)
    }

    /// Parse the next window from the patch.
    pub fn read_next<R: Read>(&mut self, r: &mut R, header: &Header) -> Result<Window, DecodeError> {
        // The offset advances lazily so that a patch producing exactly
        // 4 GiB does not trip the check after its last window.
        self.last_window_offset = self
            .last_window_offset
            .checked_add(self.last_window_length)
            .ok_or(DecodeError::FileOffsetOverflow)?;

        let bits = varint::stream_read_byte(r)?;
        let indicator =
            WindowIndicator::from_bits(bits).ok_or(DecodeError::UnrecognizedWindowBits(bits))?;

        let (source_segment_length, source_segment_offset) =
            if indicator.intersects(WindowIndicator::SOURCE | WindowIndicator::TARGET) {
                let len = varint::stream_read_u32(r)?;
                let off = varint::stream_read_u32(r)?;
                (len, off)
            } else {
                (0, 0)
            };

        let segment_end = source_segment_offset
            .checked_add(source_segment_length)
            .ok_or(DecodeError::CopyWindowOverflow)?;
        if indicator.contains(WindowIndicator::TARGET) && segment_end > self.last_window_offset {
            return Err(DecodeError::TargetWindowOutOfBounds);
        }

        // Length of the delta encoding: redundant for a seekable decoder.
        let _ = varint::stream_read_u32(r)?;

        let target_window_length = varint::stream_read_u32(r)?;
        self.last_window_length = target_window_length;
        if source_segment_length
            .checked_add(target_window_length)
            .is_none()
        {
            return Err(DecodeError::TargetWindowOverflow);
        }
        if target_window_length > HARD_MAX_WINSIZE {
            return Err(DecodeError::HardSizeExceeded(target_window_length));
        }

        let bits = varint::stream_read_byte(r)?;
        let delta_indicator =
            DeltaIndicator::from_bits(bits).ok_or(DecodeError::UnrecognizedDeltaBits(bits))?;
        if !delta_indicator.is_empty() && header.secondary_compressor == SecondaryCompressor::None
        {
            return Err(DecodeError::InvalidDeltaIndicator(bits));
        }

        let data_len = varint::stream_read_u32(r)?;
        let inst_len = varint::stream_read_u32(r)?;
        let addr_len = varint::stream_read_u32(r)?;

        // Not a varint: four raw big-endian bytes.
        let checksum = if indicator.contains(WindowIndicator::ADLER32) {
            let mut buf = [0u8; 4];
            r.read_exact(&mut buf)?;
            Some(u32::from_be_bytes(buf))
        } else {
            None
        };

        let data = Section::new(varint::stream_read_bytes(r, data_len)?);
        let instructions = Section::new(varint::stream_read_bytes(r, inst_len)?);
        let addresses = Section::new(varint::stream_read_bytes(r, addr_len)?);

        log::debug!(
            "window @{}: {:?} segment={}+{} target_len={} data={} inst={} addr={} checksum={:?}",
            self.last_window_offset,
            indicator,
            source_segment_offset,
            source_segment_length,
            target_window_length,
            data_len,
            inst_len,
            addr_len,
            checksum
        );

        Ok(Window {
            indicator,
            source_segment_offset,
            source_segment_length,
            target_window_offset: self.last_window_offset,
            target_window_length,
            delta_indicator,
            checksum,
            data,
            instructions,
            addresses,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
