// Decoder error types.
//
// Every condition is fatal to the current run: a patch either decodes
// completely or fails with exactly one of these.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Primitive reader errors
// ---------------------------------------------------------------------------

/// Failure while reading raw bytes or a variable-length integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum VarIntError {
    /// Not enough input bytes to complete the read.
    #[error("end of input")]
    EndOfInput,
    /// The integer does not fit in 32 bits or uses more than 5 bytes.
    #[error("overflow in decode_integer")]
    Overflow,
    /// A byte count larger than `i32::MAX` was requested.
    #[error("trying to read {0} bytes, more than the representable length")]
    LengthTooLarge(u32),
}

// ---------------------------------------------------------------------------
// Decode errors
// ---------------------------------------------------------------------------

/// Coarse classification of a [`DecodeError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Corrupted or hostile patch content.
    Malformed,
    /// Valid per RFC 3284 but intentionally not implemented.
    Unsupported,
    /// The patch, a section or the source ended early.
    Truncated,
    /// Failure in an underlying stream.
    Io,
    /// The caller raised the cancellation flag.
    Cancelled,
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("I/O error: {0}")]
    Io(std::io::Error),

    #[error("unexpected end of input")]
    EndOfInput,

    #[error("overflow in decode_integer")]
    IntegerOverflow,

    #[error("trying to read {0} bytes, more than the representable length")]
    LengthTooLarge(u32),

    #[error("not a VCDIFF input")]
    BadMagic,

    #[error("VCDIFF input version {0} is not supported")]
    UnsupportedVersion(u8),

    #[error("unrecognized header indicator bits set: {0:#04X}")]
    UnrecognizedHeaderBits(u8),

    #[error("not supported: {0}")]
    NotSupported(&'static str),

    #[error("unrecognized window indicator bits set: {0:#04X}")]
    UnrecognizedWindowBits(u8),

    #[error("decoder copy window overflows a file offset")]
    CopyWindowOverflow,

    #[error("VCD_TARGET window out of bounds")]
    TargetWindowOutOfBounds,

    #[error("decoder target window overflows a 32-bit address space")]
    TargetWindowOverflow,

    #[error("hard window size exceeded: {0} bytes")]
    HardSizeExceeded(u32),

    #[error("decoder file offset overflow")]
    FileOffsetOverflow,

    #[error("unrecognized delta indicator bits set: {0:#04X}")]
    UnrecognizedDeltaBits(u8),

    #[error("invalid delta indicator bits set: {0:#04X}")]
    InvalidDeltaIndicator(u8),

    #[error("invalid address mode {0}")]
    InvalidAddressMode(u8),

    #[error("invalid copy address")]
    InvalidCopyAddress,

    #[error("trying to copy from unknown source")]
    UnknownCopySource,

    #[error("instruction writes past the target window: {written} of {expected} bytes")]
    TargetWindowOverrun { expected: u32, written: u64 },

    #[error("target window not fully decoded: expected {expected} bytes, got {actual}")]
    IncompleteWindow { expected: u32, actual: u32 },

    #[error("checksum mismatch: expected {expected:#010X}, got {actual:#010X}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    #[error("decoding cancelled")]
    Cancelled,

    #[error("decoder already failed")]
    DecoderFailed,
}

impl DecodeError {
    /// Which family of failure this error belongs to.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Io(_) => ErrorClass::Io,
            Self::EndOfInput => ErrorClass::Truncated,
            Self::NotSupported(_) => ErrorClass::Unsupported,
            Self::Cancelled => ErrorClass::Cancelled,
            _ => ErrorClass::Malformed,
        }
    }
}

impl From<VarIntError> for DecodeError {
    fn from(e: VarIntError) -> Self {
        match e {
            VarIntError::EndOfInput => Self::EndOfInput,
            VarIntError::Overflow => Self::IntegerOverflow,
            VarIntError::LengthTooLarge(n) => Self::LengthTooLarge(n),
        }
    }
}

impl From<std::io::Error> for DecodeError {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            Self::EndOfInput
        } else {
            Self::Io(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unexpected_eof_maps_to_end_of_input() {
        let e: DecodeError = std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into();
        assert!(matches!(e, DecodeError::EndOfInput));
        assert_eq!(e.class(), ErrorClass::Truncated);
    }

    #[test]
    fn other_io_errors_are_kept() {
        let e: DecodeError = std::io::Error::other("disk on fire").into();
        assert!(matches!(e, DecodeError::Io(_)));
        assert_eq!(e.class(), ErrorClass::Io);
    }

    #[test]
    fn classes() {
        assert_eq!(DecodeError::BadMagic.class(), ErrorClass::Malformed);
        assert_eq!(
            DecodeError::NotSupported("custom code table").class(),
            ErrorClass::Unsupported
        );
        assert_eq!(DecodeError::Cancelled.class(), ErrorClass::Cancelled);
        assert_eq!(
            DecodeError::ChecksumMismatch {
                expected: 1,
                actual: 2
            }
            .class(),
            ErrorClass::Malformed
        );
    }

    #[test]
    fn varint_errors_convert() {
        assert!(matches!(
            DecodeError::from(VarIntError::Overflow),
            DecodeError::IntegerOverflow
        ));
        assert!(matches!(
            DecodeError::from(VarIntError::LengthTooLarge(7)),
            DecodeError::LengthTooLarge(7)
        ));
    }
}
