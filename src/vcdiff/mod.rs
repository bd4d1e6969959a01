// VCDIFF format implementation (RFC 3284), decoder side.
//
// Reads patches produced by xdelta3 and other RFC 3284 encoders that use
// the default code table and no secondary compression.
//
// # Modules
//
// - `varint`        : Variable-length integers and section cursors
// - `header`        : File header parsing
// - `window`        : Per-window header and section parsing
// - `address_cache` : NEAR/SAME address cache for COPY instruction addresses
// - `code_table`    : Default RFC 3284 code table (256 entries)
// - `instruction`   : ADD/RUN/COPY execution against the window buffer
// - `stream`        : Source and target stream abstractions
// - `decoder`       : Window decoding and the top-level decode loop
// - `error`         : Error types

pub mod address_cache;
pub mod code_table;
pub mod decoder;
pub mod error;
pub mod header;
pub mod instruction;
pub mod stream;
pub mod varint;
pub mod window;

// Re-export key types for convenience.
pub use address_cache::AddressCache;
pub use code_table::{CodeTable, CodeTableEntry, HalfInstruction, InstructionType};
pub use decoder::{
    DecodeEvent, DecodeOptions, Decoder, DecoderState, WindowDecoder, decode_memory,
};
pub use error::{DecodeError, ErrorClass, VarIntError};
pub use header::{Header, HeaderIndicator, VCDIFF_MAGIC};
pub use instruction::{Instruction, InstructionExecutor};
pub use stream::{SeekSource, SeekTarget, SourceProvider, TargetStore};
pub use window::{DeltaIndicator, HARD_MAX_WINSIZE, Window, WindowIndicator, WindowReader};
