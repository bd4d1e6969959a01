// VCDIFF decoder (RFC 3284).
//
// `WindowDecoder` turns one parsed window into bytes. `Decoder` drives the
// whole patch: header once, then windows until the patch is exhausted.
// Decoding is all-or-nothing; after an error the target holds a prefix
// of the output that must be discarded.

use std::io::{Cursor, Read, Seek, SeekFrom};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::address_cache::{AddressCache, DEFAULT_NEAR_SLOTS, DEFAULT_SAME_SLOTS};
use super::code_table::{CodeTable, InstructionType};
use super::error::DecodeError;
use super::header::Header;
use super::instruction::InstructionExecutor;
use super::stream::{SourceProvider, TargetStore};
use super::window::{Window, WindowReader};

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Decoder configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Verify the Adler-32 of windows that carry one.
    pub verify_checksum: bool,
    /// Address cache NEAR slots.
    pub near_slots: u8,
    /// Address cache SAME slots.
    pub same_slots: u8,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            verify_checksum: true,
            near_slots: DEFAULT_NEAR_SLOTS,
            same_slots: DEFAULT_SAME_SLOTS,
        }
    }
}

// ---------------------------------------------------------------------------
// Window decoder
// ---------------------------------------------------------------------------

/// Decodes single windows. The window buffer and address cache are reused
/// across windows.
#[derive(Debug, Clone)]
pub struct WindowDecoder {
    cache: AddressCache,
    buffer: Vec<u8>,
    verify_checksum: bool,
}

impl WindowDecoder {
    pub fn new(options: &DecodeOptions) -> Self {
        Self {
            cache: AddressCache::with_sizes(options.near_slots, options.same_slots),
            buffer: Vec::new(),
            verify_checksum: options.verify_checksum,
        }
    }

    /// Execute every instruction of `window` and verify the result.
    ///
    /// Returns the decoded window bytes. `target` holds the output of all
    /// previous windows and is only read from.
    pub fn decode<S: SourceProvider, T: TargetStore>(
        &mut self,
        window: &mut Window,
        source: &mut S,
        target: &mut T,
    ) -> Result<&[u8], DecodeError> {
        self.cache.reset();
        self.buffer.clear();
        self.buffer.reserve(window.target_window_length as usize);

        let table = CodeTable::rfc3284();
        let expected_len = window.target_window_length;
        let checksum = window.checksum;

        let mut exec =
            InstructionExecutor::new(window, &mut self.cache, source, target, &mut self.buffer);
        while let Some(opcode) = exec.next_opcode()? {
            let (first, second) = table.lookup(opcode);
            for half in [first, second] {
                if half.kind == InstructionType::Noop {
                    continue;
                }
                let inst = exec.execute(half)?;
                log::trace!("{opcode:3}: {inst}");
            }
        }

        let actual = self.buffer.len() as u32;
        if actual != expected_len {
            return Err(DecodeError::IncompleteWindow {
                expected: expected_len,
                actual,
            });
        }

        if self.verify_checksum
            && let Some(expected) = checksum
        {
            let actual = compute_adler32(&self.buffer);
            if actual != expected {
                return Err(DecodeError::ChecksumMismatch { expected, actual });
            }
        }

        Ok(&self.buffer)
    }
}

// ---------------------------------------------------------------------------
// Stream decoder
// ---------------------------------------------------------------------------

/// Lifecycle of a [`Decoder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    /// Header parsed, no window decoded yet.
    Created,
    /// At least one window decoded, patch not exhausted.
    Running,
    /// Every window decoded.
    Finished,
    /// A window failed. Terminal.
    Failed,
}

/// Notification emitted by [`Decoder::run_with`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DecodeEvent {
    /// Fraction of the patch consumed, in `[0, 1]`.
    Progress(f64),
    Finished,
}

/// Decodes a complete VCDIFF patch.
///
/// `source` is the original data, `patch` the VCDIFF stream and `target`
/// receives the reconstructed output.
pub struct Decoder<S, P, T> {
    source: S,
    patch: P,
    target: T,
    header: Header,
    reader: WindowReader,
    window_decoder: WindowDecoder,
    patch_len: u64,
    state: DecoderState,
    last_window: Option<Window>,
    windows: u64,
    cancel: Option<Arc<AtomicBool>>,
}

impl<S: SourceProvider, P: Read + Seek, T: TargetStore> Decoder<S, P, T> {
    /// Parse the patch header with default options.
    pub fn new(source: S, patch: P, target: T) -> Result<Self, DecodeError> {
        Self::with_options(source, patch, target, DecodeOptions::default())
    }

    pub fn with_options(
        source: S,
        mut patch: P,
        target: T,
        options: DecodeOptions,
    ) -> Result<Self, DecodeError> {
        let start = patch.stream_position()?;
        let patch_len = patch.seek(SeekFrom::End(0))?;
        patch.seek(SeekFrom::Start(start))?;

        let header = Header::decode(&mut patch)?;

        Ok(Self {
            source,
            patch,
            target,
            header,
            reader: WindowReader::new(),
            window_decoder: WindowDecoder::new(&options),
            patch_len,
            state: DecoderState::Created,
            last_window: None,
            windows: 0,
            cancel: None,
        })
    }

    /// Poll `flag` once per window; when raised the run fails with
    /// [`DecodeError::Cancelled`].
    pub fn with_cancel(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn state(&self) -> DecoderState {
        self.state
    }

    /// The most recently decoded window.
    pub fn last_window(&self) -> Option<&Window> {
        self.last_window.as_ref()
    }

    pub fn windows_decoded(&self) -> u64 {
        self.windows
    }

    pub fn bytes_written(&self) -> u64 {
        self.target.len()
    }

    pub fn patch_len(&self) -> u64 {
        self.patch_len
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    pub fn into_parts(self) -> (S, P, T) {
        (self.source, self.patch, self.target)
    }

    /// Decode the next window.
    ///
    /// Returns the fraction of the patch consumed so far, or `None` once
    /// every window has been decoded. Any error moves the decoder to
    /// [`DecoderState::Failed`] and every later call fails.
    pub fn next_window(&mut self) -> Result<Option<f64>, DecodeError> {
        match self.state {
            DecoderState::Finished => return Ok(None),
            DecoderState::Failed => return Err(DecodeError::DecoderFailed),
            DecoderState::Created | DecoderState::Running => {}
        }

        let result = self.advance();
        if result.is_err() {
            self.state = DecoderState::Failed;
        }
        result
    }

    fn advance(&mut self) -> Result<Option<f64>, DecodeError> {
        if self
            .cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
        {
            return Err(DecodeError::Cancelled);
        }

        if self.patch.stream_position()? >= self.patch_len {
            self.state = DecoderState::Finished;
            log::debug!(
                "patch finished: {} windows, {} bytes",
                self.windows,
                self.target.len()
            );
            return Ok(None);
        }
        self.state = DecoderState::Running;

        // Release the previous window's sections before reading the next.
        self.last_window = None;
        let mut window = self.reader.read_next(&mut self.patch, &self.header)?;

        let bytes = self
            .window_decoder
            .decode(&mut window, &mut self.source, &mut self.target)?;
        self.target.append(bytes)?;

        log::debug!(
            "window {} decoded: {} bytes at {}",
            self.windows,
            window.target_window_length,
            window.target_window_offset
        );
        self.windows += 1;
        self.last_window = Some(window);

        let position = self.patch.stream_position()?;
        Ok(Some(position as f64 / self.patch_len as f64))
    }

    /// Decode every remaining window.
    pub fn run(&mut self) -> Result<(), DecodeError> {
        self.run_with(|_| {})
    }

    /// Decode every remaining window, reporting progress after each one
    /// and a final [`DecodeEvent::Finished`].
    pub fn run_with<F: FnMut(DecodeEvent)>(&mut self, mut on_event: F) -> Result<(), DecodeError> {
        while let Some(progress) = self.next_window()? {
            on_event(DecodeEvent::Progress(progress));
        }
        on_event(DecodeEvent::Finished);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// High-level convenience: decode in memory
// ---------------------------------------------------------------------------

/// Decode a VCDIFF patch held in memory.
///
/// `source` may be empty for patches that never copy from a source.
pub fn decode_memory(source: &[u8], patch: &[u8]) -> Result<Vec<u8>, DecodeError> {
    let mut decoder = Decoder::new(source, Cursor::new(patch), Vec::new())?;
    decoder.run()?;
    let (_, _, target) = decoder.into_parts();
    Ok(target)
}

// ---------------------------------------------------------------------------
// Adler-32
// ---------------------------------------------------------------------------

pub fn compute_adler32(data: &[u8]) -> u32 {
    #[cfg(feature = "adler32")]
    {
        let mut hasher = simd_adler32::Adler32::new();
        hasher.write(data);
        hasher.finish()
    }
    #[cfg(not(feature = "adler32"))]
    {
        const MOD_ADLER: u32 = 65521;
        let mut a: u32 = 1;
        let mut b: u32 = 0;
        for &byte in data {
            a = (a + u32::from(byte)) % MOD_ADLER;
            b = (b + a) % MOD_ADLER;
        }
        (b << 16) | a
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
