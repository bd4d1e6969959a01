// File-level I/O helpers for patch decoding.
//
// `decode_file()` wires a source file, a patch file and an output file
// into the streaming decoder. The output is opened read/write because
// VCD_TARGET windows copy from earlier output. Optionally computes a
// streaming SHA-256 of the output (feature-gated behind `file-io`).

use std::fs::{File, OpenOptions};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

#[cfg(feature = "file-io")]
use sha2::Digest;
use thiserror::Error;

use crate::vcdiff::decoder::{DecodeEvent, DecodeOptions, Decoder};
use crate::vcdiff::error::DecodeError;
use crate::vcdiff::stream::{SeekSource, SeekTarget, TargetStore};

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

/// Statistics returned by `decode_file()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeStats {
    /// Source file size in bytes.
    pub source_size: u64,
    /// Patch file size in bytes.
    pub patch_size: u64,
    /// Reconstructed output size in bytes.
    pub output_size: u64,
    /// Number of VCDIFF windows decoded.
    pub windows: u64,
    /// SHA-256 of the reconstructed output (if `file-io` feature is enabled).
    pub output_sha256: Option<[u8; 32]>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Error type for file I/O operations.
#[derive(Debug, Error)]
pub enum IoError {
    /// I/O error (file open, read, write).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// Patch decoding error.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),
}

// ---------------------------------------------------------------------------
// Default buffer size
// ---------------------------------------------------------------------------

const BUF_SIZE: usize = 64 * 1024; // 64 KiB

// ---------------------------------------------------------------------------
// decode_file
// ---------------------------------------------------------------------------

/// Decode `patch_path` against `source_path`, writing to `output_path`.
///
/// An existing output file is truncated. On error the output holds a
/// partial result and must be discarded.
pub fn decode_file(
    source_path: &Path,
    patch_path: &Path,
    output_path: &Path,
) -> Result<DecodeStats, IoError> {
    decode_file_with(
        source_path,
        patch_path,
        output_path,
        DecodeOptions::default(),
        |_| {},
    )
}

/// [`decode_file`] with explicit options and a progress callback.
pub fn decode_file_with<F: FnMut(DecodeEvent)>(
    source_path: &Path,
    patch_path: &Path,
    output_path: &Path,
    options: DecodeOptions,
    on_event: F,
) -> Result<DecodeStats, IoError> {
    let source_file = File::open(source_path)?;
    let source_size = source_file.metadata()?.len();
    let source = SeekSource::new(BufReader::with_capacity(BUF_SIZE, source_file))?;

    let patch_file = File::open(patch_path)?;
    let patch_size = patch_file.metadata()?.len();
    let patch = BufReader::with_capacity(BUF_SIZE, patch_file);

    let output_file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(output_path)?;
    let target = HashingTarget::new(SeekTarget::new(output_file)?);

    let mut decoder = Decoder::with_options(source, patch, target, options)?;
    decoder.run_with(on_event)?;

    let windows = decoder.windows_decoded();
    let (_, _, target) = decoder.into_parts();
    let output_size = target.len();
    let (target, output_sha256) = target.finish();
    target.into_inner()?.sync_all()?;

    log::info!(
        "decoded {} -> {}: {output_size} bytes in {windows} windows",
        patch_path.display(),
        output_path.display()
    );

    Ok(DecodeStats {
        source_size,
        patch_size,
        output_size,
        windows,
        output_sha256,
    })
}

// ---------------------------------------------------------------------------
// Batch decode (parallel feature)
// ---------------------------------------------------------------------------

/// One independent patch application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeJob {
    pub source: PathBuf,
    pub patch: PathBuf,
    pub output: PathBuf,
}

/// Decode independent patches concurrently. Windows within one patch are
/// always decoded in order; only separate jobs run in parallel.
#[cfg(feature = "parallel")]
pub fn decode_batch(jobs: &[DecodeJob]) -> Vec<Result<DecodeStats, IoError>> {
    use rayon::prelude::*;

    jobs.par_iter()
        .map(|job| decode_file(&job.source, &job.patch, &job.output))
        .collect()
}

/// Sequential fallback when the `parallel` feature is disabled.
#[cfg(not(feature = "parallel"))]
pub fn decode_batch(jobs: &[DecodeJob]) -> Vec<Result<DecodeStats, IoError>> {
    jobs.iter()
        .map(|job| decode_file(&job.source, &job.patch, &job.output))
        .collect()
}

// ---------------------------------------------------------------------------
// Hashing target (used with file-io feature)
// ---------------------------------------------------------------------------

/// Passes every appended window through SHA-256.
struct HashingTarget<T> {
    inner: T,
    #[cfg(feature = "file-io")]
    hasher: sha2::Sha256,
}

impl<T: TargetStore> HashingTarget<T> {
    fn new(inner: T) -> Self {
        Self {
            inner,
            #[cfg(feature = "file-io")]
            hasher: sha2::Sha256::new(),
        }
    }

    fn finish(self) -> (T, Option<[u8; 32]>) {
        #[cfg(feature = "file-io")]
        let digest = Some(self.hasher.finalize().into());
        #[cfg(not(feature = "file-io"))]
        let digest = None;
        (self.inner, digest)
    }
}

impl<T: TargetStore> TargetStore for HashingTarget<T> {
    fn len(&self) -> u64 {
        self.inner.len()
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), DecodeError> {
        self.inner.read_at(offset, buf)
    }

    fn append(&mut self, bytes: &[u8]) -> Result<(), DecodeError> {
        self.inner.append(bytes)?;
        #[cfg(feature = "file-io")]
        self.hasher.update(bytes);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
