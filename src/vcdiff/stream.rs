// Random-access streams the decoder reads from and writes to.
//
// The source is read-only. The target is both the write destination and,
// for VCD_TARGET windows, a read source for earlier output.

use std::io::{Read, Seek, SeekFrom, Write};

use super::error::DecodeError;

// ---------------------------------------------------------------------------
// Source provider
// ---------------------------------------------------------------------------

/// Provides source data for COPY instructions that reference source bytes.
pub trait SourceProvider {
    /// Fill `buf` with the source bytes starting at absolute `offset`.
    /// Fails with `EndOfInput` if the source ends first.
    fn read_source(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), DecodeError>;

    /// Total source length (if known).
    fn source_len(&self) -> Option<u64>;
}

/// In-memory source.
impl SourceProvider for &[u8] {
    fn read_source(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), DecodeError> {
        let start = usize::try_from(offset).map_err(|_| DecodeError::EndOfInput)?;
        let bytes = start
            .checked_add(buf.len())
            .and_then(|end| self.get(start..end))
            .ok_or(DecodeError::EndOfInput)?;
        buf.copy_from_slice(bytes);
        Ok(())
    }

    fn source_len(&self) -> Option<u64> {
        Some(self.len() as u64)
    }
}

/// Source backed by any seekable reader, e.g. a `BufReader<File>`.
///
/// Moves between reads with `Seek::seek_relative`, so a `BufReader`
/// keeps its buffer when the next COPY lands inside it.
#[derive(Debug)]
pub struct SeekSource<R> {
    inner: R,
    len: Option<u64>,
    /// Stream position, or `None` after a failed read.
    pos: Option<u64>,
}

impl<R: Read + Seek> SeekSource<R> {
    pub fn new(mut inner: R) -> std::io::Result<Self> {
        let len = inner.seek(SeekFrom::End(0))?;
        inner.seek(SeekFrom::Start(0))?;
        Ok(Self {
            inner,
            len: Some(len),
            pos: Some(0),
        })
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    fn move_to(&mut self, offset: u64) -> std::io::Result<()> {
        let delta = self
            .pos
            .and_then(|pos| i64::try_from(offset).ok()?.checked_sub(i64::try_from(pos).ok()?));
        match delta {
            Some(0) => {}
            Some(delta) => self.inner.seek_relative(delta)?,
            None => {
                self.inner.seek(SeekFrom::Start(offset))?;
            }
        }
        Ok(())
    }
}

impl<R: Read + Seek> SourceProvider for SeekSource<R> {
    fn read_source(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), DecodeError> {
        let result = self
            .move_to(offset)
            .and_then(|()| self.inner.read_exact(buf));
        match result {
            Ok(()) => {
                self.pos = Some(offset + buf.len() as u64);
                Ok(())
            }
            Err(e) => {
                self.pos = None;
                Err(e.into())
            }
        }
    }

    fn source_len(&self) -> Option<u64> {
        self.len
    }
}

// ---------------------------------------------------------------------------
// Target store
// ---------------------------------------------------------------------------

/// The decoded output: append-only for writes, random access for reads.
pub trait TargetStore {
    /// Bytes written so far.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fill `buf` with previously written bytes at absolute `offset`.
    /// The write position is unaffected.
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), DecodeError>;

    /// Append a fully decoded window.
    fn append(&mut self, bytes: &[u8]) -> Result<(), DecodeError>;
}

impl TargetStore for Vec<u8> {
    fn len(&self) -> u64 {
        Vec::len(self) as u64
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), DecodeError> {
        let mut view: &[u8] = self;
        view.read_source(offset, buf)
    }

    fn append(&mut self, bytes: &[u8]) -> Result<(), DecodeError> {
        self.extend_from_slice(bytes);
        Ok(())
    }
}

/// Target backed by a seekable read/write stream, e.g. a `File`.
///
/// Writes start at offset 0 of the stream. Every out-of-band read seeks
/// away and restores the write cursor before returning.
#[derive(Debug)]
pub struct SeekTarget<W> {
    inner: W,
    len: u64,
}

impl<W: Read + Write + Seek> SeekTarget<W> {
    pub fn new(mut inner: W) -> std::io::Result<Self> {
        inner.seek(SeekFrom::Start(0))?;
        Ok(Self { inner, len: 0 })
    }

    /// Flush and return the underlying stream.
    pub fn into_inner(mut self) -> std::io::Result<W> {
        self.inner.flush()?;
        Ok(self.inner)
    }
}

impl<W: Read + Write + Seek> TargetStore for SeekTarget<W> {
    fn len(&self) -> u64 {
        self.len
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), DecodeError> {
        let end = offset
            .checked_add(buf.len() as u64)
            .ok_or(DecodeError::EndOfInput)?;
        if end > self.len {
            return Err(DecodeError::EndOfInput);
        }
        // Pending writes must reach the stream before reading them back.
        self.inner.flush()?;
        self.inner.seek(SeekFrom::Start(offset))?;
        let read = self.inner.read_exact(buf);
        self.inner.seek(SeekFrom::Start(self.len))?;
        read?;
        Ok(())
    }

    fn append(&mut self, bytes: &[u8]) -> Result<(), DecodeError> {
        self.inner.write_all(bytes)?;
        self.len += bytes.len() as u64;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn slice_source_reads_exact() {
        let mut src: &[u8] = b"hello world";
        let mut buf = [0u8; 5];
        src.read_source(6, &mut buf).unwrap();
        assert_eq!(&buf, b"world");
        assert_eq!(src.source_len(), Some(11));
    }

    #[test]
    fn slice_source_short_read_is_truncation() {
        let mut src: &[u8] = b"abc";
        let mut buf = [0u8; 2];
        assert!(matches!(
            src.read_source(2, &mut buf),
            Err(DecodeError::EndOfInput)
        ));
        assert!(matches!(
            src.read_source(u64::MAX, &mut buf),
            Err(DecodeError::EndOfInput)
        ));
    }

    #[test]
    fn seek_source_reads_at_offset() {
        let mut src = SeekSource::new(Cursor::new(b"0123456789".to_vec())).unwrap();
        assert_eq!(src.source_len(), Some(10));
        let mut buf = [0u8; 3];
        src.read_source(7, &mut buf).unwrap();
        assert_eq!(&buf, b"789");
        src.read_source(0, &mut buf).unwrap();
        assert_eq!(&buf, b"012");
        assert!(matches!(
            src.read_source(8, &mut buf),
            Err(DecodeError::EndOfInput)
        ));
        src.read_source(4, &mut buf).unwrap();
        assert_eq!(&buf, b"456");
    }

    /// Counts bytes pulled from the wrapped reader.
    struct Counting {
        inner: Cursor<Vec<u8>>,
        pulled: u64,
    }

    impl Read for Counting {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let n = self.inner.read(buf)?;
            self.pulled += n as u64;
            Ok(n)
        }
    }

    impl Seek for Counting {
        fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
            self.inner.seek(pos)
        }
    }

    #[test]
    fn buffered_seek_source_reuses_its_buffer() {
        let data: Vec<u8> = (0..1024 * 1024).map(|i| (i % 251) as u8).collect();
        let counting = Counting {
            inner: Cursor::new(data.clone()),
            pulled: 0,
        };
        let mut src =
            SeekSource::new(std::io::BufReader::with_capacity(64 * 1024, counting)).unwrap();

        let mut buf = [0u8; 4];
        for i in 0..1000u64 {
            src.read_source(i * 4, &mut buf).unwrap();
            assert_eq!(&buf[..], &data[i as usize * 4..i as usize * 4 + 4]);
        }
        // Short jumps inside the buffered block, backwards and forwards.
        for offset in [100u64, 40_000, 8, 60_000] {
            src.read_source(offset, &mut buf).unwrap();
            assert_eq!(&buf[..], &data[offset as usize..offset as usize + 4]);
        }

        let pulled = src.into_inner().into_inner().pulled;
        assert_eq!(pulled, 64 * 1024);

        // A far jump refills once.
        let counting = Counting {
            inner: Cursor::new(data.clone()),
            pulled: 0,
        };
        let mut src =
            SeekSource::new(std::io::BufReader::with_capacity(64 * 1024, counting)).unwrap();
        src.read_source(0, &mut buf).unwrap();
        src.read_source(512 * 1024, &mut buf).unwrap();
        assert_eq!(&buf[..], &data[512 * 1024..512 * 1024 + 4]);
        assert_eq!(src.into_inner().into_inner().pulled, 128 * 1024);
    }

    #[test]
    fn vec_target_reads_back_output() {
        let mut out = Vec::new();
        TargetStore::append(&mut out, b"abcdef").unwrap();
        let mut buf = [0u8; 2];
        out.read_at(3, &mut buf).unwrap();
        assert_eq!(&buf, b"de");
        assert_eq!(TargetStore::len(&out), 6);
        assert!(matches!(out.read_at(5, &mut buf), Err(DecodeError::EndOfInput)));
    }

    #[test]
    fn seek_target_restores_write_position() {
        let mut target = SeekTarget::new(Cursor::new(Vec::new())).unwrap();
        target.append(b"abcd").unwrap();

        let mut buf = [0u8; 2];
        target.read_at(1, &mut buf).unwrap();
        assert_eq!(&buf, b"bc");

        target.append(b"ef").unwrap();
        assert_eq!(target.len(), 6);
        assert_eq!(target.into_inner().unwrap().into_inner(), b"abcdef");
    }

    #[test]
    fn seek_target_rejects_reads_past_written_data() {
        let mut target = SeekTarget::new(Cursor::new(vec![0u8; 16])).unwrap();
        target.append(b"xy").unwrap();
        let mut buf = [0u8; 4];
        assert!(matches!(
            target.read_at(0, &mut buf),
            Err(DecodeError::EndOfInput)
        ));
    }
}
