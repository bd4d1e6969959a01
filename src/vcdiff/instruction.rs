// VCDIFF instruction execution (RFC 3284, Section 5.4).
//
// Each half of a code table entry becomes one `Instruction`. Operands are
// consumed from the window's three sections and the produced bytes are
// appended to the window buffer. The buffer holds only the current
// window, so address `src_len + i` in the window's address space is
// `out[i]`.

use std::fmt;

use super::address_cache::AddressCache;
use super::code_table::{HalfInstruction, InstructionType};
use super::error::DecodeError;
use super::stream::{SourceProvider, TargetStore};
use super::window::Window;

/// A fully resolved instruction, as executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    Noop,
    Add { size: u32 },
    Run { size: u32, byte: u8 },
    Copy { size: u32, mode: u8, address: u32 },
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Noop => f.write_str("NOOP"),
            Self::Add { size } => write!(f, "ADD {size:04X}"),
            Self::Run { size, byte } => write!(f, "RUN {size:04X}, 0x{byte:02X}"),
            Self::Copy { size, address, .. } => write!(f, "COPY {size:04X}, {address:04X}"),
        }
    }
}

/// Executes instructions of one window against the source, the target
/// produced by earlier windows, and the window buffer.
pub struct InstructionExecutor<'a, S, T> {
    window: &'a mut Window,
    cache: &'a mut AddressCache,
    source: &'a mut S,
    target: &'a mut T,
    out: &'a mut Vec<u8>,
}

impl<'a, S: SourceProvider, T: TargetStore> InstructionExecutor<'a, S, T> {
    pub fn new(
        window: &'a mut Window,
        cache: &'a mut AddressCache,
        source: &'a mut S,
        target: &'a mut T,
        out: &'a mut Vec<u8>,
    ) -> Self {
        Self {
            window,
            cache,
            source,
            target,
            out,
        }
    }

    /// Read the next opcode from the instruction section, or `None` once
    /// the section is exhausted.
    pub fn next_opcode(&mut self) -> Result<Option<u8>, DecodeError> {
        if self.window.instructions.is_exhausted() {
            return Ok(None);
        }
        Ok(Some(self.window.instructions.read_byte()?))
    }

    /// Execute one half of a code table entry.
    pub fn execute(&mut self, half: HalfInstruction) -> Result<Instruction, DecodeError> {
        if half.kind == InstructionType::Noop {
            return Ok(Instruction::Noop);
        }

        let size = if half.size == 0 {
            self.window.instructions.read_u32()?
        } else {
            u32::from(half.size)
        };
        self.check_room(size)?;

        let instruction = match half.kind {
            InstructionType::Noop => Instruction::Noop,
            InstructionType::Add => {
                let data = self.window.data.read_bytes(size)?;
                self.out.extend_from_slice(data);
                Instruction::Add { size }
            }
            InstructionType::Run => {
                let byte = self.window.data.read_byte()?;
                self.out.resize(self.out.len() + size as usize, byte);
                Instruction::Run { size, byte }
            }
            InstructionType::Copy => {
                let address = self.copy(size, half.mode)?;
                Instruction::Copy {
                    size,
                    mode: half.mode,
                    address,
                }
            }
        };
        Ok(instruction)
    }

    /// Fail before allocating if `size` more bytes would overrun the window.
    fn check_room(&self, size: u32) -> Result<(), DecodeError> {
        let expected = self.window.target_window_length;
        let written = self.out.len() as u64 + u64::from(size);
        if written > u64::from(expected) {
            return Err(DecodeError::TargetWindowOverrun { expected, written });
        }
        Ok(())
    }

    fn copy(&mut self, size: u32, mode: u8) -> Result<u32, DecodeError> {
        let src_len = self.window.source_segment_length;
        // Bounded by src_len + target_window_length, checked when parsed.
        let here = src_len + self.out.len() as u32;
        let address = self.cache.resolve(here, mode, &mut self.window.addresses)?;

        if !self.window.has_copy_segment() {
            return Err(DecodeError::UnknownCopySource);
        }

        // Span 1: the copy segment.
        let from_segment = if address < src_len {
            size.min(src_len - address)
        } else {
            0
        };
        if from_segment > 0 {
            let offset = u64::from(self.window.source_segment_offset) + u64::from(address);
            let start = self.out.len();
            self.out.resize(start + from_segment as usize, 0);
            let buf = &mut self.out[start..];
            if self.window.has_target() {
                self.target.read_at(offset, buf)?;
            } else {
                self.source.read_source(offset, buf)?;
            }
        }

        // Span 2: earlier bytes of this window, possibly overlapping the
        // bytes being written.
        let mut remaining = (size - from_segment) as usize;
        if remaining > 0 {
            let mut cursor = (address + from_segment - src_len) as usize;
            while remaining > 0 {
                let chunk = remaining.min(self.out.len() - cursor);
                self.out.extend_from_within(cursor..cursor + chunk);
                cursor += chunk;
                remaining -= chunk;
            }
        }

        Ok(address)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vcdiff::address_cache::{VCD_HERE, VCD_SELF};
    use crate::vcdiff::varint::Section;
    use crate::vcdiff::window::WindowIndicator;

    fn window(indicator: WindowIndicator, src_len: u32, target_len: u32) -> Window {
        Window {
            indicator,
            source_segment_length: src_len,
            target_window_length: target_len,
            ..Window::default()
        }
    }

    fn add(size: u8) -> HalfInstruction {
        HalfInstruction {
            kind: InstructionType::Add,
            size,
            mode: 0,
        }
    }

    fn run(size: u8) -> HalfInstruction {
        HalfInstruction {
            kind: InstructionType::Run,
            size,
            mode: 0,
        }
    }

    fn copy(size: u8, mode: u8) -> HalfInstruction {
        HalfInstruction {
            kind: InstructionType::Copy,
            size,
            mode,
        }
    }

    /// Run `halves` against a fresh executor and return the window buffer.
    fn exec(
        mut w: Window,
        source: &[u8],
        target: &mut Vec<u8>,
        halves: &[HalfInstruction],
    ) -> Result<Vec<u8>, DecodeError> {
        let mut cache = AddressCache::new();
        let mut src = source;
        let mut out = Vec::new();
        let mut exec = InstructionExecutor::new(&mut w, &mut cache, &mut src, target, &mut out);
        for &half in halves {
            exec.execute(half)?;
        }
        Ok(out)
    }

    #[test]
    fn add_and_run() {
        let mut w = window(WindowIndicator::empty(), 0, 6);
        w.data = Section::new(vec![b'a', b'b', b'c', b'z']);
        let out = exec(w, &[], &mut Vec::new(), &[add(3), run(3)]).unwrap();
        assert_eq!(out, b"abczzz");
    }

    #[test]
    fn size_zero_reads_varint_from_instructions() {
        let mut w = window(WindowIndicator::empty(), 0, 200);
        w.instructions = Section::new(vec![0x81, 0x48]); // 200
        w.data = Section::new(vec![0x55]);
        let out = exec(w, &[], &mut Vec::new(), &[run(0)]).unwrap();
        assert_eq!(out, vec![0x55; 200]);
    }

    #[test]
    fn noop_consumes_nothing() {
        let mut w = window(WindowIndicator::empty(), 0, 0);
        w.instructions = Section::new(vec![0x05]);
        let mut cache = AddressCache::new();
        let mut src: &[u8] = &[];
        let mut target = Vec::new();
        let mut out = Vec::new();
        let mut exec = InstructionExecutor::new(&mut w, &mut cache, &mut src, &mut target, &mut out);
        assert_eq!(exec.execute(HalfInstruction::default()).unwrap(), Instruction::Noop);
        assert_eq!(exec.next_opcode().unwrap(), Some(0x05));
        assert_eq!(exec.next_opcode().unwrap(), None);
    }

    #[test]
    fn copy_from_source_segment() {
        let mut w = window(WindowIndicator::SOURCE, 8, 4);
        w.source_segment_offset = 2;
        w.addresses = Section::new(vec![3]);
        let out = exec(w, b"0123456789ABCDEF", &mut Vec::new(), &[copy(4, VCD_SELF)]).unwrap();
        // segment starts at 2, address 3 -> absolute 5
        assert_eq!(out, b"5678");
    }

    #[test]
    fn copy_from_earlier_target_windows() {
        let mut target = b"previous".to_vec();
        let mut w = window(WindowIndicator::TARGET, 4, 4);
        w.source_segment_offset = 4;
        w.addresses = Section::new(vec![0]);
        let out = exec(w, &[], &mut target, &[copy(4, VCD_SELF)]).unwrap();
        assert_eq!(out, b"ious");
    }

    #[test]
    fn target_flag_wins_over_source_flag() {
        let mut target = b"TTTT".to_vec();
        let mut w = window(WindowIndicator::SOURCE | WindowIndicator::TARGET, 4, 4);
        w.addresses = Section::new(vec![0]);
        let out = exec(w, b"SSSS", &mut target, &[copy(4, VCD_SELF)]).unwrap();
        assert_eq!(out, b"TTTT");
    }

    #[test]
    fn copy_spanning_segment_and_window() {
        // Segment "ab", then ADD "c", then COPY 5 from address 0:
        // "ab" from the segment, then "cab" expanded from the window.
        let mut w = window(WindowIndicator::SOURCE, 2, 6);
        w.data = Section::new(vec![b'c']);
        w.addresses = Section::new(vec![0]);
        let out = exec(w, b"ab", &mut Vec::new(), &[add(1), copy(5, VCD_SELF)]).unwrap();
        assert_eq!(out, b"cabcab");
    }

    #[test]
    fn overlapping_copy_expands_run() {
        // ADD "x", then COPY 10 from one byte behind `here`.
        let mut w = window(WindowIndicator::SOURCE, 0, 11);
        w.data = Section::new(vec![b'x']);
        w.instructions = Section::new(vec![10]);
        w.addresses = Section::new(vec![1]);
        let out = exec(w, &[], &mut Vec::new(), &[add(1), copy(0, VCD_HERE)]).unwrap();
        assert_eq!(out, vec![b'x'; 11]);
    }

    #[test]
    fn overlapping_copy_repeats_pattern() {
        let mut w = window(WindowIndicator::SOURCE, 0, 10);
        w.data = Section::new(b"abc".to_vec());
        w.addresses = Section::new(vec![3]);
        let out = exec(w, &[], &mut Vec::new(), &[add(3), copy(7, VCD_HERE)]).unwrap();
        assert_eq!(out, b"abcabcabca");
    }

    #[test]
    fn copy_without_segment_flag_fails() {
        let mut w = window(WindowIndicator::empty(), 0, 5);
        w.data = Section::new(vec![b'a']);
        w.addresses = Section::new(vec![0]);
        assert!(matches!(
            exec(w, &[], &mut Vec::new(), &[add(1), copy(4, VCD_SELF)]),
            Err(DecodeError::UnknownCopySource)
        ));
    }

    #[test]
    fn copy_at_or_after_here_fails() {
        let mut w = window(WindowIndicator::SOURCE, 4, 4);
        w.addresses = Section::new(vec![4]);
        assert!(matches!(
            exec(w, b"abcd", &mut Vec::new(), &[copy(4, VCD_SELF)]),
            Err(DecodeError::InvalidCopyAddress)
        ));
    }

    #[test]
    fn overrun_is_caught_before_allocation() {
        let mut w = window(WindowIndicator::empty(), 0, 4);
        w.instructions = Section::new(vec![0x8F, 0xFF, 0xFF, 0xFF, 0x7F]);
        w.data = Section::new(vec![0]);
        assert!(matches!(
            exec(w, &[], &mut Vec::new(), &[run(0)]),
            Err(DecodeError::TargetWindowOverrun {
                expected: 4,
                written: 0xFFFF_FFFF
            })
        ));
    }

    #[test]
    fn short_data_section_is_truncation() {
        let mut w = window(WindowIndicator::empty(), 0, 4);
        w.data = Section::new(vec![1, 2]);
        assert!(matches!(
            exec(w, &[], &mut Vec::new(), &[add(4)]),
            Err(DecodeError::EndOfInput)
        ));
    }

    #[test]
    fn display() {
        assert_eq!(Instruction::Noop.to_string(), "NOOP");
        assert_eq!(Instruction::Add { size: 4 }.to_string(), "ADD 0004");
        assert_eq!(
            Instruction::Run {
                size: 16,
                byte: 0xAA
            }
            .to_string(),
            "RUN 0010, 0xAA"
        );
        assert_eq!(
            Instruction::Copy {
                size: 4,
                mode: 0,
                address: 16
            }
            .to_string(),
            "COPY 0004, 0010"
        );
    }
}
