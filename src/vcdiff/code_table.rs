// VCDIFF default code table (RFC 3284, Section 5.6).
//
// Byte-for-byte the table of RFC 3284 Appendix A, generated from the
// same descriptor xdelta3 uses (`__rfc3284_code_table_desc`).  The
// generated table has exactly 256 entries.

use std::sync::LazyLock;

/// Instruction types, numbered as in RFC 3284 Section 5.4.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum InstructionType {
    #[default]
    Noop = 0,
    Add = 1,
    Run = 2,
    Copy = 3,
}

/// Minimum match length for COPY instructions (RFC 3284).
pub const MIN_MATCH: u8 = 4;

/// One half of a code table entry.
///
/// `size == 0` means the actual size follows as a varint in the
/// instruction section.  `mode` is only meaningful for COPY.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HalfInstruction {
    pub kind: InstructionType,
    pub size: u8,
    pub mode: u8,
}

impl HalfInstruction {
    const NOOP: Self = Self {
        kind: InstructionType::Noop,
        size: 0,
        mode: 0,
    };

    const fn add(size: u8) -> Self {
        Self {
            kind: InstructionType::Add,
            size,
            mode: 0,
        }
    }

    const fn copy(size: u8, mode: u8) -> Self {
        Self {
            kind: InstructionType::Copy,
            size,
            mode,
        }
    }
}

/// A single entry in the 256-element code table: up to two instructions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CodeTableEntry {
    pub first: HalfInstruction,
    pub second: HalfInstruction,
}

impl CodeTableEntry {
    const fn single(first: HalfInstruction) -> Self {
        Self {
            first,
            second: HalfInstruction::NOOP,
        }
    }
}

/// The complete 256-entry VCDIFF code table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CodeTable {
    entries: [CodeTableEntry; 256],
}

impl CodeTable {
    /// The shared default RFC 3284 table.
    pub fn rfc3284() -> &'static CodeTable {
        static TABLE: LazyLock<CodeTable> = LazyLock::new(build_default_code_table);
        &TABLE
    }

    /// The two chained instructions for an opcode.
    #[inline]
    pub fn lookup(&self, code: u8) -> (HalfInstruction, HalfInstruction) {
        let entry = &self.entries[usize::from(code)];
        (entry.first, entry.second)
    }

    pub fn entries(&self) -> &[CodeTableEntry; 256] {
        &self.entries
    }
}

/// Build the default RFC 3284 code table.
fn build_default_code_table() -> CodeTable {
    let mut tbl = [CodeTableEntry::default(); 256];
    let mut idx: usize = 0;

    // Descriptor constants (from __rfc3284_code_table_desc).
    const ADD_SIZES: u8 = 17;
    const NEAR_MODES: u8 = 4;
    const SAME_MODES: u8 = 3;
    const CPY_SIZES: u8 = 15;
    const ADDCOPY_ADD_MAX: u8 = 4;
    const ADDCOPY_NEAR_CPY_MAX: u8 = 6;
    const ADDCOPY_SAME_CPY_MAX: u8 = 4;
    const COPYADD_ADD_MAX: u8 = 1;
    const COPYADD_NEAR_CPY_MAX: u8 = 4;
    const COPYADD_SAME_CPY_MAX: u8 = 4;
    const CPY_MODES: u8 = 2 + NEAR_MODES + SAME_MODES; // 9
    const NEAR_LIMIT: u8 = 2 + NEAR_MODES;

    // --- Index 0: RUN size=0 ---
    tbl[idx] = CodeTableEntry::single(HalfInstruction {
        kind: InstructionType::Run,
        size: 0,
        mode: 0,
    });
    idx += 1;

    // --- Indices 1..18: ADD size=0, then 1..17 ---
    for size in 0..=ADD_SIZES {
        tbl[idx] = CodeTableEntry::single(HalfInstruction::add(size));
        idx += 1;
    }

    // --- COPY instructions: for each mode, size=0 then sizes 4..18 ---
    for mode in 0..CPY_MODES {
        tbl[idx] = CodeTableEntry::single(HalfInstruction::copy(0, mode));
        idx += 1;

        for size in MIN_MATCH..MIN_MATCH + CPY_SIZES {
            tbl[idx] = CodeTableEntry::single(HalfInstruction::copy(size, mode));
            idx += 1;
        }
    }

    // --- ADD+COPY double instructions ---
    for mode in 0..CPY_MODES {
        let cpy_max = if mode < NEAR_LIMIT {
            ADDCOPY_NEAR_CPY_MAX
        } else {
            ADDCOPY_SAME_CPY_MAX
        };

        for add_size in 1..=ADDCOPY_ADD_MAX {
            for cpy_size in MIN_MATCH..=cpy_max {
                tbl[idx] = CodeTableEntry {
                    first: HalfInstruction::add(add_size),
                    second: HalfInstruction::copy(cpy_size, mode),
                };
                idx += 1;
            }
        }
    }

    // --- COPY+ADD double instructions ---
    for mode in 0..CPY_MODES {
        let cpy_max = if mode < NEAR_LIMIT {
            COPYADD_NEAR_CPY_MAX
        } else {
            COPYADD_SAME_CPY_MAX
        };

        for cpy_size in MIN_MATCH..=cpy_max {
            for add_size in 1..=COPYADD_ADD_MAX {
                tbl[idx] = CodeTableEntry {
                    first: HalfInstruction::copy(cpy_size, mode),
                    second: HalfInstruction::add(add_size),
                };
                idx += 1;
            }
        }
    }

    debug_assert_eq!(idx, 256, "code table must have exactly 256 entries");
    CodeTable { entries: tbl }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use InstructionType::{Add, Copy, Noop, Run};

    fn t() -> &'static CodeTable {
        CodeTable::rfc3284()
    }

    fn half(kind: InstructionType, size: u8, mode: u8) -> HalfInstruction {
        HalfInstruction { kind, size, mode }
    }

    #[test]
    fn index_0_is_run() {
        assert_eq!(t().lookup(0), (half(Run, 0, 0), half(Noop, 0, 0)));
    }

    #[test]
    fn indices_1_to_18_are_add() {
        for (code, size) in (1..=18u8).zip(0..=17u8) {
            assert_eq!(t().lookup(code), (half(Add, size, 0), half(Noop, 0, 0)), "code {code}");
        }
    }

    #[test]
    fn copy_blocks_per_mode() {
        for mode in 0..9u8 {
            let base = 19 + 16 * mode;
            assert_eq!(t().lookup(base).0, half(Copy, 0, mode));
            for (offset, size) in (1..=15u8).zip(4..=18u8) {
                let (first, second) = t().lookup(base + offset);
                assert_eq!(first, half(Copy, size, mode));
                assert_eq!(second.kind, Noop);
            }
        }
        assert_eq!(t().lookup(162).0, half(Copy, 18, 8));
    }

    #[test]
    fn add_copy_doubles() {
        // 163: ADD(1)+COPY(4,mode 0)
        assert_eq!(t().lookup(163), (half(Add, 1, 0), half(Copy, 4, 0)));
        // 174: ADD(4)+COPY(6,mode 0)
        assert_eq!(t().lookup(174), (half(Add, 4, 0), half(Copy, 6, 0)));
        // 175: mode 1 starts
        assert_eq!(t().lookup(175), (half(Add, 1, 0), half(Copy, 4, 1)));
        // 235..246: SAME modes, copy size fixed at 4
        assert_eq!(t().lookup(235), (half(Add, 1, 0), half(Copy, 4, 6)));
        assert_eq!(t().lookup(246), (half(Add, 4, 0), half(Copy, 4, 8)));
    }

    #[test]
    fn copy_add_doubles() {
        assert_eq!(t().lookup(247), (half(Copy, 4, 0), half(Add, 1, 0)));
        assert_eq!(t().lookup(255), (half(Copy, 4, 8), half(Add, 1, 0)));
    }

    #[test]
    fn all_doubles_have_nonzero_sizes() {
        for (i, entry) in t().entries().iter().enumerate() {
            if entry.second.kind != Noop {
                assert_ne!(entry.first.size, 0, "double at {i} has size1=0");
                assert_ne!(entry.second.size, 0, "double at {i} has size2=0");
            }
        }
    }

    #[test]
    fn only_copy_carries_a_mode() {
        for entry in t().entries() {
            for h in [entry.first, entry.second] {
                if h.kind != Copy {
                    assert_eq!(h.mode, 0);
                }
            }
        }
    }
}
