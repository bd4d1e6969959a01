// VCDIFF address cache (RFC 3284, Section 5.1-5.3).
//
// Resolves COPY addresses through the NEAR and SAME caches. The cache
// is cleared at the start of every window and never carries state
// across windows.

use super::error::DecodeError;
use super::varint::Section;

// ---------------------------------------------------------------------------
// Address modes (RFC 3284 Section 5.3)
// ---------------------------------------------------------------------------

/// Absolute address.
pub const VCD_SELF: u8 = 0;
/// Address relative to "here" (current position in address space).
pub const VCD_HERE: u8 = 1;

pub const DEFAULT_NEAR_SLOTS: u8 = 4;
pub const DEFAULT_SAME_SLOTS: u8 = 3;

/// Address mode class, derived from the numeric mode and cache sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressMode {
    SelfAddr,
    Here,
    Near(usize),
    Same(usize),
}

// ---------------------------------------------------------------------------
// Address cache
// ---------------------------------------------------------------------------

/// NEAR/SAME address cache.
///
/// Default configuration (s_near=4, s_same=3) gives 9 address modes:
///   0      VCD_SELF  absolute
///   1      VCD_HERE  here - value
///   2..5   NEAR      near\[mode-2\] + value
///   6..8   SAME      same\[(mode-6)*256 + byte\]
#[derive(Debug, Clone)]
pub struct AddressCache {
    s_near: u8,
    s_same: u8,
    near: Vec<u32>,
    same: Vec<u32>,
    next_slot: usize,
}

impl AddressCache {
    /// Default RFC 3284 cache: s_near=4, s_same=3.
    pub fn new() -> Self {
        Self::with_sizes(DEFAULT_NEAR_SLOTS, DEFAULT_SAME_SLOTS)
    }

    pub fn with_sizes(s_near: u8, s_same: u8) -> Self {
        Self {
            s_near,
            s_same,
            near: vec![0; usize::from(s_near)],
            same: vec![0; usize::from(s_same) * 256],
            next_slot: 0,
        }
    }

    /// Clear both caches. Called at the start of each window.
    pub fn reset(&mut self) {
        self.near.fill(0);
        self.same.fill(0);
        self.next_slot = 0;
    }

    #[inline]
    pub fn s_near(&self) -> u8 {
        self.s_near
    }

    #[inline]
    pub fn s_same(&self) -> u8 {
        self.s_same
    }

    /// Total number of address modes (2 + s_near + s_same).
    #[inline]
    pub fn mode_count(&self) -> usize {
        2 + usize::from(self.s_near) + usize::from(self.s_same)
    }

    /// Classify a numeric mode, or `None` if it is out of range.
    pub fn mode(&self, mode: u8) -> Option<AddressMode> {
        let m = usize::from(mode);
        let same_start = 2 + usize::from(self.s_near);
        match m {
            0 => Some(AddressMode::SelfAddr),
            1 => Some(AddressMode::Here),
            _ if m < same_start => Some(AddressMode::Near(m - 2)),
            _ if m < self.mode_count() => Some(AddressMode::Same(m - same_start)),
            _ => None,
        }
    }

    /// Record a resolved address in both caches.
    #[inline]
    fn update(&mut self, addr: u32) {
        if self.s_near > 0 {
            self.near[self.next_slot] = addr;
            self.next_slot = (self.next_slot + 1) % usize::from(self.s_near);
        }
        if self.s_same > 0 {
            let idx = addr as usize % (usize::from(self.s_same) * 256);
            self.same[idx] = addr;
        }
    }

    /// Resolve a COPY address.
    ///
    /// `here` is the current position in the window's address space
    /// (source segment length + bytes decoded so far in this window).
    /// Operands are consumed from the address section. The resolved
    /// address must lie before `here`.
    pub fn resolve(&mut self, here: u32, mode: u8, addresses: &mut Section) -> Result<u32, DecodeError> {
        let addr = match self.mode(mode).ok_or(DecodeError::InvalidAddressMode(mode))? {
            AddressMode::SelfAddr => addresses.read_u32()?,
            AddressMode::Here => here
                .checked_sub(addresses.read_u32()?)
                .ok_or(DecodeError::InvalidCopyAddress)?,
            AddressMode::Near(slot) => self.near[slot]
                .checked_add(addresses.read_u32()?)
                .ok_or(DecodeError::InvalidCopyAddress)?,
            AddressMode::Same(group) => {
                let byte = addresses.read_byte()?;
                self.same[group * 256 + usize::from(byte)]
            }
        };

        self.update(addr);

        if addr >= here {
            return Err(DecodeError::InvalidCopyAddress);
        }
        Ok(addr)
    }
}

impl Default for AddressCache {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
