//! Image-base offsets: signed 32-bit byte deltas from a module's load base.

use std::cmp::Ordering;
use std::fmt;

/// A signed 32-bit delta from a module's base address.
///
/// Microsoft RTTI records reference each other exclusively through offsets like this one rather
/// than absolute pointers, so that the records stay valid no matter where the image is rebased.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ibo32(pub i32);

impl Ibo32 {
    /// Builds an offset from a raw address and the module base it was read against.
    ///
    /// # Panics
    /// Panics if `addr - base` does not fit in an `i32`. Windows x86-64 images are capped at a
    /// few gigabytes, well inside this range; a value that doesn't fit indicates `addr` does not
    /// belong to the module at `base`.
    #[must_use]
    pub fn from_addr(addr: usize, base: usize) -> Self {
        let delta = addr as isize - base as isize;
        Self(i32::try_from(delta).expect("address is not within a 2^31-byte window of base"))
    }

    /// Recovers the raw address this offset denotes relative to `base`.
    #[must_use]
    pub fn to_addr(self, base: usize) -> usize {
        (base as isize + self.0 as isize) as usize
    }

    /// Re-bases this offset against a different module base, round-tripping through an address.
    #[must_use]
    pub fn rebase(self, old_base: usize, new_base: usize) -> Self {
        Self::from_addr(self.to_addr(old_base), new_base)
    }
}

impl fmt::Debug for Ibo32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ibo32({:#x})", self.0)
    }
}

impl fmt::Display for Ibo32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl PartialEq<i32> for Ibo32 {
    fn eq(&self, other: &i32) -> bool {
        self.0 == *other
    }
}

impl PartialOrd<i32> for Ibo32 {
    fn partial_cmp(&self, other: &i32) -> Option<Ordering> {
        self.0.partial_cmp(other)
    }
}
