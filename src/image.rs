//! PE section table parsing and containment queries.

use std::ptr;

use crate::error::ImageError;
use crate::ibo::Ibo32;
use crate::platform::Platform;

const DOS_MAGIC: u16 = 0x5A4D; // "MZ"
const PE_MAGIC: u32 = 0x0000_4550; // "PE\0\0"
const E_LFANEW_OFFSET: usize = 0x3C;
const SECTION_HEADER_SIZE: usize = 40;

/// A single PE section header, canonicalized to an owned name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// Section name, trimmed of trailing NULs (the on-disk field is at most 8 bytes).
    pub name: String,
    /// `virtual_size` from the section header.
    pub virtual_size: u32,
    /// Start of the section as an image-base offset.
    pub start: Ibo32,
    /// `start + virtual_size`, also as an image-base offset.
    pub end: Ibo32,
}

impl Section {
    /// True iff `ibo` falls in `[start, end)`.
    #[must_use]
    pub fn contains_ibo(&self, ibo: Ibo32) -> bool {
        ibo >= self.start && ibo < self.end
    }

    /// True iff the raw address `addr`, interpreted against `base`, falls in this section.
    #[must_use]
    pub fn contains_addr(&self, addr: usize, base: usize) -> bool {
        addr >= self.start.to_addr(base) && addr < self.end.to_addr(base)
    }
}

/// The parsed section table of a single loaded module.
#[derive(Debug, Clone)]
pub struct ImageMap {
    base: usize,
    size: usize,
    sections: Vec<Section>,
}

impl ImageMap {
    /// Parses the PE headers of the image mapped at `[base, base + size)` in this process's own
    /// address space.
    ///
    /// # Safety
    /// `[base, base + size)` must be readable memory containing a valid PE image as the Windows
    /// loader leaves it (i.e. this is meant to be called against a module actually loaded into
    /// the calling process, not an arbitrary file buffer read from disk).
    ///
    /// # Errors
    /// Returns [`ImageError::NotAnImage`] if the MZ/PE signatures don't match, or
    /// [`ImageError::Truncated`] if a computed header offset would read past `size`.
    pub unsafe fn parse(base: usize, size: usize) -> Result<Self, ImageError> {
        // SAFETY: caller guarantees `[base, base+size)` is readable and `size` covers at least
        // the DOS header; checked immediately below before any further reads.
        if size < E_LFANEW_OFFSET + 4 {
            return Err(ImageError::Truncated);
        }

        let dos_magic = unsafe { read_u16(base, 0) };
        if dos_magic != DOS_MAGIC {
            return Err(ImageError::NotAnImage);
        }

        let pe_off = unsafe { read_i32(base, E_LFANEW_OFFSET) };
        let pe_off = usize::try_from(pe_off).map_err(|_| ImageError::Truncated)?;
        if pe_off.checked_add(0x18).map(|e| e > size).unwrap_or(true) {
            return Err(ImageError::Truncated);
        }

        let pe_magic = unsafe { read_u32(base, pe_off) };
        if pe_magic != PE_MAGIC {
            return Err(ImageError::NotAnImage);
        }

        let section_count = unsafe { read_u16(base, pe_off + 0x06) } as usize;
        let optional_header_size = unsafe { read_u16(base, pe_off + 0x14) } as usize;
        let section_table = pe_off + 0x18 + optional_header_size;

        let table_end = section_table
            .checked_add(section_count * SECTION_HEADER_SIZE)
            .ok_or(ImageError::Truncated)?;
        if table_end > size {
            return Err(ImageError::Truncated);
        }

        let mut sections = Vec::with_capacity(section_count);
        for i in 0..section_count {
            let hdr = section_table + i * SECTION_HEADER_SIZE;

            // SAFETY: `hdr..hdr+40` was checked above to lie within `[base, base+size)`.
            let name_bytes = unsafe { read_bytes::<8>(base, hdr) };
            let name_len = name_bytes.iter().position(|&b| b == 0).unwrap_or(8);
            let name = String::from_utf8_lossy(&name_bytes[..name_len]).into_owned();

            let virtual_size = unsafe { read_u32(base, hdr + 0x08) };
            let virtual_addr = unsafe { read_u32(base, hdr + 0x0C) };

            let start = Ibo32(virtual_addr as i32);
            let end = Ibo32(start.0.wrapping_add(virtual_size as i32));

            sections.push(Section {
                name,
                virtual_size,
                start,
                end,
            });
        }

        Ok(Self {
            base,
            size,
            sections,
        })
    }

    /// Convenience constructor: asks `platform` for the running module's own base/size and
    /// parses it. This is the thin process-singleton layer; the core parser stays a pure
    /// function of an explicit `(base, size)`.
    ///
    /// # Safety
    /// `platform` must report the base/size of a module actually mapped into the calling
    /// process, matching the safety contract of [`Self::parse`].
    pub unsafe fn current(platform: &dyn Platform) -> Result<Self, ImageError> {
        let (base, size) = platform
            .module_base_and_size()
            .map_err(|_| ImageError::Truncated)?;
        // SAFETY: forwarded from the caller's contract above.
        unsafe { Self::parse(base, size) }
    }

    /// The module's load base address.
    #[must_use]
    pub fn base(&self) -> usize {
        self.base
    }

    /// The module's loaded image size.
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// All sections, in header encounter order.
    #[must_use]
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// All sections with the given canonicalized name, in encounter order, or `None` if no
    /// section has that name.
    #[must_use]
    pub fn sections_by_name(&self, name: &str) -> Option<Vec<&Section>> {
        let found: Vec<&Section> = self.sections.iter().filter(|s| s.name == name).collect();
        if found.is_empty() {
            None
        } else {
            Some(found)
        }
    }

    /// True iff `addr` falls inside any of `sections`.
    #[must_use]
    pub fn contains_addr(&self, addr: usize, sections: &[&Section]) -> bool {
        sections.iter().any(|s| s.contains_addr(addr, self.base))
    }

    /// True iff `ibo` falls inside any of `sections`.
    #[must_use]
    pub fn contains_ibo(&self, ibo: Ibo32, sections: &[&Section]) -> bool {
        sections.iter().any(|s| s.contains_ibo(ibo))
    }

    /// True iff `addr` lies anywhere in the named section (a shorthand for the common single
    /// "does this pointer live in `.rdata`" style check used throughout RTTI validation).
    #[must_use]
    pub fn addr_in_section(&self, addr: usize, name: &str) -> bool {
        match self.sections_by_name(name) {
            Some(sections) => self.contains_addr(addr, &sections),
            None => false,
        }
    }

    /// True iff `ibo` lies anywhere in the named section.
    #[must_use]
    pub fn ibo_in_section(&self, ibo: Ibo32, name: &str) -> bool {
        match self.sections_by_name(name) {
            Some(sections) => self.contains_ibo(ibo, &sections),
            None => false,
        }
    }
}

/// # Safety
/// `base + offset .. base + offset + 2` must be valid to read.
unsafe fn read_u16(base: usize, offset: usize) -> u16 {
    // SAFETY: forwarded from caller.
    unsafe { ptr::read_unaligned((base + offset) as *const u16) }
}

/// # Safety
/// `base + offset .. base + offset + 4` must be valid to read.
pub(crate) unsafe fn read_u32(base: usize, offset: usize) -> u32 {
    // SAFETY: forwarded from caller.
    unsafe { ptr::read_unaligned((base + offset) as *const u32) }
}

/// # Safety
/// `base + offset .. base + offset + 4` must be valid to read.
unsafe fn read_i32(base: usize, offset: usize) -> i32 {
    // SAFETY: forwarded from caller.
    unsafe { ptr::read_unaligned((base + offset) as *const i32) }
}

/// # Safety
/// `base + offset .. base + offset + 8` must be valid to read.
pub(crate) unsafe fn read_usize(base: usize, offset: usize) -> usize {
    // SAFETY: forwarded from caller.
    unsafe { ptr::read_unaligned((base + offset) as *const usize) }
}

/// # Safety
/// `base + offset .. base + offset + N` must be valid to read.
unsafe fn read_bytes<const N: usize>(base: usize, offset: usize) -> [u8; N] {
    // SAFETY: forwarded from caller.
    unsafe { ptr::read_unaligned((base + offset) as *const [u8; N]) }
}

/// Reads a raw, `repr(C)` POD struct out of process memory by unaligned copy.
///
/// # Safety
/// `addr .. addr + size_of::<T>()` must be valid to read, and every bit pattern must be a valid
/// `T` (true for the plain integer/offset structs this crate reads RTTI records into).
pub(crate) unsafe fn read_pod<T: Copy>(addr: usize) -> T {
    // SAFETY: forwarded from caller.
    unsafe { ptr::read_unaligned(addr as *const T) }
}
