//! Microsoft RTTI record discovery: `CompleteObjectLocator` scanning and validation.

use std::collections::HashMap;
use std::ffi::CStr;
use std::slice;
use std::sync::OnceLock;

use crate::error::{ImageError, RttiError};
use crate::ibo::Ibo32;
use crate::image::{read_pod, read_usize, ImageMap};
use crate::platform::Platform;
use crate::scan::scan_ctor_pattern;

const PTR_SIZE: usize = 8;

/// On-disk `CompleteObjectLocator` layout (x86-64, image-relative mode). 20 bytes.
#[derive(Clone, Copy)]
#[repr(C)]
struct RawCol {
    signature: u32,
    _offset: u32,
    _constructor_disp: u32,
    ibo_td: i32,
    ibo_chd: i32,
}

/// On-disk `ClassHierarchyDescriptor` layout. 16 bytes.
#[derive(Clone, Copy)]
#[repr(C)]
struct RawChd {
    _signature: u32,
    _flags: u32,
    _num_base_classes: u32,
    ibo_base_class_array: i32,
}

/// `signature == 1` marks x86-64 image-relative RTTI records.
const COL_SIGNATURE_X64: u32 = 1;

/// A fully-validated RTTI record for one class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RttiRecord {
    /// Address of the class's vtable (the address callers install VFT hooks against).
    pub vft_addr: usize,
    /// Address of the `CompleteObjectLocator`.
    pub col_addr: usize,
    /// Address of the `TypeDescriptor`.
    pub td_addr: usize,
    /// Address of the `ClassHierarchyDescriptor`.
    pub chd_addr: usize,
    /// Address of the (first) `BaseClassDescriptor`.
    pub bcd_addr: usize,
    /// Demangled class name; the identity key under which this record is stored.
    pub demangled_name: String,
}

/// Which scan strategies to run, and whether to fan the per-section work out over a thread pool.
#[derive(Debug, Clone, Copy)]
pub struct ScanConfig {
    /// Run strategy (A): the SIMD constructor-pattern scan over `.text`.
    pub strategy_a: bool,
    /// Run strategy (B): the `.rdata` pointer sweep.
    pub strategy_b: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            strategy_a: true,
            strategy_b: true,
        }
    }
}

/// A process-wide (or test-local) name -> RTTI record table, built by [`RttiIndex::scan`].
#[derive(Debug, Default)]
pub struct RttiIndex {
    records: HashMap<String, RttiRecord>,
}

impl RttiIndex {
    /// Scans `image` for RTTI records per `config`, consulting `platform` for demangling.
    ///
    /// # Safety
    /// `image` must describe a region of this process's own address space that is actually
    /// mapped and readable for its full `[base, base+size)` extent; this function dereferences
    /// raw pointers computed from section contents.
    ///
    /// # Errors
    /// Returns [`RttiError::ScanInitFailed`] if `.text`, `.data`, or `.rdata` is missing.
    pub unsafe fn scan(
        image: &ImageMap,
        platform: &dyn Platform,
        config: &ScanConfig,
    ) -> Result<Self, RttiError> {
        let text_sections = image
            .sections_by_name(".text")
            .ok_or(RttiError::ScanInitFailed(ImageError::MissingSection("text")))?;
        let rdata_sections = image.sections_by_name(".rdata").ok_or(
            RttiError::ScanInitFailed(ImageError::MissingSection("rdata")),
        )?;
        image
            .sections_by_name(".data")
            .ok_or(RttiError::ScanInitFailed(ImageError::MissingSection("data")))?;

        let mut records: HashMap<String, RttiRecord> = HashMap::new();

        if config.strategy_a {
            for section in &text_sections {
                let section_addr = section.start.to_addr(image.base());
                let len = section.virtual_size as usize;
                // SAFETY: forwarded from this function's safety contract; `section` was parsed
                // from `image`'s own header and lies within `[base, base+size)`.
                let bytes = unsafe { slice::from_raw_parts(section_addr as *const u8, len) };

                for m in scan_ctor_pattern(bytes) {
                    let p = section_addr + m.offset;
                    let vft_addr = p.wrapping_add(7).wrapping_add(m.disp32 as isize as usize);

                    if vft_addr < PTR_SIZE {
                        continue;
                    }
                    // SAFETY: reading one pointer-sized value; `vft_addr - 8` is only
                    // dereferenced after this (still within the forwarded safety contract —
                    // scan candidates that fall outside the image are rejected by the
                    // `.rdata`-containment check immediately below, which never dereferences an
                    // address that hasn't first been range-checked against `image`).
                    let col_ptr_slot_addr = vft_addr - PTR_SIZE;
                    if !image.addr_in_section(col_ptr_slot_addr, ".rdata") {
                        continue;
                    }
                    // SAFETY: `col_ptr_slot_addr` was just checked to lie within `.rdata`, which
                    // is part of `image`'s mapped extent.
                    let col_addr = unsafe { read_usize(col_ptr_slot_addr, 0) };
                    if !image.addr_in_section(col_addr, ".rdata") {
                        continue;
                    }

                    // SAFETY: `col_addr` is within `.rdata`, validated above.
                    if let Some(record) = unsafe { validate_col(image, platform, col_addr, vft_addr) } {
                        insert_record(&mut records, record);
                    }
                }
            }
        }

        if config.strategy_b {
            for section in &rdata_sections {
                let section_addr = section.start.to_addr(image.base());
                let len = section.virtual_size as usize;
                let mut offset = 0usize;

                while offset + PTR_SIZE <= len {
                    let slot_addr = section_addr + offset;
                    // SAFETY: `slot_addr` is within `[section_addr, section_addr+len)`, which is
                    // within `image`'s mapped extent per this function's safety contract.
                    let col_addr = unsafe { read_usize(slot_addr, 0) };

                    if image.addr_in_section(col_addr, ".rdata") {
                        let vft_addr = slot_addr + PTR_SIZE;
                        if vft_addr + PTR_SIZE <= section_addr + len {
                            // SAFETY: just bounds-checked against this `.rdata` section's extent.
                            let next = unsafe { read_usize(vft_addr, 0) };
                            if image.addr_in_section(next, ".text") {
                                // SAFETY: `col_addr` was just validated to lie within `.rdata`.
                                if let Some(record) =
                                    unsafe { validate_col(image, platform, col_addr, vft_addr) }
                                {
                                    insert_record(&mut records, record);
                                }
                            }
                        }
                    }

                    // Advance exactly one pointer-aligned slot per iteration regardless of
                    // whether this candidate validated, per this crate's resolution of the
                    // source's uneven pre/post-increment stepping (documented in DESIGN.md).
                    offset += PTR_SIZE;
                }
            }
        }

        Ok(Self { records })
    }

    /// Looks up a previously scanned class by its demangled name.
    #[must_use]
    pub fn get(&self, class_name: &str) -> Option<&RttiRecord> {
        self.records.get(class_name)
    }

    /// Number of distinct classes recovered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True iff no classes were recovered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterates all recovered records.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &RttiRecord)> {
        self.records.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Process-wide convenience layer over [`ImageMap::current`] + [`Self::scan`]: scans the
    /// calling process's own main module at most once, caching the result for every later call
    /// (including calls from other threads) for the remaining lifetime of the process.
    ///
    /// # Safety
    /// Same contract as [`ImageMap::current`] and [`Self::scan`]: `platform` must report the
    /// base/size of a module actually mapped into the calling process.
    ///
    /// # Errors
    /// Returns [`RttiError::ScanInitFailed`] if the one-time scan fails. The failure is not
    /// cached, so a later call (e.g. once the module has finished loading) can still succeed.
    pub unsafe fn process_wide(
        platform: &dyn Platform,
        config: &ScanConfig,
    ) -> Result<&'static Self, RttiError> {
        if let Some(existing) = PROCESS_WIDE.get() {
            return Ok(existing);
        }

        // SAFETY: forwarded from this function's safety contract.
        let image = unsafe { ImageMap::current(platform) }.map_err(RttiError::ScanInitFailed)?;
        // SAFETY: `image` was just built from `platform`'s own report of the current process.
        let index = unsafe { Self::scan(&image, platform, config) }?;

        // Another thread may have won this race and already initialized the cell; either way,
        // `get()` now returns a value.
        let _ = PROCESS_WIDE.set(index);
        Ok(PROCESS_WIDE.get().expect("just set or already set by a racing thread"))
    }
}

/// Backing cell for [`RttiIndex::process_wide`].
static PROCESS_WIDE: OnceLock<RttiIndex> = OnceLock::new();

fn insert_record(records: &mut HashMap<String, RttiRecord>, record: RttiRecord) {
    if records.contains_key(&record.demangled_name) {
        tracing::debug!(name = %record.demangled_name, "duplicate RTTI record; keeping first");
        return;
    }
    records.insert(record.demangled_name.clone(), record);
}

/// Runs specification step §4.2-V against a candidate `CompleteObjectLocator` address, returning
/// a fully-built record on success.
///
/// # Safety
/// `col_addr` must already be known to lie within a readable, mapped `.rdata`-sized region of
/// `image`.
unsafe fn validate_col(
    image: &ImageMap,
    platform: &dyn Platform,
    col_addr: usize,
    vft_addr: usize,
) -> Option<RttiRecord> {
    // SAFETY: forwarded from this function's safety contract.
    let col: RawCol = unsafe { read_pod(col_addr) };
    if col.signature != COL_SIGNATURE_X64 {
        tracing::trace!(col_addr, "rejected: bad COL signature");
        return None;
    }

    let ibo_td = Ibo32(col.ibo_td);
    if !(image.ibo_in_section(ibo_td, ".data") || image.ibo_in_section(ibo_td, ".rdata")) {
        tracing::trace!(col_addr, "rejected: ibo_td outside .data/.rdata");
        return None;
    }

    let ibo_chd = Ibo32(col.ibo_chd);
    if !image.ibo_in_section(ibo_chd, ".rdata") {
        tracing::trace!(col_addr, "rejected: ibo_chd outside .rdata");
        return None;
    }

    let td_addr = ibo_td.to_addr(image.base());
    let chd_addr = ibo_chd.to_addr(image.base());

    // SAFETY: `chd_addr` was just validated to lie within `.rdata`.
    let chd: RawChd = unsafe { read_pod(chd_addr) };
    let ibo_bcd = Ibo32(chd.ibo_base_class_array);
    if !image.ibo_in_section(ibo_bcd, ".rdata") {
        tracing::trace!(col_addr, "rejected: ibo_base_class_array outside .rdata");
        return None;
    }
    let bcd_addr = ibo_bcd.to_addr(image.base());

    // SAFETY: `td_addr` was just validated to lie within `.data`/`.rdata`; the two leading
    // pointer fields are skipped before reading the NUL-terminated name.
    let name_addr = td_addr + 2 * PTR_SIZE;
    // SAFETY: the mangled name is NUL-terminated within the image per the RTTI layout contract;
    // `image` covers the full module so the scan below cannot walk off mapped memory as long as
    // the image is well-formed (a malformed image is a correctness bug in the caller, not
    // something this function can fully defend against without a length bound).
    let cstr = unsafe { CStr::from_ptr(name_addr as *const i8) };
    let mut mangled = cstr.to_bytes();
    if mangled.first() == Some(&b'.') {
        mangled = &mangled[1..];
    }
    if mangled.is_empty() {
        tracing::trace!(col_addr, "rejected: empty mangled name");
        return None;
    }

    let demangled_name = platform.demangle(mangled)?;
    if demangled_name.is_empty() {
        tracing::trace!(col_addr, "rejected: empty demangled name");
        return None;
    }

    Some(RttiRecord {
        vft_addr,
        col_addr,
        td_addr,
        chd_addr,
        bcd_addr,
        demangled_name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::fake::FakePlatform;

    /// Lays out a synthetic image with one class's full COL/TD/CHD/BCD chain plus a vtable,
    /// returning the owning buffer and the vtable's absolute address.
    struct Fixture {
        buf: Vec<u8>,
        base: usize,
        vft_addr: usize,
    }

    fn u32b(v: u32) -> [u8; 4] {
        v.to_le_bytes()
    }
    fn i32b(v: i32) -> [u8; 4] {
        v.to_le_bytes()
    }
    fn u64b(v: u64) -> [u8; 8] {
        v.to_le_bytes()
    }

    fn build_fixture(mangled_name: &[u8], with_leading_dot: bool) -> Fixture {
        // Layout (all offsets relative to a single flat buffer acting as the whole image):
        //   .text  @ 0x1000, len 0x1000: nothing interesting for strategy B's own test
        //   .rdata @ 0x3000, len 0x1000: vtable @ 0x3100 (preceded by col-ptr-slot @ 0x30F8),
        //                                COL @ 0x3200, CHD @ 0x3240, BCD @ 0x3260
        //   .data  @ 0x5000, len 0x1000: TypeDescriptor @ 0x5000
        let total_size = 0x6000usize;
        let mut buf = vec![0u8; total_size];

        let text_start = 0x1000u32;
        let text_size = 0x1000u32;
        let rdata_start = 0x3000u32;
        let rdata_size = 0x1000u32;
        let data_start = 0x5000u32;
        let data_size = 0x1000u32;

        let col_ptr_slot = 0x30F8u32;
        let vft = 0x3100u32;
        let col = 0x3200u32;
        let chd = 0x3240u32;
        let bcd = 0x3260u32;
        let td = data_start;

        // col-ptr-slot and vft[0] both need the real base, which isn't known until `finish`
        // pins `buf`'s heap address; they're written there instead of here.

        // TypeDescriptor @ td: two spare pointers then the mangled name.
        let mut name = Vec::new();
        if with_leading_dot {
            name.push(b'.');
        }
        name.extend_from_slice(mangled_name);
        name.push(0);
        buf[td as usize + 16..td as usize + 16 + name.len()].copy_from_slice(&name);

        // BaseClassDescriptor @ bcd: contents don't matter for validation beyond existing.
        buf[bcd as usize..bcd as usize + 4].copy_from_slice(&i32b(0));

        // ClassHierarchyDescriptor @ chd.
        buf[chd as usize..chd as usize + 4].copy_from_slice(&u32b(0));
        buf[chd as usize + 4..chd as usize + 8].copy_from_slice(&u32b(0));
        buf[chd as usize + 8..chd as usize + 12].copy_from_slice(&u32b(1));
        buf[chd as usize + 12..chd as usize + 16].copy_from_slice(&i32b(bcd as i32));

        // CompleteObjectLocator @ col.
        buf[col as usize..col as usize + 4].copy_from_slice(&u32b(COL_SIGNATURE_X64));
        buf[col as usize + 4..col as usize + 8].copy_from_slice(&u32b(0));
        buf[col as usize + 8..col as usize + 12].copy_from_slice(&u32b(0));
        buf[col as usize + 12..col as usize + 16].copy_from_slice(&i32b(td as i32));
        buf[col as usize + 16..col as usize + 20].copy_from_slice(&i32b(chd as i32));

        Fixture {
            buf,
            base: 0,
            vft_addr: 0,
        }
        .finish(
            text_start,
            text_size,
            rdata_start,
            rdata_size,
            data_start,
            data_size,
            col_ptr_slot,
            col,
            vft,
        )
    }

    impl Fixture {
        #[allow(clippy::too_many_arguments)]
        fn finish(
            mut self,
            text_start: u32,
            text_size: u32,
            rdata_start: u32,
            rdata_size: u32,
            data_start: u32,
            data_size: u32,
            col_ptr_slot: u32,
            col: u32,
            vft: u32,
        ) -> Self {
            let base = self.buf.as_ptr() as usize;

            // Now that we know the real base, write the absolute COL pointer into the
            // col-ptr-slot (vft-8), the absolute vtable-slot-0 value (a pointer into .text, per
            // strategy B's heuristic), and rebuild the PE headers.
            let col_addr_abs = base + col as usize;
            self.buf[col_ptr_slot as usize..col_ptr_slot as usize + 8]
                .copy_from_slice(&u64b(col_addr_abs as u64));

            let vft0_abs = base + text_start as usize + 0x10;
            self.buf[vft as usize..vft as usize + 8].copy_from_slice(&u64b(vft0_abs as u64));

            write_pe_header(
                &mut self.buf,
                &[
                    (".text", text_size, text_start),
                    (".rdata", rdata_size, rdata_start),
                    (".data", data_size, data_start),
                ],
            );

            self.base = base;
            self.vft_addr = base + vft as usize;
            self
        }
    }

    fn write_pe_header(buf: &mut [u8], sections: &[(&str, u32, u32)]) {
        const SECTION_HEADER_SIZE: usize = 40;
        let pe_off = 0x80usize;
        buf[0..2].copy_from_slice(&0x5A4Du16.to_le_bytes());
        buf[0x3C..0x40].copy_from_slice(&(pe_off as i32).to_le_bytes());
        buf[pe_off..pe_off + 4].copy_from_slice(&0x0000_4550u32.to_le_bytes());
        buf[pe_off + 0x06..pe_off + 0x08].copy_from_slice(&(sections.len() as u16).to_le_bytes());
        buf[pe_off + 0x14..pe_off + 0x16].copy_from_slice(&0u16.to_le_bytes());

        let table = pe_off + 0x18;
        for (i, (name, vsize, vaddr)) in sections.iter().enumerate() {
            let hdr = table + i * SECTION_HEADER_SIZE;
            let name_bytes = name.as_bytes();
            buf[hdr..hdr + name_bytes.len()].copy_from_slice(name_bytes);
            buf[hdr + 0x08..hdr + 0x0C].copy_from_slice(&vsize.to_le_bytes());
            buf[hdr + 0x0C..hdr + 0x10].copy_from_slice(&vaddr.to_le_bytes());
        }
    }

    #[test]
    fn strategy_b_recovers_single_fabricated_class() {
        let fixture = build_fixture(b"?AVFoo@@", false);
        // SAFETY: `fixture.buf` is a fully owned synthetic image of the size we parsed it with.
        let image = unsafe { ImageMap::parse(fixture.base, fixture.buf.len()) }.unwrap();
        let platform = FakePlatform::new(fixture.base, fixture.buf.len())
            .with_demangled(b"?AVFoo@@", "Foo");

        let config = ScanConfig {
            strategy_a: false,
            strategy_b: true,
        };
        // SAFETY: `image` covers `fixture.buf`, which remains alive for the scan's duration.
        let index = unsafe { RttiIndex::scan(&image, &platform, &config) }.unwrap();

        assert_eq!(index.len(), 1);
        let record = index.get("Foo").unwrap();
        assert_eq!(record.vft_addr, fixture.vft_addr);
    }

    #[test]
    fn strategy_b_skips_leading_dot_in_mangled_name() {
        let fixture = build_fixture(b"?AVFoo@@", true);
        // SAFETY: as above.
        let image = unsafe { ImageMap::parse(fixture.base, fixture.buf.len()) }.unwrap();
        let platform = FakePlatform::new(fixture.base, fixture.buf.len())
            .with_demangled(b"?AVFoo@@", "Foo");

        let config = ScanConfig {
            strategy_a: false,
            strategy_b: true,
        };
        // SAFETY: as above.
        let index = unsafe { RttiIndex::scan(&image, &platform, &config) }.unwrap();
        assert_eq!(index.len(), 1);
        assert!(index.get("Foo").is_some());
    }

    #[test]
    fn rejects_when_demangle_fails() {
        let fixture = build_fixture(b"?AVFoo@@", false);
        // SAFETY: as above.
        let image = unsafe { ImageMap::parse(fixture.base, fixture.buf.len()) }.unwrap();
        // No canned demangle result registered => demangle() returns None => record rejected.
        let platform = FakePlatform::new(fixture.base, fixture.buf.len());

        let config = ScanConfig {
            strategy_a: false,
            strategy_b: true,
        };
        // SAFETY: as above.
        let index = unsafe { RttiIndex::scan(&image, &platform, &config) }.unwrap();
        assert!(index.is_empty());
    }

    #[test]
    fn rejects_bad_col_signature() {
        let mut fixture = build_fixture(b"?AVFoo@@", false);
        // Corrupt the COL signature in place.
        let col_sig_offset = fixture.vft_addr - fixture.base + 0x100; // col is at vft+0x100
        fixture.buf[col_sig_offset..col_sig_offset + 4].copy_from_slice(&u32b(0));

        // SAFETY: as above.
        let image = unsafe { ImageMap::parse(fixture.base, fixture.buf.len()) }.unwrap();
        let platform = FakePlatform::new(fixture.base, fixture.buf.len())
            .with_demangled(b"?AVFoo@@", "Foo");
        let config = ScanConfig {
            strategy_a: false,
            strategy_b: true,
        };
        // SAFETY: as above.
        let index = unsafe { RttiIndex::scan(&image, &platform, &config) }.unwrap();
        assert!(index.is_empty());
    }

    #[test]
    fn missing_section_reports_scan_init_failed() {
        // An image with no `.rdata` section at all.
        let mut buf = vec![0u8; 0x200];
        write_pe_header(&mut buf, &[(".text", 0x100, 0x100)]);
        let base = buf.as_ptr() as usize;
        // SAFETY: synthetic buffer.
        let image = unsafe { ImageMap::parse(base, buf.len()) }.unwrap();
        let platform = FakePlatform::new(base, buf.len());

        // SAFETY: as above.
        let err = unsafe { RttiIndex::scan(&image, &platform, &ScanConfig::default()) }.unwrap_err();
        assert!(matches!(
            err,
            RttiError::ScanInitFailed(ImageError::MissingSection("rdata"))
        ));
    }

    /// Encodes the same `lea`/`mov` constructor-vtable-store pair `scan.rs`'s own tests use, so
    /// this fixture's `.text` bytes are a realistic strategy (A) hit rather than a hand-picked one.
    fn encode_ctor_pattern(reg: u8, disp32: i32) -> Vec<u8> {
        let mut v = vec![0x48, 0x8D, 0x05 | (reg << 3)];
        v.extend_from_slice(&disp32.to_le_bytes());
        v.push(0x48);
        v.push(0x89);
        v.push(reg << 3);
        v
    }

    #[test]
    fn strategy_a_recovers_fabricated_constructor_pattern() {
        let mut fixture = build_fixture(b"?AVFoo@@", false);

        // Place the ctor pattern somewhere in `.text` distinct from the vtable-slot-0 filler
        // address `build_fixture` already wrote; `disp32` is computed so that the `lea`'s
        // rip-relative target (`p + 7 + disp32`, where `p` is the `lea`'s own address) lands
        // exactly on the vtable strategy (B) already set up — both `p` and the vtable address
        // carry the same (unknown until `finish`) base, which cancels out of the difference.
        let text_start = 0x1000i64;
        let pattern_offset = 0x200i64;
        let vft_rel = (fixture.vft_addr - fixture.base) as i64;
        let disp32 = i32::try_from(vft_rel - text_start - pattern_offset - 7).unwrap();

        let pattern_bytes = encode_ctor_pattern(0, disp32);
        let at = (text_start + pattern_offset) as usize;
        fixture.buf[at..at + pattern_bytes.len()].copy_from_slice(&pattern_bytes);

        // SAFETY: `fixture.buf` is a fully owned synthetic image of the size we parsed it with.
        let image = unsafe { ImageMap::parse(fixture.base, fixture.buf.len()) }.unwrap();
        let platform = FakePlatform::new(fixture.base, fixture.buf.len())
            .with_demangled(b"?AVFoo@@", "Foo");

        let config = ScanConfig {
            strategy_a: true,
            strategy_b: false,
        };
        // SAFETY: `image` covers `fixture.buf`, which remains alive for the scan's duration.
        let index = unsafe { RttiIndex::scan(&image, &platform, &config) }.unwrap();

        assert_eq!(index.len(), 1);
        let record = index.get("Foo").unwrap();
        assert_eq!(record.vft_addr, fixture.vft_addr);
    }

    #[test]
    fn process_wide_caches_across_calls() {
        let fixture = build_fixture(b"?AVFoo@@", false);
        let platform = FakePlatform::new(fixture.base, fixture.buf.len())
            .with_demangled(b"?AVFoo@@", "Foo");
        let config = ScanConfig {
            strategy_a: false,
            strategy_b: true,
        };

        // SAFETY: `platform` reports `fixture.buf`'s own base/size, a module actually mapped
        // (it's this process's own heap) for the duration of this test.
        let first = unsafe { RttiIndex::process_wide(&platform, &config) }.unwrap();
        assert_eq!(first.len(), 1);

        // A second call, even backed by a platform that would report entirely different module
        // state, returns the already-cached index instead of re-scanning.
        let other_platform = FakePlatform::new(0, 0);
        // SAFETY: the cached path never touches `other_platform`'s module_base_and_size.
        let second = unsafe { RttiIndex::process_wide(&other_platform, &config) }.unwrap();
        assert!(std::ptr::eq(first, second));
    }
}
