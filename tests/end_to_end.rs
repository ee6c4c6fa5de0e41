//! Exercises the full pipeline — PE parse, RTTI scan, VFT hook install/uninstall — through only
//! the public API, against a hand-fabricated in-process image and a `FakePlatform`.

use unihook::hook::{HookChain, HookConfig, VftHook, ENTRY_HOOK_TEMPLATE};
use unihook::platform::fake::FakePlatform;
use unihook::{ImageMap, RttiIndex, ScanConfig};

const SECTION_HEADER_SIZE: usize = 40;

struct FabricatedImage {
    buf: Vec<u8>,
    base: usize,
    class_name: &'static str,
    mangled: &'static [u8],
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

fn write_pe_header(buf: &mut [u8], sections: &[(&str, u32, u32)]) {
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

/// Builds one class's full `CompleteObjectLocator` chain plus a two-slot vtable, discoverable by
/// strategy (B) (the `.rdata` pointer sweep — strategy (A) needs a real compiled constructor
/// prologue, which this harness does not synthesize).
fn build_image() -> FabricatedImage {
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

    let mangled: &[u8] = b"?AVPlayerIns@CS@@";
    let class_name = "CS::PlayerIns";

    let mut name = Vec::new();
    name.extend_from_slice(mangled);
    name.push(0);
    buf[td as usize + 16..td as usize + 16 + name.len()].copy_from_slice(&name);

    buf[bcd as usize..bcd as usize + 4].copy_from_slice(&i32b(0));

    buf[chd as usize..chd as usize + 4].copy_from_slice(&u32b(0));
    buf[chd as usize + 4..chd as usize + 8].copy_from_slice(&u32b(0));
    buf[chd as usize + 8..chd as usize + 12].copy_from_slice(&u32b(1));
    buf[chd as usize + 12..chd as usize + 16].copy_from_slice(&i32b(bcd as i32));

    buf[col as usize..col as usize + 4].copy_from_slice(&u32b(1)); // COL_SIGNATURE_X64
    buf[col as usize + 4..col as usize + 8].copy_from_slice(&u32b(0));
    buf[col as usize + 8..col as usize + 12].copy_from_slice(&u32b(0));
    buf[col as usize + 12..col as usize + 16].copy_from_slice(&i32b(td as i32));
    buf[col as usize + 16..col as usize + 20].copy_from_slice(&i32b(chd as i32));

    let base = buf.as_ptr() as usize;
    let col_addr_abs = base + col as usize;
    buf[col_ptr_slot as usize..col_ptr_slot as usize + 8]
        .copy_from_slice(&u64b(col_addr_abs as u64));

    // vtable: two slots, both initially pointing at a fake "original function" inside .text.
    // Written only now that the buffer's real (absolute) base address is known.
    let f0_abs = (base + text_start as usize + 0x10) as u64;
    buf[vft as usize..vft as usize + 8].copy_from_slice(&u64b(f0_abs));
    buf[vft as usize + 8..vft as usize + 16].copy_from_slice(&u64b(f0_abs));

    write_pe_header(
        &mut buf,
        &[
            (".text", text_size, text_start),
            (".rdata", rdata_size, rdata_start),
            (".data", data_size, data_start),
        ],
    );

    FabricatedImage {
        buf,
        base,
        class_name,
        mangled,
    }
}

#[test]
fn parse_scan_and_hook_by_name() {
    let image_data = build_image();
    let platform = FakePlatform::new(image_data.base, image_data.buf.len())
        .with_demangled(image_data.mangled, image_data.class_name);

    // SAFETY: `image_data.buf` is a fully owned synthetic image, alive for this test's duration.
    let image = unsafe { ImageMap::parse(image_data.base, image_data.buf.len()) }.unwrap();
    assert_eq!(image.sections().len(), 3);

    let config = ScanConfig {
        strategy_a: false,
        strategy_b: true,
    };
    // SAFETY: `image` covers `image_data.buf`.
    let rtti = unsafe { RttiIndex::scan(&image, &platform, &config) }.unwrap();
    assert_eq!(rtti.len(), 1);
    let record = rtti.get(image_data.class_name).unwrap();

    // SAFETY: `record.vft_addr` points into `image_data.buf`'s vtable, which is writable for the
    // test's duration; slot 0 is a valid vtable index we fabricated above.
    let handle = unsafe {
        VftHook::install(
            &platform,
            &rtti,
            image_data.class_name,
            0,
            0x1234usize as *const (),
            &ENTRY_HOOK_TEMPLATE,
            HookConfig::default(),
        )
    }
    .unwrap();

    assert_eq!(handle.fn_new(), 0x1234usize as *const ());
    assert_eq!(handle.fn_hooked(), (image_data.base + 0x1010) as *const ());

    // SAFETY: reading back the slot we just installed into, single-threaded.
    let slot_value = unsafe { std::ptr::read(record.vft_addr as *const usize) };
    assert_eq!(slot_value as *const (), handle.trampoline_body());

    handle.uninstall().unwrap();
    // SAFETY: as above.
    let restored = unsafe { std::ptr::read(record.vft_addr as *const usize) };
    assert_eq!(restored, image_data.base + 0x1010);
}

#[test]
fn install_by_name_missing_class_does_not_allocate() {
    let platform = FakePlatform::new(0, 0);
    let rtti = RttiIndex::default();

    let err = unsafe {
        VftHook::install(
            &platform,
            &rtti,
            "Nonexistent",
            0,
            0x1usize as *const (),
            &ENTRY_HOOK_TEMPLATE,
            HookConfig::default(),
        )
    }
    .unwrap_err();

    assert!(matches!(err, unihook::HookError::ClassNotFound(name) if name == "Nonexistent"));

    // Nothing should have touched the platform's allocation table.
    let probe = platform.alloc_exec(8);
    assert!(probe.is_ok());
}

#[test]
fn double_install_single_uninstall_p5_style() {
    let mut vft = vec![0xF0usize; 1].into_boxed_slice();
    let slot_ptr: *mut usize = &mut vft[0];
    let platform = FakePlatform::new(0, 0);

    // SAFETY: `slot_ptr` is a live, exclusively-owned slot in `vft` for this test's duration.
    let h1 = unsafe {
        HookChain::install(
            &platform,
            slot_ptr,
            0x1usize as *const (),
            &ENTRY_HOOK_TEMPLATE,
            HookConfig::default(),
        )
    }
    .unwrap();
    let h2 = unsafe {
        HookChain::install(
            &platform,
            slot_ptr,
            0x2usize as *const (),
            &ENTRY_HOOK_TEMPLATE,
            HookConfig::default(),
        )
    }
    .unwrap();

    // SAFETY: single-threaded read of our own slot.
    assert_eq!(unsafe { std::ptr::read(slot_ptr) } as *const (), h2.trampoline_body());

    h2.uninstall().unwrap();

    // SAFETY: as above.
    assert_eq!(unsafe { std::ptr::read(slot_ptr) } as *const (), h1.trampoline_body());
    assert_eq!(h1.fn_hooked(), 0xF0usize as *const ());

    h1.uninstall().unwrap();
    // SAFETY: as above.
    assert_eq!(unsafe { std::ptr::read(slot_ptr) }, 0xF0);
}
