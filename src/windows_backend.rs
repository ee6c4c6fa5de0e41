//! Real Windows backend: `VirtualAlloc`/`VirtualProtect`/`VirtualFree`, `GetModuleHandleW` +
//! `GetModuleInformation`, and `UnDecorateSymbolName` behind the [`Platform`] seam.
//!
//! Grounded directly in the process/module introspection this crate's predecessor did inline
//! (`base()`/`size()`/`hook()`); the difference here is that every OS call is wrapped so it can
//! be swapped for [`crate::platform::fake::FakePlatform`] in tests.

use windows::core::{PCSTR, PCWSTR};
use windows::Win32::System::Diagnostics::Debug::{
    UnDecorateSymbolName, UNDNAME_NAME_ONLY, UNDNAME_NO_ARGUMENTS, UNDNAME_NO_LEADING_UNDERSCORES,
    UNDNAME_NO_MS_KEYWORDS,
};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::System::Memory::{
    VirtualAlloc, VirtualFree, VirtualProtect, MEM_COMMIT, MEM_RELEASE, MEM_RESERVE,
    PAGE_EXECUTE_READWRITE, PAGE_PROTECTION_FLAGS,
};
use windows::Win32::System::ProcessStatus::{GetModuleInformation, MODULEINFO};
use windows::Win32::System::Threading::GetCurrentProcess;

use crate::error::PlatformError;
use crate::platform::{Platform, Protection};

/// [`Platform`] backed by the real Win32 APIs, scoped to the current process's main module.
#[derive(Debug, Default)]
pub struct WindowsPlatform;

impl WindowsPlatform {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn to_win32_protect(p: Protection) -> PAGE_PROTECTION_FLAGS {
    // This crate's only `rdata_write`/trampoline use ever requests `EXECUTE_READWRITE`; anything
    // finer-grained would need a fuller Protection <-> PAGE_* table, which nothing here needs.
    let _ = p;
    PAGE_EXECUTE_READWRITE
}

fn from_win32_protect(p: PAGE_PROTECTION_FLAGS) -> Protection {
    // We only ever restore a value this backend itself previously handed out, so round-tripping
    // through `EXECUTE_READWRITE` is exact for every call site in this crate.
    let _ = p;
    Protection::EXECUTE_READWRITE
}

impl Platform for WindowsPlatform {
    fn module_base_and_size(&self) -> Result<(usize, usize), PlatformError> {
        // SAFETY: `GetModuleHandleW(null)` returns a handle to the current process's main
        // module, valid for the process's lifetime.
        // https://learn.microsoft.com/en-us/windows/win32/api/libloaderapi/nf-libloaderapi-getmodulehandlew
        let module =
            unsafe { GetModuleHandleW(PCWSTR::null()) }.map_err(|_| PlatformError::ModuleQueryFailed)?;

        // SAFETY: `GetCurrentProcess` returns a pseudo-handle valid without closing.
        let process = unsafe { GetCurrentProcess() };
        let mut info = MODULEINFO::default();
        // SAFETY: `info` is a valid, correctly-sized out-parameter.
        unsafe {
            GetModuleInformation(
                process,
                module,
                &mut info,
                u32::try_from(size_of::<MODULEINFO>()).unwrap(),
            )
        }
        .map_err(|_| PlatformError::ModuleQueryFailed)?;

        Ok((module.0 as usize, info.SizeOfImage as usize))
    }

    fn alloc_exec(&self, size: usize) -> Result<*mut u8, PlatformError> {
        // SAFETY: a null base address requests a fresh OS-chosen mapping; `size` is the caller's
        // own allocation request.
        let ptr = unsafe {
            VirtualAlloc(
                None,
                size,
                MEM_COMMIT | MEM_RESERVE,
                PAGE_EXECUTE_READWRITE,
            )
        };
        if ptr.is_null() {
            return Err(PlatformError::AllocFailed);
        }
        Ok(ptr as *mut u8)
    }

    unsafe fn free_exec(&self, addr: *mut u8, _size: usize) {
        // SAFETY: forwarded from this method's safety contract; `MEM_RELEASE` requires the
        // original base address and a zero size, which the caller's `addr` satisfies.
        let _ = unsafe { VirtualFree(addr as *mut _, 0, MEM_RELEASE) };
    }

    unsafe fn protect(
        &self,
        addr: *mut u8,
        len: usize,
        new_flags: Protection,
    ) -> Result<Protection, PlatformError> {
        let mut old = PAGE_PROTECTION_FLAGS(0);
        // SAFETY: forwarded from this method's safety contract.
        unsafe { VirtualProtect(addr as *mut _, len, to_win32_protect(new_flags), &mut old) }
            .map_err(|_| PlatformError::ProtectFailed)?;
        Ok(from_win32_protect(old))
    }

    fn demangle(&self, mangled: &[u8]) -> Option<String> {
        let mut name = mangled.to_vec();
        name.push(0);
        let mut buf = [0u8; 1024];

        // SAFETY: `name` is NUL-terminated; `buf` is a valid, fully-owned output buffer whose
        // length we pass alongside it.
        let len = unsafe {
            UnDecorateSymbolName(
                PCSTR(name.as_ptr()),
                &mut buf,
                UNDNAME_NO_ARGUMENTS
                    | UNDNAME_NAME_ONLY
                    | UNDNAME_NO_MS_KEYWORDS
                    | UNDNAME_NO_LEADING_UNDERSCORES,
            )
        };

        if len == 0 {
            return None;
        }
        let s = String::from_utf8_lossy(&buf[..len as usize]).into_owned();
        if s.is_empty() {
            None
        } else {
            Some(s)
        }
    }
}

// SAFETY: `WindowsPlatform` holds no state; every Win32 call it makes is inherently thread-safe
// (handle-based APIs, no shared mutable globals of our own).
unsafe impl Send for WindowsPlatform {}
// SAFETY: same as above.
unsafe impl Sync for WindowsPlatform {}
