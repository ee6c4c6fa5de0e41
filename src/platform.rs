//! The capability seam between this crate's pure logic and the host OS.
//!
//! `RttiIndex` and `HookChain` never call `VirtualAlloc`, `VirtualProtect`, or a demangler
//! directly — they go through a `&dyn Platform`. This keeps the core testable on any host and
//! keeps OS specifics confined to a backend module, the same split the reference Windows/Linux
//! process-introspection code this crate grew out of draws between its pure byte-pattern logic
//! and its `cfg(target_os = ...)`-gated `base()`/`size()` calls.

use std::fmt;

use bitflags::bitflags;

use crate::error::PlatformError;

bitflags! {
    /// Memory protection flags the core ever needs to request or round-trip.
    ///
    /// This is intentionally narrower than the OS's own protection constants: the core only ever
    /// asks for `EXECUTE_READWRITE` and only ever needs to save/restore an opaque "whatever it
    /// was before", so backends map their native flags onto this set instead of leaking raw
    /// platform constants into core logic.
    #[derive(Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Protection: u32 {
        const READ    = 0b0001;
        const WRITE   = 0b0010;
        const EXECUTE = 0b0100;
    }
}

impl Protection {
    /// The protection state every `rdata_write` and trampoline page temporarily switches to.
    pub const EXECUTE_READWRITE: Self =
        Self::from_bits_truncate(Self::READ.bits() | Self::WRITE.bits() | Self::EXECUTE.bits());
}

impl fmt::Debug for Protection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = String::new();
        s.push(if self.contains(Self::READ) { 'R' } else { '-' });
        s.push(if self.contains(Self::WRITE) { 'W' } else { '-' });
        s.push(if self.contains(Self::EXECUTE) { 'X' } else { '-' });
        f.write_str(&s)
    }
}

/// Injected OS services. Implementations must be `Send + Sync`: hooks are installed and removed
/// from arbitrary threads.
pub trait Platform: Send + Sync {
    /// Returns the base address and loaded size of the module this platform was built for.
    fn module_base_and_size(&self) -> Result<(usize, usize), PlatformError>;

    /// Allocates `size` bytes of fresh, executable+writable memory. The returned pointer is
    /// never colocated with a previous allocation from this same `Platform` instance.
    fn alloc_exec(&self, size: usize) -> Result<*mut u8, PlatformError>;

    /// Frees memory previously returned by `alloc_exec`.
    ///
    /// # Safety
    /// `addr` must be a pointer previously returned by `alloc_exec` on `self`, not yet freed, and
    /// `size` must match the size it was allocated with.
    unsafe fn free_exec(&self, addr: *mut u8, size: usize);

    /// Changes the protection of the page(s) covering `[addr, addr + len)` to `new_flags`,
    /// returning the protection that was in effect before the change.
    ///
    /// # Safety
    /// `[addr, addr + len)` must be a valid, currently-mapped range.
    unsafe fn protect(
        &self,
        addr: *mut u8,
        len: usize,
        new_flags: Protection,
    ) -> Result<Protection, PlatformError>;

    /// Demangles a Microsoft-mangled type-descriptor name (already stripped of any leading
    /// `.`), returning `None` if the name could not be demangled to a non-empty string.
    fn demangle(&self, mangled: &[u8]) -> Option<String>;
}

/// Test-only backend: every operation is a plain heap/`Vec` operation against process-local
/// state, so the full RTTI/hook test suite runs on any host OS without touching real executable
/// memory until a test explicitly asks for it.
///
/// Shipped unconditionally (not `cfg(test)`) so integration tests under `tests/` — which are
/// compiled as a separate crate and cannot see `cfg(test)` items of this crate — can use it too.
pub mod fake {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::{Platform, PlatformError, Protection};

    /// A fake [`Platform`] backed by `Vec<u8>` allocations and a name->demangled-string table.
    pub struct FakePlatform {
        module_base: usize,
        module_size: usize,
        allocations: Mutex<HashMap<usize, Vec<u8>>>,
        demangle_table: HashMap<Vec<u8>, String>,
    }

    impl FakePlatform {
        /// Builds a fake platform reporting `(module_base, module_size)` and demangling any
        /// mangled name found verbatim (sans trailing NUL) as a key in `demangle_table`.
        #[must_use]
        pub fn new(module_base: usize, module_size: usize) -> Self {
            Self {
                module_base,
                module_size,
                allocations: Mutex::new(HashMap::new()),
                demangle_table: HashMap::new(),
            }
        }

        /// Registers a canned demangle result for a mangled byte string (without leading `.`,
        /// without trailing NUL).
        #[must_use]
        pub fn with_demangled(mut self, mangled: &[u8], demangled: impl Into<String>) -> Self {
            self.demangle_table
                .insert(mangled.to_vec(), demangled.into());
            self
        }
    }

    impl Platform for FakePlatform {
        fn module_base_and_size(&self) -> Result<(usize, usize), PlatformError> {
            Ok((self.module_base, self.module_size))
        }

        fn alloc_exec(&self, size: usize) -> Result<*mut u8, PlatformError> {
            let mut buf = vec![0u8; size];
            let ptr = buf.as_mut_ptr();
            self.allocations.lock().unwrap().insert(ptr as usize, buf);
            Ok(ptr)
        }

        unsafe fn free_exec(&self, addr: *mut u8, _size: usize) {
            self.allocations.lock().unwrap().remove(&(addr as usize));
        }

        unsafe fn protect(
            &self,
            _addr: *mut u8,
            _len: usize,
            _new_flags: Protection,
        ) -> Result<Protection, PlatformError> {
            // Test doubles don't have real page protection; report EXECUTE_READWRITE as the
            // "previous" state unconditionally, which is what every real backend restores to
            // anyway on the paths this crate exercises.
            Ok(Protection::EXECUTE_READWRITE)
        }

        fn demangle(&self, mangled: &[u8]) -> Option<String> {
            self.demangle_table.get(mangled).cloned()
        }
    }
}
