//! Trampoline allocation, VFT slot patching, and race-safe hook-chain install/uninstall.
//!
//! The header (`HookRecord`) is always placed immediately before the trampoline body in one
//! contiguous executable allocation, so every RIP-relative displacement the body needs to reach
//! back into its own header is a fixed, compile-time constant — see [`ENTRY_HOOK_BODY`].

use std::mem::{size_of, ManuallyDrop};
use std::ptr;
use std::sync::atomic::{fence, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::HookError;
use crate::platform::{Platform, Protection};
use crate::rtti::RttiIndex;

/// Sentinel written at the start of every trampoline header: ASCII `"UniHook\0"`.
pub const MAGIC: u64 = u64::from_le_bytes(*b"UniHook\0");

/// Fixed header prepended to every trampoline allocation. Field order and size are part of the
/// on-wire contract: other installed hooks (possibly from a different build of this crate) read
/// this layout by raw offset, so it must never change without also changing [`MAGIC`].
#[repr(C)]
pub struct HookRecord {
    /// Always [`MAGIC`]; how a `previous`/`fn_hooked` hop is recognized as "another hook".
    pub magic: u64,
    /// Reserved; keeps the header 8-field/64-byte aligned for future use.
    pub padding: u64,
    /// Raw `Arc<Mutex<()>>::into_raw` pointer shared by every hook in this chain. Owned
    /// (refcounted) jointly by all hooks sharing a slot; see [`HookChain::install`].
    pub chain_lock: *const Mutex<()>,
    /// Per-hook register-save scratch area, carved out of the same allocation as the header and
    /// body. Unused by [`ENTRY_HOOK_TEMPLATE`] (which saves state on the stack instead) but kept
    /// for future context-hook trampoline variants.
    pub context: *mut u8,
    /// Address of whoever currently targets this hook's body (another hook's header address), or
    /// the raw VFT slot address if this hook is currently the chain head (the "anchor").
    pub previous: *mut u8,
    /// User callback.
    pub fn_new: *const (),
    /// Body address this hook jumps to after running `fn_new`: either the original function, or
    /// an earlier-installed hook's trampoline body.
    pub fn_hooked: *mut u8,
    /// User-owned scratch, unused by the core.
    pub extra: *mut u8,
}

const HEADER_SIZE: usize = size_of::<HookRecord>();
const CONTEXT_SIZE: usize = 256;

/// A trampoline body plus the header size it assumes. Body bytes are immutable across installs:
/// every RIP-relative operand already points at a fixed negative offset from the body start, so
/// nothing in the body needs to be patched per-installation.
pub struct TrampolineTemplate {
    /// Size of the header this template's RIP-relative offsets were computed against.
    pub header_size: usize,
    /// The trampoline body's machine code.
    pub body: &'static [u8],
}

/// `lea`-free "entry hook" floor implementation: saves RCX/RDX/R8/R9 and XMM0-3 (the Microsoft
/// x86-64 integer and vector argument registers), calls `fn_new`, restores them, then jumps to
/// `fn_hooked`. `fn_new` receives no rewritten arguments — it runs with the original call's
/// registers still live and is expected to either not touch them or save/restore what it uses,
/// same contract user hook callbacks have always had here.
///
/// Layout (byte offsets into this body):
/// ```text
/// 00 push rcx                              2A movdqu xmm1, [rsp+0x10]
/// 01 push rdx                              36 movdqu xmm0, [rsp]
/// 02 push r8                               41 add rsp, 0x40
/// 04 push r9                               45 pop r9
/// 06 sub rsp, 0x40                         47 pop r8
/// 0A movdqu [rsp], xmm0                    49 pop rdx
/// 0F movdqu [rsp+0x10], xmm1               4A pop rcx
/// 15 movdqu [rsp+0x20], xmm2               4B mov rax, [rip-98]  ; fn_hooked
/// 1B movdqu [rsp+0x30], xmm3               52 jmp rax
/// 21 mov rax, [rip-64]  ; fn_new
/// 28 call rax
/// 2A movdqu xmm3, [rsp+0x30]
/// ```
#[rustfmt::skip]
pub static ENTRY_HOOK_BODY: [u8; 84] = [
    0x51,                                           // push rcx
    0x52,                                           // push rdx
    0x41, 0x50,                                     // push r8
    0x41, 0x51,                                     // push r9
    0x48, 0x83, 0xEC, 0x40,                         // sub rsp, 0x40
    0xF3, 0x0F, 0x7F, 0x04, 0x24,                   // movdqu [rsp], xmm0
    0xF3, 0x0F, 0x7F, 0x4C, 0x24, 0x10,             // movdqu [rsp+0x10], xmm1
    0xF3, 0x0F, 0x7F, 0x54, 0x24, 0x20,             // movdqu [rsp+0x20], xmm2
    0xF3, 0x0F, 0x7F, 0x5C, 0x24, 0x30,             // movdqu [rsp+0x30], xmm3
    0x48, 0x8B, 0x05, 0xC0, 0xFF, 0xFF, 0xFF,       // mov rax, [rip-64]   ; header.fn_new
    0xFF, 0xD0,                                     // call rax
    0xF3, 0x0F, 0x6F, 0x5C, 0x24, 0x30,             // movdqu xmm3, [rsp+0x30]
    0xF3, 0x0F, 0x6F, 0x54, 0x24, 0x20,             // movdqu xmm2, [rsp+0x20]
    0xF3, 0x0F, 0x6F, 0x4C, 0x24, 0x10,             // movdqu xmm1, [rsp+0x10]
    0xF3, 0x0F, 0x6F, 0x04, 0x24,                   // movdqu xmm0, [rsp]
    0x48, 0x83, 0xC4, 0x40,                         // add rsp, 0x40
    0x41, 0x59,                                     // pop r9
    0x41, 0x58,                                     // pop r8
    0x5A,                                           // pop rdx
    0x59,                                           // pop rcx
    0x48, 0x8B, 0x05, 0x9E, 0xFF, 0xFF, 0xFF,       // mov rax, [rip-98]   ; header.fn_hooked
    0xFF, 0xE0,                                     // jmp rax
];

/// The floor trampoline shape required by the specification.
pub static ENTRY_HOOK_TEMPLATE: TrampolineTemplate = TrampolineTemplate {
    header_size: HEADER_SIZE,
    body: &ENTRY_HOOK_BODY,
};

/// How a dropped/uninstalled hook's trampoline page is reclaimed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReclaimPolicy {
    /// Free the page immediately, matching the original tool. If another thread is still
    /// executing inside the trampoline body when this runs, that is a use-after-free — a known,
    /// documented gap (see `DESIGN.md`), not something this crate can fully close without a real
    /// quiescence/epoch scheme.
    #[default]
    Immediate,
    /// Never free the page. A conservative stand-in for epoch-based reclamation: it leaks memory
    /// instead of risking a use-after-free for long-running processes that uninstall hooks while
    /// other threads might still be inside them.
    Deferred,
}

/// Per-install configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct HookConfig {
    /// Trampoline page reclamation policy.
    pub reclaim: ReclaimPolicy,
}

/// Namespace for the two chain operations; holds no state itself (the chain's state lives in the
/// trampoline headers and is found by walking them from any live [`HookHandle`]).
pub struct HookChain;

impl HookChain {
    /// Installs a hook into `*vft_slot_ptr`, chaining onto whatever is already there.
    ///
    /// # Safety
    /// `vft_slot_ptr` must be a valid, currently-readable-and-writable pointer-sized VFT slot.
    /// `fn_new` must be callable with the calling convention the eventual callers of this slot
    /// use (this crate does not and cannot check that).
    pub unsafe fn install<'p>(
        platform: &'p dyn Platform,
        vft_slot_ptr: *mut usize,
        fn_new: *const (),
        template: &TrampolineTemplate,
        config: HookConfig,
    ) -> Result<HookHandle<'p>, HookError> {
        // Chain traversal locates a node's header by subtracting a fixed size from a raw
        // `fn_hooked`/`previous` pointer before it knows anything else about that node, so every
        // node sharing a chain must agree on one header size. `template.header_size` exists to
        // size *this* install's own allocation correctly; it can never safely diverge from
        // `HEADER_SIZE`, which is what every backward hop in this module assumes.
        if template.header_size != HEADER_SIZE {
            return Err(HookError::IncompatibleTemplate {
                found: template.header_size,
                expected: HEADER_SIZE,
            });
        }

        let total_len = template.header_size + template.body.len() + CONTEXT_SIZE;
        let alloc = platform
            .alloc_exec(total_len)
            .map_err(|_| HookError::AllocFailed)?;
        let guard = ExecGuard {
            platform,
            ptr: alloc,
            len: total_len,
            armed: true,
        };

        let header_ptr = alloc as *mut HookRecord;
        // SAFETY: `alloc` was just sized to hold `header_size + body.len() + CONTEXT_SIZE`
        // bytes; `body_ptr`/`context_ptr` stay within that allocation.
        let body_ptr = unsafe { alloc.add(template.header_size) };
        // SAFETY: same allocation, offset within bounds.
        let context_ptr = unsafe { body_ptr.add(template.body.len()) };

        // SAFETY: `body_ptr..body_ptr+body.len()` is freshly allocated and large enough.
        unsafe {
            ptr::copy_nonoverlapping(template.body.as_ptr(), body_ptr, template.body.len());
        }

        fence(Ordering::SeqCst);
        // SAFETY: caller guarantees `vft_slot_ptr` is valid to read.
        let mut fn_hooked = unsafe { ptr::read_volatile(vft_slot_ptr) } as *mut u8;

        // SAFETY: `prev_candidate` is only read through `magic_at`, which never dereferences
        // past the first 8 bytes until the magic check passes; `fn_hooked` came from the live
        // VFT slot, so subtracting the header size stays inside addressable memory for any
        // value that really is a prior trampoline header (and for values that aren't, the
        // unaligned 8-byte load below is the only access performed).
        let mut prev_candidate = unsafe { fn_hooked.sub(HEADER_SIZE) } as *mut HookRecord;

        let result = if unsafe { magic_at(prev_candidate as *const u8) } == MAGIC {
            // SAFETY: `prev_candidate` just proved itself to be a live HookRecord header by
            // carrying the magic sentinel.
            unsafe {
                install_onto_chain(
                    platform,
                    header_ptr,
                    body_ptr,
                    context_ptr,
                    fn_new,
                    vft_slot_ptr,
                    &mut fn_hooked,
                    &mut prev_candidate,
                )
            }
        } else {
            // SAFETY: `header_ptr` is freshly allocated, exclusively owned at this point.
            unsafe {
                install_fresh_chain(
                    platform,
                    header_ptr,
                    context_ptr,
                    fn_new,
                    fn_hooked,
                    vft_slot_ptr,
                )
            }
        };

        match result {
            Ok(()) => {
                guard.disarm();
                Ok(HookHandle {
                    header: header_ptr,
                    total_len,
                    platform,
                    reclaim: config.reclaim,
                    uninstalled: false,
                })
            }
            Err(e) => Err(e),
        }
    }
}

/// # Safety
/// `header_ptr`/`body_ptr`/`context_ptr` must be distinct regions of one fresh allocation;
/// `vft_slot_ptr` must be valid to write.
unsafe fn install_fresh_chain(
    platform: &dyn Platform,
    header_ptr: *mut HookRecord,
    context_ptr: *mut u8,
    fn_new: *const (),
    fn_hooked: *mut u8,
    vft_slot_ptr: *mut usize,
) -> Result<(), HookError> {
    let lock = Arc::new(Mutex::new(()));
    let lock_ptr = Arc::into_raw(lock);

    // SAFETY: `header_ptr` is exclusively owned, freshly allocated memory.
    unsafe {
        (*header_ptr).magic = MAGIC;
        (*header_ptr).padding = 0;
        (*header_ptr).chain_lock = lock_ptr;
        (*header_ptr).context = context_ptr;
        (*header_ptr).previous = vft_slot_ptr as *mut u8; // anchor: no prior chain
        (*header_ptr).fn_new = fn_new;
        (*header_ptr).fn_hooked = fn_hooked;
        (*header_ptr).extra = ptr::null_mut();
    }

    // SAFETY: `vft_slot_ptr` is valid to write per this function's forwarded contract; no
    // concurrent chain exists yet so no lock is required (matches §4.3 step 6).
    unsafe { rdata_write(platform, vft_slot_ptr as *mut u8, header_ptr.add(1) as *mut u8 as usize) }
        .map_err(|_| {
            // SAFETY: we just created this Arc; dropping it here releases the only reference.
            unsafe { drop(Arc::from_raw(lock_ptr)) };
            HookError::ProtectFailed
        })
}

/// # Safety
/// `prev_candidate` must currently carry [`MAGIC`] (i.e. genuinely be a live chain head);
/// `header_ptr`/`body_ptr`/`context_ptr` must be distinct regions of one fresh allocation.
#[allow(clippy::too_many_arguments)]
unsafe fn install_onto_chain(
    platform: &dyn Platform,
    header_ptr: *mut HookRecord,
    body_ptr: *mut u8,
    context_ptr: *mut u8,
    fn_new: *const (),
    vft_slot_ptr: *mut usize,
    fn_hooked: &mut *mut u8,
    prev_candidate: &mut *mut HookRecord,
) -> Result<(), HookError> {
    // SAFETY: `*prev_candidate` was just shown to carry the magic sentinel, so its `chain_lock`
    // field is a live `Arc<Mutex<()>>::into_raw` pointer.
    let lock_ptr = unsafe { (**prev_candidate).chain_lock };
    // SAFETY: `lock_ptr` is a valid `Arc::into_raw` pointer still owned by the chain; we borrow
    // it without taking ownership (ManuallyDrop suppresses the refcount decrement on scope exit).
    let arc = ManuallyDrop::new(unsafe { Arc::from_raw(lock_ptr) });
    let _guard = arc.lock().unwrap();

    fence(Ordering::SeqCst);
    // SAFETY: `vft_slot_ptr` is valid to read per the outer function's forwarded contract.
    let current = unsafe { ptr::read_volatile(vft_slot_ptr) } as *mut u8;
    if current != *fn_hooked {
        // A concurrent installer/uninstaller changed the slot between our first snapshot and
        // acquiring the lock; fold in the fresh value per §5's race model instead of retrying
        // the whole traversal.
        *fn_hooked = current;
        // SAFETY: `current` came from the live VFT slot under a fence, same reasoning as the
        // initial snapshot above.
        *prev_candidate = unsafe { current.sub(HEADER_SIZE) } as *mut HookRecord;
    }

    // SAFETY: `header_ptr` is exclusively owned, freshly allocated memory.
    unsafe {
        (*header_ptr).magic = MAGIC;
        (*header_ptr).padding = 0;
        (*header_ptr).chain_lock = lock_ptr;
        (*header_ptr).context = context_ptr;
        (*header_ptr).previous = vft_slot_ptr as *mut u8;
        (*header_ptr).fn_new = fn_new;
        (*header_ptr).fn_hooked = *fn_hooked;
        (*header_ptr).extra = ptr::null_mut();
    }

    // We are about to become a second (or later) owner of the shared chain lock.
    // SAFETY: `lock_ptr` is a live `Arc::into_raw` pointer; incrementing before handing out
    // another logical owner is the documented way to grow an `Arc`'s refcount from a raw pointer.
    unsafe { Arc::increment_strong_count(lock_ptr) };

    // prev_candidate->previous <- header_ptr (§4.3 step 5c)
    let prev_previous_field = unsafe { ptr::addr_of_mut!((**prev_candidate).previous) } as *mut u8;
    // SAFETY: `*prev_candidate` is a live trampoline header, writable via `rdata_write`.
    unsafe { rdata_write(platform, prev_previous_field, header_ptr as usize) }?;

    // *vft_slot_ptr <- body_ptr (§4.3 step 5d)
    // SAFETY: forwarded from this function's contract.
    unsafe { rdata_write(platform, vft_slot_ptr as *mut u8, body_ptr as usize) }
}

/// A hook installed into exactly one VFT slot, owning its trampoline allocation. Dropping it
/// uninstalls the hook (removing it from wherever it currently sits in its chain) and frees the
/// trampoline page, unless [`ReclaimPolicy::Deferred`] was requested.
pub struct HookHandle<'p> {
    header: *mut HookRecord,
    total_len: usize,
    platform: &'p dyn Platform,
    reclaim: ReclaimPolicy,
    uninstalled: bool,
}

// SAFETY: every pointer `HookHandle` holds either refers to this handle's own exclusively-owned
// trampoline allocation, or to process-wide VFT/chain state that is only ever mutated while
// holding the chain's mutex; no two `HookHandle`s alias each other's trampoline memory.
unsafe impl<'p> Send for HookHandle<'p> {}

impl<'p> HookHandle<'p> {
    /// The callback this hook was installed with.
    #[must_use]
    pub fn fn_new(&self) -> *const () {
        // SAFETY: `self.header` is valid for the lifetime of `self`.
        unsafe { (*self.header).fn_new }
    }

    /// The address this hook currently jumps to after its callback runs (the original function,
    /// or another hook's body if one was installed before this one).
    #[must_use]
    pub fn fn_hooked(&self) -> *const () {
        // SAFETY: `self.header` is valid for the lifetime of `self`.
        unsafe { (*self.header).fn_hooked as *const () }
    }

    /// Address of the trampoline body the VFT slot pointed at while this hook was present.
    #[must_use]
    pub fn trampoline_body(&self) -> *const () {
        // SAFETY: body immediately follows the header in this handle's allocation.
        unsafe { (self.header as *const u8).add(HEADER_SIZE) as *const () }
    }

    /// Explicitly uninstalls this hook, returning any error instead of only logging it (as
    /// `Drop` would).
    pub fn uninstall(mut self) -> Result<(), HookError> {
        let result = unsafe { self.do_uninstall() };
        self.uninstalled = true;
        result
    }

    /// # Safety
    /// May only be called once per handle (tracked via `self.uninstalled`); the chain this hook
    /// belongs to must still have valid, readable/writable memory at every node.
    unsafe fn do_uninstall(&mut self) -> Result<(), HookError> {
        let me = self.header;

        // §4.3 uninstall step 1: find and lock the head.
        // SAFETY: `me` is this handle's own live header.
        let head = unsafe { find_head(me) };
        // SAFETY: a chain head always carries a live `chain_lock`.
        let lock_ptr = unsafe { (*head).chain_lock };
        // SAFETY: borrowed without taking ownership; see `install_onto_chain` for the pattern.
        let arc = ManuallyDrop::new(unsafe { Arc::from_raw(lock_ptr) });
        let _guard = arc.lock().unwrap();

        // SAFETY: `me` is this handle's own live header.
        let fn_hooked = unsafe { (*me).fn_hooked };
        // SAFETY: only the first 8 bytes at `next_header` are read (via `magic_at`) until the
        // magic check passes.
        let next_header = unsafe { fn_hooked.sub(HEADER_SIZE) } as *mut HookRecord;
        let next_is_hook = unsafe { magic_at(next_header as *const u8) } == MAGIC;

        // SAFETY: `me` is this handle's own live header.
        let me_previous = unsafe { (*me).previous };
        let me_previous_is_hook = unsafe { magic_at(me_previous as *const u8) } == MAGIC;

        if next_is_hook {
            // §4.3 step 3: the hook below me now gets targeted by whoever targeted me.
            let next_previous_field =
                unsafe { ptr::addr_of_mut!((*next_header).previous) } as *mut u8;
            // SAFETY: `next_header` just proved itself a live hook via the magic check above.
            unsafe { rdata_write(self.platform, next_previous_field, me_previous as usize) }?;
        }

        if me_previous_is_hook {
            // §4.3 step 4: reroute whoever targeted me to call what I used to call.
            let prev_header = me_previous as *mut HookRecord;
            let prev_fn_hooked_field =
                unsafe { ptr::addr_of_mut!((*prev_header).fn_hooked) } as *mut u8;
            // SAFETY: `prev_header` just proved itself a live hook via the magic check above.
            unsafe { rdata_write(self.platform, prev_fn_hooked_field, fn_hooked as usize) }?;
        } else {
            // §4.3 step 5: I was the head; rewrite the raw VFT slot itself.
            // SAFETY: `me_previous` is the anchor (raw VFT slot address) because the magic check
            // above failed; it is valid to write per this handle's original install contract.
            unsafe { rdata_write(self.platform, me_previous, fn_hooked as usize) }?;
        }

        drop(_guard);
        // SAFETY: every live hook holds exactly one logical reference to the shared chain lock,
        // acquired either by `Arc::into_raw` (first hook) or `Arc::increment_strong_count`
        // (every later one); this is that reference's matching release.
        unsafe { drop(Arc::from_raw(lock_ptr)) };

        match self.reclaim {
            ReclaimPolicy::Immediate => {
                // SAFETY: `self.header` is this handle's own allocation, not yet freed.
                unsafe {
                    self.platform
                        .free_exec(self.header as *mut u8, self.total_len);
                }
            }
            ReclaimPolicy::Deferred => {
                tracing::debug!(
                    "deferred reclaim: leaking trampoline page to avoid racing an in-flight caller"
                );
            }
        }

        Ok(())
    }
}

impl<'p> Drop for HookHandle<'p> {
    fn drop(&mut self) {
        if !self.uninstalled {
            // SAFETY: `do_uninstall` has not run for this handle yet (`uninstalled` is false).
            if let Err(e) = unsafe { self.do_uninstall() } {
                tracing::error!(error = %e, "failed to uninstall hook on drop");
            }
            self.uninstalled = true;
        }
    }
}

/// Walks `previous` from `start` until a hop lands on something that is not a hook header,
/// returning the last hook reached (whose `previous` is the anchor).
///
/// # Safety
/// `start` must be a live `HookRecord` header; every hop along the way must be either another
/// live header or the anchor (raw VFT slot address), per the chain invariant.
unsafe fn find_head(start: *mut HookRecord) -> *mut HookRecord {
    let mut cur = start;
    loop {
        // SAFETY: `cur` is a live header by this function's loop invariant.
        let candidate = unsafe { (*cur).previous };
        // SAFETY: only the first 8 bytes at `candidate` are read.
        if unsafe { magic_at(candidate as *const u8) } == MAGIC {
            cur = candidate as *mut HookRecord;
        } else {
            return cur;
        }
    }
}

/// Reads the would-be `magic` field at `addr` as an unaligned `u64`, never dereferencing
/// anything beyond those 8 bytes. `addr` may be the anchor (a plain VFT slot, not a
/// `HookRecord`), which is why this never forms a `&HookRecord` reference.
///
/// # Safety
/// `addr .. addr + 8` must be valid to read.
unsafe fn magic_at(addr: *const u8) -> u64 {
    // SAFETY: forwarded from caller; unaligned load per §9's anchor-alignment note.
    unsafe { ptr::read_unaligned(addr as *const u64) }
}

/// Changes protection to RWX, fences, performs one pointer-sized volatile store, then restores
/// the original protection.
///
/// # Safety
/// `dest .. dest + size_of::<usize>()` must be a valid, currently-mapped range.
unsafe fn rdata_write(platform: &dyn Platform, dest: *mut u8, value: usize) -> Result<(), HookError> {
    // SAFETY: forwarded from caller.
    let old = unsafe { platform.protect(dest, size_of::<usize>(), Protection::EXECUTE_READWRITE) }
        .map_err(|_| HookError::ProtectFailed)?;
    fence(Ordering::SeqCst);
    // SAFETY: `dest` was just proven writable by the successful protection change above.
    unsafe { ptr::write_volatile(dest as *mut usize, value) };
    // Best-effort restore; a failure here does not invalidate the write that already happened.
    // SAFETY: same range as above.
    let _ = unsafe { platform.protect(dest, size_of::<usize>(), old) };
    Ok(())
}

/// Scope guard: frees an executable allocation unless [`Self::disarm`] was called, so every
/// early-return error path in [`HookChain::install`] cleans up the allocation automatically.
struct ExecGuard<'p> {
    platform: &'p dyn Platform,
    ptr: *mut u8,
    len: usize,
    armed: bool,
}

impl<'p> ExecGuard<'p> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl<'p> Drop for ExecGuard<'p> {
    fn drop(&mut self) {
        if self.armed {
            // SAFETY: `self.ptr` was allocated by `self.platform` and not yet freed (we only
            // reach here when `disarm` was never called, i.e. an error path).
            unsafe { self.platform.free_exec(self.ptr, self.len) };
        }
    }
}

/// Resolves a class name through an [`RttiIndex`] and installs a hook on one of its vtable slots.
pub struct VftHook;

impl VftHook {
    /// Installs `fn_new` onto `class_name`'s vtable slot `vft_index`.
    ///
    /// # Safety
    /// `rtti` must describe classes actually present in this process's own address space
    /// (i.e. built by [`RttiIndex::scan`] against a real, currently-mapped image), and
    /// `vft_index` must be a valid slot within that class's vtable.
    ///
    /// # Errors
    /// Returns [`HookError::ClassNotFound`] without allocating anything if `class_name` is not
    /// in `rtti`.
    pub unsafe fn install<'p>(
        platform: &'p dyn Platform,
        rtti: &RttiIndex,
        class_name: &str,
        vft_index: usize,
        fn_new: *const (),
        template: &TrampolineTemplate,
        config: HookConfig,
    ) -> Result<HookHandle<'p>, HookError> {
        let record = rtti
            .get(class_name)
            .ok_or_else(|| HookError::ClassNotFound(class_name.to_string()))?;
        let vft_slot_ptr = (record.vft_addr + vft_index * size_of::<usize>()) as *mut usize;
        // SAFETY: forwarded from this function's safety contract.
        unsafe { HookChain::install(platform, vft_slot_ptr, fn_new, template, config) }
    }

    /// Installs `fn_new` directly onto `vft_addr`'s slot `vft_index`, bypassing RTTI lookup.
    ///
    /// # Safety
    /// `vft_addr + vft_index * size_of::<usize>()` must be a valid, writable VFT slot.
    pub unsafe fn install_raw<'p>(
        platform: &'p dyn Platform,
        vft_addr: usize,
        vft_index: usize,
        fn_new: *const (),
        template: &TrampolineTemplate,
        config: HookConfig,
    ) -> Result<HookHandle<'p>, HookError> {
        let vft_slot_ptr = (vft_addr + vft_index * size_of::<usize>()) as *mut usize;
        // SAFETY: forwarded from this function's safety contract.
        unsafe { HookChain::install(platform, vft_slot_ptr, fn_new, template, config) }
    }
}
