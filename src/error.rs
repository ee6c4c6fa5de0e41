//! Typed errors for each component. Kept separate per-component rather than one flat enum so
//! callers can match on exactly the failure modes their call site can produce.

use thiserror::Error;

/// Failures from [`crate::image::ImageMap::parse`].
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ImageError {
    /// The buffer does not start with the `MZ` DOS signature.
    #[error("missing MZ signature, not a PE image")]
    NotAnImage,
    /// A header field computed an offset past the end of the supplied buffer.
    #[error("image is truncated: computed offset exceeds buffer size")]
    Truncated,
    /// A required section (`.text`, `.data`, or `.rdata`) is absent.
    #[error("missing required section .{0}")]
    MissingSection(&'static str),
}

/// Failures from [`crate::rtti::RttiIndex::scan`].
#[derive(Debug, Error)]
pub enum RttiError {
    /// The scan could not even start: PE parsing failed or a required section is missing.
    #[error("scan could not start: {0}")]
    ScanInitFailed(#[from] ImageError),
}

/// Failures from [`crate::hook::HookChain`] and [`crate::hook::VftHook`] operations.
#[derive(Debug, Error)]
pub enum HookError {
    /// `RttiIndex::get` returned `None` for the requested class name.
    #[error("class `{0}` not found in RTTI index")]
    ClassNotFound(String),
    /// Executable page allocation failed.
    #[error("failed to allocate executable memory")]
    AllocFailed,
    /// A page-protection change failed.
    #[error("failed to change memory protection")]
    ProtectFailed,
    /// `template.header_size` doesn't match this crate's one fixed `HookRecord` wire layout.
    /// Every node in a chain must share the same header size since a backward hop (`previous`/
    /// `fn_hooked`) has to know how far to subtract before it even knows which node it's looking
    /// at, so mixing header sizes within one chain can never be made safe.
    #[error("template header_size ({found}) does not match this crate's fixed HookRecord size ({expected})")]
    IncompatibleTemplate { found: usize, expected: usize },
}

/// Platform capability failures, surfaced through [`ImageError`]/[`HookError`] at call sites.
#[derive(Debug, Error)]
pub enum PlatformError {
    /// The target module could not be located or its size could not be queried.
    #[error("failed to query module base/size")]
    ModuleQueryFailed,
    /// Executable memory allocation failed.
    #[error("executable allocation failed")]
    AllocFailed,
    /// A protection change failed.
    #[error("memory protection change failed")]
    ProtectFailed,
}
