//! Windows x86-64 runtime toolkit: PE section mapping, Microsoft RTTI discovery, and
//! concurrency-safe VFT hook chaining.
//!
//! Three components, each usable independently:
//!
//! - [`image`] — parses a loaded module's PE section table ([`ImageMap`]).
//! - [`rtti`] — recovers `CompleteObjectLocator` chains from a parsed image ([`RttiIndex`]).
//! - [`hook`] — installs/uninstalls chained trampolines on vtable slots ([`HookChain`],
//!   [`VftHook`]).
//!
//! All OS interaction is routed through the [`Platform`] capability trait, so every component
//! above is unit-testable on any host via [`platform::fake::FakePlatform`], independent of
//! whether the `windows-backend` feature (the real `VirtualAlloc`/`VirtualProtect`/module-query
//! backend) is enabled.

pub mod error;
pub mod hook;
pub mod ibo;
pub mod image;
pub mod platform;
pub mod rtti;
pub mod scan;

#[cfg(all(target_os = "windows", feature = "windows-backend"))]
pub mod windows_backend;

pub use error::{HookError, ImageError, PlatformError, RttiError};
pub use hook::{HookChain, HookConfig, HookHandle, ReclaimPolicy, TrampolineTemplate, VftHook};
pub use ibo::Ibo32;
pub use image::{ImageMap, Section};
pub use platform::{Platform, Protection};
pub use rtti::{RttiIndex, RttiRecord, ScanConfig};

#[cfg(all(target_os = "windows", feature = "windows-backend"))]
pub use windows_backend::WindowsPlatform;
