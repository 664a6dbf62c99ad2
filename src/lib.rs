//! Workspace facade crate.
//!
//! Re-exports the member crates behind feature flags so a host application
//! can depend on `lrsync-workspace` alone:
//!
//! - `auth`: sessions and the request client (`core-auth`)
//! - `providers`: Google Drive source and Lightroom destination
//! - `transfer`: the batched transfer pipeline (`core-transfer`)
//! - `desktop-shims`: reqwest, file and loopback implementations of the
//!   host capabilities (`bridge-desktop`)

pub use bridge_traits;
pub use core_runtime;

#[cfg(feature = "auth")]
pub use core_auth;

#[cfg(feature = "providers")]
pub use provider_google_drive;
#[cfg(feature = "providers")]
pub use provider_lightroom;

#[cfg(feature = "transfer")]
pub use core_transfer;

#[cfg(feature = "desktop-shims")]
pub use bridge_desktop;
