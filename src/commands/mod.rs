//! Type-safe command argument modules.
//!
//! Each struct implements `CommandArgs` and maps Rust fields to the exact
//! flags and environment variables its external program expects.

pub mod apt;
pub mod python;
pub mod systemd;
