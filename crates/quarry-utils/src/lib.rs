//! Small building blocks shared by every quarry crate: path and XDG
//! resolution, duration parsing, filesystem helpers, blake3 checksums,
//! advisory file locks and the cooperative cancellation flag.

pub mod cancel;
pub mod error;
pub mod fs;
pub mod hash;
pub mod lock;
pub mod path;
pub mod time;
