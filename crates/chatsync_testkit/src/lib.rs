//! # chatsync testkit
//!
//! Test utilities for chatsync.
//!
//! This crate provides:
//! - Fixtures: temporary storage locations and record builders
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use chatsync_testkit::prelude::*;
//!
//! #[test]
//! fn saves_to_disk() {
//!     let storage = TempStorage::new();
//!     let record = conversation("c1", "hello");
//!     // ... exercise a store persisted at storage.path()
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;
