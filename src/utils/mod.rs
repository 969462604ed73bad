//! Utility functions and helpers
//!
//! This module contains the atomic file replacement used by the store.

pub mod atomic;

pub use atomic::{atomic_write, cleanup_temp_file, temp_path_for};
