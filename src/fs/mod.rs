//! Filesystem utilities for mb.
//!
//! Atomic writes keep data bag items on a shared directory from ever being
//! observed half-written by another client.

pub mod atomic;

pub use atomic::atomic_write;
