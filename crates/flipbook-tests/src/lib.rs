//! Integration test crate for flipbook.
//!
//! This crate exists solely to hold cross-crate integration tests.
//! It depends on every flipbook crate to verify they work together.

#[cfg(test)]
mod codec;

#[cfg(test)]
mod filters;

#[cfg(test)]
mod gpu;
