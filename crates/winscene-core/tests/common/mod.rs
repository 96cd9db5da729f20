//! Shared test infrastructure for winscene-core integration tests.
//!
//! Import from integration test files with:
//! ```ignore
//! mod common;
//! use common::fixtures::*;
//! ```

#![allow(dead_code)]

pub mod fixtures;
