//! Cross-crate integration suite for Credo.
//!
//! The tests in `tests/` drive the extractor, trainer, bundle persistence
//! and both scorers together. Fixtures shared between suites live in
//! [`helpers`].

pub mod helpers;
