//! Frozen manifest persistence
//!
//! This module provides:
//! - ManifestWriter for reading the current manifest and staging a new one
//! - StagedManifest for atomic replacement after verification

mod writer;

pub use writer::{CommitOutcome, ManifestWriter, StagedManifest};
