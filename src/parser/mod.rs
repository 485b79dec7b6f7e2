//! Parsers for the plain-text files the workflow reads
//!
//! This module provides parsers for:
//! - Build descriptors (Dockerfile), for the base image reference
//! - Abstract dependency specs (requirements.in)
//! - Installed package listings (constraint snapshots)
//! - Compiled manifests (requirements.txt)

mod dockerfile;
mod requirements;

pub use dockerfile::{extract_base_image, extract_base_image_from_file, parse_directives, Directive};
pub use requirements::{parse_frozen_manifest, parse_requirement, parse_snapshot, parse_spec};
