//! Core domain models for refreeze
//!
//! This module contains the value types passed between the workflow stages:
//! - Base image references
//! - PEP 440 versions and specifiers
//! - Abstract requirements and pinned packages
//! - Constraint snapshots and frozen manifests
//! - Change and report structures

mod change;
mod frozen;
mod image;
mod requirement;
mod snapshot;
mod version;

pub use change::{ChangeKind, FreezeReport, ManifestChange};
pub use frozen::{FloorViolation, FrozenManifest, ManifestEntry, Pin};
pub use image::ImageReference;
pub use requirement::{normalize_name, PinnedPackage, Requirement};
pub use snapshot::ConstraintSnapshot;
pub use version::{compare_versions, Operator, Pep440Version, PrePhase, Specifier, SpecifierSet};
