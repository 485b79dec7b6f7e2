//! refreeze - dependency re-freezing library
//!
//! This library regenerates a fully pinned Python requirements manifest
//! against the base image of a Dockerfile:
//! - Extract the base image reference from the build descriptor
//! - Capture the packages the image ships as a constraint snapshot
//! - Compile the abstract dependency specs under those constraints
//! - Verify and atomically persist the frozen manifest

pub mod cli;
pub mod config;
pub mod domain;
pub mod environment;
pub mod error;
pub mod interrupt;
pub mod manifest;
pub mod orchestrator;
pub mod output;
pub mod parser;
pub mod progress;
pub mod snapshot;
