//! genotree: genograms from family member records
//!
//! Layers:
//! - `domain`: members, unions, the genogram builder and layout (no I/O)
//! - `application`: member documents and services
//! - `infrastructure`: file system and service wiring
//! - `cli`: argument parsing and command dispatch

pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod exitcode;
pub mod infrastructure;
pub mod tree_traits;
pub mod util;
