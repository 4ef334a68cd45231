//! Command modules - one file per CLI command

pub mod archive;
pub mod checksum;
pub mod completions;
pub mod execute;
pub mod info;
pub mod releases;
pub mod validate;
