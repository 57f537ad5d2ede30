// lib.rs
pub mod error;
pub mod pipeline;
pub mod process;
pub mod tools;

pub use error::MapError;
pub use pipeline::{map_reads, MappingParams, MappingReport, SpliceStrand, StageReport};
pub use tools::{check_tools, ToolPaths};
