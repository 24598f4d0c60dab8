//! Storage module for the mined block output file

pub mod output;

pub use output::{read_output, render_output, write_output, OutputRecord, StorageError};
