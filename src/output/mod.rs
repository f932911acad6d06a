//! Output module for reports and exports
//!
//! This module handles:
//! - Computing and printing archive statistics from the checkpoint
//! - Exporting archived posts as a plain-text corpus

mod corpus;
pub mod stats;

pub use corpus::{export_corpus, format_corpus_entry};
pub use stats::{load_statistics, print_statistics, ArchiveStatistics};
