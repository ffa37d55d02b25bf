//! RNA-seq table cleaning, gene symbol annotation, fold-change ranking and
//! transcription factor matrix filtering in Rust

pub mod cleaner;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod ranker;
pub mod subset;
pub mod symbols;
pub mod table;
pub mod types;
