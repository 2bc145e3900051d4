//! Prosodic feature extraction and aggregation for comparing infant- and
//! adult-directed speech in natural and synthesized recordings.

pub mod aggregate;
pub mod audio;
pub mod cli;
pub mod config;
pub mod export;
pub mod features;
pub mod metadata;
pub mod pipeline;
pub mod report;
pub mod segmentation;
pub mod synthesis;
pub mod types;
pub mod verification;
