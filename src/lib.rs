//! workforge library crate
//!
//! Turns unstructured work-tracker records into structured generation
//! prompts, and noisy generation replies back into validated code bundles.

pub mod artifact;
pub mod branch;
pub mod config;
pub mod extract;
pub mod generate;
pub mod pipeline;
pub mod prompt;
pub mod record;
pub mod retry;
pub mod tracker;
