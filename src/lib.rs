//! Cross-catalog track identity resolution - shared modules for all binaries.

pub mod batch;
pub mod cache;
pub mod catalog;
pub mod collector;
pub mod config;
pub mod existence;
pub mod models;
pub mod normalize;
pub mod progress;
pub mod ranker;
pub mod resolver;
pub mod retry;
pub mod safety;
pub mod scoring;
pub mod source;

#[cfg(test)]
mod testing;
