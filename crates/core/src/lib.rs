//! Core library: classification, folder resolution, and the OCR auto-filing
//! pipeline for the document vault.

pub mod classifier;
pub mod config;
pub mod expiration;
pub mod folders;
pub mod limits;
pub mod metadata;
pub mod models;
pub mod path;
pub mod processor;
pub mod setup;
