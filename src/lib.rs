//! Contract Comparator Library
//!
//! This library provides the core functionality for the health-insurance
//! contract comparator, including the guarantee-value analyzer, PDF extraction
//! and contract ranking through the Gemini API, the JSON contract collection,
//! and HTTP handlers.
//!
//! # Modules
//!
//! - `api`: Route table.
//! - `core`: Guarantee analysis.
//! - `integrations`: External service integrations.
//! - `analyzer`: Contract benefit analysis.
//! - `comparison`: Contract ranking against a user's needs.
//! - `config`: Configuration management.
//! - `contract_store`: JSON contract collection.
//! - `errors`: Error handling types.
//! - `extraction`: PDF contract extraction.
//! - `frontend_config`: Slider descriptors for the UI.
//! - `gemini_client`: Gemini API client.
//! - `guarantee_catalog`: Per-guarantee slider overrides and labels.
//! - `handlers`: HTTP request handlers.
//! - `models`: Stored records and API responses.
//! - `rate_limiter`: Spacing of generative-AI calls.
//! - `slider`: Slider configuration generator.
//! - `value_parser`: Raw guarantee value parsing.

pub mod api;
pub mod core;
pub mod integrations;

// Re-export primary modules for shared use in tests and other binaries
pub mod analyzer;
pub mod comparison;
pub mod config;
pub mod contract_store;
pub mod errors;
pub mod extraction;
pub mod frontend_config;
pub mod gemini_client;
pub mod guarantee_catalog;
pub mod handlers;
pub mod models;
pub mod rate_limiter;
pub mod slider;
pub mod value_parser;
