//! Resilient acquisition and transformation pipeline for arbitrary JSON APIs.
//!
//! This crate provides:
//! - A multi-channel fetch orchestrator (direct, same-origin relay, public relay)
//! - A dot-path resolver and predicate filter over arbitrary JSON documents
//! - A label/value projection step for dropdown-style exports
//! - A client for the external schema/filter-inference collaborator
//! - Session state tying the pipeline together for a single user session

pub mod ai;
pub mod error;
pub mod fetch;
pub mod path;
pub mod predicate;
pub mod session;
pub mod transform;
pub mod types;

pub use ai::{AiConfig, AiError, AiResult, AnalysisService, GeminiClient, SchemaInference};
pub use error::FetchError;
pub use fetch::{FetchOptions, FetchOrchestrator};
pub use path::resolve;
pub use predicate::{Predicate, PredicateError};
pub use session::{Export, Session};
pub use transform::{available_keys, derive_view, project, Projection};
pub use types::*;
