//! services/api/src/lib.rs
//!
//! The HTTP service around the syllabus pipeline: configuration, the concrete
//! adapters for storage, Gemini, and Google Calendar, and the Axum web layer.

pub mod adapters;
pub mod config;
pub mod error;
pub mod web;
