//! services/api/src/lib.rs
//!
//! HTTP service for the Vibeprep backend: the adapters that plug Postgres, SMTP,
//! Argon2, JWT and OpenAI into the core ports, and the axum web layer on top.

pub mod adapters;
pub mod config;
pub mod error;
pub mod web;
