//! HTTP handlers grouped by surface.

pub mod health;
pub mod integrations;
pub mod security;
