//! # API Route Modules
//!
//! - `artifacts` — model artifact upload, download with conditional-GET
//!   support, and the liveness probe.

pub mod artifacts;
