//! Core application primitives (HTTP surface, shared state)

pub mod http;

pub use http::*;
