//! Middleware for the teledrive HTTP API.

pub mod cors;

pub use cors::create_cors_layer;
