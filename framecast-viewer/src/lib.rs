//! Viewer-side glue: configuration for the receiving end.

pub mod config;
