//! Host-side glue: configuration and wiring for the broadcast loop.

pub mod config;
