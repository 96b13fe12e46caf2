//! Server-rendered views and template bindings.

pub mod views;
