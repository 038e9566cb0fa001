//! Limits agent daemon
//!
//! Keeps the memory and CPU limits of named containers in line with a
//! desired-state document, and serves a small JSON control surface for
//! editing that document.

pub mod api;
pub mod config;
