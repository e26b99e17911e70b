//! Side-effecting collaborators: HTTP backend, local archive, config and views.

pub mod archive;
pub mod config;
pub mod http;
pub mod render;
pub mod services;
