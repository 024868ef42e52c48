//! Work item automation for Azure DevOps style services.
//!
//! The [`engine`] binds typed objects from partially known JSON documents and
//! turns local edits into minimal JSON Patch documents; [`client`] and
//! [`cmd`] drive the fetch, edit and patch cycle over an [`adapters::Transport`].

pub mod adapters;
pub mod client;
pub mod cmd;
pub mod config;
pub mod domain;
pub mod engine;
pub mod io;
