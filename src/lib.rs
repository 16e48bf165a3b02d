//! Settings shared by the `irptool` commands.

pub mod config;
