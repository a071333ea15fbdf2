//! HTTP handlers for the file manager API.

pub mod files;
