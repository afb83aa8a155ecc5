// Tubekit: quota-aware YouTube Data API access and a content reaction
// ledger for a content platform.
//
// This is the library root. Each module corresponds to one subsystem; the
// binary in main.rs and the optional web server wire them together.

pub mod config;
pub mod db;
pub mod output;
pub mod quota;
pub mod reactions;
pub mod status;
pub mod youtube;

#[cfg(feature = "web")]
pub mod web;
