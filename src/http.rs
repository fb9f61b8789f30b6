//! HTTP access to the SmartPVMS management API.

pub mod client;
pub mod endpoints;
