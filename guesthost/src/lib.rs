//! guesthost: host-side consumers of script hosts.
//!
//! `connect::transform` rewrites records through a guest callable,
//! `connect::source` produces records from a guest poll callable.

pub mod connect;
