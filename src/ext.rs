//! Consumer-facing helpers for attaching tracked tokens to outbound requests.

pub mod bearer;

pub use bearer::*;
