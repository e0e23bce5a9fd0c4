//! Client credentials, scope lists, and secret wrappers.

pub mod credentials;
pub mod scope;
pub mod secret;

pub use credentials::*;
pub use scope::*;
pub use secret::*;
