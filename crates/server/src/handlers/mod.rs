//! HTTP request handlers.

pub mod apt;
pub mod health;
pub mod keys;
pub mod packages;

pub use apt::*;
pub use health::*;
pub use keys::*;
pub use packages::*;
