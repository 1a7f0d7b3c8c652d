//! Core definitions (error taxonomy and common result alias), relied upon by all ndyn-* crates.

pub mod error;
pub mod lock;
pub mod result;

pub use result::Result;
