//! Runtime-described array types: structural, immutable, reference-counted
//! type descriptors, their per-value metadata (arrmeta) layout, and shape
//! broadcasting.

pub mod arrmeta;
pub mod data_type;
pub mod shape;
pub mod type_id;

pub use data_type::DataType;
pub use type_id::{StringEncoding, TypeId};
