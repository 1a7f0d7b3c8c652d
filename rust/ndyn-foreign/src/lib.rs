//! The foreign-array bridge: bidirectional conversion between this type
//! system and an external fixed-schema array library's descriptor model,
//! including byte order, alignment, struct field offsets and datetime units,
//! plus view/copy array construction over foreign buffers.

pub mod bridge;
pub mod datetime;
pub mod descriptor;
pub mod from_foreign;
pub mod to_foreign;

pub use bridge::{ForeignArray, ForeignScalar, array_from_foreign, array_from_foreign_scalar};
pub use descriptor::{ByteOrder, ForeignDescriptor, ForeignField, ForeignKind, ForeignTimeUnit};
pub use from_foreign::{fill_arrmeta_from_descriptor, type_from_descriptor};
pub use to_foreign::{descriptor_from_type, kind_char};
