//! # NDYN: Dynamic Multidimensional Array Engine
//!
//! NDYN is a dynamically typed multidimensional array engine. Array types are
//! runtime values built from a closed set of constructors (builtin scalars,
//! fixed and strided and variable dimensions, structs, strings, and
//! expression wrappers such as byteswap and alignment views), while the
//! variable parts of a value's layout (strides, field offsets) live in
//! per-value arrmeta alongside the data.
//!
//! ## Crates
//!
//! * `ndyn-types`: the type engine; type construction, canonicalization,
//!   arrmeta layout, and broadcasting.
//! * `ndyn-array`: array values; memory blocks, access flags, and shared
//!   handles.
//! * `ndyn-kernel`: elementwise expression kernels; kernel chain assembly,
//!   dimension peeling with broadcasting, and the `elwise_map` entry point
//!   that lifts a user callable over array arguments.
//! * `ndyn-foreign`: the bridge to foreign fixed-schema array libraries;
//!   descriptor conversion in both directions, zero-copy buffer views, and
//!   datetime unit adaptation.
//! * `ndyn-common`: shared error types and the reentrant interpreter lock.

pub use ndyn_array as array;
pub use ndyn_common as common;
pub use ndyn_foreign as foreign;
pub use ndyn_kernel as kernel;
pub use ndyn_types as types;
