//! Concrete array values: aligned buffers, reference-counted memory blocks
//! (owned and externally managed), and the array value abstraction combining
//! a block, a type descriptor, arrmeta and access flags.

pub mod array;
pub mod block;
pub mod buffer;
pub mod handle;

pub use array::{AccessFlags, Array};
pub use block::MemoryBlock;
pub use buffer::AlignedBuffer;
pub use handle::ArrayHandle;
