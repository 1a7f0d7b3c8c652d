//! Reference-counted memory blocks.
//!
//! A memory block is the one cross-owner shared resource of the engine:
//! array values and views share blocks, and the last release frees the
//! storage. Blocks are either owned (allocated by the engine) or external
//! (borrowed from a foreign array library, released through a registered
//! hook that runs under the interpreter lock).

use std::cell::UnsafeCell;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use ndyn_common::lock;

use crate::buffer::AlignedBuffer;

static ALLOCATION_COUNT: AtomicU64 = AtomicU64::new(0);

/// A shared handle to a memory block. Cloning shares ownership; the block is
/// freed (or its external release hook invoked) when the last handle drops.
#[derive(Clone)]
pub struct MemoryBlock(Arc<BlockData>);

struct BlockData {
    kind: BlockKind,
}

enum BlockKind {
    Owned(UnsafeCell<AlignedBuffer>),
    External(ExternalBlock),
}

// Element data inside a block is mutated through raw pointers held by array
// values with write access. Callers must not mutate a block from two owners
// at once; the interpreter lock serializes all user-callable execution.
unsafe impl Send for BlockData {}
unsafe impl Sync for BlockData {}

struct ExternalBlock {
    ptr: *mut u8,
    len: usize,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl Drop for ExternalBlock {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            // The foreign owner's refcount is not atomic; the release hook
            // must run under the interpreter lock no matter which thread
            // drops the last reference.
            let _guard = lock::acquire();
            release();
        }
    }
}

impl MemoryBlock {
    /// Allocates a zero-filled owned block.
    pub fn allocate(len: usize, alignment: usize) -> MemoryBlock {
        ALLOCATION_COUNT.fetch_add(1, Ordering::Relaxed);
        MemoryBlock(Arc::new(BlockData {
            kind: BlockKind::Owned(UnsafeCell::new(AlignedBuffer::zeroed(len, alignment))),
        }))
    }

    /// Wraps externally owned memory. The release hook is invoked exactly
    /// once, under the interpreter lock, when the last handle drops.
    ///
    /// # Safety
    ///
    /// `ptr` must stay valid for reads (and writes, if any referencing array
    /// value carries write access) of `len` bytes until the release hook
    /// runs.
    pub unsafe fn from_external(
        ptr: *mut u8,
        len: usize,
        release: Box<dyn FnOnce() + Send>,
    ) -> MemoryBlock {
        MemoryBlock(Arc::new(BlockData {
            kind: BlockKind::External(ExternalBlock {
                ptr,
                len,
                release: Some(release),
            }),
        }))
    }

    pub fn len(&self) -> usize {
        match &self.0.kind {
            BlockKind::Owned(buffer) => unsafe { (*buffer.get()).len() },
            BlockKind::External(ext) => ext.len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_ptr(&self) -> *const u8 {
        match &self.0.kind {
            BlockKind::Owned(buffer) => unsafe { (*buffer.get()).as_ptr() },
            BlockKind::External(ext) => ext.ptr,
        }
    }

    pub fn as_mut_ptr(&self) -> *mut u8 {
        match &self.0.kind {
            BlockKind::Owned(buffer) => unsafe { (*buffer.get()).as_mut_ptr() },
            BlockKind::External(ext) => ext.ptr,
        }
    }

    pub fn is_external(&self) -> bool {
        matches!(self.0.kind, BlockKind::External(_))
    }

    /// Number of live handles sharing this block. The kernel postcondition
    /// check compares this against its pre-call baseline.
    pub fn use_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }

    /// Total owned-block allocations performed by this process so far.
    /// Lets tests assert that failed constructions allocate nothing.
    pub fn allocation_count() -> u64 {
        ALLOCATION_COUNT.load(Ordering::Relaxed)
    }
}
