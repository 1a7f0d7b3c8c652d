//! Shared array handles.
//!
//! A handle is the unit of sharing handed to user code: cloning a handle
//! shares the same array value, and the kernel postcondition check uses the
//! handle's use count to detect user callables that squirreled away a
//! reference to a shell value.

use std::cell::UnsafeCell;
use std::fmt;
use std::sync::Arc;

use crate::array::Array;

/// A reference-counted handle to an array value.
#[derive(Clone)]
pub struct ArrayHandle(Arc<ArrayCell>);

struct ArrayCell {
    array: UnsafeCell<Array>,
}

// Handles cross threads only while the interpreter lock is held; the lock
// serializes every access that goes through user callables.
unsafe impl Send for ArrayCell {}
unsafe impl Sync for ArrayCell {}

impl ArrayHandle {
    pub fn new(array: Array) -> ArrayHandle {
        ArrayHandle(Arc::new(ArrayCell {
            array: UnsafeCell::new(array),
        }))
    }

    /// Runs `f` with shared access to the array value.
    pub fn with<R>(&self, f: impl FnOnce(&Array) -> R) -> R {
        f(unsafe { &*self.0.array.get() })
    }

    /// Runs `f` with exclusive access to the array value.
    ///
    /// # Safety
    ///
    /// The caller must ensure no other access to this handle's array value
    /// is live for the duration of `f`. Kernel shells satisfy this by
    /// construction: the kernel is their only owner between calls.
    pub unsafe fn with_mut<R>(&self, f: impl FnOnce(&mut Array) -> R) -> R {
        f(unsafe { &mut *self.0.array.get() })
    }

    /// Number of live handles sharing this array value.
    pub fn use_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }

    /// Number of live references to the underlying memory block.
    pub fn block_use_count(&self) -> usize {
        self.with(|a| a.block().use_count())
    }
}

impl fmt::Debug for ArrayHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.with(|a| {
            f.debug_struct("ArrayHandle")
                .field("dtype", &format_args!("{}", a.dtype()))
                .field("shape", &a.shape())
                .finish()
        })
    }
}
