//! The process-wide host interpreter lock.
//!
//! All execution of user-supplied per-element callables, and all release
//! hooks of externally owned memory blocks, must run while holding this lock.
//! Acquisition is scope-guarded and reentrant within a thread: an inner
//! acquire while the same thread already holds the lock is a no-op that only
//! extends the scope.

use std::cell::Cell;
use std::sync::{Mutex, MutexGuard};

static INTERPRETER_LOCK: Mutex<()> = Mutex::new(());

thread_local! {
    static HELD_DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// A scope guard for the interpreter lock. Dropping it releases the lock
/// when the outermost scope on this thread ends.
pub struct InterpreterGuard {
    outer: Option<MutexGuard<'static, ()>>,
}

/// Acquires the interpreter lock for the current scope.
pub fn acquire() -> InterpreterGuard {
    let depth = HELD_DEPTH.get();
    let outer = if depth == 0 {
        // A poisoned lock only means some callable panicked while holding
        // it; the guarded state is the host runtime's, not ours.
        Some(
            INTERPRETER_LOCK
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        )
    } else {
        None
    };
    HELD_DEPTH.set(depth + 1);
    InterpreterGuard { outer }
}

/// True if the current thread holds the interpreter lock.
pub fn is_held() -> bool {
    HELD_DEPTH.get() > 0
}

impl Drop for InterpreterGuard {
    fn drop(&mut self) {
        HELD_DEPTH.set(HELD_DEPTH.get() - 1);
        let _ = self.outer.take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scoped_acquire_release() {
        assert!(!is_held());
        {
            let _g = acquire();
            assert!(is_held());
        }
        assert!(!is_held());
    }

    #[test]
    fn reentrant_within_thread() {
        let _outer = acquire();
        {
            let _inner = acquire();
            assert!(is_held());
        }
        assert!(is_held());
    }

    #[test]
    fn excludes_other_threads() {
        let guard = acquire();
        let contender = std::thread::spawn(|| {
            let _g = acquire();
            true
        });
        // The other thread can only finish once we release.
        drop(guard);
        assert!(contender.join().unwrap());
    }
}
