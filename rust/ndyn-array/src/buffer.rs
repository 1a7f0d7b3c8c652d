//! A byte buffer that maintains a caller-chosen memory alignment for its
//! underlying storage by padding the front of a plain `Vec<u8>`.

/// A fixed-length, zero-initialized byte buffer with guaranteed alignment.
pub struct AlignedBuffer {
    /// The underlying byte vector, may include padding at start.
    inner: Vec<u8>,
    /// Offset from the start of `inner` to the aligned data.
    start: usize,
    len: usize,
    alignment: usize,
}

impl AlignedBuffer {
    /// Creates a zero-filled buffer of `len` bytes aligned to `alignment`
    /// (a power of two).
    pub fn zeroed(len: usize, alignment: usize) -> AlignedBuffer {
        assert!(alignment.is_power_of_two());
        let inner = vec![0u8; len + alignment];
        let start = inner.as_ptr().align_offset(alignment);
        debug_assert!(start < alignment || alignment == 1);
        AlignedBuffer {
            inner,
            start,
            len,
            alignment,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn alignment(&self) -> usize {
        self.alignment
    }

    #[inline]
    pub fn as_ptr(&self) -> *const u8 {
        unsafe { self.inner.as_ptr().add(self.start) }
    }

    #[inline]
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        unsafe { self.inner.as_mut_ptr().add(self.start) }
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.inner[self.start..self.start + self.len]
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.inner[self.start..self.start + self.len]
    }
}
