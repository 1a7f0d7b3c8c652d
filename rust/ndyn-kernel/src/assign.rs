//! Strided assignment for trivial element types.
//!
//! The copy construction path duplicates a foreign buffer into freshly
//! allocated storage. The elements involved are trivial (no internal
//! references), so assignment is a strided byte copy, optionally swapping
//! each element's byte order when the source type carries a byteswap
//! wrapper.

use ndyn_common::{Result, verify_arg};

/// Copies `shape`-many elements of `element_size` bytes from a strided
/// source to a strided destination, reversing each element's bytes when
/// `swap_bytes` is set.
///
/// # Safety
///
/// `dst` and `src` must be valid for the full extents described by `shape`
/// and the stride slices, and the two regions must not overlap.
pub unsafe fn strided_assign(
    dst: *mut u8,
    dst_strides: &[i64],
    src: *const u8,
    src_strides: &[i64],
    shape: &[i64],
    element_size: usize,
    swap_bytes: bool,
) -> Result<()> {
    verify_arg!(dst_strides, dst_strides.len() == shape.len());
    verify_arg!(src_strides, src_strides.len() == shape.len());
    unsafe {
        assign_level(dst, dst_strides, src, src_strides, shape, element_size, swap_bytes);
    }
    Ok(())
}

unsafe fn assign_level(
    dst: *mut u8,
    dst_strides: &[i64],
    src: *const u8,
    src_strides: &[i64],
    shape: &[i64],
    element_size: usize,
    swap_bytes: bool,
) {
    let Some((&dim_size, rest_shape)) = shape.split_first() else {
        unsafe {
            copy_element(dst, src, element_size, swap_bytes);
        }
        return;
    };
    let (&dst_stride, rest_dst) = dst_strides.split_first().expect("stride per dim");
    let (&src_stride, rest_src) = src_strides.split_first().expect("stride per dim");
    for i in 0..dim_size {
        unsafe {
            assign_level(
                dst.offset((i * dst_stride) as isize),
                rest_dst,
                src.offset((i * src_stride) as isize),
                rest_src,
                rest_shape,
                element_size,
                swap_bytes,
            );
        }
    }
}

#[inline]
unsafe fn copy_element(dst: *mut u8, src: *const u8, size: usize, swap_bytes: bool) {
    if swap_bytes {
        for i in 0..size {
            unsafe {
                *dst.add(i) = *src.add(size - 1 - i);
            }
        }
    } else {
        unsafe {
            std::ptr::copy_nonoverlapping(src, dst, size);
        }
    }
}
