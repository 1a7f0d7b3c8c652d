//! Array construction from foreign buffers and scalars.
//!
//! Two asymmetric paths: a zero-copy view over the foreign buffer (the
//! default), and a forced copy into freshly allocated canonical storage.
//! Permission legality is checked before anything is allocated.

use log::debug;
use ndyn_common::{Result, error::Error, lock, verify_arg};
use ndyn_array::{AccessFlags, Array, ArrayHandle, MemoryBlock};
use ndyn_kernel::assign::strided_assign;
use ndyn_types::{DataType, TypeId};
use ndyn_types::arrmeta::{self, DIM_ARRMETA_SIZE, DimArrmeta};
use ndyn_types::data_type::{
    default_struct_layout, make_date, make_datetime, make_scalar, make_strided_dim,
};

use crate::datetime::datetime_ticks;
use crate::descriptor::{ForeignDescriptor, ForeignTimeUnit};
use crate::from_foreign::{fill_arrmeta_from_descriptor, type_from_descriptor};

/// A foreign array as seen through the external library's protocol: a
/// descriptor, a base data pointer, per-dimension shape and byte strides, a
/// writability flag, and an optional release hook invoked (under the
/// interpreter lock) when the bridge is done with the buffer.
pub struct ForeignArray {
    pub desc: ForeignDescriptor,
    pub data: *mut u8,
    pub shape: Vec<i64>,
    pub strides: Vec<i64>,
    pub writable: bool,
    pub release: Option<Box<dyn FnOnce() + Send>>,
}

/// Largest power of two dividing `bits`, capped at 16.
fn get_alignment_of(bits: usize) -> usize {
    let mut alignment = 1;
    for _ in 0..4 {
        if bits & alignment == 0 {
            alignment <<= 1;
        } else {
            return alignment;
        }
    }
    alignment
}

fn buffer_alignment(foreign: &ForeignArray) -> usize {
    let mut bits = foreign.data as usize;
    for &stride in &foreign.strides {
        bits |= stride as usize;
    }
    get_alignment_of(bits)
}

/// Constructs an array value from a foreign array.
///
/// By default this is a zero-copy view sharing the foreign buffer, with the
/// buffer's actual alignment baked into the type. With `always_copy` the
/// elements are assigned into freshly allocated storage of the canonical
/// type. Requesting write access on a read-only buffer, or immutable access
/// on any view, fails before any allocation happens.
pub fn array_from_foreign(
    foreign: ForeignArray,
    access: Option<AccessFlags>,
    always_copy: bool,
) -> Result<ArrayHandle> {
    verify_arg!(strides, foreign.strides.len() == foreign.shape.len());
    if !always_copy {
        if let Some(flags) = access {
            if flags.contains(AccessFlags::WRITE) && !foreign.writable {
                return Err(Error::permission(
                    "cannot view a read-only foreign buffer as readwrite",
                ));
            }
            if flags.contains(AccessFlags::IMMUTABLE) {
                return Err(Error::permission(
                    "cannot view a foreign buffer as immutable",
                ));
            }
        }
    }

    if always_copy {
        copy_from_foreign(foreign, access)
    } else {
        view_of_foreign(foreign, access)
    }
}

fn copy_from_foreign(
    mut foreign: ForeignArray,
    access: Option<AccessFlags>,
) -> Result<ArrayHandle> {
    let src_dt = type_from_descriptor(&foreign.desc, 0)?;
    check_memcpy_safe(src_dt.dtype(), &foreign.desc)?;
    let dt = src_dt.canonical();
    let mut result_tp = dt.clone();
    for _ in &foreign.shape {
        result_tp = make_strided_dim(result_tp);
    }

    let (leaf_unit, leaf_swapped) = {
        let leaf = match &foreign.desc.subarray {
            Some(sub) => &*sub.base,
            None => &foreign.desc,
        };
        (leaf.datetime_unit, !leaf.byteorder.is_native())
    };

    // Subarray dimensions are walked explicitly since the destination packs
    // them.
    let mut shape = foreign.shape.clone();
    let mut src_strides = foreign.strides.clone();
    let elem_size;
    if let Some(sub) = &foreign.desc.subarray {
        let mut stride = sub.base.elsize as i64;
        let mut sub_strides = vec![0i64; sub.shape.len()];
        for i in (0..sub.shape.len()).rev() {
            sub_strides[i] = stride;
            stride *= sub.shape[i];
        }
        shape.extend_from_slice(&sub.shape);
        src_strides.extend_from_slice(&sub_strides);
        elem_size = sub.base.elsize;
    } else {
        elem_size = foreign.desc.elsize;
    }

    let mut result = Array::empty_shaped(result_tp, &shape)?;
    debug!("copying foreign buffer into a fresh {} array", result.dtype());
    let dst_strides = result.strides();
    if let Some(unit) = leaf_unit {
        // Foreign datetime storage is a raw int64 unit count; the canonical
        // element is date days or datetime ticks, so each element converts
        // rather than byte-copies.
        unsafe {
            convert_datetime_elements(
                result.data_mut_ptr(),
                &dst_strides,
                foreign.data,
                &src_strides,
                &shape,
                unit,
                leaf_swapped,
            )?;
        }
    } else {
        // Byteswapped scalars are copied element by element with the bytes
        // reversed; everything else is a plain strided byte copy.
        let swap = src_dt.dtype().id() == TypeId::Byteswap;
        unsafe {
            strided_assign(
                result.data_mut_ptr(),
                &dst_strides,
                foreign.data,
                &src_strides,
                &shape,
                elem_size,
                swap,
            )?;
        }
    }

    if let Some(release) = foreign.release.take() {
        let _guard = lock::acquire();
        release();
    }

    result.set_flags(access.unwrap_or_else(AccessFlags::read_write))?;
    Ok(ArrayHandle::new(result))
}

/// The copy path lays records out with the canonical default field offsets,
/// so the source layout must already coincide: native byte order, aligned
/// fields, aligned C offsets. Anything else would need a converting
/// assignment.
fn check_memcpy_safe(leaf: &DataType, desc: &ForeignDescriptor) -> Result<()> {
    if leaf.id() != TypeId::Struct {
        return Ok(());
    }
    if &leaf.canonical() != leaf {
        return Err(Error::not_implemented(
            "copying foreign record buffers with byteswapped or unaligned fields",
        ));
    }
    let record = match &desc.subarray {
        Some(sub) => &*sub.base,
        None => desc,
    };
    let field_types: Vec<DataType> = (0..leaf.field_count())
        .map(|i| leaf.field_type(i).expect("field in range").clone())
        .collect();
    let (offsets, size, _) = default_struct_layout(&field_types);
    let layout_matches = record.elsize == size
        && record
            .fields
            .iter()
            .zip(offsets.iter())
            .all(|(f, &offset)| f.offset == offset);
    if !layout_matches {
        return Err(Error::not_implemented(
            "copying foreign record buffers with a non-default field layout",
        ));
    }
    Ok(())
}

/// Converts strided foreign datetime storage (int64 unit counts) into the
/// canonical element values: int32 days for the days unit, int64 ticks for
/// the finer units.
///
/// # Safety
///
/// `dst` and `src` must be valid for the full extents described by `shape`
/// and the stride slices.
unsafe fn convert_datetime_elements(
    dst: *mut u8,
    dst_strides: &[i64],
    src: *const u8,
    src_strides: &[i64],
    shape: &[i64],
    unit: ForeignTimeUnit,
    swap_bytes: bool,
) -> Result<()> {
    let Some((&dim_size, rest_shape)) = shape.split_first() else {
        let mut raw = unsafe { std::ptr::read_unaligned(src as *const i64) };
        if swap_bytes {
            raw = raw.swap_bytes();
        }
        if unit == ForeignTimeUnit::Days {
            let days = i32::try_from(raw).map_err(|_| {
                Error::type_error(format!("day count {raw} does not fit in a date value"))
            })?;
            unsafe { std::ptr::write_unaligned(dst as *mut i32, days) };
        } else {
            let ticks = datetime_ticks(raw, unit)?;
            unsafe { std::ptr::write_unaligned(dst as *mut i64, ticks) };
        }
        return Ok(());
    };
    let (&dst_stride, rest_dst) = dst_strides.split_first().expect("stride per dim");
    let (&src_stride, rest_src) = src_strides.split_first().expect("stride per dim");
    for i in 0..dim_size {
        unsafe {
            convert_datetime_elements(
                dst.offset((i * dst_stride) as isize),
                rest_dst,
                src.offset((i * src_stride) as isize),
                rest_src,
                rest_shape,
                unit,
                swap_bytes,
            )?;
        }
    }
    Ok(())
}

fn view_of_foreign(
    mut foreign: ForeignArray,
    access: Option<AccessFlags>,
) -> Result<ArrayHandle> {
    let alignment = buffer_alignment(&foreign);
    let dt = type_from_descriptor(&foreign.desc, alignment)?;
    let mut full_tp = dt.clone();
    for _ in &foreign.shape {
        full_tp = make_strided_dim(full_tp);
    }
    debug!("viewing foreign buffer as {full_tp} at alignment {alignment}");

    let mut meta = vec![0u8; full_tp.arrmeta_size()];
    for (i, (&dim_size, &stride)) in foreign.shape.iter().zip(foreign.strides.iter()).enumerate()
    {
        arrmeta::set_dim_arrmeta(
            &mut meta[i * DIM_ARRMETA_SIZE..],
            DimArrmeta { dim_size, stride },
        );
    }
    if dt.arrmeta_size() > 0 {
        // Struct field offsets are arrmeta, so they are populated after the
        // type is built.
        let inner = &mut meta[foreign.shape.len() * DIM_ARRMETA_SIZE..];
        fill_arrmeta_from_descriptor(&dt, &foreign.desc, inner)?;
    }

    let mut len = foreign.desc.elsize;
    for (&dim_size, &stride) in foreign.shape.iter().zip(foreign.strides.iter()) {
        if dim_size == 0 {
            len = 0;
            break;
        }
        len += ((dim_size - 1) * stride.abs()) as usize;
    }

    let release = foreign.release.take().unwrap_or_else(|| Box::new(|| {}));
    let block = unsafe { MemoryBlock::from_external(foreign.data, len, release) };

    let flags = match access {
        Some(flags) => flags,
        None => {
            if foreign.writable {
                AccessFlags::read_write()
            } else {
                AccessFlags::read_only()
            }
        }
    };
    let array = unsafe { Array::from_raw_parts(block, foreign.data, full_tp, meta, flags) }?;
    Ok(ArrayHandle::new(array))
}

/// A single foreign scalar value.
pub enum ForeignScalar {
    Bool(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    Float32(f32),
    Float64(f64),
    Complex64 { re: f32, im: f32 },
    Complex128 { re: f64, im: f64 },
    Datetime { value: i64, unit: ForeignTimeUnit },
}

/// Builds a zero-dimensional array value holding one foreign scalar.
///
/// Datetime scalars in the days unit become date values; finer units become
/// datetime tick values with floor semantics for nanoseconds.
pub fn array_from_foreign_scalar(
    scalar: &ForeignScalar,
    access: Option<AccessFlags>,
) -> Result<ArrayHandle> {
    let mut result = match *scalar {
        ForeignScalar::Bool(v) => {
            let arr = Array::empty(make_scalar(TypeId::Bool)?)?;
            arr.set_pod(0, v as u8)?;
            arr
        }
        ForeignScalar::Int8(v) => pod_scalar(TypeId::Int8, v)?,
        ForeignScalar::Int16(v) => pod_scalar(TypeId::Int16, v)?,
        ForeignScalar::Int32(v) => pod_scalar(TypeId::Int32, v)?,
        ForeignScalar::Int64(v) => pod_scalar(TypeId::Int64, v)?,
        ForeignScalar::UInt8(v) => pod_scalar(TypeId::UInt8, v)?,
        ForeignScalar::UInt16(v) => pod_scalar(TypeId::UInt16, v)?,
        ForeignScalar::UInt32(v) => pod_scalar(TypeId::UInt32, v)?,
        ForeignScalar::UInt64(v) => pod_scalar(TypeId::UInt64, v)?,
        ForeignScalar::Float32(v) => pod_scalar(TypeId::Float32, v)?,
        ForeignScalar::Float64(v) => pod_scalar(TypeId::Float64, v)?,
        ForeignScalar::Complex64 { re, im } => pod_scalar(TypeId::Complex64, [re, im])?,
        ForeignScalar::Complex128 { re, im } => pod_scalar(TypeId::Complex128, [re, im])?,
        ForeignScalar::Datetime {
            value,
            unit: ForeignTimeUnit::Days,
        } => {
            let days = i32::try_from(value).map_err(|_| {
                Error::type_error(format!("day count {value} does not fit in a date value"))
            })?;
            let arr = Array::empty(make_date())?;
            arr.set_pod(0, days)?;
            arr
        }
        ForeignScalar::Datetime { value, unit } => {
            let ticks = datetime_ticks(value, unit)?;
            let arr = Array::empty(make_datetime())?;
            arr.set_pod(0, ticks)?;
            arr
        }
    };
    result.set_flags(access.unwrap_or_else(AccessFlags::read_write))?;
    Ok(ArrayHandle::new(result))
}

fn pod_scalar<T: bytemuck::Pod>(id: TypeId, value: T) -> Result<Array> {
    let arr = Array::empty(make_scalar(id)?)?;
    arr.set_pod(0, value)?;
    Ok(arr)
}
