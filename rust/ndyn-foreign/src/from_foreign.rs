//! Foreign descriptor to internal type conversion, plus arrmeta population
//! from a foreign descriptor.

use ndyn_common::{Result, error::Error};
use ndyn_types::{DataType, StringEncoding, TypeId};
use ndyn_types::arrmeta::{self, DIM_ARRMETA_SIZE, DimArrmeta};
use ndyn_types::data_type::{
    make_byteswap, make_fixed_dim, make_fixed_string, make_scalar, make_struct, make_unaligned,
    reconcile_alignment,
};

use crate::datetime::adapt_type_for_unit;
use crate::descriptor::{ForeignDescriptor, ForeignKind};

#[inline]
fn offset_is_aligned(offset: usize, alignment: usize) -> bool {
    offset & (alignment - 1) == 0
}

/// Converts a foreign descriptor to an internal type.
///
/// `data_alignment` is the alignment the data this descriptor will describe
/// actually has; pass 0 when the data is naturally aligned. Insufficiently
/// aligned results are wrapped in an unaligned adapter, and non-native byte
/// order wraps scalars in a byteswap adapter.
pub fn type_from_descriptor(d: &ForeignDescriptor, data_alignment: usize) -> Result<DataType> {
    if let Some(sub) = &d.subarray {
        let base = type_from_descriptor(&sub.base, data_alignment)?;
        return make_fixed_dim(&sub.shape, base);
    }

    let mut dt = match d.kind {
        ForeignKind::Bool => make_scalar(TypeId::Bool)?,
        ForeignKind::Int8 => make_scalar(TypeId::Int8)?,
        ForeignKind::UInt8 => make_scalar(TypeId::UInt8)?,
        ForeignKind::Int16 => make_scalar(TypeId::Int16)?,
        ForeignKind::UInt16 => make_scalar(TypeId::UInt16)?,
        ForeignKind::Int32 => make_scalar(TypeId::Int32)?,
        ForeignKind::UInt32 => make_scalar(TypeId::UInt32)?,
        ForeignKind::Int64 => make_scalar(TypeId::Int64)?,
        ForeignKind::UInt64 => make_scalar(TypeId::UInt64)?,
        ForeignKind::Float32 => make_scalar(TypeId::Float32)?,
        ForeignKind::Float64 => make_scalar(TypeId::Float64)?,
        ForeignKind::Complex64 => make_scalar(TypeId::Complex64)?,
        ForeignKind::Complex128 => make_scalar(TypeId::Complex128)?,
        ForeignKind::String => make_fixed_string(d.elsize, StringEncoding::Ascii)?,
        ForeignKind::Unicode => make_fixed_string(d.elsize / 4, StringEncoding::Utf32)?,
        ForeignKind::Record => struct_type_from_record(d, data_alignment)?,
        ForeignKind::Datetime => {
            let unit = d.datetime_unit.ok_or_else(|| {
                Error::corrupt_descriptor("datetime", "datetime descriptor carries no unit")
            })?;
            adapt_type_for_unit(unit)
        }
    };

    if !d.byteorder.is_native() && dt.is_builtin() {
        dt = make_byteswap(dt)?;
    }

    if data_alignment != 0 && data_alignment < dt.data_alignment() {
        dt = make_unaligned(dt);
    }

    Ok(dt)
}

/// Builds a struct type from a record descriptor. Fields whose offsets are
/// not aligned enough for their natural alignment are wrapped unaligned
/// instead of failing.
fn struct_type_from_record(d: &ForeignDescriptor, data_alignment: usize) -> Result<DataType> {
    if d.fields.is_empty() {
        return Err(Error::corrupt_descriptor(
            "record",
            "record descriptor carries no fields",
        ));
    }

    let requested = if data_alignment == 0 {
        d.alignment
    } else {
        data_alignment
    };
    // The alignment must divide the element size; shrink until it does.
    let alignment = reconcile_alignment(d.elsize, requested.max(1));

    let mut field_names = Vec::with_capacity(d.fields.len());
    let mut field_types = Vec::with_capacity(d.fields.len());
    for field in &d.fields {
        let mut ft = type_from_descriptor(&field.desc, alignment)?;
        if !offset_is_aligned(field.offset | alignment, ft.data_alignment()) {
            ft = make_unaligned(ft);
        }
        field_names.push(field.name.clone());
        field_types.push(ft);
    }
    make_struct(field_names, field_types)
}

/// Populates `arrmeta` for a type built from a foreign descriptor: struct
/// field offsets come from the descriptor's field table, and subarray
/// dimensions get packed C-order strides computed innermost-out from the
/// base element size.
pub fn fill_arrmeta_from_descriptor(
    tp: &DataType,
    d: &ForeignDescriptor,
    arrmeta: &mut [u8],
) -> Result<()> {
    match tp.id() {
        TypeId::Struct => {
            // Field offsets are arrmeta in this model, so they are
            // populated here rather than during type conversion.
            if d.fields.len() != tp.field_count() {
                return Err(Error::corrupt_descriptor(
                    "record",
                    format!(
                        "record descriptor has {} fields, the struct type has {}",
                        d.fields.len(),
                        tp.field_count()
                    ),
                ));
            }
            for (i, field) in d.fields.iter().enumerate() {
                arrmeta::set_struct_offset(arrmeta, i, field.offset as u64);
                let ft = tp.field_type(i).expect("field in range").clone();
                if ft.arrmeta_size() > 0 {
                    let sub = tp.field_arrmeta_offset(i).expect("struct field");
                    fill_arrmeta_from_descriptor(
                        &ft,
                        &field.desc,
                        &mut arrmeta[sub..sub + ft.arrmeta_size()],
                    )?;
                }
            }
            Ok(())
        }
        TypeId::FixedDim => {
            let Some(sub) = &d.subarray else {
                return Err(Error::corrupt_descriptor(
                    "subarray",
                    "descriptor has no subarray corresponding to a fixed dimension type",
                ));
            };
            let ndim = sub.shape.len();
            let mut el = tp.clone();
            let mut stride = sub.base.elsize as i64;
            let mut records = vec![
                DimArrmeta {
                    dim_size: 0,
                    stride: 0
                };
                ndim
            ];
            for i in (0..ndim).rev() {
                records[i] = DimArrmeta {
                    dim_size: sub.shape[i],
                    stride,
                };
                stride *= sub.shape[i];
            }
            for (i, rec) in records.iter().enumerate() {
                arrmeta::set_dim_arrmeta(&mut arrmeta[i * DIM_ARRMETA_SIZE..], *rec);
                el = el.element_type().expect("fixed dim element").clone();
            }
            if el.arrmeta_size() > 0 {
                fill_arrmeta_from_descriptor(&el, &sub.base, &mut arrmeta[ndim * DIM_ARRMETA_SIZE..])?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{ByteOrder, ForeignField, ForeignTimeUnit};

    #[test]
    fn scalar_kinds_convert() {
        let cases = [
            (ForeignKind::Bool, TypeId::Bool),
            (ForeignKind::Int8, TypeId::Int8),
            (ForeignKind::UInt16, TypeId::UInt16),
            (ForeignKind::Int32, TypeId::Int32),
            (ForeignKind::UInt64, TypeId::UInt64),
            (ForeignKind::Float32, TypeId::Float32),
            (ForeignKind::Float64, TypeId::Float64),
            (ForeignKind::Complex64, TypeId::Complex64),
            (ForeignKind::Complex128, TypeId::Complex128),
        ];
        for (kind, id) in cases {
            let dt = type_from_descriptor(&ForeignDescriptor::scalar(kind), 0).unwrap();
            assert_eq!(dt.id(), id);
        }
    }

    #[test]
    fn non_native_order_wraps_byteswap() {
        let d = ForeignDescriptor::scalar(ForeignKind::Int32)
            .with_byteorder(ByteOrder::native().swapped());
        let dt = type_from_descriptor(&d, 0).unwrap();
        assert_eq!(dt.id(), TypeId::Byteswap);
        assert_eq!(dt.operand_type().unwrap().id(), TypeId::Int32);
    }

    #[test]
    fn insufficient_alignment_wraps_unaligned() {
        let d = ForeignDescriptor::scalar(ForeignKind::Float64);
        let dt = type_from_descriptor(&d, 1).unwrap();
        assert_eq!(dt.id(), TypeId::View);
        assert_eq!(dt.data_alignment(), 1);
        assert_eq!(dt.value_type().unwrap().id(), TypeId::Float64);
    }

    #[test]
    fn strings_convert_with_encodings() {
        let d = ForeignDescriptor::string(ForeignKind::String, 8);
        let dt = type_from_descriptor(&d, 0).unwrap();
        assert_eq!(dt.id(), TypeId::FixedString);
        assert_eq!(dt.string_encoding(), Some(StringEncoding::Ascii));
        assert_eq!(dt.data_size(), 8);

        let d = ForeignDescriptor::string(ForeignKind::Unicode, 8);
        let dt = type_from_descriptor(&d, 0).unwrap();
        assert_eq!(dt.string_encoding(), Some(StringEncoding::Utf32));
        assert_eq!(dt.data_size(), 32);
    }

    #[test]
    fn record_with_unaligned_field() {
        // f64 at offset 1 cannot be naturally aligned.
        let d = ForeignDescriptor::record(
            vec![
                ForeignField {
                    name: "a".into(),
                    desc: ForeignDescriptor::scalar(ForeignKind::Int8),
                    offset: 0,
                },
                ForeignField {
                    name: "b".into(),
                    desc: ForeignDescriptor::scalar(ForeignKind::Float64),
                    offset: 1,
                },
            ],
            9,
            1,
        );
        let dt = type_from_descriptor(&d, 0).unwrap();
        assert_eq!(dt.id(), TypeId::Struct);
        assert_eq!(dt.field_type(0).unwrap().id(), TypeId::Int8);
        let b = dt.field_type(1).unwrap();
        assert_eq!(b.id(), TypeId::View);
        assert_eq!(b.data_alignment(), 1);
    }

    #[test]
    fn empty_record_is_corrupt() {
        let d = ForeignDescriptor::record(vec![], 0, 1);
        let err = type_from_descriptor(&d, 0).unwrap_err();
        assert!(matches!(
            err.kind(),
            ndyn_common::error::ErrorKind::CorruptDescriptor { .. }
        ));
    }

    #[test]
    fn subarray_becomes_fixed_dims() {
        let d = ForeignDescriptor::subarray(vec![2, 3], ForeignDescriptor::scalar(ForeignKind::Int32));
        let dt = type_from_descriptor(&d, 0).unwrap();
        assert_eq!(dt.id(), TypeId::FixedDim);
        assert_eq!(dt.ndim(), 2);
        assert_eq!(dt.fixed_dim_size(), Some(2));
        assert_eq!(dt.dtype().id(), TypeId::Int32);
    }

    #[test]
    fn datetime_converts_to_adapt() {
        let d = ForeignDescriptor::datetime(ForeignTimeUnit::Nanoseconds);
        let dt = type_from_descriptor(&d, 0).unwrap();
        assert_eq!(dt.id(), TypeId::Adapt);
        assert_eq!(dt.adapt_op(), Some("nanoseconds since 1970"));
    }

    #[test]
    fn struct_offsets_fill_from_descriptor() {
        let d = ForeignDescriptor::record(
            vec![
                ForeignField {
                    name: "x".into(),
                    desc: ForeignDescriptor::scalar(ForeignKind::Int32),
                    offset: 0,
                },
                ForeignField {
                    name: "y".into(),
                    desc: ForeignDescriptor::scalar(ForeignKind::Int32),
                    offset: 12,
                },
            ],
            16,
            4,
        );
        let dt = type_from_descriptor(&d, 0).unwrap();
        let mut meta = vec![0u8; dt.arrmeta_size()];
        fill_arrmeta_from_descriptor(&dt, &d, &mut meta).unwrap();
        assert_eq!(arrmeta::struct_offset(&meta, 0), 0);
        assert_eq!(arrmeta::struct_offset(&meta, 1), 12);
    }

    #[test]
    fn subarray_strides_fill_innermost_out() {
        let d = ForeignDescriptor::subarray(vec![2, 3], ForeignDescriptor::scalar(ForeignKind::Int32));
        let dt = type_from_descriptor(&d, 0).unwrap();
        let mut meta = vec![0u8; dt.arrmeta_size()];
        fill_arrmeta_from_descriptor(&dt, &d, &mut meta).unwrap();
        let outer = arrmeta::dim_arrmeta(&meta);
        let inner = arrmeta::dim_arrmeta(&meta[DIM_ARRMETA_SIZE..]);
        assert_eq!(outer.dim_size, 2);
        assert_eq!(outer.stride, 12);
        assert_eq!(inner.dim_size, 3);
        assert_eq!(inner.stride, 4);
    }
}
