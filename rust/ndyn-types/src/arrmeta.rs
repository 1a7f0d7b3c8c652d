//! Per-value metadata (arrmeta) layout.
//!
//! Arrmeta lives alongside an array value, not inside its type: the same
//! struct type can describe buffers with different field offsets, and the
//! same dimension type can describe buffers with different strides. The byte
//! layout of an arrmeta block is defined recursively by each type's
//! `arrmeta_size` with children laid out depth-first.

use bytemuck::{Pod, Zeroable};
use ndyn_common::{Result, error::Error};

use crate::data_type::{DataType, default_struct_layout};
use crate::type_id::TypeId;

/// Arrmeta record of a fixed or strided dimension.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct DimArrmeta {
    pub dim_size: i64,
    pub stride: i64,
}

pub const DIM_ARRMETA_SIZE: usize = std::mem::size_of::<DimArrmeta>();

/// Arrmeta record of a variable-length dimension (stride and offset within
/// the out-of-line block).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct VarDimArrmeta {
    pub stride: i64,
    pub offset: i64,
}

pub const VAR_DIM_ARRMETA_SIZE: usize = std::mem::size_of::<VarDimArrmeta>();

/// Size of one entry in a struct's field offset table.
pub const STRUCT_OFFSET_SIZE: usize = std::mem::size_of::<u64>();

/// Reads the dimension record at the front of `arrmeta`.
pub fn dim_arrmeta(arrmeta: &[u8]) -> DimArrmeta {
    bytemuck::pod_read_unaligned(&arrmeta[..DIM_ARRMETA_SIZE])
}

/// Writes the dimension record at the front of `arrmeta`.
pub fn set_dim_arrmeta(arrmeta: &mut [u8], record: DimArrmeta) {
    arrmeta[..DIM_ARRMETA_SIZE].copy_from_slice(bytemuck::bytes_of(&record));
}

/// Reads the byte offset of struct field `index` from the offset table.
pub fn struct_offset(arrmeta: &[u8], index: usize) -> u64 {
    let at = index * STRUCT_OFFSET_SIZE;
    bytemuck::pod_read_unaligned(&arrmeta[at..at + STRUCT_OFFSET_SIZE])
}

/// Writes the byte offset of struct field `index` into the offset table.
pub fn set_struct_offset(arrmeta: &mut [u8], index: usize, offset: u64) {
    let at = index * STRUCT_OFFSET_SIZE;
    arrmeta[at..at + STRUCT_OFFSET_SIZE].copy_from_slice(bytemuck::bytes_of(&offset));
}

/// Fills `arrmeta` with default layout data for `tp`: aligned C offsets for
/// structs, packed C strides for fixed dimensions.
///
/// Strided and variable dimensions have no default; they need a shape
/// (see [`fill_strided`]).
pub fn fill_default(tp: &DataType, arrmeta: &mut [u8]) -> Result<()> {
    debug_assert_eq!(arrmeta.len(), tp.arrmeta_size());
    match tp.id() {
        TypeId::Struct => {
            let field_types: Vec<DataType> = (0..tp.field_count())
                .map(|i| tp.field_type(i).expect("field in range").clone())
                .collect();
            let (offsets, _, _) = default_struct_layout(&field_types);
            for (i, offset) in offsets.iter().enumerate() {
                set_struct_offset(arrmeta, i, *offset as u64);
                let sub = tp.field_arrmeta_offset(i).expect("struct field");
                let ft = &field_types[i];
                if ft.arrmeta_size() > 0 {
                    fill_default(ft, &mut arrmeta[sub..sub + ft.arrmeta_size()])?;
                }
            }
            Ok(())
        }
        TypeId::FixedDim => {
            let element = tp.element_type().expect("fixed dim element").clone();
            let dim_size = tp.fixed_dim_size().expect("fixed dim size");
            set_dim_arrmeta(
                arrmeta,
                DimArrmeta {
                    dim_size,
                    stride: element.data_size() as i64,
                },
            );
            if element.arrmeta_size() > 0 {
                fill_default(&element, &mut arrmeta[DIM_ARRMETA_SIZE..])?;
            }
            Ok(())
        }
        TypeId::StridedDim => Err(Error::type_error(
            "a strided dimension has no default arrmeta; a shape is required",
        )),
        TypeId::VarDim => Err(Error::not_implemented(
            "default arrmeta for variable-length dimensions",
        )),
        _ => {
            if let Some(operand) = tp.operand_type() {
                if operand.arrmeta_size() > 0 {
                    return fill_default(operand, arrmeta);
                }
            }
            Ok(())
        }
    }
}

/// Fills `arrmeta` for a type whose leading dimensions should take the given
/// shape with packed C-order strides. Returns the data size in bytes that a
/// buffer for this value needs.
pub fn fill_strided(tp: &DataType, shape: &[i64], arrmeta: &mut [u8]) -> Result<usize> {
    match tp.id() {
        TypeId::StridedDim | TypeId::FixedDim => {
            let Some((&dim_size, rest)) = shape.split_first() else {
                return Err(Error::type_error(format!(
                    "shape has fewer dimensions than the type {tp}"
                )));
            };
            if dim_size < 0 {
                return Err(Error::type_error(
                    "cannot allocate a strided buffer for a variable-length dimension",
                ));
            }
            if tp.id() == TypeId::FixedDim && tp.fixed_dim_size() != Some(dim_size) {
                return Err(Error::type_error(format!(
                    "shape dimension {dim_size} does not match fixed dimension {}",
                    tp.fixed_dim_size().unwrap_or(0)
                )));
            }
            let element = tp.element_type().expect("dimension element").clone();
            let inner_size =
                fill_strided(&element, rest, &mut arrmeta[DIM_ARRMETA_SIZE..])?;
            set_dim_arrmeta(
                arrmeta,
                DimArrmeta {
                    dim_size,
                    stride: inner_size as i64,
                },
            );
            Ok((dim_size as usize) * inner_size)
        }
        TypeId::VarDim => Err(Error::not_implemented(
            "allocating variable-length dimensions",
        )),
        _ => {
            if !shape.is_empty() {
                return Err(Error::type_error(format!(
                    "shape has more dimensions than the type {tp}"
                )));
            }
            if tp.arrmeta_size() > 0 {
                fill_default(tp, arrmeta)?;
            }
            Ok(tp.data_size())
        }
    }
}

/// Deep-copies an arrmeta block for a duplicated value.
///
/// All records in this model are plain offsets and strides, so the deep copy
/// is bytewise; the function is the type-aware seam where reference-carrying
/// arrmeta would hook in.
pub fn copy_construct(tp: &DataType, src: &[u8]) -> Vec<u8> {
    debug_assert_eq!(src.len(), tp.arrmeta_size());
    src.to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_type::{make_fixed_dim, make_scalar, make_strided_dim, make_struct};

    fn int32() -> DataType {
        make_scalar(TypeId::Int32).unwrap()
    }

    #[test]
    fn dim_record_roundtrip() {
        let mut buf = vec![0u8; DIM_ARRMETA_SIZE];
        set_dim_arrmeta(
            &mut buf,
            DimArrmeta {
                dim_size: 7,
                stride: -4,
            },
        );
        let rec = dim_arrmeta(&buf);
        assert_eq!(rec.dim_size, 7);
        assert_eq!(rec.stride, -4);
    }

    #[test]
    fn default_struct_offsets() {
        let st = make_struct(
            vec!["a".into(), "b".into()],
            vec![make_scalar(TypeId::Int8).unwrap(), int32()],
        )
        .unwrap();
        let mut arrmeta = vec![0u8; st.arrmeta_size()];
        fill_default(&st, &mut arrmeta).unwrap();
        assert_eq!(struct_offset(&arrmeta, 0), 0);
        assert_eq!(struct_offset(&arrmeta, 1), 4);
    }

    #[test]
    fn strided_fill_computes_c_order() {
        let tp = make_strided_dim(make_strided_dim(int32()));
        let mut arrmeta = vec![0u8; tp.arrmeta_size()];
        let size = fill_strided(&tp, &[3, 4], &mut arrmeta).unwrap();
        assert_eq!(size, 48);
        let outer = dim_arrmeta(&arrmeta);
        let inner = dim_arrmeta(&arrmeta[DIM_ARRMETA_SIZE..]);
        assert_eq!(outer.dim_size, 3);
        assert_eq!(outer.stride, 16);
        assert_eq!(inner.dim_size, 4);
        assert_eq!(inner.stride, 4);
    }

    #[test]
    fn strided_fill_rank_mismatch() {
        let tp = make_strided_dim(int32());
        let mut arrmeta = vec![0u8; tp.arrmeta_size()];
        assert!(fill_strided(&tp, &[], &mut arrmeta).is_err());
        assert!(fill_strided(&tp, &[2, 2], &mut arrmeta).is_err());
    }

    #[test]
    fn fixed_dim_default_fill() {
        let tp = make_fixed_dim(&[3], int32()).unwrap();
        let mut arrmeta = vec![0u8; tp.arrmeta_size()];
        fill_default(&tp, &mut arrmeta).unwrap();
        let rec = dim_arrmeta(&arrmeta);
        assert_eq!(rec.dim_size, 3);
        assert_eq!(rec.stride, 4);
    }

    #[test]
    fn copy_construct_preserves_bytes() {
        let tp = make_strided_dim(int32());
        let mut arrmeta = vec![0u8; tp.arrmeta_size()];
        fill_strided(&tp, &[5], &mut arrmeta).unwrap();
        let copy = copy_construct(&tp, &arrmeta);
        assert_eq!(copy, arrmeta);
    }
}
