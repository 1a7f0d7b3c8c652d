//! Internal type to foreign descriptor conversion.

use ndyn_common::{Result, error::Error};
use ndyn_types::{DataType, StringEncoding, TypeId};
use ndyn_types::arrmeta;

use crate::descriptor::{ForeignDescriptor, ForeignField, ForeignKind};

/// Converts an internal type to a foreign descriptor.
///
/// Struct types keep their field offsets in arrmeta, so converting one
/// requires the value's arrmeta to be supplied. Alignment views are
/// stripped (the foreign model has no unaligned wrapper), and a byteswap
/// wrapper becomes the swapped byte order on the unswapped descriptor.
pub fn descriptor_from_type(tp: &DataType, tp_arrmeta: Option<&[u8]>) -> Result<ForeignDescriptor> {
    match tp.id() {
        TypeId::Bool => Ok(ForeignDescriptor::scalar(ForeignKind::Bool)),
        TypeId::Int8 => Ok(ForeignDescriptor::scalar(ForeignKind::Int8)),
        TypeId::Int16 => Ok(ForeignDescriptor::scalar(ForeignKind::Int16)),
        TypeId::Int32 => Ok(ForeignDescriptor::scalar(ForeignKind::Int32)),
        TypeId::Int64 => Ok(ForeignDescriptor::scalar(ForeignKind::Int64)),
        TypeId::UInt8 => Ok(ForeignDescriptor::scalar(ForeignKind::UInt8)),
        TypeId::UInt16 => Ok(ForeignDescriptor::scalar(ForeignKind::UInt16)),
        TypeId::UInt32 => Ok(ForeignDescriptor::scalar(ForeignKind::UInt32)),
        TypeId::UInt64 => Ok(ForeignDescriptor::scalar(ForeignKind::UInt64)),
        TypeId::Float32 => Ok(ForeignDescriptor::scalar(ForeignKind::Float32)),
        TypeId::Float64 => Ok(ForeignDescriptor::scalar(ForeignKind::Float64)),
        TypeId::Complex64 => Ok(ForeignDescriptor::scalar(ForeignKind::Complex64)),
        TypeId::Complex128 => Ok(ForeignDescriptor::scalar(ForeignKind::Complex128)),
        TypeId::FixedString => match tp.string_encoding() {
            Some(StringEncoding::Ascii) => {
                Ok(ForeignDescriptor::string(ForeignKind::String, tp.data_size()))
            }
            Some(StringEncoding::Utf32) => Ok(ForeignDescriptor::string(
                ForeignKind::Unicode,
                tp.data_size() / 4,
            )),
            _ => Err(Error::type_error(format!(
                "cannot convert type {tp} into a foreign descriptor"
            ))),
        },
        TypeId::View => {
            // A view over fixed bytes exists purely for alignment; the
            // foreign model has no such wrapper, so drop it.
            if tp.operand_type().map(DataType::id) == Some(TypeId::Bytes) {
                descriptor_from_type(tp.value_type().expect("view value"), tp_arrmeta)
            } else {
                Err(Error::type_error(format!(
                    "cannot convert type {tp} into a foreign descriptor"
                )))
            }
        }
        TypeId::Byteswap => {
            let operand = tp.operand_type().expect("byteswap operand");
            let d = descriptor_from_type(operand, tp_arrmeta)?;
            let order = d.byteorder.swapped();
            Ok(d.with_byteorder(order))
        }
        TypeId::Struct => {
            let Some(meta) = tp_arrmeta else {
                return Err(Error::type_error(format!(
                    "can only convert type {tp} into a foreign descriptor with array arrmeta"
                )));
            };
            let mut fields = Vec::with_capacity(tp.field_count());
            let mut elsize = tp.data_size();
            for i in 0..tp.field_count() {
                let ft = tp.field_type(i).expect("field in range");
                let offset = arrmeta::struct_offset(meta, i) as usize;
                let sub = tp.field_arrmeta_offset(i).expect("struct field");
                let field_meta = if ft.arrmeta_size() > 0 {
                    Some(&meta[sub..sub + ft.arrmeta_size()])
                } else {
                    None
                };
                let desc = descriptor_from_type(ft, field_meta)?;
                elsize = elsize.max(offset + desc.elsize);
                fields.push(ForeignField {
                    name: tp.field_name(i).expect("field in range").to_string(),
                    desc,
                    offset,
                });
            }
            Ok(ForeignDescriptor::record(fields, elsize, tp.data_alignment()))
        }
        TypeId::FixedDim => Err(Error::not_implemented(
            "converting fixed dimension types into foreign subarray descriptors",
        )),
        _ => Err(Error::type_error(format!(
            "cannot convert type {tp} into a foreign descriptor"
        ))),
    }
}

/// The foreign kind letter classifying an internal type.
pub fn kind_char(tp: &DataType) -> Result<char> {
    match tp.id() {
        TypeId::Bool => Ok('b'),
        TypeId::Int8 | TypeId::Int16 | TypeId::Int32 | TypeId::Int64 => Ok('i'),
        TypeId::UInt8 | TypeId::UInt16 | TypeId::UInt32 | TypeId::UInt64 => Ok('u'),
        TypeId::Float32 | TypeId::Float64 => Ok('f'),
        TypeId::Complex64 | TypeId::Complex128 => Ok('c'),
        TypeId::FixedString => match tp.string_encoding() {
            Some(StringEncoding::Ascii) => Ok('S'),
            Some(StringEncoding::Utf32) => Ok('U'),
            _ => Err(Error::type_error(format!(
                "type \"{tp}\" does not have an equivalent foreign kind"
            ))),
        },
        _ => Err(Error::type_error(format!(
            "type \"{tp}\" does not have an equivalent foreign kind"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::from_foreign::{fill_arrmeta_from_descriptor, type_from_descriptor};
    use ndyn_types::data_type::{make_byteswap, make_scalar, make_struct, make_unaligned};

    #[test]
    fn scalar_kinds_roundtrip() {
        for kind in [
            ForeignKind::Bool,
            ForeignKind::Int8,
            ForeignKind::UInt8,
            ForeignKind::Int16,
            ForeignKind::UInt16,
            ForeignKind::Int32,
            ForeignKind::UInt32,
            ForeignKind::Int64,
            ForeignKind::UInt64,
            ForeignKind::Float32,
            ForeignKind::Float64,
            ForeignKind::Complex64,
            ForeignKind::Complex128,
        ] {
            let d = ForeignDescriptor::scalar(kind);
            let dt = type_from_descriptor(&d, 0).unwrap();
            let back = descriptor_from_type(&dt, None).unwrap();
            assert_eq!(back, d, "round trip for {kind:?}");
        }
    }

    #[test]
    fn string_kinds_roundtrip() {
        for (kind, size) in [(ForeignKind::String, 12), (ForeignKind::Unicode, 5)] {
            let d = ForeignDescriptor::string(kind, size);
            let dt = type_from_descriptor(&d, 0).unwrap();
            let back = descriptor_from_type(&dt, None).unwrap();
            assert_eq!(back, d);
        }
    }

    #[test]
    fn byteswap_roundtrips_byte_order() {
        use crate::descriptor::ByteOrder;
        let d = ForeignDescriptor::scalar(ForeignKind::Int32)
            .with_byteorder(ByteOrder::native().swapped());
        let dt = type_from_descriptor(&d, 0).unwrap();
        let back = descriptor_from_type(&dt, None).unwrap();
        assert_eq!(back, d);
    }

    #[test]
    fn alignment_view_is_stripped() {
        let dt = make_unaligned(make_scalar(TypeId::Float64).unwrap());
        let d = descriptor_from_type(&dt, None).unwrap();
        assert_eq!(d.kind, ForeignKind::Float64);
    }

    #[test]
    fn struct_requires_arrmeta() {
        let st = make_struct(
            vec!["x".into()],
            vec![make_scalar(TypeId::Int32).unwrap()],
        )
        .unwrap();
        assert!(descriptor_from_type(&st, None).is_err());
    }

    #[test]
    fn struct_roundtrips_with_arrmeta() {
        use crate::descriptor::ForeignField;
        let d = ForeignDescriptor::record(
            vec![
                ForeignField {
                    name: "x".into(),
                    desc: ForeignDescriptor::scalar(ForeignKind::Int32),
                    offset: 0,
                },
                ForeignField {
                    name: "y".into(),
                    desc: ForeignDescriptor::scalar(ForeignKind::Float64),
                    offset: 8,
                },
            ],
            16,
            8,
        );
        let dt = type_from_descriptor(&d, 0).unwrap();
        let mut meta = vec![0u8; dt.arrmeta_size()];
        fill_arrmeta_from_descriptor(&dt, &d, &mut meta).unwrap();
        let back = descriptor_from_type(&dt, Some(&meta)).unwrap();
        assert_eq!(back.kind, ForeignKind::Record);
        assert_eq!(back.fields.len(), 2);
        assert_eq!(back.fields[0].name, "x");
        assert_eq!(back.fields[0].offset, 0);
        assert_eq!(back.fields[1].name, "y");
        assert_eq!(back.fields[1].offset, 8);
        assert_eq!(back.elsize, 16);
    }

    #[test]
    fn unsupported_compound_conversions_fail() {
        let sub = ForeignDescriptor::subarray(
            vec![3],
            ForeignDescriptor::scalar(ForeignKind::Int32),
        );
        let dt = type_from_descriptor(&sub, 0).unwrap();
        let err = descriptor_from_type(&dt, None).unwrap_err();
        assert!(matches!(
            err.kind(),
            ndyn_common::error::ErrorKind::NotImplemented { .. }
        ));
    }

    #[test]
    fn kind_chars() {
        assert_eq!(kind_char(&make_scalar(TypeId::Bool).unwrap()).unwrap(), 'b');
        assert_eq!(kind_char(&make_scalar(TypeId::Int16).unwrap()).unwrap(), 'i');
        assert_eq!(kind_char(&make_scalar(TypeId::UInt64).unwrap()).unwrap(), 'u');
        assert_eq!(kind_char(&make_scalar(TypeId::Float32).unwrap()).unwrap(), 'f');
        assert_eq!(
            kind_char(&make_scalar(TypeId::Complex128).unwrap()).unwrap(),
            'c'
        );
        use ndyn_types::data_type::make_fixed_string;
        assert_eq!(
            kind_char(&make_fixed_string(4, StringEncoding::Ascii).unwrap()).unwrap(),
            'S'
        );
        assert_eq!(
            kind_char(&make_fixed_string(4, StringEncoding::Utf32).unwrap()).unwrap(),
            'U'
        );
        assert!(kind_char(&make_scalar(TypeId::Date).unwrap()).is_err());
        assert!(kind_char(&make_byteswap(make_scalar(TypeId::Int32).unwrap()).unwrap()).is_err());
    }
}
