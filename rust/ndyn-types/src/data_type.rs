//! Structural type descriptors.
//!
//! A [`DataType`] is an immutable description of how the bytes of one array
//! element are to be interpreted. Descriptors are shared through reference
//! counting and compared structurally: two independently built descriptors
//! with the same kind and children are equal.

use std::cmp::Ordering;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use ahash::AHashMap;
use ndyn_common::{Result, error::Error};

use crate::arrmeta::{DIM_ARRMETA_SIZE, STRUCT_OFFSET_SIZE, VAR_DIM_ARRMETA_SIZE};
use crate::type_id::{StringEncoding, TypeId};

/// Largest data alignment a descriptor will ever carry.
pub const MAX_DATA_ALIGNMENT: usize = 16;

/// A shared, immutable type descriptor.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DataType(Arc<TypeNode>);

#[derive(PartialEq, Eq, PartialOrd, Ord, Hash)]
struct TypeNode {
    id: TypeId,
    data_size: usize,
    data_alignment: usize,
    arrmeta_size: usize,
    payload: TypePayload,
}

#[derive(PartialEq, Eq, PartialOrd, Ord, Hash)]
enum TypePayload {
    None,
    FixedString {
        size: usize,
        encoding: StringEncoding,
    },
    Bytes {
        /// `None` for variable-length bytes.
        size: Option<usize>,
        target_alignment: usize,
    },
    Struct(StructInfo),
    FixedDim {
        dim_size: i64,
        element: DataType,
    },
    StridedDim {
        element: DataType,
    },
    VarDim {
        element: DataType,
    },
    Pointer {
        target: DataType,
    },
    Byteswap {
        operand: DataType,
    },
    View {
        value: DataType,
        operand: DataType,
    },
    Convert {
        to: DataType,
        from: DataType,
    },
    Adapt {
        operand: DataType,
        value: DataType,
        op: String,
    },
    Expr {
        value: DataType,
        operand: DataType,
        name: String,
    },
}

struct StructInfo {
    field_names: Vec<String>,
    field_types: Vec<DataType>,
    /// Byte offset of each field's arrmeta region within the struct arrmeta,
    /// right after the field offset table.
    arrmeta_offsets: Vec<usize>,
    name_map: AHashMap<String, usize>,
}

impl PartialEq for StructInfo {
    fn eq(&self, other: &Self) -> bool {
        self.field_names == other.field_names && self.field_types == other.field_types
    }
}

impl Eq for StructInfo {}

impl PartialOrd for StructInfo {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for StructInfo {
    fn cmp(&self, other: &Self) -> Ordering {
        self.field_names
            .cmp(&other.field_names)
            .then_with(|| self.field_types.cmp(&other.field_types))
    }
}

impl Hash for StructInfo {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.field_names.hash(state);
        self.field_types.hash(state);
    }
}

#[inline]
fn align_up(n: usize, alignment: usize) -> usize {
    debug_assert!(alignment.is_power_of_two());
    (n + alignment - 1) & !(alignment - 1)
}

impl DataType {
    fn new(
        id: TypeId,
        data_size: usize,
        data_alignment: usize,
        arrmeta_size: usize,
        payload: TypePayload,
    ) -> DataType {
        debug_assert!(data_alignment.is_power_of_two());
        DataType(Arc::new(TypeNode {
            id,
            data_size,
            data_alignment,
            arrmeta_size,
            payload,
        }))
    }

    pub fn id(&self) -> TypeId {
        self.0.id
    }

    /// Size in bytes of one element, or 0 when the size is arrmeta-dependent
    /// (strided dimensions).
    pub fn data_size(&self) -> usize {
        self.0.data_size
    }

    pub fn data_alignment(&self) -> usize {
        self.0.data_alignment
    }

    /// Size in bytes of this type's arrmeta block, children included.
    pub fn arrmeta_size(&self) -> usize {
        self.0.arrmeta_size
    }

    /// True for scalar kinds with no payload and no arrmeta.
    pub fn is_builtin(&self) -> bool {
        self.0.id.is_builtin_scalar()
    }

    /// Number of leading dimension wrappers.
    pub fn ndim(&self) -> usize {
        match &self.0.payload {
            TypePayload::FixedDim { element, .. }
            | TypePayload::StridedDim { element }
            | TypePayload::VarDim { element } => 1 + element.ndim(),
            _ => 0,
        }
    }

    /// The element type of a dimension kind.
    pub fn element_type(&self) -> Option<&DataType> {
        match &self.0.payload {
            TypePayload::FixedDim { element, .. }
            | TypePayload::StridedDim { element }
            | TypePayload::VarDim { element } => Some(element),
            _ => None,
        }
    }

    /// The scalar type under all leading dimension wrappers.
    pub fn dtype(&self) -> &DataType {
        match self.element_type() {
            Some(element) => element.dtype(),
            None => self,
        }
    }

    /// Dimension size of a fixed dimension.
    pub fn fixed_dim_size(&self) -> Option<i64> {
        match &self.0.payload {
            TypePayload::FixedDim { dim_size, .. } => Some(*dim_size),
            _ => None,
        }
    }

    pub fn field_count(&self) -> usize {
        match &self.0.payload {
            TypePayload::Struct(info) => info.field_types.len(),
            _ => 0,
        }
    }

    pub fn field_name(&self, index: usize) -> Option<&str> {
        match &self.0.payload {
            TypePayload::Struct(info) => info.field_names.get(index).map(String::as_str),
            _ => None,
        }
    }

    pub fn field_type(&self, index: usize) -> Option<&DataType> {
        match &self.0.payload {
            TypePayload::Struct(info) => info.field_types.get(index),
            _ => None,
        }
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        match &self.0.payload {
            TypePayload::Struct(info) => info.name_map.get(name).copied(),
            _ => None,
        }
    }

    /// Offset of field `index`'s arrmeta region within this struct's arrmeta.
    pub fn field_arrmeta_offset(&self, index: usize) -> Option<usize> {
        match &self.0.payload {
            TypePayload::Struct(info) => info.arrmeta_offsets.get(index).copied(),
            _ => None,
        }
    }

    /// The storage type of a wrapper kind: the type describing the actual
    /// byte layout underneath.
    pub fn operand_type(&self) -> Option<&DataType> {
        match &self.0.payload {
            TypePayload::Byteswap { operand }
            | TypePayload::View { operand, .. }
            | TypePayload::Adapt { operand, .. }
            | TypePayload::Expr { operand, .. } => Some(operand),
            TypePayload::Convert { from, .. } => Some(from),
            _ => None,
        }
    }

    /// The semantic value type of a wrapper kind.
    pub fn value_type(&self) -> Option<&DataType> {
        match &self.0.payload {
            TypePayload::Byteswap { operand } => Some(operand),
            TypePayload::View { value, .. }
            | TypePayload::Adapt { value, .. }
            | TypePayload::Expr { value, .. } => Some(value),
            TypePayload::Convert { to, .. } => Some(to),
            _ => None,
        }
    }

    pub fn pointer_target(&self) -> Option<&DataType> {
        match &self.0.payload {
            TypePayload::Pointer { target } => Some(target),
            _ => None,
        }
    }

    pub fn string_encoding(&self) -> Option<StringEncoding> {
        match &self.0.payload {
            TypePayload::FixedString { encoding, .. } => Some(*encoding),
            _ => None,
        }
    }

    pub fn adapt_op(&self) -> Option<&str> {
        match &self.0.payload {
            TypePayload::Adapt { op, .. } => Some(op),
            _ => None,
        }
    }

    /// True when the element bytes carry no internal references and can be
    /// copied with a plain memcpy.
    pub fn is_trivial(&self) -> bool {
        match &self.0.payload {
            TypePayload::None => true,
            TypePayload::FixedString { .. } => true,
            TypePayload::Bytes { size, .. } => size.is_some(),
            TypePayload::Struct(info) => info.field_types.iter().all(DataType::is_trivial),
            TypePayload::FixedDim { element, .. } | TypePayload::StridedDim { element } => {
                element.is_trivial()
            }
            TypePayload::Byteswap { operand } => operand.is_trivial(),
            TypePayload::View { operand, .. } => operand.is_trivial(),
            TypePayload::Adapt { operand, .. } => operand.is_trivial(),
            _ => false,
        }
    }

    /// Strips byteswap/view/convert/adapt wrappers down to the native-layout
    /// type, recursing through dimensions and struct fields.
    pub fn canonical(&self) -> DataType {
        match &self.0.payload {
            TypePayload::Byteswap { operand } => operand.canonical(),
            TypePayload::View { value, .. }
            | TypePayload::Adapt { value, .. }
            | TypePayload::Expr { value, .. } => value.canonical(),
            TypePayload::Convert { to, .. } => to.canonical(),
            TypePayload::FixedDim { dim_size, element } => {
                make_fixed_dim(&[*dim_size], element.canonical())
                    .expect("canonical fixed dim size already validated")
            }
            TypePayload::StridedDim { element } => make_strided_dim(element.canonical()),
            TypePayload::VarDim { element } => make_var_dim(element.canonical()),
            TypePayload::Struct(info) => make_struct(
                info.field_names.clone(),
                info.field_types.iter().map(DataType::canonical).collect(),
            )
            .expect("canonical struct fields already validated"),
            _ => self.clone(),
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.0.payload {
            TypePayload::None => write!(f, "{}", self.0.id),
            TypePayload::FixedString { size, encoding } => {
                write!(f, "fixed_string[{size},'{encoding}']")
            }
            TypePayload::Bytes {
                size: Some(size),
                target_alignment,
            } => write!(f, "fixed_bytes[{size},align={target_alignment}]"),
            TypePayload::Bytes { size: None, .. } => write!(f, "bytes"),
            TypePayload::Struct(info) => {
                write!(f, "{{")?;
                for (i, (name, ft)) in info
                    .field_names
                    .iter()
                    .zip(info.field_types.iter())
                    .enumerate()
                {
                    if i != 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{name}: {ft}")?;
                }
                write!(f, "}}")
            }
            TypePayload::FixedDim { dim_size, element } => write!(f, "{dim_size} * {element}"),
            TypePayload::StridedDim { element } => write!(f, "strided * {element}"),
            TypePayload::VarDim { element } => write!(f, "var * {element}"),
            TypePayload::Pointer { target } => write!(f, "pointer[{target}]"),
            TypePayload::Byteswap { operand } => write!(f, "byteswap[{operand}]"),
            TypePayload::View { value, operand } => write!(f, "view[{value}, {operand}]"),
            TypePayload::Convert { to, from } => write!(f, "convert[{to}, {from}]"),
            TypePayload::Adapt { operand, value, op } => {
                write!(f, "adapt[{operand}, {value}, '{op}']")
            }
            TypePayload::Expr { value, name, .. } => write!(f, "expr[{value}, '{name}']"),
        }
    }
}

impl std::fmt::Debug for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DataType({self})")
    }
}

/// Creates a builtin scalar descriptor.
pub fn make_scalar(id: TypeId) -> Result<DataType> {
    let (size, align) = id
        .builtin_layout()
        .ok_or_else(|| Error::type_error(format!("{id} is not a builtin scalar kind")))?;
    Ok(DataType::new(id, size, align, 0, TypePayload::None))
}

pub fn make_date() -> DataType {
    make_scalar(TypeId::Date).expect("date is builtin")
}

pub fn make_datetime() -> DataType {
    make_scalar(TypeId::DateTime).expect("datetime is builtin")
}

/// Creates a fixed-size string of `size` code units in the given encoding.
pub fn make_fixed_string(size: usize, encoding: StringEncoding) -> Result<DataType> {
    if size == 0 {
        return Err(Error::type_error("fixed_string size must be nonzero"));
    }
    let unit = encoding.unit_size();
    Ok(DataType::new(
        TypeId::FixedString,
        size * unit,
        unit,
        0,
        TypePayload::FixedString { size, encoding },
    ))
}

/// Creates a variable-length string descriptor (pointer pair element).
pub fn make_string() -> DataType {
    DataType::new(
        TypeId::String,
        16,
        8,
        0,
        TypePayload::Bytes {
            size: None,
            target_alignment: 1,
        },
    )
}

/// Creates a variable-length bytes descriptor whose pointed-at data has the
/// given alignment.
pub fn make_bytes(target_alignment: usize) -> Result<DataType> {
    verify_alignment(target_alignment)?;
    Ok(DataType::new(
        TypeId::Bytes,
        16,
        8,
        0,
        TypePayload::Bytes {
            size: None,
            target_alignment,
        },
    ))
}

/// Creates a fixed-size opaque bytes descriptor.
pub fn make_fixed_bytes(size: usize, alignment: usize) -> Result<DataType> {
    verify_alignment(alignment)?;
    if size % alignment != 0 {
        return Err(Error::type_error(format!(
            "fixed_bytes alignment {alignment} does not divide size {size}"
        )));
    }
    Ok(DataType::new(
        TypeId::Bytes,
        size,
        alignment,
        0,
        TypePayload::Bytes {
            size: Some(size),
            target_alignment: alignment,
        },
    ))
}

fn verify_alignment(alignment: usize) -> Result<()> {
    if !alignment.is_power_of_two() || alignment > MAX_DATA_ALIGNMENT {
        return Err(Error::type_error(format!(
            "alignment must be a power of two no greater than {MAX_DATA_ALIGNMENT}, got {alignment}"
        )));
    }
    Ok(())
}

/// Creates a struct descriptor from parallel field name and type sequences.
///
/// The field byte offsets are not part of the type; they live in arrmeta and
/// default to the aligned C layout when a value is allocated fresh.
pub fn make_struct(field_names: Vec<String>, field_types: Vec<DataType>) -> Result<DataType> {
    if field_names.len() != field_types.len() {
        return Err(Error::invalid_arg(
            "field_names",
            format!(
                "creating a struct type requires that the number of types {} equal the number of names {}",
                field_types.len(),
                field_names.len()
            ),
        ));
    }
    let mut name_map = AHashMap::with_capacity(field_names.len());
    for (i, name) in field_names.iter().enumerate() {
        if name.is_empty() {
            return Err(Error::type_error("struct field names must be nonempty"));
        }
        if name_map.insert(name.clone(), i).is_some() {
            return Err(Error::type_error(format!(
                "duplicate struct field name '{name}'"
            )));
        }
    }

    // Aligned C layout determines the default data size; actual offsets are
    // per-value arrmeta.
    let (_, data_size, alignment) = default_struct_layout(&field_types);

    let table_size = field_names.len() * STRUCT_OFFSET_SIZE;
    let mut arrmeta_offsets = Vec::with_capacity(field_types.len());
    let mut arrmeta_size = table_size;
    for ft in &field_types {
        arrmeta_offsets.push(arrmeta_size);
        arrmeta_size += ft.arrmeta_size();
    }

    Ok(DataType::new(
        TypeId::Struct,
        data_size,
        alignment,
        arrmeta_size,
        TypePayload::Struct(StructInfo {
            field_names,
            field_types,
            arrmeta_offsets,
            name_map,
        }),
    ))
}

/// Aligned C layout of a struct: (field offsets, total size, alignment).
pub fn default_struct_layout(field_types: &[DataType]) -> (Vec<usize>, usize, usize) {
    let mut offsets = Vec::with_capacity(field_types.len());
    let mut offset = 0usize;
    let mut alignment = 1usize;
    for ft in field_types {
        let a = ft.data_alignment();
        alignment = alignment.max(a);
        offset = align_up(offset, a);
        offsets.push(offset);
        offset += ft.data_size();
    }
    (offsets, align_up(offset, alignment), alignment)
}

/// Wraps `element` in fixed dimensions, innermost last in `shape`.
pub fn make_fixed_dim(shape: &[i64], element: DataType) -> Result<DataType> {
    let mut result = element;
    for &dim_size in shape.iter().rev() {
        if dim_size < 0 {
            return Err(Error::type_error(format!(
                "fixed dimension size must be nonnegative, got {dim_size}"
            )));
        }
        let data_size = (dim_size as usize) * result.data_size();
        let alignment = result.data_alignment();
        let arrmeta_size = DIM_ARRMETA_SIZE + result.arrmeta_size();
        result = DataType::new(
            TypeId::FixedDim,
            data_size,
            alignment,
            arrmeta_size,
            TypePayload::FixedDim {
                dim_size,
                element: result,
            },
        );
    }
    Ok(result)
}

/// Wraps `element` in one strided dimension; size and stride live in arrmeta.
pub fn make_strided_dim(element: DataType) -> DataType {
    let alignment = element.data_alignment();
    let arrmeta_size = DIM_ARRMETA_SIZE + element.arrmeta_size();
    DataType::new(
        TypeId::StridedDim,
        0,
        alignment,
        arrmeta_size,
        TypePayload::StridedDim { element },
    )
}

/// Wraps `element` in one variable-length dimension.
pub fn make_var_dim(element: DataType) -> DataType {
    let arrmeta_size = VAR_DIM_ARRMETA_SIZE + element.arrmeta_size();
    DataType::new(
        TypeId::VarDim,
        16,
        8,
        arrmeta_size,
        TypePayload::VarDim { element },
    )
}

pub fn make_pointer(target: DataType) -> DataType {
    let arrmeta_size = target.arrmeta_size();
    DataType::new(
        TypeId::Pointer,
        8,
        8,
        arrmeta_size,
        TypePayload::Pointer { target },
    )
}

/// Wraps a builtin scalar in a byte-order-swapped view of itself.
pub fn make_byteswap(operand: DataType) -> Result<DataType> {
    if !operand.is_builtin() {
        return Err(Error::type_error(format!(
            "byteswap requires a builtin scalar operand, got {operand}"
        )));
    }
    let (size, align, arrmeta) = (
        operand.data_size(),
        operand.data_alignment(),
        operand.arrmeta_size(),
    );
    Ok(DataType::new(
        TypeId::Byteswap,
        size,
        align,
        arrmeta,
        TypePayload::Byteswap { operand },
    ))
}

/// Reinterprets the bytes laid out by `operand` as values of `value` type.
pub fn make_view(value: DataType, operand: DataType) -> Result<DataType> {
    if value.data_size() != operand.data_size() {
        return Err(Error::type_error(format!(
            "cannot view {operand} as {value}: data sizes differ"
        )));
    }
    let (size, align, arrmeta) = (
        operand.data_size(),
        operand.data_alignment(),
        operand.arrmeta_size(),
    );
    Ok(DataType::new(
        TypeId::View,
        size,
        align,
        arrmeta,
        TypePayload::View { value, operand },
    ))
}

/// A value-converting wrapper: stored as `from`, presented as `to`.
pub fn make_convert(to: DataType, from: DataType) -> DataType {
    let (size, align, arrmeta) = (from.data_size(), from.data_alignment(), from.arrmeta_size());
    DataType::new(
        TypeId::Convert,
        size,
        align,
        arrmeta,
        TypePayload::Convert { to, from },
    )
}

/// An adapting wrapper: stored as `operand`, presented as `value` under the
/// named adaptation (e.g. "nanoseconds since 1970").
pub fn make_adapt(operand: DataType, value: DataType, op: impl Into<String>) -> DataType {
    let (size, align, arrmeta) = (
        operand.data_size(),
        operand.data_alignment(),
        operand.arrmeta_size(),
    );
    DataType::new(
        TypeId::Adapt,
        size,
        align,
        arrmeta,
        TypePayload::Adapt {
            operand,
            value,
            op: op.into(),
        },
    )
}

/// The custom/expression wrapper variant.
pub fn make_expr(value: DataType, operand: DataType, name: impl Into<String>) -> DataType {
    let (size, align, arrmeta) = (
        operand.data_size(),
        operand.data_alignment(),
        operand.arrmeta_size(),
    );
    DataType::new(
        TypeId::Expr,
        size,
        align,
        arrmeta,
        TypePayload::Expr {
            value,
            operand,
            name: name.into(),
        },
    )
}

/// Adapts `tp` so that it can live at alignment 1: a view over fixed bytes.
pub fn make_unaligned(tp: DataType) -> DataType {
    if tp.data_alignment() == 1 {
        return tp;
    }
    let bytes = make_fixed_bytes(tp.data_size(), 1).expect("alignment 1 divides any size");
    make_view(tp, bytes).expect("sizes match by construction")
}

/// Shrinks `alignment` (halving) until it divides `data_size`; never raises it.
pub fn reconcile_alignment(data_size: usize, mut alignment: usize) -> usize {
    debug_assert!(alignment.is_power_of_two());
    while alignment > 1 && data_size % alignment != 0 {
        alignment >>= 1;
    }
    alignment
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int32() -> DataType {
        make_scalar(TypeId::Int32).unwrap()
    }

    fn float64() -> DataType {
        make_scalar(TypeId::Float64).unwrap()
    }

    #[test]
    fn structural_equality() {
        let a = make_struct(
            vec!["x".into(), "y".into()],
            vec![int32(), float64()],
        )
        .unwrap();
        let b = make_struct(
            vec!["x".into(), "y".into()],
            vec![int32(), float64()],
        )
        .unwrap();
        assert_eq!(a, b);

        let c = make_struct(
            vec!["x".into(), "z".into()],
            vec![int32(), float64()],
        )
        .unwrap();
        assert_ne!(a, c);

        assert_eq!(int32(), int32());
        assert_ne!(int32(), float64());
        assert_eq!(make_byteswap(int32()).unwrap(), make_byteswap(int32()).unwrap());
    }

    #[test]
    fn struct_field_order_and_lookup() {
        let names: Vec<String> = (0..8).map(|i| format!("f{i}")).collect();
        let types: Vec<DataType> = (0..8).map(|_| int32()).collect();
        let st = make_struct(names.clone(), types).unwrap();
        assert_eq!(st.field_count(), 8);
        for (i, name) in names.iter().enumerate() {
            assert_eq!(st.field_name(i), Some(name.as_str()));
            assert_eq!(st.field_index(name), Some(i));
        }
    }

    #[test]
    fn struct_arity_mismatch_fails() {
        let result = make_struct(vec!["x".into()], vec![int32(), float64()]);
        assert!(result.is_err());
        let result = make_struct(vec!["x".into(), "y".into()], vec![int32()]);
        assert!(result.is_err());
    }

    #[test]
    fn struct_duplicate_field_fails() {
        let result = make_struct(
            vec!["x".into(), "x".into()],
            vec![int32(), int32()],
        );
        assert!(result.is_err());
    }

    #[test]
    fn struct_default_layout() {
        let st = make_struct(
            vec!["a".into(), "b".into(), "c".into()],
            vec![make_scalar(TypeId::Int8).unwrap(), float64(), int32()],
        )
        .unwrap();
        // i8 at 0, f64 aligned to 8, i32 at 16, total rounded to 24.
        let (offsets, size, align) = default_struct_layout(&[
            make_scalar(TypeId::Int8).unwrap(),
            float64(),
            int32(),
        ]);
        assert_eq!(offsets, vec![0, 8, 16]);
        assert_eq!(size, 24);
        assert_eq!(align, 8);
        assert_eq!(st.data_size(), 24);
        assert_eq!(st.data_alignment(), 8);
    }

    #[test]
    fn fixed_dim_sizes() {
        let t = make_fixed_dim(&[3, 4], int32()).unwrap();
        assert_eq!(t.id(), TypeId::FixedDim);
        assert_eq!(t.fixed_dim_size(), Some(3));
        assert_eq!(t.data_size(), 48);
        assert_eq!(t.ndim(), 2);
        assert_eq!(t.dtype(), &int32());

        assert!(make_fixed_dim(&[-2], int32()).is_err());
    }

    #[test]
    fn strided_dim_arrmeta_size() {
        let t = make_strided_dim(make_strided_dim(int32()));
        assert_eq!(t.arrmeta_size(), 2 * DIM_ARRMETA_SIZE);
        assert_eq!(t.data_size(), 0);
        assert_eq!(t.data_alignment(), 4);
    }

    #[test]
    fn unaligned_adapter() {
        let t = make_unaligned(int32());
        assert_eq!(t.id(), TypeId::View);
        assert_eq!(t.data_alignment(), 1);
        assert_eq!(t.data_size(), 4);
        assert_eq!(t.value_type(), Some(&int32()));

        // Already-unaligned types pass through.
        let b = make_scalar(TypeId::Int8).unwrap();
        assert_eq!(make_unaligned(b.clone()), b);
    }

    #[test]
    fn canonical_strips_wrappers() {
        let t = make_byteswap(int32()).unwrap();
        assert_eq!(t.canonical(), int32());

        let t = make_unaligned(float64());
        assert_eq!(t.canonical(), float64());

        let st = make_struct(
            vec!["x".into()],
            vec![make_byteswap(int32()).unwrap()],
        )
        .unwrap();
        let canon = st.canonical();
        assert_eq!(canon.field_type(0), Some(&int32()));
    }

    #[test]
    fn alignment_reconciliation() {
        // Largest power of two <= requested that divides the size.
        assert_eq!(reconcile_alignment(12, 8), 4);
        assert_eq!(reconcile_alignment(16, 8), 8);
        assert_eq!(reconcile_alignment(10, 8), 2);
        assert_eq!(reconcile_alignment(7, 8), 1);
        assert_eq!(reconcile_alignment(0, 8), 8);
    }

    #[test]
    fn byteswap_requires_builtin() {
        let st = make_struct(vec!["x".into()], vec![int32()]).unwrap();
        assert!(make_byteswap(st).is_err());
    }

    #[test]
    fn ordering_is_structural() {
        let a = int32();
        let b = int32();
        assert_eq!(a.cmp(&b), Ordering::Equal);
        assert_ne!(int32().cmp(&float64()), Ordering::Equal);
    }

    #[test]
    fn display_rendering() {
        assert_eq!(int32().to_string(), "int32");
        let st = make_struct(
            vec!["x".into(), "y".into()],
            vec![int32(), float64()],
        )
        .unwrap();
        assert_eq!(st.to_string(), "{x: int32, y: float64}");
        assert_eq!(
            make_fixed_dim(&[3], int32()).unwrap().to_string(),
            "3 * int32"
        );
        assert_eq!(
            make_strided_dim(int32()).to_string(),
            "strided * int32"
        );
    }
}
