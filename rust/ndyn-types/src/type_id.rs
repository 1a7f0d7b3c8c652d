/// The closed enumeration of type descriptor kinds.
///
/// Scalar kinds describe a fixed number of bytes directly. Dimension kinds
/// wrap an element type and describe repetition; wrapper kinds (byteswap,
/// view, convert, adapt, expr) reinterpret the bytes laid out by their
/// operand type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TypeId {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    Complex64,
    Complex128,
    /// Days since 1970-01-01, stored as `i32`.
    Date,
    /// 100ns ticks since 1970-01-01T00:00:00 UTC, stored as `i64`.
    DateTime,
    /// Fixed-size string with a known encoding.
    FixedString,
    /// Variable-length string (pointer + length header in the element).
    String,
    /// Raw bytes, either fixed-size or variable-length.
    Bytes,
    /// Named fields; byte offsets live in arrmeta, not in the type.
    Struct,
    /// Dimension whose size is part of the type; stride lives in arrmeta.
    FixedDim,
    /// Dimension whose size and stride both live in arrmeta.
    StridedDim,
    /// Dimension with per-element variable size.
    VarDim,
    Pointer,
    Byteswap,
    View,
    Convert,
    Adapt,
    /// Custom/expression wrapper, the extension point of the closed set.
    Expr,
}

impl TypeId {
    /// Returns true for scalar kinds whose size and alignment are inherent
    /// to the kind itself (no payload needed).
    pub fn is_builtin_scalar(self) -> bool {
        self.builtin_layout().is_some()
    }

    pub fn is_dimension(self) -> bool {
        matches!(self, TypeId::FixedDim | TypeId::StridedDim | TypeId::VarDim)
    }

    /// (data_size, data_alignment) for builtin scalar kinds.
    pub fn builtin_layout(self) -> Option<(usize, usize)> {
        Some(match self {
            TypeId::Bool | TypeId::Int8 | TypeId::UInt8 => (1, 1),
            TypeId::Int16 | TypeId::UInt16 => (2, 2),
            TypeId::Int32 | TypeId::UInt32 | TypeId::Float32 | TypeId::Date => (4, 4),
            TypeId::Int64 | TypeId::UInt64 | TypeId::Float64 | TypeId::DateTime => (8, 8),
            TypeId::Complex64 => (8, 4),
            TypeId::Complex128 => (16, 8),
            _ => return None,
        })
    }
}

impl std::fmt::Display for TypeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TypeId::Bool => "bool",
            TypeId::Int8 => "int8",
            TypeId::Int16 => "int16",
            TypeId::Int32 => "int32",
            TypeId::Int64 => "int64",
            TypeId::UInt8 => "uint8",
            TypeId::UInt16 => "uint16",
            TypeId::UInt32 => "uint32",
            TypeId::UInt64 => "uint64",
            TypeId::Float32 => "float32",
            TypeId::Float64 => "float64",
            TypeId::Complex64 => "complex64",
            TypeId::Complex128 => "complex128",
            TypeId::Date => "date",
            TypeId::DateTime => "datetime",
            TypeId::FixedString => "fixed_string",
            TypeId::String => "string",
            TypeId::Bytes => "bytes",
            TypeId::Struct => "struct",
            TypeId::FixedDim => "fixed_dim",
            TypeId::StridedDim => "strided_dim",
            TypeId::VarDim => "var_dim",
            TypeId::Pointer => "pointer",
            TypeId::Byteswap => "byteswap",
            TypeId::View => "view",
            TypeId::Convert => "convert",
            TypeId::Adapt => "adapt",
            TypeId::Expr => "expr",
        };
        f.write_str(name)
    }
}

/// String encodings supported by fixed-size strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StringEncoding {
    Ascii,
    Ucs2,
    Utf8,
    Utf16,
    Utf32,
}

impl StringEncoding {
    /// Width in bytes of one code unit.
    pub fn unit_size(self) -> usize {
        match self {
            StringEncoding::Ascii | StringEncoding::Utf8 => 1,
            StringEncoding::Ucs2 | StringEncoding::Utf16 => 2,
            StringEncoding::Utf32 => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StringEncoding::Ascii => "ascii",
            StringEncoding::Ucs2 => "ucs2",
            StringEncoding::Utf8 => "utf8",
            StringEncoding::Utf16 => "utf16",
            StringEncoding::Utf32 => "utf32",
        }
    }
}

impl std::fmt::Display for StringEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_layouts() {
        assert_eq!(TypeId::Bool.builtin_layout(), Some((1, 1)));
        assert_eq!(TypeId::Complex64.builtin_layout(), Some((8, 4)));
        assert_eq!(TypeId::Complex128.builtin_layout(), Some((16, 8)));
        assert_eq!(TypeId::Struct.builtin_layout(), None);
        assert_eq!(TypeId::FixedString.builtin_layout(), None);
    }

    #[test]
    fn alignment_divides_size() {
        for id in [
            TypeId::Bool,
            TypeId::Int16,
            TypeId::Int32,
            TypeId::Int64,
            TypeId::Float32,
            TypeId::Float64,
            TypeId::Complex64,
            TypeId::Complex128,
            TypeId::Date,
            TypeId::DateTime,
        ] {
            let (size, align) = id.builtin_layout().unwrap();
            assert_eq!(size % align, 0, "{id}");
        }
    }
}
