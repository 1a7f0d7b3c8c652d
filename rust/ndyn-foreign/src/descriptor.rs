//! The foreign descriptor model.
//!
//! This mirrors what a fixed-schema array library exposes about one element
//! type: a numeric kind code, an element size and alignment, a byte-order
//! flag, and optionally a field table (records), a subarray (shape plus base
//! descriptor), or a datetime unit. The bridge needs nothing else from a
//! foreign library.

use ndyn_common::{Result, error::Error};

/// Numeric kind codes of the foreign descriptor model. The discriminants are
/// part of the interchange contract and must stay stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ForeignKind {
    Bool = 0,
    Int8 = 1,
    UInt8 = 2,
    Int16 = 3,
    UInt16 = 4,
    Int32 = 5,
    UInt32 = 6,
    Int64 = 7,
    UInt64 = 8,
    Float32 = 11,
    Float64 = 12,
    Complex64 = 14,
    Complex128 = 15,
    /// Fixed-size byte string (one byte per character, ASCII).
    String = 18,
    /// Fixed-size UTF-32 string (four bytes per code unit).
    Unicode = 19,
    /// Structured record with named, offset fields.
    Record = 20,
    Datetime = 21,
}

impl ForeignKind {
    pub fn code(self) -> u32 {
        self as u32
    }

    pub fn from_code(code: u32) -> Result<ForeignKind> {
        Ok(match code {
            0 => ForeignKind::Bool,
            1 => ForeignKind::Int8,
            2 => ForeignKind::UInt8,
            3 => ForeignKind::Int16,
            4 => ForeignKind::UInt16,
            5 => ForeignKind::Int32,
            6 => ForeignKind::UInt32,
            7 => ForeignKind::Int64,
            8 => ForeignKind::UInt64,
            11 => ForeignKind::Float32,
            12 => ForeignKind::Float64,
            14 => ForeignKind::Complex64,
            15 => ForeignKind::Complex128,
            18 => ForeignKind::String,
            19 => ForeignKind::Unicode,
            20 => ForeignKind::Record,
            21 => ForeignKind::Datetime,
            _ => {
                return Err(Error::type_error(format!(
                    "unsupported foreign descriptor with kind code {code}"
                )));
            }
        })
    }

    /// Element layout of the scalar kinds; `None` for sized/composite kinds.
    pub fn scalar_layout(self) -> Option<(usize, usize)> {
        Some(match self {
            ForeignKind::Bool | ForeignKind::Int8 | ForeignKind::UInt8 => (1, 1),
            ForeignKind::Int16 | ForeignKind::UInt16 => (2, 2),
            ForeignKind::Int32 | ForeignKind::UInt32 | ForeignKind::Float32 => (4, 4),
            ForeignKind::Int64 | ForeignKind::UInt64 | ForeignKind::Float64 => (8, 8),
            ForeignKind::Complex64 => (8, 4),
            ForeignKind::Complex128 => (16, 8),
            ForeignKind::Datetime => (8, 8),
            ForeignKind::String | ForeignKind::Unicode | ForeignKind::Record => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    LittleEndian,
    BigEndian,
}

impl ByteOrder {
    pub fn native() -> ByteOrder {
        if cfg!(target_endian = "big") {
            ByteOrder::BigEndian
        } else {
            ByteOrder::LittleEndian
        }
    }

    pub fn is_native(self) -> bool {
        self == ByteOrder::native()
    }

    pub fn swapped(self) -> ByteOrder {
        match self {
            ByteOrder::LittleEndian => ByteOrder::BigEndian,
            ByteOrder::BigEndian => ByteOrder::LittleEndian,
        }
    }
}

/// Datetime units a foreign descriptor can carry, all counted since the 1970
/// epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForeignTimeUnit {
    Days,
    Hours,
    Minutes,
    Seconds,
    Milliseconds,
    Microseconds,
    Nanoseconds,
}

impl ForeignTimeUnit {
    pub fn label(self) -> &'static str {
        match self {
            ForeignTimeUnit::Days => "days",
            ForeignTimeUnit::Hours => "hours",
            ForeignTimeUnit::Minutes => "minutes",
            ForeignTimeUnit::Seconds => "seconds",
            ForeignTimeUnit::Milliseconds => "milliseconds",
            ForeignTimeUnit::Microseconds => "microseconds",
            ForeignTimeUnit::Nanoseconds => "nanoseconds",
        }
    }
}

/// One field of a record descriptor: name, descriptor, byte offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignField {
    pub name: String,
    pub desc: ForeignDescriptor,
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignSubarray {
    pub shape: Vec<i64>,
    pub base: Box<ForeignDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignDescriptor {
    pub kind: ForeignKind,
    pub elsize: usize,
    pub alignment: usize,
    pub byteorder: ByteOrder,
    pub fields: Vec<ForeignField>,
    pub subarray: Option<ForeignSubarray>,
    pub datetime_unit: Option<ForeignTimeUnit>,
}

impl ForeignDescriptor {
    /// A native-order scalar descriptor for one of the numeric kinds.
    pub fn scalar(kind: ForeignKind) -> ForeignDescriptor {
        let (elsize, alignment) = kind.scalar_layout().unwrap_or((0, 1));
        ForeignDescriptor {
            kind,
            elsize,
            alignment,
            byteorder: ByteOrder::native(),
            fields: Vec::new(),
            subarray: None,
            datetime_unit: None,
        }
    }

    /// A fixed-size string descriptor: `size` bytes (ASCII) or `size`
    /// UTF-32 code units.
    pub fn string(kind: ForeignKind, size: usize) -> ForeignDescriptor {
        debug_assert!(matches!(kind, ForeignKind::String | ForeignKind::Unicode));
        let elsize = if kind == ForeignKind::Unicode {
            size * 4
        } else {
            size
        };
        ForeignDescriptor {
            kind,
            elsize,
            alignment: 1,
            byteorder: ByteOrder::native(),
            fields: Vec::new(),
            subarray: None,
            datetime_unit: None,
        }
    }

    pub fn record(
        fields: Vec<ForeignField>,
        elsize: usize,
        alignment: usize,
    ) -> ForeignDescriptor {
        ForeignDescriptor {
            kind: ForeignKind::Record,
            elsize,
            alignment,
            byteorder: ByteOrder::native(),
            fields,
            subarray: None,
            datetime_unit: None,
        }
    }

    pub fn subarray(shape: Vec<i64>, base: ForeignDescriptor) -> ForeignDescriptor {
        let count: i64 = shape.iter().product();
        let elsize = base.elsize * count.max(0) as usize;
        let alignment = base.alignment;
        ForeignDescriptor {
            kind: base.kind,
            elsize,
            alignment,
            byteorder: ByteOrder::native(),
            fields: Vec::new(),
            subarray: Some(ForeignSubarray {
                shape,
                base: Box::new(base),
            }),
            datetime_unit: None,
        }
    }

    pub fn datetime(unit: ForeignTimeUnit) -> ForeignDescriptor {
        let mut d = ForeignDescriptor::scalar(ForeignKind::Datetime);
        d.datetime_unit = Some(unit);
        d
    }

    pub fn with_byteorder(mut self, byteorder: ByteOrder) -> ForeignDescriptor {
        self.byteorder = byteorder;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_codes_roundtrip() {
        for kind in [
            ForeignKind::Bool,
            ForeignKind::Int8,
            ForeignKind::UInt64,
            ForeignKind::Float64,
            ForeignKind::Complex128,
            ForeignKind::String,
            ForeignKind::Record,
            ForeignKind::Datetime,
        ] {
            assert_eq!(ForeignKind::from_code(kind.code()).unwrap(), kind);
        }
    }

    #[test]
    fn unknown_code_names_the_code() {
        let err = ForeignKind::from_code(99).unwrap_err();
        assert!(err.to_string().contains("99"));
    }

    #[test]
    fn subarray_elsize() {
        let d = ForeignDescriptor::subarray(vec![2, 3], ForeignDescriptor::scalar(ForeignKind::Int32));
        assert_eq!(d.elsize, 24);
        assert_eq!(d.alignment, 4);
    }
}
