//! Datetime unit reconciliation.
//!
//! Internally a datetime is an `int64` count of 100-nanosecond ticks and a
//! date is an `int32` count of days since 1970-01-01. Foreign datetime
//! values arrive scaled by one of the supported units and convert with exact
//! integer scaling; nanoseconds are finer than a tick and divide with floor
//! semantics so that negative values round toward negative infinity.

use ndyn_common::{Result, error::Error};
use ndyn_types::DataType;
use ndyn_types::data_type::{make_adapt, make_date, make_datetime, make_scalar};
use ndyn_types::type_id::TypeId;

use crate::descriptor::ForeignTimeUnit;

pub const NANOSECONDS_PER_TICK: i64 = 100;
pub const TICKS_PER_MICROSECOND: i64 = 10;
pub const TICKS_PER_MILLISECOND: i64 = 10_000;
pub const TICKS_PER_SECOND: i64 = 10_000_000;
pub const TICKS_PER_MINUTE: i64 = 60 * TICKS_PER_SECOND;
pub const TICKS_PER_HOUR: i64 = 60 * TICKS_PER_MINUTE;
pub const TICKS_PER_DAY: i64 = 24 * TICKS_PER_HOUR;

/// The adapt type a foreign datetime descriptor maps to: an `int64` operand
/// presented as a date (days unit) or datetime (finer units).
pub fn adapt_type_for_unit(unit: ForeignTimeUnit) -> DataType {
    let operand = make_scalar(TypeId::Int64).expect("int64 is builtin");
    let value = match unit {
        ForeignTimeUnit::Days => make_date(),
        _ => make_datetime(),
    };
    make_adapt(operand, value, format!("{} since 1970", unit.label()))
}

/// Converts a foreign datetime value in `unit` to internal ticks.
///
/// Days are coarser than the datetime type models here; they map to the
/// date type instead (see [`crate::bridge::array_from_foreign_scalar`]).
pub fn datetime_ticks(value: i64, unit: ForeignTimeUnit) -> Result<i64> {
    Ok(match unit {
        ForeignTimeUnit::Hours => value * TICKS_PER_HOUR,
        ForeignTimeUnit::Minutes => value * TICKS_PER_MINUTE,
        ForeignTimeUnit::Seconds => value * TICKS_PER_SECOND,
        ForeignTimeUnit::Milliseconds => value * TICKS_PER_MILLISECOND,
        ForeignTimeUnit::Microseconds => value * TICKS_PER_MICROSECOND,
        ForeignTimeUnit::Nanoseconds => {
            if value >= 0 {
                value / NANOSECONDS_PER_TICK
            } else {
                (value - NANOSECONDS_PER_TICK + 1) / NANOSECONDS_PER_TICK
            }
        }
        ForeignTimeUnit::Days => {
            return Err(Error::type_error(
                "the days unit maps to the date type, not datetime ticks",
            ));
        }
    })
}
