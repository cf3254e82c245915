//! Exact decimal column type.
//!
//! The `SQLite` driver binds `rust_decimal::Decimal` through `f64`, which would
//! silently round money. `Money` stores the canonical decimal string in a TEXT
//! column instead and parses it back exactly.

use rust_decimal::Decimal;
use sea_orm::sea_query::{ArrayType, ColumnType, Nullable, ValueType, ValueTypeErr};
use sea_orm::{ColIdx, DbErr, QueryResult, TryGetError, TryGetable, Value};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A monetary amount persisted as exact decimal text.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(pub Decimal);

impl Money {
    /// Zero.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// The wrapped decimal value.
    #[must_use]
    pub const fn value(self) -> Decimal {
        self.0
    }
}

impl From<Decimal> for Money {
    fn from(value: Decimal) -> Self {
        Self(value)
    }
}

impl From<Money> for Decimal {
    fn from(value: Money) -> Self {
        value.0
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<Money> for Value {
    fn from(value: Money) -> Self {
        Self::String(Some(Box::new(value.0.normalize().to_string())))
    }
}

impl Nullable for Money {
    fn null() -> Value {
        Value::String(None)
    }
}

impl ValueType for Money {
    fn try_from(v: Value) -> std::result::Result<Self, ValueTypeErr> {
        match v {
            Value::String(Some(text)) => Decimal::from_str(&text).map(Self).map_err(|_| ValueTypeErr),
            _ => Err(ValueTypeErr),
        }
    }

    fn type_name() -> String {
        "Money".to_owned()
    }

    fn array_type() -> ArrayType {
        ArrayType::String
    }

    fn column_type() -> ColumnType {
        ColumnType::Text
    }
}

impl TryGetable for Money {
    fn try_get_by<I: ColIdx>(res: &QueryResult, index: I) -> std::result::Result<Self, TryGetError> {
        let text: String = String::try_get_by(res, index)?;
        Decimal::from_str(&text)
            .map(Self)
            .map_err(|e| TryGetError::DbErr(DbErr::Type(format!("invalid decimal {text:?}: {e}"))))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_value_round_trip_is_exact() {
        let value: Value = Money(dec!(0.10)).into();
        let back = <Money as ValueType>::try_from(value).unwrap();
        assert_eq!(back.value(), dec!(0.1));
    }

    #[test]
    fn test_non_string_value_is_rejected() {
        assert!(<Money as ValueType>::try_from(Value::Int(Some(3))).is_err());
    }
}
