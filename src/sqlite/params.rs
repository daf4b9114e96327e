use std::fmt::Write;

use rusqlite::types::Value;

use crate::error::BridgeError;
use crate::types::RowValues;

// Thread-local buffer for timestamp formatting
thread_local! {
    static TIMESTAMP_BUF: std::cell::RefCell<String> = std::cell::RefCell::new(String::with_capacity(32));
}

/// Convert a single host value into an engine value.
///
/// # Errors
/// Returns `BridgeError::Parameter` for values the engine cannot store faithfully.
pub fn row_value_to_sqlite_value(value: &RowValues) -> Result<Value, BridgeError> {
    let converted = match value {
        RowValues::Int(i) => Value::Integer(*i),
        RowValues::Float(f) if f.is_finite() => Value::Real(*f),
        // The engine silently stores NaN as NULL.
        RowValues::Float(f) => {
            return Err(BridgeError::Parameter(format!(
                "non-finite float {f} cannot be bound"
            )));
        }
        RowValues::Text(s) => Value::Text(s.clone()),
        RowValues::Bool(b) => Value::Integer(i64::from(*b)),
        RowValues::Timestamp(dt) => TIMESTAMP_BUF.with(|buf| {
            let mut borrow = buf.borrow_mut();
            borrow.clear();
            write!(borrow, "{}", dt.format("%F %T%.f"))
                .map(|()| Value::Text(borrow.clone()))
                .map_err(|_| BridgeError::Parameter(format!("cannot format timestamp {dt:?}")))
        })?,
        RowValues::Null => Value::Null,
        RowValues::JSON(jval) => Value::Text(jval.to_string()),
        RowValues::Blob(bytes) => Value::Blob(bytes.clone()),
    };
    Ok(converted)
}

/// Engine-side parameter list for one statement.
pub struct Params(pub Vec<Value>);

impl Params {
    /// # Errors
    /// Returns `BridgeError::Parameter` if any value cannot be converted.
    pub fn convert(params: &[RowValues]) -> Result<Self, BridgeError> {
        params
            .iter()
            .map(row_value_to_sqlite_value)
            .collect::<Result<Vec<_>, _>>()
            .map(Params)
    }

    /// Fail before execution when the statement expects a different parameter count.
    pub(crate) fn check_count(&self, expected: usize) -> Result<(), BridgeError> {
        if self.0.len() == expected {
            Ok(())
        } else {
            Err(BridgeError::Parameter(format!(
                "statement expects {expected} parameters, {} supplied",
                self.0.len()
            )))
        }
    }

    #[must_use]
    pub fn as_refs(&self) -> Vec<&dyn rusqlite::ToSql> {
        self.0.iter().map(|v| v as &dyn rusqlite::ToSql).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn nan_is_rejected() {
        let err = Params::convert(&[RowValues::Int(1), RowValues::Float(f64::NAN)])
            .err()
            .expect("nan must fail");
        assert!(matches!(err, BridgeError::Parameter(_)));
    }

    #[test]
    fn timestamps_and_json_become_text() {
        let dt = NaiveDate::from_ymd_opt(2024, 1, 2)
            .and_then(|d| d.and_hms_milli_opt(3, 4, 5, 600))
            .expect("valid date");
        let params = Params::convert(&[
            RowValues::Timestamp(dt),
            RowValues::JSON(serde_json::json!({"a": 1})),
            RowValues::Bool(true),
        ])
        .expect("convert");
        assert_eq!(params.0[0], Value::Text("2024-01-02 03:04:05.600".into()));
        assert_eq!(params.0[1], Value::Text(r#"{"a":1}"#.into()));
        assert_eq!(params.0[2], Value::Integer(1));
    }

    #[test]
    fn count_mismatch_is_a_parameter_error() {
        let params = Params::convert(&[RowValues::Int(1)]).expect("convert");
        assert!(params.check_count(1).is_ok());
        assert!(matches!(params.check_count(2), Err(BridgeError::Parameter(_))));
    }
}
