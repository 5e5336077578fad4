//! Query construction and row parsing for fetch tasks

use crate::error::FetchError;
use crate::store::influx::quote_identifier;
use crate::store::{FieldValue, Row};
use crate::types::{Measurement, Timestamp};

/// Field holding the measured value
pub const VALUE_FIELD: &str = "value";

/// Build the query for every row of `stream` strictly newer than `cursor`
///
/// The cursor is rendered in nanoseconds, the store's native unit.
///
/// ```rust
/// use livesync::sync::query::build_query;
///
/// assert_eq!(
///     build_query("temperature", 42),
///     "SELECT * FROM \"temperature\" WHERE time > 42"
/// );
/// ```
pub fn build_query(stream: &str, cursor: Timestamp) -> String {
    format!(
        "SELECT * FROM {} WHERE time > {}",
        quote_identifier(stream),
        cursor
    )
}

/// Parse one row into a measurement
///
/// The value comes from the `value` field, or from the first field when the
/// row has none by that name.
pub fn parse_row(row: &Row) -> Result<Measurement, FetchError> {
    let field = row
        .field(VALUE_FIELD)
        .or_else(|| row.fields.first().map(|(_, value)| value))
        .ok_or_else(|| {
            FetchError::Parse(format!("row at {} has no fields", row.timestamp))
        })?;

    let value = match field {
        FieldValue::Float(v) => *v,
        FieldValue::Integer(v) => *v as f64,
        FieldValue::String(s) => s.trim().parse::<f64>().map_err(|_| {
            FetchError::Parse(format!(
                "row at {} has non-numeric value {:?}",
                row.timestamp, s
            ))
        })?,
        other => {
            return Err(FetchError::Parse(format!(
                "row at {} has non-numeric value {}",
                row.timestamp, other
            )))
        },
    };

    Ok(Measurement::new(row.timestamp, value))
}

/// Parse a whole batch; the first bad row fails the batch
pub fn parse_rows(rows: &[Row]) -> Result<Vec<Measurement>, FetchError> {
    rows.iter().map(parse_row).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_query_escapes_name() {
        assert_eq!(
            build_query("we\"ird", -5),
            "SELECT * FROM \"we\\\"ird\" WHERE time > -5"
        );
    }

    #[test]
    fn test_parse_row_value_field() {
        let row = Row::new(
            7,
            vec![
                ("sensor".to_string(), FieldValue::String("kitchen".into())),
                ("value".to_string(), FieldValue::Float(21.25)),
            ],
        );
        assert_eq!(parse_row(&row).unwrap(), Measurement::new(7, 21.25));
    }

    #[test]
    fn test_parse_row_falls_back_to_first_field() {
        let row = Row::new(7, vec![("temperature".to_string(), FieldValue::Integer(20))]);
        assert_eq!(parse_row(&row).unwrap(), Measurement::new(7, 20.0));
    }

    #[test]
    fn test_parse_row_numeric_string() {
        let row = Row::with_value(1, FieldValue::String(" 3.5 ".into()));
        assert_eq!(parse_row(&row).unwrap().value, 3.5);
    }

    #[test]
    fn test_parse_row_rejects_non_numeric() {
        for value in [
            FieldValue::String("warm".into()),
            FieldValue::Boolean(true),
            FieldValue::Null,
        ] {
            let row = Row::with_value(1, value);
            assert!(matches!(parse_row(&row), Err(FetchError::Parse(_))));
        }

        let row = Row::new(1, vec![]);
        assert!(matches!(parse_row(&row), Err(FetchError::Parse(_))));
    }

    #[test]
    fn test_parse_rows_all_or_nothing() {
        let rows = vec![
            Row::with_value(1, FieldValue::Float(1.0)),
            Row::with_value(2, FieldValue::String("n/a".into())),
            Row::with_value(3, FieldValue::Float(3.0)),
        ];
        assert!(parse_rows(&rows).is_err());

        let rows = vec![
            Row::with_value(1, FieldValue::Float(1.0)),
            Row::with_value(3, FieldValue::Float(3.0)),
        ];
        assert_eq!(parse_rows(&rows).unwrap().len(), 2);
    }
}
