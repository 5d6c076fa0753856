use crate::error::ApiError;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::Value;
use sqlx::MySqlPool;

/// ===============================
/// SQL bindable value enum
/// ===============================
#[derive(Debug, PartialEq)]
pub enum SqlValue {
    String(String),
    I64(i64),
    U64(u64),
    F64(f64),
    Bool(bool),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    Null,
}

/// ===============================
/// SQL update container
/// ===============================
#[derive(Debug)]
pub struct SqlUpdate {
    pub sql: String,
    pub values: Vec<SqlValue>,
}

/// DATE, DATETIME and TIME literals, tried in that order.
fn to_temporal(column: &str, s: &str) -> Result<SqlValue, ApiError> {
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        Ok(SqlValue::Date(d))
    } else if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        Ok(SqlValue::DateTime(dt))
    } else if let Ok(t) = NaiveTime::parse_from_str(s, "%H:%M:%S") {
        Ok(SqlValue::Time(t))
    } else if let Ok(t) = NaiveTime::parse_from_str(s, "%H:%M") {
        Ok(SqlValue::Time(t))
    } else {
        Err(ApiError::bad_request(format!("Invalid date or time for {column}: {s}")))
    }
}

fn to_sql_value(column: &str, value: &Value, temporal: bool) -> Result<SqlValue, ApiError> {
    Ok(match value {
        Value::String(s) if temporal => to_temporal(column, s)?,
        Value::String(s) => SqlValue::String(s.clone()),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                SqlValue::I64(i)
            } else if let Some(f) = n.as_f64() {
                SqlValue::F64(f)
            } else {
                return Err(ApiError::bad_request("Unsupported numeric value"));
            }
        }
        Value::Bool(b) => SqlValue::Bool(*b),
        Value::Null => SqlValue::Null,
        _ => return Err(ApiError::bad_request("Unsupported JSON value type")),
    })
}

/// ===============================
/// Build dynamic UPDATE SQL
/// ===============================
/// Only keys listed in `allowed` may be set; column names never come from
/// the request unchecked. Strings are parsed as dates or times only for the
/// columns listed in `temporal`.
pub fn build_update_sql(
    table: &str,
    payload: &Value,
    allowed: &[&str],
    temporal: &[&str],
    id_column: &str,
    id_value: u64,
) -> Result<SqlUpdate, ApiError> {
    let obj = payload
        .as_object()
        .ok_or_else(|| ApiError::bad_request("Payload must be a JSON object"))?;

    if obj.is_empty() {
        return Err(ApiError::bad_request("No fields provided for update"));
    }

    if let Some(unknown) = obj.keys().find(|k| !allowed.contains(&k.as_str())) {
        return Err(ApiError::bad_request(format!("Field cannot be updated: {unknown}")));
    }

    // Build SET clause
    let set_clause = obj
        .keys()
        .map(|k| format!("{} = ?", k))
        .collect::<Vec<_>>()
        .join(", ");

    let sql = format!("UPDATE {} SET {} WHERE {} = ?", table, set_clause, id_column);

    let mut values = Vec::with_capacity(obj.len() + 1);
    for (column, value) in obj {
        values.push(to_sql_value(column, value, temporal.contains(&column.as_str()))?);
    }

    // WHERE id = ?
    values.push(SqlValue::U64(id_value));

    Ok(SqlUpdate { sql, values })
}

/// ===============================
/// Execute the update
/// ===============================
pub async fn execute_update(pool: &MySqlPool, update: SqlUpdate) -> Result<u64, sqlx::Error> {
    let mut query = sqlx::query(&update.sql);

    for value in update.values {
        query = match value {
            SqlValue::String(v) => query.bind(v),
            SqlValue::I64(v) => query.bind(v),
            SqlValue::U64(v) => query.bind(v),
            SqlValue::F64(v) => query.bind(v),
            SqlValue::Bool(v) => query.bind(v),
            SqlValue::Date(v) => query.bind(v),
            SqlValue::Time(v) => query.bind(v),
            SqlValue::DateTime(v) => query.bind(v),
            SqlValue::Null => query.bind(None::<String>),
        };
    }

    let result = query.execute(pool).await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const COLS: &[&str] = &["first_name", "birth_date", "mobile_num"];
    const DATES: &[&str] = &["birth_date"];

    #[test]
    fn builds_set_clause_and_binds_id_last() {
        let update = build_update_sql(
            "person_table",
            &json!({"first_name": "Ana", "birth_date": "1991-02-03"}),
            COLS,
            DATES,
            "id",
            9,
        )
        .unwrap();

        assert!(update.sql.starts_with("UPDATE person_table SET "));
        assert!(update.sql.ends_with(" WHERE id = ?"));
        assert_eq!(update.values.len(), 3);
        assert!(update.values.contains(&SqlValue::String("Ana".into())));
        assert!(
            update
                .values
                .contains(&SqlValue::Date(NaiveDate::from_ymd_opt(1991, 2, 3).unwrap()))
        );
        assert_eq!(update.values.last(), Some(&SqlValue::U64(9)));
    }

    #[test]
    fn rejects_columns_outside_whitelist() {
        let err = build_update_sql("person_table", &json!({"id": 1}), COLS, DATES, "id", 1);
        assert!(matches!(err, Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn rejects_empty_and_non_object_payloads() {
        assert!(build_update_sql("t", &json!({}), COLS, DATES, "id", 1).is_err());
        assert!(build_update_sql("t", &json!([1, 2]), COLS, DATES, "id", 1).is_err());
        assert!(build_update_sql("t", &json!({"first_name": [1]}), COLS, DATES, "id", 1).is_err());
    }

    #[test]
    fn recognises_times_and_nulls() {
        let update = build_update_sql(
            "attendance_record",
            &json!({"break_in": null, "time_in": "08:30"}),
            &["time_in", "break_in"],
            &["time_in", "break_in"],
            "id",
            1,
        )
        .unwrap();
        assert!(update.values.contains(&SqlValue::Null));
        assert!(
            update
                .values
                .contains(&SqlValue::Time(NaiveTime::from_hms_opt(8, 30, 0).unwrap()))
        );
    }

    #[test]
    fn time_like_text_stays_text() {
        let update = build_update_sql(
            "item_table",
            &json!({"item_code": "08:00", "item_name": "2026-01-01"}),
            &["item_code", "item_name"],
            &[],
            "id",
            1,
        )
        .unwrap();
        assert!(update.values.contains(&SqlValue::String("08:00".into())));
        assert!(update.values.contains(&SqlValue::String("2026-01-01".into())));
    }

    #[test]
    fn garbage_in_a_temporal_column_is_rejected() {
        let err = build_update_sql("person_table", &json!({"birth_date": "soon"}), COLS, DATES, "id", 1);
        assert!(matches!(err, Err(ApiError::BadRequest(_))));
    }
}
