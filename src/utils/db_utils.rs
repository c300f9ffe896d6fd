use crate::error::ApiError;
use serde_json::Value;
use sqlx::MySqlExecutor;

/// ===============================
/// SQL bindable value enum
/// ===============================
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    String(String),
    I64(i64),
    U64(u64),
    Bool(bool),
}

/// ===============================
/// SQL update container
/// ===============================
#[derive(Debug)]
pub struct SqlUpdate {
    pub sql: String,
    pub values: Vec<SqlValue>,
}

impl SqlUpdate {
    /// New string value for `column`, if the update sets it.
    pub fn string_value(&self, column: &str, payload: &Value) -> Option<String> {
        payload
            .get(column)
            .and_then(Value::as_str)
            .filter(|_| self.sql.contains(&format!("{column} = ?")))
            .map(|s| s.trim().to_string())
    }
}

/// ===============================
/// Build dynamic UPDATE SQL
/// ===============================
/// Only keys listed in `allowed` may appear in `payload`; column names are
/// never taken from the request verbatim.
pub fn build_update_sql(
    table: &str,
    payload: &Value,
    allowed: &[&str],
    id_column: &str,
    id_value: u64,
) -> Result<SqlUpdate, ApiError> {
    let obj = payload
        .as_object()
        .ok_or_else(|| ApiError::bad_request("Payload must be a JSON object"))?;

    if obj.is_empty() {
        return Err(ApiError::bad_request("No fields provided for update"));
    }

    let mut columns = Vec::with_capacity(obj.len());
    let mut values = Vec::with_capacity(obj.len() + 1);

    for (key, value) in obj {
        let column = allowed
            .iter()
            .find(|c| **c == key.as_str())
            .ok_or_else(|| ApiError::bad_request(format!("Field '{key}' cannot be updated")))?;

        let bound = match value {
            Value::String(s) => SqlValue::String(s.trim().to_string()),
            Value::Number(n) => match (n.as_i64(), n.as_u64()) {
                (Some(i), _) => SqlValue::I64(i),
                (None, Some(u)) => SqlValue::U64(u),
                _ => return Err(ApiError::bad_request(format!("Field '{key}' must be an integer"))),
            },
            Value::Bool(b) => SqlValue::Bool(*b),
            _ => return Err(ApiError::bad_request(format!("Unsupported value for '{key}'"))),
        };

        columns.push(format!("{} = ?", column));
        values.push(bound);
    }

    let sql = format!(
        "UPDATE {} SET {} WHERE {} = ?",
        table,
        columns.join(", "),
        id_column
    );

    // WHERE id = ?
    values.push(SqlValue::U64(id_value));

    Ok(SqlUpdate { sql, values })
}

/// ===============================
/// Execute the update
/// ===============================
pub async fn execute_update<'e, E>(executor: E, update: SqlUpdate) -> Result<u64, sqlx::Error>
where
    E: MySqlExecutor<'e>,
{
    let mut query = sqlx::query(&update.sql);

    for value in update.values {
        query = match value {
            SqlValue::String(v) => query.bind(v),
            SqlValue::I64(v) => query.bind(v),
            SqlValue::U64(v) => query.bind(v),
            SqlValue::Bool(v) => query.bind(v),
        };
    }

    let result = query.execute(executor).await?;
    Ok(result.rows_affected())
}
