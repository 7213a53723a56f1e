//! Row to JSON conversion.
//!
//! Column types are first classified into a [`TypeCategory`], then decoded with the Rust types
//! that category admits, trying each in turn until one fits. NULLs and undecodable values come
//! out as `Value::Null`.

use crate::models::DatabaseType;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde_json::{Map, Value as JsonValue};
use sqlx::mysql::{MySqlRow, MySqlTypeInfo, MySqlValueRef};
use sqlx::postgres::{PgRow, PgTypeInfo, PgValueRef};
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, ColumnIndex, Decode, Row, Type, TypeInfo};

/// Logical category for database column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Integer,
    Float,
    Decimal,
    Boolean,
    Text,
    Binary,
    Json,
}

/// Classify a database type name into a logical category.
pub fn categorize_type(type_name: &str, db: DatabaseType) -> TypeCategory {
    let lower = type_name.to_lowercase();

    if lower.contains("decimal") || lower.contains("numeric") {
        // SQLite's NUMERIC affinity is a float
        return if db == DatabaseType::SQLite && lower == "numeric" {
            TypeCategory::Float
        } else {
            TypeCategory::Decimal
        };
    }

    // MySQL reports unsigned columns as e.g. "INT UNSIGNED"
    let base = lower.strip_suffix(" unsigned").unwrap_or(&lower);

    match base {
        "bool" | "boolean" => TypeCategory::Boolean,
        "json" | "jsonb" => TypeCategory::Json,
        "tinyint" | "smallint" | "mediumint" | "int" | "integer" | "bigint" | "int2" | "int4"
        | "int8" | "smallserial" | "serial" | "bigserial" | "serial2" | "serial4" | "serial8"
        | "oid" => TypeCategory::Integer,
        "real" | "float4" | "float8" => TypeCategory::Float,
        "bytea" => TypeCategory::Binary,
        _ if base.starts_with("float") || base.starts_with("double") => TypeCategory::Float,
        _ if base.ends_with("blob") || base.ends_with("binary") => TypeCategory::Binary,
        // varchar, text, char, date, time, uuid, interval, ranges, ...
        _ => TypeCategory::Text,
    }
}

/// DECIMAL/NUMERIC read as its exact textual representation.
#[derive(Debug)]
pub struct RawDecimal(pub String);

impl Type<sqlx::MySql> for RawDecimal {
    fn type_info() -> MySqlTypeInfo {
        <String as Type<sqlx::MySql>>::type_info()
    }

    fn compatible(ty: &MySqlTypeInfo) -> bool {
        let name = ty.name().to_lowercase();
        name.contains("decimal") || name.contains("numeric")
    }
}

impl<'r> Decode<'r, sqlx::MySql> for RawDecimal {
    fn decode(value: MySqlValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as Decode<sqlx::MySql>>::decode(value)?;
        Ok(RawDecimal(s.to_string()))
    }
}

impl Type<sqlx::Postgres> for RawDecimal {
    fn type_info() -> PgTypeInfo {
        <String as Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &PgTypeInfo) -> bool {
        let name = ty.name().to_lowercase();
        name.contains("numeric") || name.contains("decimal")
    }
}

impl<'r> Decode<'r, sqlx::Postgres> for RawDecimal {
    fn decode(value: PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as Decode<sqlx::Postgres>>::decode(value)?;
        Ok(RawDecimal(s.to_string()))
    }
}

/// Binary columns are exposed base64-encoded.
pub fn binary_to_json(bytes: &[u8]) -> JsonValue {
    JsonValue::String(STANDARD.encode(bytes))
}

/// Finite floats become numbers; NaN and infinities keep their textual form.
fn float_to_json(v: f64) -> JsonValue {
    serde_json::Number::from_f64(v)
        .map(JsonValue::Number)
        .unwrap_or_else(|| JsonValue::String(v.to_string()))
}

/// Text columns declared as JSON are parsed; anything else stays a string.
fn text_to_json(v: String, type_name: &str) -> JsonValue {
    if type_name.to_lowercase().contains("json") {
        if let Ok(json) = serde_json::from_str::<JsonValue>(&v) {
            return json;
        }
    }
    JsonValue::String(v)
}

/// Decode column `idx` as `T`; `None` for NULL or an incompatible type.
fn get<'r, R, T>(row: &'r R, idx: usize) -> Option<T>
where
    R: Row,
    usize: ColumnIndex<R>,
    T: Decode<'r, R::Database> + Type<R::Database>,
{
    row.try_get::<Option<T>, _>(idx).ok().flatten()
}

/// First of the listed integer types that decodes, as a JSON number.
macro_rules! first_integer {
    ($row:expr, $idx:expr; $($ty:ty),+) => {
        None$(.or_else(|| get::<_, $ty>($row, $idx).map(JsonValue::from)))+
    };
}

/// Trait for converting database rows to JSON maps.
pub trait RowToJson {
    fn to_json_map(&self) -> Map<String, JsonValue>;
}

macro_rules! impl_row_to_json {
    ($row:ty, $db:expr, $decode:path) => {
        impl RowToJson for $row {
            fn to_json_map(&self) -> Map<String, JsonValue> {
                self.columns()
                    .iter()
                    .enumerate()
                    .map(|(idx, col)| {
                        let type_name = col.type_info().name();
                        let category = categorize_type(type_name, $db);
                        (col.name().to_string(), $decode(self, idx, type_name, category))
                    })
                    .collect()
            }
        }
    };
}

impl_row_to_json!(MySqlRow, DatabaseType::MySQL, decode_mysql);
impl_row_to_json!(PgRow, DatabaseType::PostgreSQL, decode_postgres);
impl_row_to_json!(SqliteRow, DatabaseType::SQLite, decode_sqlite);

fn decode_mysql(row: &MySqlRow, idx: usize, type_name: &str, category: TypeCategory) -> JsonValue {
    let value = match category {
        TypeCategory::Decimal => get::<_, RawDecimal>(row, idx).map(|d| JsonValue::String(d.0)),
        TypeCategory::Integer => first_integer!(row, idx; i64, u64, i32, u32, i16, u16, i8, u8),
        TypeCategory::Boolean => get::<_, bool>(row, idx).map(JsonValue::Bool),
        TypeCategory::Float => get::<_, f64>(row, idx)
            .or_else(|| get::<_, f32>(row, idx).map(f64::from))
            .map(float_to_json),
        TypeCategory::Binary => get::<_, Vec<u8>>(row, idx).map(|b| binary_to_json(&b)),
        TypeCategory::Json => get::<_, JsonValue>(row, idx),
        TypeCategory::Text => get::<_, String>(row, idx).map(|s| text_to_json(s, type_name)),
    };
    value.unwrap_or(JsonValue::Null)
}

fn decode_postgres(row: &PgRow, idx: usize, type_name: &str, category: TypeCategory) -> JsonValue {
    let value = match category {
        TypeCategory::Decimal => get::<_, RawDecimal>(row, idx).map(|d| JsonValue::String(d.0)),
        TypeCategory::Integer => first_integer!(row, idx; i64, i32, i16),
        TypeCategory::Boolean => get::<_, bool>(row, idx).map(JsonValue::Bool),
        TypeCategory::Float => get::<_, f64>(row, idx)
            .or_else(|| get::<_, f32>(row, idx).map(f64::from))
            .map(float_to_json),
        TypeCategory::Binary => get::<_, Vec<u8>>(row, idx).map(|b| binary_to_json(&b)),
        TypeCategory::Json => get::<_, JsonValue>(row, idx),
        TypeCategory::Text => get::<_, String>(row, idx).map(|s| text_to_json(s, type_name)),
    };
    value.unwrap_or(JsonValue::Null)
}

fn decode_sqlite(row: &SqliteRow, idx: usize, type_name: &str, category: TypeCategory) -> JsonValue {
    let value = match category {
        TypeCategory::Integer => first_integer!(row, idx; i64, i32),
        TypeCategory::Boolean => get::<_, bool>(row, idx).map(JsonValue::Bool),
        TypeCategory::Float | TypeCategory::Decimal => get::<_, f64>(row, idx).map(float_to_json),
        TypeCategory::Binary => get::<_, Vec<u8>>(row, idx).map(|b| binary_to_json(&b)),
        TypeCategory::Json | TypeCategory::Text => {
            get::<_, String>(row, idx).map(|s| text_to_json(s, type_name))
        }
    };
    value.unwrap_or(JsonValue::Null)
}
