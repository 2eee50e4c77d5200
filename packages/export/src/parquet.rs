//! Columnar sink: Parquet written through an in-memory `DuckDB`.
//!
//! The table is loaded into a scratch `DuckDB` table with one typed column
//! per statistic and the district geometry as `GeoJSON` text, then copied
//! out with `COPY ... (FORMAT PARQUET)`.

use std::path::Path;

use duckdb::types::{TimeUnit, Value};
use duckdb::{Connection, params_from_iter};
use fire_atlas_aggregate_models::{StatTable, StatValue};
use fire_atlas_spatial::GeometryIndex;

use crate::features::district_geometry;
use crate::{ExportError, check_parent};

/// `DuckDB` column type for a statistic column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Count,
    Real,
    Timestamp,
    Text,
}

impl ColumnKind {
    /// Kind of the first non-null cell; text when the column is all null.
    fn infer(table: &StatTable, column: &str) -> Self {
        table
            .rows()
            .iter()
            .filter_map(|row| row.get(column))
            .find_map(|value| match value {
                StatValue::Count(_) => Some(Self::Count),
                StatValue::Real(_) => Some(Self::Real),
                StatValue::Timestamp(_) => Some(Self::Timestamp),
                StatValue::Text(_) => Some(Self::Text),
                StatValue::Null => None,
            })
            .unwrap_or(Self::Text)
    }

    const fn sql_type(self) -> &'static str {
        match self {
            Self::Count => "UBIGINT",
            Self::Real => "DOUBLE",
            Self::Timestamp => "TIMESTAMP",
            Self::Text => "VARCHAR",
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn convert(self, value: Option<&StatValue>) -> Value {
        match (self, value) {
            (_, None | Some(StatValue::Null)) => Value::Null,
            (Self::Count, Some(StatValue::Count(n))) => Value::UBigInt(*n),
            (Self::Real, Some(StatValue::Count(n))) => Value::Double(*n as f64),
            (Self::Real | Self::Count, Some(StatValue::Real(x))) => Value::Double(*x),
            (Self::Timestamp, Some(StatValue::Timestamp(ts))) => {
                Value::Timestamp(TimeUnit::Microsecond, ts.timestamp_micros())
            }
            (_, Some(other)) => Value::Text(other.to_string()),
        }
    }
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn quote_literal(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

/// Writes the table as Parquet with a `district_id` column, one column per
/// statistic and a `geometry` column holding each district's `GeoJSON`
/// geometry (null for empty polygons).
///
/// Returns the number of rows written.
///
/// # Errors
///
/// Returns an error if the parent directory is missing or `DuckDB` fails.
pub fn export_parquet(
    table: &StatTable,
    index: &GeometryIndex,
    path: &Path,
) -> Result<u64, ExportError> {
    check_parent(path)?;

    let kinds: Vec<ColumnKind> = table
        .columns()
        .iter()
        .map(|c| ColumnKind::infer(table, c))
        .collect();

    let mut definitions = vec!["district_id UINTEGER".to_string()];
    definitions.extend(
        table
            .columns()
            .iter()
            .zip(&kinds)
            .map(|(c, kind)| format!("{} {}", quote_identifier(c), kind.sql_type())),
    );
    definitions.push("geometry VARCHAR".to_string());

    let conn = Connection::open_in_memory()?;
    conn.execute_batch(&format!(
        "CREATE TABLE district_stats ({})",
        definitions.join(", ")
    ))?;

    let placeholders = vec!["?"; definitions.len()].join(", ");
    let mut stmt = conn.prepare(&format!("INSERT INTO district_stats VALUES ({placeholders})"))?;

    let mut rows = 0_u64;
    for row in table.rows() {
        let mut values = Vec::with_capacity(definitions.len());
        values.push(Value::UInt(row.district_id));
        values.extend(
            table
                .columns()
                .iter()
                .zip(&kinds)
                .map(|(c, kind)| kind.convert(row.get(c))),
        );
        let geometry = district_geometry(index, row)
            .map(|g| serde_json::to_string(&g))
            .transpose()?;
        values.push(geometry.map_or(Value::Null, Value::Text));

        stmt.execute(params_from_iter(values))?;
        rows += 1;
    }
    drop(stmt);

    conn.execute_batch(&format!(
        "COPY district_stats TO {} (FORMAT PARQUET)",
        quote_literal(&path.to_string_lossy())
    ))?;

    Ok(rows)
}
