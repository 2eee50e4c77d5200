//! Delimited-text sink.

use std::path::Path;

use fire_atlas_aggregate_models::{StatTable, StatValue};

use crate::{ExportError, check_parent};

/// Writes the table as CSV with a `district_id` column followed by the
/// table's columns. Geometry is never included. Null cells are empty.
///
/// Returns the number of data rows written.
///
/// # Errors
///
/// Returns an error if the parent directory is missing or writing fails.
pub fn export_csv(table: &StatTable, path: &Path) -> Result<u64, ExportError> {
    check_parent(path)?;
    let mut writer = csv::Writer::from_path(path)?;

    let mut header = vec!["district_id"];
    header.extend(table.columns().iter().map(String::as_str));
    writer.write_record(&header)?;

    let mut rows = 0_u64;
    for row in table.rows() {
        let mut record = vec![row.district_id.to_string()];
        record.extend(
            table
                .columns()
                .iter()
                .map(|c| row.get(c).map_or_else(String::new, StatValue::to_string)),
        );
        writer.write_record(&record)?;
        rows += 1;
    }
    writer.flush()?;

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{scratch_dir, table};

    #[test]
    fn writes_header_and_one_line_per_district() {
        let dir = scratch_dir("csv");
        let path = dir.join("districts.csv");

        let rows = export_csv(&table(), &path).unwrap();

        assert_eq!(rows, 2);
        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers: Vec<String> = reader.headers().unwrap().iter().map(str::to_string).collect();
        assert_eq!(
            headers,
            vec!["district_id", "district_name", "area_km2", "fire_count_modis", "first_fire_modis"]
        );
        let records: Vec<csv::StringRecord> = reader.records().map(Result::unwrap).collect();
        assert_eq!(records.len(), 2);
        assert_eq!(&records[0][0], "1");
        assert_eq!(&records[0][1], "District 1");
        assert_eq!(&records[0][3], "3");
        assert_eq!(&records[1][4], "");
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn missing_parent_directory_is_an_error() {
        let path = std::env::temp_dir()
            .join("fire_atlas_export_missing_parent")
            .join("districts.csv");

        let err = export_csv(&table(), &path).unwrap_err();

        assert!(matches!(err, ExportError::InvalidDirectory { .. }));
    }
}
