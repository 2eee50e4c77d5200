//! Summary sink.

use std::fs::File;
use std::io::{BufWriter, Write as _};
use std::path::Path;

use fire_atlas_aggregate_models::DatasetSummary;

use crate::{ExportError, check_parent};

/// Writes the dataset summary as pretty-printed JSON.
///
/// # Errors
///
/// Returns an error if the parent directory is missing or writing fails.
pub fn write_summary(summary: &DatasetSummary, path: &Path) -> Result<(), ExportError> {
    check_parent(path)?;
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, summary)?;
    writer.flush()?;
    log::info!("Wrote summary to {}", path.display());
    Ok(())
}
