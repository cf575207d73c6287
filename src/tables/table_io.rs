use crate::tables::error::TableError;
use log::{error, info};
use polars::prelude::*;
use std::fs::{self, File};
use std::path::Path;

/// Loads a local CSV file with a header row, inferring column types.
pub fn load_csv(path: &Path) -> Result<DataFrame, TableError> {
    read_csv(path, CsvReadOptions::default())
}

/// Loads a local CSV file with a header row, keeping every column as text.
///
/// Zero-padded codes such as `codi_provincia = "08"` survive as written; typing is
/// left to the standardizer.
pub fn load_csv_as_text(path: &Path) -> Result<DataFrame, TableError> {
    read_csv(path, CsvReadOptions::default().with_infer_schema_length(Some(0)))
}

fn read_csv(path: &Path, options: CsvReadOptions) -> Result<DataFrame, TableError> {
    if !path.exists() {
        error!("CSV file not found: {}", path.display());
        return Err(TableError::FileNotFound(path.to_path_buf()));
    }

    info!("Loading CSV from {}", path.display());
    options
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .map_err(|e| TableError::Csv(path.to_path_buf(), e))?
        .finish()
        .map_err(|e| TableError::Csv(path.to_path_buf(), e))
}

/// Saves a frame as CSV, creating parent directories as needed.
///
/// An existing file is replaced unless `overwrite` is `false`, in which case
/// [`TableError::FileExists`] is returned and the file is left alone.
pub fn save_csv(frame: &DataFrame, path: &Path, overwrite: bool) -> Result<(), TableError> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| TableError::DirCreation(parent.to_path_buf(), e))?;
    }
    if path.exists() && !overwrite {
        return Err(TableError::FileExists(path.to_path_buf()));
    }

    let mut file = File::create(path).map_err(|e| TableError::Io(path.to_path_buf(), e))?;
    let mut frame = frame.clone();
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(&mut frame)
        .map_err(|e| TableError::Csv(path.to_path_buf(), e))?;
    info!("Saved DataFrame to {}", path.display());
    Ok(())
}
