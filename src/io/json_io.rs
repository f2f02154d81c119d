use std::path::Path;

use serde::Serialize;

use crate::error::ConifersError;
use crate::models::{ModelTables, Sample};

fn to_json<T: Serialize>(value: &T, pretty: bool) -> Result<String, ConifersError> {
    Ok(if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    })
}

/// Read a full sample (plots and plants) from a JSON file.
///
/// Plants are regrouped by plot on load.
pub fn read_json(path: impl AsRef<Path>) -> Result<Sample, ConifersError> {
    let content = std::fs::read_to_string(path.as_ref())?;
    let mut sample: Sample = serde_json::from_str(&content)?;
    sample.sort_plants();
    Ok(sample)
}

/// Read a full sample from JSON bytes.
pub fn read_json_from_bytes(data: &[u8], name: &str) -> Result<Sample, ConifersError> {
    let content = std::str::from_utf8(data)
        .map_err(|e| ConifersError::ParseError(format!("Invalid UTF-8: {e}")))?;
    let mut sample: Sample = serde_json::from_str(content)?;
    sample.sort_plants();
    sample.name = name.to_string();
    Ok(sample)
}

/// Write a full sample to a JSON file.
pub fn write_json(sample: &Sample, path: impl AsRef<Path>, pretty: bool) -> Result<(), ConifersError> {
    std::fs::write(path.as_ref(), to_json(sample, pretty)?)?;
    Ok(())
}

/// Read species and coefficient tables from a JSON file and validate them.
pub fn read_tables_json(path: impl AsRef<Path>) -> Result<ModelTables, ConifersError> {
    let content = std::fs::read_to_string(path.as_ref())?;
    let mut tables: ModelTables = serde_json::from_str(&content)?;
    tables.validate()?;
    Ok(tables)
}

/// Write species and coefficient tables to a JSON file.
pub fn write_tables_json(
    tables: &ModelTables,
    path: impl AsRef<Path>,
    pretty: bool,
) -> Result<(), ConifersError> {
    std::fs::write(path.as_ref(), to_json(tables, pretty)?)?;
    Ok(())
}
