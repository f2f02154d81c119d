mod csv_io;
mod json_io;

use std::path::Path;

use crate::error::ConifersError;
use crate::models::{Sample, SpeciesTable};

pub use csv_io::{read_csv, read_csv_from_bytes, write_csv};
pub use json_io::{
    read_json, read_json_from_bytes, read_tables_json, write_json, write_tables_json,
};

/// Trait for reading a sample from a file.
///
/// Readers that only carry species codes resolve them against `species`.
pub trait SampleReader {
    fn read(&self, path: &Path, species: &mut SpeciesTable) -> Result<Sample, ConifersError>;
}

/// Trait for writing a sample to a file.
pub trait SampleWriter {
    fn write(&self, sample: &Sample, path: &Path) -> Result<(), ConifersError>;
}

/// CSV plant-list reader/writer.
pub struct CsvFormat;

impl SampleReader for CsvFormat {
    fn read(&self, path: &Path, species: &mut SpeciesTable) -> Result<Sample, ConifersError> {
        read_csv(path, species)
    }
}

impl SampleWriter for CsvFormat {
    fn write(&self, sample: &Sample, path: &Path) -> Result<(), ConifersError> {
        write_csv(sample, path)
    }
}

/// JSON format reader/writer.
#[derive(Default)]
pub struct JsonFormat {
    pub pretty: bool,
}

impl SampleReader for JsonFormat {
    fn read(&self, path: &Path, _species: &mut SpeciesTable) -> Result<Sample, ConifersError> {
        read_json(path)
    }
}

impl SampleWriter for JsonFormat {
    fn write(&self, sample: &Sample, path: &Path) -> Result<(), ConifersError> {
        write_json(sample, path, self.pretty)
    }
}

/// Pick a format from a file extension (`csv` or `json`).
pub fn format_for(path: &Path) -> Result<(Box<dyn SampleReader>, Box<dyn SampleWriter>), ConifersError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "csv" => Ok((Box::new(CsvFormat), Box::new(CsvFormat))),
        "json" => Ok((
            Box::new(JsonFormat::default()),
            Box::new(JsonFormat { pretty: true }),
        )),
        _ => Err(ConifersError::ParseError(format!(
            "Unsupported file format: '{ext}'. Use .csv or .json"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ModelTables, Plant, Plot};

    fn sample() -> Sample {
        let mut s = Sample::new("IO Trait Test");
        let mut plot = Plot::new(1);
        plot.site_index = 110.0;
        s.plots.push(plot);
        let mut a = Plant::new(1, 1, "DF", 1);
        a.dbh = 14.0;
        a.tht = 90.0;
        let mut b = Plant::new(1, 2, "RA", 12);
        b.dbh = 12.0;
        b.tht = 80.0;
        s.plants = vec![a, b];
        s
    }

    #[test]
    fn test_csv_trait_roundtrip() {
        let mut tables = ModelTables::builtin().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.csv");

        let writer: &dyn SampleWriter = &CsvFormat;
        writer.write(&sample(), &path).unwrap();

        let reader: &dyn SampleReader = &CsvFormat;
        let loaded = reader.read(&path, &mut tables.species).unwrap();

        assert_eq!(loaded.num_plots(), 1);
        assert_eq!(loaded.num_plants(), 2);
        assert_eq!(loaded.plants[1].sp_idx, 12);
        assert_eq!(loaded.plots[0].site_index, 110.0);
    }

    #[test]
    fn test_json_trait_roundtrip() {
        let mut tables = ModelTables::builtin().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.json");

        let writer: &dyn SampleWriter = &JsonFormat { pretty: true };
        writer.write(&sample(), &path).unwrap();

        let reader: &dyn SampleReader = &JsonFormat::default();
        let loaded = reader.read(&path, &mut tables.species).unwrap();

        assert_eq!(loaded.num_plants(), 2);
        assert_eq!(loaded.plants[0].dbh, 14.0);
    }

    #[test]
    fn test_format_for_extension() {
        assert!(format_for(Path::new("a.CSV")).is_ok());
        assert!(format_for(Path::new("a.json")).is_ok());
        assert!(matches!(
            format_for(Path::new("a.xlsx")),
            Err(ConifersError::ParseError(_))
        ));
    }
}
