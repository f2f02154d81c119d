use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use tracing::warn;

use crate::error::ConifersError;
use crate::models::{Plant, PlantErrors, Plot, Sample, SpeciesTable, UNKNOWN_SPECIES_IDX};

/// CSV row structure for plant data, carrying its plot's site columns.
///
/// Missing measurements are empty cells and read as zero ("not measured").
#[derive(Debug, Default, serde::Deserialize, serde::Serialize)]
struct PlantRow {
    plot: u32,
    plant: u32,
    species: String,
    n_stems: Option<u32>,
    d6: Option<f64>,
    d12: Option<f64>,
    dbh: Option<f64>,
    tht: Option<f64>,
    cr: Option<f64>,
    crown_width: Option<f64>,
    max_crown_width: Option<f64>,
    pct_cover: Option<f64>,
    expf: Option<f64>,
    site_index: Option<f64>,
    site_index_hw: Option<f64>,
    water_capacity: Option<f64>,
    mean_annual_precip: Option<f64>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    elevation: Option<f64>,
    slope: Option<f64>,
    aspect: Option<f64>,
}

impl PlantRow {
    fn to_plot(&self) -> Plot {
        Plot {
            site_index: self.site_index.unwrap_or(0.0),
            site_index_hw: self.site_index_hw.unwrap_or(0.0),
            water_capacity: self.water_capacity.unwrap_or(0.0),
            mean_annual_precip: self.mean_annual_precip.unwrap_or(0.0),
            latitude: self.latitude.unwrap_or(0.0),
            longitude: self.longitude.unwrap_or(0.0),
            elevation: self.elevation.unwrap_or(0.0),
            slope: self.slope.unwrap_or(0.0),
            aspect: self.aspect.unwrap_or(0.0),
            ..Plot::new(self.plot)
        }
    }

    fn to_plant(&self, sp_idx: u32) -> Plant {
        let mut p = Plant::new(self.plot, self.plant, self.species.clone(), sp_idx);
        p.n_stems = self.n_stems.unwrap_or(1);
        p.d6 = self.d6.unwrap_or(0.0);
        p.d12 = self.d12.unwrap_or(0.0);
        p.dbh = self.dbh.unwrap_or(0.0);
        p.tht = self.tht.unwrap_or(0.0);
        p.cr = self.cr.unwrap_or(0.0);
        p.crown_width = self.crown_width.unwrap_or(0.0);
        p.max_crown_width = self.max_crown_width.unwrap_or(0.0);
        p.pct_cover = self.pct_cover.unwrap_or(0.0);
        p.expf = self.expf.unwrap_or(0.0);
        p.refresh_areas();
        p
    }

    fn from_parts(plot: &Plot, plant: &Plant) -> Self {
        let measured = |v: f64| (v > 0.0).then_some(v);
        Self {
            plot: plant.plot,
            plant: plant.plant,
            species: plant.sp_code.clone(),
            n_stems: Some(plant.n_stems),
            d6: measured(plant.d6),
            d12: measured(plant.d12),
            dbh: measured(plant.dbh),
            tht: measured(plant.tht),
            cr: measured(plant.cr),
            crown_width: measured(plant.crown_width),
            max_crown_width: measured(plant.max_crown_width),
            pct_cover: measured(plant.pct_cover),
            expf: Some(plant.expf),
            site_index: Some(plot.site_index),
            site_index_hw: Some(plot.site_index_hw),
            water_capacity: Some(plot.water_capacity),
            mean_annual_precip: Some(plot.mean_annual_precip),
            latitude: Some(plot.latitude),
            longitude: Some(plot.longitude),
            elevation: Some(plot.elevation),
            slope: Some(plot.slope),
            aspect: Some(plot.aspect),
        }
    }
}

fn parse_csv_records<R: Read>(
    rdr: &mut csv::Reader<R>,
    name: &str,
    species: &mut SpeciesTable,
) -> Result<Sample, ConifersError> {
    let mut plots: BTreeMap<u32, Plot> = BTreeMap::new();
    let mut plants = Vec::new();

    for result in rdr.deserialize() {
        let row: PlantRow = result?;
        let known = species.lookup_by_code(&row.species).map(|sp| sp.idx);
        let mut plant = row.to_plant(known.unwrap_or(UNKNOWN_SPECIES_IDX));
        if known.is_none() {
            warn!(
                plot = row.plot,
                plant = row.plant,
                species = %row.species,
                "unknown species code"
            );
            plant.errors.insert(PlantErrors::INVALID_SPECIES);
        }
        plots.entry(row.plot).or_insert_with(|| row.to_plot());
        plants.push(plant);
    }
    species.sort_by_idx();

    let mut sample = Sample::new(name);
    sample.plots = plots.into_values().collect();
    sample.plants = plants;
    sample.sort_plants();
    Ok(sample)
}

fn reader_builder() -> csv::ReaderBuilder {
    let mut builder = csv::ReaderBuilder::new();
    builder.has_headers(true).flexible(true).trim(csv::Trim::All);
    builder
}

/// Read a plant list from a CSV file, resolving species codes.
///
/// Unknown codes keep species idx 0 and are flagged by imputation. The
/// species table is left sorted by idx.
pub fn read_csv(path: impl AsRef<Path>, species: &mut SpeciesTable) -> Result<Sample, ConifersError> {
    let path = path.as_ref();
    let mut rdr = reader_builder().from_path(path)?;
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "Unknown".to_string());
    parse_csv_records(&mut rdr, &name, species)
}

/// Read a plant list from CSV bytes.
pub fn read_csv_from_bytes(
    data: &[u8],
    name: &str,
    species: &mut SpeciesTable,
) -> Result<Sample, ConifersError> {
    let mut rdr = reader_builder().from_reader(data);
    parse_csv_records(&mut rdr, name, species)
}

/// Write a sample as a plant list with plot site columns.
pub fn write_csv(sample: &Sample, path: impl AsRef<Path>) -> Result<(), ConifersError> {
    let mut wtr = csv::Writer::from_path(path.as_ref())?;
    let plots: BTreeMap<u32, &Plot> = sample.plots.iter().map(|p| (p.plot, p)).collect();

    for plant in &sample.plants {
        let plot = plots.get(&plant.plot).ok_or(ConifersError::MissingPlot {
            plot: plant.plot,
            plant: plant.plant,
        })?;
        wtr.serialize(PlantRow::from_parts(plot, plant))?;
    }

    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ModelTables;

    const CSV: &str = "\
plot,plant,species,n_stems,d6,d12,dbh,tht,cr,crown_width,max_crown_width,pct_cover,expf,site_index,site_index_hw,water_capacity,mean_annual_precip,latitude,longitude,elevation,slope,aspect
2,1,DF,1,,,8.0,50.0,0.5,,,,,115,,8,60,,,,,
1,1,RA,,,,5.0,35.0,,,,,,120,90,,,,,,,
1,2,CECU,3,,,,3.0,,4.0,,,,999,,,,,,,,
2,2,ZZZ,,,,,12.0,,,,,,,,,,,,,,
";

    #[test]
    fn test_read_csv_groups_by_plot() {
        let mut tables = ModelTables::builtin().unwrap();
        let sample = read_csv_from_bytes(CSV.as_bytes(), "t", &mut tables.species).unwrap();
        assert_eq!(sample.num_plots(), 2);
        assert_eq!(sample.num_plants(), 4);
        assert_eq!(sample.plants[0].plot, 1);
        assert_eq!(sample.plants[0].sp_code, "RA");
        assert_eq!(sample.plants[0].sp_idx, 12);
        assert_eq!(sample.plants[0].n_stems, 1);
        // First row of a plot supplies its site columns.
        assert_eq!(sample.plots[0].site_index, 120.0);
        assert_eq!(sample.plots[0].site_index_hw, 90.0);
        assert_eq!(sample.plots[1].water_capacity, 8.0);
        assert!(tables.species.is_sorted_by_idx());
    }

    #[test]
    fn test_unknown_species_flagged_on_read() {
        let mut tables = ModelTables::builtin().unwrap();
        let sample = read_csv_from_bytes(CSV.as_bytes(), "t", &mut tables.species).unwrap();
        let unknown = sample.plants.iter().find(|p| p.sp_code == "ZZZ").unwrap();
        assert!(unknown.errors.contains(PlantErrors::INVALID_SPECIES));
        assert_eq!(unknown.sp_idx, UNKNOWN_SPECIES_IDX);
        assert!(tables.resolve(unknown.sp_idx).is_err());
        let known = sample.plants.iter().find(|p| p.sp_code == "DF").unwrap();
        assert!(known.errors.is_empty());
    }

    #[test]
    fn test_csv_roundtrip() {
        let mut tables = ModelTables::builtin().unwrap();
        let sample = read_csv_from_bytes(CSV.as_bytes(), "t", &mut tables.species).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plants.csv");
        write_csv(&sample, &path).unwrap();
        let loaded = read_csv(&path, &mut tables.species).unwrap();
        assert_eq!(loaded.name, "plants");
        assert_eq!(loaded.plants, sample.plants);
        assert_eq!(loaded.plots[1].site_index, 115.0);
    }

    #[test]
    fn test_read_csv_bad_number() {
        let mut tables = ModelTables::builtin().unwrap();
        let data = "plot,plant,species,tht\n1,1,DF,tall\n";
        let result = read_csv_from_bytes(data.as_bytes(), "bad", &mut tables.species);
        assert!(matches!(result, Err(ConifersError::Csv(_))));
    }

    #[test]
    fn test_write_csv_missing_plot() {
        let mut sample = Sample::new("orphans");
        sample.plants.push(Plant::new(5, 1, "DF", 1));
        let dir = tempfile::tempdir().unwrap();
        let result = write_csv(&sample, dir.path().join("x.csv"));
        assert!(matches!(result, Err(ConifersError::MissingPlot { plot: 5, plant: 1 })));
    }
}
