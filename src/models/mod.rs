mod builtin;
mod coefficients;
mod plant;
mod plot;
mod sample;
mod species;
mod summary;
mod tables;

pub use coefficients::*;
pub use plant::{Plant, PlantErrors, SPARE_SLOTS};
pub use plot::{MonthlyClimate, Plot, PlotAggregates, TypedBins, AIT_BIN_RES, AIT_SIZE, BAL_BIN_RES};
pub use sample::{PlotIndex, Sample};
pub use species::{SortOrder, Species, SpeciesTable, UNKNOWN_SPECIES_IDX};
pub use summary::{SummaryKey, SummaryRecord};
pub use tables::ModelTables;
