pub mod config;
pub mod engine;
pub mod error;
pub mod io;
pub mod models;
pub mod variants;
pub mod visualization;

pub use config::{CrCadence, ImputeSettings, SimulationConfig};
pub use engine::{Simulator, ThinType, YearSummary};
pub use error::ConifersError;
pub use io::{SampleReader, SampleWriter};
pub use models::{ModelTables, Plant, Plot, Sample, Species};
pub use variants::{GrowthModel, Variant};
