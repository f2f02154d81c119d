use thiserror::Error;

/// Operation-level errors returned by the simulator.
///
/// These are the fatal channel. Per-plant imputation and growth failures are
/// recorded on [`crate::models::PlantErrors`] and do not abort a batch.
#[derive(Error, Debug)]
pub enum ConifersError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Invalid coefficients: {0}")]
    InvalidCoefficients(String),

    #[error("Invalid input value: {0}")]
    InvalidInputValue(String),

    #[error("Invalid species: {0}")]
    InvalidSpecies(String),

    #[error("Species table is sorted by {actual}, lookup requires {required}")]
    SpeciesOrder {
        required: &'static str,
        actual: &'static str,
    },

    #[error("Invalid plant count: {0}")]
    InvalidPlantCount(String),

    #[error("Invalid plot count: {0}")]
    InvalidPlotCount(String),

    #[error("Plant {plant} references plot {plot}, which does not exist")]
    MissingPlot { plot: u32, plant: u32 },

    #[error("Plants for plot {0} are not stored contiguously")]
    PlantsNotGrouped(u32),

    #[error("Invalid variant: {0}")]
    InvalidVariant(String),

    #[error("Thinning error: {0}")]
    Thinning(String),

    #[error("Mortality error: {0}")]
    Mortality(String),

    #[error("Fill values error: {count} plant field(s) could not be imputed")]
    FillValues { count: usize },
}
