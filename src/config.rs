use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConifersError;
use crate::variants::Variant;

/// How often crown ratio is allowed to change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrCadence {
    #[default]
    Continuous,
    /// Only on even-numbered projection years.
    Biennial,
}

/// Inventory design parameters used to impute expansion factors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImputeSettings {
    /// Basal area factor of the variable-radius (prism) plot, sq ft/ac per tally.
    pub baf: f64,
    /// Radius of the fixed-area plot, feet.
    pub fixed_plot_radius: f64,
    /// Trees at or below this dbh (inches) are sampled on the fixed plot.
    pub min_dbh: f64,
}

impl Default for ImputeSettings {
    fn default() -> Self {
        Self {
            baf: 20.0,
            fixed_plot_radius: 11.78,
            min_dbh: 0.1,
        }
    }
}

/// Run flags consumed verbatim by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    pub variant: Variant,
    pub use_endemic_mortality: bool,
    pub use_sdi_mortality: bool,
    pub use_cr_growth: bool,
    pub cr_growth_cadence: CrCadence,
    pub use_precip_in_hg: bool,
    pub use_rand_err: bool,
    pub use_genetic_gains: bool,
    /// Years since planting at the start of the run.
    pub plantation_age: f64,
    pub years_since_thin: f64,
    /// RNG seed; entropy-seeded when absent.
    pub seed: Option<u64>,
    pub impute: ImputeSettings,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            variant: Variant::Swo,
            use_endemic_mortality: true,
            use_sdi_mortality: true,
            use_cr_growth: true,
            cr_growth_cadence: CrCadence::Continuous,
            use_precip_in_hg: false,
            use_rand_err: false,
            use_genetic_gains: false,
            plantation_age: 15.0,
            years_since_thin: 0.0,
            seed: None,
            impute: ImputeSettings::default(),
        }
    }
}

impl SimulationConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConifersError> {
        let config: SimulationConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConifersError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConifersError> {
        if self.impute.baf <= 0.0 {
            return Err(ConifersError::InvalidInputValue(format!(
                "baf must be positive, got {}",
                self.impute.baf
            )));
        }
        if self.impute.fixed_plot_radius < 0.0 {
            return Err(ConifersError::InvalidInputValue(format!(
                "fixed_plot_radius must not be negative, got {}",
                self.impute.fixed_plot_radius
            )));
        }
        if self.plantation_age < 0.0 || self.years_since_thin < 0.0 {
            return Err(ConifersError::InvalidInputValue(
                "plantation_age and years_since_thin must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}
