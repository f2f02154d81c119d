use serde::{Deserialize, Serialize};

/// What a summary record aggregates over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SummaryKey {
    Species,
    FunctionalSpecies,
    Plot,
}

impl std::str::FromStr for SummaryKey {
    type Err = crate::error::ConifersError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "species" | "sp" => Ok(SummaryKey::Species),
            "fsp" | "functional" | "functional_species" => Ok(SummaryKey::FunctionalSpecies),
            "plot" => Ok(SummaryKey::Plot),
            _ => Err(crate::error::ConifersError::ParseError(format!(
                "Unknown summary key: '{s}'"
            ))),
        }
    }
}

/// Per-acre aggregate for one species, functional species, or plot.
///
/// Values are means over the plots in the sample. Built fresh for each
/// report or thinning decision.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryRecord {
    pub code: String,
    pub count: usize,
    pub expf: f64,
    pub min_dbh: f64,
    pub mean_dbh: f64,
    pub max_dbh: f64,
    pub min_height: f64,
    pub mean_height: f64,
    pub max_height: f64,
    pub basal_area: f64,
    pub d6_area: f64,
    pub crown_area: f64,
    pub qmd: f64,
    pub sdi: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_key_parse() {
        assert_eq!("species".parse::<SummaryKey>().unwrap(), SummaryKey::Species);
        assert_eq!("FSP".parse::<SummaryKey>().unwrap(), SummaryKey::FunctionalSpecies);
        assert_eq!("plot".parse::<SummaryKey>().unwrap(), SummaryKey::Plot);
        assert!("stand".parse::<SummaryKey>().is_err());
    }
}
