use serde::{Deserialize, Serialize};

use super::builtin;
use super::{CoefficientTable, FunctionalSpecies, Species, SpeciesTable};
use crate::error::ConifersError;

/// Species and coefficient tables used for a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelTables {
    pub species: SpeciesTable,
    pub coefficients: CoefficientTable,
}

impl ModelTables {
    pub fn new(
        species: SpeciesTable,
        coefficients: CoefficientTable,
    ) -> Result<Self, ConifersError> {
        let mut tables = Self {
            species,
            coefficients,
        };
        tables.validate()?;
        Ok(tables)
    }

    /// The built-in tables.
    pub fn builtin() -> Result<Self, ConifersError> {
        Self::new(
            SpeciesTable::new(builtin::species_list())?,
            CoefficientTable::new(builtin::functional_species())?,
        )
    }

    /// Check the species table, leave it sorted by idx, and check every
    /// `fsp_idx` names a functional species.
    pub fn validate(&mut self) -> Result<(), ConifersError> {
        if self.coefficients.is_empty() {
            return Err(ConifersError::InvalidCoefficients(
                "coefficient table is empty".to_string(),
            ));
        }
        self.species.validate()?;
        for sp in self.species.as_slice() {
            self.coefficients.get(sp.fsp_idx).map_err(|_| {
                ConifersError::InvalidCoefficients(format!(
                    "species {} references missing functional species {}",
                    sp.code, sp.fsp_idx
                ))
            })?;
        }
        Ok(())
    }

    /// Species and its functional species for a species idx.
    ///
    /// Requires the species table to be sorted by idx.
    pub fn resolve(&self, sp_idx: u32) -> Result<(&Species, &FunctionalSpecies), ConifersError> {
        let sp = self.species.get(sp_idx)?;
        let fsp = self.coefficients.get(sp.fsp_idx)?;
        Ok((sp, fsp))
    }
}
