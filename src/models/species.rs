use serde::{Deserialize, Serialize};

use crate::error::ConifersError;

/// A user-facing species code and its biological constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Species {
    /// Stable numeric id.
    pub idx: u32,
    /// Owning functional species.
    pub fsp_idx: u32,
    /// Species code (e.g., "DF")
    pub code: String,
    pub common_name: String,
    pub genus: String,
    pub species: String,
    pub organon_code: u32,
    pub cactos_code: u32,
    pub fvs_code: String,
    /// Annual background mortality rate (proportion).
    pub endemic_mortality: f64,
    /// Maximum stand density index.
    pub max_sdi: f64,
    /// Proportional height growth loss to browse on plants below breast height.
    pub browse_damage: f64,
    /// Proportional height growth loss to mechanical damage.
    pub mechanical_damage: f64,
    /// Genetic worth for height growth, in percent.
    pub genetic_worth_h: f64,
    /// Genetic worth for diameter growth, in percent.
    pub genetic_worth_d: f64,
    /// Mean annual temperature limits, degrees F.
    pub min_temp: f64,
    pub max_temp: f64,
    /// Mean annual precipitation limits, inches.
    pub min_precip: f64,
    pub max_precip: f64,
}

impl std::fmt::Display for Species {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.common_name, self.code)
    }
}

/// Current ordering of the species array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    ByIdx,
    ByCode,
}

impl SortOrder {
    fn name(self) -> &'static str {
        match self {
            SortOrder::ByIdx => "idx",
            SortOrder::ByCode => "code",
        }
    }
}

/// Species idx given to plants whose code is not in the table. No table
/// may define it.
pub const UNKNOWN_SPECIES_IDX: u32 = 0;

/// The species array.
///
/// Lookups binary-search the array, so it is re-sorted in place before each
/// lookup kind: by idx before `lookup_by_idx`, by code before
/// `lookup_by_code`. The engine sorts by idx once per run and then uses the
/// non-mutating [`SpeciesTable::get`], which refuses to search an array in
/// the wrong order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeciesTable {
    species: Vec<Species>,
    order: SortOrder,
}

impl SpeciesTable {
    /// Build a table from an unordered list. See [`SpeciesTable::validate`].
    pub fn new(species: Vec<Species>) -> Result<Self, ConifersError> {
        let mut table = Self {
            species,
            order: SortOrder::ByCode,
        };
        table.validate()?;
        Ok(table)
    }

    /// Reject duplicate codes, duplicate idx values and the reserved
    /// [`UNKNOWN_SPECIES_IDX`]. Leaves the table sorted by idx.
    pub fn validate(&mut self) -> Result<(), ConifersError> {
        self.sort_by_code();
        if let Some(w) = self.species.windows(2).find(|w| w[0].code == w[1].code) {
            return Err(ConifersError::InvalidSpecies(format!(
                "duplicate species code '{}'",
                w[0].code
            )));
        }
        self.sort_by_idx();
        if let Some(w) = self.species.windows(2).find(|w| w[0].idx == w[1].idx) {
            return Err(ConifersError::InvalidSpecies(format!(
                "duplicate species idx {}",
                w[0].idx
            )));
        }
        if let Some(sp) = self.species.first().filter(|sp| sp.idx == UNKNOWN_SPECIES_IDX) {
            return Err(ConifersError::InvalidSpecies(format!(
                "species '{}' uses reserved idx {UNKNOWN_SPECIES_IDX}",
                sp.code
            )));
        }
        Ok(())
    }

    pub fn order(&self) -> SortOrder {
        self.order
    }

    pub fn as_slice(&self) -> &[Species] {
        &self.species
    }

    pub fn len(&self) -> usize {
        self.species.len()
    }

    pub fn is_empty(&self) -> bool {
        self.species.is_empty()
    }

    pub fn sort_by_idx(&mut self) {
        if self.order != SortOrder::ByIdx || !self.is_sorted_by_idx() {
            self.species.sort_by_key(|s| s.idx);
        }
        self.order = SortOrder::ByIdx;
    }

    pub fn sort_by_code(&mut self) {
        if self.order != SortOrder::ByCode || !self.is_sorted_by_code() {
            self.species.sort_by(|a, b| a.code.cmp(&b.code));
        }
        self.order = SortOrder::ByCode;
    }

    pub fn is_sorted_by_idx(&self) -> bool {
        self.species.windows(2).all(|w| w[0].idx <= w[1].idx)
    }

    pub fn is_sorted_by_code(&self) -> bool {
        self.species.windows(2).all(|w| w[0].code <= w[1].code)
    }

    /// Sort by code and find a species. Leaves the table sorted by code.
    pub fn lookup_by_code(&mut self, code: &str) -> Option<&Species> {
        self.sort_by_code();
        self.species
            .binary_search_by(|s| s.code.as_str().cmp(code))
            .ok()
            .map(|i| &self.species[i])
    }

    /// Sort by idx and find a species. Leaves the table sorted by idx.
    pub fn lookup_by_idx(&mut self, idx: u32) -> Option<&Species> {
        self.sort_by_idx();
        self.get(idx).ok()
    }

    /// Sort by idx and borrow a species for editing. Leaves the table sorted by idx.
    pub fn lookup_by_idx_mut(&mut self, idx: u32) -> Option<&mut Species> {
        self.sort_by_idx();
        let pos = self.species.binary_search_by_key(&idx, |s| s.idx).ok()?;
        self.species.get_mut(pos)
    }

    /// Find a species by idx without re-sorting. The table must already be sorted by idx.
    pub fn get(&self, idx: u32) -> Result<&Species, ConifersError> {
        if self.order != SortOrder::ByIdx {
            return Err(ConifersError::SpeciesOrder {
                required: SortOrder::ByIdx.name(),
                actual: self.order.name(),
            });
        }
        self.species
            .binary_search_by_key(&idx, |s| s.idx)
            .map(|i| &self.species[i])
            .map_err(|_| ConifersError::InvalidSpecies(format!("no species with idx {idx}")))
    }
}
