use serde::{Deserialize, Serialize};

use super::coefficients::{basal_area_sqft, crown_area_from_width, crown_width_from_area};

/// Bitmask of per-plant imputation and growth failures.
///
/// Bits accumulate and are only cleared when imputation restarts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlantErrors(u32);

impl PlantErrors {
    pub const NONE: PlantErrors = PlantErrors(0);
    pub const INVALID_SPECIES: PlantErrors = PlantErrors(1 << 0);
    pub const INVALID_DBH: PlantErrors = PlantErrors(1 << 1);
    pub const INVALID_HEIGHT: PlantErrors = PlantErrors(1 << 2);
    pub const INVALID_EXPF: PlantErrors = PlantErrors(1 << 3);
    pub const INVALID_CR: PlantErrors = PlantErrors(1 << 4);
    pub const INVALID_PCT_COVER: PlantErrors = PlantErrors(1 << 5);
    pub const INVALID_CW: PlantErrors = PlantErrors(1 << 6);
    pub const INVALID_MCW: PlantErrors = PlantErrors(1 << 7);
    pub const INVALID_HG: PlantErrors = PlantErrors(1 << 8);
    pub const INVALID_D6G: PlantErrors = PlantErrors(1 << 9);
    pub const INVALID_DBHG: PlantErrors = PlantErrors(1 << 10);
    pub const INVALID_CRG: PlantErrors = PlantErrors(1 << 11);
    pub const INVALID_D6: PlantErrors = PlantErrors(1 << 12);
    pub const INVALID_D12: PlantErrors = PlantErrors(1 << 13);

    const NAMES: [(PlantErrors, &'static str); 14] = [
        (Self::INVALID_SPECIES, "species"),
        (Self::INVALID_DBH, "dbh"),
        (Self::INVALID_HEIGHT, "height"),
        (Self::INVALID_EXPF, "expf"),
        (Self::INVALID_CR, "cr"),
        (Self::INVALID_PCT_COVER, "pct_cover"),
        (Self::INVALID_CW, "cw"),
        (Self::INVALID_MCW, "mcw"),
        (Self::INVALID_HG, "hg"),
        (Self::INVALID_D6G, "d6g"),
        (Self::INVALID_DBHG, "dbhg"),
        (Self::INVALID_CRG, "crg"),
        (Self::INVALID_D6, "d6"),
        (Self::INVALID_D12, "d12"),
    ];

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn from_bits(bits: u32) -> Self {
        PlantErrors(bits)
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, other: PlantErrors) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: PlantErrors) {
        self.0 |= other.0;
    }

    pub fn clear(&mut self) {
        self.0 = 0;
    }

    pub fn count(self) -> u32 {
        self.0.count_ones()
    }
}

impl std::ops::BitOr for PlantErrors {
    type Output = PlantErrors;

    fn bitor(self, rhs: PlantErrors) -> PlantErrors {
        PlantErrors(self.0 | rhs.0)
    }
}

impl std::fmt::Display for PlantErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            return write!(f, "none");
        }
        let names: Vec<&str> = Self::NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        write!(f, "{}", names.join("|"))
    }
}

/// Number of debug scratch slots carried by each plant.
pub const SPARE_SLOTS: usize = 6;

/// One sampled individual or cohort of `n_stems` identical stems.
///
/// Diameters are inches, heights and crown widths feet, areas square feet.
/// A zero dimension means "not measured" until imputation fills it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plant {
    /// Plot this plant belongs to
    pub plot: u32,
    /// Plant identifier within the plot
    pub plant: u32,
    pub sp_code: String,
    pub sp_idx: u32,
    pub n_stems: u32,
    pub d6: f64,
    pub d6_area: f64,
    pub d12: f64,
    pub d12_area: f64,
    pub dbh: f64,
    pub basal_area: f64,
    /// Total height in feet
    pub tht: f64,
    /// Crown ratio (0.0 - 1.0)
    pub cr: f64,
    pub crown_width: f64,
    pub crown_area: f64,
    pub max_crown_width: f64,
    pub pct_cover: f64,
    /// Stems per acre this record represents
    pub expf: f64,

    #[serde(default)]
    pub d6_growth: f64,
    #[serde(default)]
    pub d12_growth: f64,
    #[serde(default)]
    pub dbh_growth: f64,
    #[serde(default)]
    pub tht_growth: f64,
    #[serde(default)]
    pub cr_growth: f64,
    #[serde(default)]
    pub cw_growth: f64,
    #[serde(default)]
    pub expf_change: f64,

    #[serde(default)]
    pub errors: PlantErrors,
    #[serde(default, skip_serializing)]
    pub spare: [f64; SPARE_SLOTS],
}

impl Plant {
    pub fn new(plot: u32, plant: u32, sp_code: impl Into<String>, sp_idx: u32) -> Self {
        Self {
            plot,
            plant,
            sp_code: sp_code.into(),
            sp_idx,
            n_stems: 1,
            ..Self::default()
        }
    }

    /// Zero every per-cycle growth delta.
    pub fn reset_growth(&mut self) {
        self.d6_growth = 0.0;
        self.d12_growth = 0.0;
        self.dbh_growth = 0.0;
        self.tht_growth = 0.0;
        self.cr_growth = 0.0;
        self.cw_growth = 0.0;
        self.expf_change = 0.0;
    }

    pub fn has_growth(&self) -> bool {
        self.d6_growth != 0.0
            || self.d12_growth != 0.0
            || self.dbh_growth != 0.0
            || self.tht_growth != 0.0
            || self.cr_growth != 0.0
            || self.cw_growth != 0.0
            || self.expf_change != 0.0
    }

    /// Recompute basal areas from the three diameters.
    pub fn refresh_stem_areas(&mut self) {
        self.d6_area = basal_area_sqft(self.d6);
        self.d12_area = basal_area_sqft(self.d12);
        self.basal_area = basal_area_sqft(self.dbh);
    }

    /// Recompute basal and crown areas from the diameters and crown width.
    pub fn refresh_areas(&mut self) {
        self.refresh_stem_areas();
        self.crown_area = crown_area_from_width(self.crown_width);
    }

    /// Set the crown from an area, keeping width and area consistent.
    pub fn set_crown_area(&mut self, ca: f64) {
        self.crown_area = ca.max(0.0);
        self.crown_width = crown_width_from_area(self.crown_area);
    }

    /// Apply the deltas computed by the last projection. Deltas are retained.
    pub fn apply_growth(&mut self) {
        self.tht = (self.tht + self.tht_growth).max(0.0);
        self.d6 = (self.d6 + self.d6_growth).max(0.0);
        self.d12 = (self.d12 + self.d12_growth).max(0.0);
        self.dbh = (self.dbh + self.dbh_growth).max(0.0);
        self.cr = (self.cr + self.cr_growth).clamp(0.0, 1.0);
        self.crown_width = (self.crown_width + self.cw_growth).max(0.0);
        self.expf = (self.expf + self.expf_change).max(0.0);
        self.refresh_areas();
    }

    /// Percent of an acre covered by this record's crowns.
    pub fn cover_from_crown(&self) -> f64 {
        self.crown_area * self.expf / super::coefficients::SQ_FT_PER_ACRE * 100.0
    }
}
