use serde::{Deserialize, Serialize};

use crate::error::ConifersError;

/// Square feet in one acre.
pub const SQ_FT_PER_ACRE: f64 = 43_560.0;

/// Breast height in feet.
pub const BREAST_HEIGHT: f64 = 4.5;

/// Height (feet) a plant must exceed before a 12-inch diameter exists.
pub const JUVENILE_HEIGHT: f64 = 1.0;

/// Largest crown area (sq ft) allowed for a tree, roughly a 60 ft crown.
pub const MAX_TREE_CROWN_AREA: f64 = 2827.0;

/// Largest crown area (sq ft) allowed for a shrub or forb, roughly an 8 ft crown.
pub const MAX_SHRUB_CROWN_AREA: f64 = 50.1;

/// Basal area in square feet of a stem with diameter `d` in inches.
pub fn basal_area_sqft(d: f64) -> f64 {
    std::f64::consts::PI * d * d / 576.0
}

/// Crown area in square feet of a crown of width `cw` in feet.
pub fn crown_area_from_width(cw: f64) -> f64 {
    cw * cw * std::f64::consts::FRAC_PI_4
}

/// Crown width in feet of a crown with area `ca` in square feet.
pub fn crown_width_from_area(ca: f64) -> f64 {
    (ca.max(0.0) * 4.0 / std::f64::consts::PI).sqrt()
}

fn logistic(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Life form of a functional species.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlantType {
    Conifer,
    Hardwood,
    Shrub,
    Forb,
    NonStocked,
}

impl PlantType {
    pub fn is_tree(self) -> bool {
        matches!(self, PlantType::Conifer | PlantType::Hardwood)
    }

    pub fn is_shrub(self) -> bool {
        self == PlantType::Shrub
    }

    pub fn is_forb(self) -> bool {
        self == PlantType::Forb
    }

    pub fn is_non_stocked(self) -> bool {
        self == PlantType::NonStocked
    }

    /// Upper bound on the crown area of a single stem of this life form.
    pub fn max_crown_area(self) -> f64 {
        if self.is_tree() {
            MAX_TREE_CROWN_AREA
        } else {
            MAX_SHRUB_CROWN_AREA
        }
    }
}

impl std::fmt::Display for PlantType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlantType::Conifer => write!(f, "Conifer"),
            PlantType::Hardwood => write!(f, "Hardwood"),
            PlantType::Shrub => write!(f, "Shrub"),
            PlantType::Forb => write!(f, "Forb"),
            PlantType::NonStocked => write!(f, "NonStocked"),
        }
    }
}

impl std::str::FromStr for PlantType {
    type Err = ConifersError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "conifer" | "c" => Ok(PlantType::Conifer),
            "hardwood" | "h" => Ok(PlantType::Hardwood),
            "shrub" | "s" => Ok(PlantType::Shrub),
            "forb" | "f" => Ok(PlantType::Forb),
            "nonstocked" | "non_stocked" | "ns" => Ok(PlantType::NonStocked),
            _ => Err(ConifersError::ParseError(format!(
                "Unknown plant type: '{s}'"
            ))),
        }
    }
}

/// `d = b0 * x^b1`, used for d6 from total height.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PowerCoefficients {
    pub b0: f64,
    pub b1: f64,
}

impl PowerCoefficients {
    pub fn eval(&self, x: f64) -> Option<f64> {
        if x <= 0.0 {
            return None;
        }
        let v = self.b0 * x.powf(self.b1);
        (v.is_finite() && v > 0.0).then_some(v)
    }
}

/// d6 from dbh and total height: `d6 = b0 + b1 * dbh + b2 * tht`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct D6FromDbhCoefficients {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
}

impl D6FromDbhCoefficients {
    pub fn eval(&self, dbh: f64, tht: f64) -> Option<f64> {
        let v = self.b0 + self.b1 * dbh + self.b2 * tht;
        (v.is_finite() && v > 0.0).then_some(v)
    }
}

/// dbh from d6 and total height: `dbh = b0 * d6^b1 * ((tht - 4.5) / tht)^b2`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct DbhFromHeightCoefficients {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
}

impl DbhFromHeightCoefficients {
    pub fn eval(&self, d6: f64, tht: f64) -> Option<f64> {
        if tht <= BREAST_HEIGHT || d6 <= 0.0 {
            return None;
        }
        let v = self.b0 * d6.powf(self.b1) * ((tht - BREAST_HEIGHT) / tht).powf(self.b2);
        (v.is_finite() && v > 0.0).then_some(v)
    }
}

/// Log-linear crown area model:
/// `ca = exp(b0 + b1 * ln(d6_area * 144) + b2 * ln(tht))`, d6_area in sq ft.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CrownWidthCoefficients {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
}

impl CrownWidthCoefficients {
    /// Unclamped crown area in square feet.
    pub fn crown_area(&self, d6_area: f64, tht: f64) -> Option<f64> {
        if d6_area <= 0.0 || tht <= 0.0 {
            return None;
        }
        let v = (self.b0 + self.b1 * (d6_area * 144.0).ln() + self.b2 * tht.ln()).exp();
        (v.is_finite() && v > 0.0).then_some(v)
    }
}

/// Open-grown crown width: `mcw = b0 + b1 * d + b2 * d^2`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct MaxCrownWidthCoefficients {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
}

impl MaxCrownWidthCoefficients {
    pub fn eval(&self, diameter: f64) -> Option<f64> {
        if diameter <= 0.0 {
            return None;
        }
        let v = self.b0 + self.b1 * diameter + self.b2 * diameter * diameter;
        (v.is_finite() && v > 0.0).then_some(v)
    }
}

/// Logistic crown ratio model driven by size and taller-neighbor competition.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CrownRatioCoefficients {
    pub intercept: f64,
    pub height: f64,
    pub d6: f64,
    /// Basal area (sq ft/ac) in taller plants.
    pub taller_basal_area: f64,
    /// Percent cover of taller crowns.
    pub taller_cover: f64,
}

impl CrownRatioCoefficients {
    pub fn eval(&self, tht: f64, d6: f64, bait: f64, cait_pct: f64) -> Option<f64> {
        if tht <= 0.0 {
            return None;
        }
        let x = self.intercept
            + self.height * tht
            + self.d6 * d6
            + self.taller_basal_area * bait
            + self.taller_cover * cait_pct;
        let cr = 1.0 / (1.0 + x.exp());
        (cr.is_finite() && cr > 0.0 && cr <= 1.0).then_some(cr)
    }
}

/// Empirical (SWO/SMC) height growth.
///
/// The potential increment is a log-linear Chapman-Richards derivative in
/// site index and height; it is scaled by a relative-height multiplier and
/// a vegetation-competition multiplier.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct HeightGrowthCoefficients {
    pub intercept: f64,
    pub log_site_index: f64,
    pub log_height: f64,
    pub height: f64,
    pub rh_scale: f64,
    pub rh_rate: f64,
    pub taller_cover: f64,
    pub shrub_cover: f64,
    pub log_precip: f64,
    pub water_capacity: f64,
    /// Standard deviation of the log-scale random error.
    pub sigma: f64,
}

impl HeightGrowthCoefficients {
    pub fn potential(&self, site_index: f64, tht: f64) -> f64 {
        if site_index <= 0.0 || tht <= 0.0 {
            return 0.0;
        }
        (self.intercept
            + self.log_site_index * site_index.ln()
            + self.log_height * tht.ln()
            + self.height * tht)
            .exp()
    }

    /// Multiplier in (0, 1] that shrinks growth for suppressed plants.
    pub fn relative_height_modifier(&self, relative_height: f64) -> f64 {
        let rh = relative_height.clamp(0.0, 1.0);
        (1.0 - self.rh_scale * (-self.rh_rate * rh).exp()).clamp(0.0, 1.0)
    }

    pub fn vegetation_modifier(&self, taller_cover_pct: f64, shrub_cover_pct: f64) -> f64 {
        (self.taller_cover * taller_cover_pct + self.shrub_cover * shrub_cover_pct).exp()
    }
}

/// Ratio diameter growth: d6 growth per foot of height growth.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct DiameterGrowthCoefficients {
    pub intercept: f64,
    pub crown_ratio: f64,
    /// Basal area (sq ft/ac) in larger trees.
    pub larger_basal_area: f64,
    pub shrub_cover: f64,
    /// Large-tree bound: growth may not exceed `bound_scale * d6^bound_exp`.
    pub bound_scale: f64,
    pub bound_exp: f64,
}

impl DiameterGrowthCoefficients {
    pub fn ratio(&self, cr: f64, bal: f64, shrub_cover_pct: f64) -> f64 {
        (self.intercept
            + self.crown_ratio * cr
            + self.larger_basal_area * bal
            + self.shrub_cover * shrub_cover_pct)
            .exp()
    }

    pub fn bound(&self, d6: f64) -> f64 {
        if d6 <= 0.0 {
            return self.bound_scale;
        }
        self.bound_scale * d6.powf(self.bound_exp)
    }
}

/// Probability that the crown base recedes during a cycle.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CrownRecessionCoefficients {
    pub intercept: f64,
    pub crown_ratio: f64,
    pub taller_cover: f64,
}

impl CrownRecessionCoefficients {
    pub fn probability(&self, cr: f64, cait_pct: f64) -> f64 {
        logistic(self.intercept + self.crown_ratio * cr + self.taller_cover * cait_pct)
    }
}

/// Logistic annual mortality probability.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct MortalityCoefficients {
    pub intercept: f64,
    pub crown_ratio: f64,
    pub relative_height: f64,
    pub log_height: f64,
}

impl MortalityCoefficients {
    pub fn probability(&self, cr: f64, relative_height: f64, tht: f64) -> f64 {
        if tht <= 0.0 {
            return 0.0;
        }
        logistic(
            self.intercept
                + self.crown_ratio * cr
                + self.relative_height * relative_height
                + self.log_height * tht.ln(),
        )
    }
}

/// Closed-form diameter outside bark at stem height `hi`:
/// `dob = scale * tht^height_exp * cr^crown_exp * ((tht - hi) / tht)^taper_exp * exp(breast_height * I)`
/// where `I = 1` when `hi` is at or above breast height.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct DobCoefficients {
    pub scale: f64,
    pub height_exp: f64,
    pub crown_exp: f64,
    pub taper_exp: f64,
    pub breast_height: f64,
    /// Log-scale multiplier per sq ft/ac of basal area in taller plants.
    pub competition: f64,
}

impl DobCoefficients {
    pub fn dob_hi(&self, tht: f64, cr: f64, hi: f64) -> Option<f64> {
        if tht <= hi || tht <= 0.0 || hi < 0.0 {
            return None;
        }
        let above_bh = if hi >= BREAST_HEIGHT { 1.0 } else { 0.0 };
        let v = self.scale
            * tht.powf(self.height_exp)
            * cr.clamp(0.05, 1.0).powf(self.crown_exp)
            * ((tht - hi) / tht).powf(self.taper_exp)
            * (self.breast_height * above_bh).exp();
        (v.is_finite() && v > 0.0).then_some(v)
    }
}

/// Flewelling-style site curve: `H(t) = a0 * (1 - exp(-a1 * psi * t))^a2`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SiteCurveCoefficients {
    pub asymptote: f64,
    pub rate: f64,
    pub shape: f64,
    /// Reference age of the site index.
    pub base_age: f64,
}

impl SiteCurveCoefficients {
    pub fn height(&self, age: f64, psi: f64) -> f64 {
        if age <= 0.0 || psi <= 0.0 {
            return 0.0;
        }
        self.asymptote * (1.0 - (-self.rate * psi * age).exp()).powf(self.shape)
    }
}

/// Shrub cover transition: logistic persistence times exponential cover growth.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CoverTransitionCoefficients {
    pub intercept: f64,
    pub plantation_age: f64,
    pub years_since_thin: f64,
    pub growth_intercept: f64,
    pub log_cover: f64,
}

impl CoverTransitionCoefficients {
    pub fn next_cover(&self, cover_pct: f64, plantation_age: f64, years_since_thin: f64) -> f64 {
        if cover_pct <= 0.0 {
            return 0.0;
        }
        let persist = logistic(
            self.intercept
                + self.plantation_age * plantation_age
                + self.years_since_thin * years_since_thin,
        );
        let grown = (self.growth_intercept + self.log_cover * cover_pct.ln()).exp();
        (persist * grown).clamp(0.0, 100.0)
    }
}

/// Growing-season climate covariates for the hybrid variant.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ClimateCoefficients {
    /// Per inch of growing-season precipitation away from the reference.
    pub precip: f64,
    pub precip_ref: f64,
    /// Per degree F of growing-season mean temperature away from the reference.
    pub temp: f64,
    pub temp_ref: f64,
    /// Multiplier applied when the site lies outside the species climate limits.
    pub outside_limits: f64,
}

impl ClimateCoefficients {
    pub fn modifier(&self, gs_precip: f64, gs_temp: f64) -> f64 {
        (self.precip * (gs_precip - self.precip_ref) + self.temp * (gs_temp - self.temp_ref)).exp()
    }
}

/// Coefficients shared by every species code mapped to one functional group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionalSpecies {
    pub idx: u32,
    pub code: String,
    pub plant_type: PlantType,
    pub d6_from_height: PowerCoefficients,
    pub d6_from_dbh: D6FromDbhCoefficients,
    pub d12_from_height: PowerCoefficients,
    pub dbh_from_height: DbhFromHeightCoefficients,
    pub crown_width: CrownWidthCoefficients,
    pub max_crown_width: MaxCrownWidthCoefficients,
    pub crown_ratio: CrownRatioCoefficients,
    pub height_growth: HeightGrowthCoefficients,
    pub diameter_growth: DiameterGrowthCoefficients,
    pub crown_recession: CrownRecessionCoefficients,
    pub mortality: MortalityCoefficients,
    pub dob: DobCoefficients,
    pub site_curve: SiteCurveCoefficients,
    pub cover_transition: CoverTransitionCoefficients,
    pub climate: ClimateCoefficients,
}

/// All functional species, indexed by position. Immutable during a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoefficientTable {
    pub functional_species: Vec<FunctionalSpecies>,
}

impl CoefficientTable {
    pub fn new(mut functional_species: Vec<FunctionalSpecies>) -> Result<Self, ConifersError> {
        functional_species.sort_by_key(|f| f.idx);
        for (pos, f) in functional_species.iter().enumerate() {
            if f.idx as usize != pos {
                return Err(ConifersError::InvalidCoefficients(format!(
                    "functional species indices must be dense from 0, found {} at position {pos}",
                    f.idx
                )));
            }
        }
        Ok(Self { functional_species })
    }

    pub fn get(&self, fsp_idx: u32) -> Result<&FunctionalSpecies, ConifersError> {
        self.functional_species
            .get(fsp_idx as usize)
            .ok_or_else(|| {
                ConifersError::InvalidCoefficients(format!(
                    "no functional species with index {fsp_idx}"
                ))
            })
    }

    pub fn len(&self) -> usize {
        self.functional_species.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functional_species.is_empty()
    }
}
