//! Interchangeable growth equation sets sharing one plant/plot data model.

mod cips;
mod smc;
mod swo;
mod swo_hybrid;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{CrCadence, SimulationConfig};
use crate::engine::competition::taller_tree_basal_area;
use crate::engine::random::SimRng;
use crate::error::ConifersError;
use crate::models::{
    crown_width_from_area, FunctionalSpecies, Plant, PlantErrors, Plot, Species, BREAST_HEIGHT,
    JUVENILE_HEIGHT,
};

pub use cips::{get_gea, get_psi, Cips};
pub use smc::Smc;
pub use swo::Swo;
pub use swo_hybrid::SwoHybrid;

/// Growth model variant, selected once per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Variant {
    /// Southwest Oregon
    Swo,
    /// Stand Management Cooperative (western Washington and Oregon)
    Smc,
    /// Southwest Oregon with monthly climate covariates
    SwoHybrid,
    /// Center for Intensive Planted-forest Silviculture
    Cips,
}

impl Variant {
    pub const ALL: [Variant; 4] = [Variant::Swo, Variant::Smc, Variant::SwoHybrid, Variant::Cips];

    /// The equation set implementing this variant.
    pub fn model(self) -> &'static dyn GrowthModel {
        match self {
            Variant::Swo => &Swo,
            Variant::Smc => &Smc,
            Variant::SwoHybrid => &SwoHybrid,
            Variant::Cips => &Cips,
        }
    }
}

impl std::fmt::Display for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Variant::Swo => write!(f, "SWO"),
            Variant::Smc => write!(f, "SMC"),
            Variant::SwoHybrid => write!(f, "SWOHYBRID"),
            Variant::Cips => write!(f, "CIPS"),
        }
    }
}

impl std::str::FromStr for Variant {
    type Err = ConifersError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "SWO" => Ok(Variant::Swo),
            "SMC" => Ok(Variant::Smc),
            "SWOHYBRID" | "SWO_HYBRID" | "HYBRID" => Ok(Variant::SwoHybrid),
            "CIPS" => Ok(Variant::Cips),
            _ => Err(ConifersError::InvalidVariant(s.to_string())),
        }
    }
}

/// Everything a growth equation may read besides the plant itself.
#[derive(Debug, Clone, Copy)]
pub struct GrowthContext<'a> {
    pub plot: &'a Plot,
    pub species: &'a Species,
    pub fsp: &'a FunctionalSpecies,
    pub config: &'a SimulationConfig,
    /// Projection year, starting at 1.
    pub year: u32,
    pub plantation_age: f64,
    pub years_since_thin: f64,
}

/// Annual diameter increments, inches.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DiameterGrowth {
    pub d6: f64,
    pub d12: f64,
    pub dbh: f64,
}

/// One biological variant's annual growth equations.
///
/// Every method returns `None` when its equation cannot be evaluated; the
/// caller records the matching [`PlantErrors`] bit and uses zero growth.
pub trait GrowthModel {
    fn variant(&self) -> Variant;

    /// Annual height increment, feet.
    fn height_growth(&self, ctx: &GrowthContext, plant: &Plant, rng: &mut SimRng) -> Option<f64>;

    /// Annual d6, d12 and dbh increments of a tree that grows `hg` feet.
    fn diameter_growth(&self, ctx: &GrowthContext, plant: &Plant, hg: f64)
        -> Option<DiameterGrowth>;

    /// Annual crown ratio change of a tree.
    fn crown_ratio_growth(
        &self,
        ctx: &GrowthContext,
        plant: &Plant,
        hg: f64,
        d6g: f64,
        rng: &mut SimRng,
    ) -> Option<f64> {
        default_crown_ratio_growth(ctx, plant, hg, d6g, rng)
    }

    /// Annual crown width change, feet.
    fn crown_width_growth(
        &self,
        ctx: &GrowthContext,
        plant: &Plant,
        hg: f64,
        d6g: f64,
    ) -> Option<f64> {
        allometric_crown_width_growth(ctx.fsp, plant, hg, d6g)
    }

    /// Annual probability of death.
    fn mortality(&self, ctx: &GrowthContext, plant: &Plant) -> f64 {
        let rh = ctx.plot.relative_height(plant.tht);
        ctx.fsp.mortality.probability(plant.cr, rh, plant.tht)
    }

    /// Diameter at 6 inches from the plant's other dimensions.
    fn fill_d6(&self, fsp: &FunctionalSpecies, plant: &Plant) -> Option<f64> {
        if plant.dbh > 0.0 {
            fsp.d6_from_dbh.eval(plant.dbh, plant.tht)
        } else {
            fsp.d6_from_height.eval(plant.tht)
        }
    }

    /// Diameter at 12 inches; only defined above the juvenile height.
    fn fill_d12(&self, fsp: &FunctionalSpecies, plant: &Plant) -> Option<f64> {
        if plant.tht <= JUVENILE_HEIGHT {
            return None;
        }
        let d12 = fsp.d12_from_height.eval(plant.tht - JUVENILE_HEIGHT)?;
        Some(if plant.d6 > 0.0 { d12.min(plant.d6) } else { d12 })
    }

    /// Diameter at breast height; only defined above breast height.
    fn fill_dbh(&self, fsp: &FunctionalSpecies, plant: &Plant) -> Option<f64> {
        fsp.dbh_from_height.eval(plant.d6, plant.tht)
    }
}

/// Project one plant forward one year, leaving the deltas on the plant.
///
/// Growth fields are zeroed first. Non-stocked records and records with
/// no expansion factor exit with zero growth. Equation failures set the
/// plant's error bits and leave the matching delta at zero.
pub fn project_plant(
    model: &dyn GrowthModel,
    ctx: &GrowthContext,
    plant: &mut Plant,
    rng: &mut SimRng,
) -> Result<(), ConifersError> {
    plant.reset_growth();

    if plant.sp_idx != ctx.species.idx {
        return Err(ConifersError::InvalidSpecies(format!(
            "plant {} on plot {} has species {} but was projected as {}",
            plant.plant, plant.plot, plant.sp_idx, ctx.species.code
        )));
    }
    let plant_type = ctx.fsp.plant_type;
    if plant_type.is_non_stocked() || plant.expf <= 0.0 {
        return Ok(());
    }

    let hg = match model.height_growth(ctx, plant, rng) {
        Some(hg) if hg.is_finite() && hg >= 0.0 => hg,
        _ => {
            plant.errors.insert(PlantErrors::INVALID_HG);
            0.0
        }
    };
    plant.tht_growth = hg;

    if plant_type.is_tree() {
        match model.diameter_growth(ctx, plant, hg) {
            Some(g) => {
                plant.d6_growth = g.d6.max(0.0);
                plant.d12_growth = g.d12.max(0.0);
                plant.dbh_growth = g.dbh.max(0.0);
            }
            None => plant.errors.insert(PlantErrors::INVALID_D6G),
        }

        match model.crown_ratio_growth(ctx, plant, hg, plant.d6_growth, rng) {
            Some(crg) => {
                plant.cr_growth = (plant.cr + crg).clamp(0.0, 1.0) - plant.cr;
            }
            None => plant.errors.insert(PlantErrors::INVALID_CRG),
        }
    } else {
        // Shrubs and forbs still thicken at the base; crowns depend on it.
        plant.d6_growth = shrub_d6_growth(ctx.fsp, plant, hg);
    }

    match model.crown_width_growth(ctx, plant, hg, plant.d6_growth) {
        Some(cwg) => {
            plant.cw_growth = (plant.crown_width + cwg).max(0.0) - plant.crown_width;
        }
        None => plant.errors.insert(PlantErrors::INVALID_CW),
    }

    if ctx.config.use_endemic_mortality {
        let p_model = model.mortality(ctx, plant).clamp(0.0, 1.0);
        let p = 1.0 - (1.0 - p_model) * (1.0 - ctx.species.endemic_mortality.clamp(0.0, 1.0));
        plant.expf_change = -plant.expf * p;
    }

    debug!(
        plot = plant.plot,
        plant = plant.plant,
        hg = plant.tht_growth,
        d6g = plant.d6_growth,
        crg = plant.cr_growth,
        cwg = plant.cw_growth,
        "projected plant"
    );
    Ok(())
}

/// Copy of `plant` advanced by height and d6 increments, other fields unchanged.
pub(crate) fn advanced(plant: &Plant, hg: f64, d6g: f64) -> Plant {
    let mut next = plant.clone();
    next.tht += hg;
    next.d6 += d6g;
    next.refresh_stem_areas();
    next
}

/// d12 and dbh increments as the difference between predictions at the
/// advanced and the current state.
///
/// A stem that crosses 1 ft or 4.5 ft this year grows from zero.
pub(crate) fn stem_increments<M: GrowthModel + ?Sized>(
    model: &M,
    fsp: &FunctionalSpecies,
    plant: &Plant,
    hg: f64,
    d6g: f64,
) -> DiameterGrowth {
    let end = advanced(plant, hg, d6g);

    let d12 = if end.tht > JUVENILE_HEIGHT {
        let before = if plant.tht > JUVENILE_HEIGHT {
            model.fill_d12(fsp, plant).unwrap_or(0.0)
        } else {
            0.0
        };
        (model.fill_d12(fsp, &end).unwrap_or(0.0) - before).max(0.0)
    } else {
        0.0
    };
    let dbh = if end.tht > BREAST_HEIGHT {
        let before = if plant.tht > BREAST_HEIGHT {
            model.fill_dbh(fsp, plant).unwrap_or(0.0)
        } else {
            0.0
        };
        (model.fill_dbh(fsp, &end).unwrap_or(0.0) - before).max(0.0)
    } else {
        0.0
    };
    DiameterGrowth { d6: d6g, d12, dbh }
}

/// Shrub and forb basal diameter follows height through the d6 allometry.
fn shrub_d6_growth(fsp: &FunctionalSpecies, plant: &Plant, hg: f64) -> f64 {
    match (
        fsp.d6_from_height.eval(plant.tht + hg),
        fsp.d6_from_height.eval(plant.tht),
    ) {
        (Some(end), Some(start)) => (end - start).max(0.0),
        _ => 0.0,
    }
}

/// Crown width change from the log-linear crown area model evaluated at
/// the advanced and the current state, clamped to the life-form maximum.
pub(crate) fn allometric_crown_width_growth(
    fsp: &FunctionalSpecies,
    plant: &Plant,
    hg: f64,
    d6g: f64,
) -> Option<f64> {
    let max_ca = fsp.plant_type.max_crown_area();
    let end = advanced(plant, hg, d6g);
    let ca_end = fsp.crown_width.crown_area(end.d6_area, end.tht)?.min(max_ca);
    let ca_start = fsp
        .crown_width
        .crown_area(plant.d6_area, plant.tht)
        .map(|ca| ca.min(max_ca))
        .unwrap_or(0.0);
    let growth = (crown_width_from_area(ca_end) - crown_width_from_area(ca_start)).max(0.0);
    let cap = crown_width_from_area(max_ca);
    Some(growth.min((cap - plant.crown_width).max(0.0)))
}

/// Crown ratio change shared by the empirical variants.
///
/// With no recession the crown base stays put and the ratio rises with
/// height. When a uniform draw falls under the recession probability the
/// ratio is pulled down to the equilibrium crown ratio equation.
pub(crate) fn default_crown_ratio_growth(
    ctx: &GrowthContext,
    plant: &Plant,
    hg: f64,
    d6g: f64,
    rng: &mut SimRng,
) -> Option<f64> {
    if !ctx.config.use_cr_growth {
        return Some(0.0);
    }
    if ctx.config.cr_growth_cadence == CrCadence::Biennial && ctx.year % 2 == 1 {
        return Some(0.0);
    }
    if plant.tht <= 0.0 {
        return None;
    }
    let end = advanced(plant, hg, d6g);
    let stats = &ctx.plot.stats;
    let cait_pct = stats.taller_cover_pct(end.tht);
    let equilibrium = ctx.fsp.crown_ratio.eval(
        end.tht,
        end.d6,
        taller_tree_basal_area(stats, end.tht),
        cait_pct,
    )?;
    let no_recession = (plant.cr * plant.tht + hg) / end.tht;
    let p_recede = ctx.fsp.crown_recession.probability(plant.cr, cait_pct);
    let next = if rng.uniform_0_1() < p_recede {
        equilibrium.min(no_recession)
    } else {
        no_recession
    };
    Some(next.clamp(0.0, 1.0) - plant.cr)
}

/// Stand-age bucket used to taper genetic gains, 0 (youngest) to 5.
///
/// The bucket is the number of reference ages (5, 10, 15, 20, 25 years)
/// whose expected top height for the site-index class the stand has
/// already reached.
pub fn get_age_cut(site_index: f64, top_height: f64) -> usize {
    const AGE_CUT_TABLE: [[f64; 5]; 4] = [
        [5.0, 12.0, 22.0, 32.0, 42.0],
        [7.0, 16.0, 28.0, 40.0, 52.0],
        [9.0, 20.0, 34.0, 48.0, 62.0],
        [11.0, 24.0, 40.0, 56.0, 72.0],
    ];
    let class = if site_index <= 90.0 {
        0
    } else if site_index <= 110.0 {
        1
    } else if site_index <= 130.0 {
        2
    } else {
        3
    };
    AGE_CUT_TABLE[class]
        .iter()
        .filter(|h| top_height >= **h)
        .count()
}

/// Share of the genetic worth realized in each age bucket.
const GAIN_TAPER: [f64; 6] = [1.0, 0.8, 0.6, 0.4, 0.2, 0.0];

/// Multiplier from a genetic worth in percent.
pub(crate) fn genetic_gain(worth_pct: f64, site_index: f64, top_height: f64) -> f64 {
    let cut = get_age_cut(site_index, top_height).min(GAIN_TAPER.len() - 1);
    1.0 + worth_pct / 100.0 * GAIN_TAPER[cut]
}

/// Lognormal multiplicative error with unit mean.
pub(crate) fn random_error(sigma: f64, rng: &mut SimRng) -> f64 {
    if sigma <= 0.0 {
        return 1.0;
    }
    (sigma * rng.gauss_dev() - sigma * sigma / 2.0).exp()
}

/// Height growth modifiers shared by the empirical variants: genetic gain,
/// random error, browse and mechanical damage.
pub(crate) fn apply_height_modifiers(
    ctx: &GrowthContext,
    plant: &Plant,
    hg: f64,
    rng: &mut SimRng,
) -> f64 {
    let mut hg = hg;
    if ctx.config.use_genetic_gains && ctx.fsp.plant_type.is_tree() {
        let si = ctx.plot.site_index_for(ctx.fsp.plant_type);
        hg *= genetic_gain(ctx.species.genetic_worth_h, si, ctx.plot.stats.top_height);
    }
    if ctx.config.use_rand_err {
        hg *= random_error(ctx.fsp.height_growth.sigma, rng);
    }
    if plant.tht < BREAST_HEIGHT {
        hg *= 1.0 - ctx.species.browse_damage.clamp(0.0, 1.0);
    }
    hg * (1.0 - ctx.species.mechanical_damage.clamp(0.0, 1.0))
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::models::ModelTables;

    pub fn tables() -> ModelTables {
        ModelTables::builtin().unwrap()
    }

    pub fn make_tree(sp_idx: u32, tht: f64, dbh: f64, cr: f64, expf: f64) -> Plant {
        let mut p = Plant::new(1, 1, "DF", sp_idx);
        p.tht = tht;
        p.dbh = dbh;
        p.d6 = dbh * 1.2 + 0.5;
        p.d12 = dbh * 1.1 + 0.3;
        p.cr = cr;
        p.crown_width = 12.0;
        p.expf = expf;
        p.refresh_areas();
        p
    }

    pub fn make_plot() -> Plot {
        let mut plot = Plot::new(1);
        plot.site_index = 120.0;
        plot.site_index_hw = 90.0;
        plot.water_capacity = 8.0;
        plot.mean_annual_precip = 60.0;
        plot.stats.top_height = 60.0;
        plot
    }

    pub fn context<'a>(
        tables: &'a ModelTables,
        plot: &'a Plot,
        config: &'a SimulationConfig,
        sp_idx: u32,
    ) -> GrowthContext<'a> {
        let (species, fsp) = tables.resolve(sp_idx).unwrap();
        GrowthContext {
            plot,
            species,
            fsp,
            config,
            year: 2,
            plantation_age: 15.0,
            years_since_thin: 0.0,
        }
    }
}
