use super::{
    allometric_crown_width_growth, apply_height_modifiers, stem_increments, DiameterGrowth,
    GrowthContext, GrowthModel, Variant,
};
use crate::engine::competition::taller_tree_basal_area;
use crate::engine::random::SimRng;
use crate::models::{
    crown_width_from_area, FunctionalSpecies, Plant, SiteCurveCoefficients, BREAST_HEIGHT,
    JUVENILE_HEIGHT, SQ_FT_PER_ACRE,
};

/// Stem height (feet) of the d6 measurement.
const D6_HEIGHT: f64 = 0.5;

/// Crown ratio assumed for a stem whose crown ratio is not yet known.
const DEFAULT_CR: f64 = 0.6;

/// Intensive plantation equations built on a Flewelling-style site curve.
#[derive(Debug, Clone, Copy, Default)]
pub struct Cips;

/// Step-descent root finder shared by [`get_psi`] and [`get_gea`].
///
/// Starting from `start`, where `f` lies above `target`, walk down in steps
/// of 10 while the next value still predicts above the target. The last
/// value that did is kept; the step then shrinks by a factor of ten and the
/// walk repeats until the step's decimal place passes `max_place`.
fn step_descent(f: impl Fn(f64) -> f64, target: f64, start: f64, max_place: i32) -> f64 {
    let mut x = start;
    let mut place = -1;
    while place <= max_place {
        let step = 10f64.powi(-place);
        while x - step > 0.0 && f(x - step) > target {
            x -= step;
        }
        place += 1;
    }
    x
}

/// Site-curve rate multiplier `psi` that reproduces `site_index` at the
/// curve's base age, to 1e-6.
pub fn get_psi(curve: &SiteCurveCoefficients, site_index: f64) -> Option<f64> {
    const START: f64 = 100.0;
    if site_index <= 0.0 || site_index >= curve.asymptote || curve.base_age <= 0.0 {
        return None;
    }
    if curve.height(curve.base_age, START) <= site_index {
        return None;
    }
    Some(step_descent(|psi| curve.height(curve.base_age, psi), site_index, START, 6))
}

/// Growth-effective age at which the site curve for `psi` reaches `tht`, to 1e-3.
pub fn get_gea(curve: &SiteCurveCoefficients, psi: f64, tht: f64) -> Option<f64> {
    const START: f64 = 1000.0;
    if tht <= 0.0 || psi <= 0.0 || tht >= curve.asymptote {
        return None;
    }
    if curve.height(START, psi) <= tht {
        return None;
    }
    Some(step_descent(|age| curve.height(age, psi), tht, START, 3))
}

impl Cips {
    fn crown_ratio_or_default(plant: &Plant) -> f64 {
        if plant.cr > 0.0 && plant.cr <= 1.0 {
            plant.cr
        } else {
            DEFAULT_CR
        }
    }

    fn dob(fsp: &FunctionalSpecies, plant: &Plant, hi: f64) -> Option<f64> {
        fsp.dob.dob_hi(plant.tht, Self::crown_ratio_or_default(plant), hi)
    }

    /// Potential annual height growth along the site curve.
    pub fn potential_height_growth(curve: &SiteCurveCoefficients, si: f64, tht: f64) -> Option<f64> {
        let psi = get_psi(curve, si)?;
        let gea = get_gea(curve, psi, tht)?;
        Some(curve.height(gea + 1.0, psi) - curve.height(gea, psi))
    }

    /// Shrub crown width change from the cover transition.
    fn shrub_crown_width_growth(ctx: &GrowthContext, plant: &Plant) -> Option<f64> {
        if plant.expf <= 0.0 {
            return None;
        }
        let cover = plant.cover_from_crown();
        let next = ctx.fsp.cover_transition.next_cover(
            cover,
            ctx.plantation_age,
            ctx.years_since_thin,
        );
        let ca = (next / 100.0 * SQ_FT_PER_ACRE / plant.expf).min(ctx.fsp.plant_type.max_crown_area());
        Some(crown_width_from_area(ca) - plant.crown_width)
    }
}

impl GrowthModel for Cips {
    fn variant(&self) -> Variant {
        Variant::Cips
    }

    fn height_growth(&self, ctx: &GrowthContext, plant: &Plant, rng: &mut SimRng) -> Option<f64> {
        if plant.tht <= 0.0 {
            return None;
        }
        let si = ctx.plot.site_index_for(ctx.fsp.plant_type);
        let potential = Self::potential_height_growth(&ctx.fsp.site_curve, si, plant.tht)?;
        let hgc = &ctx.fsp.height_growth;
        let stats = &ctx.plot.stats;
        let rh = hgc.relative_height_modifier(ctx.plot.relative_height(plant.tht));
        let veg = hgc.vegetation_modifier(stats.taller_cover_pct(plant.tht), stats.shrub_pct_cover);
        Some(apply_height_modifiers(ctx, plant, potential * rh * veg, rng))
    }

    fn diameter_growth(
        &self,
        ctx: &GrowthContext,
        plant: &Plant,
        hg: f64,
    ) -> Option<DiameterGrowth> {
        let fsp = ctx.fsp;
        let mut end = plant.clone();
        end.tht += hg;
        let start_d6 = Self::dob(fsp, plant, D6_HEIGHT).unwrap_or(0.0);
        let end_d6 = Self::dob(fsp, &end, D6_HEIGHT)?;
        let bait = taller_tree_basal_area(&ctx.plot.stats, plant.tht);
        let competition = (fsp.dob.competition * bait).exp();
        let d6g = ((end_d6 - start_d6) * competition).max(0.0);
        let mut g = stem_increments(self, fsp, plant, hg, d6g);
        g.d12 *= competition;
        g.dbh *= competition;
        Some(g)
    }

    fn crown_width_growth(
        &self,
        ctx: &GrowthContext,
        plant: &Plant,
        hg: f64,
        d6g: f64,
    ) -> Option<f64> {
        if ctx.fsp.plant_type.is_shrub() {
            Self::shrub_crown_width_growth(ctx, plant)
        } else {
            allometric_crown_width_growth(ctx.fsp, plant, hg, d6g)
        }
    }

    /// Logistic in relative height and log height only.
    fn mortality(&self, ctx: &GrowthContext, plant: &Plant) -> f64 {
        let rh = ctx.plot.relative_height(plant.tht);
        ctx.fsp.mortality.probability(0.0, rh, plant.tht)
    }

    fn fill_d6(&self, fsp: &FunctionalSpecies, plant: &Plant) -> Option<f64> {
        Self::dob(fsp, plant, D6_HEIGHT)
    }

    fn fill_d12(&self, fsp: &FunctionalSpecies, plant: &Plant) -> Option<f64> {
        Self::dob(fsp, plant, JUVENILE_HEIGHT)
    }

    fn fill_dbh(&self, fsp: &FunctionalSpecies, plant: &Plant) -> Option<f64> {
        Self::dob(fsp, plant, BREAST_HEIGHT)
    }
}
