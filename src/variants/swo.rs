use super::{
    apply_height_modifiers, genetic_gain, stem_increments, DiameterGrowth, GrowthContext,
    GrowthModel, Variant,
};
use crate::engine::competition::taller_tree_basal_area;
use crate::engine::random::SimRng;
use crate::models::Plant;

/// Southwest Oregon empirical equations.
#[derive(Debug, Clone, Copy, Default)]
pub struct Swo;

/// Height growth before genetic, random and damage modifiers.
pub(crate) fn base_height_growth(ctx: &GrowthContext, plant: &Plant) -> Option<f64> {
    if plant.tht <= 0.0 {
        return None;
    }
    let si = ctx.plot.site_index_for(ctx.fsp.plant_type);
    if si <= 0.0 {
        return None;
    }
    let hgc = &ctx.fsp.height_growth;
    let stats = &ctx.plot.stats;
    let potential = hgc.potential(si, plant.tht);
    let rh = hgc.relative_height_modifier(ctx.plot.relative_height(plant.tht));
    let veg = hgc.vegetation_modifier(stats.taller_cover_pct(plant.tht), stats.shrub_pct_cover);
    Some(potential * rh * veg)
}

/// Ratio diameter growth: d6 grows a fixed multiple of height growth,
/// bounded above by the large-tree term. `competition` is the basal area
/// the variant uses as its size-competition covariate.
pub(crate) fn ratio_diameter_growth<M: GrowthModel + ?Sized>(
    model: &M,
    ctx: &GrowthContext,
    plant: &Plant,
    hg: f64,
    competition: f64,
) -> Option<DiameterGrowth> {
    if plant.d6 <= 0.0 {
        return None;
    }
    let dgc = &ctx.fsp.diameter_growth;
    let ratio = dgc.ratio(plant.cr, competition, ctx.plot.stats.shrub_pct_cover);
    let mut d6g = (ratio * hg).min(dgc.bound(plant.d6));
    if ctx.config.use_genetic_gains {
        let si = ctx.plot.site_index_for(ctx.fsp.plant_type);
        d6g *= genetic_gain(ctx.species.genetic_worth_d, si, ctx.plot.stats.top_height);
    }
    if !d6g.is_finite() {
        return None;
    }
    Some(stem_increments(model, ctx.fsp, plant, hg, d6g.max(0.0)))
}

impl GrowthModel for Swo {
    fn variant(&self) -> Variant {
        Variant::Swo
    }

    fn height_growth(&self, ctx: &GrowthContext, plant: &Plant, rng: &mut SimRng) -> Option<f64> {
        let hg = base_height_growth(ctx, plant)?;
        Some(apply_height_modifiers(ctx, plant, hg, rng))
    }

    fn diameter_growth(
        &self,
        ctx: &GrowthContext,
        plant: &Plant,
        hg: f64,
    ) -> Option<DiameterGrowth> {
        let bait = taller_tree_basal_area(&ctx.plot.stats, plant.tht);
        ratio_diameter_growth(self, ctx, plant, hg, bait)
    }
}
