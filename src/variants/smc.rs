use super::swo::ratio_diameter_growth;
use super::{apply_height_modifiers, DiameterGrowth, GrowthContext, GrowthModel, Variant};
use crate::engine::competition::larger_basal_area;
use crate::engine::random::SimRng;
use crate::models::Plant;

/// Stand Management Cooperative equations for intensively managed
/// plantations.
///
/// Height growth is driven by the conifer site index for every life form
/// and may include soil water and precipitation terms. Diameter growth
/// competes against basal area in larger trees rather than taller ones.
#[derive(Debug, Clone, Copy, Default)]
pub struct Smc;

impl Smc {
    fn site_multiplier(ctx: &GrowthContext) -> f64 {
        if !ctx.config.use_precip_in_hg {
            return 1.0;
        }
        let hgc = &ctx.fsp.height_growth;
        let precip = ctx.plot.mean_annual_precip;
        let log_precip = if precip > 0.0 { precip.ln() } else { 0.0 };
        (hgc.log_precip * log_precip + hgc.water_capacity * ctx.plot.water_capacity).exp()
    }
}

impl GrowthModel for Smc {
    fn variant(&self) -> Variant {
        Variant::Smc
    }

    fn height_growth(&self, ctx: &GrowthContext, plant: &Plant, rng: &mut SimRng) -> Option<f64> {
        if plant.tht <= 0.0 || ctx.plot.site_index <= 0.0 {
            return None;
        }
        let hgc = &ctx.fsp.height_growth;
        let stats = &ctx.plot.stats;
        let potential = hgc.potential(ctx.plot.site_index, plant.tht) * Self::site_multiplier(ctx);
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
        let bal = larger_basal_area(&ctx.plot.stats, plant.dbh);
        ratio_diameter_growth(self, ctx, plant, hg, bal)
    }
}
