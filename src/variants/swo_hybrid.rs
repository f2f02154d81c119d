use super::swo::{base_height_growth, ratio_diameter_growth};
use super::{apply_height_modifiers, DiameterGrowth, GrowthContext, GrowthModel, Variant};
use crate::engine::competition::taller_tree_basal_area;
use crate::engine::random::SimRng;
use crate::models::Plant;

/// SWO equations with a monthly-climate height growth multiplier.
#[derive(Debug, Clone, Copy, Default)]
pub struct SwoHybrid;

impl SwoHybrid {
    /// Climate multiplier for the plot. Plots without monthly normals get 1.
    pub fn climate_modifier(ctx: &GrowthContext) -> f64 {
        let Some(climate) = &ctx.plot.climate else {
            return 1.0;
        };
        let cc = &ctx.fsp.climate;
        let mut m = cc.modifier(climate.growing_season_precip(), climate.growing_season_temp());
        if Self::outside_limits(ctx) {
            m *= cc.outside_limits;
        }
        m
    }

    /// Whether the site's annual climate falls outside the species range.
    pub fn outside_limits(ctx: &GrowthContext) -> bool {
        let Some(climate) = &ctx.plot.climate else {
            return false;
        };
        let sp = ctx.species;
        let temp = climate.annual_temp();
        let precip = climate.annual_precip();
        temp < sp.min_temp || temp > sp.max_temp || precip < sp.min_precip || precip > sp.max_precip
    }
}

impl GrowthModel for SwoHybrid {
    fn variant(&self) -> Variant {
        Variant::SwoHybrid
    }

    fn height_growth(&self, ctx: &GrowthContext, plant: &Plant, rng: &mut SimRng) -> Option<f64> {
        let hg = base_height_growth(ctx, plant)? * Self::climate_modifier(ctx);
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
