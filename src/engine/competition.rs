use tracing::debug;

use crate::error::ConifersError;
use crate::models::{
    ModelTables, Plant, PlantErrors, PlantType, Plot, PlotAggregates, PlotIndex, SQ_FT_PER_ACRE,
};

/// Reineke exponent of the stand density index.
pub const SDI_EXPONENT: f64 = 1.605;

/// Stems per acre that define top height.
pub const TOP_HEIGHT_TPA: f64 = 40.0;

/// Basal area factor for a diameter in inches: `pi / (4 * 144)`.
const FOREST_CONSTANT: f64 = 0.005_454_154;

/// Whether a plant takes part in aggregates and growth.
pub fn is_active(plant: &Plant, plant_type: PlantType) -> bool {
    !plant_type.is_non_stocked() && plant.expf > 0.0
}

/// Rebuild every plot's aggregates and competition tables from its plants.
///
/// Plants flagged with an invalid species are skipped; any other plant
/// whose species cannot be resolved is a fatal error. Returns the plot
/// index built for the pass.
pub fn calc_plot_stats(
    tables: &ModelTables,
    plots: &mut [Plot],
    plants: &[Plant],
) -> Result<PlotIndex, ConifersError> {
    let index = PlotIndex::build(plots, plants)?;

    for plot in plots.iter_mut() {
        plot.stats.clear();
    }

    for (pos, range) in index.ranges() {
        let plot = &mut plots[*pos];
        accumulate_plot(tables, &mut plot.stats, &plants[range.clone()])?;
        debug!(
            plot = plot.plot,
            tpa = plot.stats.tree_expf,
            basal_area = plot.stats.basal_area,
            sdi = plot.stats.sdi,
            "plot statistics"
        );
    }

    Ok(index)
}

fn accumulate_plot(
    tables: &ModelTables,
    stats: &mut PlotAggregates,
    plants: &[Plant],
) -> Result<(), ConifersError> {
    let mut tree_d6_area = 0.0;
    let mut ccf_area = 0.0;
    let mut sdi_weight = 0.0;
    let mut tops: Vec<(f64, f64, f64)> = Vec::new();

    for plant in plants {
        if plant.errors.contains(PlantErrors::INVALID_SPECIES) {
            continue;
        }
        let (sp, fsp) = tables.resolve(plant.sp_idx)?;
        let plant_type = fsp.plant_type;
        if !is_active(plant, plant_type) {
            continue;
        }
        let expf = plant.expf;

        stats.expf += expf;
        stats.d6_area += plant.d6_area * expf;
        stats.crown_area += plant.crown_area * expf;
        stats.bait.add(plant_type, plant.tht, plant.d6_area * expf);
        stats.cait.add(plant_type, plant.tht, plant.crown_area * expf);

        match plant_type {
            PlantType::Conifer | PlantType::Hardwood => {
                stats.tree_expf += expf;
                tree_d6_area += plant.d6_area * expf;
                if plant_type == PlantType::Conifer {
                    stats.con_ca += plant.crown_area * expf;
                } else {
                    stats.hw_ca += plant.crown_area * expf;
                }
                if plant.dbh > 0.0 {
                    let ba = plant.basal_area * expf;
                    stats.bh_expf += expf;
                    stats.basal_area += ba;
                    if plant_type == PlantType::Conifer {
                        stats.con_ba += ba;
                    } else {
                        stats.hw_ba += ba;
                    }
                    stats.bal.add(plant_type, plant.dbh, ba);
                    stats.max_sdi += sp.max_sdi * ba;
                    sdi_weight += ba;
                }
                let mcw = if plant.max_crown_width > 0.0 {
                    plant.max_crown_width
                } else {
                    plant.crown_width
                };
                ccf_area += crate::models::crown_area_from_width(mcw) * expf;
                tops.push((plant.d6, plant.tht, expf));
            }
            PlantType::Shrub => {
                stats.shrub_expf += expf;
                stats.shrub_ca += plant.crown_area * expf;
            }
            PlantType::Forb => {
                stats.forb_expf += expf;
                stats.forb_ca += plant.crown_area * expf;
            }
            PlantType::NonStocked => {}
        }
    }

    stats.shrub_pct_cover = stats.shrub_ca / SQ_FT_PER_ACRE * 100.0;
    stats.forb_pct_cover = stats.forb_ca / SQ_FT_PER_ACRE * 100.0;
    stats.qmd = quadratic_mean_diameter(stats.basal_area, stats.bh_expf);
    stats.d6_qmd = quadratic_mean_diameter(tree_d6_area, stats.tree_expf);
    stats.sdi = stand_density_index(stats.bh_expf, stats.qmd);
    stats.max_sdi = if sdi_weight > 0.0 {
        stats.max_sdi / sdi_weight
    } else {
        0.0
    };
    stats.ccf = ccf_area / SQ_FT_PER_ACRE * 100.0;
    stats.top_height = top_height(&mut tops);

    stats.bait.finalize();
    stats.cait.finalize();
    stats.bal.finalize();
    Ok(())
}

/// Quadratic mean diameter (inches) of `expf` stems totalling `basal_area` sq ft.
pub fn quadratic_mean_diameter(basal_area: f64, expf: f64) -> f64 {
    if expf <= 0.0 || basal_area <= 0.0 {
        return 0.0;
    }
    (basal_area / expf / FOREST_CONSTANT).sqrt()
}

/// Reineke stand density index: `tpa * (qmd / 10)^1.605`.
pub fn stand_density_index(tpa: f64, qmd: f64) -> f64 {
    if tpa <= 0.0 || qmd <= 0.0 {
        return 0.0;
    }
    tpa * (qmd / 10.0).powf(SDI_EXPONENT)
}

/// Expansion-weighted mean height of the largest-d6 trees up to 40 stems/ac.
fn top_height(tops: &mut [(f64, f64, f64)]) -> f64 {
    tops.sort_by(|a, b| b.0.total_cmp(&a.0));
    let mut remaining = TOP_HEIGHT_TPA;
    let mut sum = 0.0;
    let mut weight = 0.0;
    for &(_, tht, expf) in tops.iter() {
        if remaining <= 0.0 {
            break;
        }
        let w = expf.min(remaining);
        sum += tht * w;
        weight += w;
        remaining -= w;
    }
    if weight > 0.0 {
        sum / weight
    } else {
        0.0
    }
}

/// d6 basal area (sq ft/ac) of trees taller than `tht`.
pub fn taller_tree_basal_area(stats: &PlotAggregates, tht: f64) -> f64 {
    stats.bait.trees_at(tht)
}

/// Breast-height basal area (sq ft/ac) of trees larger than `dbh`.
pub fn larger_basal_area(stats: &PlotAggregates, dbh: f64) -> f64 {
    stats.bal.trees_at(dbh)
}
