use tracing::{debug, info, warn};

use super::competition::{calc_plot_stats, taller_tree_basal_area};
use crate::config::ImputeSettings;
use crate::error::ConifersError;
use crate::models::{
    basal_area_sqft, ModelTables, Plant, PlantErrors, Plot, Sample, BREAST_HEIGHT,
    JUVENILE_HEIGHT, SQ_FT_PER_ACRE,
};
use crate::variants::GrowthModel;

/// Which fields of a plant imputation still owes a value.
#[derive(Debug, Clone, Copy, Default)]
struct Pending {
    skip: bool,
    crown: bool,
    cover: bool,
    measured_cover: bool,
}

/// Fill every missing plant field the equations can supply.
///
/// Error bits on every plant are cleared first. Failures set the plant's
/// bits and the pass continues; the result is `FillValues` when any bit is
/// set at the end. Plants are never removed. A sample without plants is
/// an `InvalidPlantCount` error.
pub fn impute(
    tables: &ModelTables,
    model: &dyn GrowthModel,
    settings: &ImputeSettings,
    sample: &mut Sample,
) -> Result<(), ConifersError> {
    if sample.plants.is_empty() {
        return Err(ConifersError::InvalidPlantCount(format!(
            "sample '{}' has no plants to impute",
            sample.name
        )));
    }
    for plant in sample.plants.iter_mut() {
        plant.errors.clear();
    }

    let pending = first_pass(tables, model, &mut sample.plants);
    calc_plot_stats(tables, &mut sample.plots, &sample.plants)?;

    for (plant, state) in sample.plants.iter_mut().zip(pending.iter()) {
        if state.skip {
            continue;
        }
        fill_dimensions(tables, model, settings, plant, state);
    }

    let index = calc_plot_stats(tables, &mut sample.plots, &sample.plants)?;
    for (pos, range) in index.ranges() {
        let plot = &sample.plots[*pos];
        for i in range.clone() {
            if !pending[i].skip {
                second_pass(tables, plot, &mut sample.plants[i], &pending[i]);
            }
        }
    }

    let count = sample.error_count();
    info!(
        plants = sample.num_plants(),
        plots = sample.num_plots(),
        errors = count,
        "imputation complete"
    );
    if count > 0 {
        warn!(errors = count, "some plant fields could not be imputed");
        return Err(ConifersError::FillValues { count });
    }
    Ok(())
}

/// Validate species and height, then give every crownless plant a
/// provisional crown and a first-cut cover so the statistics pass sees it.
fn first_pass(
    tables: &ModelTables,
    model: &dyn GrowthModel,
    plants: &mut [Plant],
) -> Vec<Pending> {
    plants
        .iter_mut()
        .map(|plant| {
            let mut state = Pending::default();
            let fsp = match tables.resolve(plant.sp_idx) {
                Ok((_, fsp)) => fsp,
                Err(_) => {
                    plant.errors.insert(PlantErrors::INVALID_SPECIES);
                    state.skip = true;
                    return state;
                }
            };
            if fsp.plant_type.is_non_stocked() {
                state.skip = true;
                return state;
            }
            if plant.tht <= 0.0 {
                plant.errors.insert(PlantErrors::INVALID_HEIGHT);
                state.skip = true;
                return state;
            }
            if plant.n_stems == 0 {
                plant.n_stems = 1;
            }

            if plant.crown_width <= 0.0 && plant.crown_area > 0.0 {
                plant.set_crown_area(plant.crown_area);
            }
            state.crown = plant.crown_width <= 0.0;
            state.measured_cover = plant.pct_cover > 0.0;
            state.cover = !state.measured_cover;

            if state.crown {
                let d6 = if plant.d6 > 0.0 {
                    Some(plant.d6)
                } else {
                    model.fill_d6(fsp, plant)
                };
                let ca = d6
                    .and_then(|d| fsp.crown_width.crown_area(basal_area_sqft(d), plant.tht));
                if let Some(ca) = ca {
                    plant.set_crown_area(ca.min(fsp.plant_type.max_crown_area()));
                }
            }
            if state.cover && plant.expf > 0.0 {
                plant.pct_cover = plant.cover_from_crown();
            }
            state
        })
        .collect()
}

/// Diameters, expansion factor and final crown, in that order.
fn fill_dimensions(
    tables: &ModelTables,
    model: &dyn GrowthModel,
    settings: &ImputeSettings,
    plant: &mut Plant,
    state: &Pending,
) {
    let Ok((_, fsp)) = tables.resolve(plant.sp_idx) else {
        return;
    };
    let plant_type = fsp.plant_type;

    if plant.d6 <= 0.0 {
        match model.fill_d6(fsp, plant) {
            Some(d6) => plant.d6 = d6,
            None => plant.errors.insert(PlantErrors::INVALID_D6),
        }
    }
    if plant.tht > JUVENILE_HEIGHT && plant.d12 <= 0.0 {
        match model.fill_d12(fsp, plant) {
            Some(d12) => plant.d12 = d12,
            None => plant.errors.insert(PlantErrors::INVALID_D12),
        }
    }
    if plant_type.is_tree() && plant.tht > BREAST_HEIGHT && plant.dbh <= 0.0 {
        match model.fill_dbh(fsp, plant) {
            Some(dbh) => plant.dbh = dbh,
            None => plant.errors.insert(PlantErrors::INVALID_DBH),
        }
    }
    plant.refresh_stem_areas();

    if plant.expf <= 0.0 {
        let n = plant.n_stems as f64;
        if plant_type.is_tree() && plant.dbh > settings.min_dbh && plant.basal_area > 0.0 {
            plant.expf = settings.baf / plant.basal_area * n;
        } else if !state.measured_cover && settings.fixed_plot_radius > 0.0 {
            plant.expf = fixed_plot_expf(settings.fixed_plot_radius) * n;
        }
    }

    if state.crown {
        match fsp.crown_width.crown_area(plant.d6_area, plant.tht) {
            Some(ca) => plant.set_crown_area(ca.min(plant_type.max_crown_area())),
            None => plant.errors.insert(PlantErrors::INVALID_CW),
        }
    }

    if plant.expf <= 0.0 {
        if plant.pct_cover > 0.0 && plant.crown_area > 0.0 {
            plant.expf = plant.pct_cover / 100.0 * SQ_FT_PER_ACRE / plant.crown_area;
        } else {
            plant.errors.insert(PlantErrors::INVALID_EXPF);
        }
    }

    if !plant.errors.is_empty() {
        debug!(
            plot = plant.plot,
            plant = plant.plant,
            errors = %plant.errors,
            "plant fields left unfilled"
        );
    }
}

/// Cover, crown ratio and maximum crown width, which read final aggregates.
fn second_pass(tables: &ModelTables, plot: &Plot, plant: &mut Plant, state: &Pending) {
    let Ok((_, fsp)) = tables.resolve(plant.sp_idx) else {
        return;
    };

    if state.cover || plant.pct_cover <= 0.0 {
        plant.pct_cover = plant.cover_from_crown();
        if plant.pct_cover <= 0.0 {
            plant.errors.insert(PlantErrors::INVALID_PCT_COVER);
        }
    }

    if !fsp.plant_type.is_tree() {
        return;
    }

    if plant.cr <= 0.0 || plant.cr > 1.0 {
        let stats = &plot.stats;
        match fsp.crown_ratio.eval(
            plant.tht,
            plant.d6,
            taller_tree_basal_area(stats, plant.tht),
            stats.taller_cover_pct(plant.tht),
        ) {
            Some(cr) => plant.cr = cr,
            None => plant.errors.insert(PlantErrors::INVALID_CR),
        }
    }

    if plant.max_crown_width <= 0.0 {
        let diameter = if plant.dbh > 0.0 { plant.dbh } else { plant.d6 };
        match fsp.max_crown_width.eval(diameter) {
            Some(mcw) => plant.max_crown_width = mcw.max(plant.crown_width),
            None => plant.errors.insert(PlantErrors::INVALID_MCW),
        }
    }
}

/// Stems per acre represented by one stem on a fixed-radius plot.
pub fn fixed_plot_expf(radius_ft: f64) -> f64 {
    SQ_FT_PER_ACRE / (std::f64::consts::PI * radius_ft * radius_ft)
}
