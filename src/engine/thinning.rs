use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::competition::is_active;
use crate::error::ConifersError;
use crate::models::{ModelTables, Plant, PlotIndex, Sample};

/// Thinning policy applied to the trees of one plot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ThinType {
    /// Reduce every tree's expansion factor by `proportion`.
    SdiMortality { proportion: f64 },
    /// Scale one species uniformly down to `target_expf` stems per acre.
    ProportionalSpecies { sp_idx: u32, target_expf: f64 },
    /// Scale all trees uniformly down to `target_expf` stems per acre.
    ProportionalAll { target_expf: f64 },
    /// Remove `remove_expf` stems per acre of one species, smallest dbh first.
    FromBelowSpecies { sp_idx: u32, remove_expf: f64 },
    /// Remove `remove_expf` stems per acre, smallest dbh first.
    FromBelowAll { remove_expf: f64 },
}

impl ThinType {
    fn species_filter(&self) -> Option<u32> {
        match self {
            ThinType::ProportionalSpecies { sp_idx, .. } | ThinType::FromBelowSpecies { sp_idx, .. } => {
                Some(*sp_idx)
            }
            _ => None,
        }
    }
}

/// Running totals of what thinning removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ThinReport {
    /// Stems per acre removed.
    pub plants_removed: f64,
    /// Basal area at 6 inches removed, sq ft/ac.
    pub ba_removed: f64,
}

impl ThinReport {
    fn record(&mut self, plant: &Plant, removed: f64) {
        self.plants_removed += removed;
        self.ba_removed += plant.d6_area * removed;
    }
}

/// Apply a thinning policy to one plot's plants.
///
/// Only stocked trees with a positive expansion factor are thinned. Totals
/// are added to `report`.
pub fn thin_plot(
    tables: &ModelTables,
    plants: &mut [Plant],
    thin: &ThinType,
    report: &mut ThinReport,
) -> Result<(), ConifersError> {
    let mut eligible = Vec::new();
    for (i, plant) in plants.iter().enumerate() {
        let (_, fsp) = tables.resolve(plant.sp_idx)?;
        if !fsp.plant_type.is_tree() || !is_active(plant, fsp.plant_type) {
            continue;
        }
        if thin.species_filter().is_some_and(|sp| sp != plant.sp_idx) {
            continue;
        }
        eligible.push(i);
    }

    match *thin {
        ThinType::SdiMortality { proportion } => {
            if !(0.0..=1.0).contains(&proportion) {
                return Err(ConifersError::Thinning(format!(
                    "mortality proportion must be in [0, 1], got {proportion}"
                )));
            }
            scale(plants, &eligible, 1.0 - proportion, report);
        }
        ThinType::ProportionalSpecies { target_expf, .. }
        | ThinType::ProportionalAll { target_expf } => {
            if target_expf < 0.0 {
                return Err(ConifersError::Thinning(format!(
                    "target expansion factor must not be negative, got {target_expf}"
                )));
            }
            let current: f64 = eligible.iter().map(|&i| plants[i].expf).sum();
            if current > target_expf {
                scale(plants, &eligible, target_expf / current, report);
            }
        }
        ThinType::FromBelowSpecies { remove_expf, .. } | ThinType::FromBelowAll { remove_expf } => {
            if remove_expf < 0.0 {
                return Err(ConifersError::Thinning(format!(
                    "removal must not be negative, got {remove_expf}"
                )));
            }
            eligible.sort_by(|&a, &b| plants[a].dbh.total_cmp(&plants[b].dbh));
            let mut remaining = remove_expf;
            for &i in &eligible {
                if remaining <= 0.0 {
                    break;
                }
                let plant = &mut plants[i];
                let removed = plant.expf.min(remaining);
                plant.expf -= removed;
                remaining -= removed;
                report.record(plant, removed);
            }
            if remaining > 0.0 {
                warn!(shortfall = remaining, "thinning from below ran out of trees");
            }
        }
    }
    Ok(())
}

/// Multiply each listed plant's expansion factor by `retain`.
fn scale(plants: &mut [Plant], which: &[usize], retain: f64, report: &mut ThinReport) {
    for &i in which {
        let plant = &mut plants[i];
        let removed = plant.expf * (1.0 - retain);
        plant.expf -= removed;
        report.record(plant, removed);
    }
}

/// Apply the same policy to every plot of a sample.
pub fn thin_sample(
    tables: &ModelTables,
    sample: &mut Sample,
    thin: &ThinType,
) -> Result<ThinReport, ConifersError> {
    let index = PlotIndex::build(&sample.plots, &sample.plants)?;
    let mut report = ThinReport::default();
    for (_, range) in index.ranges() {
        thin_plot(tables, &mut sample.plants[range.clone()], thin, &mut report)?;
    }
    info!(
        plants_removed = report.plants_removed,
        ba_removed = report.ba_removed,
        "thinning complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Plot;
    use assert_approx_eq::assert_approx_eq;

    fn make_tree(id: u32, sp_idx: u32, dbh: f64, expf: f64) -> Plant {
        let mut p = Plant::new(1, id, "DF", sp_idx);
        p.dbh = dbh;
        p.d6 = dbh + 1.0;
        p.tht = 10.0 * dbh;
        p.expf = expf;
        p.refresh_areas();
        p
    }

    #[test]
    fn test_from_below_exact_partial_removal() {
        let tables = ModelTables::builtin().unwrap();
        let mut plants = vec![
            make_tree(1, 1, 4.0, 10.0),
            make_tree(2, 1, 6.0, 20.0),
            make_tree(3, 1, 8.0, 30.0),
        ];
        let mut report = ThinReport::default();
        thin_plot(
            &tables,
            &mut plants,
            &ThinType::FromBelowAll { remove_expf: 35.0 },
            &mut report,
        )
        .unwrap();
        assert_eq!(plants[0].expf, 0.0);
        assert_eq!(plants[1].expf, 0.0);
        assert_eq!(plants[2].expf, 25.0);
        assert_eq!(report.plants_removed, 35.0);
        let ba = plants[0].d6_area * 10.0 + plants[1].d6_area * 20.0 + plants[2].d6_area * 5.0;
        assert_approx_eq!(report.ba_removed, ba, 1e-12);
    }

    #[test]
    fn test_from_below_sorts_by_dbh() {
        let tables = ModelTables::builtin().unwrap();
        let mut plants = vec![make_tree(1, 1, 8.0, 30.0), make_tree(2, 1, 4.0, 10.0)];
        let mut report = ThinReport::default();
        thin_plot(
            &tables,
            &mut plants,
            &ThinType::FromBelowAll { remove_expf: 15.0 },
            &mut report,
        )
        .unwrap();
        assert_eq!(plants[1].expf, 0.0);
        assert_eq!(plants[0].expf, 25.0);
    }

    #[test]
    fn test_from_below_one_species() {
        let tables = ModelTables::builtin().unwrap();
        let mut plants = vec![make_tree(1, 4, 2.0, 50.0), make_tree(2, 1, 6.0, 20.0)];
        let mut report = ThinReport::default();
        thin_plot(
            &tables,
            &mut plants,
            &ThinType::FromBelowSpecies { sp_idx: 1, remove_expf: 5.0 },
            &mut report,
        )
        .unwrap();
        assert_eq!(plants[0].expf, 50.0);
        assert_eq!(plants[1].expf, 15.0);
    }

    #[test]
    fn test_proportional_to_target() {
        let tables = ModelTables::builtin().unwrap();
        let mut plants = vec![make_tree(1, 1, 4.0, 100.0), make_tree(2, 1, 8.0, 300.0)];
        let mut report = ThinReport::default();
        thin_plot(
            &tables,
            &mut plants,
            &ThinType::ProportionalAll { target_expf: 200.0 },
            &mut report,
        )
        .unwrap();
        assert_approx_eq!(plants[0].expf, 50.0, 1e-12);
        assert_approx_eq!(plants[1].expf, 150.0, 1e-12);
        assert_approx_eq!(report.plants_removed, 200.0, 1e-12);
    }

    #[test]
    fn test_proportional_below_target_is_noop() {
        let tables = ModelTables::builtin().unwrap();
        let mut plants = vec![make_tree(1, 1, 4.0, 100.0)];
        let mut report = ThinReport::default();
        thin_plot(
            &tables,
            &mut plants,
            &ThinType::ProportionalSpecies { sp_idx: 1, target_expf: 150.0 },
            &mut report,
        )
        .unwrap();
        assert_eq!(plants[0].expf, 100.0);
        assert_eq!(report, ThinReport::default());
    }

    #[test]
    fn test_sdi_mortality_uniform() {
        let tables = ModelTables::builtin().unwrap();
        let mut shrub = Plant::new(1, 3, "CECU", 13);
        shrub.expf = 400.0;
        let mut plants = vec![make_tree(1, 1, 4.0, 100.0), make_tree(2, 12, 8.0, 40.0), shrub];
        let mut report = ThinReport::default();
        thin_plot(
            &tables,
            &mut plants,
            &ThinType::SdiMortality { proportion: 0.25 },
            &mut report,
        )
        .unwrap();
        assert_approx_eq!(plants[0].expf, 75.0, 1e-12);
        assert_approx_eq!(plants[1].expf, 30.0, 1e-12);
        assert_eq!(plants[2].expf, 400.0);
    }

    #[test]
    fn test_invalid_parameters_rejected() {
        let tables = ModelTables::builtin().unwrap();
        let mut plants = vec![make_tree(1, 1, 4.0, 100.0)];
        let mut report = ThinReport::default();
        for thin in [
            ThinType::SdiMortality { proportion: 1.5 },
            ThinType::ProportionalAll { target_expf: -1.0 },
            ThinType::FromBelowAll { remove_expf: -1.0 },
        ] {
            let result = thin_plot(&tables, &mut plants, &thin, &mut report);
            assert!(matches!(result, Err(ConifersError::Thinning(_))));
        }
    }

    #[test]
    fn test_thin_sample_accumulates_across_plots() {
        let tables = ModelTables::builtin().unwrap();
        let mut sample = Sample::new("s");
        sample.plots = vec![Plot::new(1), Plot::new(2)];
        let mut second = make_tree(1, 1, 5.0, 20.0);
        second.plot = 2;
        sample.plants = vec![make_tree(1, 1, 5.0, 20.0), second];
        let report = thin_sample(
            &tables,
            &mut sample,
            &ThinType::FromBelowAll { remove_expf: 5.0 },
        )
        .unwrap();
        assert_eq!(report.plants_removed, 10.0);
        assert!(sample.plants.iter().all(|p| p.expf == 15.0));
    }
}
