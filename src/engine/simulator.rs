use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::competition::{calc_plot_stats, quadratic_mean_diameter};
use super::impute::impute;
use super::mortality::{calc_hann_wang_x0, calc_sdi_mortality_within, MAX_SDI_ITERATIONS};
use super::random::SimRng;
use super::thinning::{thin_plot, thin_sample, ThinReport, ThinType};
use crate::config::SimulationConfig;
use crate::error::ConifersError;
use crate::models::{ModelTables, PlantErrors, PlotIndex, Sample};
use crate::variants::{project_plant, GrowthContext};

/// Stand means at the end of one projection year.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct YearSummary {
    pub year: u32,
    /// Trees per acre.
    pub tpa: f64,
    /// Breast-height basal area, sq ft/ac.
    pub basal_area: f64,
    pub qmd: f64,
    pub sdi: f64,
    pub top_height: f64,
    pub shrub_pct_cover: f64,
    /// Trees per acre removed by density-dependent mortality this year.
    pub sdi_mortality: f64,
    /// Plants carrying at least one error bit.
    pub plants_with_errors: usize,
}

/// Drives imputation, annual projection, mortality and thinning for one
/// sample with one set of tables and run flags.
#[derive(Debug, Clone)]
pub struct Simulator {
    tables: ModelTables,
    config: SimulationConfig,
    rng: SimRng,
    year: u32,
    plantation_age: f64,
    years_since_thin: f64,
    sdi_iterations: usize,
}

impl Simulator {
    pub fn new(tables: ModelTables, config: SimulationConfig) -> Result<Self, ConifersError> {
        config.validate()?;
        Ok(Self {
            rng: SimRng::from_seed_option(config.seed),
            year: 0,
            plantation_age: config.plantation_age,
            years_since_thin: config.years_since_thin,
            sdi_iterations: MAX_SDI_ITERATIONS,
            tables,
            config,
        })
    }

    pub fn tables(&self) -> &ModelTables {
        &self.tables
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Number of years projected so far.
    pub fn year(&self) -> u32 {
        self.year
    }

    pub fn plantation_age(&self) -> f64 {
        self.plantation_age
    }

    pub fn years_since_thin(&self) -> f64 {
        self.years_since_thin
    }

    /// Fill missing plant dimensions with the configured variant.
    pub fn impute(&self, sample: &mut Sample) -> Result<(), ConifersError> {
        impute(
            &self.tables,
            self.config.variant.model(),
            &self.config.impute,
            sample,
        )
    }

    /// Rebuild every plot's aggregates.
    pub fn calc_stats(&self, sample: &mut Sample) -> Result<PlotIndex, ConifersError> {
        calc_plot_stats(&self.tables, &mut sample.plots, &sample.plants)
    }

    /// Stand means from the last statistics pass.
    pub fn snapshot(&self, sample: &Sample) -> YearSummary {
        let n = sample.num_plots().max(1) as f64;
        let mean = |f: fn(&crate::models::PlotAggregates) -> f64| {
            sample.plots.iter().map(|p| f(&p.stats)).sum::<f64>() / n
        };
        let basal_area = mean(|s| s.basal_area);
        YearSummary {
            year: self.year,
            tpa: mean(|s| s.tree_expf),
            basal_area,
            qmd: quadratic_mean_diameter(basal_area, mean(|s| s.bh_expf)),
            sdi: mean(|s| s.sdi),
            top_height: mean(|s| s.top_height),
            shrub_pct_cover: mean(|s| s.shrub_pct_cover),
            sdi_mortality: 0.0,
            plants_with_errors: sample.plants.iter().filter(|p| !p.errors.is_empty()).count(),
        }
    }

    /// Grow every plant one year, apply density-dependent mortality and
    /// re-aggregate.
    ///
    /// Plants must be grouped by plot. A failure on one plant or plot does
    /// not stop the year: the plant gets no growth, the plot gets no SDI
    /// mortality (or loses every tree when the SDI search fails), the
    /// counters still advance, and the first error is returned.
    pub fn project_year(&mut self, sample: &mut Sample) -> Result<YearSummary, ConifersError> {
        if sample.plants.is_empty() {
            return Err(ConifersError::InvalidPlantCount(format!(
                "sample '{}' has no plants to project",
                sample.name
            )));
        }
        let index = self.calc_stats(sample)?;
        let model = self.config.variant.model();
        let year = self.year + 1;
        let mut failure = None;

        for (pos, range) in index.ranges() {
            let plot = &sample.plots[*pos];
            for plant in &mut sample.plants[range.clone()] {
                if plant.errors.contains(PlantErrors::INVALID_SPECIES) {
                    plant.reset_growth();
                    continue;
                }
                let (species, fsp) = match self.tables.resolve(plant.sp_idx) {
                    Ok(found) => found,
                    Err(e) => {
                        warn!(plot = plant.plot, plant = plant.plant, error = %e, "species lookup failed, no growth");
                        plant.reset_growth();
                        plant.errors.insert(PlantErrors::INVALID_SPECIES);
                        failure.get_or_insert(e);
                        continue;
                    }
                };
                let ctx = GrowthContext {
                    plot,
                    species,
                    fsp,
                    config: &self.config,
                    year,
                    plantation_age: self.plantation_age,
                    years_since_thin: self.years_since_thin,
                };
                if let Err(e) = project_plant(model, &ctx, plant, &mut self.rng) {
                    warn!(plot = plant.plot, plant = plant.plant, error = %e, "projection failed, no growth");
                    plant.reset_growth();
                    failure.get_or_insert(e);
                }
            }
        }
        for plant in sample.plants.iter_mut() {
            plant.apply_growth();
        }
        let index = self.calc_stats(sample)?;

        let mut removed = ThinReport::default();
        if self.config.use_sdi_mortality {
            for (pos, range) in index.ranges() {
                let plot = &mut sample.plots[*pos];
                let stats = &plot.stats;
                let rd = stats.relative_density();
                let proportion = match calc_hann_wang_x0(
                    stats.qmd,
                    stats.bh_expf,
                    plot.last_relative_density,
                    rd,
                    plot.x0,
                ) {
                    Ok(x0) => {
                        plot.x0 = x0;
                        match calc_sdi_mortality_within(
                            stats.qmd,
                            stats.sdi,
                            stats.max_sdi,
                            x0,
                            stats.bh_expf,
                            self.sdi_iterations,
                        ) {
                            Ok(p) => p,
                            Err(e) => {
                                warn!(plot = plot.plot, error = %e, "SDI mortality failed, removing every tree");
                                failure.get_or_insert(e);
                                1.0
                            }
                        }
                    }
                    Err(e) => {
                        warn!(plot = plot.plot, error = %e, "no mortality trajectory, skipping SDI mortality");
                        failure.get_or_insert(e);
                        0.0
                    }
                };
                plot.last_relative_density = Some(rd);
                if proportion > 0.0 {
                    if let Err(e) = thin_plot(
                        &self.tables,
                        &mut sample.plants[range.clone()],
                        &ThinType::SdiMortality { proportion },
                        &mut removed,
                    ) {
                        failure.get_or_insert(e);
                    }
                }
            }
            if removed.plants_removed > 0.0 {
                self.calc_stats(sample)?;
            }
        }

        self.year = year;
        self.plantation_age += 1.0;
        self.years_since_thin += 1.0;

        let mut summary = self.snapshot(sample);
        summary.sdi_mortality = removed.plants_removed / sample.num_plots().max(1) as f64;
        info!(
            year,
            tpa = summary.tpa,
            basal_area = summary.basal_area,
            top_height = summary.top_height,
            sdi = summary.sdi,
            "projected year"
        );

        match failure {
            Some(e) => Err(e),
            None => Ok(summary),
        }
    }

    /// Project `years` years, returning one summary per year.
    pub fn project(&mut self, sample: &mut Sample, years: u32) -> Result<Vec<YearSummary>, ConifersError> {
        let mut trace = Vec::with_capacity(years as usize);
        for _ in 0..years {
            trace.push(self.project_year(sample)?);
        }
        Ok(trace)
    }

    /// Thin every plot, restart the years-since-thin clock and re-aggregate.
    pub fn thin(&mut self, sample: &mut Sample, thin: &ThinType) -> Result<ThinReport, ConifersError> {
        let report = thin_sample(&self.tables, sample, thin)?;
        self.years_since_thin = 0.0;
        self.calc_stats(sample)?;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Plant, Plot};
    use crate::variants::Variant;

    fn make_sample() -> Sample {
        let mut s = Sample::new("sim");
        for id in 1..=2 {
            let mut plot = Plot::new(id);
            plot.site_index = 120.0;
            plot.site_index_hw = 90.0;
            plot.water_capacity = 8.0;
            plot.mean_annual_precip = 60.0;
            s.plots.push(plot);
            for (k, (tht, dbh)) in [(40.0, 6.0), (55.0, 9.0), (25.0, 3.0)].into_iter().enumerate() {
                let mut p = Plant::new(id, k as u32 + 1, "DF", 1);
                p.tht = tht;
                p.dbh = dbh;
                p.cr = 0.6;
                p.expf = 60.0;
                s.plants.push(p);
            }
            let mut shrub = Plant::new(id, 10, "CECU", 13);
            shrub.tht = 3.0;
            shrub.crown_width = 4.0;
            s.plants.push(shrub);
        }
        s
    }

    fn config(variant: Variant) -> SimulationConfig {
        SimulationConfig {
            variant,
            seed: Some(11),
            ..SimulationConfig::default()
        }
    }

    #[test]
    fn test_project_grows_every_variant() {
        for variant in Variant::ALL {
            let mut sim = Simulator::new(ModelTables::builtin().unwrap(), config(variant)).unwrap();
            let mut sample = make_sample();
            sim.impute(&mut sample).unwrap();
            sim.calc_stats(&mut sample).unwrap();
            let start = sim.snapshot(&sample);
            let trace = sim.project(&mut sample, 3).unwrap();
            assert_eq!(trace.len(), 3);
            assert_eq!(trace[2].year, 3);
            assert_eq!(sim.year(), 3);
            assert!(trace[2].top_height > start.top_height, "{variant} did not grow");
            assert!(trace[2].tpa <= start.tpa);
            assert!(sample.plants.iter().all(|p| p.tht >= 0.0 && (0.0..=1.0).contains(&p.cr)));
        }
    }

    #[test]
    fn test_seeded_runs_are_reproducible() {
        let mut cfg = config(Variant::Swo);
        cfg.use_rand_err = true;
        let run = || {
            let mut sim = Simulator::new(ModelTables::builtin().unwrap(), cfg.clone()).unwrap();
            let mut sample = make_sample();
            sim.impute(&mut sample).unwrap();
            sim.project(&mut sample, 2).unwrap();
            sample.plants
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_counters_advance_and_thin_resets() {
        let mut sim = Simulator::new(ModelTables::builtin().unwrap(), config(Variant::Smc)).unwrap();
        let mut sample = make_sample();
        sim.impute(&mut sample).unwrap();
        sim.project(&mut sample, 2).unwrap();
        assert_eq!(sim.plantation_age(), 17.0);
        assert_eq!(sim.years_since_thin(), 2.0);
        let report = sim
            .thin(&mut sample, &ThinType::FromBelowAll { remove_expf: 10.0 })
            .unwrap();
        assert!(report.plants_removed > 0.0);
        assert_eq!(sim.years_since_thin(), 0.0);
    }

    #[test]
    fn test_sdi_mortality_removes_trees_in_dense_stand() {
        let mut cfg = config(Variant::Swo);
        cfg.use_endemic_mortality = false;
        let mut sim = Simulator::new(ModelTables::builtin().unwrap(), cfg).unwrap();
        let mut sample = make_sample();
        for p in sample.plants.iter_mut().filter(|p| p.sp_idx == 1) {
            p.expf = 900.0;
        }
        sim.impute(&mut sample).unwrap();
        // Seed each plot's trajectory as if it crossed the threshold a
        // year earlier at a smaller qmd.
        sim.calc_stats(&mut sample).unwrap();
        for plot in sample.plots.iter_mut() {
            assert!(plot.stats.relative_density() >= 0.6);
            plot.last_relative_density = Some(0.9);
            plot.x0 = super::super::mortality::calc_init_x0(plot.stats.qmd * 0.8, plot.stats.bh_expf)
                .unwrap();
        }
        let summary = sim.project_year(&mut sample).unwrap();
        assert!(summary.sdi_mortality > 0.0);
    }

    /// Dense sample whose plots already sit above the mortality threshold.
    fn dense_sample(sim: &Simulator) -> Sample {
        let mut sample = make_sample();
        for p in sample.plants.iter_mut().filter(|p| p.sp_idx == 1) {
            p.expf = 900.0;
        }
        sim.impute(&mut sample).unwrap();
        sim.calc_stats(&mut sample).unwrap();
        sample
    }

    #[test]
    fn test_missing_trajectory_still_completes_year() {
        let mut cfg = config(Variant::Swo);
        cfg.use_endemic_mortality = false;
        let mut sim = Simulator::new(ModelTables::builtin().unwrap(), cfg).unwrap();
        let mut sample = dense_sample(&sim);
        for plot in sample.plots.iter_mut() {
            plot.last_relative_density = Some(0.9);
            plot.x0 = 0.0;
        }
        let heights: Vec<f64> = sample.plants.iter().map(|p| p.tht).collect();
        let expfs: Vec<f64> = sample.plants.iter().map(|p| p.expf).collect();

        let result = sim.project_year(&mut sample);
        assert!(matches!(result, Err(ConifersError::Mortality(_))));
        assert_eq!(sim.year(), 1);
        assert_eq!(sim.plantation_age(), 16.0);
        assert_eq!(sim.years_since_thin(), 1.0);
        // Growth applied once, no SDI mortality on the failed plots.
        assert!(sample.plants.iter().zip(&heights).any(|(p, h)| p.tht > *h));
        for (p, e) in sample.plants.iter().zip(&expfs) {
            assert_eq!(p.expf, *e);
        }

        // The next year fails the same way but keeps counting.
        let before: Vec<f64> = sample.plants.iter().map(|p| p.tht).collect();
        assert!(sim.project_year(&mut sample).is_err());
        assert_eq!(sim.year(), 2);
        assert!(sample.plants.iter().zip(&before).all(|(p, h)| p.tht >= *h));
    }

    #[test]
    fn test_failed_sdi_search_removes_every_tree() {
        let mut cfg = config(Variant::Swo);
        cfg.use_endemic_mortality = false;
        let mut sim = Simulator::new(ModelTables::builtin().unwrap(), cfg).unwrap();
        let mut sample = dense_sample(&sim);
        for plot in sample.plots.iter_mut() {
            plot.last_relative_density = Some(0.9);
            plot.x0 = super::super::mortality::calc_init_x0(plot.stats.qmd * 0.8, plot.stats.bh_expf)
                .unwrap();
        }
        sim.sdi_iterations = 0;

        let result = sim.project_year(&mut sample);
        assert!(matches!(result, Err(ConifersError::Mortality(_))));
        assert_eq!(sim.year(), 1);
        let trees: Vec<_> = sample.plants.iter().filter(|p| p.sp_idx == 1).collect();
        assert!(!trees.is_empty());
        assert!(trees.iter().all(|p| p.expf == 0.0));
        assert!(sample.plots.iter().all(|p| p.stats.tree_expf == 0.0));
    }

    #[test]
    fn test_empty_sample_rejected() {
        let mut sim = Simulator::new(ModelTables::builtin().unwrap(), config(Variant::Swo)).unwrap();
        let mut sample = Sample::new("empty");
        sample.plots.push(Plot::new(1));
        assert!(matches!(
            sim.impute(&mut sample),
            Err(ConifersError::InvalidPlantCount(_))
        ));
        assert!(matches!(
            sim.project_year(&mut sample),
            Err(ConifersError::InvalidPlantCount(_))
        ));
        assert_eq!(sim.year(), 0);
    }

    #[test]
    fn test_ungrouped_plants_rejected() {
        let mut sim = Simulator::new(ModelTables::builtin().unwrap(), config(Variant::Swo)).unwrap();
        let mut sample = make_sample();
        sim.impute(&mut sample).unwrap();
        sample.plants.swap(0, 5);
        assert!(matches!(
            sim.project_year(&mut sample),
            Err(ConifersError::PlantsNotGrouped(_))
        ));
    }
}
