use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, StudentsT};
use statrs::statistics::Statistics;

use super::competition::{is_active, quadratic_mean_diameter, stand_density_index};
use crate::error::ConifersError;
use crate::models::{ModelTables, Sample, SummaryKey, SummaryRecord};

#[derive(Default)]
struct Accumulator {
    code: String,
    count: usize,
    expf: f64,
    bh_expf: f64,
    dbh: Vec<f64>,
    height: Vec<f64>,
    weighted_dbh: f64,
    weighted_height: f64,
    basal_area: f64,
    d6_area: f64,
    crown_area: f64,
}

impl Accumulator {
    fn finish(self, plots: f64) -> SummaryRecord {
        let tpa = self.bh_expf / plots;
        let basal_area = self.basal_area / plots;
        let qmd = quadratic_mean_diameter(basal_area, tpa);
        let weighted = |sum: f64| if self.expf > 0.0 { sum / self.expf } else { 0.0 };
        SummaryRecord {
            count: self.count,
            expf: self.expf / plots,
            min_dbh: Statistics::min(&self.dbh),
            mean_dbh: weighted(self.weighted_dbh),
            max_dbh: Statistics::max(&self.dbh),
            min_height: Statistics::min(&self.height),
            mean_height: weighted(self.weighted_height),
            max_height: Statistics::max(&self.height),
            basal_area,
            d6_area: self.d6_area / plots,
            crown_area: self.crown_area / plots,
            qmd,
            sdi: stand_density_index(tpa, qmd),
            code: self.code,
        }
    }
}

/// Per-acre summaries of the stocked plants of a sample, grouped by `key`.
///
/// Species and functional-species records are averaged over every plot in
/// the sample; plot records describe their own plot. Records come back
/// ordered by species idx, functional species idx, or plot id.
pub fn build_summaries(
    tables: &ModelTables,
    sample: &Sample,
    key: SummaryKey,
) -> Result<Vec<SummaryRecord>, ConifersError> {
    let mut groups: BTreeMap<u32, Accumulator> = BTreeMap::new();
    for plant in &sample.plants {
        let (species, fsp) = tables.resolve(plant.sp_idx)?;
        if !is_active(plant, fsp.plant_type) {
            continue;
        }
        let (id, code) = match key {
            SummaryKey::Species => (species.idx, species.code.clone()),
            SummaryKey::FunctionalSpecies => (fsp.idx, fsp.code.clone()),
            SummaryKey::Plot => (plant.plot, plant.plot.to_string()),
        };
        let acc = groups.entry(id).or_insert_with(|| Accumulator {
            code,
            ..Accumulator::default()
        });
        acc.count += 1;
        acc.expf += plant.expf;
        acc.dbh.push(plant.dbh);
        acc.height.push(plant.tht);
        acc.weighted_dbh += plant.dbh * plant.expf;
        acc.weighted_height += plant.tht * plant.expf;
        if fsp.plant_type.is_tree() && plant.dbh > 0.0 {
            acc.bh_expf += plant.expf;
            acc.basal_area += plant.basal_area * plant.expf;
        }
        acc.d6_area += plant.d6_area * plant.expf;
        acc.crown_area += plant.crown_area * plant.expf;
    }

    let plots = match key {
        SummaryKey::Plot => 1.0,
        _ => sample.plots.len().max(1) as f64,
    };
    Ok(groups.into_values().map(|acc| acc.finish(plots)).collect())
}

/// Student-t interval on the stand mean of a per-acre plot value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    pub mean: f64,
    pub std_error: f64,
    /// Never below zero; stand values are non-negative.
    pub lower: f64,
    pub upper: f64,
    pub confidence_level: f64,
    /// Number of plots.
    pub sample_size: usize,
    /// Half-width of the interval as a percent of the mean.
    pub sampling_error_percent: f64,
}

impl ConfidenceInterval {
    /// Interval from one value per plot, each plot an independent
    /// observation of the stand.
    pub fn across_plots(per_plot: &[f64], confidence: f64) -> Result<Self, ConifersError> {
        let plots = per_plot.len();
        if plots < 2 {
            return Err(ConifersError::InvalidPlotCount(format!(
                "a stand interval needs at least 2 plots, got {plots}"
            )));
        }
        if !(0.0..1.0).contains(&confidence) {
            return Err(ConifersError::InvalidInputValue(format!(
                "confidence must be in [0, 1), got {confidence}"
            )));
        }

        let stand_mean = per_plot.mean();
        let std_error = per_plot.std_dev() / (plots as f64).sqrt();
        let t = StudentsT::new(0.0, 1.0, (plots - 1) as f64)
            .map_err(|e| ConifersError::InvalidInputValue(e.to_string()))?
            .inverse_cdf(0.5 + confidence / 2.0);
        let half_width = t * std_error;

        Ok(Self {
            mean: stand_mean,
            std_error,
            lower: (stand_mean - half_width).max(0.0),
            upper: stand_mean + half_width,
            confidence_level: confidence,
            sample_size: plots,
            sampling_error_percent: if stand_mean > 0.0 {
                half_width / stand_mean * 100.0
            } else {
                0.0
            },
        })
    }
}

/// Between-plot sampling statistics from the last statistics pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplingStatistics {
    pub tpa: ConfidenceInterval,
    pub basal_area: ConfidenceInterval,
    pub sdi: ConfidenceInterval,
    pub top_height: ConfidenceInterval,
}

impl SamplingStatistics {
    /// Intervals for stems, basal area, SDI and top height at `confidence`
    /// (e.g. 0.95).
    pub fn compute(sample: &Sample, confidence: f64) -> Result<Self, ConifersError> {
        let per_plot = |f: fn(&crate::models::PlotAggregates) -> f64| {
            let values: Vec<f64> = sample.plots.iter().map(|p| f(&p.stats)).collect();
            ConfidenceInterval::across_plots(&values, confidence)
        };
        Ok(SamplingStatistics {
            tpa: per_plot(|s| s.tree_expf)?,
            basal_area: per_plot(|s| s.basal_area)?,
            sdi: per_plot(|s| s.sdi)?,
            top_height: per_plot(|s| s.top_height)?,
        })
    }
}
