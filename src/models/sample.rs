use std::collections::HashMap;
use std::ops::Range;

use serde::{Deserialize, Serialize};

use super::{Plant, Plot};
use crate::error::ConifersError;

/// The plant and plot arrays the simulator reads and writes.
///
/// Plants must be grouped by plot id; [`Sample::sort_plants`] establishes
/// that grouping.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Sample {
    /// Name or identifier for this sample
    pub name: String,
    pub plots: Vec<Plot>,
    pub plants: Vec<Plant>,
}

impl Sample {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            plots: Vec::new(),
            plants: Vec::new(),
        }
    }

    pub fn num_plots(&self) -> usize {
        self.plots.len()
    }

    pub fn num_plants(&self) -> usize {
        self.plants.len()
    }

    /// Stable sort of plants by plot id, then plots by id.
    pub fn sort_plants(&mut self) {
        self.plants.sort_by_key(|p| p.plot);
        self.plots.sort_by_key(|p| p.plot);
    }

    /// Total count of set error bits across every plant.
    pub fn error_count(&self) -> usize {
        self.plants.iter().map(|p| p.errors.count() as usize).sum()
    }

    /// Mean trees per acre across plots, from the last statistics pass.
    pub fn mean_tpa(&self) -> f64 {
        self.mean_of(|p| p.stats.tree_expf)
    }

    /// Mean basal area per acre across plots, from the last statistics pass.
    pub fn mean_basal_area(&self) -> f64 {
        self.mean_of(|p| p.stats.basal_area)
    }

    fn mean_of(&self, f: impl Fn(&Plot) -> f64) -> f64 {
        if self.plots.is_empty() {
            return 0.0;
        }
        self.plots.iter().map(f).sum::<f64>() / self.plots.len() as f64
    }
}

/// Maps each plot id to its contiguous range of plants and its plot position.
#[derive(Debug, Clone, Default)]
pub struct PlotIndex {
    ranges: Vec<(usize, Range<usize>)>,
    by_plot: HashMap<u32, usize>,
}

impl PlotIndex {
    /// Build the index.
    ///
    /// Fails if a plot id's plants are not contiguous or a plant names a
    /// plot that is not in `plots`.
    pub fn build(plots: &[Plot], plants: &[Plant]) -> Result<Self, ConifersError> {
        let plot_pos: HashMap<u32, usize> = plots
            .iter()
            .enumerate()
            .map(|(i, p)| (p.plot, i))
            .collect();
        if plot_pos.len() != plots.len() {
            return Err(ConifersError::InvalidPlotCount(
                "plot ids must be unique".to_string(),
            ));
        }

        let mut ranges = Vec::new();
        let mut by_plot = HashMap::new();
        let mut start = 0;
        while start < plants.len() {
            let id = plants[start].plot;
            let end = start
                + plants[start..]
                    .iter()
                    .take_while(|p| p.plot == id)
                    .count();
            let pos = *plot_pos.get(&id).ok_or(ConifersError::MissingPlot {
                plot: id,
                plant: plants[start].plant,
            })?;
            if by_plot.insert(id, ranges.len()).is_some() {
                return Err(ConifersError::PlantsNotGrouped(id));
            }
            ranges.push((pos, start..end));
            start = end;
        }
        Ok(Self { ranges, by_plot })
    }

    /// `(plot position, plant range)` pairs in plant order.
    pub fn ranges(&self) -> &[(usize, Range<usize>)] {
        &self.ranges
    }

    /// Plant range of a plot id, if it has any plants.
    pub fn plants_of(&self, plot: u32) -> Option<Range<usize>> {
        self.by_plot
            .get(&plot)
            .map(|&i| self.ranges[i].1.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plant(plot: u32, id: u32) -> Plant {
        Plant::new(plot, id, "DF", 1)
    }

    #[test]
    fn test_index_contiguous() {
        let plots = vec![Plot::new(1), Plot::new(2), Plot::new(3)];
        let plants = vec![plant(2, 1), plant(2, 2), plant(1, 1), plant(3, 1)];
        let index = PlotIndex::build(&plots, &plants).unwrap();
        assert_eq!(index.plants_of(2), Some(0..2));
        assert_eq!(index.plants_of(1), Some(2..3));
        assert_eq!(index.ranges()[0].0, 1);
        assert_eq!(index.ranges().len(), 3);
    }

    #[test]
    fn test_index_rejects_split_plot() {
        let plots = vec![Plot::new(1), Plot::new(2)];
        let plants = vec![plant(1, 1), plant(2, 1), plant(1, 2)];
        let err = PlotIndex::build(&plots, &plants).unwrap_err();
        assert!(matches!(err, ConifersError::PlantsNotGrouped(1)));
    }

    #[test]
    fn test_index_rejects_missing_plot() {
        let plots = vec![Plot::new(1)];
        let plants = vec![plant(1, 1), plant(9, 4)];
        let err = PlotIndex::build(&plots, &plants).unwrap_err();
        assert!(matches!(err, ConifersError::MissingPlot { plot: 9, plant: 4 }));
    }

    #[test]
    fn test_index_rejects_duplicate_plot_ids() {
        let plots = vec![Plot::new(1), Plot::new(1)];
        assert!(PlotIndex::build(&plots, &[]).is_err());
    }

    #[test]
    fn test_plot_without_plants() {
        let plots = vec![Plot::new(1), Plot::new(2)];
        let plants = vec![plant(1, 1)];
        let index = PlotIndex::build(&plots, &plants).unwrap();
        assert!(index.plants_of(2).is_none());
    }

    #[test]
    fn test_sort_plants_groups_by_plot() {
        let mut sample = Sample::new("s");
        sample.plots = vec![Plot::new(2), Plot::new(1)];
        sample.plants = vec![plant(1, 1), plant(2, 1), plant(1, 2)];
        sample.sort_plants();
        assert!(PlotIndex::build(&sample.plots, &sample.plants).is_ok());
        assert_eq!(sample.plants[1].plant, 2);
        assert_eq!(sample.plots[0].plot, 1);
    }

    #[test]
    fn test_empty_sample_means() {
        let sample = Sample::new("Empty");
        assert_eq!(sample.mean_tpa(), 0.0);
        assert_eq!(sample.mean_basal_area(), 0.0);
        assert_eq!(sample.error_count(), 0);
    }
}
