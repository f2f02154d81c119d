use serde::{Deserialize, Serialize};

use super::coefficients::PlantType;

/// Number of bins in each competition table.
pub const AIT_SIZE: usize = 500;

/// Height bin width (feet) of the `bait`/`cait` tables.
pub const AIT_BIN_RES: f64 = 0.5;

/// Diameter bin width (inches) of the `bal` table.
pub const BAL_BIN_RES: f64 = 0.2;

/// Cumulative-from-the-top sums binned by height or diameter, one array per
/// plant type.
///
/// After [`TypedBins::finalize`], entry `i` holds the total of every plant
/// whose own bin is at or above `i`, so each array is non-increasing.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedBins {
    resolution: f64,
    pub conifer: Vec<f64>,
    pub hardwood: Vec<f64>,
    pub shrub: Vec<f64>,
    pub forb: Vec<f64>,
}

impl TypedBins {
    pub fn new(resolution: f64) -> Self {
        Self {
            resolution,
            conifer: vec![0.0; AIT_SIZE],
            hardwood: vec![0.0; AIT_SIZE],
            shrub: vec![0.0; AIT_SIZE],
            forb: vec![0.0; AIT_SIZE],
        }
    }

    pub fn resolution(&self) -> f64 {
        self.resolution
    }

    /// Bin index for a height or diameter: floor division clamped to the last bin.
    pub fn bin(&self, x: f64) -> usize {
        if x <= 0.0 {
            return 0;
        }
        ((x / self.resolution).floor() as usize).min(AIT_SIZE - 1)
    }

    fn array_mut(&mut self, plant_type: PlantType) -> Option<&mut Vec<f64>> {
        match plant_type {
            PlantType::Conifer => Some(&mut self.conifer),
            PlantType::Hardwood => Some(&mut self.hardwood),
            PlantType::Shrub => Some(&mut self.shrub),
            PlantType::Forb => Some(&mut self.forb),
            PlantType::NonStocked => None,
        }
    }

    pub fn array(&self, plant_type: PlantType) -> Option<&[f64]> {
        match plant_type {
            PlantType::Conifer => Some(&self.conifer),
            PlantType::Hardwood => Some(&self.hardwood),
            PlantType::Shrub => Some(&self.shrub),
            PlantType::Forb => Some(&self.forb),
            PlantType::NonStocked => None,
        }
    }

    /// Record `amount` in the bin containing `x`. Call [`finalize`](Self::finalize) afterwards.
    pub fn add(&mut self, plant_type: PlantType, x: f64, amount: f64) {
        let bin = self.bin(x);
        if let Some(arr) = self.array_mut(plant_type) {
            arr[bin] += amount;
        }
    }

    /// Turn per-bin totals into suffix sums from the top bin down.
    pub fn finalize(&mut self) {
        for v in [&mut self.conifer, &mut self.hardwood, &mut self.shrub, &mut self.forb] {
            for i in (0..AIT_SIZE - 1).rev() {
                v[i] += v[i + 1];
            }
        }
    }

    fn interpolate(arr: &[f64], resolution: f64, x: f64) -> f64 {
        let pos = (x / resolution).max(0.0);
        let lo = (pos.floor() as usize).min(AIT_SIZE - 1);
        if lo + 1 >= AIT_SIZE {
            return arr[lo];
        }
        let frac = pos - lo as f64;
        arr[lo] * (1.0 - frac) + arr[lo + 1] * frac
    }

    /// Interpolated cumulative value of one plant type at `x`.
    pub fn at(&self, plant_type: PlantType, x: f64) -> f64 {
        self.array(plant_type)
            .map(|arr| Self::interpolate(arr, self.resolution, x))
            .unwrap_or(0.0)
    }

    /// Conifer plus hardwood at `x`.
    pub fn trees_at(&self, x: f64) -> f64 {
        self.at(PlantType::Conifer, x) + self.at(PlantType::Hardwood, x)
    }

    /// All plant types at `x`.
    pub fn total_at(&self, x: f64) -> f64 {
        self.trees_at(x) + self.at(PlantType::Shrub, x) + self.at(PlantType::Forb, x)
    }
}

/// Monthly climate normals for a plot (January first).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonthlyClimate {
    /// Precipitation, inches.
    pub precip: [f64; 12],
    /// Mean temperature, degrees F.
    pub temp: [f64; 12],
}

impl MonthlyClimate {
    const GROWING_SEASON: std::ops::Range<usize> = 3..9;

    /// April through September precipitation total.
    pub fn growing_season_precip(&self) -> f64 {
        self.precip[Self::GROWING_SEASON].iter().sum()
    }

    /// April through September mean temperature.
    pub fn growing_season_temp(&self) -> f64 {
        self.temp[Self::GROWING_SEASON].iter().sum::<f64>() / 6.0
    }

    pub fn annual_precip(&self) -> f64 {
        self.precip.iter().sum()
    }

    pub fn annual_temp(&self) -> f64 {
        self.temp.iter().sum::<f64>() / 12.0
    }
}

/// Derived per-plot aggregates, rebuilt from scratch on every statistics pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotAggregates {
    /// Stems per acre of all stocked plants.
    pub expf: f64,
    pub tree_expf: f64,
    /// Trees per acre with a diameter at breast height.
    pub bh_expf: f64,
    pub shrub_expf: f64,
    pub forb_expf: f64,
    /// Tree basal area at breast height, sq ft/ac.
    pub basal_area: f64,
    pub con_ba: f64,
    pub hw_ba: f64,
    /// Basal area at 6 inches over every stocked plant, sq ft/ac.
    pub d6_area: f64,
    pub crown_area: f64,
    pub con_ca: f64,
    pub hw_ca: f64,
    pub shrub_ca: f64,
    pub forb_ca: f64,
    pub shrub_pct_cover: f64,
    pub forb_pct_cover: f64,
    pub qmd: f64,
    pub d6_qmd: f64,
    pub sdi: f64,
    pub max_sdi: f64,
    pub ccf: f64,
    pub top_height: f64,
    /// Basal area at 6 inches in taller plants, binned by height.
    #[serde(skip, default = "height_bins")]
    pub bait: TypedBins,
    /// Crown area in taller plants, binned by height.
    #[serde(skip, default = "height_bins")]
    pub cait: TypedBins,
    /// Basal area at breast height in larger trees, binned by dbh.
    #[serde(skip, default = "diameter_bins")]
    pub bal: TypedBins,
}

fn height_bins() -> TypedBins {
    TypedBins::new(AIT_BIN_RES)
}

fn diameter_bins() -> TypedBins {
    TypedBins::new(BAL_BIN_RES)
}

impl Default for PlotAggregates {
    fn default() -> Self {
        Self {
            expf: 0.0,
            tree_expf: 0.0,
            bh_expf: 0.0,
            shrub_expf: 0.0,
            forb_expf: 0.0,
            basal_area: 0.0,
            con_ba: 0.0,
            hw_ba: 0.0,
            d6_area: 0.0,
            crown_area: 0.0,
            con_ca: 0.0,
            hw_ca: 0.0,
            shrub_ca: 0.0,
            forb_ca: 0.0,
            shrub_pct_cover: 0.0,
            forb_pct_cover: 0.0,
            qmd: 0.0,
            d6_qmd: 0.0,
            sdi: 0.0,
            max_sdi: 0.0,
            ccf: 0.0,
            top_height: 0.0,
            bait: height_bins(),
            cait: height_bins(),
            bal: diameter_bins(),
        }
    }
}

impl PlotAggregates {
    /// Zero every scalar and table.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn relative_density(&self) -> f64 {
        if self.max_sdi <= 0.0 {
            return 0.0;
        }
        self.sdi / self.max_sdi
    }

    /// Percent cover of crowns taller than `tht`.
    pub fn taller_cover_pct(&self, tht: f64) -> f64 {
        self.cait.total_at(tht) / super::coefficients::SQ_FT_PER_ACRE * 100.0
    }
}

/// A sample plot: site descriptors plus aggregates derived from its plants.
///
/// Plots own no plants; plants reference their plot by `plot` id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Plot {
    /// Unique plot identifier
    pub plot: u32,
    pub latitude: f64,
    pub longitude: f64,
    /// Elevation in feet
    pub elevation: f64,
    /// Slope percentage
    pub slope: f64,
    /// Aspect in degrees (0-360)
    pub aspect: f64,
    /// Available water capacity, inches
    pub water_capacity: f64,
    /// Mean annual precipitation, inches
    pub mean_annual_precip: f64,
    /// Conifer site index, feet at base age 50
    pub site_index: f64,
    /// Hardwood site index, feet at base age 50
    pub site_index_hw: f64,
    #[serde(default)]
    pub climate: Option<MonthlyClimate>,

    /// Hann-Wang trajectory origin carried between cycles.
    #[serde(default)]
    pub x0: f64,
    /// Relative density at the end of the previous cycle.
    #[serde(default)]
    pub last_relative_density: Option<f64>,

    #[serde(default)]
    pub stats: PlotAggregates,
}

impl Plot {
    pub fn new(plot: u32) -> Self {
        Self {
            plot,
            ..Self::default()
        }
    }

    /// Site index appropriate for a plant type.
    pub fn site_index_for(&self, plant_type: PlantType) -> f64 {
        if plant_type == PlantType::Hardwood && self.site_index_hw > 0.0 {
            self.site_index_hw
        } else {
            self.site_index
        }
    }

    /// Height relative to the plot top height, clamped to [0, 1].
    pub fn relative_height(&self, tht: f64) -> f64 {
        if self.stats.top_height <= 0.0 {
            return 1.0;
        }
        (tht / self.stats.top_height).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_bin_floor_and_clamp() {
        let bins = TypedBins::new(AIT_BIN_RES);
        assert_eq!(bins.bin(0.0), 0);
        assert_eq!(bins.bin(0.49), 0);
        assert_eq!(bins.bin(0.5), 1);
        assert_eq!(bins.bin(10.2), 20);
        assert_eq!(bins.bin(10_000.0), AIT_SIZE - 1);
    }

    #[test]
    fn test_finalize_is_suffix_sum() {
        let mut bins = TypedBins::new(1.0);
        bins.add(PlantType::Conifer, 10.0, 5.0);
        bins.add(PlantType::Conifer, 20.0, 3.0);
        bins.finalize();
        assert_eq!(bins.conifer[0], 8.0);
        assert_eq!(bins.conifer[10], 8.0);
        assert_eq!(bins.conifer[11], 3.0);
        assert_eq!(bins.conifer[20], 3.0);
        assert_eq!(bins.conifer[21], 0.0);
    }

    #[test]
    fn test_interpolation_between_bins() {
        let mut bins = TypedBins::new(1.0);
        bins.add(PlantType::Hardwood, 10.0, 4.0);
        bins.finalize();
        // Bin 10 holds 4, bin 11 holds 0; halfway is 2.
        assert_approx_eq!(bins.at(PlantType::Hardwood, 10.5), 2.0, 1e-12);
        assert_approx_eq!(bins.trees_at(10.25), 3.0, 1e-12);
    }

    #[test]
    fn test_non_stocked_is_ignored() {
        let mut bins = TypedBins::new(1.0);
        bins.add(PlantType::NonStocked, 10.0, 4.0);
        bins.finalize();
        assert_eq!(bins.total_at(0.0), 0.0);
        assert_eq!(bins.at(PlantType::NonStocked, 0.0), 0.0);
    }

    #[test]
    fn test_clear_resets_tables() {
        let mut agg = PlotAggregates::default();
        agg.sdi = 100.0;
        agg.bait.add(PlantType::Conifer, 5.0, 1.0);
        agg.clear();
        assert_eq!(agg.sdi, 0.0);
        assert!(agg.bait.conifer.iter().all(|v| *v == 0.0));
        assert_eq!(agg.bait.conifer.len(), AIT_SIZE);
        assert_eq!(agg.bal.resolution(), BAL_BIN_RES);
    }

    #[test]
    fn test_climate_growing_season() {
        let climate = MonthlyClimate {
            precip: [6.0, 5.0, 4.0, 3.0, 2.0, 1.0, 0.5, 0.5, 1.0, 3.0, 5.0, 6.0],
            temp: [40.0, 42.0, 45.0, 50.0, 55.0, 60.0, 66.0, 66.0, 61.0, 52.0, 45.0, 40.0],
        };
        assert_approx_eq!(climate.growing_season_precip(), 8.0, 1e-12);
        assert_approx_eq!(climate.growing_season_temp(), 59.666666, 1e-5);
        assert_approx_eq!(climate.annual_precip(), 37.0, 1e-12);
    }

    #[test]
    fn test_site_index_for_hardwood() {
        let mut plot = Plot::new(1);
        plot.site_index = 120.0;
        assert_eq!(plot.site_index_for(PlantType::Hardwood), 120.0);
        plot.site_index_hw = 90.0;
        assert_eq!(plot.site_index_for(PlantType::Hardwood), 90.0);
        assert_eq!(plot.site_index_for(PlantType::Conifer), 120.0);
    }

    #[test]
    fn test_relative_height() {
        let mut plot = Plot::new(1);
        assert_eq!(plot.relative_height(20.0), 1.0);
        plot.stats.top_height = 80.0;
        assert_approx_eq!(plot.relative_height(20.0), 0.25, 1e-12);
        assert_eq!(plot.relative_height(120.0), 1.0);
    }

    #[test]
    fn test_plot_json_skips_tables() {
        let mut plot = Plot::new(4);
        plot.stats.bait.add(PlantType::Conifer, 5.0, 1.0);
        let json = serde_json::to_string(&plot).unwrap();
        assert!(!json.contains("bait"));
        let back: Plot = serde_json::from_str(&json).unwrap();
        assert_eq!(back.plot, 4);
        assert_eq!(back.stats.bait.conifer.len(), AIT_SIZE);
    }
}
