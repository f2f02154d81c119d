use assert_approx_eq::assert_approx_eq;
use proptest::prelude::*;

use conifers::{
    engine::{
        build_summaries, calc_hann_wang_x0, calc_init_x0, calc_plot_stats, calc_sdi_mortality,
        combine_samples, duplicate_plots, thin_plot, SimRng, ThinReport,
    },
    io,
    models::{
        crown_area_from_width, crown_width_from_area, PlantErrors, PlantType, SummaryKey,
        MAX_SHRUB_CROWN_AREA, MAX_TREE_CROWN_AREA,
    },
    variants::{project_plant, GrowthContext},
    ConifersError, ModelTables, Plant, Plot, Sample, SimulationConfig, Simulator, ThinType,
    Variant,
};

fn make_plot(id: u32) -> Plot {
    let mut plot = Plot::new(id);
    plot.site_index = 115.0;
    plot.site_index_hw = 85.0;
    plot.water_capacity = 7.0;
    plot.mean_annual_precip = 55.0;
    plot
}

fn measured(plot: u32, id: u32, code: &str, sp_idx: u32, dbh: f64, tht: f64) -> Plant {
    let mut p = Plant::new(plot, id, code, sp_idx);
    p.dbh = dbh;
    p.tht = tht;
    p
}

fn create_test_sample() -> Sample {
    let mut sample = Sample::new("Integration");
    for id in 1..=3 {
        sample.plots.push(make_plot(id));
        let k = id as f64;
        sample.plants.extend([
            measured(id, 1, "DF", 1, 10.0 + k, 60.0 + 5.0 * k),
            measured(id, 2, "PP", 4, 6.0 + k, 40.0 + 3.0 * k),
            measured(id, 3, "RA", 12, 4.0, 30.0),
            measured(id, 4, "DF", 1, 0.05, 3.5),
        ]);
        let mut shrub = Plant::new(id, 5, "CECU", 13);
        shrub.tht = 4.0;
        shrub.pct_cover = 10.0 * k;
        sample.plants.push(shrub);
    }
    sample
}

fn builtin() -> ModelTables {
    ModelTables::builtin().unwrap()
}

fn fsp_position(tables: &ModelTables, sp_idx: u32) -> usize {
    let fsp_idx = tables.resolve(sp_idx).unwrap().1.idx;
    tables
        .coefficients
        .functional_species
        .iter()
        .position(|f| f.idx == fsp_idx)
        .unwrap()
}

// ============================================================================
// Imputation
// ============================================================================

#[test]
fn test_impute_fills_sample() {
    let sim = Simulator::new(builtin(), SimulationConfig::default()).unwrap();
    let mut sample = create_test_sample();
    sim.impute(&mut sample).unwrap();
    assert_eq!(sample.error_count(), 0);
    for p in &sample.plants {
        assert!(p.expf > 0.0, "plant {} on plot {}", p.plant, p.plot);
        assert!(p.d6 > 0.0 && p.crown_width > 0.0 && p.pct_cover > 0.0);
    }
    assert!(sample.plots.iter().all(|p| p.stats.basal_area > 0.0));
}

#[test]
fn test_scenario_a_crown_area_clamped() {
    let mut tables = builtin();
    for sp_idx in [1, 13] {
        let pos = fsp_position(&tables, sp_idx);
        let cw = &mut tables.coefficients.functional_species[pos].crown_width;
        cw.b0 = 10.0;
        cw.b1 = 0.0;
        cw.b2 = 0.0;
    }
    let sim = Simulator::new(tables, SimulationConfig::default()).unwrap();
    let mut sample = Sample::new("clamp");
    sample.plots.push(make_plot(1));
    let mut shrub = Plant::new(1, 2, "CECU", 13);
    shrub.tht = 3.0;
    sample.plants = vec![measured(1, 1, "DF", 1, 20.0, 100.0), shrub];
    sim.impute(&mut sample).unwrap();

    assert_eq!(sample.plants[0].crown_area, MAX_TREE_CROWN_AREA);
    assert_eq!(sample.plants[1].crown_area, MAX_SHRUB_CROWN_AREA);
    assert_approx_eq!(
        sample.plants[0].crown_width,
        crown_width_from_area(MAX_TREE_CROWN_AREA),
        1e-12
    );
}

#[test]
fn test_scenario_c_fixed_radius_expf() {
    let mut config = SimulationConfig::default();
    config.impute.fixed_plot_radius = 7.78;
    let sim = Simulator::new(builtin(), config).unwrap();
    let mut sample = Sample::new("fixed");
    sample.plots.push(make_plot(1));
    sample.plants.push(measured(1, 1, "DF", 1, 0.0, 3.0));
    sim.impute(&mut sample).unwrap();
    let expected = 43560.0 / (std::f64::consts::PI * 7.78 * 7.78);
    assert_approx_eq!(sample.plants[0].expf, expected, 1e-9);
}

#[test]
fn test_impute_is_idempotent_for_every_variant() {
    for variant in Variant::ALL {
        let config = SimulationConfig {
            variant,
            ..SimulationConfig::default()
        };
        let sim = Simulator::new(builtin(), config).unwrap();
        let mut sample = create_test_sample();
        sim.impute(&mut sample).unwrap();
        let once = sample.plants.clone();
        sim.impute(&mut sample).unwrap();
        assert_eq!(sample.plants, once, "{variant}");
    }
}

#[test]
fn test_impute_reports_unfilled_plants() {
    let sim = Simulator::new(builtin(), SimulationConfig::default()).unwrap();
    let mut sample = create_test_sample();
    sample.plants[0].tht = 0.0;
    sample.plants[1].sp_idx = 99;
    let err = sim.impute(&mut sample).unwrap_err();
    assert!(matches!(err, ConifersError::FillValues { count: 2 }));
    assert!(sample.plants[0].errors.contains(PlantErrors::INVALID_HEIGHT));
    assert!(sample.plants[1].errors.contains(PlantErrors::INVALID_SPECIES));
    // The rest of the sample was still filled.
    assert!(sample.plants[2].expf > 0.0);
}

#[test]
fn test_crown_area_round_trip() {
    for cw in [0.5, 3.0, 12.0, 47.3, 60.0] {
        assert_approx_eq!(crown_width_from_area(crown_area_from_width(cw)), cw, 1e-12);
    }
}

// ============================================================================
// Projection
// ============================================================================

#[test]
fn test_non_stocked_and_zero_expf_never_grow() {
    let tables = builtin();
    let config = SimulationConfig::default();
    let plot = make_plot(1);
    let mut rng = SimRng::seeded(5);
    for variant in Variant::ALL {
        for (sp_idx, expf) in [(17, 100.0), (1, 0.0)] {
            let (species, fsp) = tables.resolve(sp_idx).unwrap();
            let ctx = GrowthContext {
                plot: &plot,
                species,
                fsp,
                config: &config,
                year: 1,
                plantation_age: 10.0,
                years_since_thin: 0.0,
            };
            let mut p = measured(1, 1, &species.code, sp_idx, 8.0, 40.0);
            p.d6 = 9.0;
            p.cr = 0.5;
            p.crown_width = 10.0;
            p.expf = expf;
            project_plant(variant.model(), &ctx, &mut p, &mut rng).unwrap();
            assert!(!p.has_growth(), "{variant} grew species {sp_idx}");
        }
    }
}

#[test]
fn test_projection_is_monotone_in_size() {
    for variant in Variant::ALL {
        let config = SimulationConfig {
            variant,
            seed: Some(42),
            ..SimulationConfig::default()
        };
        let mut sim = Simulator::new(builtin(), config).unwrap();
        let mut sample = create_test_sample();
        sim.impute(&mut sample).unwrap();
        let before = sample.plants.clone();
        sim.project(&mut sample, 5).unwrap();
        for (b, a) in before.iter().zip(&sample.plants) {
            assert!(a.tht >= b.tht, "{variant}: height shrank");
            assert!(a.d6 >= b.d6, "{variant}: d6 shrank");
            assert!(a.dbh >= b.dbh, "{variant}: dbh shrank");
            assert!(a.expf <= b.expf, "{variant}: expf grew");
            assert!((0.0..=1.0).contains(&a.cr));
        }
    }
}

#[test]
fn test_project_trace_and_summaries() {
    let config = SimulationConfig {
        seed: Some(1),
        ..SimulationConfig::default()
    };
    let mut sim = Simulator::new(builtin(), config).unwrap();
    let mut sample = create_test_sample();
    sim.impute(&mut sample).unwrap();
    let trace = sim.project(&mut sample, 4).unwrap();
    let years: Vec<u32> = trace.iter().map(|y| y.year).collect();
    assert_eq!(years, vec![1, 2, 3, 4]);
    assert!(trace[3].top_height > trace[0].top_height);

    let species = build_summaries(sim.tables(), &sample, SummaryKey::Species).unwrap();
    let codes: Vec<&str> = species.iter().map(|r| r.code.as_str()).collect();
    assert_eq!(codes, vec!["DF", "PP", "RA", "CECU"]);
    let plots = build_summaries(sim.tables(), &sample, SummaryKey::Plot).unwrap();
    assert_eq!(plots.len(), 3);
    let mean_expf: f64 = plots.iter().map(|r| r.expf).sum::<f64>() / 3.0;
    let total: f64 = species.iter().map(|r| r.expf).sum();
    assert_approx_eq!(mean_expf, total, 1e-9);
}

// ============================================================================
// Mortality and thinning
// ============================================================================

#[test]
fn test_scenario_b_sdi_threshold() {
    let x0 = calc_init_x0(8.0, 600.0).unwrap();
    // Relative density just below 0.60: nothing dies however far off trajectory.
    assert_eq!(calc_sdi_mortality(10.0, 0.599 * 500.0, 500.0, x0, 500.0).unwrap(), 0.0);
    // At the threshold the stand is returned to its trajectory.
    let p = calc_sdi_mortality(10.0, 0.6 * 500.0, 500.0, x0, 500.0).unwrap();
    assert!(p > 0.0 && p < 1.0);
    let survivors = 500.0 * (1.0 - p);
    assert_approx_eq!((x0 - 0.62305 * survivors.ln()).exp(), 10.0, 1e-6);
}

#[test]
fn test_hann_wang_state_machine() {
    let fresh = calc_hann_wang_x0(8.0, 400.0, Some(0.4), 0.7, 0.0).unwrap();
    assert!(fresh > 0.0);
    assert_eq!(calc_hann_wang_x0(9.0, 380.0, Some(0.7), 0.75, fresh).unwrap(), fresh);
    assert_eq!(calc_hann_wang_x0(9.0, 380.0, Some(0.7), 0.5, fresh).unwrap(), 0.0);
    assert!(calc_hann_wang_x0(9.0, 380.0, Some(0.7), 0.75, 0.0).is_err());
}

#[test]
fn test_scenario_d_thin_from_below() {
    let tables = builtin();
    let mut plants: Vec<Plant> = [(4.0, 10.0), (6.0, 20.0), (8.0, 30.0)]
        .into_iter()
        .enumerate()
        .map(|(i, (dbh, expf))| {
            let mut p = measured(1, i as u32 + 1, "DF", 1, dbh, 10.0 * dbh);
            p.d6 = dbh + 1.0;
            p.expf = expf;
            p.refresh_areas();
            p
        })
        .collect();
    let mut report = ThinReport::default();
    thin_plot(
        &tables,
        &mut plants,
        &ThinType::FromBelowAll { remove_expf: 35.0 },
        &mut report,
    )
    .unwrap();
    let expf: Vec<f64> = plants.iter().map(|p| p.expf).collect();
    assert_eq!(expf, vec![0.0, 0.0, 25.0]);
    assert_eq!(report.plants_removed, 35.0);
}

#[test]
fn test_thin_one_species_proportionally() {
    let mut sim = Simulator::new(builtin(), SimulationConfig::default()).unwrap();
    let mut sample = create_test_sample();
    sim.impute(&mut sample).unwrap();
    let pp_before: Vec<f64> = sample.plants.iter().filter(|p| p.sp_idx == 4).map(|p| p.expf).collect();
    let df_before: Vec<f64> = sample.plants.iter().filter(|p| p.sp_idx == 1).map(|p| p.expf).collect();
    sim.thin(
        &mut sample,
        &ThinType::ProportionalSpecies { sp_idx: 4, target_expf: 1.0 },
    )
    .unwrap();
    let pp_after: Vec<f64> = sample.plants.iter().filter(|p| p.sp_idx == 4).map(|p| p.expf).collect();
    let df_after: Vec<f64> = sample.plants.iter().filter(|p| p.sp_idx == 1).map(|p| p.expf).collect();
    assert_eq!(df_before, df_after);
    for (b, a) in pp_before.iter().zip(&pp_after) {
        if *b > 1.0 {
            assert_approx_eq!(*a, 1.0, 1e-9);
        }
    }
}

// ============================================================================
// Sampling and I/O
// ============================================================================

#[test]
fn test_duplicate_and_combine_keep_index_valid() {
    let tables = builtin();
    let sample = create_test_sample();
    let doubled = duplicate_plots(&sample, 2).unwrap();
    let mut combined = combine_samples(&sample, &doubled).unwrap();
    assert_eq!(combined.num_plots(), 9);
    assert_eq!(combined.num_plants(), 45);
    calc_plot_stats(&tables, &mut combined.plots, &combined.plants).unwrap();
}

#[test]
fn test_csv_to_json_conversion() {
    let mut tables = builtin();
    let dir = tempfile::tempdir().unwrap();
    let csv_path = dir.path().join("plants.csv");
    let json_path = dir.path().join("plants.json");

    io::write_csv(&create_test_sample(), &csv_path).unwrap();
    let from_csv = io::read_csv(&csv_path, &mut tables.species).unwrap();
    io::write_json(&from_csv, &json_path, false).unwrap();
    let from_json = io::read_json(&json_path).unwrap();

    assert_eq!(from_json.plants, from_csv.plants);
    assert_eq!(from_json.num_plots(), 3);
    assert_eq!(from_json.plots[2].site_index, 115.0);
}

// ============================================================================
// Property tests
// ============================================================================

proptest! {
    #[test]
    fn species_table_stays_sorted_for_each_lookup(ops in prop::collection::vec((any::<bool>(), 0usize..17), 1..40)) {
        let mut table = builtin().species;
        let reference: Vec<(u32, String)> = table
            .as_slice()
            .iter()
            .map(|s| (s.idx, s.code.clone()))
            .collect();
        for (by_code, i) in ops {
            let (idx, code) = &reference[i];
            if by_code {
                let found = table.lookup_by_code(code).map(|s| s.idx);
                prop_assert_eq!(found, Some(*idx));
                prop_assert!(table.is_sorted_by_code());
            } else {
                let found = table.lookup_by_idx(*idx).map(|s| s.code.clone());
                prop_assert_eq!(found.as_ref(), Some(code));
                prop_assert!(table.is_sorted_by_idx());
            }
        }
    }

    #[test]
    fn competition_tables_are_non_increasing(
        plants in prop::collection::vec(
            (prop::sample::select(vec![1u32, 4, 12, 13, 16]), 0.5f64..150.0, 0.0f64..40.0, 1.0f64..400.0),
            1..30,
        )
    ) {
        let tables = builtin();
        let mut plots = vec![Plot::new(1)];
        let plants: Vec<Plant> = plants
            .into_iter()
            .enumerate()
            .map(|(i, (sp_idx, tht, dbh, expf))| {
                let mut p = Plant::new(1, i as u32, "X", sp_idx);
                p.tht = tht;
                p.dbh = dbh;
                p.d6 = dbh * 1.2 + 0.3;
                p.crown_width = 2.0 + dbh / 2.0;
                p.expf = expf;
                p.refresh_areas();
                p
            })
            .collect();
        calc_plot_stats(&tables, &mut plots, &plants).unwrap();
        let stats = &plots[0].stats;
        for bins in [&stats.bait, &stats.cait, &stats.bal] {
            for pt in [PlantType::Conifer, PlantType::Hardwood, PlantType::Shrub, PlantType::Forb] {
                let arr = bins.array(pt).unwrap();
                prop_assert!(arr.windows(2).all(|w| w[0] >= w[1]));
            }
        }
    }
}
