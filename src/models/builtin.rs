//! Default functional species and species tables for southwest Oregon and
//! western Washington plantations.

use super::coefficients::*;
use super::species::Species;

fn conifer(idx: u32, code: &str) -> FunctionalSpecies {
    FunctionalSpecies {
        idx,
        code: code.to_string(),
        plant_type: PlantType::Conifer,
        d6_from_height: PowerCoefficients { b0: 0.22, b1: 1.0 },
        d6_from_dbh: D6FromDbhCoefficients { b0: 0.3, b1: 1.12, b2: 0.005 },
        d12_from_height: PowerCoefficients { b0: 0.2, b1: 1.0 },
        dbh_from_height: DbhFromHeightCoefficients { b0: 0.85, b1: 1.0, b2: 0.6 },
        crown_width: CrownWidthCoefficients { b0: 1.38, b1: 0.6, b2: 0.3 },
        max_crown_width: MaxCrownWidthCoefficients { b0: 4.0, b1: 1.5, b2: -0.005 },
        crown_ratio: CrownRatioCoefficients {
            intercept: -1.2,
            height: 0.012,
            d6: -0.02,
            taller_basal_area: 0.008,
            taller_cover: 0.01,
        },
        height_growth: HeightGrowthCoefficients {
            intercept: -3.46,
            log_site_index: 0.8,
            log_height: 0.25,
            height: -0.01,
            rh_scale: 0.7,
            rh_rate: 4.0,
            taller_cover: -0.005,
            shrub_cover: -0.004,
            log_precip: 0.05,
            water_capacity: 0.02,
            sigma: 0.1,
        },
        diameter_growth: DiameterGrowthCoefficients {
            intercept: -1.8,
            crown_ratio: 0.6,
            larger_basal_area: -0.004,
            shrub_cover: -0.003,
            bound_scale: 0.3,
            bound_exp: 0.35,
        },
        crown_recession: CrownRecessionCoefficients {
            intercept: -2.0,
            crown_ratio: 3.0,
            taller_cover: 0.01,
        },
        mortality: MortalityCoefficients {
            intercept: -5.5,
            crown_ratio: -2.0,
            relative_height: -1.5,
            log_height: 0.2,
        },
        dob: DobCoefficients {
            scale: 0.25,
            height_exp: 1.0,
            crown_exp: 0.3,
            taper_exp: 0.8,
            breast_height: -0.1,
            competition: -0.002,
        },
        site_curve: SiteCurveCoefficients {
            asymptote: 200.0,
            rate: 0.01,
            shape: 1.5,
            base_age: 50.0,
        },
        cover_transition: CoverTransitionCoefficients::default(),
        climate: ClimateCoefficients {
            precip: 0.01,
            precip_ref: 8.0,
            temp: 0.02,
            temp_ref: 58.0,
            outside_limits: 0.8,
        },
    }
}

fn hardwood(idx: u32, code: &str) -> FunctionalSpecies {
    let base = conifer(idx, code);
    FunctionalSpecies {
        plant_type: PlantType::Hardwood,
        d6_from_height: PowerCoefficients { b0: 0.25, b1: 1.0 },
        crown_width: CrownWidthCoefficients { b0: 1.8, b1: 0.6, b2: 0.3 },
        max_crown_width: MaxCrownWidthCoefficients { b0: 5.0, b1: 1.8, b2: -0.008 },
        height_growth: HeightGrowthCoefficients {
            intercept: -3.6,
            height: -0.012,
            ..base.height_growth
        },
        mortality: MortalityCoefficients {
            intercept: -5.2,
            ..base.mortality
        },
        site_curve: SiteCurveCoefficients {
            asymptote: 130.0,
            rate: 0.015,
            ..base.site_curve
        },
        ..base
    }
}

fn shrub(idx: u32, code: &str) -> FunctionalSpecies {
    let base = conifer(idx, code);
    FunctionalSpecies {
        plant_type: PlantType::Shrub,
        d6_from_height: PowerCoefficients { b0: 0.15, b1: 1.0 },
        crown_width: CrownWidthCoefficients { b0: 1.5, b1: 0.5, b2: 0.4 },
        height_growth: HeightGrowthCoefficients {
            intercept: -4.0,
            log_height: 0.1,
            height: -0.05,
            ..base.height_growth
        },
        cover_transition: CoverTransitionCoefficients {
            intercept: 2.0,
            plantation_age: -0.05,
            years_since_thin: 0.1,
            growth_intercept: 0.3,
            log_cover: 0.95,
        },
        mortality: MortalityCoefficients {
            intercept: -4.5,
            ..base.mortality
        },
        ..base
    }
}

fn forb(idx: u32, code: &str) -> FunctionalSpecies {
    let base = shrub(idx, code);
    FunctionalSpecies {
        plant_type: PlantType::Forb,
        d6_from_height: PowerCoefficients { b0: 0.05, b1: 1.0 },
        crown_width: CrownWidthCoefficients { b0: 1.0, b1: 0.5, b2: 0.4 },
        height_growth: HeightGrowthCoefficients {
            intercept: -5.0,
            height: -0.3,
            ..base.height_growth
        },
        ..base
    }
}

fn non_stocked(idx: u32, code: &str) -> FunctionalSpecies {
    FunctionalSpecies {
        plant_type: PlantType::NonStocked,
        d6_from_height: PowerCoefficients::default(),
        d6_from_dbh: D6FromDbhCoefficients::default(),
        d12_from_height: PowerCoefficients::default(),
        dbh_from_height: DbhFromHeightCoefficients::default(),
        crown_width: CrownWidthCoefficients::default(),
        max_crown_width: MaxCrownWidthCoefficients::default(),
        crown_ratio: CrownRatioCoefficients::default(),
        height_growth: HeightGrowthCoefficients::default(),
        diameter_growth: DiameterGrowthCoefficients::default(),
        crown_recession: CrownRecessionCoefficients::default(),
        mortality: MortalityCoefficients::default(),
        dob: DobCoefficients::default(),
        site_curve: SiteCurveCoefficients::default(),
        cover_transition: CoverTransitionCoefficients::default(),
        climate: ClimateCoefficients::default(),
        ..conifer(idx, code)
    }
}

/// Built-in functional species, dense from index 0.
pub fn functional_species() -> Vec<FunctionalSpecies> {
    let mut gf = conifer(1, "GF");
    gf.height_growth.intercept = -3.5;
    let mut pp = conifer(2, "PP");
    pp.height_growth.intercept = -3.55;
    pp.crown_width.b0 = 1.3;
    let mut ic = conifer(3, "IC");
    ic.height_growth.intercept = -3.6;
    let mut wh = conifer(4, "WH");
    wh.height_growth.intercept = -3.48;
    wh.crown_recession.intercept = -2.4;
    let mut ra = hardwood(8, "RA");
    ra.height_growth.intercept = -3.3;

    vec![
        conifer(0, "DF"),
        gf,
        pp,
        ic,
        wh,
        hardwood(5, "TO"),
        hardwood(6, "MA"),
        hardwood(7, "BM"),
        ra,
        shrub(9, "SHRUB"),
        forb(10, "FORB"),
        non_stocked(11, "NS"),
    ]
}

#[allow(clippy::too_many_arguments)]
fn species(
    idx: u32,
    fsp_idx: u32,
    code: &str,
    common_name: &str,
    genus: &str,
    epithet: &str,
    organon_code: u32,
    fvs_code: &str,
    max_sdi: f64,
    endemic_mortality: f64,
) -> Species {
    Species {
        idx,
        fsp_idx,
        code: code.to_string(),
        common_name: common_name.to_string(),
        genus: genus.to_string(),
        species: epithet.to_string(),
        organon_code,
        cactos_code: organon_code,
        fvs_code: fvs_code.to_string(),
        endemic_mortality,
        max_sdi,
        browse_damage: 0.0,
        mechanical_damage: 0.0,
        genetic_worth_h: 0.0,
        genetic_worth_d: 0.0,
        min_temp: 35.0,
        max_temp: 65.0,
        min_precip: 15.0,
        max_precip: 150.0,
    }
}

/// Built-in species codes mapped onto [`functional_species`].
pub fn species_list() -> Vec<Species> {
    vec![
        species(1, 0, "DF", "Douglas-fir", "Pseudotsuga", "menziesii", 202, "DF", 595.0, 0.002),
        species(2, 1, "GF", "grand fir", "Abies", "grandis", 17, "GF", 560.0, 0.002),
        species(3, 1, "WF", "white fir", "Abies", "concolor", 15, "WF", 560.0, 0.002),
        species(4, 2, "PP", "ponderosa pine", "Pinus", "ponderosa", 122, "PP", 450.0, 0.002),
        species(5, 2, "SP", "sugar pine", "Pinus", "lambertiana", 117, "SP", 450.0, 0.002),
        species(6, 3, "IC", "incense-cedar", "Calocedrus", "decurrens", 81, "IC", 600.0, 0.002),
        species(7, 4, "WH", "western hemlock", "Tsuga", "heterophylla", 263, "WH", 800.0, 0.002),
        species(8, 4, "RC", "western redcedar", "Thuja", "plicata", 242, "RC", 800.0, 0.002),
        species(9, 5, "TO", "tanoak", "Notholithocarpus", "densiflorus", 631, "TO", 500.0, 0.003),
        species(10, 6, "MA", "Pacific madrone", "Arbutus", "menziesii", 361, "MA", 400.0, 0.003),
        species(11, 7, "BM", "bigleaf maple", "Acer", "macrophyllum", 312, "BM", 400.0, 0.003),
        species(12, 8, "RA", "red alder", "Alnus", "rubra", 351, "RA", 450.0, 0.004),
        species(13, 9, "CECU", "buckbrush", "Ceanothus", "cuneatus", 0, "", 0.0, 0.005),
        species(14, 9, "ARPA", "greenleaf manzanita", "Arctostaphylos", "patula", 0, "", 0.0, 0.005),
        species(15, 9, "RUSP", "salmonberry", "Rubus", "spectabilis", 0, "", 0.0, 0.005),
        species(16, 10, "FORB", "forbs", "", "", 0, "", 0.0, 0.0),
        species(17, 11, "NS", "non-stocked", "", "", 0, "", 0.0, 0.0),
    ]
}
