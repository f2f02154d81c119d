#![no_main]

use conifers::engine::{build_summaries, Simulator};
use conifers::models::SummaryKey;
use conifers::{ModelTables, SimulationConfig};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(mut tables) = ModelTables::builtin() else {
        return;
    };
    let Ok(mut sample) = conifers::io::read_csv_from_bytes(data, "fuzz", &mut tables.species) else {
        return;
    };
    let Ok(sim) = Simulator::new(tables, SimulationConfig::default()) else {
        return;
    };
    // Imputation may flag plants but must never panic.
    let _ = sim.impute(&mut sample);
    let _ = build_summaries(sim.tables(), &sample, SummaryKey::Species);
});
