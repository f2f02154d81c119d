use tracing::debug;

use super::random::SimRng;
use crate::error::ConifersError;
use crate::models::{Plant, Plot, PlotIndex, Sample};

fn max_plot_id(sample: &Sample) -> u32 {
    sample.plots.iter().map(|p| p.plot).max().unwrap_or(0)
}

/// Append `plot` and its plants to `out` under a new plot id.
fn push_plot(out: &mut Sample, plot: &Plot, plants: &[Plant], new_id: u32) {
    let mut plot = plot.clone();
    plot.plot = new_id;
    out.plots.push(plot);
    out.plants.extend(plants.iter().cloned().map(|mut p| {
        p.plot = new_id;
        p
    }));
}

fn plants_of<'a>(sample: &'a Sample, index: &PlotIndex, plot: u32) -> &'a [Plant] {
    match index.plants_of(plot) {
        Some(range) => &sample.plants[range],
        None => &[],
    }
}

/// Repeat every plot `copies` times.
///
/// Copy `k` shifts plot ids by `k` times the largest id, so ids stay unique
/// and each copy's plants stay contiguous. Per-acre values are unchanged.
pub fn duplicate_plots(sample: &Sample, copies: usize) -> Result<Sample, ConifersError> {
    if copies == 0 {
        return Err(ConifersError::InvalidPlotCount(
            "number of copies must be at least 1".to_string(),
        ));
    }
    let index = PlotIndex::build(&sample.plots, &sample.plants)?;
    let offset = max_plot_id(sample);
    let mut out = Sample::new(sample.name.clone());
    for k in 0..copies as u32 {
        for plot in &sample.plots {
            let plants = plants_of(sample, &index, plot.plot);
            push_plot(&mut out, plot, plants, plot.plot + k * offset);
        }
    }
    debug!(copies, plots = out.num_plots(), "duplicated plots");
    Ok(out)
}

/// Concatenate two samples, shifting `second`'s plot ids past `first`'s.
pub fn combine_samples(first: &Sample, second: &Sample) -> Result<Sample, ConifersError> {
    let index = PlotIndex::build(&second.plots, &second.plants)?;
    let offset = max_plot_id(first);
    let mut out = first.clone();
    for plot in &second.plots {
        let plants = plants_of(second, &index, plot.plot);
        push_plot(&mut out, plot, plants, plot.plot + offset);
    }
    PlotIndex::build(&out.plots, &out.plants)?;
    Ok(out)
}

/// Draw `n` plots with replacement, renumbered `1..=n`.
pub fn bootstrap_plots(sample: &Sample, n: usize, rng: &mut SimRng) -> Result<Sample, ConifersError> {
    if sample.plots.is_empty() {
        return Err(ConifersError::InvalidPlotCount(
            "cannot resample a sample without plots".to_string(),
        ));
    }
    let index = PlotIndex::build(&sample.plots, &sample.plants)?;
    let mut out = Sample::new(sample.name.clone());
    for new_id in 1..=n as u32 {
        let plot = &sample.plots[rng.index(sample.plots.len())];
        push_plot(&mut out, plot, plants_of(sample, &index, plot.plot), new_id);
    }
    Ok(out)
}
