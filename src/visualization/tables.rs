use colored::Colorize;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Cell, ContentArrangement, Table};

use crate::engine::{SamplingStatistics, ThinReport, YearSummary};
use crate::models::{Sample, SummaryKey, SummaryRecord};

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

fn title(output: &mut String, text: &str, width: usize) {
    output.push_str(&format!("\n{}\n", text.bold().green()));
    output.push_str(&format!("{}\n", "=".repeat(width)));
}

/// Format a year-by-year projection trace as a string.
pub fn format_projection_table(trace: &[YearSummary]) -> String {
    let mut output = String::new();
    title(&mut output, "Projection", 60);

    let mut table = new_table(vec![
        "Year", "TPA", "BA/ac", "QMD", "SDI", "Top Ht", "Shrub %", "SDI Mort.",
    ]);
    for year in trace {
        table.add_row(vec![
            Cell::new(format!("{}", year.year)),
            Cell::new(format!("{:.1}", year.tpa)),
            Cell::new(format!("{:.1}", year.basal_area)),
            Cell::new(format!("{:.1}", year.qmd)),
            Cell::new(format!("{:.0}", year.sdi)),
            Cell::new(format!("{:.1}", year.top_height)),
            Cell::new(format!("{:.1}", year.shrub_pct_cover)),
            Cell::new(format!("{:.1}", year.sdi_mortality)),
        ]);
    }

    output.push_str(&format!("{table}"));
    output
}

/// Print a year-by-year projection trace.
pub fn print_projection_table(trace: &[YearSummary]) {
    print!("{}", format_projection_table(trace));
}

/// Format per-acre summary records as a string.
pub fn format_summary_table(records: &[SummaryRecord], key: SummaryKey) -> String {
    let mut output = String::new();
    let (heading, column) = match key {
        SummaryKey::Species => ("Species Summary", "Species"),
        SummaryKey::FunctionalSpecies => ("Functional Species Summary", "Group"),
        SummaryKey::Plot => ("Plot Summary", "Plot"),
    };
    title(&mut output, heading, 70);

    let mut table = new_table(vec![
        column, "Records", "Stems/ac", "DBH (min/mean/max)", "Ht (min/mean/max)", "BA/ac",
        "Crown/ac", "QMD", "SDI",
    ]);
    for r in records {
        table.add_row(vec![
            Cell::new(&r.code),
            Cell::new(format!("{}", r.count)),
            Cell::new(format!("{:.1}", r.expf)),
            Cell::new(format!("{:.1}/{:.1}/{:.1}", r.min_dbh, r.mean_dbh, r.max_dbh)),
            Cell::new(format!(
                "{:.1}/{:.1}/{:.1}",
                r.min_height, r.mean_height, r.max_height
            )),
            Cell::new(format!("{:.1}", r.basal_area)),
            Cell::new(format!("{:.0}", r.crown_area)),
            Cell::new(format!("{:.1}", r.qmd)),
            Cell::new(format!("{:.0}", r.sdi)),
        ]);
    }

    output.push_str(&format!("{table}"));
    output
}

/// Print per-acre summary records.
pub fn print_summary_table(records: &[SummaryRecord], key: SummaryKey) {
    print!("{}", format_summary_table(records, key));
}

/// Format sampling statistics table as a string.
pub fn format_statistics_table(stats: &SamplingStatistics) -> String {
    let mut output = String::new();
    output.push_str(&format!("\n{}\n", "Sampling Statistics".bold().green()));
    output.push_str(&format!(
        "{}\n",
        format!(
            "Confidence Level: {:.0}% | Sample Size: {} plots",
            stats.tpa.confidence_level * 100.0,
            stats.tpa.sample_size
        )
        .dimmed()
    ));
    output.push_str(&format!("{}\n", "=".repeat(70)));

    let mut table = new_table(vec![
        "Metric",
        "Mean",
        "Std Error",
        "Lower CI",
        "Upper CI",
        "Samp. Error %",
    ]);
    let metrics = [
        ("TPA", &stats.tpa),
        ("Basal Area (sq ft/ac)", &stats.basal_area),
        ("SDI", &stats.sdi),
        ("Top Height (ft)", &stats.top_height),
    ];
    for (name, ci) in &metrics {
        table.add_row(vec![
            Cell::new(name),
            Cell::new(format!("{:.1}", ci.mean)),
            Cell::new(format!("{:.2}", ci.std_error)),
            Cell::new(format!("{:.1}", ci.lower)),
            Cell::new(format!("{:.1}", ci.upper)),
            Cell::new(format!("{:.1}%", ci.sampling_error_percent)),
        ]);
    }

    output.push_str(&format!("{table}"));
    output
}

/// Print sampling statistics table with confidence intervals.
pub fn print_statistics_table(stats: &SamplingStatistics) {
    print!("{}", format_statistics_table(stats));
}

/// Format the plants left with error bits after imputation or projection.
pub fn format_error_report(sample: &Sample) -> String {
    let mut output = String::new();
    title(&mut output, "Plant Errors", 50);

    let flagged: Vec<_> = sample.plants.iter().filter(|p| !p.errors.is_empty()).collect();
    if flagged.is_empty() {
        output.push_str(&format!("{}\n", "No plant errors.".green()));
        return output;
    }

    let mut table = new_table(vec!["Plot", "Plant", "Species", "Errors"]);
    for p in &flagged {
        table.add_row(vec![
            Cell::new(format!("{}", p.plot)),
            Cell::new(format!("{}", p.plant)),
            Cell::new(&p.sp_code),
            Cell::new(format!("{}", p.errors)),
        ]);
    }
    output.push_str(&format!("{table}\n"));
    output.push_str(&format!(
        "{}\n",
        format!("{} of {} plants flagged", flagged.len(), sample.num_plants()).yellow()
    ));
    output
}

/// Print the plant error report.
pub fn print_error_report(sample: &Sample) {
    print!("{}", format_error_report(sample));
}

/// Format a thinning report as a string.
pub fn format_thin_report(report: &ThinReport) -> String {
    let mut output = String::new();
    title(&mut output, "Thinning", 50);

    let mut table = new_table(vec!["Metric", "Value", "Unit"]);
    table.add_row(vec![
        Cell::new("Stems Removed"),
        Cell::new(format!("{:.1}", report.plants_removed)),
        Cell::new("stems (sum of plots)"),
    ]);
    table.add_row(vec![
        Cell::new("Basal Area Removed"),
        Cell::new(format!("{:.2}", report.ba_removed)),
        Cell::new("sq ft at 6 in (sum of plots)"),
    ]);

    output.push_str(&format!("{table}"));
    output
}

/// Print a thinning report.
pub fn print_thin_report(report: &ThinReport) {
    print!("{}", format_thin_report(report));
}
