use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use conifers::{
    engine::{build_summaries, SamplingStatistics},
    io,
    models::SummaryKey,
    visualization::{
        print_error_report, print_projection_table, print_statistics_table, print_summary_table,
        print_thin_report,
    },
    ConifersError, ModelTables, Sample, SimulationConfig, Simulator, ThinType, Variant,
};

#[derive(Parser)]
#[command(
    name = "conifers",
    about = "Individual-plant stand growth simulator",
    version,
    author
)]
struct Cli {
    /// Species and coefficient tables (JSON); built-in tables when omitted
    #[arg(long, global = true)]
    tables: Option<PathBuf>,

    /// Run configuration (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log engine progress (repeat for more detail)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fill missing plant dimensions and report plants that could not be filled
    Impute {
        /// Path to input file (CSV or JSON)
        #[arg(short, long)]
        input: PathBuf,

        /// Write the imputed sample here
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Impute, then project stand growth year by year
    Project {
        /// Path to input file (CSV or JSON)
        #[arg(short, long)]
        input: PathBuf,

        /// Number of years to project
        #[arg(short, long, default_value = "10")]
        years: u32,

        /// Growth variant: SWO, SMC, SWOHYBRID, or CIPS
        #[arg(long)]
        variant: Option<Variant>,

        /// RNG seed for reproducible runs
        #[arg(long)]
        seed: Option<u64>,

        /// Write the projected sample here
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Impute, then thin every plot
    Thin {
        /// Path to input file (CSV or JSON)
        #[arg(short, long)]
        input: PathBuf,

        /// Thinning policy: sdi, proportional, or below
        #[arg(short, long)]
        policy: String,

        /// Proportion removed (sdi), residual stems/ac (proportional) or stems/ac removed (below)
        #[arg(short, long)]
        amount: f64,

        /// Limit thinning to one species code
        #[arg(short, long)]
        species: Option<String>,

        /// Write the thinned sample here
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Impute, then summarize the stand by species, functional species, or plot
    Summary {
        /// Path to input file (CSV or JSON)
        #[arg(short, long)]
        input: PathBuf,

        /// Grouping: species, fsp, or plot
        #[arg(short, long, default_value = "species")]
        by: SummaryKey,

        /// Confidence level for sampling statistics (0.0-1.0)
        #[arg(long, default_value = "0.95")]
        confidence: f64,
    },

    /// Convert a sample between formats
    Convert {
        /// Input file path
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = if verbose > 0 {
        EnvFilter::new(level)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_tables(path: Option<&Path>) -> Result<ModelTables> {
    match path {
        Some(p) => io::read_tables_json(p)
            .with_context(|| format!("failed to load tables from {}", p.display())),
        None => Ok(ModelTables::builtin()?),
    }
}

fn load_config(path: Option<&Path>) -> Result<SimulationConfig> {
    match path {
        Some(p) => SimulationConfig::load(p)
            .with_context(|| format!("failed to load config from {}", p.display())),
        None => Ok(SimulationConfig::default()),
    }
}

fn load_sample(path: &Path, tables: &mut ModelTables) -> Result<Sample> {
    let (reader, _) = io::format_for(path)?;
    let sample = reader
        .read(path, &mut tables.species)
        .with_context(|| format!("failed to read {}", path.display()))?;
    println!(
        "  Loaded {} plots with {} plants",
        sample.num_plots(),
        sample.num_plants()
    );
    Ok(sample)
}

fn save_sample(sample: &Sample, path: &Path) -> Result<()> {
    let (_, writer) = io::format_for(path)?;
    writer.write(sample, path)?;
    println!("{} Wrote {}", "Success:".green().bold(), path.display());
    Ok(())
}

/// Impute, treating unfilled plants as a warning rather than a failure.
fn impute_sample(sim: &Simulator, sample: &mut Sample) -> Result<()> {
    match sim.impute(sample) {
        Ok(()) => Ok(()),
        Err(ConifersError::FillValues { count }) => {
            eprintln!(
                "{}: {count} plant fields could not be imputed",
                "Warning".yellow()
            );
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

fn species_idx(tables: &mut ModelTables, code: &str) -> Result<u32> {
    let idx = tables.species.lookup_by_code(code).map(|sp| sp.idx);
    tables.species.sort_by_idx();
    idx.with_context(|| format!("unknown species code '{code}'"))
}

fn thin_type(policy: &str, amount: f64, sp_idx: Option<u32>) -> Result<ThinType> {
    Ok(match (policy.to_lowercase().as_str(), sp_idx) {
        ("sdi" | "mortality", None) => ThinType::SdiMortality { proportion: amount },
        ("sdi" | "mortality", Some(_)) => {
            anyhow::bail!("SDI mortality thinning applies to every species")
        }
        ("proportional" | "prop", Some(sp_idx)) => ThinType::ProportionalSpecies {
            sp_idx,
            target_expf: amount,
        },
        ("proportional" | "prop", None) => ThinType::ProportionalAll {
            target_expf: amount,
        },
        ("below" | "from-below", Some(sp_idx)) => ThinType::FromBelowSpecies {
            sp_idx,
            remove_expf: amount,
        },
        ("below" | "from-below", None) => ThinType::FromBelowAll {
            remove_expf: amount,
        },
        _ => anyhow::bail!("Unknown thinning policy: {policy}. Use: sdi, proportional, or below"),
    })
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut tables = load_tables(cli.tables.as_deref())?;
    let mut config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Impute { input, output } => {
            println!(
                "\n{}",
                format!("Imputation: {}", input.display()).bold().cyan()
            );
            let mut sample = load_sample(&input, &mut tables)?;
            let sim = Simulator::new(tables, config)?;
            impute_sample(&sim, &mut sample)?;
            print_error_report(&sample);
            if let Some(output) = output {
                save_sample(&sample, &output)?;
            }
        }

        Commands::Project {
            input,
            years,
            variant,
            seed,
            output,
        } => {
            if let Some(variant) = variant {
                config.variant = variant;
            }
            if seed.is_some() {
                config.seed = seed;
            }
            println!(
                "\n{}",
                format!("Growth Projection: {years} years ({})", config.variant)
                    .bold()
                    .cyan()
            );

            let mut sample = load_sample(&input, &mut tables)?;
            let mut sim = Simulator::new(tables, config)?;
            impute_sample(&sim, &mut sample)?;
            sim.calc_stats(&mut sample)?;
            let mut trace = vec![sim.snapshot(&sample)];
            trace.extend(sim.project(&mut sample, years)?);
            print_projection_table(&trace);

            if let Some(output) = output {
                save_sample(&sample, &output)?;
            }
        }

        Commands::Thin {
            input,
            policy,
            amount,
            species,
            output,
        } => {
            let sp_idx = species
                .as_deref()
                .map(|code| species_idx(&mut tables, code))
                .transpose()?;
            let thin = thin_type(&policy, amount, sp_idx)?;

            let mut sample = load_sample(&input, &mut tables)?;
            let mut sim = Simulator::new(tables, config)?;
            impute_sample(&sim, &mut sample)?;
            let report = sim.thin(&mut sample, &thin)?;
            print_thin_report(&report);

            if let Some(output) = output {
                save_sample(&sample, &output)?;
            }
        }

        Commands::Summary {
            input,
            by,
            confidence,
        } => {
            let mut sample = load_sample(&input, &mut tables)?;
            let sim = Simulator::new(tables, config)?;
            impute_sample(&sim, &mut sample)?;
            sim.calc_stats(&mut sample)?;

            println!("\n{}", "Quick Summary".bold().cyan());
            println!("{}", "=".repeat(40));
            println!("  Name:           {}", sample.name);
            println!("  Plots:          {}", sample.num_plots());
            println!("  Total Plants:   {}", sample.num_plants());
            println!("  Mean TPA:       {:.1}", sample.mean_tpa());
            println!("  Mean BA/ac:     {:.1} sq ft", sample.mean_basal_area());

            let records = build_summaries(sim.tables(), &sample, by)?;
            print_summary_table(&records, by);

            match SamplingStatistics::compute(&sample, confidence) {
                Ok(stats) => print_statistics_table(&stats),
                Err(e) => {
                    eprintln!("{}: {e}", "Warning".yellow());
                }
            }
        }

        Commands::Convert {
            input,
            output,
            pretty,
        } => {
            let sample = load_sample(&input, &mut tables)?;

            let out_ext = output
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("")
                .to_lowercase();

            match out_ext.as_str() {
                "csv" => io::write_csv(&sample, &output)?,
                "json" => io::write_json(&sample, &output, pretty)?,
                _ => anyhow::bail!("Unsupported output format: .{out_ext}"),
            }

            println!(
                "{} Converted {} -> {}",
                "Success:".green().bold(),
                input.display(),
                output.display()
            );
        }
    }

    Ok(())
}
