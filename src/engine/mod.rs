pub mod competition;
pub mod impute;
pub mod mortality;
pub mod random;
pub mod sampling;
pub mod simulator;
pub mod summary;
pub mod thinning;

pub use competition::calc_plot_stats;
pub use impute::impute;
pub use mortality::{calc_hann_wang_x0, calc_init_x0, calc_sdi_mortality};
pub use random::SimRng;
pub use sampling::{bootstrap_plots, combine_samples, duplicate_plots};
pub use simulator::{Simulator, YearSummary};
pub use summary::{build_summaries, ConfidenceInterval, SamplingStatistics};
pub use thinning::{thin_plot, thin_sample, ThinReport, ThinType};
