mod tables;

pub use tables::{
    format_error_report, print_error_report,
    format_projection_table, print_projection_table,
    format_statistics_table, print_statistics_table,
    format_summary_table, print_summary_table,
    format_thin_report, print_thin_report,
};
