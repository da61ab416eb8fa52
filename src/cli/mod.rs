//! CLI output formatting
//!
//! Provides JSON rendering for operation results and colored terminal
//! display for errors and doctor reports.

pub mod display;

pub use display::error_json;
pub use display::print_diagnostic_report;
pub use display::print_error;
pub use display::render_diagnostic_report;
pub use display::result_json;
