pub mod constants;
pub mod filename;
pub mod progress;

pub use constants::*;
pub use filename::{default_output_filename, output_filename_for};
pub use progress::ProgressReporter;
