mod exports;
mod progress;
mod styling;
mod summary;
mod tables;

pub use exports::{export_report, Export};
pub use progress::PhaseProgress;
pub use styling::{dim, magenta_bold};
pub use summary::{render_blockers, render_paths, render_prerequisites};

/// Prints the `concourse-blockers` banner to stderr.
///
/// Displays the tool name, version, and description at the start of execution.
pub fn print_banner() {
    eprintln!(
        r"
{} {}
  {}
",
        magenta_bold("🚦 concourse-blockers"),
        dim(env!("CARGO_PKG_VERSION")),
        dim("What is holding back your Concourse jobs")
    );
}
