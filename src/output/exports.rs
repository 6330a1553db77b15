use anyhow::Result;
use serde::Serialize;
use std::io::Write;

use crate::config::OutputFormat;
use crate::report::{BlockersReport, PathsReport, PrerequisitesReport, ResourceOutcome};

use super::summary::{render_blockers, render_paths, render_prerequisites};

/// A report that can be written in every [`OutputFormat`].
pub trait Export: Serialize {
    /// Colored terminal rendering
    fn summary(&self) -> String;

    fn write_csv(&self, output: &mut dyn Write) -> Result<()>;
}

/// Writes a report in the requested format.
///
/// - Summary: human-readable terminal output with tables
/// - JSON: programmatic access, optionally pretty-printed
/// - CSV: spreadsheet analysis
pub fn export_report<R: Export>(
    report: &R,
    format: OutputFormat,
    pretty: bool,
    output: &mut dyn Write,
) -> Result<()> {
    match format {
        OutputFormat::Summary => {
            write!(output, "{}", report.summary())?;
            Ok(())
        }
        OutputFormat::Json => export_json(report, pretty, output),
        OutputFormat::Csv => report.write_csv(output),
    }
}

fn export_json<T: Serialize>(report: &T, pretty: bool, output: &mut dyn Write) -> Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(report)?
    } else {
        serde_json::to_string(report)?
    };
    writeln!(output, "{json}")?;
    Ok(())
}

fn quoted(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

impl Export for PrerequisitesReport {
    fn summary(&self) -> String {
        render_prerequisites(self)
    }

    fn write_csv(&self, output: &mut dyn Write) -> Result<()> {
        writeln!(
            output,
            "Job,Resource,Gating Job,Via,Triggers,Has New Inputs,Classification"
        )?;

        for job in &self.jobs {
            for resource in &job.resources {
                for gating in &resource.gating {
                    writeln!(
                        output,
                        "{},{},{},{},{},{},{}",
                        quoted(&job.job),
                        quoted(&resource.resource),
                        quoted(&gating.job.name),
                        quoted(&gating.job.edge.to),
                        gating.job.triggers,
                        gating.job.has_new_inputs,
                        gating.classification.as_str()
                    )?;
                }
            }
        }

        Ok(())
    }
}

impl Export for PathsReport {
    fn summary(&self) -> String {
        render_paths(self)
    }

    fn write_csv(&self, output: &mut dyn Write) -> Result<()> {
        writeln!(output, "Job,Resource,Path,Step,From,To,Trigger")?;

        for resource in &self.resources {
            for (path_index, path) in resource.paths.iter().enumerate() {
                for (step, edge) in path.iter().enumerate() {
                    writeln!(
                        output,
                        "{},{},{},{},{},{},{}",
                        quoted(&self.job),
                        quoted(&resource.resource),
                        path_index + 1,
                        step + 1,
                        quoted(&edge.from),
                        quoted(&edge.to),
                        edge.trigger
                    )?;
                }
            }
        }

        Ok(())
    }
}

impl Export for BlockersReport {
    fn summary(&self) -> String {
        render_blockers(self)
    }

    fn write_csv(&self, output: &mut dyn Write) -> Result<()> {
        writeln!(
            output,
            "Resource,Version,Job,Status,Build ID,End Time,Classification,Error"
        )?;

        for resource in &self.resources {
            match &resource.outcome {
                ResourceOutcome::Resolved(status) => {
                    let version = status.version_label.as_deref().unwrap_or_default();
                    for result in &status.results {
                        writeln!(
                            output,
                            "{},{},{},{},{},{},{},",
                            quoted(&resource.resource),
                            quoted(version),
                            quoted(result.job()),
                            result.build.status,
                            result.build.id,
                            result
                                .build
                                .end_time
                                .map(|t| t.to_string())
                                .unwrap_or_default(),
                            result.classification.as_str()
                        )?;
                    }
                }
                ResourceOutcome::Unavailable { error } => {
                    writeln!(
                        output,
                        "{},,,,,,,{}",
                        quoted(&resource.resource),
                        quoted(error)
                    )?;
                }
            }
        }

        Ok(())
    }
}
