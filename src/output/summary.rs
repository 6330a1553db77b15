use std::fmt::Write;

use chrono::DateTime;
use comfy_table::Cell;

use crate::pipeline::{Build, GatingPath};
use crate::report::{
    BlockersReport, PathsReport, PrerequisitesReport, ResourceOutcome, ResourceStatus, Verdict,
};

use super::styling::{bright, bright_green, bright_red, bright_yellow, classified, cyan, dim};
use super::tables::{
    color_coded_classification_cell, color_coded_status_cell, create_cyan_header, create_table,
};

fn add_section_header(output: &mut String, emoji: &str, title: &str) {
    let _ = writeln!(output, "{} {}", bright(emoji), bright(title).underlined());
}

fn format_end_time(build: &Build) -> String {
    build
        .end_time
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .map_or_else(|| "-".to_string(), |t| t.format("%Y-%m-%d %H:%M UTC").to_string())
}

fn format_build(build: &Build) -> String {
    if build.id == 0 {
        "-".to_string()
    } else if build.name.is_empty() {
        format!("#{}", build.id)
    } else {
        format!("#{} ({})", build.name, build.id)
    }
}

fn format_path(path: &GatingPath) -> String {
    let Some(first) = path.first() else {
        return String::new();
    };

    std::iter::once(first.from.as_str())
        .chain(path.iter().map(|edge| edge.to.as_str()))
        .collect::<Vec<_>>()
        .join(" → ")
}

/// Renders the gating jobs of every listed job.
///
/// Gating jobs are listed ancestor-first and colored by classification:
/// green when clear, red when blocked, yellow when neutral.
pub fn render_prerequisites(report: &PrerequisitesReport) -> String {
    let mut output = String::new();

    add_section_header(&mut output, "📋", "Prerequisites");
    let _ = writeln!(
        output,
        "  {} {}\n  {} {}\n",
        dim("Pipeline:"),
        cyan(&report.pipeline),
        dim("Mode:"),
        bright_yellow(report.mode.as_str())
    );

    if report.jobs.is_empty() {
        let _ = writeln!(output, "{}", bright_yellow("No jobs found."));
        return output;
    }

    for job in &report.jobs {
        let _ = writeln!(output, "{}", bright(&job.job));

        for resource in &job.resources {
            let _ = writeln!(output, "  {}", cyan(&resource.resource));
            let _ = writeln!(
                output,
                "    The following jobs must pass for this trigger to occur:"
            );

            let mut line = String::from("    ");
            for gating in &resource.gating {
                let _ = write!(
                    line,
                    "{}, ",
                    classified(&gating.job.name, gating.classification)
                );
            }
            let _ = writeln!(output, "{line}{}\n", bright(&job.job));
        }
    }

    output
}

/// Renders every `passed` chain into the report's job, one per line.
pub fn render_paths(report: &PathsReport) -> String {
    let mut output = String::new();

    add_section_header(&mut output, "🔗", "Passed Paths");
    let _ = writeln!(
        output,
        "  {} {}\n  {} {}\n",
        dim("Pipeline:"),
        cyan(&report.pipeline),
        dim("Job:"),
        bright(&report.job)
    );

    if report.resources.is_empty() {
        let _ = writeln!(
            output,
            "{}",
            bright_yellow(format!("{} has no passed constraints.", report.job))
        );
        return output;
    }

    for resource in &report.resources {
        let _ = writeln!(output, "  {}", cyan(&resource.resource));
        for path in &resource.paths {
            let _ = writeln!(output, "    {}", format_path(path));
        }
        output.push('\n');
    }

    output
}

fn render_resource_status(output: &mut String, resource: &str, status: &ResourceStatus) {
    let Some(label) = &status.version_label else {
        let _ = writeln!(
            output,
            "  {} {}\n",
            cyan(resource),
            dim("has no versions yet")
        );
        return;
    };

    let _ = writeln!(output, "  {} {} {}", cyan(resource), dim("@"), bright(label));

    let mut table = create_table();
    table.set_header(create_cyan_header(&[
        "Job",
        "Status",
        "Build",
        "Finished",
        "Classification",
    ]));

    for result in &status.results {
        table.add_row(vec![
            Cell::new(result.job()),
            color_coded_status_cell(result.build.status),
            Cell::new(format_build(&result.build)),
            Cell::new(format_end_time(&result.build)),
            color_coded_classification_cell(result.classification),
        ]);
    }

    let _ = writeln!(output, "{table}\n");
}

/// Renders one table per gated resource with the latest build of each gating job.
pub fn render_blockers(report: &BlockersReport) -> String {
    let mut output = String::new();

    add_section_header(&mut output, "🚦", "Blockers");
    let _ = writeln!(
        output,
        "  {} {}\n  {} {}\n  {} {}\n  {} {}\n",
        dim("Pipeline:"),
        cyan(&report.pipeline),
        dim("Job:"),
        bright(&report.job),
        dim("Mode:"),
        bright_yellow(report.mode.as_str()),
        dim("Collected:"),
        dim(report.collected_at.format("%Y-%m-%d %H:%M UTC"))
    );

    if report.resources.is_empty() {
        let _ = writeln!(
            output,
            "{}",
            bright_yellow(format!("{} has no passed constraints.", report.job))
        );
        return output;
    }

    add_section_header(&mut output, "📦", "Resources");
    for resource in &report.resources {
        match &resource.outcome {
            ResourceOutcome::Resolved(status) => {
                render_resource_status(&mut output, &resource.resource, status);
            }
            ResourceOutcome::Unavailable { error } => {
                let _ = writeln!(
                    output,
                    "  {} {}\n",
                    cyan(&resource.resource),
                    bright_red(format!("unavailable: {error}"))
                );
            }
        }
    }

    let verdict = match report.verdict() {
        Verdict::Blocked => bright_red(format!("{} is blocked", report.job)),
        Verdict::Clear => bright_green(format!("{} is not blocked", report.job)),
        Verdict::Unknown => bright_yellow(format!(
            "{} may be blocked: some resources could not be checked",
            report.job
        )),
    };
    let _ = writeln!(output, "{} {}", bright("Verdict:"), verdict);

    output
}
