use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color as TableColor, ContentArrangement, Table};

use crate::pipeline::{BuildStatus, Classification};

/// Table and cell creation helpers
pub fn create_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

pub fn create_cyan_header(labels: &[&str]) -> Vec<Cell> {
    labels
        .iter()
        .map(|label| Cell::new(*label).fg(TableColor::Cyan))
        .collect()
}

pub fn color_coded_status_cell(status: BuildStatus) -> Cell {
    let cell = Cell::new(status.as_str());
    match status {
        BuildStatus::Succeeded => cell.fg(TableColor::Green),
        BuildStatus::Failed | BuildStatus::Errored => cell.fg(TableColor::Red),
        BuildStatus::Pending | BuildStatus::Started => cell.fg(TableColor::Yellow),
        BuildStatus::Aborted | BuildStatus::Missing => cell.fg(TableColor::DarkGrey),
    }
}

pub fn color_coded_classification_cell(classification: Classification) -> Cell {
    let cell = Cell::new(classification.as_str());
    match classification {
        Classification::Clear => cell.fg(TableColor::Green),
        Classification::Blocked => cell.fg(TableColor::Red),
        Classification::Neutral => cell.fg(TableColor::Yellow),
    }
}
