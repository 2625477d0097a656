//! Table rendering for `mission list` / `mission show` (comfy-table, matching the
//! teacher's own CLI output formatting).

use comfy_table::{Attribute, Cell, Color, ContentArrangement, Table};

use crate::domain::models::{Item, ItemStatus, Mission, MissionStatus};

fn mission_status_color(status: MissionStatus) -> Color {
    match status {
        MissionStatus::Completed => Color::Green,
        MissionStatus::Running => Color::Cyan,
        MissionStatus::Queued | MissionStatus::Scheduled => Color::Yellow,
        MissionStatus::Failed => Color::Red,
        MissionStatus::Cancelled => Color::DarkGrey,
    }
}

fn item_status_color(status: ItemStatus) -> Color {
    match status {
        ItemStatus::Completed => Color::Green,
        ItemStatus::Processing => Color::Cyan,
        ItemStatus::Pending => Color::Yellow,
        ItemStatus::Failed => Color::Red,
        ItemStatus::Cancelled => Color::DarkGrey,
    }
}

fn base_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(comfy_table::presets::UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

#[must_use]
pub fn format_missions(missions: &[Mission]) -> String {
    let mut table = base_table();
    table.set_header(vec![
        Cell::new("ID").add_attribute(Attribute::Bold),
        Cell::new("Name").add_attribute(Attribute::Bold),
        Cell::new("Kind").add_attribute(Attribute::Bold),
        Cell::new("Status").add_attribute(Attribute::Bold),
        Cell::new("Progress").add_attribute(Attribute::Bold),
        Cell::new("Track").add_attribute(Attribute::Bold),
    ]);

    for mission in missions {
        table.add_row(vec![
            Cell::new(mission.id),
            Cell::new(&mission.name),
            Cell::new(mission.task_kind.as_str()),
            Cell::new(mission.status.as_str()).fg(mission_status_color(mission.status)),
            Cell::new(format!(
                "{}/{} ({:.0}%)",
                mission.completed + mission.failed,
                mission.total,
                mission.progress() * 100.0
            )),
            Cell::new(&mission.engine_track),
        ]);
    }

    table.to_string()
}

#[must_use]
pub fn format_items(items: &[Item]) -> String {
    let mut table = base_table();
    table.set_header(vec![
        Cell::new("Idx").add_attribute(Attribute::Bold),
        Cell::new("Status").add_attribute(Attribute::Bold),
        Cell::new("Retries").add_attribute(Attribute::Bold),
        Cell::new("Result URL").add_attribute(Attribute::Bold),
        Cell::new("Error").add_attribute(Attribute::Bold),
    ]);

    for item in items {
        table.add_row(vec![
            Cell::new(item.item_index),
            Cell::new(item.status.as_str()).fg(item_status_color(item.status)),
            Cell::new(item.retry_count),
            Cell::new(item.result_url.clone().unwrap_or_default()),
            Cell::new(item.error_message.clone().unwrap_or_default()),
        ]);
    }

    table.to_string()
}
