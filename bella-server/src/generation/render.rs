//! HTML table rendering

use bella_common::calendar::{Calendar, CalendarEntry};

pub const TABLE_ID: &str = "calendar-table";
pub const TABLE_CLASSES: &str = "table table-striped table-hover styled-table";

const COLUMNS: [&str; 9] = [
    "Day", "Activity", "Script", "Visual", "Caption", "Hashtags", "Time", "CTA", "Prompt",
];

pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn row_cells(entry: &CalendarEntry) -> [String; 9] {
    [
        format!("Day {}", entry.day),
        entry.activity.clone(),
        entry.script.clone(),
        entry.visual.clone(),
        entry.caption.clone(),
        entry.hashtags.clone(),
        entry.time_slot.clone(),
        entry.call_to_action.clone(),
        entry.image_prompt.clone(),
    ]
}

/// Render a calendar as an HTML table, one row per day
///
/// All cell text is escaped.
pub fn render_table(calendar: &Calendar) -> String {
    let mut html = String::with_capacity(512 + calendar.len() * 512);
    html.push_str(&format!(
        "<table border=\"0\" class=\"{}\" id=\"{}\">\n  <thead>\n    <tr>",
        TABLE_CLASSES, TABLE_ID
    ));
    for column in COLUMNS {
        html.push_str(&format!("<th>{}</th>", column));
    }
    html.push_str("</tr>\n  </thead>\n  <tbody>\n");

    for entry in calendar.entries() {
        html.push_str("    <tr>");
        for cell in row_cells(entry) {
            html.push_str(&format!("<td>{}</td>", escape_html(&cell)));
        }
        html.push_str("</tr>\n");
    }

    html.push_str("  </tbody>\n</table>");
    html
}
