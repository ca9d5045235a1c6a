//! Plain-text rendering of the dashboard for `--stats`.

use std::fmt::Write;

use crate::stats::Dashboard;
use crate::util::{format_goal, format_hours, short_date};

pub fn text_report(dashboard: &Dashboard) -> String {
    let mut out = String::new();

    if let Some(error) = &dashboard.error {
        let _ = writeln!(out, "{error}");
    }

    let _ = writeln!(out, "Cumulative progress");
    let width = dashboard
        .progress
        .iter()
        .map(|p| p.label.len())
        .max()
        .unwrap_or(0);
    for p in &dashboard.progress {
        let status = if p.is_goal_reached() {
            "Goal reached!".to_string()
        } else {
            format!("{} remaining", format_hours(p.remaining()))
        };
        let _ = writeln!(
            out,
            "  {:<width$}  {:>7} / {:<6} {:>5.1}% complete  {}",
            p.label,
            format_hours(p.hours),
            format_goal(p.goal_hours),
            p.percent(),
            status,
        );
    }

    if dashboard.placeholder {
        return out;
    }

    let _ = writeln!(out, "\nDaily activity");
    for series in &dashboard.daily {
        let _ = writeln!(out, "  {}", series.title);
        if series.points.is_empty() {
            let _ = writeln!(out, "    No data for {} yet.", series.title);
            continue;
        }
        for point in &series.points {
            let _ = writeln!(
                out,
                "    {}  {}",
                short_date(&point.date),
                format_hours(point.hours)
            );
        }
    }

    out
}
