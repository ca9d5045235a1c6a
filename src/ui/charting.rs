use crate::api::DailyHours;
use crate::util::short_date;

pub const BAR_WIDTH: u16 = 5;
pub const BAR_GAP: u16 = 1;

/// One day's bar, scaled to tenths of an hour since bar values are integers
#[derive(Debug, Clone, PartialEq)]
pub struct BarPoint {
    pub label: String,
    pub value: u64,
    pub text: String,
}

pub fn bar_points(points: &[DailyHours]) -> Vec<BarPoint> {
    points
        .iter()
        .map(|p| {
            let hours = p.hours.max(0.0);
            BarPoint {
                label: short_date(&p.date),
                value: (hours * 10.0).round() as u64,
                text: format_label(hours),
            }
        })
        .collect()
}

/// How many bars fit across `width` columns
pub fn bars_that_fit(width: u16) -> usize {
    ((width + BAR_GAP) / (BAR_WIDTH + BAR_GAP)) as usize
}

/// The most recent days that fit; older ones scroll off the left edge
pub fn recent_window(points: &[BarPoint], width: u16) -> &[BarPoint] {
    let fit = bars_that_fit(width);
    &points[points.len().saturating_sub(fit)..]
}

/// Upper bound for the chart so the tallest bar keeps some headroom
pub fn chart_max(points: &[BarPoint]) -> u64 {
    let highest = points.iter().map(|p| p.value).max().unwrap_or(0);
    (highest + highest / 10).max(10)
}

/// Format a simple numeric label consistently
pub fn format_label(val: f64) -> String {
    if (val - val.round()).abs() < f64::EPSILON {
        format!("{}", val.round())
    } else {
        format!("{val:.1}")
    }
}
