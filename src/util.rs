use std::time::Duration;

use chrono::NaiveDate;

/// Human label for a session length in whole minutes
pub fn duration_label(minutes: u32) -> String {
    match minutes {
        0 => "less than a minute".to_string(),
        1 => "about 1 minute".to_string(),
        n => format!("about {n} minutes"),
    }
}

/// Whole minutes in `elapsed`, rounded to the nearest minute
pub fn elapsed_minutes(elapsed: Duration) -> u32 {
    let minutes = (elapsed.as_secs_f64() / 60.0).round();
    if minutes >= u32::MAX as f64 {
        u32::MAX
    } else {
        minutes as u32
    }
}

/// Running clock as HH:MM:SS
pub fn format_clock(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!(
        "{:02}:{:02}:{:02}",
        secs / 3600,
        (secs % 3600) / 60,
        secs % 60
    )
}

pub fn format_hours(hours: f64) -> String {
    format!("{hours:.1}h")
}

/// Goal hours are whole numbers in practice; keep fractions when they are not
pub fn format_goal(hours: f64) -> String {
    if (hours - hours.round()).abs() < f64::EPSILON {
        format!("{}h", hours.round())
    } else {
        format!("{hours:.1}h")
    }
}

/// Axis label for a calendar day, MM/DD
pub fn short_date(date: &str) -> String {
    match NaiveDate::parse_from_str(date, "%Y-%m-%d") {
        Ok(day) => day.format("%m/%d").to_string(),
        Err(_) => date.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_label() {
        assert_eq!(duration_label(0), "less than a minute");
        assert_eq!(duration_label(1), "about 1 minute");
        assert_eq!(duration_label(2), "about 2 minutes");
        assert_eq!(duration_label(45), "about 45 minutes");
    }

    #[test]
    fn test_elapsed_minutes_rounds_to_nearest() {
        assert_eq!(elapsed_minutes(Duration::from_secs(29)), 0);
        assert_eq!(elapsed_minutes(Duration::from_secs(30)), 1);
        assert_eq!(elapsed_minutes(Duration::from_secs(89)), 1);
        assert_eq!(elapsed_minutes(Duration::from_secs(45 * 60 + 10)), 45);
    }

    #[test]
    fn test_format_clock() {
        assert_eq!(format_clock(Duration::from_secs(0)), "00:00:00");
        assert_eq!(format_clock(Duration::from_secs(3725)), "01:02:05");
    }

    #[test]
    fn test_format_hours() {
        assert_eq!(format_hours(0.0), "0.0h");
        assert_eq!(format_hours(12.345), "12.3h");
    }

    #[test]
    fn test_format_goal() {
        assert_eq!(format_goal(200.0), "200h");
        assert_eq!(format_goal(12.5), "12.5h");
    }

    #[test]
    fn test_short_date() {
        assert_eq!(short_date("2026-10-19"), "10/19");
        assert_eq!(short_date("yesterday"), "yesterday");
    }
}
