//! Formatting helpers shared by the prompt renderers and the CLI.

/// Format a ratio as a whole percentage (e.g., `0.666` -> "67%").
pub fn format_percent(ratio: f64) -> String {
    format!("{}%", (ratio * 100.0).round() as i64)
}

/// Format an hour of day as a 12-hour clock label (e.g., 0 -> "12 AM", 15 -> "3 PM").
pub fn format_hour(hour: u32) -> String {
    match hour {
        0 => "12 AM".to_string(),
        1..=11 => format!("{} AM", hour),
        12 => "12 PM".to_string(),
        _ => format!("{} PM", hour - 12),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_percent_rounds() {
        assert_eq!(format_percent(1.0), "100%");
        assert_eq!(format_percent(2.0 / 3.0), "67%");
        assert_eq!(format_percent(0.4), "40%");
        assert_eq!(format_percent(0.0), "0%");
    }

    #[test]
    fn test_format_hour() {
        assert_eq!(format_hour(0), "12 AM");
        assert_eq!(format_hour(9), "9 AM");
        assert_eq!(format_hour(12), "12 PM");
        assert_eq!(format_hour(23), "11 PM");
    }
}
