use chrono::NaiveDate;
use colored::Colorize;

/// Format a date with a colour cue for how close it is.
pub fn format_expiry(expiry: NaiveDate, today: NaiveDate) -> String {
    let days = (expiry - today).num_days();
    let text = format!("{} ({} days)", expiry.format("%Y-%m-%d"), days);
    if days < 0 {
        text.red().to_string()
    } else if days <= 7 {
        text.yellow().to_string()
    } else {
        text.green().to_string()
    }
}

/// Truncate long cell values for table output.
pub fn truncate(value: &str, max: usize) -> String {
    if value.chars().count() <= max {
        value.to_string()
    } else {
        let kept: String = value.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Print a formatted table border
pub fn print_table_border(width: usize) {
    println!("{}", "=".repeat(width));
}

/// Print a table row with columns
pub fn print_table_row(columns: &[&str], widths: &[usize]) {
    let mut row = String::new();
    for (i, col) in columns.iter().enumerate() {
        if i < widths.len() {
            row.push_str(&format!("{:<width$}  ", col, width = widths[i]));
        }
    }
    println!("{}", row.trim_end());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("Zoë Ångström-Larsen", 8), "Zoë Å...");
    }
}
