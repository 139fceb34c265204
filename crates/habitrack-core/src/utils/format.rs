use chrono::NaiveDate;

/// Truncate a string to at most `max_len` characters, adding an ellipsis if cut
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}

/// "May 05, 2024"
pub fn format_date(date: NaiveDate) -> String {
    date.format("%b %d, %Y").to_string()
}

/// "May 05 - May 11, 2024", collapsing the year when both ends share it
pub fn format_date_range(start: NaiveDate, end: NaiveDate) -> String {
    if start.format("%Y").to_string() == end.format("%Y").to_string() {
        format!("{} - {}", start.format("%b %d"), format_date(end))
    } else {
        format!("{} - {}", format_date(start), format_date(end))
    }
}

/// Text progress bar for a whole percentage, e.g. `[#####-----] 50%`
pub fn progress_bar(percent: u32, width: usize) -> String {
    let percent = percent.min(100);
    let filled = (percent as usize * width + 50) / 100;
    format!(
        "[{}{}] {}%",
        "#".repeat(filled),
        "-".repeat(width - filled),
        percent
    )
}

/// Check box used when listing completable items
pub fn check_mark(done: bool) -> &'static str {
    if done {
        "[x]"
    } else {
        "[ ]"
    }
}
