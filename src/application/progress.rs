use std::sync::OnceLock;

use regex::Regex;

/// `[download]  45.3% of 128.5MiB at 2.5MiB/s ETA 00:12`
const DOWNLOAD_MARKER_PATTERN: &str = r"\[download\]\s+(\d{1,3}(?:\.\d+)?)%";
/// A bare percentage opening the line, e.g. `100% done`.
const LEADING_PERCENT_PATTERN: &str = r"^\s*(\d{1,3}(?:\.\d+)?)%";

fn patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [DOWNLOAD_MARKER_PATTERN, LEADING_PERCENT_PATTERN]
            .into_iter()
            .filter_map(|pattern| Regex::new(pattern).ok())
            .collect()
    })
}

/// Completion percentage carried by a downloader output line, if any.
///
/// Only the first recognised figure counts. The decimal separator is always
/// `.`; anything that does not parse, or exceeds 100, yields `None`.
pub fn extract(line: &str) -> Option<f32> {
    patterns().iter().find_map(|re| {
        let caps = re.captures(line)?;
        let value = caps[1].parse::<f32>().ok()?;
        (0.0..=100.0).contains(&value).then_some(value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_download_marker() {
        assert_eq!(extract("[download]  45.3% of 128.5MiB at 2.5MiB/s"), Some(45.3));
        assert_eq!(extract("[download] 100% of 10.00MiB in 00:03"), Some(100.0));
        assert_eq!(extract("[download]   0.0% of ~ 20.1MiB at Unknown B/s ETA Unknown"), Some(0.0));
    }

    #[test]
    fn test_non_progress_lines() {
        assert_eq!(extract("Merging formats..."), None);
        assert_eq!(extract("[Merger] Merging formats into \"clip.mp4\""), None);
        assert_eq!(extract("[download] Destination: clip.f137.mp4"), None);
        assert_eq!(extract(""), None);
    }

    #[test]
    fn test_first_figure_wins() {
        assert_eq!(extract("100% done 50%"), Some(100.0));
        assert_eq!(extract("[download]  12.5% of 5.0MiB (part 2 at 80%)"), Some(12.5));
    }

    #[test]
    fn test_locale_invariant_decimal_point() {
        assert_eq!(extract("[download]  45,3% of 128.5MiB"), None);
        assert_eq!(extract("[download]  45.30% of 128.5MiB"), Some(45.3));
    }

    #[test]
    fn test_out_of_range_is_rejected() {
        assert_eq!(extract("[download]  250% of 1MiB"), None);
    }
}
