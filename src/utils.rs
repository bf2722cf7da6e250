use std::time::{Duration, Instant};

/// Logs the time spent in one stage of a frame and returns the elapsed total, so calls can be
/// chained through a frame: `elapsed = trace("TIME", "Decode", start, elapsed)`.
pub(crate) fn trace(l_type: &str, l_step: &str, start: Instant, prev_elapsed: Duration) -> Duration {
    let elapsed = start.elapsed();
    log::trace!("{} | Total={:.2?} | {}={:.2?}", l_type, elapsed, l_step, elapsed.saturating_sub(prev_elapsed));
    elapsed
}

pub(crate) fn human_bytes(size: f64) -> String {
    let units = ["B", "KB", "MB", "GB", "TB", "PB", "EB"];
    let mut size = size;
    let mut unit_index = 0;
    let k = 1024.;

    while size >= k && unit_index < units.len() - 1 {
        size /= k;
        unit_index += 1;
    }

    format!("{:.1} {}", size, units[unit_index])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn human_bytes_picks_largest_unit() {
        assert_eq!(human_bytes(512.0), "512.0 B");
        assert_eq!(human_bytes(1536.0), "1.5 KB");
        assert_eq!(human_bytes(12.0 * 1024.0 * 1024.0), "12.0 MB");
    }

    #[test]
    fn trace_is_monotonic() {
        let start = Instant::now();
        let first = trace("TIME", "a", start, Duration::ZERO);
        let second = trace("TIME", "b", start, first);
        assert!(second >= first);
    }
}
