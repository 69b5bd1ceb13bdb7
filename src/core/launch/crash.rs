use std::time::Instant;

use tracing::error;

/// Crash timer value that turns crash limiting off.
pub const CRASH_TIMER_DISABLED: i64 = -1;

/// Parse a crash timer such as `2h`, `60min`, `30s` or `90` into seconds.
///
/// Anything else yields [`CRASH_TIMER_DISABLED`].
pub fn parse_crash_timer(timer: &str) -> i64 {
    let timer = timer.trim();
    let (digits, factor) = if let Some(n) = timer.strip_suffix('h') {
        (n, 60 * 60)
    } else if let Some(n) = timer.strip_suffix("min") {
        (n, 60)
    } else if let Some(n) = timer.strip_suffix('s') {
        (n, 1)
    } else {
        (timer, 1)
    };

    match digits.parse::<i64>().ok().and_then(|n| n.checked_mul(factor)) {
        Some(seconds) => seconds,
        None => {
            error!("Invalid crash time format given: {:?}", timer);
            CRASH_TIMER_DISABLED
        }
    }
}

/// Start times of recent launches.
#[derive(Debug)]
pub struct CrashWindow {
    starts: Vec<Instant>,
    timer_secs: i64,
}

impl CrashWindow {
    pub fn new(timer_secs: i64) -> Self {
        Self {
            starts: Vec::new(),
            timer_secs,
        }
    }

    /// Drop starts more than `timer_secs` whole seconds before `now`.
    pub fn prune(&mut self, now: Instant) {
        let timer = self.timer_secs;
        self.starts.retain(|start| {
            let elapsed = now.saturating_duration_since(*start).as_secs();
            i64::try_from(elapsed).map_or(false, |e| e <= timer)
        });
    }

    pub fn record(&mut self, start: Instant) {
        self.starts.push(start);
    }

    pub fn len(&self) -> usize {
        self.starts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.starts.is_empty()
    }

    pub fn should_restart(&self, auto_restart: bool, crash_limit: usize) -> bool {
        auto_restart && self.starts.len() <= crash_limit
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn timer_suffixes() {
        assert_eq!(parse_crash_timer("2h"), 7200);
        assert_eq!(parse_crash_timer("60min"), 3600);
        assert_eq!(parse_crash_timer("30s"), 30);
        assert_eq!(parse_crash_timer("90"), 90);
        assert_eq!(parse_crash_timer(" 5min "), 300);
        assert_eq!(parse_crash_timer("0s"), 0);
    }

    #[test]
    fn invalid_timers_disable_limiting() {
        for raw in ["", "abc", "10m", "1.5h", "h", "min", "10 days"] {
            assert_eq!(parse_crash_timer(raw), CRASH_TIMER_DISABLED, "{raw:?}");
        }
    }

    #[test]
    fn window_stops_restarting_past_the_limit() {
        let mut window = CrashWindow::new(60);
        let start = Instant::now();

        for i in 0..3 {
            window.prune(start);
            window.record(start);
            assert!(window.should_restart(true, 3), "launch {}", i + 1);
        }
        window.prune(start);
        window.record(start);
        assert_eq!(window.len(), 4);
        assert!(!window.should_restart(true, 3));
    }

    #[test]
    fn old_starts_fall_out_of_the_window() {
        let mut window = CrashWindow::new(60);
        let start = Instant::now();
        window.record(start);
        window.record(start + Duration::from_secs(30));

        window.prune(start + Duration::from_secs(60));
        assert_eq!(window.len(), 2);

        window.prune(start + Duration::from_secs(61));
        assert_eq!(window.len(), 1);
    }

    #[test]
    fn disabled_timer_keeps_restarting() {
        let mut window = CrashWindow::new(CRASH_TIMER_DISABLED);
        let start = Instant::now();
        for _ in 0..20 {
            window.prune(start);
            window.record(start);
        }
        assert_eq!(window.len(), 1);
        assert!(window.should_restart(true, 1));
        assert!(!window.should_restart(false, 10));
    }
}
