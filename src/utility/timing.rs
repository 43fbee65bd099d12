// ============================================
// TIMING UTILITY - Refresh cycle measurement
// ============================================
// Usage:
//   1. Manual tracking: let timer = Timer::start("cycle"); ... timer.stop();
//   2. Async wrapper: let result = timed_async("fetch", || async { ... }).await;
//   3. Across cycles: stats.record(timer.stop()); stats.summary();
// ============================================

use colored::Colorize;
use std::time::{Duration, Instant};

/// Timer for measuring execution time
pub struct Timer {
    name: String,
    start: Instant,
    threshold_ms: u128,
}

impl Timer {
    pub fn start(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            start: Instant::now(),
            threshold_ms: 0,
        }
    }

    /// Only log if execution exceeds threshold (in milliseconds)
    pub fn start_with_threshold(name: impl Into<String>, threshold_ms: u128) -> Self {
        Self {
            threshold_ms,
            ..Self::start(name)
        }
    }

    /// Stop the timer and log the result
    pub fn stop(self) -> Duration {
        let duration = self.start.elapsed();
        let ms = duration.as_millis();
        if ms >= self.threshold_ms {
            tracing::debug!(timer = %self.name, elapsed_ms = ms as u64, "timer stopped");
            println!("{} {} - {}", Self::emoji(ms), self.name.as_str().cyan(), Self::format(duration));
        }
        duration
    }

    fn format(duration: Duration) -> String {
        if duration.as_millis() < 1000 {
            format!("{}ms", duration.as_millis())
        } else {
            format!("{:.2}s", duration.as_secs_f64())
        }
    }

    fn emoji(ms: u128) -> &'static str {
        match ms {
            0..=100 => "⚡",
            101..=500 => "✅",
            501..=1000 => "⏱️",
            1001..=5000 => "🐌",
            _ => "🔥",
        }
    }
}

/// Fetches faster than this are not reported
pub const SLOW_FETCH_MS: u128 = 500;

/// Time an async function, reporting it only when slow
pub async fn timed_async<F, Fut, R>(name: impl Into<String>, f: F) -> R
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = R>,
{
    let timer = Timer::start_with_threshold(name, SLOW_FETCH_MS);
    let result = f().await;
    timer.stop();
    result
}

// ============================================
// AGGREGATE TIMING ACROSS POLL CYCLES
// ============================================

#[derive(Debug, Clone, Default)]
pub struct CycleStats {
    succeeded: usize,
    failed: usize,
    total_duration: Duration,
    max_duration: Option<Duration>,
}

impl CycleStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, duration: Duration, ok: bool) {
        if ok {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
        self.total_duration += duration;
        self.max_duration = Some(self.max_duration.map_or(duration, |max| max.max(duration)));
    }

    pub fn cycles(&self) -> usize {
        self.succeeded + self.failed
    }

    pub fn succeeded(&self) -> usize {
        self.succeeded
    }

    pub fn failed(&self) -> usize {
        self.failed
    }

    pub fn avg_duration(&self) -> Option<Duration> {
        match self.cycles() {
            0 => None,
            n => Some(self.total_duration / n as u32),
        }
    }

    /// Print summary statistics
    pub fn summary(&self) {
        if self.cycles() == 0 {
            println!("📊 {} - No cycles run", "Poll".cyan());
            return;
        }

        println!("\n{}", "=".repeat(60).blue());
        println!("📊 {}", "Poll Summary".cyan().bold());
        println!("{}", "=".repeat(60).blue());
        println!("  • Cycles: {}", self.cycles());
        println!("  • Succeeded: {}", self.succeeded);
        println!("  • Failed: {}", self.failed);
        if let Some(avg) = self.avg_duration() {
            println!("  • Average: {}ms", avg.as_millis());
        }
        if let Some(max) = self.max_duration {
            println!("  • Max: {}ms", max.as_millis());
        }
        println!("{}", "=".repeat(60).blue());
    }
}
