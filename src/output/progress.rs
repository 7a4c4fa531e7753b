//! Periodic scan statistics reporter
//!
//! Advisory only: the scan never waits on the reporter, and a failure to
//! start it is just a warning.

use crate::scanner::ScanCounters;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

const TICK_INTERVAL: Duration = Duration::from_secs(5);

/// Static labels captured when the scan starts.
#[derive(Debug, Clone, Copy)]
pub struct ProgressLabels {
    pub hosts: u64,
    pub ports: u64,
    pub retries: usize,
    /// Planned dispatch total: N * (retries + 1)
    pub total: u64,
}

/// Stats ticker writing one line to stderr every five seconds.
pub struct ProgressReporter {
    handle: JoinHandle<()>,
}

impl ProgressReporter {
    pub fn start(labels: ProgressLabels, counters: Arc<ScanCounters>) -> Self {
        let started = Instant::now();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(TICK_INTERVAL);
            // The first tick fires immediately; skip it
            interval.tick().await;
            loop {
                interval.tick().await;
                eprintln!("{}", format_line(started.elapsed(), labels, counters.packets()));
            }
        });
        Self { handle }
    }

    pub fn stop(self) {
        self.handle.abort();
    }
}

fn format_line(elapsed: Duration, labels: ProgressLabels, packets: u64) -> String {
    let seconds = elapsed.as_secs_f64().max(1e-9);
    let pps = packets as f64 / seconds;
    let pct = if labels.total > 0 {
        packets as f64 / labels.total as f64 * 100.0
    } else {
        0.0
    };
    format!(
        "[{}] | Hosts: {} | Ports: {} | Retries: {} | PPS: {:.0} | Packets: {}/{} ({:.0}%)",
        format_duration(elapsed),
        labels.hosts,
        labels.ports,
        labels.retries,
        pps,
        packets,
        labels.total,
        pct
    )
}

fn format_duration(d: Duration) -> String {
    let total = d.as_secs();
    format!("{}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(0)), "0:00:00");
        assert_eq!(format_duration(Duration::from_secs(65)), "0:01:05");
        assert_eq!(format_duration(Duration::from_secs(3725)), "1:02:05");
    }

    #[test]
    fn test_format_line() {
        let labels = ProgressLabels {
            hosts: 4,
            ports: 2,
            retries: 1,
            total: 16,
        };
        let line = format_line(Duration::from_secs(2), labels, 8);
        assert_eq!(
            line,
            "[0:00:02] | Hosts: 4 | Ports: 2 | Retries: 1 | PPS: 4 | Packets: 8/16 (50%)"
        );
    }

    #[test]
    fn test_format_line_zero_total() {
        let labels = ProgressLabels {
            hosts: 0,
            ports: 0,
            retries: 0,
            total: 0,
        };
        let line = format_line(Duration::from_secs(1), labels, 0);
        assert!(line.contains("Packets: 0/0 (0%)"));
    }
}
