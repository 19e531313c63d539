//! Forwarding statistics.

use std::time::Duration;

use observability::{RunningStats, StatsSummary};

/// Per-output counters
#[derive(Debug, Clone, Default)]
pub struct OutputStats {
    /// Resolution string the output was built from
    pub uri: String,

    /// Successful writes
    pub writes: u64,

    /// Bytes accepted by the sink
    pub bytes: u64,

    /// Write failed and the output was retired
    pub failed: bool,

    /// Write latency in microseconds
    pub latency_us: RunningStats,
}

impl OutputStats {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            ..Default::default()
        }
    }
}

/// Statistics from a forwarding run
#[derive(Debug, Clone, Default)]
pub struct ForwardStats {
    /// Frames read from the input
    pub frames_read: u64,

    /// Bytes read from the input
    pub bytes_read: u64,

    /// Total duration of the run
    pub duration: Duration,

    /// Stopped by a signal rather than end of input
    pub interrupted: bool,

    pub outputs: Vec<OutputStats>,
}

impl ForwardStats {
    /// Frames per second throughput
    pub fn fps(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.frames_read as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Outputs still healthy at the end of the run
    pub fn live_outputs(&self) -> usize {
        self.outputs.iter().filter(|o| !o.failed).count()
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        eprintln!("\n=== Forwarding Statistics ===\n");
        eprintln!("Overview");
        eprintln!("  Duration: {:.2}s", self.duration.as_secs_f64());
        eprintln!("  Frames read: {}", self.frames_read);
        eprintln!("  Bytes read: {}", self.bytes_read);
        eprintln!("  FPS: {:.2}", self.fps());
        eprintln!(
            "  Outputs: {} live / {} total",
            self.live_outputs(),
            self.outputs.len()
        );
        if self.interrupted {
            eprintln!("  Stopped by signal");
        }

        eprintln!("\nOutputs");
        for output in &self.outputs {
            let state = if output.failed { "failed" } else { "ok" };
            eprintln!(
                "  {} [{}] writes={} bytes={}",
                output.uri, state, output.writes, output.bytes
            );
            eprintln!(
                "    latency_us: {}",
                StatsSummary::from(&output.latency_us)
            );
        }
        eprintln!();
    }
}
