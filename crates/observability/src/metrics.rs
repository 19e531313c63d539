//! 广播指标收集模块
//!
//! 记录监听型 sink 的订阅者生命周期与广播流量。

use metrics::{counter, gauge, histogram};

/// 订阅者被移除的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// 队列已满（慢消费者）
    QueueFull,
    /// 连接写入失败
    ConnectionError,
    /// sink 关闭
    Shutdown,
}

impl DropReason {
    /// 指标标签值
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::QueueFull => "queue_full",
            Self::ConnectionError => "connection_error",
            Self::Shutdown => "shutdown",
        }
    }
}

/// 记录新接入的订阅者
pub fn record_subscriber_accepted(sink_name: &str) {
    counter!(
        "fanout_subscribers_accepted_total",
        "sink" => sink_name.to_string()
    )
    .increment(1);
    gauge!("fanout_subscribers_active", "sink" => sink_name.to_string()).increment(1.0);
}

/// 记录订阅者移除
pub fn record_subscriber_dropped(sink_name: &str, reason: DropReason) {
    counter!(
        "fanout_subscribers_dropped_total",
        "sink" => sink_name.to_string(),
        "reason" => reason.as_str()
    )
    .increment(1);
    gauge!("fanout_subscribers_active", "sink" => sink_name.to_string()).decrement(1.0);
}

/// 记录一次广播
pub fn record_bytes_broadcast(sink_name: &str, bytes: usize, receivers: usize) {
    counter!("fanout_payloads_broadcast_total", "sink" => sink_name.to_string()).increment(1);
    counter!("fanout_bytes_broadcast_total", "sink" => sink_name.to_string())
        .increment((bytes * receivers) as u64);
}

/// 记录生产者写入耗时 (微秒)
pub fn record_write_latency_us(sink_name: &str, latency_us: f64) {
    histogram!("fanout_write_latency_us", "sink" => sink_name.to_string()).record(latency_us);
}

/// 记录转发器对单个输出的写入耗时 (微秒)，按输出 URI 区分
pub fn record_output_write_latency_us(output_uri: &str, latency_us: f64) {
    histogram!("fanout_output_write_latency_us", "output" => output_uri.to_string())
        .record(latency_us);
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    /// 样本数量
    pub fn count(&self) -> u64 {
        self.count
    }

    /// 均值
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    /// 标准差
    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    /// 最小值
    pub fn min(&self) -> f64 {
        self.min
    }

    /// 最大值
    pub fn max(&self) -> f64 {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_stats() {
        let mut stats = RunningStats::default();

        stats.push(1.0);
        stats.push(2.0);
        stats.push(3.0);
        stats.push(4.0);
        stats.push(5.0);

        assert_eq!(stats.count(), 5);
        assert!((stats.mean() - 3.0).abs() < 1e-10);
        assert!((stats.min() - 1.0).abs() < 1e-10);
        assert!((stats.max() - 5.0).abs() < 1e-10);
        assert!((stats.variance() - 2.5).abs() < 1e-10);
    }

    #[test]
    fn test_summary_display_empty() {
        let summary = StatsSummary::from(&RunningStats::default());
        assert_eq!(summary.to_string(), "N/A");
    }

    #[test]
    fn test_drop_reason_labels() {
        assert_eq!(DropReason::QueueFull.as_str(), "queue_full");
        assert_eq!(DropReason::ConnectionError.as_str(), "connection_error");
        assert_eq!(DropReason::Shutdown.as_str(), "shutdown");
    }

    #[test]
    fn test_recorders_without_exporter() {
        // No recorder installed: calls are no-ops
        record_subscriber_accepted("tcp-listen");
        record_subscriber_dropped("tcp-listen", DropReason::QueueFull);
        record_bytes_broadcast("tcp-listen", 10, 3);
        record_write_latency_us("tcp-listen", 12.5);
    }

    #[test]
    fn test_output_latency_is_a_separate_histogram() {
        use metrics::{
            Counter, Gauge, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit,
        };
        use std::sync::{Arc, Mutex};

        struct KeyRecorder(Arc<Mutex<Vec<String>>>);

        impl Recorder for KeyRecorder {
            fn describe_counter(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
            fn describe_gauge(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
            fn describe_histogram(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

            fn register_counter(&self, _: &Key, _: &Metadata<'_>) -> Counter {
                Counter::noop()
            }

            fn register_gauge(&self, _: &Key, _: &Metadata<'_>) -> Gauge {
                Gauge::noop()
            }

            fn register_histogram(&self, key: &Key, _: &Metadata<'_>) -> Histogram {
                self.0.lock().unwrap().push(key.name().to_string());
                Histogram::noop()
            }
        }

        let names = Arc::new(Mutex::new(Vec::new()));
        let recorder = KeyRecorder(Arc::clone(&names));
        metrics::with_local_recorder(&recorder, || {
            record_write_latency_us("tcp-listen", 3.0);
            record_output_write_latency_us("tcp-listen://:9000", 40.0);
        });

        assert_eq!(
            *names.lock().unwrap(),
            vec!["fanout_write_latency_us", "fanout_output_write_latency_us"]
        );
    }
}
