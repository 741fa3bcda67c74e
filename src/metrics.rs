//! Prometheus metrics for monitoring
//!
//! Counters, gauges, and histograms exported in text format from the
//! worker's metrics endpoint.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Instant;

/// Counter metric (monotonically increasing)
pub struct Counter {
    value: AtomicU64,
    name: String,
    help: String,
}

impl Counter {
    /// Create a new counter
    pub fn new(name: &str, help: &str) -> Self {
        Self {
            value: AtomicU64::new(0),
            name: name.into(),
            help: help.into(),
        }
    }

    /// Increment by 1
    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment by delta
    pub fn inc_by(&self, delta: u64) {
        self.value.fetch_add(delta, Ordering::Relaxed);
    }

    /// Get current value
    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }

    /// Format as Prometheus metric
    pub fn to_prometheus(&self) -> String {
        format!(
            "# HELP {} {}\n# TYPE {} counter\n{} {}\n",
            self.name, self.help, self.name, self.name, self.get()
        )
    }
}

/// Gauge metric (can go up or down)
pub struct Gauge {
    value: AtomicI64,
    name: String,
    help: String,
}

impl Gauge {
    /// Create a new gauge
    pub fn new(name: &str, help: &str) -> Self {
        Self {
            value: AtomicI64::new(0),
            name: name.into(),
            help: help.into(),
        }
    }

    /// Set value
    pub fn set(&self, val: i64) {
        self.value.store(val, Ordering::Relaxed);
    }

    /// Increment by 1
    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    /// Decrement by 1
    pub fn dec(&self) {
        self.value.fetch_sub(1, Ordering::Relaxed);
    }

    /// Get current value
    pub fn get(&self) -> i64 {
        self.value.load(Ordering::Relaxed)
    }

    /// Format as Prometheus metric
    pub fn to_prometheus(&self) -> String {
        format!(
            "# HELP {} {}\n# TYPE {} gauge\n{} {}\n",
            self.name, self.help, self.name, self.name, self.get()
        )
    }
}

/// Histogram for latency measurements
pub struct Histogram {
    buckets: Vec<(f64, AtomicU64)>,
    sum: AtomicU64,
    count: AtomicU64,
    name: String,
    help: String,
}

impl Histogram {
    /// Create with default latency buckets
    pub fn new(name: &str, help: &str) -> Self {
        Self::with_buckets(
            name,
            help,
            vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0],
        )
    }

    /// Create with custom buckets
    pub fn with_buckets(name: &str, help: &str, bounds: Vec<f64>) -> Self {
        let buckets = bounds.into_iter().map(|b| (b, AtomicU64::new(0))).collect();
        Self {
            buckets,
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
            name: name.into(),
            help: help.into(),
        }
    }

    /// Observe a value in seconds
    pub fn observe(&self, value: f64) {
        self.count.fetch_add(1, Ordering::Relaxed);

        // Sum kept as integer micros for lock-free accumulation.
        let micros = (value * 1_000_000.0) as u64;
        self.sum.fetch_add(micros, Ordering::Relaxed);

        for (bound, count) in &self.buckets {
            if value <= *bound {
                count.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Time a closure and record the duration
    pub fn time<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let start = Instant::now();
        let result = f();
        self.observe(start.elapsed().as_secs_f64());
        result
    }

    /// Format as Prometheus metric
    pub fn to_prometheus(&self) -> String {
        let mut output = format!(
            "# HELP {} {}\n# TYPE {} histogram\n",
            self.name, self.help, self.name
        );

        for (bound, count) in &self.buckets {
            output.push_str(&format!(
                "{}_bucket{{le=\"{}\"}} {}\n",
                self.name,
                bound,
                count.load(Ordering::Relaxed)
            ));
        }

        let sum_secs = self.sum.load(Ordering::Relaxed) as f64 / 1_000_000.0;
        output.push_str(&format!("{}_sum {}\n", self.name, sum_secs));
        output.push_str(&format!(
            "{}_count {}\n",
            self.name,
            self.count.load(Ordering::Relaxed)
        ));

        output
    }
}

/// Standard Colony metrics
pub mod standard {
    use super::*;
    use std::sync::LazyLock;

    pub static LEASES_ACQUIRED: LazyLock<Counter> = LazyLock::new(|| {
        Counter::new(
            "colony_leases_acquired_total",
            "Total leases acquired by this worker",
        )
    });

    pub static LEASES_LOST: LazyLock<Counter> = LazyLock::new(|| {
        Counter::new(
            "colony_leases_lost_total",
            "Total leases lost through denial or store trouble",
        )
    });

    pub static ACQUIRE_DENIED: LazyLock<Counter> = LazyLock::new(|| {
        Counter::new(
            "colony_acquire_denied_total",
            "Acquire attempts lost to another owner",
        )
    });

    pub static INIT_FAILURES: LazyLock<Counter> = LazyLock::new(|| {
        Counter::new("colony_init_failures_total", "Agent init failures")
    });

    pub static WORK_FAILURES: LazyLock<Counter> = LazyLock::new(|| {
        Counter::new("colony_work_failures_total", "Agent work failures")
    });

    pub static WORK_CYCLES: LazyLock<Counter> = LazyLock::new(|| {
        Counter::new("colony_work_cycles_total", "Completed agent work calls")
    });

    pub static OWNED_SHARDS: LazyLock<Gauge> = LazyLock::new(|| {
        Gauge::new("colony_owned_shards", "Shards currently owned by this worker")
    });

    pub static WATCHED_SHARDS: LazyLock<Gauge> = LazyLock::new(|| {
        Gauge::new("colony_watched_shards", "Shards this worker is watching")
    });

    pub static WORK_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
        Histogram::new("colony_work_duration_seconds", "Agent work call latency")
    });

    pub static RENEW_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
        Histogram::new("colony_renew_duration_seconds", "Lease renewal latency")
    });
}

/// Gather all standard metrics in Prometheus text format
pub fn gather_system_metrics() -> String {
    let mut output = String::new();

    output.push_str(&standard::LEASES_ACQUIRED.to_prometheus());
    output.push_str(&standard::LEASES_LOST.to_prometheus());
    output.push_str(&standard::ACQUIRE_DENIED.to_prometheus());
    output.push_str(&standard::INIT_FAILURES.to_prometheus());
    output.push_str(&standard::WORK_FAILURES.to_prometheus());
    output.push_str(&standard::WORK_CYCLES.to_prometheus());

    output.push_str(&standard::OWNED_SHARDS.to_prometheus());
    output.push_str(&standard::WATCHED_SHARDS.to_prometheus());

    output.push_str(&standard::WORK_DURATION.to_prometheus());
    output.push_str(&standard::RENEW_DURATION.to_prometheus());

    output
}
