use super::{clamp_period, SamplerTask};
use crate::error::{PerfwatchError, Result};
use crate::events::{EventBus, PerfEvent};
use crate::metrics::{MemorySample, MetricsStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Platform heap-usage counters
pub trait HeapIntrospector: Send + Sync + 'static {
    /// Take one snapshot. `PerfwatchError::Unavailable` when the platform
    /// cannot report heap usage at all.
    fn read_heap(&self) -> Result<MemorySample>;
}

/// Introspector for platforms without heap counters
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableIntrospector;

impl HeapIntrospector for UnavailableIntrospector {
    fn read_heap(&self) -> Result<MemorySample> {
        Err(PerfwatchError::unavailable("heap introspection"))
    }
}

/// Reads process memory from procfs.
///
/// `used_bytes` is the resident set, `total_bytes` the virtual size, and
/// `limit_bytes` the address-space rlimit or, when unlimited, physical memory.
#[derive(Debug, Clone)]
pub struct ProcIntrospector {
    statm_path: String,
    meminfo_path: String,
}

impl ProcIntrospector {
    pub fn new() -> Self {
        Self {
            statm_path: "/proc/self/statm".to_string(),
            meminfo_path: "/proc/meminfo".to_string(),
        }
    }

    /// Read from alternate procfs files
    pub fn with_paths<S: Into<String>>(statm_path: S, meminfo_path: S) -> Self {
        Self {
            statm_path: statm_path.into(),
            meminfo_path: meminfo_path.into(),
        }
    }

    fn limit_bytes(&self) -> u64 {
        address_space_limit()
            .or_else(|| {
                std::fs::read_to_string(&self.meminfo_path)
                    .ok()
                    .and_then(|contents| parse_mem_total(&contents))
            })
            .unwrap_or(0)
    }
}

impl Default for ProcIntrospector {
    fn default() -> Self {
        Self::new()
    }
}

impl HeapIntrospector for ProcIntrospector {
    fn read_heap(&self) -> Result<MemorySample> {
        let statm = std::fs::read_to_string(&self.statm_path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                PerfwatchError::unavailable(format!("{} not present", self.statm_path))
            } else {
                PerfwatchError::Io(e)
            }
        })?;

        let (size_pages, resident_pages) = parse_statm(&statm)?;
        let page = page_size();

        Ok(MemorySample::new(
            resident_pages.saturating_mul(page),
            size_pages.saturating_mul(page),
            self.limit_bytes(),
        ))
    }
}

/// Heap introspector appropriate for the current platform
pub fn default_introspector() -> Arc<dyn HeapIntrospector> {
    if cfg!(target_os = "linux") {
        Arc::new(ProcIntrospector::new())
    } else {
        Arc::new(UnavailableIntrospector)
    }
}

/// First two fields of statm: total program size and resident set, in pages
pub(crate) fn parse_statm(contents: &str) -> Result<(u64, u64)> {
    let mut fields = contents.split_whitespace().map(str::parse::<u64>);
    match (fields.next(), fields.next()) {
        (Some(Ok(size)), Some(Ok(resident))) => Ok((size, resident)),
        _ => Err(PerfwatchError::parse("statm", "expected size and resident page counts")),
    }
}

/// `MemTotal` from meminfo, in bytes
pub(crate) fn parse_mem_total(contents: &str) -> Option<u64> {
    contents.lines().find_map(|line| {
        let rest = line.strip_prefix("MemTotal:")?;
        let kib = rest.trim().trim_end_matches("kB").trim().parse::<u64>().ok()?;
        Some(kib * 1024)
    })
}

#[cfg(unix)]
fn page_size() -> u64 {
    // SAFETY: sysconf has no memory-safety preconditions
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size > 0 {
        size as u64
    } else {
        4096
    }
}

#[cfg(not(unix))]
fn page_size() -> u64 {
    4096
}

#[cfg(unix)]
fn address_space_limit() -> Option<u64> {
    let mut limit = libc::rlimit {
        rlim_cur: 0,
        rlim_max: 0,
    };
    // SAFETY: `limit` is a valid, writable rlimit for the duration of the call
    let rc = unsafe { libc::getrlimit(libc::RLIMIT_AS, &mut limit) };
    if rc != 0 || limit.rlim_cur == libc::RLIM_INFINITY {
        None
    } else {
        Some(limit.rlim_cur as u64)
    }
}

#[cfg(not(unix))]
fn address_space_limit() -> Option<u64> {
    None
}

/// Periodically snapshots heap usage into the metrics record
pub struct MemorySampler {
    interval: Duration,
    store: Arc<MetricsStore>,
    event_bus: EventBus,
    task: Option<SamplerTask>,
}

impl MemorySampler {
    /// Intervals shorter than [`super::MIN_SAMPLE_PERIOD`] are raised to it
    pub fn new(interval: Duration, store: Arc<MetricsStore>, event_bus: EventBus) -> Self {
        Self {
            interval: clamp_period(interval, "Memory sampling"),
            store,
            event_bus,
            task: None,
        }
    }

    /// Start sampling. A running loop is replaced.
    pub async fn start(&mut self, introspector: Arc<dyn HeapIntrospector>) {
        if let Some(previous) = self.task.take() {
            warn!("Memory sampler already running, restarting");
            previous.shutdown("memory sampler").await;
        }

        info!("Starting memory sampler ({:?} interval)", self.interval);

        let period = self.interval;
        let store = Arc::clone(&self.store);
        let event_bus = self.event_bus.clone();
        self.task = Some(SamplerTask::spawn(move |cancel| {
            run(introspector, period, store, event_bus, cancel)
        }));
    }

    /// Stop sampling. Calling this when already stopped does nothing.
    pub async fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.shutdown("memory sampler").await;
            info!("Memory sampler stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

async fn run(
    introspector: Arc<dyn HeapIntrospector>,
    period: Duration,
    store: Arc<MetricsStore>,
    event_bus: EventBus,
    cancel: CancellationToken,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut failure_logged = false;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        match introspector.read_heap() {
            Ok(sample) => {
                failure_logged = false;
                store.record_memory(sample);
                event_bus.publish(PerfEvent::MemorySampled { sample });
            }
            Err(e) => {
                // Absent counters are expected on many platforms
                if !failure_logged {
                    debug!("No heap sample this tick: {}", e);
                    failure_logged = true;
                }
            }
        }
    }
}
