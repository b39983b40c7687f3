/// Instrumentation for the rasterization pipeline: thread-safe call and
/// throughput counters, cheap enough to stay on in release builds.
use std::sync::atomic::{AtomicU64, Ordering};

/// Global pipeline counters. Hot loops accumulate locally and add once per
/// triangle, so the per-pixel cost stays out of the atomics.
pub struct FunctionCounters {
    pub draw_calls: AtomicU64,
    pub triangles_in: AtomicU64,
    pub triangles_clipped: AtomicU64,
    pub triangles_culled: AtomicU64,
    pub triangles_rasterized: AtomicU64,
    pub tiles_rasterized: AtomicU64,
    pub fragments_tested: AtomicU64,
    pub fragments_shaded: AtomicU64,
}

pub static FUNCTION_COUNTERS: FunctionCounters = FunctionCounters::new();

impl FunctionCounters {
    pub const fn new() -> Self {
        Self {
            draw_calls: AtomicU64::new(0),
            triangles_in: AtomicU64::new(0),
            triangles_clipped: AtomicU64::new(0),
            triangles_culled: AtomicU64::new(0),
            triangles_rasterized: AtomicU64::new(0),
            tiles_rasterized: AtomicU64::new(0),
            fragments_tested: AtomicU64::new(0),
            fragments_shaded: AtomicU64::new(0),
        }
    }

    /// Reset all counters to zero.
    pub fn reset(&self) {
        self.draw_calls.store(0, Ordering::Relaxed);
        self.triangles_in.store(0, Ordering::Relaxed);
        self.triangles_clipped.store(0, Ordering::Relaxed);
        self.triangles_culled.store(0, Ordering::Relaxed);
        self.triangles_rasterized.store(0, Ordering::Relaxed);
        self.tiles_rasterized.store(0, Ordering::Relaxed);
        self.fragments_tested.store(0, Ordering::Relaxed);
        self.fragments_shaded.store(0, Ordering::Relaxed);
    }

    /// Snapshot of all counters at a point in time.
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            draw_calls: self.draw_calls.load(Ordering::Relaxed),
            triangles_in: self.triangles_in.load(Ordering::Relaxed),
            triangles_clipped: self.triangles_clipped.load(Ordering::Relaxed),
            triangles_culled: self.triangles_culled.load(Ordering::Relaxed),
            triangles_rasterized: self.triangles_rasterized.load(Ordering::Relaxed),
            tiles_rasterized: self.tiles_rasterized.load(Ordering::Relaxed),
            fragments_tested: self.fragments_tested.load(Ordering::Relaxed),
            fragments_shaded: self.fragments_shaded.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CounterSnapshot {
    pub draw_calls: u64,
    pub triangles_in: u64,
    pub triangles_clipped: u64,
    pub triangles_culled: u64,
    pub triangles_rasterized: u64,
    pub tiles_rasterized: u64,
    pub fragments_tested: u64,
    pub fragments_shaded: u64,
}

impl CounterSnapshot {
    pub fn log_report(&self) {
        log::debug!(
            "pipeline counters: draws={} tris_in={} clipped={} culled={} rasterized={} tiles={} frags_tested={} frags_shaded={}",
            self.draw_calls,
            self.triangles_in,
            self.triangles_clipped,
            self.triangles_culled,
            self.triangles_rasterized,
            self.tiles_rasterized,
            self.fragments_tested,
            self.fragments_shaded,
        );
    }
}

/// Bump one counter. Kept as a macro so call sites stay one line.
#[macro_export]
macro_rules! count_call {
    ($counter:expr) => {
        $counter.fetch_add(1, std::sync::atomic::Ordering::Relaxed)
    };
}
