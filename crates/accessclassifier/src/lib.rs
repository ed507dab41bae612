//! Sequential-vs-random read classifier (spec §4.2).
//!
//! Maintains a fixed-capacity ring of recent `(fd, offset)` read samples and,
//! every time the ring wraps, re-estimates whether current read traffic looks
//! sequential or randomly scattered. The only externally visible effect is a
//! boolean the read path consults to decide whether to attach a
//! `CACHE_FORGET` hint to its reply.
//!
//! The weighted-mean step (`classify`) is mathematically unusual — it biases
//! the mean toward samples from later-sorted (i.e. larger) file descriptors
//! on purpose, so that traffic crossing segment-file boundaries reads as
//! more dispersed than it would under a plain mean. This is preserved
//! verbatim per spec §4.2/§9; do not "fix" it.

use std::sync::Mutex;
use tracing::info;

pub const RING_CAP: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessSample {
    pub fd: i32,
    pub offset: u64,
}

impl Default for AccessSample {
    fn default() -> Self {
        AccessSample { fd: -1, offset: 0 }
    }
}

struct Inner {
    last_reads: [AccessSample; RING_CAP],
    write_idx: usize,
    random_access: bool,
}

/// Guarded classifier state. Cheap to construct; intended to be held once
/// per backend instance behind an `Arc`.
pub struct Classifier {
    inner: Mutex<Inner>,
    vm_total_sq: u64,
}

impl Classifier {
    pub fn new(vm_total_sq: u64) -> Self {
        Classifier {
            inner: Mutex::new(Inner {
                last_reads: [AccessSample::default(); RING_CAP],
                write_idx: 0,
                random_access: false,
            }),
            vm_total_sq,
        }
    }

    /// Records a read that yielded a valid file descriptor and returns
    /// whether the *current* classification is "random access" — i.e.
    /// whether this read's reply should carry `CACHE_FORGET`.
    ///
    /// Classification itself only runs when the ring wraps (spec §3
    /// Invariant 3); between wraps this returns the last computed verdict.
    pub fn record_read(&self, fd: i32, offset: u64) -> bool {
        if fd < 0 {
            return self.inner.lock().unwrap().random_access;
        }

        let mut inner = self.inner.lock().unwrap();
        let idx = inner.write_idx;
        inner.last_reads[idx] = AccessSample { fd, offset };
        inner.write_idx += 1;

        if inner.write_idx == RING_CAP {
            let was_random = inner.random_access;
            let now_random = classify(&inner.last_reads, self.vm_total_sq);
            inner.random_access = now_random;
            inner.write_idx = 0;
            if was_random != now_random {
                info!(
                    was_random,
                    now_random, "access pattern classification flipped"
                );
            }
        }

        inner.random_access
    }

    pub fn is_random_access(&self) -> bool {
        self.inner.lock().unwrap().random_access
    }
}

/// Sorts a snapshot of the ring by `(fd asc, offset asc)`, computes the
/// weighted mean offset (spec §4.2 step b) and the mean-squared deviation of
/// the *raw* offsets from it (step c), and compares against
/// `vm_total_sq / 16` (step d).
fn classify(samples: &[AccessSample; RING_CAP], vm_total_sq: u64) -> bool {
    let mut sorted = *samples;
    sorted.sort_by(|a, b| a.fd.cmp(&b.fd).then(a.offset.cmp(&b.offset)));

    let mut mult: f64 = 1.0;
    let mut weighted_sum: f64 = 0.0;
    let mut prev_fd: Option<i32> = None;
    for s in sorted.iter() {
        if let Some(p) = prev_fd {
            if p != s.fd {
                mult += 1.0;
            }
        }
        weighted_sum += s.offset as f64 * mult;
        prev_fd = Some(s.fd);
    }
    let mean = weighted_sum / RING_CAP as f64;

    let mse: f64 = samples
        .iter()
        .map(|s| {
            let d = s.offset as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / RING_CAP as f64;

    let threshold = vm_total_sq as f64 / 16.0;
    mse > threshold
}

/// `vm_total_sq = (system_total_memory_MiB)^2 * 1 MiB` (spec §3 Invariant 4).
///
/// Read once at backend init. Computed from `/proc/meminfo` on Linux;
/// platforms without it fall back to a conservative 8 GiB assumption so the
/// classifier still has a sane (if not measured) threshold.
pub fn compute_vm_total_sq() -> u64 {
    const MIB: u64 = 1024 * 1024;
    let total_mib = system_total_memory_mib().unwrap_or(8 * 1024);
    total_mib * total_mib * MIB
}

#[cfg(target_os = "linux")]
fn system_total_memory_mib() -> Option<u64> {
    let content = std::fs::read_to_string("/proc/meminfo").ok()?;
    for line in content.lines() {
        if let Some(rest) = line.strip_prefix("MemTotal:") {
            let kib: u64 = rest.trim().trim_end_matches(" kB").trim().parse().ok()?;
            return Some(kib / 1024);
        }
    }
    None
}

#[cfg(not(target_os = "linux"))]
fn system_total_memory_mib() -> Option<u64> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn identical_offsets_stay_sequential() {
        let vm_total_sq = compute_vm_total_sq();
        let classifier = Classifier::new(vm_total_sq);
        let mut random = false;
        for _ in 0..RING_CAP {
            random = classifier.record_read(3, 4096);
        }
        assert!(!random, "identical (fd, offset) reads must never look random");
    }

    #[test]
    fn sequential_offsets_in_one_fd_stay_sequential() {
        let vm_total_sq = compute_vm_total_sq();
        let classifier = Classifier::new(vm_total_sq);
        let mut random = false;
        for i in 0..RING_CAP as u64 {
            random = classifier.record_read(3, i * 4096);
        }
        assert!(!random);
    }

    #[test]
    fn wide_scatter_across_two_fds_looks_random() {
        let vm_total_sq = compute_vm_total_sq();
        let classifier = Classifier::new(vm_total_sq);
        let spread = 4.0 * (vm_total_sq as f64).sqrt();
        let mut rng = rand::thread_rng();
        let mut random = false;
        for i in 0..RING_CAP {
            let fd = if i % 2 == 0 { 3 } else { 4 };
            let offset = rng.gen_range(0..spread as u64);
            random = classifier.record_read(fd, offset);
        }
        assert!(random);
    }

    #[test]
    fn classification_only_happens_on_wrap() {
        let classifier = Classifier::new(compute_vm_total_sq());
        for _ in 0..RING_CAP - 1 {
            classifier.record_read(1, 0);
        }
        assert!(!classifier.is_random_access());
    }

    #[test]
    fn negative_fd_is_ignored() {
        let classifier = Classifier::new(compute_vm_total_sq());
        assert!(!classifier.record_read(-1, 12345));
    }
}
