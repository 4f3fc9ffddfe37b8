use crate::error::Result;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Caller-supplied worker pool settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Upper bound on threads per parallel region. `None` means all cores.
    pub thread_cap: Option<usize>,
    /// Pin workers to cores, spreading across physical cores first.
    pub pin_threads: bool,
}

/// Number of threads for a channel-parallel pass.
///
/// `min(channels, cores, floor(log2(samples)), cap)`, never below 1. A
/// channel needs at least `2^threads` samples before another thread pays
/// for itself.
pub fn thread_count(channels: usize, samples_per_channel: usize, cap: Option<usize>) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    thread_count_for(channels, samples_per_channel, cores, cap)
}

pub(crate) fn thread_count_for(
    channels: usize,
    samples_per_channel: usize,
    cores: usize,
    cap: Option<usize>,
) -> usize {
    let depth = samples_per_channel.checked_ilog2().unwrap_or(0) as usize;
    let n = channels.min(cores).min(depth);
    let n = cap.map_or(n, |cap| n.min(cap));
    n.max(1)
}

/// Fixed-size pool shared by every parallel quantizer call.
pub struct WorkerPool {
    pool: rayon::ThreadPool,
    config: PoolConfig,
}

impl WorkerPool {
    pub fn new(config: PoolConfig) -> Result<Self> {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let size = config.thread_cap.map_or(cores, |cap| cap.clamp(1, cores));

        let mut builder = rayon::ThreadPoolBuilder::new()
            .num_threads(size)
            .thread_name(|i| format!("mt-worker-{}", i));

        if config.pin_threads {
            let order = RuntimeConfig::optimized_core_list();
            builder = builder.start_handler(move |thread_id| {
                if let Some(core) = order.as_ref().and_then(|o| o.get(thread_id)) {
                    RuntimeConfig::pin_thread(*core);
                }
            });
        }

        let pool = builder.build()?;
        debug!(threads = size, pinned = config.pin_threads, "worker pool ready");
        Ok(Self { pool, config })
    }

    pub fn size(&self) -> usize {
        self.pool.current_num_threads()
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Threads the heuristic grants a `channels × samples` pass on this pool.
    pub fn threads_for(&self, channels: usize, samples: usize) -> usize {
        let cap = self.config.thread_cap.map_or(self.size(), |c| c.min(self.size()));
        thread_count_for(channels, samples, self.size(), Some(cap))
    }

    /// Runs `f(channel, row)` for every channel of a channel-major buffer.
    ///
    /// Channels are split into `threads_for` contiguous groups; a group owns
    /// its rows exclusively, so workers never write the same element. Returns
    /// once every group has finished.
    pub fn for_each_channel<F>(&self, out: &mut [i8], samples: usize, f: F)
    where
        F: Fn(usize, &mut [i8]) + Sync,
    {
        if samples == 0 || out.is_empty() {
            return;
        }
        let channels = out.len() / samples;
        let threads = self.threads_for(channels, samples);

        if threads == 1 {
            for (channel, row) in out.chunks_mut(samples).enumerate() {
                f(channel, row);
            }
            return;
        }

        let per_group = channels.div_ceil(threads);
        debug!(channels, samples, threads, per_group, "channel-parallel dispatch");

        self.pool.install(|| {
            out.par_chunks_mut(per_group * samples)
                .enumerate()
                .for_each(|(group, rows)| {
                    for (i, row) in rows.chunks_mut(samples).enumerate() {
                        f(group * per_group + i, row);
                    }
                });
        });
    }

    /// Runs `op` inside the pool.
    pub fn install<R: Send>(&self, op: impl FnOnce() -> R + Send) -> R {
        self.pool.install(op)
    }
}

pub struct RuntimeConfig;

impl RuntimeConfig {
    /// Logical core IDs ordered to spread across physical cores first.
    pub fn optimized_core_list() -> Option<Vec<usize>> {
        Topology::detect().map(|t| t.optimized_order())
    }

    /// Pin current thread to a specific core ID.
    pub fn pin_thread(core_id: usize) -> bool {
        core_affinity::get_core_ids()
            .and_then(|ids| ids.into_iter().find(|id| id.id == core_id))
            .map_or(false, core_affinity::set_for_current)
    }
}

#[derive(Debug, Clone)]
pub struct CoreInfo {
    pub logical_id: usize,
    pub socket: usize,
    pub core_id: usize,
}

pub struct Topology {
    pub cores: Vec<CoreInfo>,
}

impl Topology {
    /// Detect CPU topology from /proc/cpuinfo (Linux).
    pub fn detect() -> Option<Self> {
        let content = std::fs::read_to_string("/proc/cpuinfo").ok()?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Option<Self> {
        let mut cores = Vec::new();
        let mut proc_id = None;
        let mut socket = None;
        let mut core_id = None;

        // A trailing empty line flushes the last block.
        for line in content.lines().map(str::trim).chain(std::iter::once("")) {
            if line.is_empty() {
                if let (Some(logical_id), Some(socket), Some(core_id)) = (proc_id, socket, core_id) {
                    cores.push(CoreInfo {
                        logical_id,
                        socket,
                        core_id,
                    });
                }
                proc_id = None;
                socket = None;
                core_id = None;
                continue;
            }

            let value = || -> Option<usize> { line.split(':').nth(1)?.trim().parse().ok() };
            if line.starts_with("processor") {
                proc_id = value();
            } else if line.starts_with("physical id") {
                socket = value();
            } else if line.starts_with("core id") {
                core_id = value();
            }
        }

        if cores.is_empty() {
            None
        } else {
            Some(Self { cores })
        }
    }

    /// First hyperthread of every physical core, then the siblings.
    pub fn optimized_order(&self) -> Vec<usize> {
        use std::collections::BTreeMap;

        let mut siblings: BTreeMap<(usize, usize), Vec<usize>> = BTreeMap::new();
        for core in &self.cores {
            siblings
                .entry((core.socket, core.core_id))
                .or_default()
                .push(core.logical_id);
        }

        let depth = siblings.values().map(Vec::len).max().unwrap_or(0);
        (0..depth)
            .flat_map(|level| siblings.values().filter_map(move |s| s.get(level).copied()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thread_count_heuristic() {
        // One sample per channel: log2(1) = 0, falls back to one thread.
        assert_eq!(thread_count_for(24, 1, 16, None), 1);
        assert_eq!(thread_count_for(24, 0, 16, None), 1);
        // 4 samples -> at most 2 threads.
        assert_eq!(thread_count_for(24, 4, 16, None), 2);
        // Limited by cores.
        assert_eq!(thread_count_for(24, 1 << 20, 8, None), 8);
        // Limited by channels.
        assert_eq!(thread_count_for(3, 1 << 20, 8, None), 3);
        // Limited by the cap.
        assert_eq!(thread_count_for(24, 1 << 20, 8, Some(2)), 2);
        assert_eq!(thread_count_for(24, 1 << 20, 8, Some(0)), 1);
        assert!(thread_count(24, 1024, None) >= 1);
    }

    #[test]
    fn test_for_each_channel_covers_every_row() {
        let pool = WorkerPool::new(PoolConfig {
            thread_cap: Some(4),
            pin_threads: false,
        })
        .unwrap();

        let samples = 64;
        let channels = 7;
        let mut out = vec![0i8; samples * channels];
        pool.for_each_channel(&mut out, samples, |channel, row| {
            for v in row.iter_mut() {
                *v = channel as i8;
            }
        });

        for (channel, row) in out.chunks(samples).enumerate() {
            assert!(row.iter().all(|&v| v == channel as i8));
        }

        let mut empty: Vec<i8> = Vec::new();
        pool.for_each_channel(&mut empty, 0, |_, _| unreachable!());
    }

    #[test]
    fn test_topology_order() {
        let cpuinfo = "processor : 0\nphysical id : 0\ncore id : 0\n\n\
                       processor : 1\nphysical id : 0\ncore id : 1\n\n\
                       processor : 2\nphysical id : 0\ncore id : 0\n\n\
                       processor : 3\nphysical id : 0\ncore id : 1";
        let topo = Topology::parse(cpuinfo).unwrap();
        assert_eq!(topo.cores.len(), 4);
        assert_eq!(topo.optimized_order(), vec![0, 1, 2, 3]);

        assert!(Topology::parse("").is_none());
    }
}
