//! Pipelines: named groups of systems ticking on a common schedule.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use engine_system::SystemDescriptor;

use crate::config::PipelineConfig;
use crate::registry::{SystemHandle, SystemRegistry};
use crate::scheduler;

/// Execution statistics of one pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub executed_ticks: u64,
    pub total_execution_time: Duration,
    pub last_tick_duration: Duration,
}

impl PipelineStats {
    #[must_use]
    pub fn average_tick_duration(&self) -> Duration {
        u32::try_from(self.executed_ticks)
            .ok()
            .filter(|&ticks| ticks > 0)
            .map_or(Duration::ZERO, |ticks| self.total_execution_time / ticks)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Running,
    Paused,
}

/// Pause flag shared between the manager handle and the dispatch thread.
#[derive(Debug, Default)]
pub(crate) struct PipelineControl {
    paused: AtomicBool,
}

impl PipelineControl {
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// Returns the previous value.
    pub fn set_paused(&self, paused: bool) -> bool {
        self.paused.swap(paused, Ordering::AcqRel)
    }

    pub fn state(&self) -> PipelineState {
        if self.is_paused() { PipelineState::Paused } else { PipelineState::Running }
    }
}

#[derive(Debug)]
pub(crate) struct Pipeline {
    pub name: String,
    /// `None` for uninterval pipelines.
    pub period: Option<Duration>,
    /// Member systems in registration order.
    pub systems: Vec<SystemHandle>,
    pub control: Arc<PipelineControl>,
    pub stats: PipelineStats,
    /// Id of the last tick started.
    pub tick_id: u64,
    /// Cached stages as handles, recomputed when membership changes.
    stages: Vec<Vec<SystemHandle>>,
    stages_dirty: bool,
    /// Earliest start of the next tick for interval pipelines.
    next_deadline: Option<Instant>,
    last_tick_start: Option<Instant>,
}

impl Pipeline {
    #[must_use]
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            name: config.name,
            period: config.period,
            systems: Vec::new(),
            control: Arc::new(PipelineControl::default()),
            stats: PipelineStats::default(),
            tick_id: 0,
            stages: Vec::new(),
            stages_dirty: true,
            next_deadline: None,
            last_tick_start: None,
        }
    }

    pub fn add_system(&mut self, handle: SystemHandle) {
        self.systems.push(handle);
        self.stages_dirty = true;
    }

    pub fn remove_system(&mut self, handle: SystemHandle) -> bool {
        let before = self.systems.len();
        self.systems.retain(|&h| h != handle);
        self.stages_dirty = true;
        self.systems.len() != before
    }

    /// Recomputes stages if membership changed. Returns `true` if it did.
    pub fn refresh_stages(&mut self, registry: &SystemRegistry) -> bool {
        if !self.stages_dirty {
            return false;
        }
        let members: Vec<(SystemHandle, &SystemDescriptor)> = self
            .systems
            .iter()
            .filter_map(|&handle| registry.get(handle).map(|entry| (handle, &entry.descriptor)))
            .collect();
        let descriptors: Vec<&SystemDescriptor> = members.iter().map(|(_, d)| *d).collect();
        self.stages = scheduler::compute_stages(&descriptors)
            .into_iter()
            .map(|stage| stage.system_indices.into_iter().map(|i| members[i].0).collect())
            .collect();
        self.stages_dirty = false;
        true
    }

    #[must_use]
    pub fn stages(&self) -> &[Vec<SystemHandle>] {
        &self.stages
    }

    /// When this pipeline next wants to tick. `None` means now.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.period.and(self.next_deadline)
    }

    #[must_use]
    pub fn is_due(&self, now: Instant) -> bool {
        self.next_deadline().is_none_or(|deadline| deadline <= now)
    }

    /// Starts a tick, returning its id and timestep in seconds.
    ///
    /// Interval pipelines report their period; uninterval pipelines report
    /// the time since their previous tick started.
    pub fn begin_tick(&mut self, now: Instant) -> (u64, f64) {
        self.tick_id += 1;
        let dt = match (self.period, self.last_tick_start) {
            (Some(period), _) => period.as_secs_f64(),
            (None, Some(last)) => now.duration_since(last).as_secs_f64(),
            (None, None) => 0.0,
        };
        self.last_tick_start = Some(now);
        (self.tick_id, dt)
    }

    /// Records a finished tick. Returns `true` if it overran its period.
    ///
    /// Interval deadlines advance by whole periods from the previous
    /// deadline, so wake-up latency does not accumulate. A tick that started
    /// a full period or more past its deadline drops the missed ticks and
    /// restarts the schedule from its own start.
    pub fn finish_tick(&mut self, started: Instant, elapsed: Duration) -> bool {
        self.stats.executed_ticks += 1;
        self.stats.total_execution_time += elapsed;
        self.stats.last_tick_duration = elapsed;
        match self.period {
            Some(period) => {
                let next = match self.next_deadline {
                    Some(deadline) if started < deadline + period => deadline + period,
                    _ => started + period,
                };
                self.next_deadline = Some(next);
                elapsed > period
            }
            None => false,
        }
    }

    /// Forgets the schedule so a resumed pipeline ticks right away.
    pub fn reset_deadline(&mut self) {
        self.next_deadline = None;
    }
}
