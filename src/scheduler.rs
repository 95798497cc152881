//! Idle Scheduler
//!
//! Runs once per host idle tick:
//! 1. meters: every queued sample is pushed once (newest per bank), bypassing the dirty set
//! 2. drain: up to `tick_budget` dirty records in drain order
//! 3. for each drained element the value is read *now*, from local overrides
//!    or the host, and pushed; failures go back into the dirty set
//!
//! Nothing is drained until the gate is opened by the first full surface
//! init, so the first real drain is always a complete snapshot.

use std::collections::BTreeSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::dirty::meters::MeterQueue;
use crate::engine::SurfaceContext;
use crate::host::HostStateReader;
use crate::sink::HardwareSink;
use crate::surface::{buttons, BeatIndicator, SurfaceElement, SurfaceValue};

/// Scheduler tuning, hot-reloadable
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SchedulerSettings {
    /// Maximum dirty records drained per tick
    #[serde(default = "default_tick_budget")]
    pub tick_budget: usize,

    /// Idle cadence of the standalone runner (a host sets its own)
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Consecutive failures between two warnings for the same element
    #[serde(default = "default_failure_warn_threshold")]
    pub failure_warn_threshold: u32,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            tick_budget: default_tick_budget(),
            tick_interval_ms: default_tick_interval_ms(),
            failure_warn_threshold: default_failure_warn_threshold(),
        }
    }
}

impl SchedulerSettings {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }
}

fn default_tick_budget() -> usize { 16 }
fn default_tick_interval_ms() -> u64 { 20 }
fn default_failure_warn_threshold() -> u32 { 5 }

/// What one tick did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub meters_pushed: usize,
    pub meters_failed: usize,
    pub drained: usize,
    pub pushed: usize,
    pub failed: usize,
    /// Drained records the host had no value for
    pub skipped: usize,
}

impl TickReport {
    pub fn is_idle(&self) -> bool {
        *self == TickReport::default()
    }
}

/// Engine-owned values that take precedence over the host
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalValues<'a> {
    /// Temporary hint shown on display line 0
    pub temp_message: Option<&'a str>,
    pub beat: BeatIndicator,
}

impl LocalValues<'_> {
    pub fn resolve(&self, element: SurfaceElement) -> Option<SurfaceValue> {
        match element {
            SurfaceElement::DisplayLine(0) => self
                .temp_message
                .map(|text| SurfaceValue::Text(text.to_string())),
            SurfaceElement::TransportLed(buttons::BEAT) => Some(SurfaceValue::Led(self.beat.led_state())),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct IdleScheduler {
    settings: SchedulerSettings,
    ready: bool,
}

impl IdleScheduler {
    pub fn new(settings: SchedulerSettings) -> Self {
        Self {
            settings,
            ready: false,
        }
    }

    /// Allow draining; called once the full surface init is marked
    pub fn open_gate(&mut self) {
        if !self.ready {
            debug!("Scheduler gate open");
        }
        self.ready = true;
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn reset(&mut self) {
        self.ready = false;
    }

    pub fn settings(&self) -> &SchedulerSettings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: SchedulerSettings) {
        if settings != self.settings {
            debug!(
                "Scheduler settings: budget {} -> {}, warn threshold {} -> {}",
                self.settings.tick_budget,
                settings.tick_budget,
                self.settings.failure_warn_threshold,
                settings.failure_warn_threshold
            );
        }
        self.settings = settings;
    }

    /// Run one tick
    ///
    /// `held` elements are left pending (e.g. a strip whose fader is touched).
    pub fn tick<H, S, F>(
        &mut self,
        ctx: &mut SurfaceContext<H, S>,
        meters: &mut MeterQueue,
        local: &LocalValues<'_>,
        held: F,
    ) -> TickReport
    where
        H: HostStateReader,
        S: HardwareSink,
        F: Fn(SurfaceElement) -> bool,
    {
        let mut report = TickReport::default();

        if !self.ready {
            if !meters.is_empty() {
                trace!("Dropping {} meter sample(s) before first init", meters.len());
                meters.clear();
            }
            return report;
        }

        let metered = self.push_meters(ctx, meters, &mut report);

        if ctx.dirty.is_empty() {
            return report;
        }

        let batch = ctx.dirty.drain_where(self.settings.tick_budget, |element| {
            let metered_now = matches!(element, SurfaceElement::MeterBank(track) if metered.contains(track));
            !metered_now && !held(*element)
        });
        report.drained = batch.len();

        for (element, intent) in batch {
            let value = local
                .resolve(element)
                .or_else(|| ctx.host.read_current_value(element));

            let Some(value) = value else {
                debug!("No host value for {}, dropping update", element);
                ctx.dirty.acknowledge(element);
                report.skipped += 1;
                continue;
            };

            match ctx.sink.push(element, &value.for_intent(intent)) {
                Ok(()) => {
                    trace!("Pushed {} ({:?})", element, intent);
                    ctx.dirty.acknowledge(element);
                    report.pushed += 1;
                }
                Err(e) => {
                    report.failed += 1;
                    let failures = ctx.dirty.requeue(element).unwrap_or(1);
                    self.log_failure(element, failures, &e);
                }
            }
        }

        trace!("Tick: {:?}, {} still dirty", report, ctx.dirty.len());
        report
    }

    /// Push every queued meter sample once
    fn push_meters<H, S>(
        &self,
        ctx: &mut SurfaceContext<H, S>,
        meters: &mut MeterQueue,
        report: &mut TickReport,
    ) -> BTreeSet<u16>
    where
        H: HostStateReader,
        S: HardwareSink,
    {
        let mut metered = BTreeSet::new();
        for (track, level) in meters.take() {
            // One attempt per bank per tick, failed or not
            metered.insert(track);
            match ctx.sink.push(SurfaceElement::MeterBank(track), &SurfaceValue::Meter(level)) {
                Ok(()) => {
                    report.meters_pushed += 1;
                }
                Err(e) => {
                    // Latest-value stream: the next sample replaces this one
                    trace!("Meter {} push failed: {}", track, e);
                    report.meters_failed += 1;
                }
            }
        }
        metered
    }

    fn log_failure(&self, element: SurfaceElement, failures: u32, error: &crate::sink::PushError) {
        let threshold = self.settings.failure_warn_threshold.max(1);
        if failures % threshold == 0 {
            warn!("Push to {} failed {} times in a row: {}", element, failures, error);
        } else {
            debug!("Push to {} failed ({}), will retry", element, error);
        }
    }
}
