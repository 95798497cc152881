//! Surface engine - one instance per physical unit
//!
//! ```text
//!  host callbacks ──┐
//!                   ├──► ChangeClassifier ──► Coalescer ──► DirtySet ──► IdleScheduler ──► HardwareSink
//!  surface MIDI ────┘                                           ▲               │
//!                                                               │        HostStateReader
//!                                                     touch guard, temp message, beat
//! ```
//!
//! Every callback is synchronous and returns promptly. Nothing here returns
//! an error to the host: bad input is logged and dropped, failed pushes are
//! retried on a later tick.
//!
//! A main unit and its extenders run as separate engines, each with its own
//! dirty set. They share nothing but the host they read from.

mod context;
pub mod touch_guard;


pub use context::SurfaceContext;
pub use touch_guard::TouchGuard;

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use tracing::{debug, info, trace, warn};

use crate::classifier::{ChangeCategory, ChangeClassifier, ChangeEvent, Fader, HardwareInputEvent};
use crate::dirty::coalescer::{Coalescer, TrackScope};
use crate::dirty::meters::MeterQueue;
use crate::dirty::DirtySet;
use crate::host::HostStateReader;
use crate::scheduler::{IdleScheduler, LocalValues, SchedulerSettings, TickReport};
use crate::sink::HardwareSink;
use crate::surface::{
    buttons, BeatIndicator, SurfaceElement, SurfaceLayout, SurfaceValue, TrackIndex, UpdateIntent,
};

/// `OnProjectLoad` status codes
pub mod project_load {
    pub const STARTED: i32 = 0;
    pub const FINISHED: i32 = 100;
    pub const FAILED: i32 = 101;
}

/// Decoded surface input kept for the host; oldest events are dropped past this
const HOST_INPUT_CAPACITY: usize = 1024;

/// Notifications a host delivers to a surface script
///
/// All methods are one-way and infallible.
pub trait HostCallbacks {
    fn on_init(&mut self);
    fn on_deinit(&mut self);
    /// Host state changed; `flags` is a bitmask of change categories
    fn on_refresh(&mut self, flags: u32);
    /// A mixer track changed; `-1` means all tracks
    fn on_dirty_mixer_track(&mut self, index: i32);
    fn on_update_meters(&mut self);
    /// `0` off, `1` bar, `2` beat
    fn on_update_beat_indicator(&mut self, value: i32);
    fn on_project_load(&mut self, status: i32);
    fn on_first_connect(&mut self);
    fn on_midi_msg(&mut self, raw: &[u8]);
    fn on_sysex(&mut self, raw: &[u8]);
    fn on_idle(&mut self);
    fn on_send_temp_msg(&mut self, text: &str, duration_ms: u32);
}

/// Engine configuration for one unit
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineSettings {
    pub layout: SurfaceLayout,
    pub scheduler: SchedulerSettings,
    /// Wait for `on_first_connect` or a device handshake before the first drain
    pub await_first_connect: bool,
}

#[derive(Debug)]
struct TempMessage {
    text: String,
    expires: Instant,
}

pub struct SurfaceEngine<H, S> {
    ctx: SurfaceContext<H, S>,
    classifier: ChangeClassifier,
    coalescer: Coalescer,
    scheduler: IdleScheduler,
    meters: MeterQueue,
    touch: TouchGuard,
    /// Tracks reported by `on_dirty_mixer_track`, consumed by the next refresh
    pending_tracks: Option<TrackScope>,
    beat: BeatIndicator,
    temp_message: Option<TempMessage>,
    host_input: VecDeque<HardwareInputEvent>,
    await_first_connect: bool,
    active: bool,
}

impl<H: HostStateReader, S: HardwareSink> SurfaceEngine<H, S> {
    /// Create an engine; it stays inert until `on_init`
    pub fn new(settings: EngineSettings, host: H, sink: S) -> Self {
        let device_id = settings.layout.role().device_id();
        Self {
            ctx: SurfaceContext::new(host, sink),
            classifier: ChangeClassifier::new(device_id),
            coalescer: Coalescer::new(settings.layout),
            scheduler: IdleScheduler::new(settings.scheduler),
            meters: MeterQueue::new(),
            touch: TouchGuard::new(),
            pending_tracks: None,
            beat: BeatIndicator::Off,
            temp_message: None,
            host_input: VecDeque::new(),
            await_first_connect: settings.await_first_connect,
            active: false,
        }
    }

    pub fn layout(&self) -> &SurfaceLayout {
        self.coalescer.layout()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Whether the first full surface init has been marked
    pub fn is_ready(&self) -> bool {
        self.scheduler.is_ready()
    }

    pub fn dirty(&self) -> &DirtySet {
        &self.ctx.dirty
    }

    pub fn host(&self) -> &H {
        &self.ctx.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.ctx.host
    }

    pub fn sink(&self) -> &S {
        &self.ctx.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.ctx.sink
    }

    pub fn beat(&self) -> BeatIndicator {
        self.beat
    }

    pub fn set_scheduler_settings(&mut self, settings: SchedulerSettings) {
        self.scheduler.set_settings(settings);
    }

    /// Decoded surface input since the last call, oldest first
    pub fn take_host_input(&mut self) -> Vec<HardwareInputEvent> {
        self.host_input.drain(..).collect()
    }

    /// Queue a meter sample pushed by the host rather than polled
    pub fn offer_meter(&mut self, track: TrackIndex, level: f32) {
        if self.active && self.layout().is_known_track(track) {
            self.meters.offer(track, level);
        }
    }

    /// Run one scheduler tick
    pub fn idle(&mut self) -> TickReport {
        self.idle_at(Instant::now())
    }

    /// Run one scheduler tick as of `now`
    pub fn idle_at(&mut self, now: Instant) -> TickReport {
        if !self.active {
            return TickReport::default();
        }

        if self.temp_message.as_ref().is_some_and(|temp| now >= temp.expires) {
            debug!("Temporary message expired");
            self.temp_message = None;
            self.mark(SurfaceElement::DisplayLine(0), UpdateIntent::FullRepaint);
        }

        let local = LocalValues {
            temp_message: self.temp_message.as_ref().map(|temp| temp.text.as_str()),
            beat: self.beat,
        };
        let touch = &self.touch;

        self.scheduler
            .tick(&mut self.ctx, &mut self.meters, &local, |element| touch.holds(element))
    }

    /// Show a hint on display line 0 for `duration`
    pub fn show_temp_message_at(&mut self, text: &str, duration: Duration, now: Instant) {
        if !self.active {
            return;
        }
        debug!("Temporary message '{}' for {:?}", text, duration);
        self.temp_message = Some(TempMessage {
            text: text.to_string(),
            expires: now + duration,
        });
        self.mark(SurfaceElement::DisplayLine(0), UpdateIntent::FullRepaint);
    }

    fn mark(&mut self, element: SurfaceElement, intent: UpdateIntent) -> bool {
        self.coalescer.mark(&mut self.ctx.dirty, element, intent)
    }

    fn connect(&mut self) {
        let event = self.classifier.classify_connect();
        self.coalescer.apply(&mut self.ctx.dirty, event);

        match event {
            ChangeEvent::FullSurfaceInit => {
                info!("Surface connected ({:?}), full repaint", self.layout().role());
                self.scheduler.open_gate();
            }
            ChangeEvent::SurfaceReconnect => {
                info!("Surface reconnected ({:?}), full repaint", self.layout().role());
                // Releases sent while the link was down never arrived
                if !self.touch.is_empty() {
                    debug!("Dropping stale fader touches");
                    self.touch.clear();
                }
            }
        }
    }

    fn reset_state(&mut self) {
        self.ctx.dirty.clear();
        self.classifier.reset();
        self.scheduler.reset();
        self.meters.clear();
        self.touch.clear();
        self.pending_tracks = None;
        self.beat = BeatIndicator::Off;
        self.temp_message = None;
        self.host_input.clear();
    }

    /// Push a blank value to every element; best effort
    fn blank_surface(&mut self) {
        let mut failed = 0;
        for element in self.coalescer.layout().all_elements() {
            if let Err(e) = self.ctx.sink.push(element, &SurfaceValue::Blank) {
                trace!("Blanking {} failed: {}", element, e);
                failed += 1;
            }
        }
        if failed > 0 {
            warn!("{} element(s) could not be blanked on shutdown", failed);
        }
    }

    fn handle_input(&mut self, event: HardwareInputEvent) {
        match event {
            HardwareInputEvent::FaderTouch {
                fader: Fader::Strip(strip),
                touched,
            } => {
                if let Some(track) = self.layout().track_for_strip(strip) {
                    if touched {
                        self.touch.touch(track);
                    } else if self.touch.release(track) {
                        // Let the motor settle on the host value
                        self.mark(SurfaceElement::TrackStrip(track), UpdateIntent::ValueOnly);
                    }
                }
            }
            HardwareInputEvent::ConnectionConfirmed { .. } => self.connect(),
            HardwareInputEvent::ConnectionError { serial } => {
                warn!("Surface refused the connection (serial {:02X?})", serial);
            }
            HardwareInputEvent::VersionReply { ref version } => {
                info!("Surface firmware {}", version);
            }
            _ => {}
        }

        if self.host_input.len() >= HOST_INPUT_CAPACITY {
            trace!("Host input queue full, dropping oldest event");
            self.host_input.pop_front();
        }
        self.host_input.push_back(event);
    }

    fn ignored(&self, callback: &str) -> bool {
        if !self.active {
            trace!("{} ignored outside init..deinit", callback);
        }
        !self.active
    }
}

impl<H: HostStateReader, S: HardwareSink> HostCallbacks for SurfaceEngine<H, S> {
    fn on_init(&mut self) {
        if self.active {
            debug!("Re-init without deinit, discarding state");
        }
        self.reset_state();
        self.active = true;

        let layout = self.layout();
        info!(
            "Surface {:?} initialized: {} strip(s) from track {}",
            layout.role(),
            layout.strip_count(),
            layout.known_tracks().next().unwrap_or_default()
        );

        if !self.await_first_connect {
            self.connect();
        }
    }

    fn on_deinit(&mut self) {
        if self.ignored("on_deinit") {
            return;
        }
        if self.scheduler.is_ready() {
            self.blank_surface();
        }
        self.reset_state();
        self.active = false;
        info!("Surface {:?} deinitialized", self.layout().role());
    }

    fn on_refresh(&mut self, flags: u32) {
        if self.ignored("on_refresh") {
            return;
        }

        // Reported tracks belong to this refresh only, whatever it carries
        let reported = self.pending_tracks.take().unwrap_or(TrackScope::All);
        let all = TrackScope::All;
        let categories = self.classifier.classify_flags(flags);
        for category in categories.iter() {
            let scope = if category == ChangeCategory::Tracks {
                &reported
            } else {
                &all
            };
            self.coalescer.mark_category(&mut self.ctx.dirty, category, scope);
        }

        trace!("Refresh {:#X}: {} element(s) dirty", flags, self.ctx.dirty.len());
    }

    fn on_dirty_mixer_track(&mut self, index: i32) {
        if self.ignored("on_dirty_mixer_track") {
            return;
        }

        let Some(scope) = TrackScope::from_raw(index) else {
            debug!("Ignoring dirty mixer track {}", index);
            return;
        };

        match &mut self.pending_tracks {
            Some(pending) => pending.extend(scope),
            None => self.pending_tracks = Some(scope),
        }
    }

    fn on_update_meters(&mut self) {
        if self.ignored("on_update_meters") {
            return;
        }

        let layout = self.coalescer.layout();
        for track in layout.known_tracks() {
            if let Some(level) = self.ctx.host.read_meter(track) {
                self.meters.offer(track, level);
            }
        }
    }

    fn on_update_beat_indicator(&mut self, value: i32) {
        if self.ignored("on_update_beat_indicator") {
            return;
        }

        let Some(beat) = u8::try_from(value).ok().and_then(BeatIndicator::from_raw) else {
            debug!("Ignoring beat indicator value {}", value);
            return;
        };

        self.beat = beat;
        self.mark(SurfaceElement::TransportLed(buttons::BEAT), UpdateIntent::ValueOnly);
    }

    fn on_project_load(&mut self, status: i32) {
        if self.ignored("on_project_load") {
            return;
        }

        match status {
            project_load::STARTED => info!("Project loading"),
            project_load::FINISHED => {
                let marked = self.coalescer.mark_all(&mut self.ctx.dirty, UpdateIntent::FullRepaint);
                info!("Project loaded, {} element(s) marked for full repaint", marked);
            }
            project_load::FAILED => warn!("Project failed to load"),
            other => debug!("Unknown project load status {}", other),
        }
    }

    fn on_first_connect(&mut self) {
        if self.ignored("on_first_connect") {
            return;
        }
        self.connect();
    }

    fn on_midi_msg(&mut self, raw: &[u8]) {
        if self.ignored("on_midi_msg") {
            return;
        }
        if let Some(event) = self.classifier.classify_midi(raw) {
            self.handle_input(event);
        }
    }

    fn on_sysex(&mut self, raw: &[u8]) {
        if self.ignored("on_sysex") {
            return;
        }
        if let Some(event) = self.classifier.classify_sysex(raw) {
            self.handle_input(event);
        }
    }

    fn on_idle(&mut self) {
        let report = self.idle();
        if !report.is_idle() {
            trace!("Idle: {:?}", report);
        }
    }

    fn on_send_temp_msg(&mut self, text: &str, duration_ms: u32) {
        self.show_temp_message_at(text, Duration::from_millis(duration_ms as u64), Instant::now());
    }
}
