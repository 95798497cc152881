//! MCU surface sync
//!
//! Keeps a Mackie-Control-class surface consistent with a host's mixer and
//! transport state. Host notifications and surface input are classified,
//! coalesced into a per-element dirty set, and drained on the host's idle
//! tick with values read from the host at push time.

pub mod classifier;
pub mod config;
pub mod dirty;
pub mod engine;
pub mod host;
pub mod mcu;
pub mod midi;
pub mod scheduler;
pub mod sink;
pub mod surface;

pub use engine::{EngineSettings, HostCallbacks, SurfaceEngine};
pub use host::{HostStateReader, MixerSnapshot};
pub use sink::{HardwareSink, PushError};
