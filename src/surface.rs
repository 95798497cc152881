//! Surface model - what can be updated on an MCU-class control surface
//!
//! A surface is a fixed set of independently updatable units (strips, meter
//! banks, display lines, button LEDs). The dirty-tracking engine keys all of
//! its bookkeeping on [`SurfaceElement`], never on the events that touched it.

mod element;
mod layout;
mod value;

pub use element::{buttons, ElementKind, SurfaceElement, TrackIndex, UpdateIntent};
pub use layout::{DeviceRole, SurfaceLayout, DISPLAY_LINES, MAX_STRIPS};
pub use value::{BeatIndicator, LedState, StripValue, SurfaceValue};
