//! Hardware Sink
//!
//! Consumes one element update at a time. A failed push is never fatal: the
//! scheduler requeues the element and retries on a later tick.

use thiserror::Error;
use tracing::info;

use crate::surface::{SurfaceElement, SurfaceValue};

#[derive(Debug, Error)]
pub enum PushError {
    #[error("surface not connected")]
    NotConnected,

    #[error("MIDI send failed: {0}")]
    Send(String),

    #[error("{element} cannot show this value")]
    Unsupported { element: SurfaceElement },
}

/// Device I/O for surface updates
pub trait HardwareSink {
    fn push(&mut self, element: SurfaceElement, value: &SurfaceValue) -> Result<(), PushError>;
}

impl<T: HardwareSink + ?Sized> HardwareSink for Box<T> {
    fn push(&mut self, element: SurfaceElement, value: &SurfaceValue) -> Result<(), PushError> {
        (**self).push(element, value)
    }
}

/// Sink that only logs, for dry runs without a device
#[derive(Debug, Default)]
pub struct TracingSink {
    pushed: u64,
}

impl TracingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pushed(&self) -> u64 {
        self.pushed
    }
}

impl HardwareSink for TracingSink {
    fn push(&mut self, element: SurfaceElement, value: &SurfaceValue) -> Result<(), PushError> {
        self.pushed += 1;
        info!("[dry-run] {} <- {:?}", element, value);
        Ok(())
    }
}

#[cfg(test)]
pub use recording::RecordingSink;

#[cfg(test)]
mod recording {
    use std::collections::HashMap;

    use super::*;

    /// Records every push; failures can be scripted per element
    #[derive(Debug, Default)]
    pub struct RecordingSink {
        pub pushes: Vec<(SurfaceElement, SurfaceValue)>,
        /// Every element pushed to, including failed attempts
        pub attempts: Vec<SurfaceElement>,
        failures: HashMap<SurfaceElement, u32>,
        fail_all: bool,
    }

    impl RecordingSink {
        pub fn new() -> Self {
            Self::default()
        }

        /// Fail the next `times` pushes for `element`
        pub fn fail_next(&mut self, element: SurfaceElement, times: u32) {
            self.failures.insert(element, times);
        }

        pub fn fail_all(&mut self, fail: bool) {
            self.fail_all = fail;
        }

        pub fn pushes_for(&self, element: SurfaceElement) -> Vec<&SurfaceValue> {
            self.pushes
                .iter()
                .filter(|(e, _)| *e == element)
                .map(|(_, v)| v)
                .collect()
        }

        pub fn attempts_for(&self, element: SurfaceElement) -> usize {
            self.attempts.iter().filter(|e| **e == element).count()
        }

        pub fn pushed_elements(&self) -> Vec<SurfaceElement> {
            self.pushes.iter().map(|(e, _)| *e).collect()
        }

        pub fn clear(&mut self) {
            self.pushes.clear();
            self.attempts.clear();
        }
    }

    impl HardwareSink for RecordingSink {
        fn push(&mut self, element: SurfaceElement, value: &SurfaceValue) -> Result<(), PushError> {
            self.attempts.push(element);
            if self.fail_all {
                return Err(PushError::NotConnected);
            }
            if let Some(remaining) = self.failures.get_mut(&element) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(PushError::Send("scripted failure".to_string()));
                }
            }
            self.pushes.push((element, value.clone()));
            Ok(())
        }
    }
}
