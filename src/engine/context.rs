//! Per-unit engine context

use crate::dirty::DirtySet;
use crate::host::HostStateReader;
use crate::sink::HardwareSink;

/// Everything an engine operation touches, passed explicitly
///
/// The dirty set is written by the notification/input path and drained by
/// the tick path; both run on the caller's thread.
#[derive(Debug)]
pub struct SurfaceContext<H, S> {
    pub dirty: DirtySet,
    pub host: H,
    pub sink: S,
}

impl<H: HostStateReader, S: HardwareSink> SurfaceContext<H, S> {
    pub fn new(host: H, sink: S) -> Self {
        Self {
            dirty: DirtySet::new(),
            host,
            sink,
        }
    }
}
