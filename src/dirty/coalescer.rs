//! Coalescer - maps classified changes onto surface elements
//!
//! The mapping from host change category to the elements it invalidates is
//! a static table. The host's "all tracks" sentinel is expanded here into
//! the concrete tracks this unit shows.

use std::collections::BTreeSet;

use tracing::{debug, trace};

use super::{DirtySet, MarkOutcome};
use crate::classifier::{ChangeCategory, ChangeEvent};
use crate::surface::{SurfaceElement, SurfaceLayout, TrackIndex, UpdateIntent};

/// Tracks affected by a change
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackScope {
    /// Every track this unit knows about
    All,
    /// Only these host track indices
    Only(BTreeSet<TrackIndex>),
}

impl TrackScope {
    /// Decode the host convention: `-1` is all tracks, other negatives are invalid
    pub fn from_raw(index: i32) -> Option<Self> {
        match index {
            -1 => Some(TrackScope::All),
            i if i < 0 => None,
            i => TrackIndex::try_from(i)
                .ok()
                .map(|track| TrackScope::Only(BTreeSet::from([track]))),
        }
    }

    /// Widen this scope to also cover `other`
    pub fn extend(&mut self, other: TrackScope) {
        match other {
            TrackScope::All => *self = TrackScope::All,
            TrackScope::Only(theirs) => {
                if let TrackScope::Only(mine) = self {
                    mine.extend(theirs);
                }
            }
        }
    }
}

/// Which elements a category row targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Global,
    TransportLeds,
    DisplayLines,
    /// Every strip currently shown
    VisibleStrips,
    /// Strips for the tracks the host reported
    AffectedStrips,
}

/// Display line that shares the LCD row with the strip names
const NAME_LINE: u8 = 1;

const NONE: &[Target] = &[];
const GLOBAL: &[Target] = &[Target::Global];
const LEDS: &[Target] = &[Target::Global, Target::TransportLeds];
const DISPLAY: &[Target] = &[Target::DisplayLines];
const STRIPS: &[Target] = &[Target::VisibleStrips];
const REPORTED: &[Target] = &[Target::AffectedStrips];
const DISPLAY_AND_STRIPS: &[Target] = &[Target::DisplayLines, Target::VisibleStrips];

/// Static category table
fn targets_for(category: ChangeCategory) -> (&'static [Target], UpdateIntent) {
    match category {
        ChangeCategory::MixerSelection => (STRIPS, UpdateIntent::ValueOnly),
        ChangeCategory::MixerDisplay => (DISPLAY, UpdateIntent::FullRepaint),
        ChangeCategory::MixerControls => (STRIPS, UpdateIntent::ValueOnly),
        ChangeCategory::RemoteLinks => (STRIPS, UpdateIntent::FullRepaint),
        ChangeCategory::FocusedWindow => (GLOBAL, UpdateIntent::ValueOnly),
        ChangeCategory::Performance => (GLOBAL, UpdateIntent::ValueOnly),
        ChangeCategory::Leds => (LEDS, UpdateIntent::ValueOnly),
        ChangeCategory::RemoteLinkValues => (STRIPS, UpdateIntent::ValueOnly),
        ChangeCategory::Patterns => (DISPLAY, UpdateIntent::ValueOnly),
        ChangeCategory::Tracks => (REPORTED, UpdateIntent::FullRepaint),
        ChangeCategory::ControlValues => (STRIPS, UpdateIntent::ValueOnly),
        ChangeCategory::Names => (DISPLAY_AND_STRIPS, UpdateIntent::FullRepaint),
        ChangeCategory::ChannelEvent => (GLOBAL, UpdateIntent::ValueOnly),
        // Nothing on an MCU-class surface shows these
        ChangeCategory::Colors | ChangeCategory::ChannelRackGroup => (NONE, UpdateIntent::ValueOnly),
    }
}

/// Merges classified changes into a [`DirtySet`] for one surface layout
#[derive(Debug, Clone)]
pub struct Coalescer {
    layout: SurfaceLayout,
}

impl Coalescer {
    pub fn new(layout: SurfaceLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &SurfaceLayout {
        &self.layout
    }

    /// Mark a single element, ignoring elements this unit does not have
    pub fn mark(&self, dirty: &mut DirtySet, element: SurfaceElement, intent: UpdateIntent) -> bool {
        self.mark_element(dirty, element, intent) > 0
    }

    /// Mark `element` and anything its push overwrites; returns records changed
    fn mark_element(&self, dirty: &mut DirtySet, element: SurfaceElement, intent: UpdateIntent) -> usize {
        if !self.layout.contains(element) {
            trace!("Ignoring mark for {} (not on this unit)", element);
            return 0;
        }
        let mut changed = usize::from(dirty.mark(element, intent) != MarkOutcome::Unchanged);

        // The name line is written whole, over the strips' name cells
        if element == SurfaceElement::DisplayLine(NAME_LINE) {
            changed += self
                .layout
                .track_strips()
                .filter(|strip| dirty.mark(*strip, UpdateIntent::FullRepaint) != MarkOutcome::Unchanged)
                .count();
        }
        changed
    }

    /// Mark everything a category invalidates
    ///
    /// `scope` only narrows rows that target reported tracks; returns the
    /// number of records inserted or promoted.
    pub fn mark_category(&self, dirty: &mut DirtySet, category: ChangeCategory, scope: &TrackScope) -> usize {
        let (targets, intent) = targets_for(category);
        let mut changed = 0;

        for target in targets {
            for element in self.expand(*target, scope) {
                changed += self.mark_element(dirty, element, intent);
            }
        }

        trace!("{} marked {} element(s) {:?}", category, changed, intent);
        changed
    }

    /// Mark every element of this unit
    pub fn mark_all(&self, dirty: &mut DirtySet, intent: UpdateIntent) -> usize {
        self.layout
            .all_elements()
            .into_iter()
            .filter(|element| dirty.mark(*element, intent) != MarkOutcome::Unchanged)
            .count()
    }

    /// Apply a connection-level event
    pub fn apply(&self, dirty: &mut DirtySet, event: ChangeEvent) -> usize {
        let changed = self.mark_all(dirty, UpdateIntent::FullRepaint);
        debug!("{:?}: {} element(s) marked for full repaint", event, changed);
        changed
    }

    fn expand(&self, target: Target, scope: &TrackScope) -> Vec<SurfaceElement> {
        match target {
            Target::Global if self.layout.has_transport() => vec![SurfaceElement::Global],
            Target::Global => Vec::new(),
            Target::TransportLeds => self
                .layout
                .transport_leds()
                .iter()
                .map(|&note| SurfaceElement::TransportLed(note))
                .collect(),
            Target::DisplayLines => self.layout.display_lines().collect(),
            Target::VisibleStrips => self.layout.track_strips().collect(),
            Target::AffectedStrips => match scope {
                TrackScope::All => self.layout.track_strips().collect(),
                TrackScope::Only(tracks) => tracks
                    .iter()
                    .filter(|track| {
                        let known = self.layout.is_known_track(**track);
                        if !known {
                            trace!("Track {} is not shown on this unit", track);
                        }
                        known
                    })
                    .map(|&track| SurfaceElement::TrackStrip(track))
                    .collect(),
            },
        }
    }
}
