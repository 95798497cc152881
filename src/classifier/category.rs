//! Host change categories
//!
//! The host signals "something changed" with a bitmask. Known bits decode
//! into [`ChangeCategory`] values; unknown bits are dropped here so raw
//! integers never travel past the classifier.

use std::fmt;

/// One kind of host-side change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChangeCategory {
    MixerSelection,
    MixerDisplay,
    MixerControls,
    RemoteLinks,
    FocusedWindow,
    Performance,
    Leds,
    RemoteLinkValues,
    Patterns,
    Tracks,
    ControlValues,
    Colors,
    Names,
    ChannelRackGroup,
    ChannelEvent,
}

impl ChangeCategory {
    pub const ALL: [ChangeCategory; 15] = [
        ChangeCategory::MixerSelection,
        ChangeCategory::MixerDisplay,
        ChangeCategory::MixerControls,
        ChangeCategory::RemoteLinks,
        ChangeCategory::FocusedWindow,
        ChangeCategory::Performance,
        ChangeCategory::Leds,
        ChangeCategory::RemoteLinkValues,
        ChangeCategory::Patterns,
        ChangeCategory::Tracks,
        ChangeCategory::ControlValues,
        ChangeCategory::Colors,
        ChangeCategory::Names,
        ChangeCategory::ChannelRackGroup,
        ChangeCategory::ChannelEvent,
    ];

    /// Bit used by the host refresh notification
    pub const fn bit(self) -> u32 {
        match self {
            ChangeCategory::MixerSelection => 1,
            ChangeCategory::MixerDisplay => 2,
            ChangeCategory::MixerControls => 4,
            ChangeCategory::RemoteLinks => 16,
            ChangeCategory::FocusedWindow => 32,
            ChangeCategory::Performance => 64,
            ChangeCategory::Leds => 256,
            ChangeCategory::RemoteLinkValues => 512,
            ChangeCategory::Patterns => 1024,
            ChangeCategory::Tracks => 2048,
            ChangeCategory::ControlValues => 4096,
            ChangeCategory::Colors => 8192,
            ChangeCategory::Names => 16384,
            ChangeCategory::ChannelRackGroup => 32768,
            ChangeCategory::ChannelEvent => 65536,
        }
    }

    /// Union of every known bit
    pub const fn known_mask() -> u32 {
        let mut mask = 0;
        let mut i = 0;
        while i < Self::ALL.len() {
            mask |= Self::ALL[i].bit();
            i += 1;
        }
        mask
    }
}

impl fmt::Display for ChangeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Set of change categories decoded from one notification
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CategorySet(u32);

impl CategorySet {
    pub const fn empty() -> Self {
        CategorySet(0)
    }

    /// Decode a host bitmask, ignoring unknown bits
    pub const fn from_flags(flags: u32) -> Self {
        CategorySet(flags & ChangeCategory::known_mask())
    }

    /// Host bitmask for this set
    pub const fn bits(&self) -> u32 {
        self.0
    }

    pub fn insert(&mut self, category: ChangeCategory) {
        self.0 |= category.bit();
    }

    pub fn contains(&self, category: ChangeCategory) -> bool {
        self.0 & category.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn iter(&self) -> impl Iterator<Item = ChangeCategory> + '_ {
        ChangeCategory::ALL.into_iter().filter(|c| self.contains(*c))
    }
}

impl FromIterator<ChangeCategory> for CategorySet {
    fn from_iter<I: IntoIterator<Item = ChangeCategory>>(iter: I) -> Self {
        let mut set = CategorySet::empty();
        for category in iter {
            set.insert(category);
        }
        set
    }
}
