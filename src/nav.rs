//! Day navigation state machine
//!
//! Owns the current day index and computes transitions for the two user
//! commands. The sequence is cyclic: advancing past the final overview day
//! wraps back to the introduction; retreating clamps at the introduction.

/// Where the machine currently sits: one of the bracketing overview days, or
/// a specific leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Overview,
    Leg(usize),
}

impl Phase {
    pub fn is_leg(&self) -> bool {
        matches!(self, Phase::Leg(_))
    }
}

/// The outcome of one navigation command, handed to the day renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub index: usize,
    pub phase: Phase,
    pub from: Phase,
    /// Recenter the map on the home region (entering an overview day)
    pub reset_viewport: bool,
}

impl Transition {
    pub fn from_leg(&self) -> bool {
        self.from.is_leg()
    }
}

/// Index of the day shown on startup. The introduction at index 0 is
/// deliberately skipped on first load; retreat once to read it.
pub const FIRST_LEG_INDEX: usize = 1;

/// The navigation state machine
#[derive(Debug)]
pub struct Navigator {
    index: usize,
    len: usize,
}

impl Navigator {
    /// `len` is the itinerary length including both overview sentinels.
    pub fn new(len: usize) -> Self {
        assert!(len >= 3, "itinerary must hold intro, legs and conclusion");
        Navigator {
            index: FIRST_LEG_INDEX,
            len,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn phase(&self) -> Phase {
        Self::phase_of(self.index, self.len)
    }

    fn phase_of(index: usize, len: usize) -> Phase {
        if index == 0 || index == len - 1 {
            Phase::Overview
        } else {
            Phase::Leg(index)
        }
    }

    /// The pseudo-transition used to draw the startup day
    pub fn bootstrap(&self) -> Transition {
        Transition {
            index: self.index,
            phase: self.phase(),
            from: Phase::Overview,
            reset_viewport: false,
        }
    }

    /// Step to the next day. Landing on the trailing overview day recenters
    /// the map; stepping past it wraps around to the introduction.
    pub fn advance(&mut self) -> Transition {
        let from = self.phase();
        let next = self.index + 1;

        let (index, reset_viewport) = if next >= self.len {
            (0, true)
        } else if next == self.len - 1 {
            (next, true)
        } else {
            (next, false)
        };

        self.index = index;
        let transition = Transition {
            index,
            phase: self.phase(),
            from,
            reset_viewport,
        };
        tracing::debug!("advance -> day {} ({:?})", index, transition.phase);
        transition
    }

    /// Step to the previous day, clamping at the introduction. Reaching (or
    /// sitting at) index 0 recenters the map.
    pub fn retreat(&mut self) -> Transition {
        let from = self.phase();
        let next = self.index.saturating_sub(1);
        let reset_viewport = next == 0;

        self.index = next;
        let transition = Transition {
            index: next,
            phase: self.phase(),
            from,
            reset_viewport,
        };
        tracing::debug!("retreat -> day {} ({:?})", next, transition.phase);
        transition
    }
}
