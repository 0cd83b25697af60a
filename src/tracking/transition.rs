//! Alert flag state machine

/// Per-resource alert flag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertState {
    /// No alert outstanding
    Inactive,
    /// Alert already sent for the current episode
    Active,
}

impl AlertState {
    pub fn is_active(self) -> bool {
        matches!(self, AlertState::Active)
    }

    /// Compute the next state for an observed value.
    ///
    /// Only a strict `value < threshold` counts as below; equality clears
    /// the flag like any value above the threshold.
    pub fn next(self, value: f64, threshold: f64) -> Transition {
        let below = value < threshold;
        match (self, below) {
            (AlertState::Inactive, true) => Transition {
                state: AlertState::Active,
                notify: true,
            },
            (AlertState::Active, true) => Transition {
                state: AlertState::Active,
                notify: false,
            },
            (_, false) => Transition {
                state: AlertState::Inactive,
                notify: false,
            },
        }
    }
}

impl From<bool> for AlertState {
    fn from(active: bool) -> Self {
        if active {
            AlertState::Active
        } else {
            AlertState::Inactive
        }
    }
}

/// Outcome of evaluating one observed value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// State to persist
    pub state: AlertState,
    /// Whether a notification must be sent once the state is persisted
    pub notify: bool,
}
