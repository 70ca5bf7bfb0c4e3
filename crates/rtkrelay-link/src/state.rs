use std::fmt;

/// Link lifecycle as seen by the rest of the rover.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectivityState {
    Disconnected = 0,
    Scanning = 1,
    Connecting = 2,
    Connected = 3,
}

impl ConnectivityState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => ConnectivityState::Scanning,
            2 => ConnectivityState::Connecting,
            3 => ConnectivityState::Connected,
            _ => ConnectivityState::Disconnected,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ConnectivityState::Disconnected => "disconnected",
            ConnectivityState::Scanning => "scanning",
            ConnectivityState::Connecting => "connecting",
            ConnectivityState::Connected => "connected",
        }
    }
}

impl fmt::Display for ConnectivityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inputs to the link state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// The radio is up and ready to scan.
    Started,
    /// A scan picked a network and an attempt is being made.
    Selected { identifier: String },
    /// A scan found nothing worth joining.
    NoCandidate,
    /// The radio associated and obtained an address.
    Connected { identifier: String },
    /// The association dropped or an attempt failed.
    Disconnected { reason: String },
    /// The periodic re-evaluation interval elapsed without an event.
    Tick,
}

/// Work the manager must do after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    None,
    /// Scan and join the best candidate.
    Scan,
    /// Attempt the current network again.
    Retry,
    /// Wait out the cooldown, then scan.
    CooldownThenScan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Reconnect attempts on the same network before rescanning.
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_retries: 5 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub state: ConnectivityState,
    pub retries: u32,
    pub action: Action,
}

/// Link transition table.
///
/// Pure: the caller owns `state` and `retries` and applies the result.
pub fn transition(
    state: ConnectivityState,
    retries: u32,
    policy: &RetryPolicy,
    event: &LinkEvent,
) -> Transition {
    use ConnectivityState::*;

    let (state, retries, action) = match (state, event) {
        (_, LinkEvent::Started) => (Scanning, 0, Action::Scan),
        (_, LinkEvent::Selected { .. }) => (Connecting, retries, Action::None),
        (_, LinkEvent::NoCandidate) => (Disconnected, 0, Action::None),
        (_, LinkEvent::Connected { .. }) => (Connected, 0, Action::None),

        // Nothing was associated or being attempted; there is nothing to retry.
        (Disconnected | Scanning, LinkEvent::Disconnected { .. }) => (state, retries, Action::None),
        (Connecting | Connected, LinkEvent::Disconnected { .. }) => {
            if retries < policy.max_retries {
                (Connecting, retries + 1, Action::Retry)
            } else {
                (Scanning, 0, Action::CooldownThenScan)
            }
        }

        (Connected, LinkEvent::Tick) => (Connected, retries, Action::None),
        (_, LinkEvent::Tick) => (Scanning, 0, Action::Scan),
    };

    Transition {
        state,
        retries,
        action,
    }
}
