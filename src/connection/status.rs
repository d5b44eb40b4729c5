//! Connection lifecycle status.

use std::sync::atomic::{AtomicU8, Ordering};

/// Connection lifecycle state, strictly forward-only.
///
/// `NoStatus -> Unconfirmed -> Confirmed`; no reverse transitions, no
/// skipping. `Connected` is reserved for other call sites and is never
/// produced by this state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum ConnectionStatus {
    /// Initial state, before the handshake completes.
    NoStatus = 0,
    /// Reserved status, not reached by the handshake/data machine.
    Connected = 1,
    /// Handshake exchange done, no application data round-tripped yet.
    Unconfirmed = 2,
    /// At least one post-handshake packet decrypted; both sides hold the
    /// session key.
    Confirmed = 3,
}

impl ConnectionStatus {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Connected,
            2 => Self::Unconfirmed,
            3 => Self::Confirmed,
            _ => Self::NoStatus,
        }
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::NoStatus => "NO_STATUS",
            Self::Connected => "CONNECTED",
            Self::Unconfirmed => "UNCONFIRMED",
            Self::Confirmed => "CONFIRMED",
        };
        f.write_str(name)
    }
}

/// Shared, monotonic status cell.
///
/// `advance` uses fetch-max, so the status can never move backwards while
/// the pipelines are active; only `reset` at teardown returns it to
/// `NoStatus`.
#[derive(Debug, Default)]
pub struct StatusCell(AtomicU8);

impl StatusCell {
    /// Create a cell in `NoStatus`.
    pub fn new() -> Self {
        Self(AtomicU8::new(ConnectionStatus::NoStatus as u8))
    }

    /// Current status.
    pub fn get(&self) -> ConnectionStatus {
        ConnectionStatus::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Advance toward `status`. Regressions are ignored.
    pub fn advance(&self, status: ConnectionStatus) {
        self.0.fetch_max(status as u8, Ordering::AcqRel);
    }

    /// Return to `NoStatus`. Only valid once the pipelines have stopped.
    pub fn reset(&self) {
        self.0
            .store(ConnectionStatus::NoStatus as u8, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_sequence_is_monotonic() {
        let cell = StatusCell::new();
        assert_eq!(cell.get(), ConnectionStatus::NoStatus);

        cell.advance(ConnectionStatus::Unconfirmed);
        assert_eq!(cell.get(), ConnectionStatus::Unconfirmed);

        cell.advance(ConnectionStatus::Confirmed);
        assert_eq!(cell.get(), ConnectionStatus::Confirmed);
    }

    #[test]
    fn test_status_never_regresses() {
        let cell = StatusCell::new();
        cell.advance(ConnectionStatus::Confirmed);

        cell.advance(ConnectionStatus::Unconfirmed);
        assert_eq!(cell.get(), ConnectionStatus::Confirmed);

        cell.advance(ConnectionStatus::NoStatus);
        assert_eq!(cell.get(), ConnectionStatus::Confirmed);
    }

    #[test]
    fn test_reset_returns_to_no_status() {
        let cell = StatusCell::new();
        cell.advance(ConnectionStatus::Confirmed);
        cell.reset();
        assert_eq!(cell.get(), ConnectionStatus::NoStatus);
    }
}
