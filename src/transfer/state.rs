//! Coordinator FSM State Definitions

use std::fmt;

/// Lifecycle of one transfer attempt
///
/// ```text
/// IDLE → SNAPSHOT_PENDING → ACTIVE → COMMITTED
///   ↓           ↓             ↓
///   └─────────→ ABORTED ←─────┘
/// ```
///
/// Terminal states: COMMITTED, ABORTED
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoordinatorState {
    /// Nothing started yet
    Idle,

    /// Session and transaction context open, snapshot not yet fixed
    SnapshotPending,

    /// First in-context operation issued, snapshot fixed
    Active,

    /// Terminal: every step committed as one unit
    Committed,

    /// Terminal: context aborted, no effect persisted
    Aborted,
}

impl CoordinatorState {
    /// Check if this is a terminal state (no more transitions possible)
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, CoordinatorState::Committed | CoordinatorState::Aborted)
    }

    pub fn can_transition_to(&self, next: CoordinatorState) -> bool {
        use CoordinatorState::*;
        matches!(
            (self, next),
            (Idle, SnapshotPending)
                | (Idle, Aborted)
                | (SnapshotPending, Active)
                | (SnapshotPending, Aborted)
                | (Active, Committed)
                | (Active, Aborted)
        )
    }

    /// Get human-readable state name
    pub fn as_str(&self) -> &'static str {
        match self {
            CoordinatorState::Idle => "IDLE",
            CoordinatorState::SnapshotPending => "SNAPSHOT_PENDING",
            CoordinatorState::Active => "ACTIVE",
            CoordinatorState::Committed => "COMMITTED",
            CoordinatorState::Aborted => "ABORTED",
        }
    }
}

impl fmt::Display for CoordinatorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(CoordinatorState::Committed.is_terminal());
        assert!(CoordinatorState::Aborted.is_terminal());

        assert!(!CoordinatorState::Idle.is_terminal());
        assert!(!CoordinatorState::SnapshotPending.is_terminal());
        assert!(!CoordinatorState::Active.is_terminal());
    }

    #[test]
    fn test_transitions() {
        use CoordinatorState::*;
        assert!(Idle.can_transition_to(SnapshotPending));
        assert!(SnapshotPending.can_transition_to(Active));
        assert!(Active.can_transition_to(Committed));
        assert!(Active.can_transition_to(Aborted));
        assert!(Idle.can_transition_to(Aborted));

        assert!(!Idle.can_transition_to(Active));
        assert!(!SnapshotPending.can_transition_to(Committed));
        assert!(!Committed.can_transition_to(Aborted));
        assert!(!Aborted.can_transition_to(SnapshotPending));
        assert!(!Committed.can_transition_to(Idle));
    }

    #[test]
    fn test_display() {
        assert_eq!(CoordinatorState::SnapshotPending.to_string(), "SNAPSHOT_PENDING");
        assert_eq!(format!("{}", CoordinatorState::Committed), "COMMITTED");
    }
}
