//! Experiment phases and the client-side operation table.
//!
//! The table is advisory: it gates buttons and catches obviously invalid
//! submissions early. The contract enforces the real rules on-chain.

use serde::{Deserialize, Serialize};

use crate::errors::{ClientError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Registration = 0,
    Invest = 1,
    Return = 2,
    Done = 3,
}

impl Phase {
    pub const ALL: [Phase; 4] = [Phase::Registration, Phase::Invest, Phase::Return, Phase::Done];

    pub fn as_u64(self) -> u64 {
        self as u64
    }

    /// The following phase, or `None` once the experiment is done.
    pub fn next(self) -> Option<Phase> {
        match self {
            Self::Registration => Some(Self::Invest),
            Self::Invest => Some(Self::Return),
            Self::Return => Some(Self::Done),
            Self::Done => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Registration => "registration",
            Self::Invest => "invest",
            Self::Return => "return",
            Self::Done => "done",
        }
    }
}

impl TryFrom<u64> for Phase {
    type Error = ClientError;

    fn try_from(value: u64) -> Result<Self> {
        match value {
            0 => Ok(Self::Registration),
            1 => Ok(Self::Invest),
            2 => Ok(Self::Return),
            3 => Ok(Self::Done),
            other => Err(ClientError::Decode(format!("unknown phase value {other}"))),
        }
    }
}

/// Client-visible operations on the experiment contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    OptIn,
    Register,
    RegisterExperiment,
    SetPair,
    SetPhase,
    Invest,
    Return,
    Commit,
    Reveal,
    Bid,
    Sweep,
    Delete,
    ReadState,
}

pub fn is_operation_allowed(phase: Phase, op: Operation) -> bool {
    use Operation::*;

    match op {
        OptIn | Register | RegisterExperiment | SetPair => phase == Phase::Registration,
        Invest | Commit | Bid => phase == Phase::Invest,
        Return | Reveal => phase == Phase::Return,
        SetPhase => phase != Phase::Done,
        Sweep | Delete => phase == Phase::Done,
        ReadState => true,
    }
}

/// Phases only move forward.
pub fn can_advance(from: Phase, to: Phase) -> bool {
    from != Phase::Done && to > from
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_values_round_trip() {
        for phase in Phase::ALL {
            assert_eq!(Phase::try_from(phase.as_u64()).unwrap(), phase);
        }
        assert!(matches!(Phase::try_from(4), Err(ClientError::Decode(_))));
    }

    #[test]
    fn phases_are_strictly_ordered() {
        assert!(Phase::Registration < Phase::Invest);
        assert!(Phase::Invest < Phase::Return);
        assert!(Phase::Return < Phase::Done);
        assert_eq!(Phase::Return.next(), Some(Phase::Done));
        assert_eq!(Phase::Done.next(), None);
    }

    #[test]
    fn operation_table() {
        assert!(is_operation_allowed(Phase::Registration, Operation::OptIn));
        assert!(!is_operation_allowed(Phase::Invest, Operation::OptIn));
        assert!(is_operation_allowed(Phase::Invest, Operation::Invest));
        assert!(!is_operation_allowed(Phase::Registration, Operation::Invest));
        assert!(is_operation_allowed(Phase::Return, Operation::Return));
        assert!(!is_operation_allowed(Phase::Invest, Operation::Return));
        assert!(is_operation_allowed(Phase::Done, Operation::Sweep));
        assert!(is_operation_allowed(Phase::Done, Operation::Delete));
        assert!(!is_operation_allowed(Phase::Return, Operation::Delete));
        assert!(!is_operation_allowed(Phase::Done, Operation::SetPhase));
        for phase in Phase::ALL {
            assert!(is_operation_allowed(phase, Operation::ReadState));
        }
    }

    #[test]
    fn no_backward_transitions() {
        assert!(can_advance(Phase::Registration, Phase::Invest));
        assert!(can_advance(Phase::Registration, Phase::Done));
        assert!(!can_advance(Phase::Return, Phase::Invest));
        assert!(!can_advance(Phase::Invest, Phase::Invest));
        assert!(!can_advance(Phase::Done, Phase::Done));
    }
}
