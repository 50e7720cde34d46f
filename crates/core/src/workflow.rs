//! The consultation status state machine.
//!
//! A visit advances through ordered clinical stages:
//!
//! ```text
//! waiting ──(vitals recorded)──> ready_for_doctor ──(doctor opens)──> in_consultation ──(finalize)──> completed
//! ```
//!
//! The queue endpoints drive these transitions explicitly. The web-form path
//! takes one shortcut: selecting a patient on a brand-new record starts the
//! consultation clock, which enters `in_consultation` directly from
//! `waiting`. No transition ever moves the status backward.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The clinical stage of a consultation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsultationStatus {
    Waiting,
    ReadyForDoctor,
    InConsultation,
    Completed,
}

/// A requested move to a status the current stage does not permit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("cannot move a consultation from {from} to {to}")]
pub struct InvalidTransition {
    pub from: ConsultationStatus,
    pub to: ConsultationStatus,
}

impl ConsultationStatus {
    /// All stages in queue order.
    pub const ALL: [ConsultationStatus; 4] = [
        ConsultationStatus::Waiting,
        ConsultationStatus::ReadyForDoctor,
        ConsultationStatus::InConsultation,
        ConsultationStatus::Completed,
    ];

    /// Whether the machine permits moving from `self` to `next`.
    ///
    /// `Waiting -> InConsultation` is the implicit web-form edge taken when
    /// the timer starts on a record that never went through the vitals queue.
    pub fn can_advance_to(self, next: ConsultationStatus) -> bool {
        use ConsultationStatus::*;
        matches!(
            (self, next),
            (Waiting, ReadyForDoctor)
                | (Waiting, InConsultation)
                | (ReadyForDoctor, InConsultation)
                | (InConsultation, Completed)
        )
    }

    /// Moves to `next`, or reports why the move is not allowed.
    pub fn advance_to(self, next: ConsultationStatus) -> Result<Self, InvalidTransition> {
        if self.can_advance_to(next) {
            Ok(next)
        } else {
            Err(InvalidTransition {
                from: self,
                to: next,
            })
        }
    }

    /// Applies one of the explicit queue transitions.
    pub fn apply(self, transition: Transition) -> Result<Self, InvalidTransition> {
        if self == transition.from() {
            Ok(transition.to())
        } else {
            Err(InvalidTransition {
                from: self,
                to: transition.to(),
            })
        }
    }

    pub fn is_terminal(self) -> bool {
        self == ConsultationStatus::Completed
    }

    fn as_str(self) -> &'static str {
        match self {
            ConsultationStatus::Waiting => "waiting",
            ConsultationStatus::ReadyForDoctor => "ready_for_doctor",
            ConsultationStatus::InConsultation => "in_consultation",
            ConsultationStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for ConsultationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConsultationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "waiting" => Ok(ConsultationStatus::Waiting),
            "ready_for_doctor" => Ok(ConsultationStatus::ReadyForDoctor),
            "in_consultation" => Ok(ConsultationStatus::InConsultation),
            "completed" => Ok(ConsultationStatus::Completed),
            other => Err(format!("unknown consultation status: {other}")),
        }
    }
}

/// The explicit queue transitions exposed by the consultation service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Transition {
    /// Nurse records vitals: `waiting -> ready_for_doctor`.
    TakeVitals,
    /// Doctor opens the record: `ready_for_doctor -> in_consultation`.
    StartConsultation,
    /// Finalize the visit: `in_consultation -> completed`.
    Complete,
}

impl Transition {
    /// The stage this transition departs from.
    pub fn from(self) -> ConsultationStatus {
        match self {
            Transition::TakeVitals => ConsultationStatus::Waiting,
            Transition::StartConsultation => ConsultationStatus::ReadyForDoctor,
            Transition::Complete => ConsultationStatus::InConsultation,
        }
    }

    /// The stage this transition arrives at.
    pub fn to(self) -> ConsultationStatus {
        match self {
            Transition::TakeVitals => ConsultationStatus::ReadyForDoctor,
            Transition::StartConsultation => ConsultationStatus::InConsultation,
            Transition::Complete => ConsultationStatus::Completed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ConsultationStatus::*;

    #[test]
    fn queue_transitions_follow_the_stage_order() {
        assert_eq!(Waiting.apply(Transition::TakeVitals), Ok(ReadyForDoctor));
        assert_eq!(
            ReadyForDoctor.apply(Transition::StartConsultation),
            Ok(InConsultation)
        );
        assert_eq!(InConsultation.apply(Transition::Complete), Ok(Completed));
    }

    #[test]
    fn queue_transitions_reject_out_of_order_application() {
        assert!(Waiting.apply(Transition::StartConsultation).is_err());
        assert!(Waiting.apply(Transition::Complete).is_err());
        assert!(ReadyForDoctor.apply(Transition::TakeVitals).is_err());
        assert!(ReadyForDoctor.apply(Transition::Complete).is_err());
        assert!(InConsultation.apply(Transition::TakeVitals).is_err());
        assert!(InConsultation.apply(Transition::StartConsultation).is_err());
    }

    #[test]
    fn completed_is_terminal() {
        for transition in [
            Transition::TakeVitals,
            Transition::StartConsultation,
            Transition::Complete,
        ] {
            assert!(Completed.apply(transition).is_err());
        }
        assert!(Completed.is_terminal());
    }

    #[test]
    fn web_form_shortcut_enters_consultation_from_waiting() {
        assert_eq!(Waiting.advance_to(InConsultation), Ok(InConsultation));
    }

    #[test]
    fn no_transition_moves_status_backward() {
        for (i, from) in ConsultationStatus::ALL.iter().enumerate() {
            for to in &ConsultationStatus::ALL[..i] {
                assert!(
                    !from.can_advance_to(*to),
                    "{from} must not move back to {to}"
                );
            }
        }
    }

    #[test]
    fn status_round_trips_through_its_wire_name() {
        for status in ConsultationStatus::ALL {
            let parsed: ConsultationStatus = status.to_string().parse().expect("should parse");
            assert_eq!(parsed, status);
        }
        assert!("in-consultation".parse::<ConsultationStatus>().is_err());
    }

    #[test]
    fn status_serializes_as_snake_case() {
        let json = serde_json::to_string(&ReadyForDoctor).expect("serialize");
        assert_eq!(json, "\"ready_for_doctor\"");
    }
}
