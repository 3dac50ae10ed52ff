//! Diplomacy protocol types for negotiations, outcomes, and relation state.

use serde::{Deserialize, Serialize};

use crate::{AllianceKind, ApproachType, FactionId, NegotiateType};

// =============================================================================
// Relation State
// =============================================================================

/// Mutable pairwise state between two factions.
///
/// Stored once per unordered pair, so affinity, war, trade and alliance are
/// symmetric by construction.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationRecord {
    /// Affinity/trust score; 0 is neutral.
    pub affinity: i32,
    pub trade_open: bool,
    pub at_war: bool,
    pub alliance: Option<AllianceKind>,
    /// Whether the two factions have discovered each other.
    pub contacted: bool,
    /// Turn when the current war started.
    pub war_since: Option<u32>,
}

impl RelationRecord {
    pub fn is_allied(&self) -> bool {
        self.alliance.is_some()
    }

    pub fn has_alliance(&self, kind: AllianceKind) -> bool {
        self.alliance == Some(kind)
    }

    /// Invariant check: a pair is never at war and allied at once.
    pub fn is_consistent(&self) -> bool {
        !(self.at_war && self.alliance.is_some())
    }
}

// =============================================================================
// Requests and Outcomes
// =============================================================================

/// What one faction asks of another.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NegotiationRequest {
    pub kind: NegotiateType,
    pub approach: ApproachType,
}

impl NegotiationRequest {
    pub fn new(kind: NegotiateType, approach: ApproachType) -> Self {
        Self { kind, approach }
    }
}

/// The counter-proposal a target makes instead of accepting outright.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterOffer {
    /// Money the initiator has to pay for the original request to go through.
    pub money: i64,
}

/// Result of resolving one negotiation request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Outcome {
    Accept,
    Reject,
    Counter(CounterOffer),
}

impl Outcome {
    pub fn is_accept(&self) -> bool {
        matches!(self, Outcome::Accept)
    }
}

/// A counter-offer awaiting the initiator's answer.
///
/// Pending offers are directional: `from` is the faction that countered and
/// `to` is the original initiator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingOffer {
    pub from: FactionId,
    pub to: FactionId,
    pub request: NegotiationRequest,
    pub counter: CounterOffer,
    /// Turn when the offer lapses if not answered.
    pub expires_turn: u32,
}

// =============================================================================
// Interaction History
// =============================================================================

/// How a recorded exchange ended.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum InteractionOutcome {
    Accepted,
    Rejected,
    Countered { money: i64 },
    CounterAccepted { money: i64 },
    CounterDeclined,
}

impl From<&Outcome> for InteractionOutcome {
    fn from(outcome: &Outcome) -> Self {
        match outcome {
            Outcome::Accept => InteractionOutcome::Accepted,
            Outcome::Reject => InteractionOutcome::Rejected,
            Outcome::Counter(c) => InteractionOutcome::Countered { money: c.money },
        }
    }
}

/// One negotiation exchange as seen from `owner`'s side.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiplomaticInteraction {
    pub turn: u32,
    /// Faction whose log holds this record.
    pub owner: FactionId,
    pub counterpart: FactionId,
    pub request: NegotiationRequest,
    pub outcome: InteractionOutcome,
    /// True when `owner` received the request, false when it initiated it.
    pub receive: bool,
}

impl DiplomaticInteraction {
    /// The faction that made the request.
    pub fn initiator(&self) -> FactionId {
        if self.receive {
            self.counterpart
        } else {
            self.owner
        }
    }

    pub fn summary(&self) -> String {
        let verb = match &self.outcome {
            InteractionOutcome::Accepted => "accepted".to_string(),
            InteractionOutcome::Rejected => "rejected".to_string(),
            InteractionOutcome::Countered { money } => format!("countered for {money} credits"),
            InteractionOutcome::CounterAccepted { money } => {
                format!("settled after paying {money} credits")
            }
            InteractionOutcome::CounterDeclined => "dropped after a counter-offer".to_string(),
        };
        if self.receive {
            format!(
                "T{}: {} asked us for {}, {}",
                self.turn,
                self.counterpart,
                self.request.kind.name(),
                verb
            )
        } else {
            format!(
                "T{}: we asked {} for {}, {}",
                self.turn,
                self.counterpart,
                self.request.kind.name(),
                verb
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn war_and_alliance_are_inconsistent() {
        let mut record = RelationRecord {
            at_war: true,
            ..RelationRecord::default()
        };
        assert!(record.is_consistent());
        record.alliance = Some(AllianceKind::Ally);
        assert!(!record.is_consistent());
    }

    #[test]
    fn initiator_follows_receive_flag() {
        let sent = DiplomaticInteraction {
            turn: 3,
            owner: FactionId(0),
            counterpart: FactionId(1),
            request: NegotiationRequest::new(NegotiateType::Trade, ApproachType::Neutral),
            outcome: InteractionOutcome::Accepted,
            receive: false,
        };
        let received = DiplomaticInteraction {
            owner: FactionId(1),
            counterpart: FactionId(0),
            receive: true,
            ..sent.clone()
        };
        assert_eq!(sent.initiator(), FactionId(0));
        assert_eq!(received.initiator(), FactionId(0));
        assert!(received.summary().contains("asked us for trade"));
    }
}
