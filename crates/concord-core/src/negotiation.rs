//! Negotiation resolver.
//!
//! Turns a request into `Accept`, `Reject` or `Counter` from the target's
//! relation state and the configured scoring table, then applies the result
//! to the session and logs it on both sides.

use concord_protocol::{
    ApproachType, CounterOffer, DiplomaticInteraction, FactionId, InteractionOutcome,
    NegotiateType, NegotiationRequest, Outcome, PendingOffer, RelationRecord,
};
use thiserror::Error;

use crate::rules::{DiplomacyRules, NegotiationRules};
use crate::services::Services;
use crate::session::{DiplomacySession, SessionError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NegotiationError {
    #[error("{initiator} cannot negotiate with {target}: {reason}")]
    InvalidRelationState {
        initiator: FactionId,
        target: FactionId,
        reason: &'static str,
    },
    #[error("no pending counter-offer from {from} to {to}")]
    NoPendingOffer { from: FactionId, to: FactionId },
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Score breakdown without side effects, for AI planning and UI hints.
#[derive(Clone, Debug, PartialEq)]
pub struct Evaluation {
    /// Set when the request is refused regardless of score.
    pub blocked_by: Option<&'static str>,
    /// Score before jitter; for surrender, the strength ratio.
    pub score: f64,
    pub outcome: Outcome,
}

#[derive(Clone, Debug)]
pub struct NegotiationResolver {
    rules: NegotiationRules,
}

impl NegotiationResolver {
    pub fn new(rules: &DiplomacyRules) -> Self {
        Self {
            rules: rules.negotiation.clone(),
        }
    }

    pub fn rules(&self) -> &NegotiationRules {
        &self.rules
    }

    fn check<'s>(
        &self,
        session: &'s DiplomacySession,
        initiator: FactionId,
        target: FactionId,
    ) -> Result<&'s RelationRecord, NegotiationError> {
        let invalid = |reason| NegotiationError::InvalidRelationState {
            initiator,
            target,
            reason,
        };
        if initiator == target {
            return Err(invalid("a faction cannot negotiate with itself"));
        }
        let record = session
            .relation(initiator, target)
            .map_err(|_| invalid("unknown faction"))?;
        if !record.contacted {
            return Err(invalid("factions have not made contact"));
        }
        Ok(record)
    }

    /// Reason the request is refused outright, if any.
    fn blocked_by(&self, record: &RelationRecord, kind: NegotiateType, affinity_max: i32) -> Option<&'static str> {
        if record.at_war && !kind.allowed_at_war() {
            return Some("parties are at war");
        }
        match kind {
            NegotiateType::Trade if record.trade_open => Some("trade is already open"),
            NegotiateType::Ally | NegotiateType::Dargslan => kind
                .alliance()
                .filter(|k| record.has_alliance(*k))
                .map(|_| "alliance already in force"),
            NegotiateType::DiplomaticRelations
                if !record.at_war && record.affinity >= affinity_max =>
            {
                Some("relations cannot improve further")
            }
            _ => None,
        }
    }

    fn score(&self, record: &RelationRecord, request: NegotiationRequest) -> f64 {
        self.rules.base(request.kind)
            + self.rules.modifier(request.kind, request.approach)
            + record.affinity as f64 * self.rules.affinity_weight
    }

    fn outcome_for_score(&self, score: f64) -> Outcome {
        if score >= self.rules.accept_threshold {
            Outcome::Accept
        } else if score >= self.rules.counter_threshold {
            let missing = self.rules.accept_threshold - score;
            Outcome::Counter(CounterOffer {
                money: (missing * self.rules.money_per_point).ceil() as i64,
            })
        } else {
            Outcome::Reject
        }
    }

    fn surrender_outcome(&self, ratio: Option<f64>) -> Outcome {
        match ratio {
            Some(r) if r >= self.rules.surrender_threshold => Outcome::Accept,
            _ => Outcome::Reject,
        }
    }

    /// Predicts the outcome without touching the session or drawing jitter.
    pub fn evaluate(
        &self,
        session: &DiplomacySession,
        services: &Services<'_>,
        initiator: FactionId,
        target: FactionId,
        request: NegotiationRequest,
    ) -> Result<Evaluation, NegotiationError> {
        let record = self.check(session, initiator, target)?;
        if request.kind == NegotiateType::Surrender {
            let ratio = services.strength_ratio(initiator, target);
            return Ok(Evaluation {
                blocked_by: None,
                score: ratio.unwrap_or(0.0),
                outcome: self.surrender_outcome(ratio),
            });
        }
        let score = self.score(record, request);
        if let Some(reason) = self.blocked_by(record, request.kind, session.rules().affinity_max) {
            return Ok(Evaluation {
                blocked_by: Some(reason),
                score,
                outcome: Outcome::Reject,
            });
        }
        Ok(Evaluation {
            blocked_by: None,
            score,
            outcome: self.outcome_for_score(score),
        })
    }

    pub fn resolve(
        &self,
        session: &mut DiplomacySession,
        services: &mut Services<'_>,
        initiator: FactionId,
        target: FactionId,
        kind: NegotiateType,
        approach: ApproachType,
    ) -> Result<Outcome, NegotiationError> {
        let request = NegotiationRequest::new(kind, approach);
        let record = self.check(session, initiator, target)?.clone();

        let outcome = if kind == NegotiateType::Surrender {
            self.surrender_outcome(services.strength_ratio(initiator, target))
        } else if let Some(reason) =
            self.blocked_by(&record, kind, session.rules().affinity_max)
        {
            tracing::debug!(%initiator, %target, ?kind, reason, "negotiation blocked");
            Outcome::Reject
        } else {
            let jitter = session.rng_mut().jitter(self.rules.jitter);
            let score = self.score(&record, request) + jitter;
            tracing::debug!(%initiator, %target, ?kind, ?approach, score, "negotiation scored");
            self.outcome_for_score(score)
        };

        match &outcome {
            Outcome::Accept => self.apply_accept(session, services, initiator, target, kind)?,
            Outcome::Reject => {
                if approach == ApproachType::Aggressive && kind != NegotiateType::Surrender {
                    session.adjust_affinity(
                        initiator,
                        target,
                        -self.rules.effects.rejection_penalty,
                    )?;
                }
            }
            Outcome::Counter(counter) => {
                session.put_offer(PendingOffer {
                    from: target,
                    to: initiator,
                    request,
                    counter: counter.clone(),
                    expires_turn: session.turn() + self.rules.counter_offer_ttl,
                });
            }
        }

        tracing::info!(%initiator, %target, ?kind, ?approach, ?outcome, "negotiation resolved");
        self.log(session, initiator, target, request, InteractionOutcome::from(&outcome));
        Ok(outcome)
    }

    /// Settles the counter-offer `target` made to `initiator`.
    pub fn respond_to_counter(
        &self,
        session: &mut DiplomacySession,
        services: &mut Services<'_>,
        initiator: FactionId,
        target: FactionId,
        accept: bool,
    ) -> Result<Outcome, NegotiationError> {
        self.check(session, initiator, target)?;
        let offer = session
            .take_offer(target, initiator)
            .ok_or(NegotiationError::NoPendingOffer {
                from: target,
                to: initiator,
            })?;

        if !accept {
            self.log(session, initiator, target, offer.request, InteractionOutcome::CounterDeclined);
            return Ok(Outcome::Reject);
        }

        let record = session.relation(initiator, target)?.clone();
        let kind = offer.request.kind;
        if let Some(reason) = self.blocked_by(&record, kind, session.rules().affinity_max) {
            tracing::info!(%initiator, %target, ?kind, reason, "counter-offer no longer applicable");
            self.log(session, initiator, target, offer.request, InteractionOutcome::Rejected);
            return Ok(Outcome::Reject);
        }

        services.transfer(initiator, target, offer.counter.money);
        self.apply_accept(session, services, initiator, target, kind)?;
        tracing::info!(%initiator, %target, ?kind, money = offer.counter.money, "counter-offer settled");
        self.log(
            session,
            initiator,
            target,
            offer.request,
            InteractionOutcome::CounterAccepted {
                money: offer.counter.money,
            },
        );
        Ok(Outcome::Accept)
    }

    fn apply_accept(
        &self,
        session: &mut DiplomacySession,
        services: &mut Services<'_>,
        initiator: FactionId,
        target: FactionId,
        kind: NegotiateType,
    ) -> Result<(), SessionError> {
        let effects = &self.rules.effects;
        match kind {
            NegotiateType::DiplomaticRelations => {
                session.set_war(initiator, target, false)?;
                session.adjust_affinity(initiator, target, effects.relations_bonus)?;
            }
            NegotiateType::Money => {
                services.transfer(initiator, target, self.rules.money_amount);
                session.adjust_affinity(initiator, target, effects.money_bonus)?;
            }
            NegotiateType::Trade => {
                session.open_trade(initiator, target)?;
                session.adjust_affinity(initiator, target, effects.trade_bonus)?;
            }
            NegotiateType::Ally | NegotiateType::Dargslan => {
                if let Some(alliance) = kind.alliance() {
                    session.form_alliance(initiator, target, alliance)?;
                }
                session.adjust_affinity(initiator, target, effects.alliance_bonus)?;
            }
            NegotiateType::Surrender => {
                session.set_war(initiator, target, false)?;
                session.adjust_affinity(initiator, target, -effects.surrender_penalty)?;
            }
        }
        Ok(())
    }

    /// One record per side, each from its own point of view.
    fn log(
        &self,
        session: &mut DiplomacySession,
        initiator: FactionId,
        target: FactionId,
        request: NegotiationRequest,
        outcome: InteractionOutcome,
    ) {
        let turn = session.turn();
        session.record(DiplomaticInteraction {
            turn,
            owner: initiator,
            counterpart: target,
            request,
            outcome: outcome.clone(),
            receive: false,
        });
        session.record(DiplomaticInteraction {
            turn,
            owner: target,
            counterpart: initiator,
            request,
            outcome,
            receive: true,
        });
    }
}
