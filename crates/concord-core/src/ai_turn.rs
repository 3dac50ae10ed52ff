//! One AI faction's diplomacy pass.
//!
//! Settles counter-offers addressed to the faction, plans the turn from the
//! faction's task queue and resolves the negotiation tasks that made the cut.
//! Custom tasks are returned to the caller, who owns their execution.

use concord_protocol::{AiTask, FactionId, Outcome, TaskAction, TaskId};
use serde::Serialize;

use crate::negotiation::NegotiationResolver;
use crate::prioritizer::TurnPlanner;
use crate::services::Services;
use crate::session::DiplomacySession;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CounterDecision {
    pub from: FactionId,
    pub money: i64,
    pub accepted: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ResolvedTask {
    pub id: TaskId,
    pub target: FactionId,
    pub outcome: Outcome,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct AiTurnReport {
    pub counters: Vec<CounterDecision>,
    pub negotiations: Vec<ResolvedTask>,
    /// Planned tasks the caller must carry out.
    pub custom: Vec<AiTask>,
    /// Tasks dropped because their negotiation was no longer valid.
    pub dropped: Vec<TaskId>,
    pub deferred: usize,
}

pub fn run_ai_turn(
    session: &mut DiplomacySession,
    planner: &mut TurnPlanner,
    resolver: &NegotiationResolver,
    services: &mut Services<'_>,
    faction: FactionId,
    effort_budget: u32,
) -> AiTurnReport {
    let mut report = AiTurnReport::default();

    // Counter-offers up to the standard gift are paid; dearer ones are declined.
    let offers: Vec<(FactionId, i64)> = session
        .pending_offers_for(faction)
        .into_iter()
        .map(|offer| (offer.from, offer.counter.money))
        .collect();
    for (from, money) in offers {
        let accept = money <= resolver.rules().money_amount;
        match resolver.respond_to_counter(session, services, faction, from, accept) {
            Ok(outcome) => report.counters.push(CounterDecision {
                from,
                money,
                accepted: outcome.is_accept(),
            }),
            Err(err) => tracing::warn!(%err, %faction, %from, "counter-offer response failed"),
        }
    }

    let plan = planner.plan_turn(effort_budget);
    report.deferred = plan.deferred.len();

    for ranked in plan.execute {
        let task = ranked.task;
        if task.owner != faction {
            tracing::warn!(%faction, owner = %task.owner, id = task.id.0, "task belongs to another faction");
            report.dropped.push(task.id);
            continue;
        }
        match &task.action {
            TaskAction::Negotiate { target, request } => {
                match resolver.resolve(
                    session,
                    services,
                    faction,
                    *target,
                    request.kind,
                    request.approach,
                ) {
                    Ok(outcome) => report.negotiations.push(ResolvedTask {
                        id: task.id,
                        target: *target,
                        outcome,
                    }),
                    Err(err) => {
                        tracing::warn!(%err, %faction, id = task.id.0, "negotiation task dropped");
                        report.dropped.push(task.id);
                    }
                }
            }
            TaskAction::Custom { .. } => report.custom.push(task),
        }
    }

    tracing::info!(
        %faction,
        negotiations = report.negotiations.len(),
        custom = report.custom.len(),
        deferred = report.deferred,
        "ai turn complete"
    );
    report
}

#[cfg(test)]
mod tests {
    use concord_protocol::{
        AiTaskCategory, ApproachType, NegotiateType, NegotiationRequest,
        SkirmishDiplomaticRelation,
    };

    use super::*;
    use crate::prioritizer::TaskPrioritizer;
    use crate::rules::{load_rules, RulesSource};
    use crate::services::{FixedStrength, LedgerTreasury, NullMedia};
    use crate::session::Faction;

    const AI: FactionId = FactionId(1);
    const HUMAN: FactionId = FactionId(0);
    const STRANGER: FactionId = FactionId(2);

    fn negotiate(target: FactionId, kind: NegotiateType, score: f64) -> AiTask {
        AiTask::new(
            AI,
            AiTaskCategory::Social,
            score,
            1,
            TaskAction::Negotiate {
                target,
                request: NegotiationRequest::new(kind, ApproachType::Neutral),
            },
        )
    }

    #[test]
    fn resolves_planned_negotiations_and_drops_invalid_ones() {
        let rules = load_rules(RulesSource::Embedded).unwrap();
        let mut session = DiplomacySession::new(
            vec![
                Faction::new(HUMAN, "Empire", false),
                Faction::new(AI, "Garthog", true),
                Faction::new(STRANGER, "Unknown", true),
            ],
            &rules,
            11,
        )
        .unwrap();
        session
            .apply_initial_relation(HUMAN, AI, SkirmishDiplomaticRelation::Peace)
            .unwrap();
        let resolver = NegotiationResolver::new(&rules);
        let mut planner = TurnPlanner::new(TaskPrioritizer::new(rules.ai.category_weights));
        let trade = planner.submit(negotiate(HUMAN, NegotiateType::Trade, 5.0));
        let lost = planner.submit(negotiate(STRANGER, NegotiateType::Trade, 4.0));
        planner.submit(AiTask::custom(AI, AiTaskCategory::Defensive, 3.0, "garrison"));
        planner.submit(AiTask::custom(AI, AiTaskCategory::Offensive, 1.0, "raid"));

        let mut media = NullMedia;
        let mut treasury = LedgerTreasury::default();
        let strength = FixedStrength::new();
        let mut services = Services {
            media: &mut media,
            strength: &strength,
            treasury: &mut treasury,
        };
        let report = run_ai_turn(&mut session, &mut planner, &resolver, &mut services, AI, 3);

        assert_eq!(
            report.negotiations,
            vec![ResolvedTask {
                id: trade,
                target: HUMAN,
                outcome: Outcome::Accept,
            }]
        );
        assert_eq!(report.dropped, vec![lost]);
        assert_eq!(report.custom.len(), 1);
        assert_eq!(report.deferred, 1);
        assert!(session.relation(AI, HUMAN).unwrap().trade_open);
    }

    #[test]
    fn affordable_counter_offers_are_paid() {
        let rules = load_rules(RulesSource::Embedded).unwrap();
        let mut session = DiplomacySession::new(
            vec![Faction::new(HUMAN, "Empire", false), Faction::new(AI, "Garthog", true)],
            &rules,
            5,
        )
        .unwrap();
        session
            .apply_initial_relation(HUMAN, AI, SkirmishDiplomaticRelation::Default)
            .unwrap();
        let resolver = NegotiationResolver::new(&rules);
        let mut media = NullMedia;
        let mut treasury = LedgerTreasury::default();
        let strength = FixedStrength::new();
        let mut services = Services {
            media: &mut media,
            strength: &strength,
            treasury: &mut treasury,
        };
        // The AI asks to trade; the human side counters for 1000.
        let outcome = resolver
            .resolve(
                &mut session,
                &mut services,
                AI,
                HUMAN,
                NegotiateType::Trade,
                ApproachType::Neutral,
            )
            .unwrap();
        assert!(matches!(outcome, Outcome::Counter(_)));

        let mut planner = TurnPlanner::new(TaskPrioritizer::new(rules.ai.category_weights));
        let report = run_ai_turn(&mut session, &mut planner, &resolver, &mut services, AI, 1);
        assert_eq!(
            report.counters,
            vec![CounterDecision {
                from: HUMAN,
                money: 1000,
                accepted: true,
            }]
        );
        assert!(session.relation(AI, HUMAN).unwrap().trade_open);
        assert_eq!(treasury.balance(HUMAN), 1000);
    }
}
