//! Headless self-play harness for diplomacy balance tuning.
//!
//! Runs AI-only sessions and collects negotiation metrics.

use concord_protocol::{
    AiTask, AiTaskCategory, ApproachType, FactionId, NegotiateType, NegotiationRequest, Outcome,
    SkirmishDiplomaticRelation, TaskAction,
};
use serde::{Deserialize, Serialize};

use crate::{
    ai_turn::run_ai_turn,
    negotiation::NegotiationResolver,
    prioritizer::{TaskPrioritizer, TurnPlanner},
    rules::DiplomacyRules,
    services::{FixedStrength, LedgerTreasury, NullMedia, Services},
    session::{DiplomacySession, Faction, SessionError},
    GameRng,
};

/// Configuration for self-play simulation.
#[derive(Clone, Debug)]
pub struct SelfPlayConfig {
    /// Number of factions (all AI).
    pub num_factions: u8,
    /// Random seed for determinism.
    pub seed: u64,
    /// Turns to simulate.
    pub turns: u32,
    /// Effort each faction may spend per turn.
    pub effort_budget: u32,
    /// Chance that a pair of factions starts at war.
    pub war_chance: f64,
}

impl Default for SelfPlayConfig {
    fn default() -> Self {
        Self {
            num_factions: 4,
            seed: 42,
            turns: 50,
            effort_budget: 3,
            war_chance: 0.3,
        }
    }
}

/// Metrics collected during a self-play session.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DiplomacyMetrics {
    pub turns_played: u32,
    pub accepted: u32,
    pub rejected: u32,
    pub countered: u32,
    pub counters_paid: u32,
    pub tasks_dropped: u32,
    pub tasks_deferred: u32,
    /// Pairs at war when the session ended.
    pub wars: u32,
    pub alliances: u32,
    pub trade_routes: u32,
    /// Mean affinity over all contacted pairs at the end.
    pub mean_affinity: f64,
}

/// Result of a self-play session.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SelfPlayResult {
    /// Seed used for this session.
    pub seed: u64,
    pub metrics: DiplomacyMetrics,
    /// Duration in milliseconds (wall clock).
    pub duration_ms: u64,
}

/// Run a single self-play session.
pub fn run_selfplay(
    rules: &DiplomacyRules,
    config: &SelfPlayConfig,
) -> Result<SelfPlayResult, SessionError> {
    let start = std::time::Instant::now();
    let mut rng = GameRng::seed_from_u64(config.seed ^ 0x5e1f_9a7e);

    let factions: Vec<Faction> = (0..config.num_factions)
        .map(|i| Faction::new(FactionId(i), format!("Faction {i}"), true))
        .collect();
    let ids: Vec<FactionId> = factions.iter().map(|f| f.id).collect();
    let mut session = DiplomacySession::new(factions, rules, config.seed)?;

    let mut strength = FixedStrength::new();
    for (i, &a) in ids.iter().enumerate() {
        for &b in &ids[i + 1..] {
            let relation = if rng.next_f64() < config.war_chance {
                SkirmishDiplomaticRelation::War
            } else {
                [SkirmishDiplomaticRelation::Peace, SkirmishDiplomaticRelation::Default][rng.pick(2)]
            };
            session.apply_initial_relation(a, b, relation)?;
            strength = strength.with_ratio(a, b, 0.25 + rng.next_f64() * 3.0);
        }
    }

    let resolver = NegotiationResolver::new(rules);
    let mut planners: Vec<TurnPlanner> = ids
        .iter()
        .map(|_| TurnPlanner::new(TaskPrioritizer::new(rules.ai.category_weights)))
        .collect();
    let mut media = NullMedia;
    let mut treasury = LedgerTreasury::default();
    let mut metrics = DiplomacyMetrics::default();

    for _ in 0..config.turns {
        for (&faction, planner) in ids.iter().zip(planners.iter_mut()) {
            let mut services = Services {
                media: &mut media,
                strength: &strength,
                treasury: &mut treasury,
            };
            for task in propose_tasks(&session, &resolver, &services, &mut rng, faction) {
                planner.submit(task);
            }
            let report = run_ai_turn(
                &mut session,
                planner,
                &resolver,
                &mut services,
                faction,
                config.effort_budget,
            );

            for resolved in &report.negotiations {
                match resolved.outcome {
                    Outcome::Accept => metrics.accepted += 1,
                    Outcome::Reject => metrics.rejected += 1,
                    Outcome::Counter(_) => metrics.countered += 1,
                }
            }
            metrics.counters_paid += report.counters.iter().filter(|c| c.accepted).count() as u32;
            metrics.tasks_dropped += report.dropped.len() as u32;
            metrics.tasks_deferred += report.deferred as u32;
        }
        session.advance_turn();
        metrics.turns_played += 1;
    }

    let mut affinity_total = 0i64;
    let mut contacted = 0u32;
    for (i, &a) in ids.iter().enumerate() {
        for &b in &ids[i + 1..] {
            let record = session.relation(a, b)?;
            if !record.contacted {
                continue;
            }
            contacted += 1;
            affinity_total += i64::from(record.affinity);
            metrics.wars += u32::from(record.at_war);
            metrics.alliances += u32::from(record.is_allied());
            metrics.trade_routes += u32::from(record.trade_open);
        }
    }
    if contacted > 0 {
        metrics.mean_affinity = affinity_total as f64 / f64::from(contacted);
    }

    tracing::info!(
        seed = config.seed,
        turns = metrics.turns_played,
        accepted = metrics.accepted,
        wars = metrics.wars,
        "self-play finished"
    );

    Ok(SelfPlayResult {
        seed: config.seed,
        metrics,
        duration_ms: start.elapsed().as_millis() as u64,
    })
}

/// One negotiation task per contact (the most promising request) plus a
/// couple of military chores with random urgency.
fn propose_tasks(
    session: &DiplomacySession,
    resolver: &NegotiationResolver,
    services: &Services<'_>,
    rng: &mut GameRng,
    faction: FactionId,
) -> Vec<AiTask> {
    let mut tasks = Vec::new();

    for target in session.contacts_of(faction) {
        let mut best: Option<(NegotiationRequest, f64)> = None;
        for kind in NegotiateType::ALL {
            for approach in ApproachType::ALL {
                let request = NegotiationRequest::new(kind, approach);
                let Ok(eval) = resolver.evaluate(session, services, faction, target, request) else {
                    continue;
                };
                let score = match (&eval.outcome, kind) {
                    (Outcome::Reject, _) => continue,
                    (_, NegotiateType::Surrender) => eval.score * resolver.rules().accept_threshold,
                    _ => eval.score,
                };
                if best.map(|(_, s)| score > s).unwrap_or(true) {
                    best = Some((request, score));
                }
            }
        }
        if let Some((request, score)) = best {
            tasks.push(AiTask::new(
                faction,
                AiTaskCategory::Social,
                score,
                1,
                TaskAction::Negotiate { target, request },
            ));
        }
    }

    tasks.push(AiTask::custom(
        faction,
        AiTaskCategory::Offensive,
        rng.next_f64() * 60.0,
        "muster fleet",
    ));
    tasks.push(AiTask::custom(
        faction,
        AiTaskCategory::Defensive,
        rng.next_f64() * 60.0,
        "reinforce colonies",
    ));
    tasks
}
