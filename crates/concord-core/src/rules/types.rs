use std::collections::BTreeMap;

use concord_protocol::{AiTaskCategory, ApproachType, NegotiateType, SkirmishDiplomaticRelation};
use serde::{Deserialize, Serialize};

use crate::rules::RulesError;

/// Full rule set consumed by the session, resolver and prioritizer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DiplomacyRules {
    pub negotiation: NegotiationRules,
    pub ai: AiRules,
    pub session: SessionRules,
}

impl DiplomacyRules {
    pub fn validate(&self) -> Result<(), RulesError> {
        self.negotiation.validate()?;
        self.ai.category_weights.validate()?;
        self.session.validate()
    }
}

// =============================================================================
// Negotiation
// =============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NegotiationRules {
    /// Score at or above which a request is accepted.
    pub accept_threshold: f64,
    /// Score at or above which a rejected request is countered instead.
    pub counter_threshold: f64,
    /// Score contributed per point of affinity.
    pub affinity_weight: f64,
    /// Money asked per missing score point in a counter-offer.
    pub money_per_point: f64,
    /// Amount moved by an accepted money negotiation.
    pub money_amount: i64,
    /// Turns a counter-offer stays open.
    pub counter_offer_ttl: u32,
    /// Minimum initiator/target strength ratio for a surrender demand.
    pub surrender_threshold: f64,
    /// Half-width of the seeded score jitter; zero keeps resolution deterministic.
    #[serde(default)]
    pub jitter: f64,
    pub base: BTreeMap<NegotiateType, f64>,
    #[serde(default)]
    pub approach: BTreeMap<NegotiateType, BTreeMap<ApproachType, f64>>,
    pub effects: NegotiationEffects,
}

/// Relation changes applied when a negotiation settles.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NegotiationEffects {
    pub relations_bonus: i32,
    pub money_bonus: i32,
    pub trade_bonus: i32,
    pub alliance_bonus: i32,
    pub surrender_penalty: i32,
    /// Applied when an aggressive request is rejected.
    pub rejection_penalty: i32,
}

impl NegotiationRules {
    pub fn base(&self, kind: NegotiateType) -> f64 {
        self.base.get(&kind).copied().unwrap_or(0.0)
    }

    /// Approach modifier; missing table entries count as zero.
    pub fn modifier(&self, kind: NegotiateType, approach: ApproachType) -> f64 {
        self.approach
            .get(&kind)
            .and_then(|row| row.get(&approach))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn set_modifier(&mut self, kind: NegotiateType, approach: ApproachType, value: f64) {
        self.approach.entry(kind).or_default().insert(approach, value);
    }

    pub fn validate(&self) -> Result<(), RulesError> {
        let numbers = [
            ("accept_threshold", self.accept_threshold),
            ("counter_threshold", self.counter_threshold),
            ("affinity_weight", self.affinity_weight),
            ("money_per_point", self.money_per_point),
            ("surrender_threshold", self.surrender_threshold),
            ("jitter", self.jitter),
        ];
        for (name, value) in numbers {
            if !value.is_finite() {
                return Err(RulesError::InvalidTable(format!("{name} must be finite")));
            }
        }
        if self.counter_threshold > self.accept_threshold {
            return Err(RulesError::InvalidTable(
                "counter_threshold exceeds accept_threshold".to_string(),
            ));
        }
        if self.money_per_point < 0.0 || self.jitter < 0.0 {
            return Err(RulesError::InvalidTable(
                "money_per_point and jitter must not be negative".to_string(),
            ));
        }
        if self.surrender_threshold <= 0.0 {
            return Err(RulesError::InvalidTable(
                "surrender_threshold must be positive".to_string(),
            ));
        }
        for kind in NegotiateType::ALL {
            let aggressive = self.modifier(kind, ApproachType::Aggressive);
            let neutral = self.modifier(kind, ApproachType::Neutral);
            let humble = self.modifier(kind, ApproachType::Humble);
            if aggressive > neutral || humble < neutral {
                return Err(RulesError::InvalidTable(format!(
                    "{}: expected aggressive <= neutral <= humble, got {aggressive} / {neutral} / {humble}",
                    kind.name()
                )));
            }
        }
        Ok(())
    }
}

// =============================================================================
// AI
// =============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AiRules {
    pub category_weights: CategoryWeights,
}

/// Configured weights of the three budgeted categories.
///
/// `General` has no weight of its own; see `prioritizer::borrow_for_general`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CategoryWeights {
    pub offensive: f64,
    pub defensive: f64,
    pub social: f64,
}

impl Default for CategoryWeights {
    fn default() -> Self {
        Self {
            offensive: 1.0,
            defensive: 1.0,
            social: 1.0,
        }
    }
}

impl CategoryWeights {
    pub fn get(&self, category: AiTaskCategory) -> Option<f64> {
        match category {
            AiTaskCategory::Offensive => Some(self.offensive),
            AiTaskCategory::Defensive => Some(self.defensive),
            AiTaskCategory::Social => Some(self.social),
            AiTaskCategory::General => None,
        }
    }

    pub fn validate(&self) -> Result<(), RulesError> {
        for category in AiTaskCategory::BUDGETED {
            let w = self.get(category).unwrap_or(0.0);
            if !w.is_finite() || w < 0.0 {
                return Err(RulesError::InvalidWeight { category, weight: w });
            }
        }
        Ok(())
    }
}

// =============================================================================
// Session
// =============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRules {
    /// Interactions kept per (owner, counterpart) log.
    pub history_retention: usize,
    pub affinity_min: i32,
    pub affinity_max: i32,
    /// Affinity moved toward neutral each turn.
    pub affinity_decay: i32,
    pub initial: InitialAffinity,
}

/// Starting affinity per declared skirmish relation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitialAffinity {
    pub peace: i32,
    pub war: i32,
    pub default: i32,
}

impl InitialAffinity {
    pub fn for_relation(&self, relation: SkirmishDiplomaticRelation) -> i32 {
        match relation {
            SkirmishDiplomaticRelation::Peace => self.peace,
            SkirmishDiplomaticRelation::War => self.war,
            SkirmishDiplomaticRelation::Default => self.default,
        }
    }
}

impl SessionRules {
    pub fn clamp_affinity(&self, value: i32) -> i32 {
        value.clamp(self.affinity_min, self.affinity_max)
    }

    pub fn validate(&self) -> Result<(), RulesError> {
        if self.history_retention == 0 {
            return Err(RulesError::InvalidTable(
                "history_retention must be at least 1".to_string(),
            ));
        }
        if self.affinity_min >= self.affinity_max {
            return Err(RulesError::InvalidTable(
                "affinity_min must be below affinity_max".to_string(),
            ));
        }
        if self.affinity_decay < 0 {
            return Err(RulesError::InvalidTable(
                "affinity_decay must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}
