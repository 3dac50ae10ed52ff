use serde::{Deserialize, Serialize};

use crate::{AiTaskCategory, FactionId, NegotiationRequest, TaskId};

/// What an AI task does once the turn scheduler executes it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskAction {
    /// Open a negotiation with another faction.
    Negotiate {
        target: FactionId,
        request: NegotiationRequest,
    },
    /// Work executed by a collaborator outside the engine (fleet orders, production).
    Custom { label: String },
}

/// A task competing for one faction's effort in a turn.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AiTask {
    pub id: TaskId,
    pub owner: FactionId,
    pub category: AiTaskCategory,
    pub raw_score: f64,
    /// Effort units consumed when executed.
    pub effort: u32,
    pub action: TaskAction,
    /// Turns this task has already been carried over.
    #[serde(default)]
    pub deferrals: u32,
}

impl AiTask {
    pub fn new(
        owner: FactionId,
        category: AiTaskCategory,
        raw_score: f64,
        effort: u32,
        action: TaskAction,
    ) -> Self {
        Self {
            id: TaskId(0),
            owner,
            category,
            raw_score,
            effort,
            action,
            deferrals: 0,
        }
    }

    pub fn custom(
        owner: FactionId,
        category: AiTaskCategory,
        raw_score: f64,
        label: impl Into<String>,
    ) -> Self {
        Self::new(
            owner,
            category,
            raw_score,
            1,
            TaskAction::Custom {
                label: label.into(),
            },
        )
    }

    /// Raw score with NaN mapped to zero.
    pub fn score(&self) -> f64 {
        if self.raw_score.is_nan() {
            0.0
        } else {
            self.raw_score
        }
    }
}
