//! Dialog ("talk") graph records.
//!
//! A [`TalkPerson`] owns an arena of [`TalkState`]s keyed by string id.
//! Options refer to their successor by id, never by pointer, so validation
//! is a key lookup and the graph may freely contain cycles.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{ApproachType, DataId, FactionId, LocationId, NegotiateType, RelationRecord};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TalkError {
    #[error("unknown talk state: {0}")]
    UnknownState(DataId),
    #[error("invalid choice {index} (state offers {available} options)")]
    InvalidChoice { index: usize, available: usize },
    #[error("{person}: option {option} of state {state} targets missing state {target}")]
    DanglingTarget {
        person: DataId,
        state: DataId,
        option: usize,
        target: DataId,
    },
    #[error("duplicate talk person: {0}")]
    DuplicatePerson(DataId),
    #[error("{0} has no talk states")]
    EmptyGraph(DataId),
    #[error("conversation has already ended")]
    ConversationEnded,
}

/// A video/audio pair handed to the media collaborator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaCue {
    pub video: String,
    #[serde(default)]
    pub audio: Option<String>,
}

/// Guard on an option; the option is hidden while the guard is false.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TalkCondition {
    FlagSet { flag: String },
    FlagUnset { flag: String },
    AffinityAtLeast { value: i32 },
    AffinityBelow { value: i32 },
    AtWar,
    AtPeace,
    TradeOpen,
    Allied,
    All { conditions: Vec<TalkCondition> },
    Any { conditions: Vec<TalkCondition> },
    Not { condition: Box<TalkCondition> },
}

/// Read-only game state a condition is evaluated against.
pub trait ConditionContext {
    fn flag(&self, name: &str) -> bool;
    /// Relation between the speaking player and the conversation partner.
    fn relation(&self) -> Option<&RelationRecord>;
}

impl TalkCondition {
    pub fn evaluate(&self, ctx: &dyn ConditionContext) -> bool {
        let relation = ctx.relation();
        match self {
            TalkCondition::FlagSet { flag } => ctx.flag(flag),
            TalkCondition::FlagUnset { flag } => !ctx.flag(flag),
            TalkCondition::AffinityAtLeast { value } => {
                relation.map(|r| r.affinity >= *value).unwrap_or(false)
            }
            TalkCondition::AffinityBelow { value } => {
                relation.map(|r| r.affinity < *value).unwrap_or(false)
            }
            TalkCondition::AtWar => relation.map(|r| r.at_war).unwrap_or(false),
            TalkCondition::AtPeace => relation.map(|r| !r.at_war).unwrap_or(true),
            TalkCondition::TradeOpen => relation.map(|r| r.trade_open).unwrap_or(false),
            TalkCondition::Allied => relation.map(|r| r.is_allied()).unwrap_or(false),
            TalkCondition::All { conditions } => conditions.iter().all(|c| c.evaluate(ctx)),
            TalkCondition::Any { conditions } => conditions.iter().any(|c| c.evaluate(ctx)),
            TalkCondition::Not { condition } => !condition.evaluate(ctx),
        }
    }
}

/// Side effect fired when an option is chosen.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TalkTrigger {
    Media {
        video: String,
        #[serde(default)]
        audio: Option<String>,
    },
    SetFlag {
        flag: String,
        #[serde(default = "default_flag_value")]
        value: bool,
    },
    Negotiate {
        kind: NegotiateType,
        approach: ApproachType,
    },
}

fn default_flag_value() -> bool {
    true
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TalkOption {
    pub text: String,
    /// Next state; `None` ends the conversation.
    #[serde(default)]
    pub target: Option<DataId>,
    #[serde(default)]
    pub condition: Option<TalkCondition>,
    #[serde(default)]
    pub triggers: Vec<TalkTrigger>,
}

impl TalkOption {
    pub fn is_available(&self, ctx: &dyn ConditionContext) -> bool {
        self.condition
            .as_ref()
            .map(|c| c.evaluate(ctx))
            .unwrap_or(true)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TalkState {
    pub prompt: String,
    /// Played when the state is first entered in a conversation.
    #[serde(default)]
    pub media: Option<MediaCue>,
    #[serde(default)]
    pub options: Vec<TalkOption>,
}

/// One conversation-capable character.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TalkPerson {
    pub id: DataId,
    #[serde(default)]
    pub owner: Option<FactionId>,
    #[serde(default)]
    pub location: Option<LocationId>,
    pub states: BTreeMap<DataId, TalkState>,
}

impl TalkPerson {
    pub fn state(&self, id: &str) -> Result<&TalkState, TalkError> {
        self.states
            .get(id)
            .ok_or_else(|| TalkError::UnknownState(id.to_string()))
    }

    /// Checks that every option target resolves to a state of this person.
    pub fn validate(&self) -> Result<(), TalkError> {
        if self.states.is_empty() {
            return Err(TalkError::EmptyGraph(self.id.clone()));
        }
        for (state_id, state) in &self.states {
            for (i, option) in state.options.iter().enumerate() {
                let Some(target) = &option.target else {
                    continue;
                };
                if !self.states.contains_key(target) {
                    return Err(TalkError::DanglingTarget {
                        person: self.id.clone(),
                        state: state_id.clone(),
                        option: i,
                        target: target.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// All states reachable from `start`, ignoring option conditions.
    pub fn reachable_from(&self, start: &str) -> BTreeSet<DataId> {
        let mut seen = BTreeSet::new();
        let mut queue = VecDeque::new();
        if self.states.contains_key(start) {
            queue.push_back(start.to_string());
        }
        while let Some(id) = queue.pop_front() {
            if !seen.insert(id.clone()) {
                continue;
            }
            let Some(state) = self.states.get(&id) else {
                continue;
            };
            for target in state.options.iter().filter_map(|o| o.target.as_ref()) {
                if !seen.contains(target) {
                    queue.push_back(target.clone());
                }
            }
        }
        seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Ctx {
        flags: Vec<&'static str>,
        relation: Option<RelationRecord>,
    }

    impl ConditionContext for Ctx {
        fn flag(&self, name: &str) -> bool {
            self.flags.iter().any(|f| *f == name)
        }

        fn relation(&self) -> Option<&RelationRecord> {
            self.relation.as_ref()
        }
    }

    fn option(text: &str, target: Option<&str>) -> TalkOption {
        TalkOption {
            text: text.to_string(),
            target: target.map(str::to_string),
            condition: None,
            triggers: Vec::new(),
        }
    }

    fn person(states: Vec<(&str, Vec<TalkOption>)>) -> TalkPerson {
        TalkPerson {
            id: "envoy".to_string(),
            owner: None,
            location: None,
            states: states
                .into_iter()
                .map(|(id, options)| {
                    (
                        id.to_string(),
                        TalkState {
                            prompt: format!("{id}?"),
                            media: None,
                            options,
                        },
                    )
                })
                .collect(),
        }
    }

    #[test]
    fn validate_accepts_cycles() {
        let p = person(vec![
            ("a", vec![option("go", Some("b"))]),
            ("b", vec![option("back", Some("a")), option("bye", None)]),
        ]);
        assert!(p.validate().is_ok());
        assert_eq!(p.reachable_from("a").len(), 2);
    }

    #[test]
    fn validate_reports_dangling_target() {
        let p = person(vec![("a", vec![option("ok", None), option("go", Some("nowhere"))])]);
        match p.validate() {
            Err(TalkError::DanglingTarget { option, target, .. }) => {
                assert_eq!(option, 1);
                assert_eq!(target, "nowhere");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn empty_graph_is_rejected() {
        let p = person(vec![]);
        assert_eq!(p.validate(), Err(TalkError::EmptyGraph("envoy".into())));
    }

    #[test]
    fn conditions_read_flags_and_relation() {
        let ctx = Ctx {
            flags: vec!["met_envoy"],
            relation: Some(RelationRecord {
                affinity: 20,
                at_war: true,
                ..RelationRecord::default()
            }),
        };
        assert!(TalkCondition::FlagSet { flag: "met_envoy".into() }.evaluate(&ctx));
        assert!(TalkCondition::AtWar.evaluate(&ctx));
        assert!(!TalkCondition::AtPeace.evaluate(&ctx));
        let combo = TalkCondition::All {
            conditions: vec![
                TalkCondition::AffinityAtLeast { value: 10 },
                TalkCondition::Not {
                    condition: Box::new(TalkCondition::TradeOpen),
                },
            ],
        };
        assert!(combo.evaluate(&ctx));
        assert!(!TalkCondition::AffinityBelow { value: 20 }.evaluate(&ctx));
    }
}
