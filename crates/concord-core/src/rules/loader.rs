use concord_protocol::{wire::hash_bytes_fnv1a64, AiTaskCategory, TalkError, TalkPerson};
use serde::Deserialize;
use thiserror::Error;

use crate::dialog::TalkRoster;
use crate::rules::{AiRules, DiplomacyRules, NegotiationRules, SessionRules};

#[derive(Debug, Error)]
pub enum RulesError {
    #[error("yaml parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("utf-8 error: {0}")]
    Utf8(#[from] std::str::Utf8Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid weight {weight} for {category:?}")]
    InvalidWeight {
        category: AiTaskCategory,
        weight: f64,
    },
    #[error("invalid rules table: {0}")]
    InvalidTable(String),
    #[error("talk content error: {0}")]
    Talk(#[from] TalkError),
}

pub enum RulesSource<'a> {
    Embedded,
    Path(String),
    Bytes {
        negotiation: &'a [u8],
        ai: &'a [u8],
        session: &'a [u8],
    },
}

pub enum TalkSource<'a> {
    Embedded,
    Path(String),
    Bytes(&'a [u8]),
}

pub fn load_rules(source: RulesSource<'_>) -> Result<DiplomacyRules, RulesError> {
    let rules = match source {
        RulesSource::Embedded => parse_rules(
            include_str!("../../data/base/negotiation.yaml"),
            include_str!("../../data/base/ai.yaml"),
            include_str!("../../data/base/session.yaml"),
        )?,
        RulesSource::Path(path) => {
            let negotiation_yaml = std::fs::read_to_string(format!("{path}/negotiation.yaml"))?;
            let ai_yaml = std::fs::read_to_string(format!("{path}/ai.yaml"))?;
            let session_yaml = std::fs::read_to_string(format!("{path}/session.yaml"))?;
            parse_rules(&negotiation_yaml, &ai_yaml, &session_yaml)?
        }
        RulesSource::Bytes {
            negotiation,
            ai,
            session,
        } => parse_rules(
            std::str::from_utf8(negotiation)?,
            std::str::from_utf8(ai)?,
            std::str::from_utf8(session)?,
        )?,
    };

    rules.validate()?;
    Ok(rules)
}

fn parse_rules(
    negotiation_yaml: &str,
    ai_yaml: &str,
    session_yaml: &str,
) -> Result<DiplomacyRules, RulesError> {
    let negotiation: NegotiationRules = serde_yaml::from_str(negotiation_yaml)?;
    let ai: AiRules = serde_yaml::from_str(ai_yaml)?;
    let session: SessionRules = serde_yaml::from_str(session_yaml)?;
    Ok(DiplomacyRules {
        negotiation,
        ai,
        session,
    })
}

#[derive(Debug, Deserialize)]
struct RawTalkFile {
    people: Vec<TalkPerson>,
}

/// Loads talk graphs and runs the content validation pass on every person.
pub fn load_talk_roster(source: TalkSource<'_>) -> Result<TalkRoster, RulesError> {
    let text = match source {
        TalkSource::Embedded => include_str!("../../data/base/talks.yaml").to_string(),
        TalkSource::Path(path) => std::fs::read_to_string(path)?,
        TalkSource::Bytes(bytes) => std::str::from_utf8(bytes)?.to_string(),
    };
    let raw: RawTalkFile = serde_yaml::from_str(&text)?;

    let mut roster = TalkRoster::default();
    for person in raw.people {
        person.validate()?;
        roster.insert(person)?;
    }
    tracing::debug!(
        people = roster.len(),
        content_hash = hash_bytes_fnv1a64(text.as_bytes()),
        "talk roster loaded"
    );
    Ok(roster)
}
