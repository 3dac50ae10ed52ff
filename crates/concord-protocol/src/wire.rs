//! Opaque byte encodings for save-game and tooling collaborators.

use rmp_serde::{decode, encode};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

use crate::TalkPerson;

#[derive(Debug, Error)]
pub enum WireError {
    #[error("encode error: {0}")]
    Encode(#[from] encode::Error),
    #[error("decode error: {0}")]
    Decode(#[from] decode::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// MessagePack with named fields, so tagged enums round-trip.
pub fn to_msgpack<T: Serialize>(value: &T) -> Result<Vec<u8>, WireError> {
    Ok(encode::to_vec_named(value)?)
}

pub fn from_msgpack<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, WireError> {
    Ok(decode::from_slice(bytes)?)
}

pub fn to_json<T: Serialize>(value: &T) -> Result<String, WireError> {
    Ok(serde_json::to_string_pretty(value)?)
}

pub fn from_json<T: DeserializeOwned>(text: &str) -> Result<T, WireError> {
    Ok(serde_json::from_str(text)?)
}

pub fn serialize_talk_roster(people: &[TalkPerson]) -> Result<Vec<u8>, WireError> {
    to_msgpack(&people)
}

pub fn deserialize_talk_roster(bytes: &[u8]) -> Result<Vec<TalkPerson>, WireError> {
    from_msgpack(bytes)
}

/// Deterministic, stable 64-bit hash for raw bytes (FNV-1a).
pub fn hash_bytes_fnv1a64(bytes: &[u8]) -> u64 {
    const OFFSET_BASIS: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;

    let mut hash = OFFSET_BASIS;
    for b in bytes {
        hash ^= *b as u64;
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::{TalkOption, TalkState, TalkTrigger};

    #[test]
    fn talk_roster_survives_msgpack() {
        let person = TalkPerson {
            id: "phsychologist".into(),
            owner: None,
            location: None,
            states: BTreeMap::from([(
                "start".to_string(),
                TalkState {
                    prompt: "How do you feel?".into(),
                    media: None,
                    options: vec![TalkOption {
                        text: "Fine.".into(),
                        target: None,
                        condition: None,
                        triggers: vec![TalkTrigger::SetFlag {
                            flag: "calm".into(),
                            value: true,
                        }],
                    }],
                },
            )]),
        };
        let bytes = serialize_talk_roster(std::slice::from_ref(&person)).unwrap();
        let back = deserialize_talk_roster(&bytes).unwrap();
        assert_eq!(back, vec![person]);
    }

    #[test]
    fn fnv_hash_is_stable() {
        assert_eq!(hash_bytes_fnv1a64(b""), 0xcbf29ce484222325);
        assert_ne!(hash_bytes_fnv1a64(b"a"), hash_bytes_fnv1a64(b"b"));
    }
}
