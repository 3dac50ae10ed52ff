//! Narrow interfaces to collaborators outside the engine.
//!
//! Every call through these traits happens at an engine boundary: a failure
//! is logged and swallowed so a missing asset or an unavailable subsystem
//! never stalls a conversation or a negotiation.

use std::collections::HashMap;

use concord_protocol::FactionId;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{service}: {message}")]
pub struct ServiceError {
    pub service: &'static str,
    pub message: String,
}

impl ServiceError {
    pub fn new(service: &'static str, message: impl Into<String>) -> Self {
        Self {
            service,
            message: message.into(),
        }
    }
}

/// Plays a video/audio pair. Fire and forget.
pub trait MediaPlayer {
    fn play(&mut self, video: &str, audio: Option<&str>) -> Result<(), ServiceError>;
}

/// Capability query answered by the combat/economy simulation.
pub trait StrengthQuery {
    fn military_strength_ratio(&self, a: FactionId, b: FactionId) -> Result<f64, ServiceError>;
}

/// Moves money between faction treasuries.
pub trait Treasury {
    fn transfer(&mut self, from: FactionId, to: FactionId, amount: i64) -> Result<(), ServiceError>;
}

/// Collaborators borrowed for one engine call.
pub struct Services<'a> {
    pub media: &'a mut dyn MediaPlayer,
    pub strength: &'a dyn StrengthQuery,
    pub treasury: &'a mut dyn Treasury,
}

impl Services<'_> {
    pub(crate) fn play(&mut self, video: &str, audio: Option<&str>) {
        if let Err(err) = self.media.play(video, audio) {
            tracing::warn!(%err, video, "media cue failed");
        }
    }

    pub(crate) fn strength_ratio(&self, a: FactionId, b: FactionId) -> Option<f64> {
        match self.strength.military_strength_ratio(a, b) {
            Ok(ratio) if ratio.is_finite() => Some(ratio),
            Ok(ratio) => {
                tracing::warn!(%a, %b, ratio, "strength query returned a non-finite ratio");
                None
            }
            Err(err) => {
                tracing::warn!(%err, %a, %b, "strength query failed");
                None
            }
        }
    }

    pub(crate) fn transfer(&mut self, from: FactionId, to: FactionId, amount: i64) {
        if let Err(err) = self.treasury.transfer(from, to, amount) {
            tracing::warn!(%err, %from, %to, amount, "money transfer failed");
        }
    }
}

// =============================================================================
// Stand-ins
// =============================================================================

/// Discards every cue.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullMedia;

impl MediaPlayer for NullMedia {
    fn play(&mut self, _video: &str, _audio: Option<&str>) -> Result<(), ServiceError> {
        Ok(())
    }
}

/// Records every cue it is asked to play.
#[derive(Clone, Debug, Default)]
pub struct RecordingMedia {
    pub played: Vec<(String, Option<String>)>,
}

impl MediaPlayer for RecordingMedia {
    fn play(&mut self, video: &str, audio: Option<&str>) -> Result<(), ServiceError> {
        self.played
            .push((video.to_string(), audio.map(str::to_string)));
        Ok(())
    }
}

/// Strength ratios from a fixed table; pairs not listed are evenly matched.
#[derive(Clone, Debug, Default)]
pub struct FixedStrength {
    ratios: HashMap<(FactionId, FactionId), f64>,
}

impl FixedStrength {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the ratio of `a` against `b` and the reciprocal for `b` against `a`.
    pub fn with_ratio(mut self, a: FactionId, b: FactionId, ratio: f64) -> Self {
        self.ratios.insert((a, b), ratio);
        if ratio != 0.0 {
            self.ratios.insert((b, a), 1.0 / ratio);
        }
        self
    }
}

impl StrengthQuery for FixedStrength {
    fn military_strength_ratio(&self, a: FactionId, b: FactionId) -> Result<f64, ServiceError> {
        Ok(self.ratios.get(&(a, b)).copied().unwrap_or(1.0))
    }
}

/// Balance sheet kept in memory; transfers may overdraw.
#[derive(Clone, Debug, Default)]
pub struct LedgerTreasury {
    pub balances: HashMap<FactionId, i64>,
}

impl LedgerTreasury {
    pub fn balance(&self, faction: FactionId) -> i64 {
        self.balances.get(&faction).copied().unwrap_or(0)
    }
}

impl Treasury for LedgerTreasury {
    fn transfer(&mut self, from: FactionId, to: FactionId, amount: i64) -> Result<(), ServiceError> {
        *self.balances.entry(from).or_insert(0) -= amount;
        *self.balances.entry(to).or_insert(0) += amount;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BrokenMedia;

    impl MediaPlayer for BrokenMedia {
        fn play(&mut self, video: &str, _audio: Option<&str>) -> Result<(), ServiceError> {
            Err(ServiceError::new("media", format!("missing asset {video}")))
        }
    }

    struct Unreachable;

    impl StrengthQuery for Unreachable {
        fn military_strength_ratio(&self, _a: FactionId, _b: FactionId) -> Result<f64, ServiceError> {
            Err(ServiceError::new("combat", "offline"))
        }
    }

    #[test]
    fn collaborator_failures_are_swallowed() {
        let mut media = BrokenMedia;
        let mut treasury = LedgerTreasury::default();
        let mut services = Services {
            media: &mut media,
            strength: &Unreachable,
            treasury: &mut treasury,
        };
        services.play("intro", None);
        assert_eq!(services.strength_ratio(FactionId(0), FactionId(1)), None);
        services.transfer(FactionId(0), FactionId(1), 50);
        assert_eq!(treasury.balance(FactionId(1)), 50);
        assert_eq!(treasury.balance(FactionId(0)), -50);
    }

    #[test]
    fn fixed_strength_is_reciprocal() {
        let strength = FixedStrength::new().with_ratio(FactionId(0), FactionId(1), 4.0);
        assert_eq!(strength.military_strength_ratio(FactionId(1), FactionId(0)), Ok(0.25));
        assert_eq!(strength.military_strength_ratio(FactionId(0), FactionId(2)), Ok(1.0));
    }
}
