//! Shared relation store scoped to one game session.
//!
//! Single writer per call: the resolver mutates through `pub(crate)` methods,
//! scenario setup and story flags through the public ones. Readers borrow the
//! session immutably and see a consistent view for the duration of the borrow.

use std::collections::{BTreeMap, VecDeque};

use concord_protocol::{
    wire::{self, WireError},
    AllianceKind, ConditionContext, DiplomaticInteraction, FactionId, PendingOffer,
    RelationRecord, SkirmishDiplomaticRelation,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::rules::{DiplomacyRules, RulesError, SessionRules};
use crate::GameRng;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("unknown faction {0}")]
    UnknownFaction(FactionId),
    #[error("duplicate faction {0}")]
    DuplicateFaction(FactionId),
    #[error("a faction has no relation with itself ({0})")]
    SelfRelation(FactionId),
    #[error("initial relations can only be set before the first turn or negotiation")]
    ScenarioLocked,
}

/// Failure to restore a session from saved bytes.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error(transparent)]
    Wire(#[from] WireError),
    #[error("snapshot carries invalid session rules: {0}")]
    Rules(#[from] RulesError),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Faction {
    pub id: FactionId,
    pub name: String,
    /// Whether the AI turn driver plays this faction.
    pub ai_controlled: bool,
}

impl Faction {
    pub fn new(id: FactionId, name: impl Into<String>, ai_controlled: bool) -> Self {
        Self {
            id,
            name: name.into(),
            ai_controlled,
        }
    }
}

fn pair_key(a: FactionId, b: FactionId) -> (FactionId, FactionId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

#[derive(Clone, Debug)]
pub struct DiplomacySession {
    rules: SessionRules,
    factions: Vec<Faction>,
    relations: BTreeMap<(FactionId, FactionId), RelationRecord>,
    pending: Vec<PendingOffer>,
    flags: BTreeMap<String, bool>,
    /// Keyed by (owner, counterpart).
    history: BTreeMap<(FactionId, FactionId), VecDeque<DiplomaticInteraction>>,
    turn: u32,
    rng: GameRng,
    /// Set by the first resolver write or turn advance; locks scenario setup.
    mutated: bool,
}

impl DiplomacySession {
    pub fn new(
        factions: Vec<Faction>,
        rules: &DiplomacyRules,
        seed: u64,
    ) -> Result<Self, SessionError> {
        let mut relations = BTreeMap::new();
        for (i, a) in factions.iter().enumerate() {
            if factions[..i].iter().any(|f| f.id == a.id) {
                return Err(SessionError::DuplicateFaction(a.id));
            }
            for b in &factions[..i] {
                let record = RelationRecord {
                    affinity: rules.session.clamp_affinity(rules.session.initial.default),
                    ..RelationRecord::default()
                };
                relations.insert(pair_key(a.id, b.id), record);
            }
        }

        Ok(Self {
            rules: rules.session.clone(),
            factions,
            relations,
            pending: Vec::new(),
            flags: BTreeMap::new(),
            history: BTreeMap::new(),
            turn: 0,
            rng: GameRng::seed_from_u64(seed),
            mutated: false,
        })
    }

    pub fn turn(&self) -> u32 {
        self.turn
    }

    pub fn factions(&self) -> &[Faction] {
        &self.factions
    }

    pub fn faction(&self, id: FactionId) -> Option<&Faction> {
        self.factions.iter().find(|f| f.id == id)
    }

    pub fn rules(&self) -> &SessionRules {
        &self.rules
    }

    fn check_pair(&self, a: FactionId, b: FactionId) -> Result<(FactionId, FactionId), SessionError> {
        if a == b {
            return Err(SessionError::SelfRelation(a));
        }
        for id in [a, b] {
            if self.faction(id).is_none() {
                return Err(SessionError::UnknownFaction(id));
            }
        }
        Ok(pair_key(a, b))
    }

    pub fn relation(&self, a: FactionId, b: FactionId) -> Result<&RelationRecord, SessionError> {
        let key = self.check_pair(a, b)?;
        self.relations
            .get(&key)
            .ok_or(SessionError::UnknownFaction(b))
    }

    /// Factions `faction` has made contact with.
    pub fn contacts_of(&self, faction: FactionId) -> Vec<FactionId> {
        self.factions
            .iter()
            .map(|f| f.id)
            .filter(|&other| {
                other != faction
                    && self
                        .relation(faction, other)
                        .map(|r| r.contacted)
                        .unwrap_or(false)
            })
            .collect()
    }

    // =========================================================================
    // Scenario Setup
    // =========================================================================

    /// Records that two factions discovered each other.
    pub fn make_contact(&mut self, a: FactionId, b: FactionId) -> Result<(), SessionError> {
        let key = self.check_pair(a, b)?;
        if let Some(record) = self.relations.get_mut(&key) {
            record.contacted = true;
        }
        Ok(())
    }

    /// Applies a declared starting relation; implies contact.
    pub fn apply_initial_relation(
        &mut self,
        a: FactionId,
        b: FactionId,
        relation: SkirmishDiplomaticRelation,
    ) -> Result<(), SessionError> {
        if self.mutated {
            return Err(SessionError::ScenarioLocked);
        }
        let key = self.check_pair(a, b)?;
        let affinity = self
            .rules
            .clamp_affinity(self.rules.initial.for_relation(relation));
        let turn = self.turn;
        if let Some(record) = self.relations.get_mut(&key) {
            record.contacted = true;
            record.affinity = affinity;
            record.at_war = relation == SkirmishDiplomaticRelation::War;
            record.war_since = record.at_war.then_some(turn);
            if record.at_war {
                record.alliance = None;
            }
        }
        Ok(())
    }

    pub fn is_locked(&self) -> bool {
        self.mutated
    }

    // =========================================================================
    // Story Flags
    // =========================================================================

    pub fn flag(&self, name: &str) -> bool {
        self.flags.get(name).copied().unwrap_or(false)
    }

    pub fn set_flag(&mut self, name: impl Into<String>, value: bool) {
        self.flags.insert(name.into(), value);
    }

    /// Condition view for a conversation between `player` and `partner`.
    pub fn talk_view(&self, player: FactionId, partner: Option<FactionId>) -> TalkView<'_> {
        let relation = partner.and_then(|p| self.relation(player, p).ok());
        TalkView {
            session: self,
            relation,
        }
    }

    // =========================================================================
    // Resolver Writes
    // =========================================================================

    pub(crate) fn relation_mut(
        &mut self,
        a: FactionId,
        b: FactionId,
    ) -> Result<&mut RelationRecord, SessionError> {
        let key = self.check_pair(a, b)?;
        self.mutated = true;
        self.relations
            .get_mut(&key)
            .ok_or(SessionError::UnknownFaction(b))
    }

    pub(crate) fn adjust_affinity(
        &mut self,
        a: FactionId,
        b: FactionId,
        delta: i32,
    ) -> Result<i32, SessionError> {
        let rules = self.rules.clone();
        let record = self.relation_mut(a, b)?;
        record.affinity = rules.clamp_affinity(record.affinity.saturating_add(delta));
        Ok(record.affinity)
    }

    /// War and alliance exclude each other: declaring war drops the alliance.
    pub(crate) fn set_war(
        &mut self,
        a: FactionId,
        b: FactionId,
        at_war: bool,
    ) -> Result<(), SessionError> {
        let turn = self.turn;
        let record = self.relation_mut(a, b)?;
        if record.at_war == at_war {
            return Ok(());
        }
        record.at_war = at_war;
        record.war_since = at_war.then_some(turn);
        if at_war {
            record.alliance = None;
            record.trade_open = false;
        }
        Ok(())
    }

    pub(crate) fn open_trade(&mut self, a: FactionId, b: FactionId) -> Result<(), SessionError> {
        self.relation_mut(a, b)?.trade_open = true;
        Ok(())
    }

    /// Forms an alliance, dissolving alliances of the other kind that either
    /// party holds with a third faction.
    pub(crate) fn form_alliance(
        &mut self,
        a: FactionId,
        b: FactionId,
        kind: AllianceKind,
    ) -> Result<Vec<(FactionId, FactionId)>, SessionError> {
        self.check_pair(a, b)?;
        let conflicting = kind.other();
        let mut dissolved = Vec::new();
        for (&(x, y), record) in self.relations.iter_mut() {
            let involves_party = [x, y].iter().any(|f| *f == a || *f == b);
            let is_this_pair = pair_key(a, b) == (x, y);
            if involves_party && !is_this_pair && record.has_alliance(conflicting) {
                record.alliance = None;
                dissolved.push((x, y));
            }
        }
        for (x, y) in &dissolved {
            tracing::info!(%x, %y, ?conflicting, "alliance dissolved by exclusive agreement");
        }
        let record = self.relation_mut(a, b)?;
        record.alliance = Some(kind);
        Ok(dissolved)
    }

    pub(crate) fn put_offer(&mut self, offer: PendingOffer) {
        self.mutated = true;
        self.pending
            .retain(|p| !(p.from == offer.from && p.to == offer.to));
        self.pending.push(offer);
    }

    pub(crate) fn take_offer(&mut self, from: FactionId, to: FactionId) -> Option<PendingOffer> {
        let pos = self
            .pending
            .iter()
            .position(|p| p.from == from && p.to == to)?;
        self.mutated = true;
        Some(self.pending.remove(pos))
    }

    pub(crate) fn record(&mut self, interaction: DiplomaticInteraction) {
        let retention = self.rules.history_retention;
        let log = self
            .history
            .entry((interaction.owner, interaction.counterpart))
            .or_default();
        log.push_back(interaction);
        while log.len() > retention {
            log.pop_front();
        }
    }

    pub(crate) fn rng_mut(&mut self) -> &mut GameRng {
        &mut self.rng
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Counter-offer `from` made to `to` that is still open.
    pub fn pending_offer(&self, from: FactionId, to: FactionId) -> Option<&PendingOffer> {
        self.pending.iter().find(|p| p.from == from && p.to == to)
    }

    pub fn pending_offers_for(&self, to: FactionId) -> Vec<&PendingOffer> {
        self.pending.iter().filter(|p| p.to == to).collect()
    }

    /// `owner`'s log of exchanges with `counterpart`, oldest first.
    pub fn history(&self, owner: FactionId, counterpart: FactionId) -> Vec<&DiplomaticInteraction> {
        self.history
            .get(&(owner, counterpart))
            .map(|log| log.iter().collect())
            .unwrap_or_default()
    }

    /// Every exchange in `owner`'s logs, ordered by turn.
    pub fn history_of(&self, owner: FactionId) -> Vec<&DiplomaticInteraction> {
        let mut all: Vec<_> = self
            .history
            .iter()
            .filter(|((o, _), _)| *o == owner)
            .flat_map(|(_, log)| log.iter())
            .collect();
        all.sort_by_key(|i| i.turn);
        all
    }

    // =========================================================================
    // Turn Flow
    // =========================================================================

    /// Advances the turn: decays affinity toward neutral and expires offers.
    pub fn advance_turn(&mut self) -> Vec<PendingOffer> {
        self.turn += 1;
        self.mutated = true;

        let step = self.rules.affinity_decay;
        for record in self.relations.values_mut() {
            if record.affinity > 0 {
                record.affinity = (record.affinity - step).max(0);
            } else if record.affinity < 0 {
                record.affinity = (record.affinity + step).min(0);
            }
        }

        let turn = self.turn;
        let (expired, open): (Vec<_>, Vec<_>) = self
            .pending
            .drain(..)
            .partition(|p| p.expires_turn <= turn);
        self.pending = open;
        if !expired.is_empty() {
            tracing::debug!(turn, count = expired.len(), "counter-offers expired");
        }
        expired
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            rules: self.rules.clone(),
            factions: self.factions.clone(),
            relations: self
                .relations
                .iter()
                .map(|(&(a, b), record)| RelationEntry {
                    a,
                    b,
                    record: record.clone(),
                })
                .collect(),
            pending: self.pending.clone(),
            flags: self.flags.clone(),
            history: self
                .history
                .values()
                .flat_map(|log| log.iter().cloned())
                .collect(),
            turn: self.turn,
            rng: self.rng,
            mutated: self.mutated,
        }
    }

    /// Rebuilds a session, rejecting rules that could not have passed loading.
    pub fn from_snapshot(snapshot: SessionSnapshot) -> Result<Self, SnapshotError> {
        snapshot.rules.validate()?;
        let mut history: BTreeMap<_, VecDeque<_>> = BTreeMap::new();
        for interaction in snapshot.history {
            history
                .entry((interaction.owner, interaction.counterpart))
                .or_default()
                .push_back(interaction);
        }
        Ok(Self {
            rules: snapshot.rules,
            factions: snapshot.factions,
            relations: snapshot
                .relations
                .into_iter()
                .map(|e| (pair_key(e.a, e.b), e.record))
                .collect(),
            pending: snapshot.pending,
            flags: snapshot.flags,
            history,
            turn: snapshot.turn,
            rng: snapshot.rng,
            mutated: snapshot.mutated,
        })
    }

    /// MessagePack bytes for the save-game owner.
    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        wire::to_msgpack(&self.snapshot())
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, SnapshotError> {
        Self::from_snapshot(wire::from_msgpack(bytes)?)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RelationEntry {
    pub a: FactionId,
    pub b: FactionId,
    pub record: RelationRecord,
}

/// Serializable image of a session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub rules: SessionRules,
    pub factions: Vec<Faction>,
    pub relations: Vec<RelationEntry>,
    pub pending: Vec<PendingOffer>,
    pub flags: BTreeMap<String, bool>,
    pub history: Vec<DiplomaticInteraction>,
    pub turn: u32,
    pub rng: GameRng,
    pub mutated: bool,
}

/// Read-only state a talk condition sees.
pub struct TalkView<'a> {
    session: &'a DiplomacySession,
    relation: Option<&'a RelationRecord>,
}

impl ConditionContext for TalkView<'_> {
    fn flag(&self, name: &str) -> bool {
        self.session.flag(name)
    }

    fn relation(&self) -> Option<&RelationRecord> {
        self.relation
    }
}

#[cfg(test)]
mod tests {
    use concord_protocol::{ApproachType, InteractionOutcome, NegotiateType, NegotiationRequest};

    use super::*;
    use crate::rules::{load_rules, RulesSource};

    const A: FactionId = FactionId(0);
    const B: FactionId = FactionId(1);
    const C: FactionId = FactionId(2);

    fn session() -> DiplomacySession {
        let rules = load_rules(RulesSource::Embedded).unwrap();
        DiplomacySession::new(
            vec![
                Faction::new(A, "Empire", false),
                Faction::new(B, "Garthog", true),
                Faction::new(C, "Morgath", true),
            ],
            &rules,
            1,
        )
        .unwrap()
    }

    fn interaction(turn: u32) -> DiplomaticInteraction {
        DiplomaticInteraction {
            turn,
            owner: A,
            counterpart: B,
            request: NegotiationRequest::new(NegotiateType::Trade, ApproachType::Neutral),
            outcome: InteractionOutcome::Rejected,
            receive: false,
        }
    }

    #[test]
    fn relations_are_symmetric() {
        let mut s = session();
        s.apply_initial_relation(A, B, SkirmishDiplomaticRelation::War)
            .unwrap();
        assert!(s.relation(A, B).unwrap().at_war);
        assert!(s.relation(B, A).unwrap().at_war);
        assert_eq!(s.relation(B, A).unwrap().affinity, -50);
        assert_eq!(s.contacts_of(A), vec![B]);
    }

    #[test]
    fn self_and_unknown_pairs_are_errors() {
        let s = session();
        assert_eq!(s.relation(A, A), Err(SessionError::SelfRelation(A)));
        assert_eq!(
            s.relation(A, FactionId(9)).unwrap_err(),
            SessionError::UnknownFaction(FactionId(9))
        );
    }

    #[test]
    fn duplicate_factions_are_rejected() {
        let rules = load_rules(RulesSource::Embedded).unwrap();
        let err = DiplomacySession::new(
            vec![Faction::new(A, "One", false), Faction::new(A, "Two", true)],
            &rules,
            0,
        )
        .unwrap_err();
        assert_eq!(err, SessionError::DuplicateFaction(A));
    }

    #[test]
    fn scenario_setup_locks_after_first_mutation() {
        let mut s = session();
        s.apply_initial_relation(A, B, SkirmishDiplomaticRelation::Peace)
            .unwrap();
        s.apply_initial_relation(A, C, SkirmishDiplomaticRelation::Default)
            .unwrap();
        s.adjust_affinity(A, B, 5).unwrap();
        assert_eq!(
            s.apply_initial_relation(B, C, SkirmishDiplomaticRelation::War),
            Err(SessionError::ScenarioLocked)
        );
    }

    #[test]
    fn war_clears_alliance() {
        let mut s = session();
        s.form_alliance(A, B, AllianceKind::Ally).unwrap();
        assert!(s.relation(A, B).unwrap().is_allied());
        s.set_war(A, B, true).unwrap();
        let r = s.relation(A, B).unwrap();
        assert!(r.at_war && !r.is_allied());
        assert!(r.is_consistent());
    }

    #[test]
    fn exclusive_alliance_dissolves_third_party_pact() {
        let mut s = session();
        s.form_alliance(A, C, AllianceKind::Dargslan).unwrap();
        let dissolved = s.form_alliance(A, B, AllianceKind::Ally).unwrap();
        assert_eq!(dissolved, vec![(A, C)]);
        assert!(!s.relation(A, C).unwrap().is_allied());
        assert!(s.relation(A, B).unwrap().has_alliance(AllianceKind::Ally));
    }

    #[test]
    fn affinity_is_clamped() {
        let mut s = session();
        assert_eq!(s.adjust_affinity(A, B, 500).unwrap(), 100);
        assert_eq!(s.adjust_affinity(A, B, -500).unwrap(), -100);
    }

    #[test]
    fn history_evicts_oldest() {
        let mut s = session();
        let retention = s.rules().history_retention;
        for turn in 0..(retention as u32 + 3) {
            s.record(interaction(turn));
        }
        let log = s.history(A, B);
        assert_eq!(log.len(), retention);
        assert_eq!(log[0].turn, 3);
        assert!(s.history(B, A).is_empty());
    }

    #[test]
    fn advance_turn_decays_toward_neutral() {
        let mut s = session();
        s.apply_initial_relation(A, B, SkirmishDiplomaticRelation::Peace)
            .unwrap();
        s.apply_initial_relation(A, C, SkirmishDiplomaticRelation::War)
            .unwrap();
        s.advance_turn();
        assert_eq!(s.turn(), 1);
        assert_eq!(s.relation(A, B).unwrap().affinity, 24);
        assert_eq!(s.relation(A, C).unwrap().affinity, -49);
        assert!(s.is_locked());
    }

    #[test]
    fn snapshot_round_trip() {
        let mut s = session();
        s.apply_initial_relation(A, B, SkirmishDiplomaticRelation::War)
            .unwrap();
        s.set_flag("met_envoy", true);
        s.record(interaction(0));
        let bytes = s.encode().unwrap();
        let back = DiplomacySession::decode(&bytes).unwrap();
        assert_eq!(back.snapshot(), s.snapshot());
        assert!(back.flag("met_envoy"));
        assert_eq!(back.history(A, B).len(), 1);
    }

    #[test]
    fn decode_rejects_inverted_affinity_bounds() {
        let mut s = session();
        s.apply_initial_relation(A, B, SkirmishDiplomaticRelation::Peace)
            .unwrap();
        let mut snapshot = s.snapshot();
        snapshot.rules.affinity_min = 50;
        snapshot.rules.affinity_max = -50;
        let bytes = wire::to_msgpack(&snapshot).unwrap();

        let err = DiplomacySession::decode(&bytes).err().unwrap();
        assert!(matches!(err, SnapshotError::Rules(_)));
        assert!(matches!(
            DiplomacySession::from_snapshot(snapshot),
            Err(SnapshotError::Rules(_))
        ));
    }

    #[test]
    fn decode_reports_garbage_as_wire_error() {
        let err = DiplomacySession::decode(&[0xc1, 0x00]).err().unwrap();
        assert!(matches!(err, SnapshotError::Wire(_)));
    }
}
