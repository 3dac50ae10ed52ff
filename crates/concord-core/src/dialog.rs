//! Dialog graph executor.
//!
//! A [`Conversation`] walks one person's talk graph. It owns a copy of the
//! graph and borrows the session and collaborators only for the duration of
//! `enter`, `choose` or `restart`, so dropping it between choices is always
//! safe.

use std::collections::{BTreeMap, BTreeSet};

use concord_protocol::{
    DataId, FactionId, HasLocation, LocationId, NegotiationRequest, Outcome, TalkError,
    TalkPerson, TalkTrigger,
};
use serde::{Deserialize, Serialize};

use crate::negotiation::NegotiationResolver;
use crate::services::Services;
use crate::session::DiplomacySession;

/// Every talk person loaded for a session, keyed by id.
#[derive(Clone, Debug, Default)]
pub struct TalkRoster {
    people: BTreeMap<DataId, TalkPerson>,
}

impl TalkRoster {
    pub fn insert(&mut self, person: TalkPerson) -> Result<(), TalkError> {
        if self.people.contains_key(&person.id) {
            return Err(TalkError::DuplicatePerson(person.id));
        }
        self.people.insert(person.id.clone(), person);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&TalkPerson> {
        self.people.get(id)
    }

    pub fn len(&self) -> usize {
        self.people.len()
    }

    pub fn is_empty(&self) -> bool {
        self.people.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TalkPerson> {
        self.people.values()
    }

    /// People stationed at `location`, e.g. to list who can be hailed at a planet.
    pub fn at_location<'a>(
        &'a self,
        location: &'a LocationId,
    ) -> impl Iterator<Item = &'a TalkPerson> + 'a {
        self.people
            .values()
            .filter(move |p| p.location() == Some(location))
    }
}

/// Everything a conversation touches while handling one call.
pub struct TalkContext<'a, 's> {
    pub session: &'a mut DiplomacySession,
    pub resolver: &'a NegotiationResolver,
    pub services: &'a mut Services<'s>,
}

/// What the UI shows: the prompt and the options currently available.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prompt {
    pub state: DataId,
    pub text: String,
    /// Visible option texts; `choose` takes an index into this list.
    pub options: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Step {
    Prompt(Prompt),
    Ended,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub state: DataId,
    pub choice: String,
}

/// A negotiation started by a talk trigger, with the resolver's answer.
#[derive(Clone, Debug, PartialEq)]
pub struct TriggeredNegotiation {
    pub request: NegotiationRequest,
    pub outcome: Outcome,
}

#[derive(Clone, Debug)]
pub struct Conversation {
    person: TalkPerson,
    start: DataId,
    player: FactionId,
    partner: Option<FactionId>,
    /// `None` once the conversation ended.
    current: Option<DataId>,
    /// Option indexes of the current state that were visible when it was entered.
    visible: Vec<usize>,
    /// (state, option, trigger) triples already fired.
    fired: BTreeSet<(DataId, usize, usize)>,
    /// States whose entry media already played.
    entered: BTreeSet<DataId>,
    transcript: Vec<TranscriptEntry>,
    negotiations: Vec<TriggeredNegotiation>,
}

impl Conversation {
    /// Starts a conversation between `player` and `person` at `start`.
    ///
    /// `partner` is the faction negotiation triggers address and whose
    /// relation conditions are evaluated against; it defaults to the
    /// person's owner.
    pub fn enter(
        person: &TalkPerson,
        start: &str,
        player: FactionId,
        partner: Option<FactionId>,
        ctx: &mut TalkContext<'_, '_>,
    ) -> Result<(Self, Prompt), TalkError> {
        person.state(start)?;
        let mut conversation = Self {
            person: person.clone(),
            start: start.to_string(),
            player,
            partner: partner.or(person.owner),
            current: None,
            visible: Vec::new(),
            fired: BTreeSet::new(),
            entered: BTreeSet::new(),
            transcript: Vec::new(),
            negotiations: Vec::new(),
        };
        tracing::debug!(person = %person.id, start, %player, "conversation entered");
        let prompt = conversation.arrive(start, ctx)?;
        Ok((conversation, prompt))
    }

    pub fn person(&self) -> &str {
        &self.person.id
    }

    pub fn current_state(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn is_ended(&self) -> bool {
        self.current.is_none()
    }

    pub fn transcript(&self) -> &[TranscriptEntry] {
        &self.transcript
    }

    pub fn negotiations(&self) -> &[TriggeredNegotiation] {
        &self.negotiations
    }

    pub fn choose(
        &mut self,
        index: usize,
        ctx: &mut TalkContext<'_, '_>,
    ) -> Result<Step, TalkError> {
        let state_id = self.current.clone().ok_or(TalkError::ConversationEnded)?;
        let option_index = *self.visible.get(index).ok_or(TalkError::InvalidChoice {
            index,
            available: self.visible.len(),
        })?;
        let option = self
            .person
            .state(&state_id)?
            .options
            .get(option_index)
            .cloned()
            .ok_or(TalkError::InvalidChoice {
                index,
                available: self.visible.len(),
            })?;

        // Refuse to move before anything fires so a bad edge leaves no effects.
        if let Some(target) = &option.target {
            self.person.state(target)?;
        }

        for (trigger_index, trigger) in option.triggers.iter().enumerate() {
            let key = (state_id.clone(), option_index, trigger_index);
            if !self.fired.insert(key) {
                tracing::debug!(state = %state_id, option_index, trigger_index, "trigger already fired");
                continue;
            }
            self.fire(trigger, ctx);
        }

        self.transcript.push(TranscriptEntry {
            state: state_id,
            choice: option.text,
        });

        match option.target {
            Some(target) => Ok(Step::Prompt(self.arrive(&target, ctx)?)),
            None => {
                self.current = None;
                self.visible.clear();
                tracing::debug!(person = %self.person.id, "conversation ended");
                Ok(Step::Ended)
            }
        }
    }

    /// Returns to the start state with every trigger armed again.
    pub fn restart(&mut self, ctx: &mut TalkContext<'_, '_>) -> Result<Prompt, TalkError> {
        self.fired.clear();
        self.entered.clear();
        let start = self.start.clone();
        self.arrive(&start, ctx)
    }

    /// Ends the conversation between choices and hands back its transcript.
    pub fn abandon(self) -> Vec<TranscriptEntry> {
        tracing::debug!(person = %self.person.id, choices = self.transcript.len(), "conversation abandoned");
        self.transcript
    }

    fn arrive(&mut self, state_id: &str, ctx: &mut TalkContext<'_, '_>) -> Result<Prompt, TalkError> {
        let state = self.person.state(state_id)?;

        if self.entered.insert(state_id.to_string()) {
            if let Some(media) = &state.media {
                ctx.services.play(&media.video, media.audio.as_deref());
            }
        }

        let view = ctx.session.talk_view(self.player, self.partner);
        let visible: Vec<usize> = state
            .options
            .iter()
            .enumerate()
            .filter(|(_, option)| option.is_available(&view))
            .map(|(i, _)| i)
            .collect();
        let prompt = Prompt {
            state: state_id.to_string(),
            text: state.prompt.clone(),
            options: visible
                .iter()
                .map(|&i| state.options[i].text.clone())
                .collect(),
        };

        self.visible = visible;
        self.current = Some(state_id.to_string());
        Ok(prompt)
    }

    fn fire(&mut self, trigger: &TalkTrigger, ctx: &mut TalkContext<'_, '_>) {
        match trigger {
            TalkTrigger::Media { video, audio } => ctx.services.play(video, audio.as_deref()),
            TalkTrigger::SetFlag { flag, value } => {
                tracing::debug!(flag, value, "story flag set");
                ctx.session.set_flag(flag.clone(), *value);
            }
            TalkTrigger::Negotiate { kind, approach } => {
                let Some(partner) = self.partner else {
                    tracing::warn!(person = %self.person.id, ?kind, "negotiation trigger without a partner faction");
                    return;
                };
                match ctx.resolver.resolve(
                    ctx.session,
                    ctx.services,
                    self.player,
                    partner,
                    *kind,
                    *approach,
                ) {
                    Ok(outcome) => self.negotiations.push(TriggeredNegotiation {
                        request: NegotiationRequest::new(*kind, *approach),
                        outcome,
                    }),
                    Err(err) => {
                        tracing::warn!(%err, person = %self.person.id, "negotiation trigger dropped")
                    }
                }
            }
        }
    }
}
