use serde::{Deserialize, Serialize};

/// Category of a negotiation request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NegotiateType {
    /// Establish (or restore) diplomatic relations; ends an ongoing war.
    DiplomaticRelations,
    /// Offer a money transfer to the other party.
    Money,
    /// Open trade between the two factions.
    Trade,
    /// Standard alliance.
    Ally,
    /// Alliance against the Dargslan; exclusive with [`NegotiateType::Ally`].
    Dargslan,
    /// Demand the other party's surrender.
    Surrender,
}

impl NegotiateType {
    pub const ALL: [NegotiateType; 6] = [
        NegotiateType::DiplomaticRelations,
        NegotiateType::Money,
        NegotiateType::Trade,
        NegotiateType::Ally,
        NegotiateType::Dargslan,
        NegotiateType::Surrender,
    ];

    /// The alliance this request establishes, if it is an alliance request.
    pub fn alliance(self) -> Option<AllianceKind> {
        match self {
            NegotiateType::Ally => Some(AllianceKind::Ally),
            NegotiateType::Dargslan => Some(AllianceKind::Dargslan),
            _ => None,
        }
    }

    /// Whether this request can be accepted while the two parties are at war.
    pub fn allowed_at_war(self) -> bool {
        matches!(
            self,
            NegotiateType::DiplomaticRelations | NegotiateType::Money | NegotiateType::Surrender
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            NegotiateType::DiplomaticRelations => "diplomatic relations",
            NegotiateType::Money => "money",
            NegotiateType::Trade => "trade",
            NegotiateType::Ally => "alliance",
            NegotiateType::Dargslan => "alliance against the Dargslan",
            NegotiateType::Surrender => "surrender",
        }
    }
}

/// Tone used to address the other party.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApproachType {
    Aggressive,
    Neutral,
    Humble,
}

impl ApproachType {
    pub const ALL: [ApproachType; 3] = [
        ApproachType::Aggressive,
        ApproachType::Neutral,
        ApproachType::Humble,
    ];
}

/// Declared relation between two factions at scenario start.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkirmishDiplomaticRelation {
    Peace,
    War,
    #[default]
    Default,
}

/// Classification of an AI-owned task for budgeting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AiTaskCategory {
    Offensive,
    Defensive,
    Social,
    /// Borrows the budget fraction of the largest other category.
    General,
}

impl AiTaskCategory {
    pub const ALL: [AiTaskCategory; 4] = [
        AiTaskCategory::Offensive,
        AiTaskCategory::Defensive,
        AiTaskCategory::Social,
        AiTaskCategory::General,
    ];

    /// Categories with their own weight, in tie-break order.
    pub const BUDGETED: [AiTaskCategory; 3] = [
        AiTaskCategory::Offensive,
        AiTaskCategory::Defensive,
        AiTaskCategory::Social,
    ];

    /// Enumeration position, used as the cross-category tie-break.
    pub fn ordinal(self) -> usize {
        match self {
            AiTaskCategory::Offensive => 0,
            AiTaskCategory::Defensive => 1,
            AiTaskCategory::Social => 2,
            AiTaskCategory::General => 3,
        }
    }
}

/// Kind of alliance held between two factions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllianceKind {
    Ally,
    Dargslan,
}

impl AllianceKind {
    /// The mutually exclusive counterpart.
    pub fn other(self) -> AllianceKind {
        match self {
            AllianceKind::Ally => AllianceKind::Dargslan,
            AllianceKind::Dargslan => AllianceKind::Ally,
        }
    }
}
