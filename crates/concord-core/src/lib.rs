mod ai_turn;
mod dialog;
mod negotiation;
mod prioritizer;
mod rng;
mod rules;
pub mod selfplay;
mod services;
mod session;

pub use crate::ai_turn::*;
pub use crate::dialog::*;
pub use crate::negotiation::*;
pub use crate::prioritizer::*;
pub use crate::rng::*;
pub use crate::rules::*;
pub use crate::selfplay::{run_selfplay, DiplomacyMetrics, SelfPlayConfig, SelfPlayResult};
pub use crate::services::*;
pub use crate::session::*;
