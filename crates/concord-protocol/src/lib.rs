mod diplomacy;
mod entity;
mod ids;
mod talk;
mod task;
mod types;
pub mod wire;

pub use crate::diplomacy::*;
pub use crate::entity::*;
pub use crate::ids::*;
pub use crate::talk::*;
pub use crate::task::*;
pub use crate::types::*;
