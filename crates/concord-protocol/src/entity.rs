//! Capability traits shared by simulation entities.
//!
//! Each capability is its own small trait; entities opt into the ones they
//! need instead of inheriting from a common base.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{DataId, FactionId, LocationId, TalkPerson};

pub trait Owned {
    fn owner(&self) -> Option<FactionId>;

    fn is_owned_by(&self, faction: FactionId) -> bool {
        self.owner() == Some(faction)
    }
}

pub trait HasLocation {
    fn location(&self) -> Option<&LocationId>;
}

pub trait HasInventory {
    fn inventory(&self) -> &BTreeMap<DataId, u32>;

    fn count_of(&self, item: &str) -> u32 {
        self.inventory().get(item).copied().unwrap_or(0)
    }

    fn total_items(&self) -> u32 {
        self.inventory().values().sum()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fleet {
    pub name: String,
    pub owner: FactionId,
    pub location: Option<LocationId>,
    #[serde(default)]
    pub inventory: BTreeMap<DataId, u32>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Planet {
    pub id: LocationId,
    #[serde(default)]
    pub owner: Option<FactionId>,
    #[serde(default)]
    pub inventory: BTreeMap<DataId, u32>,
}

impl Owned for Fleet {
    fn owner(&self) -> Option<FactionId> {
        Some(self.owner)
    }
}

impl HasLocation for Fleet {
    fn location(&self) -> Option<&LocationId> {
        self.location.as_ref()
    }
}

impl HasInventory for Fleet {
    fn inventory(&self) -> &BTreeMap<DataId, u32> {
        &self.inventory
    }
}

impl Owned for Planet {
    fn owner(&self) -> Option<FactionId> {
        self.owner
    }
}

impl HasLocation for Planet {
    fn location(&self) -> Option<&LocationId> {
        Some(&self.id)
    }
}

impl HasInventory for Planet {
    fn inventory(&self) -> &BTreeMap<DataId, u32> {
        &self.inventory
    }
}

impl Owned for TalkPerson {
    fn owner(&self) -> Option<FactionId> {
        self.owner
    }
}

impl HasLocation for TalkPerson {
    fn location(&self) -> Option<&LocationId> {
        self.location.as_ref()
    }
}

/// Entities of `faction` present at `location`.
pub fn present_at<'a, T>(
    entities: &'a [T],
    faction: FactionId,
    location: &'a LocationId,
) -> impl Iterator<Item = &'a T> + 'a
where
    T: Owned + HasLocation,
{
    entities
        .iter()
        .filter(move |e| e.is_owned_by(faction) && e.location() == Some(location))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fleets_compose_capabilities() {
        let home = LocationId::new("achilles");
        let fleets = vec![
            Fleet {
                name: "Home Guard".into(),
                owner: FactionId(0),
                location: Some(home.clone()),
                inventory: BTreeMap::from([("fighter".to_string(), 12), ("cruiser".to_string(), 2)]),
            },
            Fleet {
                name: "Raiders".into(),
                owner: FactionId(1),
                location: Some(home.clone()),
                inventory: BTreeMap::new(),
            },
        ];
        let ours: Vec<_> = present_at(&fleets, FactionId(0), &home).collect();
        assert_eq!(ours.len(), 1);
        assert_eq!(ours[0].count_of("fighter"), 12);
        assert_eq!(ours[0].count_of("battleship"), 0);
        assert_eq!(ours[0].total_items(), 14);
    }

    #[test]
    fn unowned_planet_belongs_to_nobody() {
        let planet = Planet {
            id: LocationId::new("naxos"),
            owner: None,
            inventory: BTreeMap::new(),
        };
        assert!(!planet.is_owned_by(FactionId(0)));
        assert_eq!(planet.location(), Some(&LocationId::new("naxos")));
    }
}
