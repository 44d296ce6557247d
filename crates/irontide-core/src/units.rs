//! Unit definitions - the static stat table the engine is configured with.
//!
//! The engine never hard-codes unit behavior: attack/defense/movement/cost,
//! hit points, and capability flags all come from a [`UnitTable`] supplied at
//! game creation. [`UnitTable::standard`] provides the default table.

use crate::types::Ipcs;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Types of units available.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitKind {
    // Land
    Infantry,
    Armor,
    Artillery,
    AntiAir,
    Factory,

    // Air
    Fighter,
    Bomber,

    // Sea
    Transport,
    Carrier,
    Battleship,
    Cruiser,
    Destroyer,
    Submarine,
}

impl UnitKind {
    pub const ALL: [UnitKind; 13] = [
        UnitKind::Infantry,
        UnitKind::Armor,
        UnitKind::Artillery,
        UnitKind::AntiAir,
        UnitKind::Factory,
        UnitKind::Fighter,
        UnitKind::Bomber,
        UnitKind::Transport,
        UnitKind::Carrier,
        UnitKind::Battleship,
        UnitKind::Cruiser,
        UnitKind::Destroyer,
        UnitKind::Submarine,
    ];
}

impl std::fmt::Display for UnitKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            UnitKind::Infantry => "Infantry",
            UnitKind::Armor => "Armor",
            UnitKind::Artillery => "Artillery",
            UnitKind::AntiAir => "Anti-Air",
            UnitKind::Factory => "Factory",
            UnitKind::Fighter => "Fighter",
            UnitKind::Bomber => "Bomber",
            UnitKind::Transport => "Transport",
            UnitKind::Carrier => "Carrier",
            UnitKind::Battleship => "Battleship",
            UnitKind::Cruiser => "Cruiser",
            UnitKind::Destroyer => "Destroyer",
            UnitKind::Submarine => "Submarine",
        };
        write!(f, "{}", name)
    }
}

/// Terrain class a unit moves through.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitClass {
    Land,
    Air,
    Sea,
}

/// Static stats and capability flags for a unit type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitDef {
    /// Attack value: a d6 roll at or below this hits when attacking.
    pub attack: u8,
    /// Defense value: a d6 roll at or below this hits when defending.
    pub defense: u8,
    /// Movement allowance per turn.
    pub movement: u8,
    /// Purchase cost in IPCs.
    pub cost: Ipcs,
    /// Hits required to destroy (>1 for capital ships).
    pub hit_points: u8,
    /// Terrain class.
    pub class: UnitClass,
    /// Buildable structure: never fights, never moves once placed.
    pub structure: bool,
    /// Transfers to the new owner when its territory is captured.
    pub captured_with_territory: bool,
    /// Cargo slots for land units (transports).
    pub cargo_slots: u8,
    /// Aircraft capacity (carriers).
    pub aircraft_capacity: u8,
    /// May land on a carrier.
    pub carrier_landable: bool,
    /// Occupies one transport slot instead of counting as the heavy item.
    pub infantry_equivalent: bool,
    /// May fire shore bombardment in support of an amphibious assault.
    pub bombards: bool,
}

impl UnitDef {
    /// Create a land combat unit.
    pub const fn land(attack: u8, defense: u8, movement: u8, cost: Ipcs) -> Self {
        Self {
            attack,
            defense,
            movement,
            cost,
            hit_points: 1,
            class: UnitClass::Land,
            structure: false,
            captured_with_territory: false,
            cargo_slots: 0,
            aircraft_capacity: 0,
            carrier_landable: false,
            infantry_equivalent: false,
            bombards: false,
        }
    }

    /// Create an air unit.
    pub const fn air(attack: u8, defense: u8, movement: u8, cost: Ipcs) -> Self {
        Self {
            attack,
            defense,
            movement,
            cost,
            hit_points: 1,
            class: UnitClass::Air,
            structure: false,
            captured_with_territory: false,
            cargo_slots: 0,
            aircraft_capacity: 0,
            carrier_landable: false,
            infantry_equivalent: false,
            bombards: false,
        }
    }

    /// Create a sea unit.
    pub const fn sea(attack: u8, defense: u8, movement: u8, cost: Ipcs) -> Self {
        Self {
            attack,
            defense,
            movement,
            cost,
            hit_points: 1,
            class: UnitClass::Sea,
            structure: false,
            captured_with_territory: false,
            cargo_slots: 0,
            aircraft_capacity: 0,
            carrier_landable: false,
            infantry_equivalent: false,
            bombards: false,
        }
    }

    /// Create a structure (buildable, non-combatant, captured in place).
    pub const fn building(cost: Ipcs) -> Self {
        Self {
            attack: 0,
            defense: 0,
            movement: 0,
            cost,
            hit_points: 1,
            class: UnitClass::Land,
            structure: true,
            captured_with_territory: true,
            cargo_slots: 0,
            aircraft_capacity: 0,
            carrier_landable: false,
            infantry_equivalent: false,
            bombards: false,
        }
    }

    const fn with_hit_points(mut self, hits: u8) -> Self {
        self.hit_points = hits;
        self
    }

    const fn with_cargo_slots(mut self, slots: u8) -> Self {
        self.cargo_slots = slots;
        self
    }

    const fn with_aircraft_capacity(mut self, capacity: u8) -> Self {
        self.aircraft_capacity = capacity;
        self
    }

    const fn carrier_landable(mut self) -> Self {
        self.carrier_landable = true;
        self
    }

    const fn infantry_equivalent(mut self) -> Self {
        self.infantry_equivalent = true;
        self
    }

    const fn bombarding(mut self) -> Self {
        self.bombards = true;
        self
    }

    const fn captured_in_place(mut self) -> Self {
        self.captured_with_territory = true;
        self
    }

    /// Whether this unit can score or soak hits in battle. Structures and
    /// 0/0 support pieces neither fight nor block a win.
    pub fn is_combat_capable(&self) -> bool {
        !self.structure && (self.attack > 0 || self.defense > 0)
    }

    /// Whether this unit soaks more than one hit before sinking.
    pub fn is_multi_hit(&self) -> bool {
        self.hit_points > 1
    }
}

/// The complete unit definition table.
///
/// Supplied whole by the caller before any combat, movement, or purchase
/// call; [`UnitTable::new`] rejects incomplete tables so lookups are total.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UnitTable {
    defs: HashMap<UnitKind, UnitDef>,
}

/// Errors from unit table construction.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum UnitTableError {
    #[error("unit table is missing a definition for {0}")]
    MissingDefinition(UnitKind),
}

impl UnitTable {
    /// Build a table from explicit definitions. Every [`UnitKind`] must be
    /// present.
    pub fn new(defs: HashMap<UnitKind, UnitDef>) -> Result<Self, UnitTableError> {
        for kind in UnitKind::ALL {
            if !defs.contains_key(&kind) {
                return Err(UnitTableError::MissingDefinition(kind));
            }
        }
        Ok(Self { defs })
    }

    /// The standard table.
    pub fn standard() -> Self {
        let mut defs = HashMap::new();
        defs.insert(UnitKind::Infantry, UnitDef::land(1, 2, 1, 3).infantry_equivalent());
        defs.insert(UnitKind::Armor, UnitDef::land(3, 3, 2, 6));
        defs.insert(UnitKind::Artillery, UnitDef::land(2, 2, 1, 4));
        defs.insert(UnitKind::AntiAir, UnitDef::land(0, 0, 1, 5).captured_in_place());
        defs.insert(UnitKind::Factory, UnitDef::building(15));
        defs.insert(UnitKind::Fighter, UnitDef::air(3, 4, 4, 10).carrier_landable());
        defs.insert(UnitKind::Bomber, UnitDef::air(4, 1, 6, 12));
        defs.insert(UnitKind::Transport, UnitDef::sea(0, 1, 2, 7).with_cargo_slots(2));
        defs.insert(
            UnitKind::Carrier,
            UnitDef::sea(1, 2, 2, 14).with_aircraft_capacity(2),
        );
        defs.insert(
            UnitKind::Battleship,
            UnitDef::sea(4, 4, 2, 20).with_hit_points(2).bombarding(),
        );
        defs.insert(UnitKind::Cruiser, UnitDef::sea(3, 3, 2, 12).bombarding());
        defs.insert(UnitKind::Destroyer, UnitDef::sea(2, 2, 2, 8));
        defs.insert(UnitKind::Submarine, UnitDef::sea(2, 1, 2, 6));
        Self { defs }
    }

    /// Look up a definition. Total by construction.
    pub fn get(&self, kind: UnitKind) -> &UnitDef {
        &self.defs[&kind]
    }

    /// All kinds in the table with their definitions.
    pub fn iter(&self) -> impl Iterator<Item = (UnitKind, &UnitDef)> {
        self.defs.iter().map(|(k, d)| (*k, d))
    }
}

impl Default for UnitTable {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_table_complete() {
        let table = UnitTable::standard();
        for kind in UnitKind::ALL {
            // get() would panic on a hole
            let _ = table.get(kind);
        }
    }

    #[test]
    fn test_incomplete_table_rejected() {
        let mut defs = HashMap::new();
        defs.insert(UnitKind::Infantry, UnitDef::land(1, 2, 1, 3));
        assert!(matches!(
            UnitTable::new(defs),
            Err(UnitTableError::MissingDefinition(_))
        ));
    }

    #[test]
    fn test_combat_capability() {
        let table = UnitTable::standard();
        assert!(table.get(UnitKind::Infantry).is_combat_capable());
        assert!(table.get(UnitKind::Transport).is_combat_capable()); // defends at 1
        assert!(!table.get(UnitKind::AntiAir).is_combat_capable());
        assert!(!table.get(UnitKind::Factory).is_combat_capable());
    }

    #[test]
    fn test_battleship_multi_hit() {
        let table = UnitTable::standard();
        assert!(table.get(UnitKind::Battleship).is_multi_hit());
        assert!(!table.get(UnitKind::Cruiser).is_multi_hit());
    }

    #[test]
    fn test_capture_flags() {
        let table = UnitTable::standard();
        assert!(table.get(UnitKind::Factory).captured_with_territory);
        assert!(table.get(UnitKind::AntiAir).captured_with_territory);
        assert!(!table.get(UnitKind::Infantry).captured_with_territory);
    }

    #[test]
    fn test_table_serialization() {
        let table = UnitTable::standard();
        let json = serde_json::to_string(&table).unwrap();
        let restored: UnitTable = serde_json::from_str(&json).unwrap();
        assert_eq!(
            restored.get(UnitKind::Bomber).movement,
            table.get(UnitKind::Bomber).movement
        );
    }
}
