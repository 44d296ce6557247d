//! Logistics - individualized ships and cargo capacity.
//!
//! Grouped ship stacks are fungible. The moment a hull takes cargo (or an
//! aircraft lands on it) it is split out of the stack into a [`Ship`] with a
//! unique id, its own cargo list, and its own movement counter, so partial
//! movement and capacity stay correct per hull. Idle hulls are re-merged
//! into the fungible stack at end of turn.

use crate::types::{PlayerId, ShipId};
use crate::units::{UnitClass, UnitKind, UnitTable};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// An individualized hull with identity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ship {
    pub id: ShipId,
    pub kind: UnitKind,
    pub owner: PlayerId,
    /// Land units aboard (transports).
    pub cargo: Vec<UnitKind>,
    /// Aircraft aboard (carriers).
    pub aircraft: Vec<UnitKind>,
    /// Movement spent this turn.
    pub movement_used: u8,
    /// Hits taken (multi-hit hulls).
    pub damaged: u8,
}

/// Errors from loading cargo or aircraft.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum CargoError {
    #[error("{0} has no cargo slots")]
    NotATransport(UnitKind),
    #[error("{0} has no aircraft capacity")]
    NotACarrier(UnitKind),
    #[error("{0} is not a land unit and cannot be carried as cargo")]
    NotLandCargo(UnitKind),
    #[error("{0} cannot land on a carrier")]
    NotCarrierLandable(UnitKind),
    #[error("transport is full")]
    TransportFull,
    #[error("transport already carries a non-infantry unit")]
    SecondHeavyItem,
    #[error("carrier is full")]
    CarrierFull,
}

impl Ship {
    fn heavy_aboard(&self, table: &UnitTable) -> bool {
        self.cargo
            .iter()
            .any(|kind| !table.get(*kind).infantry_equivalent)
    }

    /// Check whether a land unit fits aboard. Capacity rule: two
    /// infantry-equivalents, or one infantry-equivalent plus one other land
    /// unit, or one non-infantry unit alone.
    pub fn can_load_cargo(&self, table: &UnitTable, kind: UnitKind) -> Result<(), CargoError> {
        let hull = table.get(self.kind);
        if hull.cargo_slots == 0 {
            return Err(CargoError::NotATransport(self.kind));
        }
        let unit = table.get(kind);
        if unit.class != UnitClass::Land || unit.structure {
            return Err(CargoError::NotLandCargo(kind));
        }
        if self.cargo.len() as u8 >= hull.cargo_slots {
            return Err(CargoError::TransportFull);
        }
        if !unit.infantry_equivalent && self.heavy_aboard(table) {
            return Err(CargoError::SecondHeavyItem);
        }
        Ok(())
    }

    /// Load a land unit, enforcing the capacity rule.
    pub fn load_cargo(&mut self, table: &UnitTable, kind: UnitKind) -> Result<(), CargoError> {
        self.can_load_cargo(table, kind)?;
        self.cargo.push(kind);
        Ok(())
    }

    /// Check whether an aircraft can land aboard.
    pub fn can_load_aircraft(&self, table: &UnitTable, kind: UnitKind) -> Result<(), CargoError> {
        let hull = table.get(self.kind);
        if hull.aircraft_capacity == 0 {
            return Err(CargoError::NotACarrier(self.kind));
        }
        if !table.get(kind).carrier_landable {
            return Err(CargoError::NotCarrierLandable(kind));
        }
        if self.aircraft.len() as u8 >= hull.aircraft_capacity {
            return Err(CargoError::CarrierFull);
        }
        Ok(())
    }

    /// Land an aircraft aboard.
    pub fn load_aircraft(&mut self, table: &UnitTable, kind: UnitKind) -> Result<(), CargoError> {
        self.can_load_aircraft(table, kind)?;
        self.aircraft.push(kind);
        Ok(())
    }

    /// Unused aircraft capacity.
    pub fn free_aircraft_capacity(&self, table: &UnitTable) -> u8 {
        table
            .get(self.kind)
            .aircraft_capacity
            .saturating_sub(self.aircraft.len() as u8)
    }

    /// A hull with nothing aboard and no per-turn state can fold back into
    /// the fungible stack.
    pub fn is_idle(&self) -> bool {
        self.cargo.is_empty()
            && self.aircraft.is_empty()
            && self.movement_used == 0
            && self.damaged == 0
    }
}

/// Arena of individualized ships, indexed by id.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipArena {
    ships: HashMap<ShipId, Ship>,
    next_id: ShipId,
}

impl ShipArena {
    pub fn new() -> Self {
        Self {
            ships: HashMap::new(),
            next_id: 1,
        }
    }

    /// Individualize a hull out of a fungible stack.
    pub fn individualize(
        &mut self,
        kind: UnitKind,
        owner: PlayerId,
        movement_used: u8,
        damaged: u8,
    ) -> ShipId {
        let id = self.next_id;
        self.next_id += 1;
        self.ships.insert(
            id,
            Ship {
                id,
                kind,
                owner,
                cargo: Vec::new(),
                aircraft: Vec::new(),
                movement_used,
                damaged,
            },
        );
        id
    }

    pub fn get(&self, id: ShipId) -> Option<&Ship> {
        self.ships.get(&id)
    }

    pub fn get_mut(&mut self, id: ShipId) -> Option<&mut Ship> {
        self.ships.get_mut(&id)
    }

    /// Remove a ship (sunk, or re-merged into a stack).
    pub fn remove(&mut self, id: ShipId) -> Option<Ship> {
        self.ships.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.ships.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ships.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport(arena: &mut ShipArena) -> ShipId {
        arena.individualize(UnitKind::Transport, 0, 0, 0)
    }

    #[test]
    fn test_two_infantry_fit() {
        let table = UnitTable::standard();
        let mut arena = ShipArena::new();
        let id = transport(&mut arena);
        let ship = arena.get_mut(id).unwrap();
        ship.load_cargo(&table, UnitKind::Infantry).unwrap();
        ship.load_cargo(&table, UnitKind::Infantry).unwrap();
        assert_eq!(
            ship.load_cargo(&table, UnitKind::Infantry),
            Err(CargoError::TransportFull)
        );
    }

    #[test]
    fn test_infantry_plus_heavy_fits() {
        let table = UnitTable::standard();
        let mut arena = ShipArena::new();
        let id = transport(&mut arena);
        let ship = arena.get_mut(id).unwrap();
        ship.load_cargo(&table, UnitKind::Infantry).unwrap();
        ship.load_cargo(&table, UnitKind::Armor).unwrap();
        assert_eq!(ship.cargo.len(), 2);
    }

    #[test]
    fn test_two_heavy_rejected() {
        let table = UnitTable::standard();
        let mut arena = ShipArena::new();
        let id = transport(&mut arena);
        let ship = arena.get_mut(id).unwrap();
        ship.load_cargo(&table, UnitKind::Armor).unwrap();
        assert_eq!(
            ship.load_cargo(&table, UnitKind::Artillery),
            Err(CargoError::SecondHeavyItem)
        );
    }

    #[test]
    fn test_only_land_units_as_cargo() {
        let table = UnitTable::standard();
        let mut arena = ShipArena::new();
        let id = transport(&mut arena);
        let ship = arena.get_mut(id).unwrap();
        assert_eq!(
            ship.load_cargo(&table, UnitKind::Fighter),
            Err(CargoError::NotLandCargo(UnitKind::Fighter))
        );
        assert_eq!(
            ship.load_cargo(&table, UnitKind::Factory),
            Err(CargoError::NotLandCargo(UnitKind::Factory))
        );
    }

    #[test]
    fn test_carrier_capacity() {
        let table = UnitTable::standard();
        let mut arena = ShipArena::new();
        let id = arena.individualize(UnitKind::Carrier, 0, 0, 0);
        let ship = arena.get_mut(id).unwrap();
        assert_eq!(ship.free_aircraft_capacity(&table), 2);
        ship.load_aircraft(&table, UnitKind::Fighter).unwrap();
        ship.load_aircraft(&table, UnitKind::Fighter).unwrap();
        assert_eq!(
            ship.load_aircraft(&table, UnitKind::Fighter),
            Err(CargoError::CarrierFull)
        );
    }

    #[test]
    fn test_bomber_cannot_land_on_carrier() {
        let table = UnitTable::standard();
        let mut arena = ShipArena::new();
        let id = arena.individualize(UnitKind::Carrier, 0, 0, 0);
        let ship = arena.get_mut(id).unwrap();
        assert_eq!(
            ship.load_aircraft(&table, UnitKind::Bomber),
            Err(CargoError::NotCarrierLandable(UnitKind::Bomber))
        );
    }

    #[test]
    fn test_non_carrier_rejects_aircraft() {
        let table = UnitTable::standard();
        let mut arena = ShipArena::new();
        let id = transport(&mut arena);
        let ship = arena.get_mut(id).unwrap();
        assert_eq!(
            ship.load_aircraft(&table, UnitKind::Fighter),
            Err(CargoError::NotACarrier(UnitKind::Transport))
        );
    }

    #[test]
    fn test_idle_detection() {
        let mut arena = ShipArena::new();
        let id = transport(&mut arena);
        assert!(arena.get(id).unwrap().is_idle());

        let table = UnitTable::standard();
        arena
            .get_mut(id)
            .unwrap()
            .load_cargo(&table, UnitKind::Infantry)
            .unwrap();
        assert!(!arena.get(id).unwrap().is_idle());
    }

    #[test]
    fn test_unique_ids() {
        let mut arena = ShipArena::new();
        let a = transport(&mut arena);
        let b = transport(&mut arena);
        assert_ne!(a, b);
        arena.remove(a);
        let c = transport(&mut arena);
        assert_ne!(b, c);
    }
}
