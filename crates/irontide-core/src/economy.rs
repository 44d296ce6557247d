//! Economy - income collection and mobilization placement rules.

use crate::engine::ActionError;
use crate::game_state::Game;
use crate::research::effective_def;
use crate::types::{Ipcs, PlayerId};
use crate::units::{UnitClass, UnitKind};

/// Income the player collects at turn end: printed production of every
/// territory they control, with capitals fixed at the configured capital
/// production - zeroed entirely while the player's own capital is lost -
/// plus bonuses for fully-controlled continents.
pub fn income_for(game: &Game, player: PlayerId) -> Ipcs {
    if game.player(player).capital_lost {
        return 0;
    }
    let mut income = 0;
    for territory in game.map.iter() {
        let Some(state) = game.territory(&territory.name) else {
            continue;
        };
        if state.owner != Some(player) {
            continue;
        }
        income += if state.capital_of.is_some() {
            game.rules.capital_production
        } else {
            territory.production
        };
    }
    income + continent_bonus_for(game, player)
}

/// Continent bonuses for continents where every member territory is owned
/// by the player.
pub fn continent_bonus_for(game: &Game, player: PlayerId) -> Ipcs {
    game.map
        .continents()
        .iter()
        .filter(|continent| {
            !continent.members.is_empty()
                && continent.members.iter().all(|member| {
                    game.territory(member).and_then(|t| t.owner) == Some(player)
                })
        })
        .map(|continent| continent.bonus)
        .sum()
}

/// What a unit costs this player, with technology discounts applied.
pub fn unit_cost(game: &Game, player: PlayerId, kind: UnitKind) -> Ipcs {
    effective_def(game.units.get(kind), &game.player(player).tech, kind).cost
}

/// Validate a mobilization destination. Land and air units mobilize at an
/// owned territory with a factory; naval units at a sea zone adjacent to
/// one; a factory builds on an owned land territory that lacks one.
pub fn validate_mobilize(
    game: &Game,
    player: PlayerId,
    kind: UnitKind,
    territory: &str,
) -> Result<(), ActionError> {
    let target = game
        .map
        .get(territory)
        .ok_or_else(|| ActionError::UnknownTerritory(territory.to_string()))?;
    let def = game.units.get(kind);

    if def.structure {
        if target.water || game.territory(territory).and_then(|t| t.owner) != Some(player) {
            return Err(ActionError::NotOwner(territory.to_string()));
        }
        if game.has_factory(territory) {
            return Err(ActionError::FactoryExists(territory.to_string()));
        }
        return Ok(());
    }

    match def.class {
        UnitClass::Land | UnitClass::Air => {
            if target.water || game.territory(territory).and_then(|t| t.owner) != Some(player) {
                return Err(ActionError::NotOwner(territory.to_string()));
            }
            if !game.has_factory(territory) {
                return Err(ActionError::NoFactory(territory.to_string()));
            }
            Ok(())
        }
        UnitClass::Sea => {
            if !target.water {
                return Err(ActionError::NotASeaZone(territory.to_string()));
            }
            if game.has_hostile_combat_units(territory, player) {
                return Err(ActionError::IllegalDestination(territory.to_string()));
            }
            let near_factory = game.map.neighbors(territory).iter().any(|coast| {
                game.territory(coast).and_then(|t| t.owner) == Some(player)
                    && game.has_factory(coast)
            });
            if !near_factory {
                return Err(ActionError::NoAdjacentFactory(territory.to_string()));
            }
            Ok(())
        }
    }
}
