//! Reachability - per-unit-class breadth-first search over the map.
//!
//! Terrain legality differs per class, so land, sea, and air each get their
//! own search. Results map every reachable territory to its hop distance
//! and path; the engine validates destinations against these and answers
//! "can this aircraft still reach a landing spot" queries.

use crate::game_state::Game;
use crate::types::PlayerId;
use crate::units::UnitClass;
use std::collections::{HashMap, VecDeque};

/// Which movement phase the search is validating.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MovePhase {
    Combat,
    NonCombat,
}

/// A reachable territory: shortest hop count and one shortest path
/// (origin inclusive).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reach {
    pub distance: u8,
    pub path: Vec<String>,
}

/// Dispatch on unit class.
pub fn reachable(
    game: &Game,
    class: UnitClass,
    owner: PlayerId,
    origin: &str,
    allowance: u8,
    phase: MovePhase,
) -> HashMap<String, Reach> {
    match class {
        UnitClass::Land => land_reachable(game, owner, origin, allowance, phase),
        UnitClass::Sea => sea_reachable(game, owner, origin, allowance, phase),
        UnitClass::Air => air_reachable(game, origin, allowance),
    }
}

/// How the search may treat a territory.
enum Step {
    /// May enter and keep moving through.
    Through,
    /// May enter but must stop there.
    Terminal,
    /// May not enter at all.
    Blocked,
}

/// Generic BFS given a per-territory step rule and a neighbor expansion.
fn search(
    origin: &str,
    allowance: u8,
    neighbors: impl Fn(&str) -> Vec<String>,
    step: impl Fn(&str) -> Step,
) -> HashMap<String, Reach> {
    let mut reached: HashMap<String, Reach> = HashMap::new();
    reached.insert(
        origin.to_string(),
        Reach {
            distance: 0,
            path: vec![origin.to_string()],
        },
    );
    if allowance == 0 {
        return reached;
    }

    let mut frontier: VecDeque<(String, u8)> = VecDeque::new();
    frontier.push_back((origin.to_string(), 0));

    while let Some((current, distance)) = frontier.pop_front() {
        if distance >= allowance {
            continue;
        }
        let current_path = reached[&current].path.clone();
        for next in neighbors(&current) {
            if reached.contains_key(&next) {
                continue;
            }
            let rule = step(&next);
            if matches!(rule, Step::Blocked) {
                continue;
            }
            let mut path = current_path.clone();
            path.push(next.clone());
            reached.insert(
                next.clone(),
                Reach {
                    distance: distance + 1,
                    path,
                },
            );
            if matches!(rule, Step::Through) {
                frontier.push_back((next, distance + 1));
            }
        }
    }

    reached
}

/// Land movement: non-water territories only, with land bridges as extra
/// adjacency. During non-combat movement hostile territory may not be
/// entered or passed through; during combat movement it is a legal terminal
/// destination but never a way-point (blitzing passes only through
/// friendly or unclaimed-empty territory).
pub fn land_reachable(
    game: &Game,
    owner: PlayerId,
    origin: &str,
    allowance: u8,
    phase: MovePhase,
) -> HashMap<String, Reach> {
    search(
        origin,
        allowance,
        |name| {
            let mut next: Vec<String> = game.map.neighbors(name).to_vec();
            next.extend(game.map.bridge_neighbors(name).iter().cloned());
            next
        },
        |name| {
            let Some(territory) = game.map.get(name) else {
                return Step::Blocked;
            };
            if territory.water {
                return Step::Blocked;
            }
            let hostile = game.is_hostile(name, owner) || game.has_hostile_units(name, owner);
            if !hostile {
                return Step::Through;
            }
            match phase {
                MovePhase::Combat => Step::Terminal,
                MovePhase::NonCombat => Step::Blocked,
            }
        },
    )
}

/// Sea movement: water zones only. A zone occupied by hostile
/// combat-capable units blocks non-combat transit entirely but remains a
/// legal combat-move target and way-point.
pub fn sea_reachable(
    game: &Game,
    owner: PlayerId,
    origin: &str,
    allowance: u8,
    phase: MovePhase,
) -> HashMap<String, Reach> {
    search(
        origin,
        allowance,
        |name| game.map.neighbors(name).to_vec(),
        |name| {
            let Some(territory) = game.map.get(name) else {
                return Step::Blocked;
            };
            if !territory.water {
                return Step::Blocked;
            }
            if game.has_hostile_combat_units(name, owner) {
                match phase {
                    MovePhase::Combat => Step::Through,
                    MovePhase::NonCombat => Step::Blocked,
                }
            } else {
                Step::Through
            }
        },
    )
}

/// Air movement ignores the land/water distinction entirely; whether the
/// destination is a legal place to *stop* (carrier capacity, attackable
/// hostiles, friendly landing) is the engine's check, not the search's.
pub fn air_reachable(game: &Game, origin: &str, allowance: u8) -> HashMap<String, Reach> {
    search(
        origin,
        allowance,
        |name| game.map.neighbors(name).to_vec(),
        |name| {
            if game.map.contains(name) {
                Step::Through
            } else {
                Step::Blocked
            }
        },
    )
}
