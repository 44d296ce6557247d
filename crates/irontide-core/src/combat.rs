//! Combat resolution - multi-round dice battles with ordered casualties.
//!
//! The resolver is pure over extracted forces: the engine assembles
//! [`CombatUnit`]s from territory stacks and ships, runs rounds here, and
//! maps the results back into game state. Each side rolls one d6 per unit
//! against its attack (attacking) or defense (defending) value; a roll at
//! or below the value is a hit. Hits are applied simultaneously.

use crate::rng::Dice;
use crate::types::{Ipcs, PlayerId, ShipId};
use crate::units::UnitKind;
use serde::{Deserialize, Serialize};

/// One fighting unit, with its combat numbers resolved up front (base
/// stats plus the owner's technologies).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatUnit {
    pub kind: UnitKind,
    pub owner: PlayerId,
    /// Individualized hull this unit is, if any (its cargo sinks with it).
    pub ship: Option<ShipId>,
    pub attack: u8,
    pub defense: u8,
    pub cost: Ipcs,
    pub hit_points: u8,
    pub hits_taken: u8,
}

impl CombatUnit {
    fn is_multi_hit(&self) -> bool {
        self.hit_points > 1
    }

    fn destroyed_by_one_more_hit(&self) -> bool {
        self.hits_taken + 1 >= self.hit_points
    }
}

/// What a single round of battle did. Losses carry the full units so the
/// caller can map ship identities back to state.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundReport {
    pub bombardment_hits: u32,
    pub attacker_hits: u32,
    pub defender_hits: u32,
    pub attacker_losses: Vec<CombatUnit>,
    pub defender_losses: Vec<CombatUnit>,
}

impl RoundReport {
    /// Kinds lost by the defender, in casualty order.
    pub fn defender_loss_kinds(&self) -> Vec<UnitKind> {
        self.defender_losses.iter().map(|u| u.kind).collect()
    }

    /// Kinds lost by the attacker, in casualty order.
    pub fn attacker_loss_kinds(&self) -> Vec<UnitKind> {
        self.attacker_losses.iter().map(|u| u.kind).collect()
    }
}

/// Battle state after a round.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BattleStatus {
    /// Both sides still have combat-capable units.
    Ongoing,
    /// The defender has no units left; the attacker takes the territory
    /// (or clears the sea zone).
    AttackerWins,
    /// The attacker has no units left (mutual destruction counts: the
    /// ground is held, not taken).
    DefenderHolds,
    /// Neither side can ever score a hit; the attack is called off.
    Stalemate,
}

/// Evaluate the battle state without rolling.
pub fn status(attackers: &[CombatUnit], defenders: &[CombatUnit], bombardment_spent: bool) -> BattleStatus {
    if attackers.is_empty() {
        return BattleStatus::DefenderHolds;
    }
    if defenders.is_empty() {
        return BattleStatus::AttackerWins;
    }
    let attacker_can_hit =
        attackers.iter().any(|u| u.attack > 0) || !bombardment_spent;
    let defender_can_hit = defenders.iter().any(|u| u.defense > 0);
    if !attacker_can_hit && !defender_can_hit {
        return BattleStatus::Stalemate;
    }
    BattleStatus::Ongoing
}

/// Fight one round. `bombardment` holds the attack values of supporting
/// ships and must only be non-empty on the first round of an amphibious
/// land battle - bombardment fires once per battle, not every round.
pub fn fight_round(
    attackers: &mut Vec<CombatUnit>,
    defenders: &mut Vec<CombatUnit>,
    bombardment: &[u8],
    rng: &mut dyn Dice,
) -> RoundReport {
    let mut report = RoundReport::default();

    for &value in bombardment {
        if rng.roll_d6() <= value {
            report.bombardment_hits += 1;
        }
    }
    for unit in attackers.iter() {
        if unit.attack > 0 && rng.roll_d6() <= unit.attack {
            report.attacker_hits += 1;
        }
    }
    for unit in defenders.iter() {
        if unit.defense > 0 && rng.roll_d6() <= unit.defense {
            report.defender_hits += 1;
        }
    }

    // Hits land simultaneously: both sides' casualties come off after all
    // dice are thrown.
    report.defender_losses = assign_hits(defenders, report.attacker_hits + report.bombardment_hits);
    report.attacker_losses = assign_hits(attackers, report.defender_hits);
    report
}

/// Apply hits to a force and remove the dead.
///
/// Order: already-damaged multi-hit ships are finished off first, then
/// undamaged multi-hit ships take one hit each (damaged, not destroyed),
/// then remaining hits destroy the cheapest units first.
fn assign_hits(force: &mut Vec<CombatUnit>, mut hits: u32) -> Vec<CombatUnit> {
    let mut losses = Vec::new();

    // Finish off damaged capital ships.
    while hits > 0 {
        let Some(index) = force
            .iter()
            .position(|u| u.is_multi_hit() && u.hits_taken > 0 && u.destroyed_by_one_more_hit())
        else {
            break;
        };
        losses.push(force.remove(index));
        hits -= 1;
    }

    // Damage (not destroy) undamaged capital ships, one hit each.
    for unit in force.iter_mut() {
        if hits == 0 {
            break;
        }
        if unit.is_multi_hit() && !unit.destroyed_by_one_more_hit() {
            unit.hits_taken += 1;
            hits -= 1;
        }
    }

    // Destroy cheapest-first.
    while hits > 0 && !force.is_empty() {
        let mut cheapest = 0;
        for (index, unit) in force.iter().enumerate() {
            if unit.cost < force[cheapest].cost {
                cheapest = index;
            }
        }
        losses.push(force.remove(cheapest));
        hits -= 1;
    }

    losses
}
