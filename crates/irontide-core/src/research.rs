//! Technology research - dice accumulation and breakthroughs.
//!
//! Paying the research-die cost accumulates dice; rolling consumes all
//! accumulated dice at once, and any die showing a 6 grants a breakthrough
//! the player spends on a technology of their choice.

use crate::rng::Dice;
use crate::units::{UnitDef, UnitKind};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Die face that grants a breakthrough.
pub const BREAKTHROUGH_FACE: u8 = 6;

/// Permanent unit upgrades unlockable through research.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Technology {
    /// Fighters attack at 4.
    JetFighters,
    /// Bombers defend at 2.
    ArmoredFuselage,
    /// Submarines attack at 3.
    SuperSubmarines,
    /// Fighters and bombers gain +2 movement.
    LongRangeAircraft,
    /// Transports gain +1 movement.
    CombinedConvoys,
    /// New units cost 1 IPC less (minimum 1).
    IndustrialProduction,
}

impl Technology {
    pub const ALL: [Technology; 6] = [
        Technology::JetFighters,
        Technology::ArmoredFuselage,
        Technology::SuperSubmarines,
        Technology::LongRangeAircraft,
        Technology::CombinedConvoys,
        Technology::IndustrialProduction,
    ];
}

impl std::fmt::Display for Technology {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Technology::JetFighters => "Jet Fighters",
            Technology::ArmoredFuselage => "Armored Fuselage",
            Technology::SuperSubmarines => "Super Submarines",
            Technology::LongRangeAircraft => "Long-Range Aircraft",
            Technology::CombinedConvoys => "Combined Convoys",
            Technology::IndustrialProduction => "Industrial Production",
        };
        write!(f, "{}", name)
    }
}

/// Per-player research state.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TechState {
    /// Research dice bought but not yet rolled.
    pub dice: u32,
    /// Breakthroughs rolled but not yet spent on a technology.
    pub pending_breakthroughs: u32,
    /// Unlocked technologies.
    pub unlocked: HashSet<Technology>,
}

impl TechState {
    /// Roll all accumulated dice. Returns the faces rolled; each
    /// [`BREAKTHROUGH_FACE`] becomes a pending breakthrough.
    pub fn roll(&mut self, rng: &mut dyn Dice) -> Vec<u8> {
        let mut faces = Vec::with_capacity(self.dice as usize);
        for _ in 0..self.dice {
            let face = rng.roll_d6();
            if face == BREAKTHROUGH_FACE {
                self.pending_breakthroughs += 1;
            }
            faces.push(face);
        }
        self.dice = 0;
        faces
    }

    /// Spend a pending breakthrough on a technology. Returns false if there
    /// is no breakthrough to spend or the technology is already unlocked.
    pub fn unlock(&mut self, tech: Technology) -> bool {
        if self.pending_breakthroughs == 0 || self.unlocked.contains(&tech) {
            return false;
        }
        self.pending_breakthroughs -= 1;
        self.unlocked.insert(tech);
        true
    }

    pub fn has(&self, tech: Technology) -> bool {
        self.unlocked.contains(&tech)
    }
}

/// Apply a player's unlocked technologies to a base unit definition.
///
/// Combat and movement read stats through this so upgrades take effect
/// everywhere without mutating the shared table.
pub fn effective_def(base: &UnitDef, tech: &TechState, kind: UnitKind) -> UnitDef {
    let mut def = *base;
    if tech.has(Technology::JetFighters) && kind == UnitKind::Fighter {
        def.attack = def.attack.max(4);
    }
    if tech.has(Technology::ArmoredFuselage) && kind == UnitKind::Bomber {
        def.defense = def.defense.max(2);
    }
    if tech.has(Technology::SuperSubmarines) && kind == UnitKind::Submarine {
        def.attack = def.attack.max(3);
    }
    if tech.has(Technology::LongRangeAircraft) && def.class == crate::units::UnitClass::Air {
        def.movement += 2;
    }
    if tech.has(Technology::CombinedConvoys) && kind == UnitKind::Transport {
        def.movement += 1;
    }
    if tech.has(Technology::IndustrialProduction) {
        def.cost = def.cost.saturating_sub(1).max(1);
    }
    def
}
