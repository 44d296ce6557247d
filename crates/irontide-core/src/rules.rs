//! Rules configuration - one versioned engine, behavior selected by data.
//!
//! Rule variants (bombardment refinements, alliance victory, placement
//! limits, starting forces) are fields on [`RulesConfig`] rather than forked
//! code paths.

use crate::types::{AllianceId, Ipcs, VictoryMode};
use crate::units::UnitKind;
use serde::{Deserialize, Serialize};

/// A named alliance and its member players.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllianceConfig {
    pub name: String,
    pub members: Vec<crate::types::PlayerId>,
}

/// Configuration for a game session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RulesConfig {
    /// How the game is won.
    pub victory: VictoryMode,
    /// The two alliances, when playing [`VictoryMode::Alliance`].
    pub alliances: Vec<AllianceConfig>,
    /// Alliance victory needs only a strict majority of the opposing
    /// capitals instead of all of them.
    pub alliance_majority_suffices: bool,
    /// Shore bombardment requires the supporting sea zone to be free of
    /// live hostile combat units (or cleared this turn).
    pub bombardment_requires_cleared_zone: bool,
    /// IPCs each player starts with.
    pub starting_ipcs: Ipcs,
    /// Units each player may place during setup.
    pub starting_pool: Vec<(UnitKind, u32)>,
    /// Maximum units placed per player per setup round.
    pub placement_units_per_round: u32,
    /// Production collected for a capital, regardless of its printed value.
    pub capital_production: Ipcs,
    /// Cost of one research die.
    pub research_die_cost: Ipcs,
    /// Escalating card-set payouts, indexed by the player's own trade
    /// count; the last entry repeats once the table is exhausted.
    pub card_payouts: Vec<Ipcs>,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            victory: VictoryMode::CapitalMajority,
            alliances: Vec::new(),
            alliance_majority_suffices: false,
            bombardment_requires_cleared_zone: true,
            starting_ipcs: 12,
            starting_pool: vec![
                (UnitKind::Infantry, 8),
                (UnitKind::Armor, 3),
                (UnitKind::Artillery, 2),
                (UnitKind::Fighter, 2),
                (UnitKind::Transport, 1),
                (UnitKind::Destroyer, 1),
            ],
            placement_units_per_round: 6,
            capital_production: 10,
            research_die_cost: 5,
            card_payouts: vec![4, 6, 8, 10, 12, 15, 20, 25, 30],
        }
    }
}

impl RulesConfig {
    /// Configuration for a two-alliance game.
    pub fn with_alliances(first: AllianceConfig, second: AllianceConfig) -> Self {
        Self {
            victory: VictoryMode::Alliance,
            alliances: vec![first, second],
            ..Self::default()
        }
    }

    /// The alliance a player belongs to, if any.
    pub fn alliance_of(&self, player: crate::types::PlayerId) -> Option<AllianceId> {
        self.alliances
            .iter()
            .position(|a| a.members.contains(&player))
            .map(|i| i as AllianceId)
    }

    /// Payout for a player's nth trade (0-based), clamped to the table end.
    pub fn card_payout(&self, trades_made: u32) -> Ipcs {
        if self.card_payouts.is_empty() {
            return 0;
        }
        let index = (trades_made as usize).min(self.card_payouts.len() - 1);
        self.card_payouts[index]
    }
}
