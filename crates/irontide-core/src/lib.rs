//! Irontide Core Library
//!
//! This crate contains the core rules engine for Irontide, a turn-based
//! strategic conquest wargame: territory ownership, movement legality,
//! stochastic combat resolution, sea/air logistics, and the player economy,
//! driven by discrete actions from an external caller.
//!
//! # Design Principles
//!
//! - **No UI dependencies**: This crate is purely game logic
//! - **Deterministic**: Every randomness point goes through an injected
//!   [`rng::Dice`] source, so games replay from a seed
//! - **Serializable**: All state can be saved/loaded via serde through a
//!   versioned snapshot
//! - **Validation-first**: Illegal actions are structured errors and leave
//!   state untouched

// Static configuration
pub mod map;
pub mod rules;
pub mod types;
pub mod units;

// Game state
pub mod cargo;
pub mod game_state;

// Rules systems
pub mod cards;
pub mod combat;
pub mod economy;
pub mod movement;
pub mod research;
pub mod victory;

// Orchestration
pub mod engine;

// Persistence
pub mod snapshot;

// Randomness
pub mod rng;

// Re-exports for convenience
pub use cards::{draw_card, is_valid_set, CardHand, CardSymbol};
pub use cargo::{CargoError, Ship, ShipArena};
pub use combat::{fight_round, BattleStatus, CombatUnit, RoundReport};
pub use engine::{Action, ActionEffect, ActionError, ActionOutcome};
pub use game_state::{
    AirSortie, CombatSite, Game, GamePhase, MoveRecord, PendingPurchase, PlacementRecord, Player,
    SetupError, TerritoryState, TurnPhase, UnitStack,
};
pub use map::{Continent, MapConfig, MapError, MapGraph, Territory};
pub use movement::{air_reachable, land_reachable, reachable, sea_reachable, MovePhase, Reach};
pub use research::{effective_def, TechState, Technology};
pub use rng::{shuffle, Dice, FixedDice, SeededRng};
pub use rules::{AllianceConfig, RulesConfig};
pub use snapshot::{Snapshot, SnapshotError, MIN_SNAPSHOT_VERSION, SNAPSHOT_VERSION};
pub use types::{AllianceId, Ipcs, PlayerColor, PlayerId, ShipId, Side, VictoryMode};
pub use units::{UnitClass, UnitDef, UnitKind, UnitTable, UnitTableError};
pub use victory::evaluate as evaluate_victory;
