//! Root game state containing all game data.
//!
//! This struct is designed to be:
//! - Fully serializable for save/load and external sync
//! - Reconstructable from a versioned snapshot
//! - Mutated only through the action layer in [`crate::engine`]

use crate::cards::CardHand;
use crate::cargo::ShipArena;
use crate::map::MapGraph;
use crate::research::TechState;
use crate::rng::Dice;
use crate::rules::RulesConfig;
use crate::types::{Ipcs, PlayerColor, PlayerId, ShipId};
use crate::units::{UnitKind, UnitTable};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Phases of the game.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum GamePhase {
    /// Territories dealt; players are choosing capitals.
    #[default]
    CapitalPlacement,
    /// Starting pools are being placed in rounds.
    UnitPlacement,
    /// Normal turn cycle.
    Playing,
}

/// Sub-phases of a player turn, in fixed cyclic order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TurnPhase {
    #[default]
    DevelopTech,
    Purchase,
    CombatMove,
    Combat,
    NonCombatMove,
    Mobilize,
    CollectIncome,
}

impl TurnPhase {
    /// The next phase in the fixed order (CollectIncome wraps to
    /// DevelopTech for the next player).
    pub const fn next(self) -> TurnPhase {
        match self {
            TurnPhase::DevelopTech => TurnPhase::Purchase,
            TurnPhase::Purchase => TurnPhase::CombatMove,
            TurnPhase::CombatMove => TurnPhase::Combat,
            TurnPhase::Combat => TurnPhase::NonCombatMove,
            TurnPhase::NonCombatMove => TurnPhase::Mobilize,
            TurnPhase::Mobilize => TurnPhase::CollectIncome,
            TurnPhase::CollectIncome => TurnPhase::DevelopTech,
        }
    }
}

/// A fungible stack of identical units in a territory.
///
/// Stacks are keyed by (kind, owner, movement_used): units that have spent
/// different movement this turn never merge, so a stack's per-turn flags
/// hold for every unit in it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitStack {
    pub kind: UnitKind,
    pub owner: PlayerId,
    pub quantity: u32,
    /// Movement spent this turn by every unit in the stack.
    pub movement_used: u8,
    /// Units in the stack carrying one hit (multi-hit ships only).
    pub damaged: u32,
}

impl UnitStack {
    pub fn moved(&self) -> bool {
        self.movement_used > 0
    }
}

/// Dynamic per-territory state.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerritoryState {
    pub owner: Option<PlayerId>,
    /// Player whose capital this territory is.
    pub capital_of: Option<PlayerId>,
    pub stacks: Vec<UnitStack>,
    /// Individualized ships currently in this sea zone.
    pub ships: Vec<ShipId>,
}

impl TerritoryState {
    /// Add units, merging into a matching stack.
    pub fn add_units(&mut self, kind: UnitKind, owner: PlayerId, quantity: u32, used: u8) {
        if quantity == 0 {
            return;
        }
        for stack in &mut self.stacks {
            if stack.kind == kind && stack.owner == owner && stack.movement_used == used {
                stack.quantity += quantity;
                return;
            }
        }
        self.stacks.push(UnitStack {
            kind,
            owner,
            quantity,
            movement_used: used,
            damaged: 0,
        });
    }

    /// Remove units from a stack with exactly the given movement spent.
    /// Returns false (leaving state unchanged) if not enough are present.
    pub fn remove_units(&mut self, kind: UnitKind, owner: PlayerId, quantity: u32, used: u8) -> bool {
        for index in 0..self.stacks.len() {
            let stack = &mut self.stacks[index];
            if stack.kind == kind && stack.owner == owner && stack.movement_used == used {
                if stack.quantity < quantity {
                    return false;
                }
                stack.quantity -= quantity;
                stack.damaged = stack.damaged.min(stack.quantity);
                if stack.quantity == 0 {
                    self.stacks.remove(index);
                }
                return true;
            }
        }
        false
    }

    /// Count units of a kind and owner across all movement states.
    pub fn count_units(&self, kind: UnitKind, owner: PlayerId) -> u32 {
        self.stacks
            .iter()
            .filter(|s| s.kind == kind && s.owner == owner)
            .map(|s| s.quantity)
            .sum()
    }

    /// Count all units a player has here (stacks only, not ship cargo).
    pub fn count_all(&self, owner: PlayerId) -> u32 {
        self.stacks
            .iter()
            .filter(|s| s.owner == owner)
            .map(|s| s.quantity)
            .sum()
    }

    /// Whether any player other than `viewer`'s side has units here.
    pub fn has_units_hostile_to(&self, game: &Game, viewer: PlayerId) -> bool {
        self.stacks
            .iter()
            .any(|s| s.quantity > 0 && !game.is_ally(s.owner, viewer))
            || self
                .ships
                .iter()
                .filter_map(|id| game.ships.get(*id))
                .any(|ship| !game.is_ally(ship.owner, viewer))
    }
}

/// A player in the game.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub color: PlayerColor,
    /// Current treasury.
    pub ipcs: Ipcs,
    /// This player's capital territory, once placed.
    pub capital: Option<String>,
    /// The capital has been captured; income is zeroed until retaken.
    pub capital_lost: bool,
    /// Research state.
    pub tech: TechState,
    /// Conquest card hand.
    pub cards: CardHand,
    /// Number of card sets this player has traded.
    pub trades_made: u32,
    /// Territories captured this turn (drives the conquest card award).
    pub captures_this_turn: u32,
    /// Units not yet placed during setup.
    pub pool: HashMap<UnitKind, u32>,
    /// Units placed in the current setup round.
    pub placed_this_round: u32,
}

impl Player {
    /// Create a new player with the rules' starting treasury and pool.
    pub fn new(id: PlayerId, name: String, rules: &RulesConfig) -> Self {
        Self {
            id,
            name,
            color: PlayerColor::default_for_player(id),
            ipcs: rules.starting_ipcs,
            capital: None,
            capital_lost: false,
            tech: TechState::default(),
            cards: CardHand::new(),
            trades_made: 0,
            captures_this_turn: 0,
            pool: rules.starting_pool.iter().copied().collect(),
            placed_this_round: 0,
        }
    }

    /// Total units left in the setup pool.
    pub fn pool_remaining(&self) -> u32 {
        self.pool.values().sum()
    }
}

/// A purchase waiting for mobilization.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingPurchase {
    pub kind: UnitKind,
    pub quantity: u32,
    pub owner: PlayerId,
}

/// A territory queued for combat resolution. Naval battles are queued
/// before land battles.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatSite {
    pub territory: String,
    pub naval: bool,
    /// Rounds already fought.
    pub round: u32,
    /// Shore bombardment has fired (it fires once per battle).
    pub bombarded: bool,
}

/// Per-turn tracking of an air unit's spent movement, keyed by where it
/// started and where it is now. Used to validate post-combat landings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AirSortie {
    pub kind: UnitKind,
    pub owner: PlayerId,
    pub origin: String,
    pub location: String,
    pub spent: u8,
    pub quantity: u32,
}

/// One entry in the per-turn movement undo log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MoveRecord {
    UnitsMoved {
        from: String,
        to: String,
        kind: UnitKind,
        owner: PlayerId,
        quantity: u32,
        used_before: u8,
        used_after: u8,
        /// Previous owner when the move captured `to`.
        captured_from: Option<Option<PlayerId>>,
        /// Treasury transferred when the capture took a capital.
        plundered: Option<(PlayerId, Ipcs)>,
    },
    ShipMoved {
        ship: ShipId,
        from: String,
        to: String,
        used_before: u8,
    },
    Loaded {
        ship: ShipId,
        from: String,
        kind: UnitKind,
        used_before: u8,
        /// The hull was individualized for this load and can fold back.
        individualized: bool,
    },
    Unloaded {
        ship: ShipId,
        to: String,
        kinds: Vec<UnitKind>,
        /// The unload marked `to` as an amphibious-assault target.
        marked_amphibious: bool,
        captured_from: Option<Option<PlayerId>>,
        plundered: Option<(PlayerId, Ipcs)>,
    },
}

/// One entry in the per-turn placement undo log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementRecord {
    pub territory: String,
    pub kind: UnitKind,
    pub owner: PlayerId,
    pub quantity: u32,
    /// Setup placement draws from the pool; mobilization draws from
    /// pending purchases.
    pub from_pool: bool,
}

/// The complete state of a game at any point in time.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Game {
    /// Rules configuration (immutable after start).
    pub rules: RulesConfig,
    /// Map topology (immutable after load).
    pub map: MapGraph,
    /// Unit definition table (immutable after load).
    pub units: UnitTable,
    /// All players, in turn order.
    pub players: Vec<Player>,
    /// Dynamic state per territory, keyed by territory name.
    pub territories: HashMap<String, TerritoryState>,
    /// Individualized ships.
    pub ships: ShipArena,
    /// Game phase.
    pub phase: GamePhase,
    /// Sub-phase of the current turn (meaningful while Playing).
    pub turn_phase: TurnPhase,
    /// Whose turn it is.
    pub current_player: PlayerId,
    /// Round number; increments when the turn wraps past the last player.
    pub round: u32,
    /// Setup placement round counter.
    pub placement_round: u32,
    /// Purchases waiting for mobilization.
    pub pending_purchases: Vec<PendingPurchase>,
    /// Territories queued for combat, naval first.
    pub combats: Vec<CombatSite>,
    /// Sea zones won by the active player this turn (bombardment support).
    pub cleared_sea_zones: HashSet<String>,
    /// Territories marked as amphibious-assault targets this turn.
    pub amphibious_targets: HashSet<String>,
    /// Air movement spent this turn, per sortie.
    pub air_sorties: Vec<AirSortie>,
    /// Territories friendly to the active player at the start of their
    /// turn; post-combat air landings validate against this, not current
    /// ownership.
    pub friendly_at_turn_start: HashSet<String>,
    /// Per-turn movement undo log (LIFO, cleared at phase boundaries).
    pub move_log: Vec<MoveRecord>,
    /// Per-turn placement undo log.
    pub placement_log: Vec<PlacementRecord>,
    /// Set by the victory evaluator; never retracted.
    pub game_over: bool,
    pub winner: Option<PlayerId>,
    pub win_condition: Option<String>,
}

/// Errors from game construction.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SetupError {
    #[error("a game needs at least 2 players, got {0}")]
    NotEnoughPlayers(usize),
    #[error("a game supports at most 6 players, got {0}")]
    TooManyPlayers(usize),
    #[error("the map has fewer land territories than players")]
    MapTooSmall,
    #[error("alliance rules require every player to belong to an alliance")]
    UnassignedPlayer(PlayerId),
}

impl Game {
    /// Create a new game: territories are dealt randomly among the players
    /// and the game opens in capital placement.
    pub fn new(
        map: MapGraph,
        units: UnitTable,
        rules: RulesConfig,
        player_names: &[&str],
        rng: &mut dyn Dice,
    ) -> Result<Self, SetupError> {
        if player_names.len() < 2 {
            return Err(SetupError::NotEnoughPlayers(player_names.len()));
        }
        if player_names.len() > 6 {
            return Err(SetupError::TooManyPlayers(player_names.len()));
        }
        if rules.victory == crate::types::VictoryMode::Alliance {
            for id in 0..player_names.len() as PlayerId {
                if rules.alliance_of(id).is_none() {
                    return Err(SetupError::UnassignedPlayer(id));
                }
            }
        }

        let players: Vec<Player> = player_names
            .iter()
            .enumerate()
            .map(|(i, name)| Player::new(i as PlayerId, name.to_string(), &rules))
            .collect();

        let mut territories: HashMap<String, TerritoryState> = map
            .names()
            .map(|name| (name.to_string(), TerritoryState::default()))
            .collect();

        // Random initial assignment: shuffle the land territories (sorted
        // first so the deal depends only on the injected RNG) and deal them
        // round-robin.
        let mut land: Vec<String> = map
            .iter()
            .filter(|t| !t.water)
            .map(|t| t.name.clone())
            .collect();
        if land.len() < players.len() {
            return Err(SetupError::MapTooSmall);
        }
        land.sort_unstable();
        crate::rng::shuffle(rng, &mut land);
        for (i, name) in land.iter().enumerate() {
            if let Some(state) = territories.get_mut(name) {
                state.owner = Some((i % players.len()) as PlayerId);
            }
        }

        Ok(Self {
            rules,
            map,
            units,
            players,
            territories,
            ships: ShipArena::new(),
            phase: GamePhase::CapitalPlacement,
            turn_phase: TurnPhase::DevelopTech,
            current_player: 0,
            round: 0,
            placement_round: 0,
            pending_purchases: Vec::new(),
            combats: Vec::new(),
            cleared_sea_zones: HashSet::new(),
            amphibious_targets: HashSet::new(),
            air_sorties: Vec::new(),
            friendly_at_turn_start: HashSet::new(),
            move_log: Vec::new(),
            placement_log: Vec::new(),
            game_over: false,
            winner: None,
            win_condition: None,
        })
    }

    /// Get a player by ID.
    pub fn player(&self, id: PlayerId) -> &Player {
        &self.players[id as usize]
    }

    /// Get a mutable player by ID.
    pub fn player_mut(&mut self, id: PlayerId) -> &mut Player {
        &mut self.players[id as usize]
    }

    /// Get a territory's dynamic state.
    pub fn territory(&self, name: &str) -> Option<&TerritoryState> {
        self.territories.get(name)
    }

    /// Get a territory's dynamic state mutably.
    pub fn territory_mut(&mut self, name: &str) -> Option<&mut TerritoryState> {
        self.territories.get_mut(name)
    }

    /// Two players are on the same side if they are the same player or
    /// share an alliance.
    pub fn is_ally(&self, a: PlayerId, b: PlayerId) -> bool {
        if a == b {
            return true;
        }
        match (self.rules.alliance_of(a), self.rules.alliance_of(b)) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        }
    }

    /// A territory is friendly when it is owned by the player's side.
    pub fn is_friendly(&self, name: &str, player: PlayerId) -> bool {
        self.territory(name)
            .and_then(|t| t.owner)
            .map(|owner| self.is_ally(owner, player))
            .unwrap_or(false)
    }

    /// A land territory is hostile when owned by the other side; a sea
    /// zone is never owned.
    pub fn is_hostile(&self, name: &str, player: PlayerId) -> bool {
        self.territory(name)
            .and_then(|t| t.owner)
            .map(|owner| !self.is_ally(owner, player))
            .unwrap_or(false)
    }

    /// Whether any hostile combat-capable units sit in a territory.
    /// Structures and captured 0/0 support pieces do not count.
    pub fn has_hostile_combat_units(&self, name: &str, viewer: PlayerId) -> bool {
        let Some(state) = self.territory(name) else {
            return false;
        };
        let stacks = state.stacks.iter().any(|s| {
            s.quantity > 0
                && !self.is_ally(s.owner, viewer)
                && self.units.get(s.kind).is_combat_capable()
        });
        let ships = state
            .ships
            .iter()
            .filter_map(|id| self.ships.get(*id))
            .any(|ship| {
                !self.is_ally(ship.owner, viewer)
                    && self.units.get(ship.kind).is_combat_capable()
            });
        stacks || ships
    }

    /// Whether any hostile units at all (combat-capable or not) sit in a
    /// territory.
    pub fn has_hostile_units(&self, name: &str, viewer: PlayerId) -> bool {
        self.territory(name)
            .map(|t| t.has_units_hostile_to(self, viewer))
            .unwrap_or(false)
    }

    /// Total quantity of (kind, owner) across the whole territory set,
    /// including ship cargo and carried aircraft. The conservation
    /// invariant: moves never change this; only casualties, purchases, and
    /// captures do.
    pub fn total_units(&self, kind: UnitKind, owner: PlayerId) -> u32 {
        let mut total = 0;
        for state in self.territories.values() {
            total += state.count_units(kind, owner);
            for ship_id in &state.ships {
                if let Some(ship) = self.ships.get(*ship_id) {
                    if ship.kind == kind && ship.owner == owner {
                        total += 1;
                    }
                    if ship.owner == owner {
                        total += ship.cargo.iter().filter(|k| **k == kind).count() as u32;
                        total += ship.aircraft.iter().filter(|k| **k == kind).count() as u32;
                    }
                }
            }
        }
        total
    }

    /// Territories currently friendly to a player (used to seed the
    /// turn-start friendly set).
    pub fn friendly_territories(&self, player: PlayerId) -> HashSet<String> {
        self.territories
            .iter()
            .filter(|(_, state)| {
                state
                    .owner
                    .map(|owner| self.is_ally(owner, player))
                    .unwrap_or(false)
            })
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Whether a territory hosts a factory (any owner).
    pub fn has_factory(&self, name: &str) -> bool {
        self.territory(name)
            .map(|t| {
                t.stacks
                    .iter()
                    .any(|s| s.quantity > 0 && self.units.get(s.kind).structure)
            })
            .unwrap_or(false)
    }

    /// Check if the game has ended.
    pub fn is_ended(&self) -> bool {
        self.game_over
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::{Continent, MapConfig, Territory};
    use crate::rng::SeededRng;

    fn test_map() -> MapGraph {
        MapGraph::new(MapConfig {
            territories: vec![
                Territory::land("Alpha", 3, &["Beta", "North Sea"]).in_continent("Mainland"),
                Territory::land("Beta", 2, &["Alpha", "Gamma", "North Sea"])
                    .in_continent("Mainland"),
                Territory::land("Gamma", 2, &["Beta", "South Sea"]).in_continent("Mainland"),
                Territory::land("Isle", 1, &["South Sea"]),
                Territory::sea("North Sea", &["Alpha", "Beta", "South Sea"]),
                Territory::sea("South Sea", &["Gamma", "Isle", "North Sea"]),
            ],
            continents: vec![Continent {
                name: "Mainland".to_string(),
                bonus: 3,
                members: vec!["Alpha".to_string(), "Beta".to_string(), "Gamma".to_string()],
            }],
            land_bridges: vec![("Gamma".to_string(), "Isle".to_string())],
        })
        .unwrap()
    }

    fn new_game() -> Game {
        let mut rng = SeededRng::from_seed(&[1u8; 32]);
        Game::new(
            test_map(),
            UnitTable::standard(),
            RulesConfig::default(),
            &["Ada", "Brahe"],
            &mut rng,
        )
        .unwrap()
    }

    #[test]
    fn test_new_game_deals_all_land() {
        let game = new_game();
        for territory in game.map.iter().filter(|t| !t.water) {
            let state = game.territory(&territory.name).unwrap();
            assert!(state.owner.is_some());
        }
        // Sea zones stay unowned
        assert!(game.territory("North Sea").unwrap().owner.is_none());
    }

    #[test]
    fn test_deal_is_deterministic() {
        let build = || {
            let mut rng = SeededRng::from_seed(&[5u8; 32]);
            Game::new(
                test_map(),
                UnitTable::standard(),
                RulesConfig::default(),
                &["Ada", "Brahe"],
                &mut rng,
            )
            .unwrap()
        };
        let a = build();
        let b = build();
        for name in ["Alpha", "Beta", "Gamma", "Isle"] {
            assert_eq!(
                a.territory(name).unwrap().owner,
                b.territory(name).unwrap().owner
            );
        }
    }

    #[test]
    fn test_player_count_bounds() {
        let mut rng = SeededRng::from_seed(&[1u8; 32]);
        assert!(matches!(
            Game::new(
                test_map(),
                UnitTable::standard(),
                RulesConfig::default(),
                &["Solo"],
                &mut rng
            ),
            Err(SetupError::NotEnoughPlayers(1))
        ));
    }

    #[test]
    fn test_stack_merge_by_movement_used() {
        let mut state = TerritoryState::default();
        state.add_units(UnitKind::Infantry, 0, 2, 0);
        state.add_units(UnitKind::Infantry, 0, 1, 0);
        state.add_units(UnitKind::Infantry, 0, 1, 1);
        assert_eq!(state.stacks.len(), 2);
        assert_eq!(state.count_units(UnitKind::Infantry, 0), 4);
    }

    #[test]
    fn test_remove_units_exact_stack() {
        let mut state = TerritoryState::default();
        state.add_units(UnitKind::Infantry, 0, 3, 0);
        assert!(!state.remove_units(UnitKind::Infantry, 0, 4, 0));
        assert!(!state.remove_units(UnitKind::Infantry, 0, 1, 1));
        assert!(state.remove_units(UnitKind::Infantry, 0, 3, 0));
        assert_eq!(state.count_units(UnitKind::Infantry, 0), 0);
        assert!(state.stacks.is_empty());
    }

    #[test]
    fn test_alliance_membership() {
        use crate::rules::AllianceConfig;
        let mut rng = SeededRng::from_seed(&[1u8; 32]);
        let rules = RulesConfig::with_alliances(
            AllianceConfig {
                name: "North".to_string(),
                members: vec![0, 1],
            },
            AllianceConfig {
                name: "South".to_string(),
                members: vec![2, 3],
            },
        );
        let game = Game::new(
            test_map(),
            UnitTable::standard(),
            rules,
            &["A", "B", "C", "D"],
            &mut rng,
        )
        .unwrap();
        assert!(game.is_ally(0, 1));
        assert!(game.is_ally(2, 3));
        assert!(!game.is_ally(0, 2));
        assert!(game.is_ally(1, 1));
    }

    #[test]
    fn test_total_units_counts_cargo() {
        let mut game = new_game();
        game.territory_mut("Alpha")
            .unwrap()
            .add_units(UnitKind::Infantry, 0, 2, 0);
        let ship = game.ships.individualize(UnitKind::Transport, 0, 0, 0);
        game.ships
            .get_mut(ship)
            .unwrap()
            .cargo
            .push(UnitKind::Infantry);
        game.territory_mut("North Sea").unwrap().ships.push(ship);
        assert_eq!(game.total_units(UnitKind::Infantry, 0), 3);
        assert_eq!(game.total_units(UnitKind::Transport, 0), 1);
    }

    #[test]
    fn test_game_serialization() {
        let game = new_game();
        let json = serde_json::to_string(&game).unwrap();
        let restored: Game = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.players.len(), game.players.len());
        assert_eq!(restored.phase, game.phase);
        for name in ["Alpha", "Beta"] {
            assert_eq!(
                restored.territory(name).unwrap().owner,
                game.territory(name).unwrap().owner
            );
        }
    }
}
