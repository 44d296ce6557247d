//! Game engine - action validation and the turn/phase state machine.
//!
//! External callers drive the engine with discrete [`Action`]s. Every
//! mutating call validates fully before touching state (validation failures
//! leave the game unchanged) and returns an [`ActionOutcome`] listing the
//! side-channel facts the caller needs: captures, card awards, unresolved
//! combats, game over. Only the active player's actions are legal;
//! enforcing *who* submits them is an external guard's job.

use crate::cards::{self, CardSymbol};
use crate::cargo::CargoError;
use crate::combat::{self, BattleStatus, CombatUnit, RoundReport};
use crate::economy;
use crate::game_state::{
    AirSortie, CombatSite, Game, GamePhase, MoveRecord, PendingPurchase, PlacementRecord,
    TurnPhase,
};
use crate::movement::{self, MovePhase};
use crate::research::{effective_def, Technology};
use crate::rng::Dice;
use crate::types::{Ipcs, PlayerId, ShipId, Side};
use crate::units::{UnitClass, UnitDef, UnitKind};
use crate::victory;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// All actions callers can submit.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Action {
    // Setup
    PlaceCapital { territory: String },
    PlaceUnits { territory: String, kind: UnitKind, quantity: u32 },
    PassPlacement,

    // DevelopTech
    BuyResearchDice { count: u32 },
    RollResearch,
    ChooseTechnology { tech: Technology },

    // DevelopTech / Purchase
    TradeCards { set: [CardSymbol; 3] },

    // Purchase
    Purchase { kind: UnitKind, quantity: u32 },

    // CombatMove / NonCombatMove
    MoveUnits { from: String, to: String, kind: UnitKind, quantity: u32 },
    MoveShip { ship: ShipId, to: String },
    Load { from: String, sea_zone: String, kind: UnitKind, ship: Option<ShipId> },
    Unload { ship: ShipId, to: String },
    UndoMove,

    // Combat
    ResolveCombat { territory: String },

    // Mobilize
    Mobilize { kind: UnitKind, quantity: u32, territory: String },
    UndoPlacement,

    // Any playing phase
    AdvancePhase,
}

/// Side-channel facts produced by a successful action.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ActionEffect {
    CapitalPlaced { player: PlayerId, territory: String },
    UnitsPlaced { territory: String, kind: UnitKind, quantity: u32 },
    SetupComplete,
    PhaseAdvanced { phase: TurnPhase },
    CombatsDetected { territories: Vec<String> },
    DicePurchased { count: u32 },
    ResearchRolled { faces: Vec<u8>, breakthroughs: u32 },
    TechnologyUnlocked { player: PlayerId, tech: Technology },
    CardsTraded { player: PlayerId, payout: Ipcs },
    Purchased { kind: UnitKind, quantity: u32, cost: Ipcs },
    Moved { from: String, to: String, kind: UnitKind, quantity: u32 },
    ShipMoved { ship: ShipId, from: String, to: String },
    Loaded { ship: ShipId, kind: UnitKind },
    Unloaded { ship: ShipId, territory: String, amphibious: bool },
    TerritoryCaptured { territory: String, by: PlayerId, from: Option<PlayerId> },
    TreasuryPlundered { from: PlayerId, to: PlayerId, amount: Ipcs },
    CombatRound { territory: String, report: RoundReport },
    CombatUnresolved { territory: String },
    CombatEnded { territory: String, victor: Option<Side> },
    SeaZoneCleared { territory: String },
    AircraftLost { territory: String, kind: UnitKind, quantity: u32 },
    Mobilized { kind: UnitKind, quantity: u32, territory: String },
    IncomeCollected { player: PlayerId, amount: Ipcs },
    CardAwarded { player: PlayerId, symbol: CardSymbol },
    TurnEnded { next_player: PlayerId, round: u32 },
    GameOver { winner: PlayerId, condition: String },
    MoveUndone,
    PlacementUndone,
}

/// Result of a successful action.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub effects: Vec<ActionEffect>,
}

/// Validation failures. Returned, never thrown; the game state is
/// unchanged whenever one of these comes back.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ActionError {
    #[error("the game is over")]
    GameOver,
    #[error("action is not legal in the current phase")]
    WrongPhase,
    #[error("unknown territory: {0}")]
    UnknownTerritory(String),
    #[error("unknown ship: {0}")]
    UnknownShip(ShipId),
    #[error("{0} is not owned by the acting player")]
    NotOwner(String),
    #[error("insufficient funds: need {needed}, have {available}")]
    InsufficientFunds { needed: Ipcs, available: Ipcs },
    #[error("not enough matching units")]
    InsufficientUnits,
    #[error("destination {0} is not reachable")]
    IllegalDestination(String),
    #[error("not enough movement remaining")]
    MovementExhausted,
    #[error("no legal landing at {0}")]
    NoLandingSpot(String),
    #[error(transparent)]
    Cargo(#[from] CargoError),
    #[error("nothing aboard to unload")]
    NothingAboard,
    #[error("no factory at {0}")]
    NoFactory(String),
    #[error("a factory already stands at {0}")]
    FactoryExists(String),
    #[error("{0} has no adjacent friendly factory")]
    NoAdjacentFactory(String),
    #[error("{0} is not a sea zone")]
    NotASeaZone(String),
    #[error("{0} is not adjacent to {1}")]
    NotAdjacent(String, String),
    #[error("no combat queued at {0}")]
    NoCombatThere(String),
    #[error("combats remain unresolved")]
    UnresolvedCombat,
    #[error("hand has no such tradeable set")]
    NoTradeableSet,
    #[error("no research dice to roll")]
    NoResearchDice,
    #[error("no breakthrough available")]
    NoBreakthrough,
    #[error("technology already unlocked")]
    AlreadyUnlocked,
    #[error("capital already placed")]
    CapitalAlreadyPlaced,
    #[error("placement round limit reached")]
    PlacementLimit,
    #[error("units of that kind are not in the pool")]
    NotInPool,
    #[error("a legal placement exists; pass refused")]
    PassRefused,
    #[error("no pending purchase of that unit")]
    NoPendingPurchase,
    #[error("structures cannot move")]
    StructureImmobile,
    #[error("cannot unload into hostile {0} outside combat movement")]
    HostileUnload(String),
    #[error("nothing to undo")]
    NothingToUndo,
}

impl Game {
    /// Apply one action for the active player.
    pub fn apply(
        &mut self,
        action: Action,
        rng: &mut dyn Dice,
    ) -> Result<ActionOutcome, ActionError> {
        if self.game_over {
            return Err(ActionError::GameOver);
        }
        let mut effects = Vec::new();
        match action {
            Action::PlaceCapital { territory } => self.place_capital(&territory, &mut effects)?,
            Action::PlaceUnits {
                territory,
                kind,
                quantity,
            } => self.place_units(&territory, kind, quantity, &mut effects)?,
            Action::PassPlacement => self.pass_placement(&mut effects)?,
            Action::BuyResearchDice { count } => self.buy_research_dice(count, &mut effects)?,
            Action::RollResearch => self.roll_research(rng, &mut effects)?,
            Action::ChooseTechnology { tech } => self.choose_technology(tech, &mut effects)?,
            Action::TradeCards { set } => self.trade_cards(&set, &mut effects)?,
            Action::Purchase { kind, quantity } => self.purchase(kind, quantity, &mut effects)?,
            Action::MoveUnits {
                from,
                to,
                kind,
                quantity,
            } => self.move_units(&from, &to, kind, quantity, &mut effects)?,
            Action::MoveShip { ship, to } => self.move_ship(ship, &to, &mut effects)?,
            Action::Load {
                from,
                sea_zone,
                kind,
                ship,
            } => self.load_cargo(&from, &sea_zone, kind, ship, &mut effects)?,
            Action::Unload { ship, to } => self.unload_cargo(ship, &to, &mut effects)?,
            Action::ResolveCombat { territory } => {
                self.resolve_combat(&territory, rng, &mut effects)?
            }
            Action::Mobilize {
                kind,
                quantity,
                territory,
            } => self.mobilize(kind, quantity, &territory, &mut effects)?,
            Action::AdvancePhase => self.advance_phase(rng, &mut effects)?,
            Action::UndoMove => self.undo_move(&mut effects)?,
            Action::UndoPlacement => self.undo_placement(&mut effects)?,
        }
        Ok(ActionOutcome { effects })
    }

    /// Effective definition of a unit for a given owner (base table plus
    /// that player's technologies).
    pub fn effective(&self, owner: PlayerId, kind: UnitKind) -> UnitDef {
        effective_def(self.units.get(kind), &self.player(owner).tech, kind)
    }

    /// Where an individualized ship currently sits.
    pub fn find_ship_zone(&self, ship: ShipId) -> Option<String> {
        self.territories
            .iter()
            .find(|(_, state)| state.ships.contains(&ship))
            .map(|(name, _)| name.clone())
    }

    /// Landing spots an air unit can still reach with its remaining
    /// movement: friendly-at-turn-start land, or water with free allied
    /// carrier capacity.
    pub fn air_landing_options(
        &self,
        kind: UnitKind,
        owner: PlayerId,
        location: &str,
        spent: u8,
    ) -> Vec<String> {
        let def = self.effective(owner, kind);
        let remaining = def.movement.saturating_sub(spent);
        let reach = movement::air_reachable(self, location, remaining);
        let mut options: Vec<String> = reach
            .keys()
            .filter(|name| self.is_air_landing_spot(kind, owner, name))
            .cloned()
            .collect();
        options.sort_unstable();
        options
    }

    fn is_air_landing_spot(&self, kind: UnitKind, owner: PlayerId, name: &str) -> bool {
        let Some(territory) = self.map.get(name) else {
            return false;
        };
        if territory.water {
            self.free_carrier_capacity(name, owner) >= 1
                && self.units.get(kind).carrier_landable
        } else {
            self.friendly_at_turn_start.contains(name)
        }
    }

    /// Free aircraft capacity on allied carriers in a sea zone, counting
    /// fungible carrier stacks as empty hulls.
    fn free_carrier_capacity(&self, zone: &str, owner: PlayerId) -> u32 {
        let Some(state) = self.territory(zone) else {
            return 0;
        };
        let mut capacity: u32 = 0;
        for stack in &state.stacks {
            if self.is_ally(stack.owner, owner) {
                let def = self.units.get(stack.kind);
                capacity += def.aircraft_capacity as u32 * stack.quantity;
            }
        }
        for ship_id in &state.ships {
            if let Some(ship) = self.ships.get(*ship_id) {
                if self.is_ally(ship.owner, owner) {
                    capacity += ship.free_aircraft_capacity(&self.units) as u32;
                }
            }
        }
        capacity
    }

    // ── Setup ──────────────────────────────────────────────────────────

    fn place_capital(
        &mut self,
        territory: &str,
        effects: &mut Vec<ActionEffect>,
    ) -> Result<(), ActionError> {
        if self.phase != GamePhase::CapitalPlacement {
            return Err(ActionError::WrongPhase);
        }
        let player = self.current_player;
        if self.player(player).capital.is_some() {
            return Err(ActionError::CapitalAlreadyPlaced);
        }
        let definition = self
            .map
            .get(territory)
            .ok_or_else(|| ActionError::UnknownTerritory(territory.to_string()))?;
        if definition.water
            || self.territory(territory).and_then(|t| t.owner) != Some(player)
        {
            return Err(ActionError::NotOwner(territory.to_string()));
        }

        self.player_mut(player).capital = Some(territory.to_string());
        if let Some(state) = self.territory_mut(territory) {
            state.capital_of = Some(player);
        }
        effects.push(ActionEffect::CapitalPlaced {
            player,
            territory: territory.to_string(),
        });

        // Next player without a capital, or on to unit placement.
        match self.players.iter().find(|p| p.capital.is_none()) {
            Some(next) => self.current_player = next.id,
            None => {
                self.phase = GamePhase::UnitPlacement;
                self.placement_round = 1;
                self.current_player = 0;
            }
        }
        Ok(())
    }

    fn validate_setup_placement(
        &self,
        player: PlayerId,
        kind: UnitKind,
        territory: &str,
    ) -> Result<(), ActionError> {
        let definition = self
            .map
            .get(territory)
            .ok_or_else(|| ActionError::UnknownTerritory(territory.to_string()))?;
        let def = self.units.get(kind);
        match def.class {
            UnitClass::Land | UnitClass::Air => {
                if definition.water
                    || self.territory(territory).and_then(|t| t.owner) != Some(player)
                {
                    return Err(ActionError::NotOwner(territory.to_string()));
                }
                if def.structure && self.has_factory(territory) {
                    return Err(ActionError::FactoryExists(territory.to_string()));
                }
                Ok(())
            }
            UnitClass::Sea => {
                if !definition.water {
                    return Err(ActionError::NotASeaZone(territory.to_string()));
                }
                if self.has_hostile_combat_units(territory, player) {
                    return Err(ActionError::IllegalDestination(territory.to_string()));
                }
                let coastal = self.map.neighbors(territory).iter().any(|coast| {
                    self.territory(coast).and_then(|t| t.owner) == Some(player)
                });
                if !coastal {
                    return Err(ActionError::NotOwner(territory.to_string()));
                }
                Ok(())
            }
        }
    }

    fn place_units(
        &mut self,
        territory: &str,
        kind: UnitKind,
        quantity: u32,
        effects: &mut Vec<ActionEffect>,
    ) -> Result<(), ActionError> {
        if self.phase != GamePhase::UnitPlacement || quantity == 0 {
            return Err(ActionError::WrongPhase);
        }
        let player = self.current_player;
        if self.player(player).pool.get(&kind).copied().unwrap_or(0) < quantity {
            return Err(ActionError::NotInPool);
        }
        let limit = self.rules.placement_units_per_round;
        if self.player(player).placed_this_round + quantity > limit {
            return Err(ActionError::PlacementLimit);
        }
        self.validate_setup_placement(player, kind, territory)?;

        {
            let state = self.player_mut(player);
            *state.pool.entry(kind).or_insert(0) -= quantity;
            state.pool.retain(|_, q| *q > 0);
            state.placed_this_round += quantity;
        }
        if let Some(state) = self.territory_mut(territory) {
            state.add_units(kind, player, quantity, 0);
        }
        self.placement_log.push(PlacementRecord {
            territory: territory.to_string(),
            kind,
            owner: player,
            quantity,
            from_pool: true,
        });
        effects.push(ActionEffect::UnitsPlaced {
            territory: territory.to_string(),
            kind,
            quantity,
        });

        let player_state = self.player(player);
        if player_state.placed_this_round >= limit || player_state.pool_remaining() == 0 {
            self.next_placement_player(effects);
        }
        Ok(())
    }

    fn pass_placement(&mut self, effects: &mut Vec<ActionEffect>) -> Result<(), ActionError> {
        if self.phase != GamePhase::UnitPlacement {
            return Err(ActionError::WrongPhase);
        }
        let player = self.current_player;
        // Passing is only legal when the player genuinely has nothing
        // placeable left.
        let pool: Vec<UnitKind> = self
            .player(player)
            .pool
            .iter()
            .filter(|(_, q)| **q > 0)
            .map(|(k, _)| *k)
            .collect();
        for kind in pool {
            let placeable = self
                .map
                .names()
                .any(|name| self.validate_setup_placement(player, kind, name).is_ok());
            if placeable {
                return Err(ActionError::PassRefused);
            }
        }
        // Whatever could not be placed is forfeited.
        self.player_mut(player).pool.clear();
        self.next_placement_player(effects);
        Ok(())
    }

    fn next_placement_player(&mut self, effects: &mut Vec<ActionEffect>) {
        let count = self.players.len() as PlayerId;
        let mut candidate = self.current_player;
        for _ in 0..count {
            candidate = (candidate + 1) % count;
            if candidate <= self.current_player {
                self.placement_round += 1;
            }
            if self.player(candidate).pool_remaining() > 0 {
                self.player_mut(candidate).placed_this_round = 0;
                self.current_player = candidate;
                return;
            }
        }
        // Every pool is empty: setup is done.
        self.phase = GamePhase::Playing;
        self.round = 1;
        self.current_player = 0;
        self.turn_phase = TurnPhase::DevelopTech;
        self.placement_log.clear();
        self.begin_turn(0);
        effects.push(ActionEffect::SetupComplete);
    }

    /// Per-turn bookkeeping when a player's turn opens.
    fn begin_turn(&mut self, player: PlayerId) {
        self.friendly_at_turn_start = self.friendly_territories(player);
        self.move_log.clear();
        self.placement_log.clear();
        self.air_sorties.clear();
        self.cleared_sea_zones.clear();
        self.amphibious_targets.clear();
    }

    // ── DevelopTech ────────────────────────────────────────────────────

    fn require_phase(&self, phase: TurnPhase) -> Result<(), ActionError> {
        if self.phase != GamePhase::Playing || self.turn_phase != phase {
            return Err(ActionError::WrongPhase);
        }
        Ok(())
    }

    fn buy_research_dice(
        &mut self,
        count: u32,
        effects: &mut Vec<ActionEffect>,
    ) -> Result<(), ActionError> {
        self.require_phase(TurnPhase::DevelopTech)?;
        if count == 0 {
            return Err(ActionError::NoResearchDice);
        }
        let cost = self.rules.research_die_cost * count;
        let player = self.current_player;
        let available = self.player(player).ipcs;
        if available < cost {
            return Err(ActionError::InsufficientFunds {
                needed: cost,
                available,
            });
        }
        let state = self.player_mut(player);
        state.ipcs -= cost;
        state.tech.dice += count;
        effects.push(ActionEffect::DicePurchased { count });
        Ok(())
    }

    fn roll_research(
        &mut self,
        rng: &mut dyn Dice,
        effects: &mut Vec<ActionEffect>,
    ) -> Result<(), ActionError> {
        self.require_phase(TurnPhase::DevelopTech)?;
        let player = self.current_player;
        if self.player(player).tech.dice == 0 {
            return Err(ActionError::NoResearchDice);
        }
        let faces = self.player_mut(player).tech.roll(rng);
        let breakthroughs = faces
            .iter()
            .filter(|f| **f == crate::research::BREAKTHROUGH_FACE)
            .count() as u32;
        effects.push(ActionEffect::ResearchRolled {
            faces,
            breakthroughs,
        });
        Ok(())
    }

    fn choose_technology(
        &mut self,
        tech: Technology,
        effects: &mut Vec<ActionEffect>,
    ) -> Result<(), ActionError> {
        self.require_phase(TurnPhase::DevelopTech)?;
        let player = self.current_player;
        let state = self.player(player);
        if state.tech.pending_breakthroughs == 0 {
            return Err(ActionError::NoBreakthrough);
        }
        if state.tech.has(tech) {
            return Err(ActionError::AlreadyUnlocked);
        }
        self.player_mut(player).tech.unlock(tech);
        effects.push(ActionEffect::TechnologyUnlocked { player, tech });
        Ok(())
    }

    fn trade_cards(
        &mut self,
        set: &[CardSymbol; 3],
        effects: &mut Vec<ActionEffect>,
    ) -> Result<(), ActionError> {
        if self.phase != GamePhase::Playing
            || !matches!(self.turn_phase, TurnPhase::DevelopTech | TurnPhase::Purchase)
        {
            return Err(ActionError::WrongPhase);
        }
        let player = self.current_player;
        if !cards::is_valid_set(set) || !self.player(player).cards.contains_set(set) {
            return Err(ActionError::NoTradeableSet);
        }
        let payout = self.rules.card_payout(self.player(player).trades_made);
        let state = self.player_mut(player);
        state.cards.remove_set(set);
        state.trades_made += 1;
        state.ipcs += payout;
        effects.push(ActionEffect::CardsTraded { player, payout });
        Ok(())
    }

    // ── Purchase ───────────────────────────────────────────────────────

    fn purchase(
        &mut self,
        kind: UnitKind,
        quantity: u32,
        effects: &mut Vec<ActionEffect>,
    ) -> Result<(), ActionError> {
        self.require_phase(TurnPhase::Purchase)?;
        if quantity == 0 {
            return Err(ActionError::InsufficientUnits);
        }
        let player = self.current_player;
        let cost = economy::unit_cost(self, player, kind) * quantity;
        let available = self.player(player).ipcs;
        if available < cost {
            return Err(ActionError::InsufficientFunds {
                needed: cost,
                available,
            });
        }
        self.player_mut(player).ipcs -= cost;
        match self
            .pending_purchases
            .iter()
            .position(|p| p.kind == kind && p.owner == player)
        {
            Some(index) => self.pending_purchases[index].quantity += quantity,
            None => self.pending_purchases.push(PendingPurchase {
                kind,
                quantity,
                owner: player,
            }),
        }
        effects.push(ActionEffect::Purchased {
            kind,
            quantity,
            cost,
        });
        Ok(())
    }

    // ── Movement ───────────────────────────────────────────────────────

    fn move_phase(&self) -> Result<MovePhase, ActionError> {
        if self.phase != GamePhase::Playing {
            return Err(ActionError::WrongPhase);
        }
        match self.turn_phase {
            TurnPhase::CombatMove => Ok(MovePhase::Combat),
            TurnPhase::NonCombatMove => Ok(MovePhase::NonCombat),
            _ => Err(ActionError::WrongPhase),
        }
    }

    fn move_units(
        &mut self,
        from: &str,
        to: &str,
        kind: UnitKind,
        quantity: u32,
        effects: &mut Vec<ActionEffect>,
    ) -> Result<(), ActionError> {
        let phase = self.move_phase()?;
        if quantity == 0 {
            return Err(ActionError::InsufficientUnits);
        }
        for name in [from, to] {
            if !self.map.contains(name) {
                return Err(ActionError::UnknownTerritory(name.to_string()));
            }
        }
        let player = self.current_player;
        let def = self.effective(player, kind);
        if def.structure {
            return Err(ActionError::StructureImmobile);
        }

        let reach = movement::reachable(self, def.class, player, from, def.movement, phase);
        let distance = reach
            .get(to)
            .map(|r| r.distance)
            .ok_or_else(|| ActionError::IllegalDestination(to.to_string()))?;
        if distance == 0 {
            return Err(ActionError::IllegalDestination(to.to_string()));
        }

        // Pick the least-moved stack that can make the trip whole.
        let source = self
            .territory(from)
            .ok_or_else(|| ActionError::UnknownTerritory(from.to_string()))?;
        let mut candidates: Vec<(u8, u32)> = source
            .stacks
            .iter()
            .filter(|s| s.kind == kind && s.owner == player)
            .map(|s| (s.movement_used, s.quantity))
            .collect();
        candidates.sort_unstable();
        if !candidates.iter().any(|(_, q)| *q >= quantity) {
            return Err(ActionError::InsufficientUnits);
        }
        let used_before = candidates
            .iter()
            .find(|(used, q)| *q >= quantity && used + distance <= def.movement)
            .map(|(used, _)| *used)
            .ok_or(ActionError::MovementExhausted)?;
        let used_after = used_before + distance;

        // Air units must be able to stop at the destination.
        if def.class == UnitClass::Air {
            match phase {
                MovePhase::Combat => {
                    if !self.has_hostile_combat_units(to, player) {
                        return Err(ActionError::IllegalDestination(to.to_string()));
                    }
                }
                MovePhase::NonCombat => {
                    let water = self.map.get(to).map(|t| t.water).unwrap_or(false);
                    if water {
                        if !def.carrier_landable
                            || self.free_carrier_capacity(to, player) < quantity
                        {
                            return Err(ActionError::NoLandingSpot(to.to_string()));
                        }
                    } else if !self.friendly_at_turn_start.contains(to) {
                        return Err(ActionError::NoLandingSpot(to.to_string()));
                    }
                }
            }
        }

        // Validation done - mutate.
        if let Some(state) = self.territory_mut(from) {
            state.remove_units(kind, player, quantity, used_before);
        }

        let mut captured_from = None;
        let mut plundered = None;
        // A combat-moving aircraft fights in the zone as a stack; only a
        // non-combat arrival goes straight onto a carrier deck.
        let landed_on_carrier = def.class == UnitClass::Air
            && phase == MovePhase::NonCombat
            && self.map.get(to).map(|t| t.water).unwrap_or(false);
        if landed_on_carrier {
            self.board_carriers(to, kind, player, quantity)?;
        } else if let Some(state) = self.territory_mut(to) {
            state.add_units(kind, player, quantity, used_after);
        }

        if def.class == UnitClass::Air {
            self.advance_sorties(kind, player, from, to, used_before, used_after, quantity);
        }

        // Capture on entry: unowned territory, or hostile land with no
        // combat-capable defenders during combat movement.
        let target_water = self.map.get(to).map(|t| t.water).unwrap_or(false);
        if def.class == UnitClass::Land && !target_water {
            let owner = self.territory(to).and_then(|t| t.owner);
            let undefended = !self.has_hostile_combat_units(to, player);
            let capture = match owner {
                None => true,
                Some(existing) => {
                    !self.is_ally(existing, player)
                        && phase == MovePhase::Combat
                        && undefended
                }
            };
            if capture && undefended {
                captured_from = Some(owner);
                plundered = self.capture_territory(to, player, effects);
            }
        }

        self.move_log.push(MoveRecord::UnitsMoved {
            from: from.to_string(),
            to: to.to_string(),
            kind,
            owner: player,
            quantity,
            used_before,
            used_after,
            captured_from,
            plundered,
        });
        effects.push(ActionEffect::Moved {
            from: from.to_string(),
            to: to.to_string(),
            kind,
            quantity,
        });
        Ok(())
    }

    /// Put arriving aircraft on allied carriers in a sea zone,
    /// individualizing fungible hulls as needed. Capacity was checked by
    /// the caller.
    fn board_carriers(
        &mut self,
        zone: &str,
        kind: UnitKind,
        owner: PlayerId,
        quantity: u32,
    ) -> Result<(), ActionError> {
        for _ in 0..quantity {
            // Prefer an already-individualized hull with room.
            let existing = self
                .territory(zone)
                .map(|state| {
                    state
                        .ships
                        .iter()
                        .copied()
                        .find(|id| {
                            self.ships
                                .get(*id)
                                .map(|ship| {
                                    self.is_ally(ship.owner, owner)
                                        && ship.can_load_aircraft(&self.units, kind).is_ok()
                                })
                                .unwrap_or(false)
                        })
                })
                .unwrap_or(None);
            let ship_id = match existing {
                Some(id) => id,
                None => {
                    // Split a hull out of a fungible carrier stack.
                    let stack = self
                        .territory(zone)
                        .and_then(|state| {
                            state
                                .stacks
                                .iter()
                                .filter(|s| {
                                    s.quantity > 0
                                        && self.is_ally(s.owner, owner)
                                        && self.units.get(s.kind).aircraft_capacity > 0
                                })
                                .map(|s| (s.kind, s.owner, s.movement_used))
                                .next()
                        })
                        .ok_or_else(|| ActionError::NoLandingSpot(zone.to_string()))?;
                    let (hull_kind, hull_owner, hull_used) = stack;
                    if let Some(state) = self.territory_mut(zone) {
                        state.remove_units(hull_kind, hull_owner, 1, hull_used);
                    }
                    let id = self.ships.individualize(hull_kind, hull_owner, hull_used, 0);
                    if let Some(state) = self.territory_mut(zone) {
                        state.ships.push(id);
                    }
                    id
                }
            };
            let units = self.units.clone();
            if let Some(ship) = self.ships.get_mut(ship_id) {
                ship.load_aircraft(&units, kind)?;
            }
        }
        Ok(())
    }

    /// Track air movement spent this turn, keyed by turn origin.
    fn advance_sorties(
        &mut self,
        kind: UnitKind,
        owner: PlayerId,
        from: &str,
        to: &str,
        used_before: u8,
        used_after: u8,
        quantity: u32,
    ) {
        let mut remaining = quantity;
        let mut moved: Vec<(String, u32)> = Vec::new(); // (origin, qty)
        for sortie in &mut self.air_sorties {
            if remaining == 0 {
                break;
            }
            if sortie.kind == kind
                && sortie.owner == owner
                && sortie.location == from
                && sortie.spent == used_before
            {
                let take = sortie.quantity.min(remaining);
                sortie.quantity -= take;
                remaining -= take;
                moved.push((sortie.origin.clone(), take));
            }
        }
        if remaining > 0 {
            // First hop this turn: the origin is where they took off.
            moved.push((from.to_string(), remaining));
        }
        self.air_sorties.retain(|s| s.quantity > 0);
        for (origin, qty) in moved {
            let existing = self.air_sorties.iter().position(|s| {
                s.kind == kind
                    && s.owner == owner
                    && s.origin == origin
                    && s.location == to
                    && s.spent == used_after
            });
            match existing {
                Some(index) => self.air_sorties[index].quantity += qty,
                None => self.air_sorties.push(AirSortie {
                    kind,
                    owner,
                    origin,
                    location: to.to_string(),
                    spent: used_after,
                    quantity: qty,
                }),
            }
        }
    }

    fn move_ship(
        &mut self,
        ship_id: ShipId,
        to: &str,
        effects: &mut Vec<ActionEffect>,
    ) -> Result<(), ActionError> {
        let phase = self.move_phase()?;
        let player = self.current_player;
        let ship = self
            .ships
            .get(ship_id)
            .ok_or(ActionError::UnknownShip(ship_id))?;
        if ship.owner != player {
            return Err(ActionError::NotOwner(format!("ship {}", ship_id)));
        }
        let kind = ship.kind;
        let used_before = ship.movement_used;
        let zone = self
            .find_ship_zone(ship_id)
            .ok_or(ActionError::UnknownShip(ship_id))?;
        let def = self.effective(player, kind);

        let reach = movement::sea_reachable(self, player, &zone, def.movement, phase);
        let distance = reach
            .get(to)
            .map(|r| r.distance)
            .ok_or_else(|| ActionError::IllegalDestination(to.to_string()))?;
        if distance == 0 {
            return Err(ActionError::IllegalDestination(to.to_string()));
        }
        if used_before + distance > def.movement {
            return Err(ActionError::MovementExhausted);
        }

        if let Some(state) = self.territory_mut(&zone) {
            state.ships.retain(|id| *id != ship_id);
        }
        if let Some(state) = self.territory_mut(to) {
            state.ships.push(ship_id);
        }
        if let Some(ship) = self.ships.get_mut(ship_id) {
            ship.movement_used = used_before + distance;
        }
        self.move_log.push(MoveRecord::ShipMoved {
            ship: ship_id,
            from: zone.clone(),
            to: to.to_string(),
            used_before,
        });
        effects.push(ActionEffect::ShipMoved {
            ship: ship_id,
            from: zone,
            to: to.to_string(),
        });
        Ok(())
    }

    fn load_cargo(
        &mut self,
        from: &str,
        sea_zone: &str,
        kind: UnitKind,
        ship: Option<ShipId>,
        effects: &mut Vec<ActionEffect>,
    ) -> Result<(), ActionError> {
        self.move_phase()?;
        let player = self.current_player;
        let land = self
            .map
            .get(from)
            .ok_or_else(|| ActionError::UnknownTerritory(from.to_string()))?;
        let water = self
            .map
            .get(sea_zone)
            .ok_or_else(|| ActionError::UnknownTerritory(sea_zone.to_string()))?;
        if land.water || !water.water {
            return Err(ActionError::NotASeaZone(sea_zone.to_string()));
        }
        if !self.map.is_adjacent(from, sea_zone) {
            return Err(ActionError::NotAdjacent(
                from.to_string(),
                sea_zone.to_string(),
            ));
        }

        // The unit to embark: least-moved stack first.
        let unit_used = self
            .territory(from)
            .and_then(|state| {
                state
                    .stacks
                    .iter()
                    .filter(|s| s.kind == kind && s.owner == player && s.quantity > 0)
                    .map(|s| s.movement_used)
                    .min()
            })
            .ok_or(ActionError::InsufficientUnits)?;

        let (ship_id, individualized) = match ship {
            Some(id) => {
                let ship = self.ships.get(id).ok_or(ActionError::UnknownShip(id))?;
                if ship.owner != player {
                    return Err(ActionError::NotOwner(format!("ship {}", id)));
                }
                if !self
                    .territory(sea_zone)
                    .map(|state| state.ships.contains(&id))
                    .unwrap_or(false)
                {
                    return Err(ActionError::NotAdjacent(
                        from.to_string(),
                        sea_zone.to_string(),
                    ));
                }
                ship.can_load_cargo(&self.units, kind)?;
                (id, false)
            }
            None => {
                // Reuse an individualized hull with room, else split one
                // from the fungible stack.
                let existing = self.territory(sea_zone).and_then(|state| {
                    state.ships.iter().copied().find(|id| {
                        self.ships
                            .get(*id)
                            .map(|s| {
                                s.owner == player
                                    && s.can_load_cargo(&self.units, kind).is_ok()
                            })
                            .unwrap_or(false)
                    })
                });
                match existing {
                    Some(id) => (id, false),
                    None => {
                        let hull = self
                            .territory(sea_zone)
                            .and_then(|state| {
                                state
                                    .stacks
                                    .iter()
                                    .filter(|s| {
                                        s.quantity > 0
                                            && s.owner == player
                                            && self.units.get(s.kind).cargo_slots > 0
                                    })
                                    .min_by_key(|s| s.movement_used)
                                    .map(|s| (s.kind, s.movement_used))
                            })
                            .ok_or(ActionError::InsufficientUnits)?;
                        // Validate against a prospective empty hull before
                        // touching state.
                        let probe = crate::cargo::Ship {
                            id: 0,
                            kind: hull.0,
                            owner: player,
                            cargo: Vec::new(),
                            aircraft: Vec::new(),
                            movement_used: hull.1,
                            damaged: 0,
                        };
                        probe.can_load_cargo(&self.units, kind)?;
                        if let Some(state) = self.territory_mut(sea_zone) {
                            state.remove_units(hull.0, player, 1, hull.1);
                        }
                        let id = self.ships.individualize(hull.0, player, hull.1, 0);
                        if let Some(state) = self.territory_mut(sea_zone) {
                            state.ships.push(id);
                        }
                        (id, true)
                    }
                }
            }
        };

        if let Some(state) = self.territory_mut(from) {
            state.remove_units(kind, player, 1, unit_used);
        }
        let units = self.units.clone();
        if let Some(ship) = self.ships.get_mut(ship_id) {
            // Already validated; load cannot fail here.
            let _ = ship.load_cargo(&units, kind);
        }
        self.move_log.push(MoveRecord::Loaded {
            ship: ship_id,
            from: from.to_string(),
            kind,
            used_before: unit_used,
            individualized,
        });
        effects.push(ActionEffect::Loaded {
            ship: ship_id,
            kind,
        });
        Ok(())
    }

    fn unload_cargo(
        &mut self,
        ship_id: ShipId,
        to: &str,
        effects: &mut Vec<ActionEffect>,
    ) -> Result<(), ActionError> {
        let phase = self.move_phase()?;
        let player = self.current_player;
        let ship = self
            .ships
            .get(ship_id)
            .ok_or(ActionError::UnknownShip(ship_id))?;
        if ship.owner != player {
            return Err(ActionError::NotOwner(format!("ship {}", ship_id)));
        }
        if ship.cargo.is_empty() {
            return Err(ActionError::NothingAboard);
        }
        let zone = self
            .find_ship_zone(ship_id)
            .ok_or(ActionError::UnknownShip(ship_id))?;
        let target = self
            .map
            .get(to)
            .ok_or_else(|| ActionError::UnknownTerritory(to.to_string()))?;
        if target.water {
            return Err(ActionError::IllegalDestination(to.to_string()));
        }
        if !self.map.is_adjacent(&zone, to) {
            return Err(ActionError::NotAdjacent(zone, to.to_string()));
        }

        let owner = self.territory(to).and_then(|t| t.owner);
        let hostile = owner.map(|o| !self.is_ally(o, player)).unwrap_or(false)
            || self.has_hostile_units(to, player);
        let unowned = owner.is_none();
        if (hostile || unowned) && phase == MovePhase::NonCombat {
            return Err(ActionError::HostileUnload(to.to_string()));
        }

        let kinds: Vec<UnitKind> = self
            .ships
            .get_mut(ship_id)
            .map(|ship| ship.cargo.drain(..).collect())
            .unwrap_or_default();
        for kind in &kinds {
            // Amphibious troops fight where they land; their move is spent.
            let spent = self.effective(player, *kind).movement;
            if let Some(state) = self.territory_mut(to) {
                state.add_units(*kind, player, 1, spent);
            }
        }

        let marked_amphibious = hostile && self.has_hostile_combat_units(to, player);
        if marked_amphibious {
            self.amphibious_targets.insert(to.to_string());
        }

        let mut captured_from = None;
        let mut plundered = None;
        if (hostile || unowned) && !self.has_hostile_combat_units(to, player) {
            captured_from = Some(owner);
            plundered = self.capture_territory(to, player, effects);
        }

        self.move_log.push(MoveRecord::Unloaded {
            ship: ship_id,
            to: to.to_string(),
            kinds,
            marked_amphibious,
            captured_from,
            plundered,
        });
        effects.push(ActionEffect::Unloaded {
            ship: ship_id,
            territory: to.to_string(),
            amphibious: marked_amphibious,
        });
        Ok(())
    }

    // ── Capture ────────────────────────────────────────────────────────

    /// Transfer a territory to `by`: structures change hands atomically,
    /// capitals are plundered exactly once, and the victory evaluator runs.
    fn capture_territory(
        &mut self,
        name: &str,
        by: PlayerId,
        effects: &mut Vec<ActionEffect>,
    ) -> Option<(PlayerId, Ipcs)> {
        let previous = self.territory(name).and_then(|t| t.owner);
        let mut plundered = None;

        if let Some(state) = self.territory_mut(name) {
            state.owner = Some(by);
        }
        // Factories and anti-air guns stand where they are and switch
        // sides with the ground.
        let structures: Vec<(UnitKind, PlayerId, u32)> = self
            .territory(name)
            .map(|state| {
                state
                    .stacks
                    .iter()
                    .filter(|s| {
                        s.owner != by && self.units.get(s.kind).captured_with_territory
                    })
                    .map(|s| (s.kind, s.owner, s.quantity))
                    .collect()
            })
            .unwrap_or_default();
        if let Some(state) = self.territory_mut(name) {
            for (kind, owner, quantity) in structures {
                state.remove_units(kind, owner, quantity, 0);
                state.add_units(kind, by, quantity, 0);
            }
        }

        if let Some(capital_player) = self.territory(name).and_then(|t| t.capital_of) {
            if self.is_ally(capital_player, by) {
                // Retaken by its own side: income flows again.
                self.player_mut(capital_player).capital_lost = false;
            } else if !self.player(capital_player).capital_lost {
                // Plunder fires exactly once per loss.
                let amount = self.player(capital_player).ipcs;
                self.player_mut(capital_player).ipcs = 0;
                self.player_mut(capital_player).capital_lost = true;
                self.player_mut(by).ipcs += amount;
                plundered = Some((capital_player, amount));
                effects.push(ActionEffect::TreasuryPlundered {
                    from: capital_player,
                    to: by,
                    amount,
                });
            }
        }

        self.player_mut(by).captures_this_turn += 1;
        effects.push(ActionEffect::TerritoryCaptured {
            territory: name.to_string(),
            by,
            from: previous,
        });
        debug!(territory = name, by, "territory captured");

        if let Some((winner, condition)) = victory::evaluate(self, by) {
            self.game_over = true;
            self.winner = Some(winner);
            self.win_condition = Some(condition.clone());
            effects.push(ActionEffect::GameOver { winner, condition });
        }
        plundered
    }

    // ── Combat ─────────────────────────────────────────────────────────

    /// Queue every territory hosting both hostile unit sets, naval battles
    /// first.
    fn detect_combats(&mut self) {
        let player = self.current_player;
        let mut sites: Vec<CombatSite> = Vec::new();
        let mut names: Vec<&String> = self.territories.keys().collect();
        names.sort_unstable();
        for name in names {
            let Some(state) = self.territory(name) else {
                continue;
            };
            let friendly_combatants = state.stacks.iter().any(|s| {
                s.quantity > 0
                    && self.is_ally(s.owner, player)
                    && self.units.get(s.kind).is_combat_capable()
            }) || state
                .ships
                .iter()
                .filter_map(|id| self.ships.get(*id))
                .any(|ship| {
                    self.is_ally(ship.owner, player)
                        && self.units.get(ship.kind).is_combat_capable()
                });
            if friendly_combatants && self.has_hostile_combat_units(name, player) {
                let naval = self.map.get(name).map(|t| t.water).unwrap_or(false);
                sites.push(CombatSite {
                    territory: name.clone(),
                    naval,
                    round: 0,
                    bombarded: false,
                });
            }
        }
        sites.sort_by_key(|site| !site.naval);
        self.combats = sites;
    }

    fn assemble_forces(&self, territory: &str) -> (Vec<CombatUnit>, Vec<CombatUnit>) {
        let player = self.current_player;
        let mut attackers = Vec::new();
        let mut defenders = Vec::new();
        let Some(state) = self.territory(territory) else {
            return (attackers, defenders);
        };
        for stack in &state.stacks {
            let def = self.effective(stack.owner, stack.kind);
            if !def.is_combat_capable() {
                continue;
            }
            for index in 0..stack.quantity {
                let unit = CombatUnit {
                    kind: stack.kind,
                    owner: stack.owner,
                    ship: None,
                    attack: def.attack,
                    defense: def.defense,
                    cost: def.cost,
                    hit_points: def.hit_points,
                    hits_taken: u8::from(index < stack.damaged),
                };
                if self.is_ally(stack.owner, player) {
                    attackers.push(unit);
                } else {
                    defenders.push(unit);
                }
            }
        }
        for ship_id in &state.ships {
            let Some(ship) = self.ships.get(*ship_id) else {
                continue;
            };
            let def = self.effective(ship.owner, ship.kind);
            if !def.is_combat_capable() {
                continue;
            }
            let unit = CombatUnit {
                kind: ship.kind,
                owner: ship.owner,
                ship: Some(*ship_id),
                attack: def.attack,
                defense: def.defense,
                cost: def.cost,
                hit_points: def.hit_points,
                hits_taken: ship.damaged,
            };
            if self.is_ally(ship.owner, player) {
                attackers.push(unit);
            } else {
                defenders.push(unit);
            }
        }
        (attackers, defenders)
    }

    /// Attack values of friendly capital ships eligible to bombard in
    /// support of an amphibious assault on `territory`.
    fn bombardment_support(&self, territory: &str) -> Vec<u8> {
        let player = self.current_player;
        if !self.amphibious_targets.contains(territory) {
            return Vec::new();
        }
        let mut values = Vec::new();
        for zone in self.map.neighbors(territory) {
            let Some(definition) = self.map.get(zone) else {
                continue;
            };
            if !definition.water {
                continue;
            }
            let eligible = !self.rules.bombardment_requires_cleared_zone
                || !self.has_hostile_combat_units(zone, player)
                || self.cleared_sea_zones.contains(zone);
            if !eligible {
                continue;
            }
            let Some(state) = self.territory(zone) else {
                continue;
            };
            for stack in &state.stacks {
                let def = self.effective(stack.owner, stack.kind);
                if def.bombards && self.is_ally(stack.owner, player) {
                    for _ in 0..stack.quantity {
                        values.push(def.attack);
                    }
                }
            }
            for ship_id in &state.ships {
                if let Some(ship) = self.ships.get(*ship_id) {
                    let def = self.effective(ship.owner, ship.kind);
                    if def.bombards && self.is_ally(ship.owner, player) {
                        values.push(def.attack);
                    }
                }
            }
        }
        values
    }

    fn resolve_combat(
        &mut self,
        territory: &str,
        rng: &mut dyn Dice,
        effects: &mut Vec<ActionEffect>,
    ) -> Result<(), ActionError> {
        self.require_phase(TurnPhase::Combat)?;
        let index = self
            .combats
            .iter()
            .position(|site| site.territory == territory)
            .ok_or_else(|| ActionError::NoCombatThere(territory.to_string()))?;
        let site = self.combats[index].clone();
        let player = self.current_player;

        let (mut attackers, mut defenders) = self.assemble_forces(territory);

        // Shore bombardment fires once, on the first round of an
        // amphibious land battle.
        let bombardment = if !site.naval && site.round == 0 && !site.bombarded {
            self.bombardment_support(territory)
        } else {
            Vec::new()
        };

        let report = combat::fight_round(&mut attackers, &mut defenders, &bombardment, rng);
        debug!(
            territory,
            round = site.round,
            attacker_hits = report.attacker_hits,
            defender_hits = report.defender_hits,
            "combat round"
        );

        // Map casualties back into state.
        for loss in report.attacker_losses.iter().chain(&report.defender_losses) {
            match loss.ship {
                Some(ship_id) => {
                    if let Some(state) = self.territory_mut(territory) {
                        state.ships.retain(|id| *id != ship_id);
                    }
                    // Cargo and carried aircraft go down with the hull.
                    self.ships.remove(ship_id);
                }
                None => {
                    self.remove_any_unit(territory, loss.kind, loss.owner);
                }
            }
        }
        self.sync_battle_damage(territory, &attackers, &defenders);

        self.combats[index].round += 1;
        self.combats[index].bombarded = true;

        effects.push(ActionEffect::CombatRound {
            territory: territory.to_string(),
            report: report.clone(),
        });

        match combat::status(&attackers, &defenders, true) {
            BattleStatus::Ongoing => {
                effects.push(ActionEffect::CombatUnresolved {
                    territory: territory.to_string(),
                });
            }
            BattleStatus::AttackerWins => {
                self.combats.remove(index);
                self.repair_battle_survivors(territory);
                if site.naval {
                    self.cleared_sea_zones.insert(territory.to_string());
                    effects.push(ActionEffect::SeaZoneCleared {
                        territory: territory.to_string(),
                    });
                } else {
                    self.capture_territory(territory, player, effects);
                }
                effects.push(ActionEffect::CombatEnded {
                    territory: territory.to_string(),
                    victor: Some(Side::Attacker),
                });
            }
            BattleStatus::DefenderHolds => {
                self.combats.remove(index);
                self.repair_battle_survivors(territory);
                effects.push(ActionEffect::CombatEnded {
                    territory: territory.to_string(),
                    victor: Some(Side::Defender),
                });
            }
            BattleStatus::Stalemate => {
                self.combats.remove(index);
                self.repair_battle_survivors(territory);
                effects.push(ActionEffect::CombatEnded {
                    territory: territory.to_string(),
                    victor: None,
                });
            }
        }
        Ok(())
    }

    /// Remove one unit of (kind, owner) from whichever stack holds one.
    fn remove_any_unit(&mut self, territory: &str, kind: UnitKind, owner: PlayerId) -> bool {
        let Some(state) = self.territory_mut(territory) else {
            return false;
        };
        let mut removed = false;
        for stack in &mut state.stacks {
            if stack.kind == kind && stack.owner == owner && stack.quantity > 0 {
                stack.quantity -= 1;
                stack.damaged = stack.damaged.min(stack.quantity);
                removed = true;
                break;
            }
        }
        state.stacks.retain(|s| s.quantity > 0);
        removed
    }

    /// Rewrite stack/ship damage counters from the surviving combat units.
    fn sync_battle_damage(
        &mut self,
        territory: &str,
        attackers: &[CombatUnit],
        defenders: &[CombatUnit],
    ) {
        if let Some(state) = self.territory_mut(territory) {
            for stack in &mut state.stacks {
                stack.damaged = 0;
            }
        }
        for unit in attackers.iter().chain(defenders) {
            match unit.ship {
                Some(ship_id) => {
                    if let Some(ship) = self.ships.get_mut(ship_id) {
                        ship.damaged = unit.hits_taken;
                    }
                }
                None => {
                    if unit.hits_taken > 0 {
                        if let Some(state) = self.territory_mut(territory) {
                            if let Some(stack) = state
                                .stacks
                                .iter_mut()
                                .find(|s| s.kind == unit.kind && s.owner == unit.owner)
                            {
                                stack.damaged += 1;
                            }
                        }
                    }
                }
            }
        }
    }

    /// Surviving damaged ships repair at the end of the battle they
    /// survived.
    fn repair_battle_survivors(&mut self, territory: &str) {
        let ship_ids: Vec<ShipId> = self
            .territory(territory)
            .map(|state| state.ships.clone())
            .unwrap_or_default();
        for ship_id in ship_ids {
            if let Some(ship) = self.ships.get_mut(ship_id) {
                ship.damaged = 0;
            }
        }
        if let Some(state) = self.territory_mut(territory) {
            for stack in &mut state.stacks {
                stack.damaged = 0;
            }
        }
    }

    // ── Mobilize ───────────────────────────────────────────────────────

    fn mobilize(
        &mut self,
        kind: UnitKind,
        quantity: u32,
        territory: &str,
        effects: &mut Vec<ActionEffect>,
    ) -> Result<(), ActionError> {
        self.require_phase(TurnPhase::Mobilize)?;
        if quantity == 0 {
            return Err(ActionError::NoPendingPurchase);
        }
        let player = self.current_player;
        let available: u32 = self
            .pending_purchases
            .iter()
            .filter(|p| p.kind == kind && p.owner == player)
            .map(|p| p.quantity)
            .sum();
        if available < quantity {
            return Err(ActionError::NoPendingPurchase);
        }
        economy::validate_mobilize(self, player, kind, territory)?;

        let mut remaining = quantity;
        for pending in &mut self.pending_purchases {
            if pending.kind == kind && pending.owner == player && remaining > 0 {
                let take = pending.quantity.min(remaining);
                pending.quantity -= take;
                remaining -= take;
            }
        }
        self.pending_purchases.retain(|p| p.quantity > 0);
        if let Some(state) = self.territory_mut(territory) {
            state.add_units(kind, player, quantity, 0);
        }
        self.placement_log.push(PlacementRecord {
            territory: territory.to_string(),
            kind,
            owner: player,
            quantity,
            from_pool: false,
        });
        effects.push(ActionEffect::Mobilized {
            kind,
            quantity,
            territory: territory.to_string(),
        });
        Ok(())
    }

    // ── Phase machine ──────────────────────────────────────────────────

    fn advance_phase(
        &mut self,
        rng: &mut dyn Dice,
        effects: &mut Vec<ActionEffect>,
    ) -> Result<(), ActionError> {
        if self.phase != GamePhase::Playing {
            return Err(ActionError::WrongPhase);
        }
        match self.turn_phase {
            TurnPhase::DevelopTech => {
                self.turn_phase = TurnPhase::Purchase;
                effects.push(ActionEffect::PhaseAdvanced {
                    phase: self.turn_phase,
                });
            }
            TurnPhase::Purchase => {
                self.turn_phase = TurnPhase::CombatMove;
                effects.push(ActionEffect::PhaseAdvanced {
                    phase: self.turn_phase,
                });
            }
            TurnPhase::CombatMove => {
                self.detect_combats();
                self.move_log.clear();
                if self.combats.is_empty() {
                    // Combat is skipped when no territory hosts both
                    // hostile unit sets.
                    self.turn_phase = TurnPhase::NonCombatMove;
                } else {
                    let territories: Vec<String> = self
                        .combats
                        .iter()
                        .map(|site| site.territory.clone())
                        .collect();
                    effects.push(ActionEffect::CombatsDetected { territories });
                    self.turn_phase = TurnPhase::Combat;
                }
                effects.push(ActionEffect::PhaseAdvanced {
                    phase: self.turn_phase,
                });
            }
            TurnPhase::Combat => {
                if !self.combats.is_empty() {
                    return Err(ActionError::UnresolvedCombat);
                }
                self.turn_phase = TurnPhase::NonCombatMove;
                effects.push(ActionEffect::PhaseAdvanced {
                    phase: self.turn_phase,
                });
            }
            TurnPhase::NonCombatMove => {
                self.move_log.clear();
                self.crash_stranded_aircraft(effects);
                let player = self.current_player;
                let has_pending = self
                    .pending_purchases
                    .iter()
                    .any(|p| p.owner == player && p.quantity > 0);
                if has_pending {
                    self.turn_phase = TurnPhase::Mobilize;
                    effects.push(ActionEffect::PhaseAdvanced {
                        phase: self.turn_phase,
                    });
                } else {
                    // Mobilize is skipped outright.
                    self.end_turn(rng, effects);
                }
            }
            TurnPhase::Mobilize | TurnPhase::CollectIncome => {
                self.end_turn(rng, effects);
            }
        }
        Ok(())
    }

    /// Aircraft that could not reach a legal landing spot are lost when
    /// non-combat movement closes.
    fn crash_stranded_aircraft(&mut self, effects: &mut Vec<ActionEffect>) {
        let player = self.current_player;
        let mut losses: Vec<(String, UnitKind, u32)> = Vec::new();
        for (name, state) in &self.territories {
            let water = self.map.get(name).map(|t| t.water).unwrap_or(false);
            let hostile_ground = self
                .territory(name)
                .and_then(|t| t.owner)
                .map(|owner| !self.is_ally(owner, player))
                .unwrap_or(false);
            if !water && !hostile_ground {
                continue;
            }
            for stack in &state.stacks {
                if stack.owner == player
                    && stack.quantity > 0
                    && self.units.get(stack.kind).class == UnitClass::Air
                {
                    losses.push((name.clone(), stack.kind, stack.quantity));
                }
            }
        }
        for (territory, kind, quantity) in losses {
            if let Some(state) = self.territory_mut(&territory) {
                let stacks: Vec<(u8, u32)> = state
                    .stacks
                    .iter()
                    .filter(|s| s.kind == kind && s.owner == player)
                    .map(|s| (s.movement_used, s.quantity))
                    .collect();
                for (used, qty) in stacks {
                    state.remove_units(kind, player, qty, used);
                }
            }
            tracing::warn!(territory = territory.as_str(), %kind, quantity, "aircraft lost with no landing spot");
            effects.push(ActionEffect::AircraftLost {
                territory,
                kind,
                quantity,
            });
        }
    }

    /// Collect income, award the conquest card, repair, re-merge idle
    /// hulls, reset per-turn flags, and hand the turn to the next player.
    fn end_turn(&mut self, rng: &mut dyn Dice, effects: &mut Vec<ActionEffect>) {
        self.turn_phase = TurnPhase::CollectIncome;
        let player = self.current_player;

        let amount = economy::income_for(self, player);
        self.player_mut(player).ipcs += amount;
        effects.push(ActionEffect::IncomeCollected { player, amount });

        // One conquest card per turn, first capture only.
        if self.player(player).captures_this_turn > 0 {
            let symbol = cards::draw_card(rng);
            self.player_mut(player).cards.add(symbol);
            effects.push(ActionEffect::CardAwarded { player, symbol });
        }
        self.player_mut(player).captures_this_turn = 0;

        // Damaged capital ships repair at their owner's turn end.
        let repair_ids: Vec<ShipId> = self
            .territories
            .values()
            .flat_map(|state| state.ships.iter().copied())
            .collect();
        for ship_id in repair_ids {
            if let Some(ship) = self.ships.get_mut(ship_id) {
                if ship.owner == player {
                    ship.damaged = 0;
                }
                ship.movement_used = 0;
            }
        }

        // Reset movement and merge stacks back together.
        for state in self.territories.values_mut() {
            for stack in &mut state.stacks {
                if stack.owner == player {
                    stack.damaged = 0;
                }
                stack.movement_used = 0;
            }
            let mut merged: Vec<crate::game_state::UnitStack> = Vec::new();
            for stack in state.stacks.drain(..) {
                match merged
                    .iter()
                    .position(|s| s.kind == stack.kind && s.owner == stack.owner)
                {
                    Some(index) => {
                        merged[index].quantity += stack.quantity;
                        merged[index].damaged += stack.damaged;
                    }
                    None => merged.push(stack),
                }
            }
            state.stacks = merged;
        }

        // Idle hulls fold back into the fungible stacks.
        let zones: Vec<String> = self.territories.keys().cloned().collect();
        for zone in zones {
            let idle: Vec<ShipId> = self
                .territory(&zone)
                .map(|state| {
                    state
                        .ships
                        .iter()
                        .copied()
                        .filter(|id| {
                            self.ships.get(*id).map(|s| s.is_idle()).unwrap_or(false)
                        })
                        .collect()
                })
                .unwrap_or_default();
            for ship_id in idle {
                if let Some(ship) = self.ships.remove(ship_id) {
                    if let Some(state) = self.territory_mut(&zone) {
                        state.ships.retain(|id| *id != ship_id);
                        state.add_units(ship.kind, ship.owner, 1, 0);
                    }
                }
            }
        }

        self.air_sorties.clear();
        self.cleared_sea_zones.clear();
        self.amphibious_targets.clear();
        self.move_log.clear();
        self.placement_log.clear();

        let next = (player + 1) % self.players.len() as PlayerId;
        if next == 0 {
            self.round += 1;
        }
        self.current_player = next;
        self.turn_phase = TurnPhase::DevelopTech;
        self.begin_turn(next);
        effects.push(ActionEffect::TurnEnded {
            next_player: next,
            round: self.round,
        });
    }

    // ── Undo ───────────────────────────────────────────────────────────

    fn undo_move(&mut self, effects: &mut Vec<ActionEffect>) -> Result<(), ActionError> {
        let phase = self.move_phase()?;
        let record = self.move_log.pop().ok_or(ActionError::NothingToUndo)?;
        match record {
            MoveRecord::UnitsMoved {
                from,
                to,
                kind,
                owner,
                quantity,
                used_before,
                used_after,
                captured_from,
                plundered,
            } => {
                let water = self.map.get(&to).map(|t| t.water).unwrap_or(false);
                let air = self.units.get(kind).class == UnitClass::Air;
                if air && water && phase == MovePhase::NonCombat {
                    self.unboard_carriers(&to, kind, owner, quantity);
                } else if let Some(state) = self.territory_mut(&to) {
                    state.remove_units(kind, owner, quantity, used_after);
                }
                if let Some(state) = self.territory_mut(&from) {
                    state.add_units(kind, owner, quantity, used_before);
                }
                if air {
                    self.revert_sorties(kind, owner, &from, &to, used_before, used_after, quantity);
                }
                if let Some(previous) = captured_from {
                    self.revert_capture(&to, owner, previous, plundered);
                }
            }
            MoveRecord::ShipMoved {
                ship,
                from,
                to,
                used_before,
            } => {
                if let Some(state) = self.territory_mut(&to) {
                    state.ships.retain(|id| *id != ship);
                }
                if let Some(state) = self.territory_mut(&from) {
                    state.ships.push(ship);
                }
                if let Some(ship) = self.ships.get_mut(ship) {
                    ship.movement_used = used_before;
                }
            }
            MoveRecord::Loaded {
                ship,
                from,
                kind,
                used_before,
                individualized,
            } => {
                if let Some(hull) = self.ships.get_mut(ship) {
                    if let Some(position) = hull.cargo.iter().rposition(|k| *k == kind) {
                        hull.cargo.remove(position);
                    }
                }
                let owner = self.ships.get(ship).map(|s| s.owner).unwrap_or_default();
                if let Some(state) = self.territory_mut(&from) {
                    state.add_units(kind, owner, 1, used_before);
                }
                if individualized {
                    let idle = self.ships.get(ship).map(|h| h.is_idle()).unwrap_or(false);
                    if idle {
                        let zone = self.find_ship_zone(ship);
                        if let Some(hull) = self.ships.remove(ship) {
                            if let Some(zone) = zone {
                                if let Some(state) = self.territory_mut(&zone) {
                                    state.ships.retain(|id| *id != ship);
                                    state.add_units(hull.kind, hull.owner, 1, hull.movement_used);
                                }
                            }
                        }
                    }
                }
            }
            MoveRecord::Unloaded {
                ship,
                to,
                kinds,
                marked_amphibious,
                captured_from,
                plundered,
            } => {
                let owner = self.ships.get(ship).map(|s| s.owner).unwrap_or_default();
                for kind in kinds.iter().rev() {
                    let spent = self.effective(owner, *kind).movement;
                    if let Some(state) = self.territory_mut(&to) {
                        state.remove_units(*kind, owner, 1, spent);
                    }
                    if let Some(hull) = self.ships.get_mut(ship) {
                        hull.cargo.push(*kind);
                    }
                }
                if marked_amphibious {
                    let still_marked = self.move_log.iter().any(|r| {
                        matches!(r, MoveRecord::Unloaded { to: other, marked_amphibious: true, .. } if *other == to)
                    });
                    if !still_marked {
                        self.amphibious_targets.remove(&to);
                    }
                }
                if let Some(previous) = captured_from {
                    self.revert_capture(&to, owner, previous, plundered);
                }
            }
        }
        effects.push(ActionEffect::MoveUndone);
        Ok(())
    }

    /// Restore a captured territory's previous owner exactly, including
    /// structure ownership and any capital plunder.
    fn revert_capture(
        &mut self,
        territory: &str,
        captor: PlayerId,
        previous: Option<PlayerId>,
        plundered: Option<(PlayerId, Ipcs)>,
    ) {
        if let Some(state) = self.territory_mut(territory) {
            state.owner = previous;
        }
        if let Some(previous_owner) = previous {
            let structures: Vec<(UnitKind, u32)> = self
                .territory(territory)
                .map(|state| {
                    state
                        .stacks
                        .iter()
                        .filter(|s| {
                            s.owner == captor
                                && self.units.get(s.kind).captured_with_territory
                        })
                        .map(|s| (s.kind, s.quantity))
                        .collect()
                })
                .unwrap_or_default();
            if let Some(state) = self.territory_mut(territory) {
                for (kind, quantity) in structures {
                    state.remove_units(kind, captor, quantity, 0);
                    state.add_units(kind, previous_owner, quantity, 0);
                }
            }
        }
        if let Some((loser, amount)) = plundered {
            self.player_mut(captor).ipcs -= amount;
            self.player_mut(loser).ipcs += amount;
            self.player_mut(loser).capital_lost = false;
        }
        let captures = &mut self.player_mut(captor).captures_this_turn;
        *captures = captures.saturating_sub(1);
    }

    /// Pull aircraft back off carriers in a zone (undo of a water landing).
    fn unboard_carriers(&mut self, zone: &str, kind: UnitKind, owner: PlayerId, quantity: u32) {
        let mut remaining = quantity;
        let ship_ids: Vec<ShipId> = self
            .territory(zone)
            .map(|state| state.ships.clone())
            .unwrap_or_default();
        for ship_id in ship_ids {
            if remaining == 0 {
                break;
            }
            let allied = self
                .ships
                .get(ship_id)
                .map(|s| self.is_ally(s.owner, owner))
                .unwrap_or(false);
            if !allied {
                continue;
            }
            if let Some(ship) = self.ships.get_mut(ship_id) {
                while remaining > 0 {
                    if let Some(position) = ship.aircraft.iter().rposition(|k| *k == kind) {
                        ship.aircraft.remove(position);
                        remaining -= 1;
                    } else {
                        break;
                    }
                }
            }
        }
    }

    /// Reverse sortie tracking for an undone air move.
    fn revert_sorties(
        &mut self,
        kind: UnitKind,
        owner: PlayerId,
        from: &str,
        to: &str,
        used_before: u8,
        used_after: u8,
        quantity: u32,
    ) {
        let mut remaining = quantity;
        let mut restored: Vec<(String, u32)> = Vec::new();
        // Prefer the sortie whose origin matches the undone hop when the
        // hop was the first of the turn.
        let mut order: Vec<usize> = (0..self.air_sorties.len()).collect();
        order.sort_by_key(|i| {
            let sortie = &self.air_sorties[*i];
            (sortie.origin != from) as u8
        });
        for index in order {
            if remaining == 0 {
                break;
            }
            let sortie = &mut self.air_sorties[index];
            if sortie.kind == kind
                && sortie.owner == owner
                && sortie.location == to
                && sortie.spent == used_after
            {
                let take = sortie.quantity.min(remaining);
                sortie.quantity -= take;
                remaining -= take;
                restored.push((sortie.origin.clone(), take));
            }
        }
        self.air_sorties.retain(|s| s.quantity > 0);
        for (origin, qty) in restored {
            // A hop back to its own origin with nothing spent leaves no
            // sortie to track.
            if used_before == 0 && origin == from {
                continue;
            }
            let existing = self.air_sorties.iter().position(|s| {
                s.kind == kind
                    && s.owner == owner
                    && s.origin == origin
                    && s.location == from
                    && s.spent == used_before
            });
            match existing {
                Some(index) => self.air_sorties[index].quantity += qty,
                None => self.air_sorties.push(AirSortie {
                    kind,
                    owner,
                    origin,
                    location: from.to_string(),
                    spent: used_before,
                    quantity: qty,
                }),
            }
        }
    }

    fn undo_placement(&mut self, effects: &mut Vec<ActionEffect>) -> Result<(), ActionError> {
        if !(self.phase == GamePhase::UnitPlacement
            || (self.phase == GamePhase::Playing && self.turn_phase == TurnPhase::Mobilize))
        {
            return Err(ActionError::WrongPhase);
        }
        let record = self.placement_log.pop().ok_or(ActionError::NothingToUndo)?;
        if let Some(state) = self.territory_mut(&record.territory) {
            state.remove_units(record.kind, record.owner, record.quantity, 0);
        }
        if record.from_pool {
            let player = self.player_mut(record.owner);
            *player.pool.entry(record.kind).or_insert(0) += record.quantity;
            player.placed_this_round = player.placed_this_round.saturating_sub(record.quantity);
        } else {
            match self
                .pending_purchases
                .iter()
                .position(|p| p.kind == record.kind && p.owner == record.owner)
            {
                Some(index) => self.pending_purchases[index].quantity += record.quantity,
                None => self.pending_purchases.push(PendingPurchase {
                    kind: record.kind,
                    quantity: record.quantity,
                    owner: record.owner,
                }),
            }
        }
        effects.push(ActionEffect::PlacementUndone);
        Ok(())
    }
}
