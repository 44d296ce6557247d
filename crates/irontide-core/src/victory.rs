//! Victory evaluation - capital control.
//!
//! Two mutually exclusive rule sets, selected once at game start: alliance
//! victory (each alliance must hold its own capitals plus the opposing
//! ones) or capital-majority victory (a single player holds every capital,
//! or a strict majority with 4+ players). Evaluation runs after every
//! ownership change that could affect a capital; a declared win is never
//! retracted.

use crate::game_state::Game;
use crate::types::{PlayerId, VictoryMode};

/// Evaluate the victory condition after an ownership change by `actor`.
///
/// Returns the winner and a human-readable win-condition string, or None
/// if the game continues. Callers must not invoke this once the game-over
/// flag is set; [`Game::game_over`] is checked here anyway so a declared
/// win can never be overwritten.
pub fn evaluate(game: &Game, actor: PlayerId) -> Option<(PlayerId, String)> {
    if game.game_over {
        return None;
    }
    match game.rules.victory {
        VictoryMode::Alliance => evaluate_alliance(game, actor),
        VictoryMode::CapitalMajority => evaluate_majority(game, actor),
    }
}

/// All placed capitals as (owner-of-record, territory name) pairs.
fn capitals(game: &Game) -> Vec<(PlayerId, String)> {
    game.players
        .iter()
        .filter_map(|p| p.capital.as_ref().map(|c| (p.id, c.clone())))
        .collect()
}

/// Whether `player`'s side currently holds the named territory.
fn held_by_side(game: &Game, territory: &str, player: PlayerId) -> bool {
    game.territory(territory)
        .and_then(|t| t.owner)
        .map(|owner| game.is_ally(owner, player))
        .unwrap_or(false)
}

fn evaluate_majority(game: &Game, actor: PlayerId) -> Option<(PlayerId, String)> {
    let capitals = capitals(game);
    let total = capitals.len();
    if total == 0 {
        return None;
    }

    // Check the acting player first so the capturer is credited when the
    // capture itself decides the game.
    let mut order: Vec<PlayerId> = vec![actor];
    order.extend(game.players.iter().map(|p| p.id).filter(|id| *id != actor));

    let needed_all = game.players.len() <= 3;
    for player in order {
        let held = capitals
            .iter()
            .filter(|(_, territory)| {
                game.territory(territory).and_then(|t| t.owner) == Some(player)
            })
            .count();
        let wins = if needed_all {
            held == total
        } else {
            held * 2 > total
        };
        if wins {
            let name = &game.player(player).name;
            let condition = if needed_all {
                format!("{} holds all {} capitals", name, total)
            } else {
                format!("{} holds {} of {} capitals", name, held, total)
            };
            return Some((player, condition));
        }
    }
    None
}

fn evaluate_alliance(game: &Game, actor: PlayerId) -> Option<(PlayerId, String)> {
    let capitals = capitals(game);
    if capitals.is_empty() || game.rules.alliances.len() != 2 {
        return None;
    }

    for (index, alliance) in game.rules.alliances.iter().enumerate() {
        let Some(&leader) = alliance.members.first() else {
            continue;
        };
        let own: Vec<&String> = capitals
            .iter()
            .filter(|(owner, _)| alliance.members.contains(owner))
            .map(|(_, territory)| territory)
            .collect();
        let enemy: Vec<&String> = capitals
            .iter()
            .filter(|(owner, _)| !alliance.members.contains(owner))
            .map(|(_, territory)| territory)
            .collect();
        if own.is_empty() || enemy.is_empty() {
            continue;
        }

        let holds_own = own
            .iter()
            .all(|territory| held_by_side(game, territory, leader));
        let enemy_held = enemy
            .iter()
            .filter(|territory| held_by_side(game, territory, leader))
            .count();
        let enemy_ok = if game.rules.alliance_majority_suffices {
            enemy_held * 2 > enemy.len()
        } else {
            enemy_held == enemy.len()
        };

        if holds_own && enemy_ok {
            // Credit the acting player when they are on the winning side.
            let winner = if game.rules.alliance_of(actor) == Some(index as u8) {
                actor
            } else {
                leader
            };
            let condition = format!(
                "{} holds its own capitals and {} of {} enemy capitals",
                alliance.name,
                enemy_held,
                enemy.len()
            );
            return Some((winner, condition));
        }
    }
    None
}
