//! Core type aliases used throughout the crate.

use serde::{Deserialize, Serialize};

/// Player index (0-5 for 6 player games).
pub type PlayerId = u8;

/// Unique identifier for an individualized ship.
pub type ShipId = u64;

/// Amount of IPCs (the in-game currency).
pub type Ipcs = u32;

/// Alliance index (0 or 1 in alliance games).
pub type AllianceId = u8;

/// How the game is won.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum VictoryMode {
    /// Two fixed alliances; one wins by holding its own capitals plus the
    /// opposing alliance's capitals.
    Alliance,
    /// Free-for-all; a single player must hold every capital (2-3 players)
    /// or a strict majority of them (4+ players).
    #[default]
    CapitalMajority,
}

/// Which side of a battle a unit fights on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Attacker,
    Defender,
}

/// RGB color for player identification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl PlayerColor {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Default colors for players 0-5.
    pub const fn default_for_player(player_id: PlayerId) -> Self {
        match player_id {
            0 => Self::new(178, 34, 34),   // Crimson
            1 => Self::new(30, 60, 150),   // Navy
            2 => Self::new(200, 160, 30),  // Gold
            3 => Self::new(40, 120, 60),   // Forest
            4 => Self::new(90, 50, 130),   // Violet
            _ => Self::new(80, 80, 80),    // Slate
        }
    }

    /// Convert to hex string (e.g., "#B22222").
    pub fn to_hex(&self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

impl Default for PlayerColor {
    fn default() -> Self {
        Self::new(128, 128, 128)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_colors() {
        let crimson = PlayerColor::default_for_player(0);
        assert_eq!(crimson.to_hex(), "#B22222");
        assert_ne!(
            PlayerColor::default_for_player(1),
            PlayerColor::default_for_player(2)
        );
    }

    #[test]
    fn test_victory_mode_default() {
        assert_eq!(VictoryMode::default(), VictoryMode::CapitalMajority);
    }
}
