//! Map topology - territories, continents, and land bridges.
//!
//! The map is static configuration supplied at game creation and owned by
//! the engine for the game's lifetime. Ownership and unit placement live in
//! per-territory state on the game root, not here.

use crate::types::Ipcs;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A territory or sea zone on the map. Immutable after load.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Territory {
    /// Unique name, used as the territory's identifier everywhere.
    pub name: String,
    /// Sea zones are water; land units may not enter them.
    pub water: bool,
    /// IPC production collected by the owner each turn.
    pub production: Ipcs,
    /// Continent this territory belongs to, if any.
    pub continent: Option<String>,
    /// Names of adjacent territories.
    pub adjacent: Vec<String>,
}

impl Territory {
    /// Create a land territory.
    pub fn land(name: &str, production: Ipcs, adjacent: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            water: false,
            production,
            continent: None,
            adjacent: adjacent.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Create a sea zone.
    pub fn sea(name: &str, adjacent: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            water: true,
            production: 0,
            continent: None,
            adjacent: adjacent.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Assign this territory to a continent.
    pub fn in_continent(mut self, continent: &str) -> Self {
        self.continent = Some(continent.to_string());
        self
    }
}

/// A continent grouping with a control bonus.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Continent {
    pub name: String,
    /// IPC bonus paid when one player owns every member territory.
    pub bonus: Ipcs,
    pub members: Vec<String>,
}

/// Raw map configuration as supplied by the caller.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MapConfig {
    pub territories: Vec<Territory>,
    pub continents: Vec<Continent>,
    /// Extra adjacency edges usable by land units only.
    pub land_bridges: Vec<(String, String)>,
}

/// Errors from map configuration validation.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum MapError {
    #[error("duplicate territory name: {0}")]
    DuplicateTerritory(String),
    #[error("unknown territory referenced: {0}")]
    UnknownTerritory(String),
    #[error("adjacency from {0} to {1} is not symmetric")]
    AsymmetricAdjacency(String, String),
    #[error("land bridge endpoint {0} is a sea zone")]
    BridgeOnWater(String),
}

/// Validated map graph with adjacency and land-bridge lookups.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapGraph {
    territories: HashMap<String, Territory>,
    continents: Vec<Continent>,
    bridges: HashMap<String, Vec<String>>,
}

impl MapGraph {
    /// Validate a configuration and build the graph.
    pub fn new(config: MapConfig) -> Result<Self, MapError> {
        let mut territories: HashMap<String, Territory> = HashMap::new();
        for territory in config.territories {
            if territories.contains_key(&territory.name) {
                return Err(MapError::DuplicateTerritory(territory.name));
            }
            territories.insert(territory.name.clone(), territory);
        }

        // Adjacency must reference known territories and be symmetric.
        for territory in territories.values() {
            for neighbor in &territory.adjacent {
                let other = territories
                    .get(neighbor)
                    .ok_or_else(|| MapError::UnknownTerritory(neighbor.clone()))?;
                if !other.adjacent.contains(&territory.name) {
                    return Err(MapError::AsymmetricAdjacency(
                        territory.name.clone(),
                        neighbor.clone(),
                    ));
                }
            }
        }

        for continent in &config.continents {
            for member in &continent.members {
                if !territories.contains_key(member) {
                    return Err(MapError::UnknownTerritory(member.clone()));
                }
            }
        }

        let mut bridges: HashMap<String, Vec<String>> = HashMap::new();
        for (a, b) in &config.land_bridges {
            for end in [a, b] {
                let territory = territories
                    .get(end)
                    .ok_or_else(|| MapError::UnknownTerritory(end.clone()))?;
                if territory.water {
                    return Err(MapError::BridgeOnWater(end.clone()));
                }
            }
            bridges.entry(a.clone()).or_default().push(b.clone());
            bridges.entry(b.clone()).or_default().push(a.clone());
        }

        Ok(Self {
            territories,
            continents: config.continents,
            bridges,
        })
    }

    /// Get a territory by name.
    pub fn get(&self, name: &str) -> Option<&Territory> {
        self.territories.get(name)
    }

    /// Check a territory exists.
    pub fn contains(&self, name: &str) -> bool {
        self.territories.contains_key(name)
    }

    /// Ordinary adjacency of a territory (empty for unknown names).
    pub fn neighbors(&self, name: &str) -> &[String] {
        self.territories
            .get(name)
            .map(|t| t.adjacent.as_slice())
            .unwrap_or(&[])
    }

    /// Land-bridge endpoints reachable from a territory.
    pub fn bridge_neighbors(&self, name: &str) -> &[String] {
        self.bridges.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// True if `a` and `b` share an ordinary adjacency edge.
    pub fn is_adjacent(&self, a: &str, b: &str) -> bool {
        self.neighbors(a).iter().any(|n| n == b)
    }

    /// All continents on the map.
    pub fn continents(&self) -> &[Continent] {
        &self.continents
    }

    /// Iterate all territories.
    pub fn iter(&self) -> impl Iterator<Item = &Territory> {
        self.territories.values()
    }

    /// Names of all territories.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.territories.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> MapConfig {
        MapConfig {
            territories: vec![
                Territory::land("Alpha", 3, &["Beta", "North Sea"]).in_continent("Mainland"),
                Territory::land("Beta", 2, &["Alpha", "North Sea"]).in_continent("Mainland"),
                Territory::land("Isle", 1, &["North Sea"]),
                Territory::sea("North Sea", &["Alpha", "Beta", "Isle"]),
            ],
            continents: vec![Continent {
                name: "Mainland".to_string(),
                bonus: 2,
                members: vec!["Alpha".to_string(), "Beta".to_string()],
            }],
            land_bridges: vec![("Beta".to_string(), "Isle".to_string())],
        }
    }

    #[test]
    fn test_valid_map() {
        let map = MapGraph::new(small_config()).unwrap();
        assert!(map.get("Alpha").is_some());
        assert!(map.is_adjacent("Alpha", "Beta"));
        assert!(!map.is_adjacent("Alpha", "Isle"));
        assert_eq!(map.bridge_neighbors("Beta"), &["Isle".to_string()]);
        assert_eq!(map.bridge_neighbors("Isle"), &["Beta".to_string()]);
    }

    #[test]
    fn test_unknown_adjacency_rejected() {
        let mut config = small_config();
        config.territories[0].adjacent.push("Nowhere".to_string());
        assert_eq!(
            MapGraph::new(config),
            Err(MapError::UnknownTerritory("Nowhere".to_string()))
        );
    }

    #[test]
    fn test_asymmetric_adjacency_rejected() {
        let mut config = small_config();
        // Beta -> Isle without the reverse edge
        config.territories[1].adjacent.push("Isle".to_string());
        assert_eq!(
            MapGraph::new(config),
            Err(MapError::AsymmetricAdjacency(
                "Beta".to_string(),
                "Isle".to_string()
            ))
        );
    }

    #[test]
    fn test_bridge_on_water_rejected() {
        let mut config = small_config();
        config
            .land_bridges
            .push(("Alpha".to_string(), "North Sea".to_string()));
        assert_eq!(
            MapGraph::new(config),
            Err(MapError::BridgeOnWater("North Sea".to_string()))
        );
    }

    #[test]
    fn test_duplicate_territory_rejected() {
        let mut config = small_config();
        config.territories.push(Territory::land("Alpha", 1, &[]));
        assert!(matches!(
            MapGraph::new(config),
            Err(MapError::DuplicateTerritory(_))
        ));
    }

    #[test]
    fn test_map_serialization() {
        let map = MapGraph::new(small_config()).unwrap();
        let json = serde_json::to_string(&map).unwrap();
        let restored: MapGraph = serde_json::from_str(&json).unwrap();
        assert!(restored.is_adjacent("Alpha", "North Sea"));
    }
}
