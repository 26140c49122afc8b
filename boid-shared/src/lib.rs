#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

use alloc::vec::Vec;
use boid_core::{Agent, Flock, SimulationConfig, UpdateMode, Vector2};
use serde::{Deserialize, Serialize};

/// Represents a 2D point in arena coordinates
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Calculate distance to another position
    pub fn distance_to(&self, other: &Position) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        libm::sqrt(dx * dx + dy * dy)
    }
}

impl From<Vector2> for Position {
    fn from(v: Vector2) -> Self {
        Self::new(v.x, v.y)
    }
}

/// Tick ordering requested by a settings file
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum UpdateOrder {
    #[default]
    Sequential,
    Snapshot,
}

/// Flock simulation settings as read from a settings file.
/// Missing fields fall back to `SimulationConfig::default()`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct FlockSettings {
    pub population_size: usize,
    pub speed: f64,
    pub collision_radius: f64,
    pub vision_radius: f64,
    pub max_repulsion: f64,
    pub heading_strength: f64,
    pub cohesion_strength: f64,
    pub arena_size: f64,
    pub update_order: UpdateOrder,
}

impl Default for FlockSettings {
    fn default() -> Self {
        Self::from_config(&SimulationConfig::default())
    }
}

impl From<UpdateMode> for UpdateOrder {
    fn from(mode: UpdateMode) -> Self {
        match mode {
            UpdateMode::Sequential => UpdateOrder::Sequential,
            UpdateMode::Snapshot => UpdateOrder::Snapshot,
        }
    }
}

impl From<UpdateOrder> for UpdateMode {
    fn from(order: UpdateOrder) -> Self {
        match order {
            UpdateOrder::Sequential => UpdateMode::Sequential,
            UpdateOrder::Snapshot => UpdateMode::Snapshot,
        }
    }
}

impl FlockSettings {
    pub fn from_config(config: &SimulationConfig) -> Self {
        Self {
            population_size: config.population_size,
            speed: config.speed,
            collision_radius: config.collision_radius,
            vision_radius: config.vision_radius,
            max_repulsion: config.max_repulsion,
            heading_strength: config.heading_strength,
            cohesion_strength: config.cohesion_strength,
            arena_size: config.arena_size,
            update_order: config.update_mode.into(),
        }
    }

    /// Unvalidated; the flock constructors check the values.
    pub fn to_config(&self) -> SimulationConfig {
        SimulationConfig {
            population_size: self.population_size,
            speed: self.speed,
            collision_radius: self.collision_radius,
            vision_radius: self.vision_radius,
            max_repulsion: self.max_repulsion,
            heading_strength: self.heading_strength,
            cohesion_strength: self.cohesion_strength,
            arena_size: self.arena_size,
            update_mode: self.update_order.into(),
        }
    }
}

/// One agent as seen by a renderer or telemetry consumer
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct AgentState {
    pub id: usize,
    pub position: Position,
    pub velocity: Position,
    /// Heading in radians
    pub heading: f64,
}

impl From<&Agent> for AgentState {
    fn from(agent: &Agent) -> Self {
        Self {
            id: agent.id,
            position: agent.position.into(),
            velocity: agent.velocity.into(),
            heading: agent.heading(),
        }
    }
}

/// The whole population after a tick
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FlockSnapshot {
    pub tick: u64,
    pub agents: Vec<AgentState>,
}

impl FlockSnapshot {
    pub fn from_flock(flock: &Flock) -> Self {
        Self {
            tick: flock.tick_count(),
            agents: flock.agents().iter().map(AgentState::from).collect(),
        }
    }

    /// Mean agent position, `None` for an empty snapshot
    pub fn centroid(&self) -> Option<Position> {
        if self.agents.is_empty() {
            return None;
        }
        let n = self.agents.len() as f64;
        let (sx, sy) = self
            .agents
            .iter()
            .fold((0.0, 0.0), |(sx, sy), a| (sx + a.position.x, sy + a.position.y));
        Some(Position::new(sx / n, sy / n))
    }

    /// Mean distance of the agents from their centroid
    pub fn spread(&self) -> f64 {
        match self.centroid() {
            Some(centre) => {
                let total: f64 = self
                    .agents
                    .iter()
                    .map(|a| a.position.distance_to(&centre))
                    .sum();
                total / self.agents.len() as f64
            }
            None => 0.0,
        }
    }

    /// Length of the mean unit heading: 1 when every agent flies the same
    /// way, near 0 for a disordered flock. Stationary agents count as zero.
    pub fn polarization(&self) -> f64 {
        if self.agents.is_empty() {
            return 0.0;
        }
        let (sx, sy) = self.agents.iter().fold((0.0, 0.0), |(sx, sy), a| {
            let speed = libm::sqrt(a.velocity.x * a.velocity.x + a.velocity.y * a.velocity.y);
            if speed == 0.0 {
                (sx, sy)
            } else {
                (sx + a.velocity.x / speed, sy + a.velocity.y / speed)
            }
        });
        let n = self.agents.len() as f64;
        libm::sqrt(sx * sx + sy * sy) / n
    }

    #[cfg(feature = "std")]
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(id: usize, x: f64, y: f64, vx: f64, vy: f64) -> AgentState {
        AgentState {
            id,
            position: Position::new(x, y),
            velocity: Position::new(vx, vy),
            heading: libm::atan2(vy, vx),
        }
    }

    #[test]
    fn test_position_distance() {
        let p1 = Position::new(0.0, 0.0);
        let p2 = Position::new(3.0, 4.0);
        assert_eq!(p1.distance_to(&p2), 5.0);
    }

    #[test]
    fn test_partial_settings_use_defaults() {
        let settings: FlockSettings =
            serde_json::from_str(r#"{"populationSize": 8, "updateOrder": "snapshot"}"#).unwrap();

        assert_eq!(settings.population_size, 8);
        assert_eq!(settings.update_order, UpdateOrder::Snapshot);
        assert_eq!(settings.collision_radius, 80.0);
        assert_eq!(settings.arena_size, 500.0);
    }

    #[test]
    fn test_centroid_and_polarization() {
        let aligned = FlockSnapshot {
            tick: 1,
            agents: vec![state(0, 0.0, 0.0, 1.0, 0.0), state(1, 10.0, 20.0, 2.0, 0.0)],
        };
        assert_eq!(aligned.centroid(), Some(Position::new(5.0, 10.0)));
        assert!((aligned.polarization() - 1.0).abs() < 1e-12);

        let opposed = FlockSnapshot {
            tick: 1,
            agents: vec![state(0, 0.0, 0.0, 1.0, 0.0), state(1, 0.0, 0.0, -1.0, 0.0)],
        };
        assert_eq!(opposed.polarization(), 0.0);

        let empty = FlockSnapshot {
            tick: 0,
            agents: vec![],
        };
        assert_eq!(empty.centroid(), None);
        assert_eq!(empty.polarization(), 0.0);
    }

    #[test]
    fn test_snapshot_json_shape() {
        let snapshot = FlockSnapshot {
            tick: 3,
            agents: vec![state(0, 1.0, 2.0, 0.0, 1.0)],
        };
        let json = snapshot.to_json().unwrap();
        assert!(json.starts_with(r#"{"tick":3,"agents":[{"id":0,"position":{"x":1.0,"y":2.0}"#));

        let back: FlockSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snapshot);
    }

    #[test]
    fn test_spread_uses_distance_from_centroid() {
        let snapshot = FlockSnapshot {
            tick: 1,
            agents: vec![state(0, 0.0, 0.0, 1.0, 0.0), state(1, 10.0, 20.0, 1.0, 0.0)],
        };
        assert!((snapshot.spread() - 125.0f64.sqrt()).abs() < 1e-12);

        let empty = FlockSnapshot {
            tick: 0,
            agents: vec![],
        };
        assert_eq!(empty.spread(), 0.0);
    }

    #[test]
    fn test_settings_defaults_come_from_core() {
        let settings = FlockSettings::default();
        assert_eq!(settings.to_config(), SimulationConfig::default());

        let config = SimulationConfig::default()
            .with_population(3)
            .with_update_mode(UpdateMode::Snapshot);
        assert_eq!(FlockSettings::from_config(&config).to_config(), config);
    }

    #[test]
    fn test_agent_state_copies_kinematics() {
        let agent = Agent::new(4, Vector2::new(1.0, 2.0), Vector2::new(0.0, -1.0));
        let state = AgentState::from(&agent);

        assert_eq!(state.id, 4);
        assert_eq!(state.position, Position::new(1.0, 2.0));
        assert_eq!(state.velocity, Position::new(0.0, -1.0));
        assert_eq!(state.heading, agent.heading());
    }

    #[test]
    fn test_snapshot_json_round_trips_simulated_values() {
        let mut flock = Flock::with_seed(SimulationConfig::default().with_population(20), 17).unwrap();
        for _ in 0..25 {
            flock.tick();
        }
        let snapshot = FlockSnapshot::from_flock(&flock);
        assert!(snapshot
            .agents
            .iter()
            .any(|a| a.position.x.fract() != 0.0 && a.velocity.x.fract() != 0.0));

        let back: FlockSnapshot = serde_json::from_str(&snapshot.to_json().unwrap()).unwrap();
        assert_eq!(back, snapshot);
    }
}
