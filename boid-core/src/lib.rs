#![cfg_attr(not(feature = "std"), no_std)]

//! Discrete-time flocking simulation.
//!
//! Each tick every agent is nudged back toward the arena, looks for neighbors
//! inside its collision and vision radii, blends separation, alignment and
//! cohesion into its heading and then moves `speed` units along it.

extern crate alloc;

use alloc::vec::Vec;
use core::fmt;

#[cfg(feature = "std")]
use rand::Rng;

mod math {
    pub fn sqrt(x: f64) -> f64 {
        #[cfg(feature = "std")]
        {
            x.sqrt()
        }
        #[cfg(not(feature = "std"))]
        {
            libm::sqrt(x)
        }
    }

    pub fn sin_cos(theta: f64) -> (f64, f64) {
        #[cfg(feature = "std")]
        {
            theta.sin_cos()
        }
        #[cfg(not(feature = "std"))]
        {
            (libm::sin(theta), libm::cos(theta))
        }
    }

    pub fn atan2(y: f64, x: f64) -> f64 {
        #[cfg(feature = "std")]
        {
            y.atan2(x)
        }
        #[cfg(not(feature = "std"))]
        {
            libm::atan2(y, x)
        }
    }
}

/// Errors raised while building or restarting a simulation
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// A configuration value is out of range
    InvalidConfiguration {
        parameter: &'static str,
        requirement: &'static str,
    },
    /// Normalization of a zero-length vector
    DegenerateVector,
    /// A supplied population does not have `population_size` agents
    PopulationMismatch { expected: usize, actual: usize },
    /// A supplied agent's id differs from its index
    MisnumberedAgent { index: usize, id: usize },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidConfiguration {
                parameter,
                requirement,
            } => write!(f, "invalid configuration: {parameter} {requirement}"),
            Error::DegenerateVector => write!(f, "cannot normalize a zero-length vector"),
            Error::PopulationMismatch { expected, actual } => write!(
                f,
                "population has {actual} agents but the configuration asks for {expected}"
            ),
            Error::MisnumberedAgent { index, id } => {
                write!(f, "agent at index {index} carries id {id}")
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// A 2D vector used for position and velocity
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vector2 {
    pub x: f64,
    pub y: f64,
}

impl Vector2 {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn zero() -> Self {
        Self { x: 0.0, y: 0.0 }
    }

    /// Random unit vector: `x` uniform in [0, 1) with a random sign, `y` fills
    /// the remaining length with its own random sign.
    #[cfg(feature = "std")]
    pub fn random_unit<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let x = rng.gen::<f64>() * random_sign(rng);
        let y = (1.0 - x * x).sqrt() * random_sign(rng);
        Self { x, y }
    }

    /// Random point on the integer grid `[0, x_range) x [0, y_range)`
    #[cfg(feature = "std")]
    pub fn random_in_range<R: Rng + ?Sized>(rng: &mut R, x_range: f64, y_range: f64) -> Self {
        Self {
            x: (rng.gen::<f64>() * x_range).floor(),
            y: (rng.gen::<f64>() * y_range).floor(),
        }
    }

    pub fn magnitude(&self) -> f64 {
        math::sqrt(self.x * self.x + self.y * self.y)
    }

    pub fn normalize(&self) -> Result<Self, Error> {
        let mag = self.magnitude();
        if mag == 0.0 {
            return Err(Error::DegenerateVector);
        }
        Ok(Self {
            x: self.x / mag,
            y: self.y / mag,
        })
    }

    /// `self + other * strength`
    pub fn add_scaled(&self, other: Vector2, strength: f64) -> Self {
        Self {
            x: self.x + other.x * strength,
            y: self.y + other.y * strength,
        }
    }

    /// `self - other * strength`
    pub fn sub_scaled(&self, other: Vector2, strength: f64) -> Self {
        Self {
            x: self.x - other.x * strength,
            y: self.y - other.y * strength,
        }
    }

    /// Adds `other` weighted by `strength` and renormalizes the result.
    pub fn blend(&self, other: Vector2, strength: f64) -> Result<Self, Error> {
        self.add_scaled(other, strength).normalize()
    }

    pub fn scale(&self, k: f64) -> Self {
        Self {
            x: self.x * k,
            y: self.y * k,
        }
    }

    pub fn divide(&self, divisor: f64) -> Self {
        Self {
            x: self.x / divisor,
            y: self.y / divisor,
        }
    }

    /// Counter-clockwise rotation by `theta` radians
    pub fn rotate(&self, theta: f64) -> Self {
        let (sin, cos) = math::sin_cos(theta);
        Self {
            x: self.x * cos - self.y * sin,
            y: self.x * sin + self.y * cos,
        }
    }

    pub fn distance_to(&self, other: &Vector2) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        math::sqrt(dx * dx + dy * dy)
    }
}

#[cfg(feature = "std")]
fn random_sign<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    if rng.gen_bool(0.5) {
        1.0
    } else {
        -1.0
    }
}

impl core::ops::Add for Vector2 {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        self.add_scaled(other, 1.0)
    }
}

impl core::ops::Sub for Vector2 {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        self.sub_scaled(other, 1.0)
    }
}

impl core::ops::Mul<f64> for Vector2 {
    type Output = Self;

    fn mul(self, scalar: f64) -> Self {
        self.scale(scalar)
    }
}

impl core::ops::Div<f64> for Vector2 {
    type Output = Self;

    fn div(self, scalar: f64) -> Self {
        self.divide(scalar)
    }
}

impl core::ops::Neg for Vector2 {
    type Output = Self;

    fn neg(self) -> Self {
        Self {
            x: -self.x,
            y: -self.y,
        }
    }
}

impl core::ops::AddAssign for Vector2 {
    fn add_assign(&mut self, other: Self) {
        self.x += other.x;
        self.y += other.y;
    }
}

/// A single flock member. `id` is its index in the population.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Agent {
    pub id: usize,
    pub position: Vector2,
    pub velocity: Vector2,
}

impl Agent {
    pub fn new(id: usize, position: Vector2, velocity: Vector2) -> Self {
        Self {
            id,
            position,
            velocity,
        }
    }

    #[cfg(feature = "std")]
    pub fn random<R: Rng + ?Sized>(id: usize, arena_size: f64, rng: &mut R) -> Self {
        let position = Vector2::random_in_range(rng, arena_size, arena_size);
        let velocity = Vector2::random_unit(rng);
        Self::new(id, position, velocity)
    }

    /// Angle of the velocity in radians, for renderers
    pub fn heading(&self) -> f64 {
        math::atan2(self.velocity.y, self.velocity.x)
    }
}

/// How agents observe each other within one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdateMode {
    /// Agents are rewritten in place, in population order. Later agents see
    /// the already-updated state of earlier ones.
    #[default]
    Sequential,
    /// Every agent reads a copy of the population taken at the start of the tick.
    Snapshot,
}

/// Configuration for one simulation run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationConfig {
    pub population_size: usize,
    pub speed: f64,
    pub collision_radius: f64,
    pub vision_radius: f64,
    pub max_repulsion: f64,
    pub heading_strength: f64,
    pub cohesion_strength: f64,
    pub arena_size: f64,
    pub update_mode: UpdateMode,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            population_size: 50,
            speed: 1.0,
            collision_radius: 80.0,
            vision_radius: 120.0,
            max_repulsion: 0.05,
            heading_strength: 0.05,
            cohesion_strength: 0.05,
            arena_size: 500.0,
            update_mode: UpdateMode::Sequential,
        }
    }
}

impl SimulationConfig {
    pub fn with_population(mut self, population_size: usize) -> Self {
        self.population_size = population_size;
        self
    }

    pub fn with_radii(mut self, collision_radius: f64, vision_radius: f64) -> Self {
        self.collision_radius = collision_radius;
        self.vision_radius = vision_radius;
        self
    }

    pub fn with_update_mode(mut self, update_mode: UpdateMode) -> Self {
        self.update_mode = update_mode;
        self
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.population_size == 0 {
            return Err(invalid("population_size", "must be greater than zero"));
        }
        require_positive("speed", self.speed)?;
        require_positive("collision_radius", self.collision_radius)?;
        require_positive("vision_radius", self.vision_radius)?;
        require_positive("arena_size", self.arena_size)?;
        if !(0.0..=1.0).contains(&self.max_repulsion) {
            return Err(invalid("max_repulsion", "must lie in [0, 1]"));
        }
        require_non_negative("heading_strength", self.heading_strength)?;
        require_non_negative("cohesion_strength", self.cohesion_strength)?;

        if self.vision_radius < self.collision_radius {
            log::warn!(
                "vision radius {} is smaller than collision radius {}",
                self.vision_radius,
                self.collision_radius
            );
        }
        Ok(())
    }
}

fn invalid(parameter: &'static str, requirement: &'static str) -> Error {
    Error::InvalidConfiguration {
        parameter,
        requirement,
    }
}

fn require_positive(parameter: &'static str, value: f64) -> Result<(), Error> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(parameter, "must be a finite number greater than zero"))
    }
}

fn require_non_negative(parameter: &'static str, value: f64) -> Result<(), Error> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(invalid(parameter, "must be a finite, non-negative number"))
    }
}

/// Blends `force` into `velocity`. A zero-length result keeps the old velocity.
fn steer(velocity: Vector2, force: Vector2, strength: f64) -> Vector2 {
    velocity.blend(force, strength).unwrap_or(velocity)
}

/// Radius queries over the population
pub mod neighbors {
    use super::*;

    /// An agent found by a radius query
    #[derive(Debug, Clone, Copy)]
    pub struct Neighbor<'a> {
        pub agent: &'a Agent,
        pub distance: f64,
    }

    /// Agents whose discs of `radius` overlap the subject's, i.e. centers at
    /// most `2 * radius` apart. The subject itself is skipped. Results keep
    /// population order.
    pub fn find_within_radius<'a>(
        agent: &Agent,
        population: &'a [Agent],
        radius: f64,
    ) -> Vec<Neighbor<'a>> {
        let reach = 2.0 * radius;
        population
            .iter()
            .filter(|other| other.id != agent.id)
            .filter_map(|other| {
                let distance = agent.position.distance_to(&other.position);
                (distance <= reach).then_some(Neighbor {
                    agent: other,
                    distance,
                })
            })
            .collect()
    }

    /// Nearest entry; on ties the earliest one wins.
    pub fn closest<'n, 'a>(neighbors: &'n [Neighbor<'a>]) -> Option<&'n Neighbor<'a>> {
        let mut iter = neighbors.iter();
        let mut best = iter.next()?;
        for candidate in iter {
            if candidate.distance < best.distance {
                best = candidate;
            }
        }
        Some(best)
    }
}

/// Arena containment
pub mod boundary {
    use super::*;

    /// Magnitude of the corrective push applied per crossed edge
    pub const NUDGE: f64 = 0.075;

    /// Steers `velocity` back toward the `[0, arena_size]` square. Edges are
    /// checked left, right, top, bottom and each crossed one renormalizes.
    /// The position is left alone.
    pub fn contain(position: Vector2, velocity: Vector2, arena_size: f64) -> Vector2 {
        let edges = [
            (position.x < 0.0, Vector2::new(NUDGE, 0.0)),
            (position.x > arena_size, Vector2::new(-NUDGE, 0.0)),
            (position.y < 0.0, Vector2::new(0.0, NUDGE)),
            (position.y > arena_size, Vector2::new(0.0, -NUDGE)),
        ];

        edges
            .iter()
            .filter(|(crossed, _)| *crossed)
            .fold(velocity, |v, (_, nudge)| steer(v, *nudge, 1.0))
    }
}

/// The three flocking rules
pub mod behavior {
    use super::neighbors::{self, Neighbor};
    use super::*;

    /// Repulsion weight for the closest collision neighbor. Falls linearly from
    /// `max_repulsion` at distance 0 to 0 at `collision_radius`, and keeps
    /// falling (turning into a weak pull) out to the query reach of twice that.
    pub fn separation_strength(distance: f64, config: &SimulationConfig) -> f64 {
        config.max_repulsion * (1.0 - distance / config.collision_radius)
    }

    pub fn separation(
        agent: &Agent,
        velocity: Vector2,
        collisions: &[Neighbor<'_>],
        config: &SimulationConfig,
    ) -> Vector2 {
        let Some(closest) = neighbors::closest(collisions) else {
            return velocity;
        };

        match (agent.position - closest.agent.position).normalize() {
            Ok(away) => steer(velocity, away, separation_strength(closest.distance, config)),
            // Coincident agents have no direction to separate along
            Err(_) => velocity,
        }
    }

    pub fn alignment(
        velocity: Vector2,
        visible: &[Neighbor<'_>],
        config: &SimulationConfig,
    ) -> Vector2 {
        if visible.is_empty() {
            return velocity;
        }

        let sum = visible
            .iter()
            .fold(Vector2::zero(), |sum, n| sum + n.agent.velocity);

        // Headings that cancel out exactly give nothing to align with
        match sum.normalize() {
            Ok(heading) => steer(velocity, heading, config.heading_strength),
            Err(_) => velocity,
        }
    }

    /// Blends in the unit vector from the neighbors' mean position to the agent.
    pub fn cohesion(
        agent: &Agent,
        velocity: Vector2,
        visible: &[Neighbor<'_>],
        config: &SimulationConfig,
    ) -> Vector2 {
        if visible.is_empty() {
            return velocity;
        }

        let centre = visible
            .iter()
            .fold(Vector2::zero(), |sum, n| sum + n.agent.position)
            .divide(visible.len() as f64);

        match (agent.position - centre).normalize() {
            Ok(direction) => steer(velocity, direction, config.cohesion_strength),
            Err(_) => velocity,
        }
    }

    /// Separation, then alignment, then cohesion, each acting on the heading
    /// the previous rule produced.
    pub fn flock(
        agent: &Agent,
        velocity: Vector2,
        collisions: &[Neighbor<'_>],
        visible: &[Neighbor<'_>],
        config: &SimulationConfig,
    ) -> Vector2 {
        let velocity = separation(agent, velocity, collisions, config);
        let velocity = alignment(velocity, visible, config);
        cohesion(agent, velocity, visible, config)
    }
}

/// Computes the next state of `agent` against `population`.
pub fn step(agent: &Agent, population: &[Agent], config: &SimulationConfig) -> Agent {
    let velocity = boundary::contain(agent.position, agent.velocity, config.arena_size);

    let collisions = neighbors::find_within_radius(agent, population, config.collision_radius);
    let visible = neighbors::find_within_radius(agent, population, config.vision_radius);

    let velocity = behavior::flock(agent, velocity, &collisions, &visible, config);

    Agent {
        id: agent.id,
        position: agent.position.add_scaled(velocity, config.speed),
        velocity,
    }
}

/// Advances every agent once, in population order.
pub fn tick(population: &mut [Agent], config: &SimulationConfig) {
    match config.update_mode {
        UpdateMode::Sequential => {
            for index in 0..population.len() {
                let current: &[Agent] = population;
                let updated = step(&current[index], current, config);
                population[index] = updated;
            }
        }
        UpdateMode::Snapshot => {
            let frozen = population.to_vec();
            for (agent, previous) in population.iter_mut().zip(frozen.iter()) {
                *agent = step(previous, &frozen, config);
            }
        }
    }
}

/// Builds a fresh random population for `config`
#[cfg(feature = "std")]
pub fn spawn_population<R: Rng + ?Sized>(config: &SimulationConfig, rng: &mut R) -> Vec<Agent> {
    (0..config.population_size)
        .map(|id| Agent::random(id, config.arena_size, rng))
        .collect()
}

/// A population together with the configuration it runs under
#[derive(Debug, Clone)]
pub struct Flock {
    agents: Vec<Agent>,
    config: SimulationConfig,
    ticks: u64,
}

impl Flock {
    #[cfg(feature = "std")]
    pub fn new(config: SimulationConfig) -> Result<Self, Error> {
        Self::with_rng(config, &mut rand::thread_rng())
    }

    #[cfg(feature = "std")]
    pub fn with_seed(config: SimulationConfig, seed: u64) -> Result<Self, Error> {
        use rand::{rngs::StdRng, SeedableRng};

        let mut rng = StdRng::seed_from_u64(seed);
        Self::with_rng(config, &mut rng)
    }

    #[cfg(feature = "std")]
    pub fn with_rng<R: Rng + ?Sized>(config: SimulationConfig, rng: &mut R) -> Result<Self, Error> {
        config.validate()?;
        let agents = spawn_population(&config, rng);
        log::debug!(
            "spawned {} agents in a {} arena ({:?} updates)",
            agents.len(),
            config.arena_size,
            config.update_mode
        );

        Ok(Self {
            agents,
            config,
            ticks: 0,
        })
    }

    /// Wraps an existing population. Agents must be numbered by their index.
    pub fn from_agents(config: SimulationConfig, agents: Vec<Agent>) -> Result<Self, Error> {
        config.validate()?;
        if agents.len() != config.population_size {
            return Err(Error::PopulationMismatch {
                expected: config.population_size,
                actual: agents.len(),
            });
        }
        if let Some((index, agent)) = agents.iter().enumerate().find(|(i, a)| a.id != *i) {
            return Err(Error::MisnumberedAgent {
                index,
                id: agent.id,
            });
        }

        Ok(Self {
            agents,
            config,
            ticks: 0,
        })
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn tick_count(&self) -> u64 {
        self.ticks
    }

    pub fn tick(&mut self) {
        tick(&mut self.agents, &self.config);
        self.ticks += 1;
        log::trace!("tick {} complete", self.ticks);
    }

    /// Replaces the run with a fresh population under `config`. Nothing
    /// changes if `config` is rejected.
    #[cfg(feature = "std")]
    pub fn restart<R: Rng + ?Sized>(
        &mut self,
        config: SimulationConfig,
        rng: &mut R,
    ) -> Result<(), Error> {
        let fresh = Self::with_rng(config, rng)?;
        log::debug!("restarting after {} ticks", self.ticks);
        *self = fresh;
        Ok(())
    }

    #[cfg(feature = "std")]
    pub fn restart_with_seed(&mut self, config: SimulationConfig, seed: u64) -> Result<(), Error> {
        let fresh = Self::with_seed(config, seed)?;
        log::debug!("restarting after {} ticks (seed {})", self.ticks, seed);
        *self = fresh;
        Ok(())
    }
}
