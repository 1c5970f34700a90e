mod forces;
mod quadtree;

use eframe::egui::{Vec2, vec2};
use tracing::trace;

use crate::config::SimulationConfig;
use forces::{
    ChargeParams, CollisionParams, accumulate_charge_for_node, accumulate_collision_pairs,
    apply_centering, apply_springs,
};
pub use forces::Spring;
use quadtree::QuadNode;

const INITIAL_RADIUS: f32 = 10.0;

/// Deterministic starting point for the `index`-th body, spiralling out from the origin.
pub fn phyllotaxis(index: usize) -> Vec2 {
    let golden_angle = std::f32::consts::PI * (3.0 - 5.0_f32.sqrt());
    let radius = INITIAL_RADIUS * (0.5 + index as f32).sqrt();
    let angle = index as f32 * golden_angle;
    vec2(radius * angle.cos(), radius * angle.sin())
}

/// A link between two bodies; `weight` is the link flow normalized to `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpringSpec {
    pub source: usize,
    pub target: usize,
    pub weight: f32,
}

/// Force-directed layout of one module's children.
///
/// Positions, velocities and pins are kept as parallel vectors indexed by body. Alpha
/// cools geometrically toward `alpha_target`; once it falls under `alpha_min` the
/// simulation stops by itself.
pub struct Simulation {
    positions: Vec<Vec2>,
    velocities: Vec<Vec2>,
    masses: Vec<f32>,
    fixed: Vec<Option<Vec2>>,
    springs: Vec<Spring>,
    anchor: Vec2,
    config: SimulationConfig,
    alpha: f32,
    alpha_target: f32,
    alpha_decay: f32,
    running: bool,
}

impl Simulation {
    pub fn new(
        positions: Vec<Vec2>,
        masses: Vec<f32>,
        links: &[SpringSpec],
        anchor: Vec2,
        config: SimulationConfig,
    ) -> Self {
        let count = positions.len();
        let springs = build_springs(count, links, &config);
        Self {
            velocities: vec![Vec2::ZERO; count],
            masses: masses
                .into_iter()
                .chain(std::iter::repeat(1.0))
                .take(count)
                .collect(),
            fixed: vec![None; count],
            positions,
            springs,
            anchor,
            alpha: 1.0,
            alpha_target: 0.0,
            alpha_decay: config.alpha_decay(),
            config,
            running: true,
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn positions(&self) -> &[Vec2] {
        &self.positions
    }

    pub fn springs(&self) -> &[Spring] {
        &self.springs
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Runs the configured number of ticks synchronously.
    pub fn prewarm(&mut self) {
        for _ in 0..self.config.prewarm_ticks {
            self.tick();
        }
        trace!(alpha = self.alpha, bodies = self.len(), "prewarmed simulation");
    }

    /// Advances one tick if running. Returns whether positions changed.
    pub fn step(&mut self) -> bool {
        if !self.running {
            return false;
        }
        self.tick();
        if self.alpha < self.config.alpha_min && self.alpha_target < self.config.alpha_min {
            self.running = false;
            trace!(bodies = self.len(), "simulation cooled down");
        }
        true
    }

    /// Stopping a stopped simulation does nothing.
    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn resume(&mut self) {
        self.running = true;
    }

    pub fn set_alpha_target(&mut self, alpha_target: f32) {
        self.alpha_target = alpha_target.clamp(0.0, 1.0);
    }

    /// Pins a body at `position` until [`Simulation::release`].
    pub fn fix(&mut self, index: usize, position: Vec2) {
        if let Some(fixed) = self.fixed.get_mut(index) {
            *fixed = Some(position);
            self.positions[index] = position;
        }
    }

    pub fn release(&mut self, index: usize) {
        if let Some(fixed) = self.fixed.get_mut(index) {
            *fixed = None;
        }
    }

    pub fn is_fixed(&self, index: usize) -> bool {
        self.fixed.get(index).is_some_and(Option::is_some)
    }

    pub fn tick(&mut self) {
        self.alpha += (self.alpha_target - self.alpha) * self.alpha_decay;
        let alpha = self.alpha;
        let config = &self.config;

        if self.positions.len() >= 2
            && let Some(tree) = QuadNode::build(&self.positions, &self.masses)
        {
            let charge = ChargeParams {
                strength: config.charge * alpha,
                max_distance_sq: config.max_charge_distance * config.max_charge_distance,
            };
            for (index, velocity) in self.velocities.iter_mut().enumerate() {
                accumulate_charge_for_node(
                    &tree,
                    index,
                    &self.positions,
                    &self.masses,
                    charge,
                    velocity,
                );
            }

            accumulate_collision_pairs(
                &tree,
                &tree,
                true,
                &self.positions,
                CollisionParams {
                    radius: config.collision_radius,
                    strength: config.collision_strength,
                },
                &mut self.velocities,
            );
        }

        apply_springs(&self.springs, &self.positions, &mut self.velocities, alpha);
        apply_centering(
            &self.positions,
            &mut self.velocities,
            self.anchor,
            config.center_strength * alpha,
        );

        let retain = 1.0 - config.velocity_decay;
        for ((position, velocity), fixed) in self
            .positions
            .iter_mut()
            .zip(self.velocities.iter_mut())
            .zip(&self.fixed)
        {
            if let Some(pin) = fixed {
                *position = *pin;
                *velocity = Vec2::ZERO;
            } else {
                *velocity *= retain;
                *position += *velocity;
            }
        }
    }
}

fn build_springs(count: usize, links: &[SpringSpec], config: &SimulationConfig) -> Vec<Spring> {
    let mut degree = vec![0usize; count];
    for link in links {
        if link.source < count && link.target < count {
            degree[link.source] += 1;
            degree[link.target] += 1;
        }
    }

    let (short, long) = config.link_distance;
    let (weak, strong) = config.link_strength;
    links
        .iter()
        .filter(|link| link.source < count && link.target < count)
        .map(|link| {
            let weight = link.weight.clamp(0.0, 1.0);
            let source_degree = degree[link.source] as f32;
            let target_degree = degree[link.target] as f32;
            Spring {
                source: link.source,
                target: link.target,
                distance: long + (short - long) * weight,
                strength: weak + (strong - weak) * weight,
                bias: source_degree / (source_degree + target_degree),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spread(count: usize) -> Vec<Vec2> {
        (0..count).map(phyllotaxis).collect()
    }

    #[test]
    fn heavier_links_rest_shorter_and_pull_harder() {
        let links = [
            SpringSpec {
                source: 0,
                target: 1,
                weight: 1.0,
            },
            SpringSpec {
                source: 1,
                target: 2,
                weight: 0.0,
            },
        ];
        let simulation = Simulation::new(
            spread(3),
            vec![1.0; 3],
            &links,
            Vec2::ZERO,
            SimulationConfig::default(),
        );
        let springs = simulation.springs();
        assert_eq!(springs[0].distance, 100.0);
        assert_eq!(springs[1].distance, 250.0);
        assert_eq!(springs[0].strength, 1.0);
        assert_eq!(springs[1].strength, 0.5);
        assert!((springs[0].bias - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn prewarm_separates_bodies_beyond_collision_range() {
        let mut simulation = Simulation::new(
            spread(2),
            vec![1.0; 2],
            &[],
            Vec2::ZERO,
            SimulationConfig::default(),
        );
        simulation.prewarm();
        let distance = (simulation.positions()[0] - simulation.positions()[1]).length();
        assert!(distance > 60.0, "{distance}");
        assert!(simulation.alpha() < 0.05);
    }

    #[test]
    fn cools_down_and_stops() {
        let mut simulation = Simulation::new(
            spread(4),
            vec![1.0; 4],
            &[],
            vec2(5.0, 5.0),
            SimulationConfig::default(),
        );
        let mut ticks = 0;
        while simulation.step() {
            ticks += 1;
            assert!(ticks < 1_000);
        }
        assert!(!simulation.is_running());
        simulation.stop();
        assert!(!simulation.is_running());
        assert!(!simulation.step());
    }

    #[test]
    fn pinned_bodies_stay_put() {
        let mut simulation = Simulation::new(
            spread(3),
            vec![1.0; 3],
            &[],
            Vec2::ZERO,
            SimulationConfig::default(),
        );
        simulation.fix(1, vec2(40.0, -20.0));
        for _ in 0..10 {
            simulation.tick();
        }
        assert_eq!(simulation.positions()[1], vec2(40.0, -20.0));
        simulation.release(1);
        assert!(!simulation.is_fixed(1));
    }

    #[test]
    fn alpha_target_keeps_a_dragged_simulation_warm() {
        let mut simulation = Simulation::new(
            spread(2),
            vec![1.0; 2],
            &[],
            Vec2::ZERO,
            SimulationConfig::default(),
        );
        simulation.set_alpha_target(0.3);
        for _ in 0..500 {
            simulation.step();
        }
        assert!(simulation.is_running());
        assert!((simulation.alpha() - 0.3).abs() < 0.01);
    }
}
