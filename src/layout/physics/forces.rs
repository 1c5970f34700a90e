use eframe::egui::{Vec2, vec2};

use super::quadtree::QuadNode;
use crate::util::stable_pair;

/// Barnes-Hut opening angle.
const THETA: f32 = 0.9;
const MIN_DISTANCE_SQ: f32 = 1.0;

#[derive(Clone, Copy)]
pub(super) struct ChargeParams {
    /// Already multiplied by alpha.
    pub(super) strength: f32,
    pub(super) max_distance_sq: f32,
}

#[derive(Clone, Copy)]
pub(super) struct CollisionParams {
    pub(super) radius: f32,
    pub(super) strength: f32,
}

/// Direction used when two points coincide, stable for a given pair.
fn separation_direction(from: usize, to: usize) -> Vec2 {
    let (x, y) = stable_pair(&(from.min(to), from.max(to)));
    let jitter = vec2(x, y);
    let direction = if jitter.length_sq() > 1e-6 {
        jitter.normalized()
    } else {
        vec2(1.0, 0.0)
    };
    if from < to { direction } else { -direction }
}

/// Velocity change from every other node's charge, approximating far cells by their
/// centre of mass.
pub(super) fn accumulate_charge_for_node(
    node: &QuadNode,
    index: usize,
    positions: &[Vec2],
    masses: &[f32],
    params: ChargeParams,
    velocity: &mut Vec2,
) {
    if node.mass <= 0.0 {
        return;
    }

    let point = positions[index];
    if node.bounds.distance_sq_to_point(point) > params.max_distance_sq {
        return;
    }

    if node.is_leaf() {
        for &other in &node.indices {
            if other == index {
                continue;
            }
            let delta = point - positions[other];
            let distance_sq = delta.length_sq();
            if distance_sq > params.max_distance_sq {
                continue;
            }
            let delta = if distance_sq < 1e-6 {
                separation_direction(index, other)
            } else {
                delta
            };
            let distance_sq = distance_sq.max(MIN_DISTANCE_SQ);
            *velocity += delta * (params.strength * masses[other] / distance_sq);
        }
        return;
    }

    let delta = point - node.center_of_mass;
    let distance_sq = delta.length_sq().max(MIN_DISTANCE_SQ);
    let can_approximate = !node.bounds.contains(point)
        && node.bounds.side_length() * node.bounds.side_length() < THETA * THETA * distance_sq;

    if can_approximate {
        if distance_sq <= params.max_distance_sq {
            *velocity += delta * (params.strength * node.mass / distance_sq);
        }
        return;
    }

    for child in node.children.iter().flatten() {
        accumulate_charge_for_node(child, index, positions, masses, params, velocity);
    }
}

/// Pushes apart every pair closer than two collision radii.
pub(super) fn accumulate_collision_pairs(
    node_a: &QuadNode,
    node_b: &QuadNode,
    same_node: bool,
    positions: &[Vec2],
    params: CollisionParams,
    velocities: &mut [Vec2],
) {
    let min_distance = params.radius * 2.0;
    if node_a.bounds.distance_sq_to(node_b.bounds) > min_distance * min_distance {
        return;
    }

    if node_a.is_leaf() && node_b.is_leaf() {
        if same_node {
            for (offset, &from) in node_a.indices.iter().enumerate() {
                for &to in &node_a.indices[offset + 1..] {
                    resolve_overlap(from, to, positions, min_distance, params.strength, velocities);
                }
            }
        } else {
            for &from in &node_a.indices {
                for &to in &node_b.indices {
                    resolve_overlap(from, to, positions, min_distance, params.strength, velocities);
                }
            }
        }
        return;
    }

    if same_node {
        for first in 0..4 {
            let Some(child_a) = node_a.children[first].as_deref() else {
                continue;
            };
            accumulate_collision_pairs(child_a, child_a, true, positions, params, velocities);
            for second in (first + 1)..4 {
                let Some(child_b) = node_a.children[second].as_deref() else {
                    continue;
                };
                accumulate_collision_pairs(child_a, child_b, false, positions, params, velocities);
            }
        }
        return;
    }

    let split_a = if node_a.is_leaf() {
        false
    } else if node_b.is_leaf() {
        true
    } else {
        node_a.bounds.half_extent >= node_b.bounds.half_extent
    };

    if split_a {
        for child in node_a.children.iter().flatten() {
            accumulate_collision_pairs(child, node_b, false, positions, params, velocities);
        }
    } else {
        for child in node_b.children.iter().flatten() {
            accumulate_collision_pairs(node_a, child, false, positions, params, velocities);
        }
    }
}

fn resolve_overlap(
    from: usize,
    to: usize,
    positions: &[Vec2],
    min_distance: f32,
    strength: f32,
    velocities: &mut [Vec2],
) {
    let delta = positions[from] - positions[to];
    let distance = delta.length();
    if distance >= min_distance {
        return;
    }
    let direction = if distance > 1e-4 {
        delta / distance
    } else {
        separation_direction(from, to)
    };
    let push = direction * ((min_distance - distance) * strength * 0.5);
    velocities[from] += push;
    velocities[to] -= push;
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Spring {
    pub source: usize,
    pub target: usize,
    pub distance: f32,
    pub strength: f32,
    /// Share of the correction applied to the target, from the endpoint degrees.
    pub(super) bias: f32,
}

/// Moves the ends of every spring toward its rest length, splitting the correction by
/// degree so hubs move less.
pub(super) fn apply_springs(
    springs: &[Spring],
    positions: &[Vec2],
    velocities: &mut [Vec2],
    alpha: f32,
) {
    for spring in springs {
        let (source, target) = (spring.source, spring.target);
        if source == target {
            continue;
        }
        let mut delta =
            positions[target] + velocities[target] - positions[source] - velocities[source];
        let mut distance = delta.length();
        if distance < 1e-4 {
            delta = separation_direction(source, target);
            distance = 1.0;
        }
        let correction = delta * ((distance - spring.distance) / distance * alpha * spring.strength);
        velocities[target] -= correction * spring.bias;
        velocities[source] += correction * (1.0 - spring.bias);
    }
}

pub(super) fn apply_centering(
    positions: &[Vec2],
    velocities: &mut [Vec2],
    anchor: Vec2,
    strength: f32,
) {
    for (position, velocity) in positions.iter().zip(velocities.iter_mut()) {
        *velocity += (anchor - *position) * strength;
    }
}
