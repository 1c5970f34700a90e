use eframe::egui::{Vec2, vec2};

const QUADTREE_LEAF_CAPACITY: usize = 8;
const QUADTREE_MAX_DEPTH: usize = 10;

#[derive(Clone, Copy, Debug)]
pub(super) struct QuadBounds {
    pub(super) center: Vec2,
    pub(super) half_extent: f32,
}

impl QuadBounds {
    fn from_points(points: &[Vec2]) -> Option<Self> {
        let mut min = vec2(f32::INFINITY, f32::INFINITY);
        let mut max = vec2(f32::NEG_INFINITY, f32::NEG_INFINITY);

        for point in points {
            min = min.min(*point);
            max = max.max(*point);
        }

        if !min.x.is_finite() || !min.y.is_finite() || !max.x.is_finite() || !max.y.is_finite() {
            return None;
        }

        let span = (max - min).max(vec2(1.0, 1.0));
        Some(Self {
            center: (min + max) * 0.5,
            half_extent: span.max_elem() * 0.5 + 1.0,
        })
    }

    pub(super) fn contains(self, point: Vec2) -> bool {
        (point.x - self.center.x).abs() <= self.half_extent
            && (point.y - self.center.y).abs() <= self.half_extent
    }

    fn child(self, quadrant: usize) -> Self {
        let quarter = self.half_extent * 0.5;
        let offset = match quadrant {
            0 => vec2(-quarter, -quarter),
            1 => vec2(quarter, -quarter),
            2 => vec2(-quarter, quarter),
            _ => vec2(quarter, quarter),
        };
        Self {
            center: self.center + offset,
            half_extent: quarter,
        }
    }

    fn quadrant_for(self, point: Vec2) -> usize {
        match (point.x >= self.center.x, point.y >= self.center.y) {
            (false, false) => 0,
            (true, false) => 1,
            (false, true) => 2,
            (true, true) => 3,
        }
    }

    pub(super) fn side_length(self) -> f32 {
        self.half_extent * 2.0
    }

    pub(super) fn distance_sq_to(self, other: Self) -> f32 {
        let reach = self.half_extent + other.half_extent;
        let dx = ((self.center.x - other.center.x).abs() - reach).max(0.0);
        let dy = ((self.center.y - other.center.y).abs() - reach).max(0.0);
        dx * dx + dy * dy
    }

    pub(super) fn distance_sq_to_point(self, point: Vec2) -> f32 {
        let dx = ((point.x - self.center.x).abs() - self.half_extent).max(0.0);
        let dy = ((point.y - self.center.y).abs() - self.half_extent).max(0.0);
        dx * dx + dy * dy
    }
}

/// Barnes-Hut cell; `mass` is the summed charge weight of the points below it.
pub(super) struct QuadNode {
    pub(super) bounds: QuadBounds,
    pub(super) center_of_mass: Vec2,
    pub(super) mass: f32,
    pub(super) indices: Vec<usize>,
    pub(super) children: [Option<Box<QuadNode>>; 4],
}

impl QuadNode {
    pub(super) fn build(positions: &[Vec2], masses: &[f32]) -> Option<Self> {
        let bounds = QuadBounds::from_points(positions)?;
        let indices = (0..positions.len()).collect::<Vec<_>>();
        Some(Self::build_node(bounds, indices, positions, masses, 0))
    }

    fn build_node(
        bounds: QuadBounds,
        indices: Vec<usize>,
        positions: &[Vec2],
        masses: &[f32],
        depth: usize,
    ) -> Self {
        let mut weighted = Vec2::ZERO;
        let mut mass = 0.0;
        for &index in &indices {
            let weight = masses[index];
            weighted += positions[index] * weight;
            mass += weight;
        }
        let center_of_mass = if mass > 0.0 {
            weighted / mass
        } else {
            bounds.center
        };

        let mut node = Self {
            bounds,
            center_of_mass,
            mass,
            indices,
            children: std::array::from_fn(|_| None),
        };

        if depth >= QUADTREE_MAX_DEPTH || node.indices.len() <= QUADTREE_LEAF_CAPACITY {
            return node;
        }

        let mut buckets = std::array::from_fn::<_, 4, _>(|_| Vec::new());
        for &index in &node.indices {
            buckets[bounds.quadrant_for(positions[index])].push(index);
        }

        if buckets.iter().filter(|bucket| !bucket.is_empty()).count() <= 1 {
            return node;
        }

        for (quadrant, bucket) in buckets.into_iter().enumerate() {
            if bucket.is_empty() {
                continue;
            }
            node.children[quadrant] = Some(Box::new(Self::build_node(
                bounds.child(quadrant),
                bucket,
                positions,
                masses,
                depth + 1,
            )));
        }
        node.indices.clear();
        node
    }

    pub(super) fn is_leaf(&self) -> bool {
        self.children.iter().all(Option::is_none)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn center_of_mass_is_weighted() {
        let positions = [vec2(0.0, 0.0), vec2(10.0, 0.0)];
        let tree = QuadNode::build(&positions, &[1.0, 3.0]).unwrap();
        assert_eq!(tree.mass, 4.0);
        assert!((tree.center_of_mass.x - 7.5).abs() < 1e-5);
    }

    #[test]
    fn splits_crowded_cells() {
        let positions = (0..40)
            .map(|index| vec2((index % 7) as f32 * 13.0, (index / 7) as f32 * 17.0))
            .collect::<Vec<_>>();
        let masses = vec![1.0; positions.len()];
        let tree = QuadNode::build(&positions, &masses).unwrap();
        assert!(!tree.is_leaf());
        assert!(tree.indices.is_empty());
        assert_eq!(tree.mass, 40.0);
    }

    #[test]
    fn empty_input_has_no_tree() {
        assert!(QuadNode::build(&[], &[]).is_none());
    }
}
