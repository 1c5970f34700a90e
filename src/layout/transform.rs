use eframe::egui::{Pos2, Vec2, pos2};

/// Global pan/zoom: `screen = (x, y) + k * world`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub x: f32,
    pub y: f32,
    pub k: f32,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Self = Self {
        x: 0.0,
        y: 0.0,
        k: 1.0,
    };

    pub fn new(x: f32, y: f32, k: f32) -> Self {
        Self { x, y, k }
    }

    pub fn apply(self, world: Pos2) -> Pos2 {
        pos2(self.x + self.k * world.x, self.y + self.k * world.y)
    }

    pub fn invert(self, screen: Pos2) -> Pos2 {
        let k = self.k.max(f32::EPSILON);
        pos2((screen.x - self.x) / k, (screen.y - self.y) / k)
    }

    pub fn translated(self, delta: Vec2) -> Self {
        Self {
            x: self.x + delta.x,
            y: self.y + delta.y,
            k: self.k,
        }
    }

    /// Rescales by `factor` keeping the world point under `anchor` fixed on screen.
    pub fn zoomed_about(self, anchor: Pos2, factor: f32, k_range: (f32, f32)) -> Self {
        let k = (self.k * factor).clamp(k_range.0, k_range.1);
        let world = self.invert(anchor);
        Self {
            x: anchor.x - k * world.x,
            y: anchor.y - k * world.y,
            k,
        }
    }
}

/// Placement of one layout inside its parent, frozen when the layout is spawned.
///
/// `translate` is the module's position in the parent layout's local frame;
/// `parent_translate`/`parent_scale` map that frame to world space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LocalTransform {
    pub translate: Vec2,
    pub scale: f32,
    pub parent_translate: Vec2,
    pub parent_scale: f32,
}

impl Default for LocalTransform {
    fn default() -> Self {
        Self::ROOT
    }
}

impl LocalTransform {
    pub const ROOT: Self = Self {
        translate: Vec2::ZERO,
        scale: 1.0,
        parent_translate: Vec2::ZERO,
        parent_scale: 1.0,
    };

    /// World position of this layout's local origin.
    pub fn origin(&self) -> Vec2 {
        self.parent_translate + self.translate * self.parent_scale
    }

    pub fn to_world(&self, local: Vec2) -> Pos2 {
        (self.origin() + local * self.scale).to_pos2()
    }

    pub fn to_screen(&self, global: Transform, local: Vec2) -> Pos2 {
        global.apply(self.to_world(local))
    }

    pub fn to_local(&self, global: Transform, screen: Pos2) -> Vec2 {
        let world = global.invert(screen).to_vec2();
        (world - self.origin()) / self.scale.max(f32::EPSILON)
    }

    pub fn effective_k(&self, global: Transform) -> f32 {
        global.k * self.scale
    }

    /// Frame for a child layout drawn inside the module at `module_position` (local to
    /// this layout), shrunk by `scale_ratio`.
    pub fn child(&self, module_position: Vec2, scale_ratio: f32) -> Self {
        Self {
            translate: module_position,
            scale: self.scale * scale_ratio,
            parent_translate: self.origin(),
            parent_scale: self.scale,
        }
    }
}

pub fn viewport_center(width: f32, height: f32) -> Pos2 {
    pos2(width / 2.0, height / 2.0)
}

pub fn viewport_contains(width: f32, height: f32, point: Pos2) -> bool {
    (0.0..=width).contains(&point.x) && (0.0..=height).contains(&point.y)
}
