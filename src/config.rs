use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1440.0,
            height: 920.0,
        }
    }
}

impl Viewport {
    pub fn min_side(self) -> f32 {
        self.width.min(self.height)
    }
}

/// Force parameters of one module's simulation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub collision_radius: f32,
    pub collision_strength: f32,
    pub charge: f32,
    pub max_charge_distance: f32,
    /// Rest length for the heaviest link, then for the lightest one.
    pub link_distance: (f32, f32),
    /// Spring strength for the lightest link, then for the heaviest one.
    pub link_strength: (f32, f32),
    pub center_strength: f32,
    pub velocity_decay: f32,
    pub alpha_min: f32,
    pub alpha_decay_ticks: u32,
    pub prewarm_ticks: u32,
    pub drag_alpha_target: f32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            collision_radius: 70.0,
            collision_strength: 0.7,
            charge: 300.0,
            max_charge_distance: 400.0,
            link_distance: (100.0, 250.0),
            link_strength: (0.5, 1.0),
            center_strength: 0.1,
            velocity_decay: 0.4,
            alpha_min: 0.001,
            alpha_decay_ticks: 100,
            prewarm_ticks: 60,
            drag_alpha_target: 0.3,
        }
    }
}

impl SimulationConfig {
    /// Per-tick decay that brings alpha from 1 to `alpha_min` in `alpha_decay_ticks` ticks.
    pub fn alpha_decay(&self) -> f32 {
        let ticks = self.alpha_decay_ticks.max(1) as f32;
        1.0 - self.alpha_min.clamp(1e-6, 1.0).powf(1.0 / ticks)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkPolicy {
    #[default]
    Rank,
    Backbone,
}

/// Zoom thresholds for culling, labels, deep zoom styling and child spawning.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LodConfig {
    pub policy: LinkPolicy,
    pub always_visible_links: usize,
    pub link_zoom: (f32, f32),
    pub label_zoom: (f32, f32),
    pub deep_zoom: (f32, f32),
    pub focus_zoom: (f32, f32),
    pub focus_radius: f32,
    pub spawn_zoom: f32,
    pub destroy_zoom: f32,
    pub child_layout_radius: f32,
}

impl Default for LodConfig {
    fn default() -> Self {
        Self {
            policy: LinkPolicy::Rank,
            always_visible_links: 5,
            link_zoom: (0.55, 1.7),
            label_zoom: (0.65, 1.0),
            deep_zoom: (1.5, 6.5),
            focus_zoom: (9.0, 15.0),
            focus_radius: 200.0,
            spawn_zoom: 2.0,
            destroy_zoom: 4.0,
            child_layout_radius: 600.0,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigatorConfig {
    pub viewport: Viewport,
    pub simulation: SimulationConfig,
    pub lod: LodConfig,
}

impl NavigatorConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("invalid config file {}", path.display()))
    }
}
