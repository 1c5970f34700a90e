use std::collections::{BTreeSet, HashMap};
use std::sync::mpsc::Sender;

use eframe::egui::{Color32, Pos2, Vec2};
use tracing::{debug, trace};

use super::geometry::{Circle, LinkEnds, LinkPath, LinkShape, directed_link, undirected_link};
use super::lod;
use super::physics::{Simulation, SpringSpec, phyllotaxis};
use super::style::{RenderStyle, blend_color};
use super::transform::{LocalTransform, Transform, viewport_center, viewport_contains};
use crate::config::NavigatorConfig;
use crate::network::{LinkRef, Network, NodeIndex};
use crate::tree_path::TreePath;

/// Notifications a layout raises for whoever owns the set of live layouts.
pub enum LayoutEvent {
    /// A child module crossed the spawn threshold; its layout is initialized already.
    Spawned(Box<LayoutEngine>),
    /// The layout at this path, and everything below it, should go away.
    Destroy(TreePath),
    /// A node was clicked in the layout at `layout`.
    Click { layout: TreePath, node: NodeIndex },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayoutState {
    Created,
    Initialized,
    Destroyed,
}

/// Render state of one child node of the laid out module.
#[derive(Clone, Debug)]
pub struct NodeElement {
    pub node: NodeIndex,
    pub path: TreePath,
    pub is_module: bool,
    pub flow: f64,
    pub label: String,
    /// Position in the layout's local frame, owned by the simulation.
    pub position: Vec2,
    pub base_radius: f32,
    /// Radius after deep zoom emphasis, local units.
    pub radius: f32,
    pub fill: Color32,
    pub border_color: Color32,
    pub border_width: f32,
    pub label_visible: bool,
    pub highlighted: bool,
    pub search_hits: usize,
    pub screen_position: Pos2,
    pub screen_radius: f32,
}

#[derive(Clone, Debug)]
pub struct LinkElement {
    pub link: LinkRef,
    pub source: usize,
    pub target: usize,
    pub flow: f64,
    /// Element index of the link running the other way, when it is laid out too.
    pub opposite: Option<usize>,
    pub visible: bool,
    pub width: f32,
    pub color: Color32,
    /// Screen space outline; `None` when the ends overlap.
    pub shape: Option<LinkShape>,
}

impl LinkElement {
    pub fn path(&self) -> LinkPath {
        self.shape
            .map(|shape| shape.path())
            .unwrap_or_default()
    }
}

/// Lays out the direct children of one module and decides, on every transform, which of
/// them get a layout of their own.
pub struct LayoutEngine {
    module: NodeIndex,
    path: TreePath,
    directed: bool,
    state: LayoutState,
    local: LocalTransform,
    transform: Transform,
    config: NavigatorConfig,
    style: Box<dyn RenderStyle>,
    simulation: Option<Simulation>,
    nodes: Vec<NodeElement>,
    links: Vec<LinkElement>,
    spawned: BTreeSet<usize>,
    frozen: bool,
    dragging: Option<usize>,
    events: Sender<LayoutEvent>,
}

impl LayoutEngine {
    pub fn new(
        network: &Network,
        module: NodeIndex,
        local: LocalTransform,
        config: NavigatorConfig,
        style: Box<dyn RenderStyle>,
        events: Sender<LayoutEvent>,
    ) -> Self {
        Self {
            module,
            path: network.node(module).path.clone(),
            directed: network.is_directed(),
            state: LayoutState::Created,
            local,
            transform: Transform::IDENTITY,
            config,
            style,
            simulation: None,
            nodes: Vec::new(),
            links: Vec::new(),
            spawned: BTreeSet::new(),
            frozen: false,
            dragging: None,
            events,
        }
    }

    pub fn module(&self) -> NodeIndex {
        self.module
    }

    pub fn path(&self) -> &TreePath {
        &self.path
    }

    pub fn state(&self) -> LayoutState {
        self.state
    }

    pub fn local_transform(&self) -> &LocalTransform {
        &self.local
    }

    pub fn effective_k(&self) -> f32 {
        self.local.effective_k(self.transform)
    }

    pub fn nodes(&self) -> &[NodeElement] {
        &self.nodes
    }

    pub fn links(&self) -> &[LinkElement] {
        &self.links
    }

    pub fn is_directed(&self) -> bool {
        self.directed
    }

    pub fn is_spawned(&self, element: usize) -> bool {
        self.spawned.contains(&element)
    }

    pub fn is_simulating(&self) -> bool {
        self.simulation
            .as_ref()
            .is_some_and(Simulation::is_running)
    }

    pub fn set_viewport(&mut self, width: f32, height: f32) {
        self.config.viewport.width = width;
        self.config.viewport.height = height;
    }

    /// Builds render elements for the rendered children and links, then settles the
    /// simulation before the first frame.
    pub fn init(&mut self, network: &Network) {
        if self.state != LayoutState::Created {
            return;
        }

        let children = network
            .children(self.module)
            .filter(|child| network.node(*child).should_render)
            .collect::<Vec<_>>();

        self.nodes = children
            .iter()
            .enumerate()
            .map(|(index, child)| {
                let node = network.node(*child);
                let radius = self.style.node_radius(node);
                NodeElement {
                    node: *child,
                    path: node.path.clone(),
                    is_module: !node.is_leaf(),
                    flow: node.flow,
                    label: network.name(*child).into_owned(),
                    position: phyllotaxis(index),
                    base_radius: radius,
                    radius,
                    fill: self.style.node_fill_color(node),
                    border_color: self.style.node_border_color(node),
                    border_width: self.style.node_border_width(node),
                    label_visible: false,
                    highlighted: false,
                    search_hits: node.search_hits,
                    screen_position: Pos2::ZERO,
                    screen_radius: radius,
                }
            })
            .collect();

        let element_of = children
            .iter()
            .enumerate()
            .map(|(element, child)| (*child, element))
            .collect::<HashMap<_, _>>();
        self.links = network
            .link_refs(self.module)
            .filter_map(|link_ref| {
                let link = network.link(link_ref)?;
                if !link.should_render {
                    return None;
                }
                Some(LinkElement {
                    link: link_ref,
                    source: *element_of.get(&link.source)?,
                    target: *element_of.get(&link.target)?,
                    flow: link.flow,
                    opposite: None,
                    visible: true,
                    width: self.style.link_width(link),
                    color: self.style.link_fill_color(link),
                    shape: None,
                })
            })
            .collect();

        let link_elements = self
            .links
            .iter()
            .enumerate()
            .map(|(element, link)| (link.link, element))
            .collect::<HashMap<_, _>>();
        for element in &mut self.links {
            element.opposite = network
                .opposite_link(element.link)
                .and_then(|opposite| link_elements.get(&opposite).copied());
        }

        let max_flow = self.nodes.iter().map(|node| node.flow).fold(0.0, f64::max);
        let masses = self
            .nodes
            .iter()
            .map(|node| {
                if max_flow > 0.0 {
                    1.0 + 4.0 * (node.flow / max_flow) as f32
                } else {
                    1.0
                }
            })
            .collect();

        let (min_link, max_link) = self
            .links
            .iter()
            .fold((f64::INFINITY, 0.0_f64), |(low, high), link| {
                (low.min(link.flow), high.max(link.flow))
            });
        let springs = self
            .links
            .iter()
            .map(|link| SpringSpec {
                source: link.source,
                target: link.target,
                weight: if max_link - min_link > f64::EPSILON {
                    ((link.flow - min_link) / (max_link - min_link)) as f32
                } else {
                    0.5
                },
            })
            .collect::<Vec<_>>();

        let mut simulation = Simulation::new(
            self.nodes.iter().map(|node| node.position).collect(),
            masses,
            &springs,
            Vec2::ZERO,
            self.config.simulation,
        );
        simulation.prewarm();
        self.sync_positions(&simulation);
        self.simulation = Some(simulation);

        self.state = LayoutState::Initialized;
        debug!(
            path = %self.path,
            nodes = self.nodes.len(),
            links = self.links.len(),
            "initialized layout"
        );
        self.update_attributes(network);
    }

    fn sync_positions(&mut self, simulation: &Simulation) {
        for (node, position) in self.nodes.iter_mut().zip(simulation.positions()) {
            node.position = *position;
        }
    }

    /// One simulation tick. Returns whether anything moved.
    pub fn tick(&mut self, network: &Network) -> bool {
        if self.state != LayoutState::Initialized {
            return false;
        }
        let Some(mut simulation) = self.simulation.take() else {
            return false;
        };
        let moved = simulation.step();
        if moved {
            self.sync_positions(&simulation);
        }
        self.simulation = Some(simulation);
        if moved {
            self.update_attributes(network);
        }
        moved
    }

    /// Reacts to a new global pan/zoom: level of detail, deep zoom styling, then child
    /// spawning and destruction.
    pub fn apply_transform(&mut self, network: &Network, transform: Transform) {
        if self.state != LayoutState::Initialized {
            return;
        }
        self.restyle(network, transform);
        self.update_children(network);
    }

    /// Everything `apply_transform` does except spawning and destroying children.
    fn restyle(&mut self, network: &Network, transform: Transform) {
        self.transform = transform;
        let k = self.effective_k();
        let lod_config = self.config.lod;

        // child layouts are pinned to where their module was when they spawned
        if k > lod_config.deep_zoom.0 || !self.spawned.is_empty() {
            self.freeze();
        } else if self.frozen {
            if let Some(simulation) = self.simulation.as_mut() {
                simulation.resume();
            }
            self.frozen = false;
        }

        let link_inputs = self
            .links
            .iter()
            .map(|link| (link.source, link.flow))
            .collect::<Vec<_>>();
        for (link, visible) in self
            .links
            .iter_mut()
            .zip(lod::link_visibility(&link_inputs, k, &lod_config))
        {
            link.visible = visible;
        }

        let flows = self.nodes.iter().map(|node| node.flow).collect::<Vec<_>>();
        for (node, visible) in self
            .nodes
            .iter_mut()
            .zip(lod::label_visibility(&flows, k, &lod_config))
        {
            node.label_visible = visible;
        }

        self.update_attributes(network);
    }

    fn freeze(&mut self) {
        if self.frozen {
            return;
        }
        if let Some(simulation) = self.simulation.as_mut() {
            simulation.stop();
        }
        self.release_drag();
        self.frozen = true;
        trace!(path = %self.path, k = self.effective_k(), "froze layout");
    }

    fn spawn_eligible(&self, element: usize) -> bool {
        let node = &self.nodes[element];
        let viewport = self.config.viewport;
        node.is_module
            && node.screen_radius > viewport.min_side() / 4.0
            && viewport_contains(viewport.width, viewport.height, node.screen_position)
    }

    fn update_children(&mut self, network: &Network) {
        let global_k = self.transform.k;
        let lod_config = self.config.lod;

        let spawned = self.spawned.iter().copied().collect::<Vec<_>>();
        for element in spawned {
            let keep = self.spawn_eligible(element) && global_k > lod_config.spawn_zoom;
            if global_k < lod_config.destroy_zoom && !keep {
                self.destroy_child(element);
            }
        }

        if global_k <= lod_config.spawn_zoom {
            return;
        }
        for element in 0..self.nodes.len() {
            if !self.spawned.contains(&element) && self.spawn_eligible(element) {
                self.spawn_child(network, element);
            }
        }
    }

    fn spawn_child(&mut self, network: &Network, element: usize) {
        let node = &self.nodes[element];
        let local = self.local.child(
            node.position,
            node.base_radius / self.config.lod.child_layout_radius,
        );
        let mut child = LayoutEngine::new(
            network,
            node.node,
            local,
            self.config,
            self.style.for_module(network, node.node),
            self.events.clone(),
        );
        child.init(network);
        // grandchildren wait for the next transform so the owner sees this layout first
        child.restyle(network, self.transform);

        debug!(parent = %self.path, path = %child.path, "spawned child layout");
        self.freeze();
        self.spawned.insert(element);
        let _ = self.events.send(LayoutEvent::Spawned(Box::new(child)));
    }

    fn destroy_child(&mut self, element: usize) {
        if !self.spawned.remove(&element) {
            return;
        }
        let path = self.nodes[element].path.clone();
        debug!(parent = %self.path, %path, "destroying child layout");
        let _ = self.events.send(LayoutEvent::Destroy(path));
    }

    /// Recomputes styling and screen geometry from the current positions and transform.
    pub fn update_attributes(&mut self, network: &Network) {
        if self.state != LayoutState::Initialized {
            return;
        }
        let k = self.effective_k();
        let lod_config = self.config.lod;
        let fade = lod::fill_fade(k, &lod_config);

        for element in &mut self.nodes {
            let node = network.node(element.node);
            element.base_radius = self.style.node_radius(node);
            element.radius = element.base_radius;
            let fill = self.style.node_fill_color(node);
            element.fill = if element.is_module {
                blend_color(fill, Color32::WHITE, fade)
            } else {
                fill
            };
            element.border_color = self.style.node_border_color(node);
            element.border_width = self.style.node_border_width(node);
            element.search_hits = node.search_hits;
            element.screen_position = self.local.to_screen(self.transform, element.position);
        }

        if let Some(progress) = lod::focus_progress(k, &lod_config) {
            let viewport = self.config.viewport;
            let center = viewport_center(viewport.width, viewport.height);
            let focused = lod::nearest_to(
                self.nodes.iter().map(|node| node.screen_position),
                center,
            );
            if let Some(focused) = focused {
                let element = &mut self.nodes[focused];
                element.radius = lod::focus_radius(element.base_radius, progress, &lod_config);
            }
        }

        for element in &mut self.nodes {
            element.screen_radius = element.radius * k;
        }

        for index in 0..self.links.len() {
            let Some(link) = network.link(self.links[index].link) else {
                continue;
            };
            let width = self.style.link_width(link);
            let color = self.style.link_fill_color(link);

            let element = &self.links[index];
            let source = &self.nodes[element.source];
            let target = &self.nodes[element.target];
            let gap = (target.position - source.position).length() - source.radius - target.radius;
            let bend = self.style.link_bend(link, gap);
            let opposite_width = element
                .opposite
                .filter(|opposite| self.links[*opposite].visible)
                .map(|opposite| self.links[opposite].width * k);

            let ends = LinkEnds {
                source: Circle {
                    center: source.screen_position,
                    radius: source.screen_radius,
                },
                target: Circle {
                    center: target.screen_position,
                    radius: target.screen_radius,
                },
                width: width * k,
                bend: bend * k,
                opposite_width,
            };
            let shape = if self.directed {
                directed_link(&ends)
            } else {
                undirected_link(&ends)
            };

            let element = &mut self.links[index];
            element.width = width;
            element.color = color;
            element.shape = shape;
        }
    }

    /// Stops the simulation and drops every render element. Safe to call twice.
    pub fn destroy(&mut self) {
        if self.state == LayoutState::Destroyed {
            return;
        }
        if let Some(simulation) = self.simulation.as_mut() {
            simulation.stop();
        }
        for element in std::mem::take(&mut self.spawned) {
            let _ = self
                .events
                .send(LayoutEvent::Destroy(self.nodes[element].path.clone()));
        }
        self.nodes.clear();
        self.links.clear();
        self.dragging = None;
        self.state = LayoutState::Destroyed;
        debug!(path = %self.path, "destroyed layout");
    }

    /// Topmost node under a screen point.
    pub fn node_at(&self, screen: Pos2) -> Option<usize> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.screen_position.distance(screen) <= node.screen_radius)
            .min_by(|a, b| {
                a.1.screen_position
                    .distance(screen)
                    .total_cmp(&b.1.screen_position.distance(screen))
            })
            .map(|(index, _)| index)
    }

    /// Highlights `element` and tells the owner so other layouts can drop theirs.
    pub fn click(&mut self, element: usize) {
        if self.state != LayoutState::Initialized || element >= self.nodes.len() {
            return;
        }
        for (index, node) in self.nodes.iter_mut().enumerate() {
            node.highlighted = index == element;
        }
        let _ = self.events.send(LayoutEvent::Click {
            layout: self.path.clone(),
            node: self.nodes[element].node,
        });
    }

    pub fn clear_highlight(&mut self) {
        for node in &mut self.nodes {
            node.highlighted = false;
        }
    }

    /// Pins `element` under the pointer. Refused while the layout is frozen for deep zoom.
    pub fn drag_start(&mut self, element: usize, screen: Pos2) -> bool {
        if self.state != LayoutState::Initialized || self.frozen || element >= self.nodes.len()
        {
            return false;
        }
        let Some(simulation) = self.simulation.as_mut() else {
            return false;
        };
        let local = self.local.to_local(self.transform, screen);
        simulation.set_alpha_target(self.config.simulation.drag_alpha_target);
        simulation.resume();
        simulation.fix(element, local);
        self.nodes[element].position = local;
        self.dragging = Some(element);
        true
    }

    pub fn drag_to(&mut self, network: &Network, screen: Pos2) {
        let Some(element) = self.dragging else {
            return;
        };
        let local = self.local.to_local(self.transform, screen);
        if let Some(simulation) = self.simulation.as_mut() {
            simulation.fix(element, local);
        }
        self.nodes[element].position = local;
        self.update_attributes(network);
    }

    pub fn drag_end(&mut self) {
        self.release_drag();
    }

    fn release_drag(&mut self) {
        let Some(element) = self.dragging.take() else {
            return;
        };
        if let Some(simulation) = self.simulation.as_mut() {
            simulation.release(element);
            simulation.set_alpha_target(0.0);
        }
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging.is_some()
    }
}
