use std::collections::BTreeMap;
use std::sync::mpsc::{self, Receiver, Sender};

use eframe::egui::Pos2;
use tracing::debug;

use super::engine::{LayoutEngine, LayoutEvent};
use super::style::RenderStyle;
use super::transform::{LocalTransform, Transform};
use crate::config::NavigatorConfig;
use crate::network::{Network, NodeIndex};
use crate::tree_path::TreePath;

/// Owns every live layout, keyed by module path, and applies the events they raise.
pub struct Coordinator {
    layouts: BTreeMap<TreePath, LayoutEngine>,
    sender: Sender<LayoutEvent>,
    events: Receiver<LayoutEvent>,
    transform: Transform,
    selected: Option<(TreePath, NodeIndex)>,
}

impl Coordinator {
    /// Starts with a single initialized layout for the root module.
    pub fn new(network: &Network, config: NavigatorConfig, style: Box<dyn RenderStyle>) -> Self {
        let (sender, events) = mpsc::channel();
        let mut root = LayoutEngine::new(
            network,
            network.root(),
            LocalTransform::ROOT,
            config,
            style,
            sender.clone(),
        );
        root.init(network);

        let mut layouts = BTreeMap::new();
        layouts.insert(root.path().clone(), root);
        Self {
            layouts,
            sender,
            events,
            transform: Transform::IDENTITY,
            selected: None,
        }
    }

    pub fn transform(&self) -> Transform {
        self.transform
    }

    pub fn selected(&self) -> Option<&(TreePath, NodeIndex)> {
        self.selected.as_ref()
    }

    /// Live layouts, parents before their children.
    pub fn layouts(&self) -> impl Iterator<Item = &LayoutEngine> {
        self.layouts.values()
    }

    pub fn layout(&self, path: &TreePath) -> Option<&LayoutEngine> {
        self.layouts.get(path)
    }

    pub fn layout_count(&self) -> usize {
        self.layouts.len()
    }

    pub fn set_viewport(&mut self, width: f32, height: f32) {
        for layout in self.layouts.values_mut() {
            layout.set_viewport(width, height);
        }
    }

    /// Applies `transform` to every layout, parents first. Events are drained after each
    /// layout so a child destroyed by its parent is never visited.
    pub fn apply_transform(&mut self, network: &Network, transform: Transform) {
        self.transform = transform;
        let paths = self.layouts.keys().cloned().collect::<Vec<_>>();
        for path in paths {
            if let Some(layout) = self.layouts.get_mut(&path) {
                layout.apply_transform(network, transform);
            }
            self.pump();
        }
    }

    /// Advances every simulation one tick. Returns whether anything moved.
    pub fn tick(&mut self, network: &Network) -> bool {
        let mut moved = false;
        for layout in self.layouts.values_mut() {
            moved |= layout.tick(network);
        }
        self.pump();
        moved
    }

    /// Re-reads styling from the network, e.g. after a search changed the hit counts.
    pub fn refresh(&mut self, network: &Network) {
        for layout in self.layouts.values_mut() {
            layout.update_attributes(network);
        }
    }

    /// Deepest layout with a node under `screen`, with that node's element index.
    pub fn node_at(&self, screen: Pos2) -> Option<(TreePath, usize)> {
        self.layouts
            .iter()
            .rev()
            .find_map(|(path, layout)| layout.node_at(screen).map(|node| (path.clone(), node)))
    }

    pub fn click(&mut self, layout: &TreePath, element: usize) {
        if let Some(engine) = self.layouts.get_mut(layout) {
            engine.click(element);
        }
        self.pump();
    }

    pub fn drag_start(&mut self, layout: &TreePath, element: usize, screen: Pos2) -> bool {
        self.layouts
            .get_mut(layout)
            .is_some_and(|engine| engine.drag_start(element, screen))
    }

    pub fn drag_to(&mut self, network: &Network, screen: Pos2) {
        for engine in self.layouts.values_mut() {
            if engine.is_dragging() {
                engine.drag_to(network, screen);
            }
        }
    }

    pub fn is_dragging(&self) -> bool {
        self.layouts.values().any(LayoutEngine::is_dragging)
    }

    pub fn drag_end(&mut self) {
        for engine in self.layouts.values_mut() {
            engine.drag_end();
        }
    }

    /// Drains pending layout events.
    pub fn pump(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            match event {
                LayoutEvent::Spawned(engine) => {
                    let path = engine.path().clone();
                    self.remove_subtree(&path);
                    self.layouts.insert(path, *engine);
                }
                LayoutEvent::Destroy(path) => self.remove_subtree(&path),
                LayoutEvent::Click { layout, node } => {
                    for (path, engine) in &mut self.layouts {
                        if *path != layout {
                            engine.clear_highlight();
                        }
                    }
                    self.selected = Some((layout, node));
                }
            }
        }
    }

    fn remove_subtree(&mut self, path: &TreePath) {
        let doomed = self
            .layouts
            .keys()
            .filter(|candidate| *candidate == path || candidate.is_descendant_of(path))
            .cloned()
            .collect::<Vec<_>>();
        if doomed.is_empty() {
            return;
        }
        for candidate in doomed {
            if let Some(mut engine) = self.layouts.remove(&candidate) {
                engine.destroy();
            }
        }
        debug!(%path, remaining = self.layouts.len(), "removed layout subtree");
    }

    /// Sender for callers that want to raise events from outside a layout.
    pub fn sender(&self) -> Sender<LayoutEvent> {
        self.sender.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ftree::load_network;
    use crate::layout::style::FlowStyle;

    const NESTED: &str = "\
*Nodes 3
1:1 0.4 \"a\" 1
1:2 0.3 \"b\" 2
2 0.3 \"c\" 3
*Links undirected
*Links root 0 0 1 2
1 2 0.2
*Links 1 0.1 0.1 1 2
1 2 0.3
";

    const DEEP: &str = "\
*Nodes 3
1:1:1 0.4 \"a\" 1
1:1:2 0.3 \"b\" 2
2 0.3 \"c\" 3
*Links undirected
*Links root 0 0 1 2
1 2 0.2
*Links 1:1 0.1 0.1 1 2
1 2 0.3
";

    fn coordinator(network: &Network) -> Coordinator {
        let style = FlowStyle::for_network_module(network, network.root());
        Coordinator::new(network, NavigatorConfig::default(), Box::new(style))
    }

    #[test]
    fn starts_with_the_root_layout() {
        let network = load_network(NESTED).unwrap();
        let coordinator = coordinator(&network);
        assert_eq!(coordinator.layout_count(), 1);
        assert!(coordinator.layout(&TreePath::root()).is_some());
    }

    #[test]
    fn destroy_removes_descendant_layouts() {
        let network = load_network(NESTED).unwrap();
        let mut coordinator = coordinator(&network);
        let module = network.find_by_path_str("1").unwrap();
        let local = LocalTransform::ROOT.child(eframe::egui::Vec2::ZERO, 0.1);
        let mut child = LayoutEngine::new(
            &network,
            module,
            local,
            NavigatorConfig::default(),
            Box::new(FlowStyle::for_network_module(&network, module)),
            coordinator.sender(),
        );
        child.init(&network);
        coordinator
            .sender()
            .send(LayoutEvent::Spawned(Box::new(child)))
            .unwrap();
        coordinator.pump();
        assert_eq!(coordinator.layout_count(), 2);

        coordinator
            .sender()
            .send(LayoutEvent::Destroy("1".parse().unwrap()))
            .unwrap();
        coordinator.pump();
        assert_eq!(coordinator.layout_count(), 1);
    }

    #[test]
    fn click_selects_and_clears_other_highlights() {
        let network = load_network(NESTED).unwrap();
        let mut coordinator = coordinator(&network);
        let root = TreePath::root();
        coordinator.click(&root, 0);
        let selected = coordinator.selected().unwrap();
        assert_eq!(selected.0, root);
        assert!(coordinator.layout(&root).unwrap().nodes()[0].highlighted);
    }

    fn child_layout(network: &Network, coordinator: &Coordinator, path: &str) -> LayoutEngine {
        let module = network.find_by_path_str(path).unwrap();
        let mut child = LayoutEngine::new(
            network,
            module,
            LocalTransform::ROOT.child(eframe::egui::Vec2::ZERO, 0.1),
            NavigatorConfig::default(),
            Box::new(FlowStyle::for_network_module(network, module)),
            coordinator.sender(),
        );
        child.init(network);
        child
    }

    #[test]
    fn respawning_a_layout_drops_its_old_descendants() {
        let network = load_network(DEEP).unwrap();
        let mut coordinator = coordinator(&network);
        for path in ["1", "1:1"] {
            let child = child_layout(&network, &coordinator, path);
            coordinator
                .sender()
                .send(LayoutEvent::Spawned(Box::new(child)))
                .unwrap();
        }
        coordinator.pump();
        assert_eq!(coordinator.layout_count(), 3);

        let again = child_layout(&network, &coordinator, "1");
        coordinator
            .sender()
            .send(LayoutEvent::Spawned(Box::new(again)))
            .unwrap();
        coordinator.pump();
        assert_eq!(coordinator.layout_count(), 2);
        assert!(coordinator.layout(&"1:1".parse().unwrap()).is_none());
    }
}
