use eframe::egui::pos2;

use flow_navigator::config::NavigatorConfig;
use flow_navigator::ftree::load_network;
use flow_navigator::layout::{Coordinator, FlowStyle, Transform};
use flow_navigator::network::Network;
use flow_navigator::tree_path::TreePath;

// one module carrying most of the flow next to a single top level leaf
const NETWORK: &str = "\
*Nodes 3
1:1 0.5 \"a\" 1
1:2 0.3 \"b\" 2
2 0.2 \"c\" 3
*Links directed
*Links root 0 0 2 2
1 2 0.15
2 1 0.1
*Links 1 0.1 0.15 2 2
1 2 0.4
2 1 0.2
";

fn coordinator(network: &Network) -> Coordinator {
    let style = FlowStyle::for_network_module(network, network.root());
    Coordinator::new(network, NavigatorConfig::default(), Box::new(style))
}

fn module_path() -> TreePath {
    "1".parse().unwrap()
}

/// Global transform placing the module's center at screen `(x, y)` with zoom `k`.
fn module_at(coordinator: &Coordinator, x: f32, y: f32, k: f32) -> Transform {
    let root = coordinator.layout(&TreePath::root()).unwrap();
    let module = root
        .nodes()
        .iter()
        .find(|node| node.path == module_path())
        .unwrap();
    let world = root.local_transform().to_world(module.position);
    Transform::new(x - k * world.x, y - k * world.y, k)
}

fn centered(coordinator: &Coordinator, k: f32) -> Transform {
    module_at(coordinator, 720.0, 460.0, k)
}

fn off_screen(coordinator: &Coordinator, k: f32) -> Transform {
    module_at(coordinator, -5000.0, -5000.0, k)
}

#[test]
fn overview_zoom_keeps_a_single_layout() {
    let network = load_network(NETWORK).unwrap();
    let mut coordinator = coordinator(&network);
    let transform = centered(&coordinator, 1.0);
    coordinator.apply_transform(&network, transform);
    assert_eq!(coordinator.layout_count(), 1);
}

#[test]
fn spawn_and_destroy_follow_zoom_hysteresis() {
    let network = load_network(NETWORK).unwrap();
    let mut coordinator = coordinator(&network);

    // screen radius 70 * 3.5 covers a quarter of the 920px short side
    let transform = centered(&coordinator, 3.5);
    coordinator.apply_transform(&network, transform);
    assert_eq!(coordinator.layout_count(), 2);
    assert!(coordinator.layout(&module_path()).is_some());

    for k in [3.9, 3.4, 3.9, 3.4] {
        let transform = centered(&coordinator, k);
        coordinator.apply_transform(&network, transform);
        assert_eq!(coordinator.layout_count(), 2, "k = {k}");
    }

    let transform = off_screen(&coordinator, 5.0);
    coordinator.apply_transform(&network, transform);
    assert!(
        coordinator.layout(&module_path()).is_some(),
        "deep zoom keeps the child even off screen"
    );

    let transform = off_screen(&coordinator, 3.9);
    coordinator.apply_transform(&network, transform);
    assert!(coordinator.layout(&module_path()).is_none());

    let transform = centered(&coordinator, 3.5);
    coordinator.apply_transform(&network, transform);
    assert!(coordinator.layout(&module_path()).is_some());
}

#[test]
fn zooming_out_drops_the_child() {
    let network = load_network(NETWORK).unwrap();
    let mut coordinator = coordinator(&network);

    let transform = centered(&coordinator, 3.5);
    coordinator.apply_transform(&network, transform);
    assert_eq!(coordinator.layout_count(), 2);

    let transform = centered(&coordinator, 1.8);
    coordinator.apply_transform(&network, transform);
    assert_eq!(coordinator.layout_count(), 1);
}

#[test]
fn child_layout_nodes_hit_before_the_parent() {
    let network = load_network(NETWORK).unwrap();
    let mut coordinator = coordinator(&network);
    let transform = centered(&coordinator, 3.5);
    coordinator.apply_transform(&network, transform);

    let child = coordinator.layout(&module_path()).unwrap();
    let leaf = &child.nodes()[0];
    let hit = coordinator.node_at(leaf.screen_position);
    assert_eq!(hit.map(|(path, _)| path), Some(module_path()));

    let far = coordinator.node_at(pos2(-100_000.0, -100_000.0));
    assert!(far.is_none());
}

#[test]
fn child_layouts_are_zoomed_out_relative_to_the_global_view() {
    let network = load_network(NETWORK).unwrap();
    let mut coordinator = coordinator(&network);
    let transform = centered(&coordinator, 3.5);
    coordinator.apply_transform(&network, transform);

    let child = coordinator.layout(&module_path()).unwrap();
    assert!(child.effective_k() < 3.5);
    assert!(child.effective_k() > 0.0);
}
