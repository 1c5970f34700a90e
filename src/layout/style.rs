use eframe::egui::Color32;

use crate::network::{Link, Network, Node, NodeIndex};

/// Visual encoding of flow, consulted by a layout on every redraw.
pub trait RenderStyle {
    fn node_radius(&self, node: &Node) -> f32;
    fn node_fill_color(&self, node: &Node) -> Color32;
    fn node_border_color(&self, node: &Node) -> Color32;
    fn node_border_width(&self, node: &Node) -> f32;
    fn link_fill_color(&self, link: &Link) -> Color32;
    fn link_width(&self, link: &Link) -> f32;
    /// Sideways displacement of a link's midpoint given the free gap between its ends.
    fn link_bend(&self, link: &Link, gap: f32) -> f32;

    /// Style for the layout of a child module.
    fn for_module(&self, network: &Network, module: NodeIndex) -> Box<dyn RenderStyle>;
}

pub fn blend_color(base: Color32, overlay: Color32, amount: f32) -> Color32 {
    let amount = amount.clamp(0.0, 1.0);
    let inverse = 1.0 - amount;
    let mix = |a: u8, b: u8| ((a as f32 * inverse) + (b as f32 * amount)).round() as u8;

    Color32::from_rgba_unmultiplied(
        mix(base.r(), overlay.r()),
        mix(base.g(), overlay.g()),
        mix(base.b(), overlay.b()),
        mix(base.a(), overlay.a()),
    )
}

fn ratio(value: f64, max: f64) -> f32 {
    if max <= 0.0 {
        return 0.0;
    }
    (value / max).clamp(0.0, 1.0) as f32
}

/// Scales derived from the largest flows inside one module.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FlowStyle {
    max_node_flow: f64,
    max_node_exit_flow: f64,
    max_link_flow: f64,
}

impl FlowStyle {
    const RADIUS: (f32, f32) = (10.0, 70.0);
    const LINK_WIDTH: (f32, f32) = (2.0, 15.0);
    const BORDER_WIDTH: (f32, f32) = (1.0, 6.0);
    const MAX_BEND: f32 = 30.0;

    const LOW_FILL: Color32 = Color32::from_rgb(253, 230, 200);
    const HIGH_FILL: Color32 = Color32::from_rgb(222, 92, 30);
    const LOW_BORDER: Color32 = Color32::from_rgb(200, 170, 140);
    const HIGH_BORDER: Color32 = Color32::from_rgb(120, 40, 10);
    const LOW_LINK: Color32 = Color32::from_rgb(160, 190, 220);
    const HIGH_LINK: Color32 = Color32::from_rgb(30, 90, 160);

    pub fn new(max_node_flow: f64, max_node_exit_flow: f64, max_link_flow: f64) -> Self {
        Self {
            max_node_flow,
            max_node_exit_flow,
            max_link_flow,
        }
    }

    pub fn for_network_module(network: &Network, module: NodeIndex) -> Self {
        let aggregates = network.aggregates(module);
        Self::new(
            aggregates.max_node_flow,
            aggregates.max_node_exit_flow,
            aggregates.max_link_flow,
        )
    }

    fn flow_t(&self, node: &Node) -> f32 {
        ratio(node.flow, self.max_node_flow).sqrt()
    }
}

impl RenderStyle for FlowStyle {
    fn node_radius(&self, node: &Node) -> f32 {
        let (low, high) = Self::RADIUS;
        low + (high - low) * self.flow_t(node)
    }

    fn node_fill_color(&self, node: &Node) -> Color32 {
        blend_color(Self::LOW_FILL, Self::HIGH_FILL, self.flow_t(node))
    }

    fn node_border_color(&self, node: &Node) -> Color32 {
        let t = ratio(node.exit_flow, self.max_node_exit_flow);
        blend_color(Self::LOW_BORDER, Self::HIGH_BORDER, t)
    }

    fn node_border_width(&self, node: &Node) -> f32 {
        let (low, high) = Self::BORDER_WIDTH;
        low + (high - low) * ratio(node.exit_flow, self.max_node_exit_flow)
    }

    fn link_fill_color(&self, link: &Link) -> Color32 {
        blend_color(Self::LOW_LINK, Self::HIGH_LINK, ratio(link.flow, self.max_link_flow))
    }

    fn link_width(&self, link: &Link) -> f32 {
        let (low, high) = Self::LINK_WIDTH;
        low + (high - low) * ratio(link.flow, self.max_link_flow)
    }

    fn link_bend(&self, _link: &Link, gap: f32) -> f32 {
        (gap.max(0.0) * 0.1).min(Self::MAX_BEND)
    }

    fn for_module(&self, network: &Network, module: NodeIndex) -> Box<dyn RenderStyle> {
        Box::new(Self::for_network_module(network, module))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ftree::load_network;

    #[test]
    fn blend_reaches_both_ends() {
        let black = Color32::BLACK;
        let white = Color32::WHITE;
        assert_eq!(blend_color(black, white, 0.0), black);
        assert_eq!(blend_color(black, white, 1.0), white);
        assert_eq!(blend_color(black, white, 3.0), white);
    }

    #[test]
    fn heavier_nodes_are_larger() {
        let network = load_network(
            "1 0.75 \"a\" 1\n2 0.25 \"b\" 2\n*Links directed\n*Links root 0 0 1 2\n1 2 0.5\n",
        )
        .unwrap();
        let style = FlowStyle::for_network_module(&network, network.root());
        let root = network.root();
        let children = network.children(root).collect::<Vec<_>>();
        let heavy = style.node_radius(network.node(children[0]));
        let light = style.node_radius(network.node(children[1]));
        assert_eq!(heavy, 70.0);
        assert!(light < heavy && light > 10.0);

        let link = &network.links(root)[0];
        assert_eq!(style.link_width(link), 15.0);
        assert_eq!(style.link_bend(link, 1_000.0), 30.0);
        assert_eq!(style.link_bend(link, -5.0), 0.0);
    }
}
