use std::borrow::Cow;
use std::cell::OnceCell;
use std::collections::{BTreeMap, HashMap};

use crate::ftree::RawLink;
use crate::tree_path::TreePath;

mod build;
mod query;

pub use query::{Aggregates, OccurrenceMark, OccurrenceSource};

/// Number of largest leaves a module remembers for naming itself.
pub const LARGEST_CAPACITY: usize = 4;

/// Handle of a node in the [`Network`] arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeIndex(usize);

impl NodeIndex {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Addresses one link: the owning module and the position in its link list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LinkRef {
    pub module: NodeIndex,
    pub index: usize,
}

#[derive(Clone, Debug)]
pub struct Link {
    pub source: NodeIndex,
    pub target: NodeIndex,
    pub flow: f64,
    pub should_render: bool,
    /// Index of the link running the other way in the same module, filled in when the
    /// network is connected.
    opposite: Option<usize>,
}

impl Link {
    fn new(source: NodeIndex, target: NodeIndex, flow: f64) -> Self {
        Self {
            source,
            target,
            flow,
            should_render: true,
            opposite: None,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Leaf {
    pub name: String,
    pub node_id: String,
    pub state_id: Option<String>,
    pub layer_id: Option<String>,
    /// Occurrence source id to the mark it left on this leaf.
    pub occurred: BTreeMap<String, OccurrenceMark>,
}

#[derive(Clone, Debug, Default)]
pub struct Module {
    name: Option<String>,
    pub enter_flow: f64,
    children: BTreeMap<u32, NodeIndex>,
    links: Vec<Link>,
    raw_links: Vec<RawLink>,
    largest: Vec<NodeIndex>,
    aggregates: OnceCell<Aggregates>,
    /// Occurrence source id to the number of marked descendant leaves.
    pub occurrences: HashMap<String, usize>,
}

impl Module {
    pub fn explicit_name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn largest(&self) -> &[NodeIndex] {
        &self.largest
    }
}

#[derive(Clone, Debug)]
pub enum NodeKind {
    Module(Module),
    Leaf(Leaf),
}

#[derive(Clone, Debug)]
pub struct Node {
    /// Local id, unique among siblings.
    pub id: u32,
    pub path: TreePath,
    pub parent: Option<NodeIndex>,
    pub flow: f64,
    pub exit_flow: f64,
    pub should_render: bool,
    pub search_hits: usize,
    pub in_degree: usize,
    pub out_degree: usize,
    pub in_links: Vec<LinkRef>,
    pub out_links: Vec<LinkRef>,
    pub kind: NodeKind,
}

impl Node {
    fn new(id: u32, path: TreePath, parent: Option<NodeIndex>, kind: NodeKind) -> Self {
        Self {
            id,
            path,
            parent,
            flow: 0.0,
            exit_flow: 0.0,
            should_render: true,
            search_hits: 0,
            in_degree: 0,
            out_degree: 0,
            in_links: Vec::new(),
            out_links: Vec::new(),
            kind,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Leaf(_))
    }

    pub fn as_module(&self) -> Option<&Module> {
        match &self.kind {
            NodeKind::Module(module) => Some(module),
            NodeKind::Leaf(_) => None,
        }
    }

    pub fn as_leaf(&self) -> Option<&Leaf> {
        match &self.kind {
            NodeKind::Leaf(leaf) => Some(leaf),
            NodeKind::Module(_) => None,
        }
    }

    fn as_module_mut(&mut self) -> Option<&mut Module> {
        match &mut self.kind {
            NodeKind::Module(module) => Some(module),
            NodeKind::Leaf(_) => None,
        }
    }
}

/// The module tree of one loaded file.
///
/// Nodes live in an arena; parents are plain handles so the tree never owns itself.
/// Built once, read-mostly afterwards, dropped as a whole when another file loads.
#[derive(Clone, Debug)]
pub struct Network {
    nodes: Vec<Node>,
    directed: bool,
}

impl Network {
    pub fn root(&self) -> NodeIndex {
        NodeIndex(0)
    }

    pub fn is_directed(&self) -> bool {
        self.directed
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn node(&self, index: NodeIndex) -> &Node {
        &self.nodes[index.0]
    }

    pub fn indices(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        (0..self.nodes.len()).map(NodeIndex)
    }

    pub fn module(&self, index: NodeIndex) -> Option<&Module> {
        self.nodes.get(index.0).and_then(Node::as_module)
    }

    /// Direct children in ascending local id order; empty for leaves.
    pub fn children(&self, index: NodeIndex) -> impl Iterator<Item = NodeIndex> + '_ {
        self.module(index)
            .into_iter()
            .flat_map(|module| module.children.values().copied())
    }

    pub fn child_by_id(&self, index: NodeIndex, id: u32) -> Option<NodeIndex> {
        self.module(index)
            .and_then(|module| module.children.get(&id).copied())
    }

    pub fn links(&self, module: NodeIndex) -> &[Link] {
        self.module(module).map(Module::links).unwrap_or(&[])
    }

    pub fn link(&self, link: LinkRef) -> Option<&Link> {
        self.module(link.module)
            .and_then(|module| module.links.get(link.index))
    }

    pub fn link_refs(&self, module: NodeIndex) -> impl Iterator<Item = LinkRef> + '_ {
        (0..self.links(module).len()).map(move |index| LinkRef { module, index })
    }

    /// The link running the other way between the same two children.
    pub fn opposite_link(&self, link: LinkRef) -> Option<LinkRef> {
        let index = self.link(link)?.opposite?;
        Some(LinkRef {
            module: link.module,
            index,
        })
    }

    /// Parents from the direct parent up to and including the root.
    pub fn ancestors(&self, index: NodeIndex) -> impl Iterator<Item = NodeIndex> + '_ {
        std::iter::successors(self.node(index).parent, |current| self.node(*current).parent)
    }

    /// Leaves below `index` in depth-first order (the node itself if it is a leaf).
    pub fn leaves(&self, index: NodeIndex) -> Vec<NodeIndex> {
        let mut leaves = Vec::new();
        let mut stack = vec![index];
        while let Some(current) = stack.pop() {
            match &self.node(current).kind {
                NodeKind::Leaf(_) => leaves.push(current),
                NodeKind::Module(module) => {
                    stack.extend(module.children.values().rev().copied());
                }
            }
        }
        leaves
    }

    /// Modules below and including `index`, breadth first.
    pub fn modules_breadth_first(&self, index: NodeIndex) -> Vec<NodeIndex> {
        let mut modules = Vec::new();
        let mut queue = std::collections::VecDeque::from([index]);
        while let Some(current) = queue.pop_front() {
            if let Some(module) = self.module(current) {
                modules.push(current);
                queue.extend(module.children.values().copied());
            }
        }
        modules
    }

    /// Display name: the leaf name, the module's explicit name, or one derived from the
    /// module's largest leaves.
    pub fn name(&self, index: NodeIndex) -> Cow<'_, str> {
        let node = self.node(index);
        match &node.kind {
            NodeKind::Leaf(leaf) => Cow::Borrowed(leaf.name.as_str()),
            NodeKind::Module(module) => {
                if let Some(name) = &module.name {
                    return Cow::Borrowed(name.as_str());
                }
                if module.largest.is_empty() {
                    return Cow::Owned(node.path.to_string());
                }
                Cow::Owned(
                    module
                        .largest
                        .iter()
                        .map(|largest| self.name(*largest))
                        .collect::<Vec<_>>()
                        .join(", "),
                )
            }
        }
    }

    pub fn rename(&mut self, index: NodeIndex, name: impl Into<String>) {
        let name = name.into();
        match &mut self.nodes[index.0].kind {
            NodeKind::Leaf(leaf) => leaf.name = name,
            NodeKind::Module(module) => module.name = Some(name),
        }
    }

    pub fn set_should_render(&mut self, index: NodeIndex, should_render: bool) {
        self.nodes[index.0].should_render = should_render;
    }

    pub fn set_link_should_render(&mut self, link: LinkRef, should_render: bool) {
        if let Some(link) = self.nodes[link.module.0]
            .as_module_mut()
            .and_then(|module| module.links.get_mut(link.index))
        {
            link.should_render = should_render;
        }
    }
}
