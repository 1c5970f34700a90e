use std::collections::HashMap;

use tracing::{debug, warn};

use crate::ftree::{LinkSection, ParsedFTree, TreeRow};
use crate::tree_path::TreePath;

use super::{LARGEST_CAPACITY, Leaf, Link, LinkRef, Module, Network, Node, NodeIndex, NodeKind};

impl Network {
    /// Builds the module tree from parser output.
    ///
    /// Link sections create the module skeleton, leaf rows fill it in and accumulate flow,
    /// and finally each module's raw links are resolved against its own children.
    ///
    /// Rows that cannot be placed in the tree are skipped and logged; use
    /// [`Network::try_from_ftree`] to refuse them instead.
    pub fn from_ftree(parsed: &ParsedFTree) -> Self {
        let (network, problems) = Self::build(parsed);
        for problem in &problems {
            warn!(%problem, "skipped while building network");
        }
        network
    }

    /// Like [`Network::from_ftree`] but fails with every structural problem found, such as a
    /// duplicate tree path or a leaf addressed as a module.
    pub fn try_from_ftree(parsed: &ParsedFTree) -> Result<Self, Vec<String>> {
        let (network, problems) = Self::build(parsed);
        if problems.is_empty() {
            Ok(network)
        } else {
            Err(problems)
        }
    }

    fn build(parsed: &ParsedFTree) -> (Self, Vec<String>) {
        let mut problems = Vec::new();
        let mut network = Self {
            nodes: vec![Node::new(
                0,
                TreePath::root(),
                None,
                NodeKind::Module(Module::default()),
            )],
            directed: parsed.meta.directed,
        };

        let names = parsed
            .modules
            .iter()
            .map(|module| (module.path.clone(), module.name.clone()))
            .collect::<HashMap<_, _>>();

        for section in &parsed.links {
            if let Err(problem) = network.attach_link_section(section) {
                problems.push(problem);
            }
        }

        for row in &parsed.tree {
            if let Err(problem) = network.add_leaf(row) {
                problems.push(problem);
            }
        }

        for index in 0..network.nodes.len() {
            let path = network.nodes[index].path.clone();
            if let (Some(name), Some(module)) =
                (names.get(&path), network.nodes[index].as_module_mut())
            {
                module.name = Some(name.clone());
            }
        }

        network.connect();

        debug!(
            nodes = network.nodes.len(),
            leaves = network.total_children(network.root()),
            directed = network.directed,
            "built network"
        );
        (network, problems)
    }

    /// Walks `path` from the root, creating missing modules on the way.
    ///
    /// Returns `None` when the walk runs into a leaf.
    fn ensure_module(&mut self, path: &TreePath) -> Option<NodeIndex> {
        let mut current = self.root();
        for (depth, &id) in path.segments().iter().enumerate() {
            current = match self.child_by_id(current, id) {
                Some(child) if !self.node(child).is_leaf() => child,
                Some(_) => return None,
                None => {
                    let child_path = TreePath::from_segments(path.segments()[..=depth].to_vec())
                        .ok()?;
                    self.push_child(
                        current,
                        Node::new(id, child_path, Some(current), NodeKind::Module(Module::default())),
                    )
                }
            };
        }
        Some(current)
    }

    fn push_child(&mut self, parent: NodeIndex, node: Node) -> NodeIndex {
        let index = NodeIndex(self.nodes.len());
        let id = node.id;
        self.nodes.push(node);
        if let Some(module) = self.nodes[parent.0].as_module_mut() {
            module.children.insert(id, index);
        }
        index
    }

    fn attach_link_section(&mut self, section: &LinkSection) -> Result<(), String> {
        let index = self
            .ensure_module(&section.path)
            .ok_or_else(|| format!("link section {} addresses a leaf", section.path))?;

        let node = &mut self.nodes[index.0];
        node.exit_flow = section.exit_flow;
        if let Some(module) = node.as_module_mut() {
            module.enter_flow = section.enter_flow;
            module.raw_links.extend(section.links.iter().copied());
        }
        Ok(())
    }

    fn add_leaf(&mut self, row: &TreeRow) -> Result<(), String> {
        let (Some(parent_path), Some(id)) = (row.path.parent(), row.path.last()) else {
            return Ok(());
        };
        let parent = self
            .ensure_module(&parent_path)
            .ok_or_else(|| format!("tree path {} runs through a leaf", row.path))?;
        if self.child_by_id(parent, id).is_some() {
            return Err(format!("tree path {} is used more than once", row.path));
        }

        let mut leaf = Node::new(
            id,
            row.path.clone(),
            Some(parent),
            NodeKind::Leaf(Leaf {
                name: row.name.clone(),
                node_id: row.node_id.clone(),
                state_id: row.state_id.clone(),
                layer_id: row.layer_id.clone(),
                ..Leaf::default()
            }),
        );
        leaf.flow = row.flow;
        let leaf_index = self.push_child(parent, leaf);

        let ancestors = self.ancestors(leaf_index).collect::<Vec<_>>();
        for ancestor in ancestors {
            self.nodes[ancestor.0].flow += row.flow;
            self.offer_largest(ancestor, leaf_index);
        }
        Ok(())
    }

    fn offer_largest(&mut self, module_index: NodeIndex, leaf: NodeIndex) {
        let mut largest = match self.nodes[module_index.0].as_module_mut() {
            Some(module) => std::mem::take(&mut module.largest),
            None => return,
        };

        largest.push(leaf);
        largest.sort_by(|a, b| self.nodes[b.0].flow.total_cmp(&self.nodes[a.0].flow));
        largest.truncate(LARGEST_CAPACITY);

        if let Some(module) = self.nodes[module_index.0].as_module_mut() {
            module.largest = largest;
        }
    }

    /// Resolves every module's raw links against its current children.
    fn connect(&mut self) {
        for index in 0..self.nodes.len() {
            let raw_links = match self.nodes[index].as_module_mut() {
                Some(module) if !module.raw_links.is_empty() => std::mem::take(&mut module.raw_links),
                _ => continue,
            };

            let module_index = NodeIndex(index);
            let mut links = Vec::with_capacity(raw_links.len());
            for raw in raw_links {
                let source = self.child_by_id(module_index, raw.source);
                let target = self.child_by_id(module_index, raw.target);
                let (Some(source), Some(target)) = (source, target) else {
                    warn!(
                        module = %self.nodes[index].path,
                        source = raw.source,
                        target = raw.target,
                        "link endpoint is not a child of its module, dropping it"
                    );
                    continue;
                };

                let link = LinkRef {
                    module: module_index,
                    index: links.len(),
                };
                links.push(Link::new(source, target, raw.flow));

                let source_node = &mut self.nodes[source.0];
                source_node.out_links.push(link);
                source_node.out_degree += 1;
                let target_node = &mut self.nodes[target.0];
                target_node.in_links.push(link);
                target_node.in_degree += 1;
            }

            let mut by_ends = HashMap::with_capacity(links.len());
            for (position, link) in links.iter().enumerate() {
                by_ends.entry((link.source, link.target)).or_insert(position);
            }
            for link in &mut links {
                link.opposite = by_ends.get(&(link.target, link.source)).copied();
            }

            if let Some(module) = self.nodes[index].as_module_mut() {
                module.links = links;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::ftree::{parse_ftree, tokenize};
    use crate::network::Network;

    const NESTED: &str = "\
*Modules 2
1 0.7 \"Core\" 0.2
1:1 0.5 \"Inner\" 0.1
*Nodes 5
1:1:1 0.3 \"Atlanta, GA\" 10
1:1:2 0.2 \"Boston, MA\" 11
1:2 0.2 \"Chicago, IL\" 12
2:1 0.3 \"Denver, CO\" 13
*Links directed
*Links root 0 0 1 2
1 2 0.05
*Links 1 0.2 0.2 2 2
1 2 0.1
2 1 0.15
*Links 1:1 0.1 0.1 1 2
1 2 0.2
*Links 2 0.05 0.05 0 1
";

    fn build() -> Network {
        let parsed = parse_ftree(&tokenize(NESTED));
        assert!(parsed.errors.is_empty(), "{:?}", parsed.errors);
        Network::from_ftree(&parsed)
    }

    #[test]
    fn accumulates_flow_into_every_ancestor() {
        let network = build();
        let root = network.root();
        assert!((network.node(root).flow - 1.0).abs() < 1e-9);

        let core = network.child_by_id(root, 1).unwrap();
        assert!((network.node(core).flow - 0.7).abs() < 1e-9);
        let inner = network.child_by_id(core, 1).unwrap();
        assert!((network.node(inner).flow - 0.5).abs() < 1e-9);
    }

    #[test]
    fn carries_header_flows_and_module_names() {
        let network = build();
        let core = network.child_by_id(network.root(), 1).unwrap();
        assert_eq!(network.name(core), "Core");
        assert_eq!(network.node(core).exit_flow, 0.2);
        assert_eq!(network.module(core).unwrap().enter_flow, 0.2);
    }

    #[test]
    fn derives_names_from_largest_leaves() {
        let network = build();
        let second = network.child_by_id(network.root(), 2).unwrap();
        assert_eq!(network.name(second), "Denver, CO");

        let root = network.root();
        let largest = network.module(root).unwrap().largest();
        assert_eq!(largest.len(), 4);
        let flows = largest
            .iter()
            .map(|index| network.node(*index).flow)
            .collect::<Vec<_>>();
        assert!(flows.windows(2).all(|pair| pair[0] >= pair[1]));
    }

    #[test]
    fn resolves_links_between_siblings_only() {
        let network = build();
        let core = network.child_by_id(network.root(), 1).unwrap();
        let links = network.links(core);
        assert_eq!(links.len(), 2);
        for link in links {
            assert_eq!(network.node(link.source).parent, Some(core));
            assert_eq!(network.node(link.target).parent, Some(core));
        }

        let inner = network.child_by_id(core, 1).unwrap();
        assert_eq!(network.node(inner).out_degree, 1);
        assert_eq!(network.node(inner).in_degree, 1);
    }

    #[test]
    fn finds_opposite_links() {
        let network = build();
        let core = network.child_by_id(network.root(), 1).unwrap();
        let refs = network.link_refs(core).collect::<Vec<_>>();
        assert_eq!(network.opposite_link(refs[0]), Some(refs[1]));
        assert_eq!(network.opposite_link(refs[1]), Some(refs[0]));
        let root_link = network.link_refs(network.root()).next().unwrap();
        assert_eq!(network.opposite_link(root_link), None);
    }

    #[test]
    fn drops_links_to_missing_children() {
        let text = NESTED.replace("*Links 2 0.05 0.05 0 1\n", "*Links 2 0.05 0.05 1 1\n1 9 0.3\n");
        let network = Network::from_ftree(&parse_ftree(&tokenize(&text)));
        let second = network.child_by_id(network.root(), 2).unwrap();
        assert!(network.links(second).is_empty());
    }

    #[test]
    fn duplicate_tree_paths_are_refused() {
        let text = "1 0.5 \"a\" 1\n1 0.5 \"b\" 2\n*Links directed\n*Links root 0 0 0 1\n";
        let parsed = parse_ftree(&tokenize(text));
        let problems = Network::try_from_ftree(&parsed).unwrap_err();
        assert_eq!(problems, ["tree path 1 is used more than once"]);

        let lenient = Network::from_ftree(&parsed);
        assert_eq!(lenient.total_children(lenient.root()), 1);
    }

    #[test]
    fn leaves_used_as_modules_are_refused() {
        let text = "\
1 0.5 \"a\" 1
1:1 0.5 \"b\" 2
*Links directed
*Links root 0 0 0 1
";
        let problems = Network::try_from_ftree(&parse_ftree(&tokenize(text))).unwrap_err();
        assert_eq!(problems, ["tree path 1:1 runs through a leaf"]);

        let text = "\
2:1 0.5 \"a\" 1
*Links directed
*Links root 0 0 0 1
*Links 2:1 0 0 0 0
";
        let problems = Network::try_from_ftree(&parse_ftree(&tokenize(text))).unwrap_err();
        assert_eq!(problems.len(), 1);
        assert!(problems[0].contains("2:1"), "{problems:?}");
    }

    #[test]
    fn well_formed_input_builds_without_problems() {
        let parsed = parse_ftree(&tokenize(NESTED));
        assert!(Network::try_from_ftree(&parsed).is_ok());
    }
}
