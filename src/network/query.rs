use std::collections::HashSet;

use regex::RegexBuilder;
use tracing::debug;

use crate::tree_path::{ROOT_SENTINEL, TreePath};

use super::{Network, NodeIndex, NodeKind};

/// Subtree statistics, computed once per module on first access.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Aggregates {
    pub total_children: usize,
    pub max_node_flow: f64,
    pub max_node_exit_flow: f64,
    pub max_link_flow: f64,
    pub max_node_count: usize,
}

/// An external set of physical ids to highlight, e.g. one column of an occurrence file.
#[derive(Clone, Debug, PartialEq)]
pub struct OccurrenceSource {
    pub id: String,
    pub label: String,
    pub color: String,
    pub physical_ids: HashSet<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OccurrenceMark {
    pub label: String,
    pub color: String,
}

impl Network {
    pub fn get_node_by_path(&self, path: &TreePath) -> Option<NodeIndex> {
        path.segments()
            .iter()
            .try_fold(self.root(), |current, id| self.child_by_id(current, *id))
    }

    /// Same as [`Network::get_node_by_path`] for a printed path; malformed text is a miss.
    pub fn find_by_path_str(&self, path: &str) -> Option<NodeIndex> {
        if path == ROOT_SENTINEL {
            return Some(self.root());
        }
        path.parse::<TreePath>()
            .ok()
            .and_then(|path| self.get_node_by_path(&path))
    }

    /// Aggregates of a module's subtree; leaves report all zeroes.
    pub fn aggregates(&self, index: NodeIndex) -> Aggregates {
        match &self.node(index).kind {
            NodeKind::Module(module) => *module
                .aggregates
                .get_or_init(|| self.compute_aggregates(index)),
            NodeKind::Leaf(_) => Aggregates::default(),
        }
    }

    pub fn total_children(&self, index: NodeIndex) -> usize {
        self.aggregates(index).total_children
    }

    pub fn max_node_flow(&self, index: NodeIndex) -> f64 {
        self.aggregates(index).max_node_flow
    }

    pub fn max_node_exit_flow(&self, index: NodeIndex) -> f64 {
        self.aggregates(index).max_node_exit_flow
    }

    pub fn max_link_flow(&self, index: NodeIndex) -> f64 {
        self.aggregates(index).max_link_flow
    }

    pub fn max_node_count(&self, index: NodeIndex) -> usize {
        self.aggregates(index).max_node_count
    }

    fn compute_aggregates(&self, index: NodeIndex) -> Aggregates {
        let mut aggregates = Aggregates::default();
        let mut stack = vec![index];

        while let Some(current) = stack.pop() {
            let node = self.node(current);
            if current != index {
                aggregates.max_node_flow = aggregates.max_node_flow.max(node.flow);
                aggregates.max_node_exit_flow = aggregates.max_node_exit_flow.max(node.exit_flow);
            }

            match &node.kind {
                NodeKind::Leaf(_) => aggregates.total_children += 1,
                NodeKind::Module(module) => {
                    aggregates.max_node_count = aggregates.max_node_count.max(module.children.len());
                    for link in &module.links {
                        aggregates.max_link_flow = aggregates.max_link_flow.max(link.flow);
                    }
                    stack.extend(module.children.values().copied());
                }
            }
        }

        aggregates
    }

    /// Marks leaves whose name matches `query` as a case-insensitive regex.
    ///
    /// Previous hits are cleared first. Each matching leaf gets one hit and every ancestor
    /// counts its matching descendants. An empty or malformed query matches nothing.
    pub fn search(&mut self, query: &str) -> Vec<NodeIndex> {
        for node in &mut self.nodes {
            node.search_hits = 0;
        }

        if query.is_empty() {
            return Vec::new();
        }

        let pattern = match RegexBuilder::new(query).case_insensitive(true).build() {
            Ok(pattern) => pattern,
            Err(error) => {
                debug!(%query, %error, "search query is not a valid pattern");
                return Vec::new();
            }
        };

        let hits = self
            .indices()
            .filter(|index| {
                self.node(*index)
                    .as_leaf()
                    .is_some_and(|leaf| pattern.is_match(&leaf.name))
            })
            .collect::<Vec<_>>();

        for &hit in &hits {
            self.nodes[hit.0].search_hits = 1;
            let ancestors = self.ancestors(hit).collect::<Vec<_>>();
            for ancestor in ancestors {
                self.nodes[ancestor.0].search_hits += 1;
            }
        }

        debug!(%query, hits = hits.len(), "search finished");
        hits
    }

    /// Marks every leaf whose physical id belongs to `source` and counts the marks on
    /// every ancestor module.
    pub fn mark_occurrences(&mut self, source: &OccurrenceSource) -> usize {
        let marked = self
            .indices()
            .filter(|index| {
                self.node(*index)
                    .as_leaf()
                    .is_some_and(|leaf| source.physical_ids.contains(&leaf.node_id))
            })
            .collect::<Vec<_>>();

        for &leaf_index in &marked {
            let NodeKind::Leaf(leaf) = &mut self.nodes[leaf_index.0].kind else {
                continue;
            };
            let previous = leaf.occurred.insert(
                source.id.clone(),
                OccurrenceMark {
                    label: source.label.clone(),
                    color: source.color.clone(),
                },
            );
            // re-marking only refreshes label and color
            if previous.is_some() {
                continue;
            }

            let ancestors = self.ancestors(leaf_index).collect::<Vec<_>>();
            for ancestor in ancestors {
                if let NodeKind::Module(module) = &mut self.nodes[ancestor.0].kind {
                    *module.occurrences.entry(source.id.clone()).or_insert(0) += 1;
                }
            }
        }

        debug!(source = %source.id, marked = marked.len(), "marked occurrences");
        marked.len()
    }

    pub fn clear_occurrences(&mut self) {
        for node in &mut self.nodes {
            match &mut node.kind {
                NodeKind::Leaf(leaf) => leaf.occurred.clear(),
                NodeKind::Module(module) => module.occurrences.clear(),
            }
        }
    }
}
