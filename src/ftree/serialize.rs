use std::borrow::Cow;
use std::fmt::Write as _;

use crate::network::{Network, NodeKind};

use super::flow_format::flow_format;

/// Writes the network back out in the hierarchical flow format.
pub fn serialize_ftree(network: &Network) -> String {
    let mut out = String::new();
    let root = network.root();

    let modules = network.modules_breadth_first(root);
    let leaves = network.leaves(root);

    let _ = writeln!(out, "# modules: {}", modules.len().saturating_sub(1));
    let _ = writeln!(out, "# leaves: {}", leaves.len());

    let _ = writeln!(out, "*Modules {}", modules.len().saturating_sub(1));
    for &module in modules.iter().filter(|module| **module != root) {
        let node = network.node(module);
        let _ = writeln!(
            out,
            "{} {} \"{}\" {}",
            node.path,
            flow_format(node.flow),
            escape_name(&network.name(module)),
            flow_format(node.exit_flow)
        );
    }

    let _ = writeln!(out, "*Nodes {}", leaves.len());
    for &leaf_index in &leaves {
        let node = network.node(leaf_index);
        let NodeKind::Leaf(leaf) = &node.kind else {
            continue;
        };

        let _ = write!(
            out,
            "{} {} \"{}\"",
            node.path,
            flow_format(node.flow),
            escape_name(&leaf.name)
        );
        if let Some(state_id) = &leaf.state_id {
            let _ = write!(out, " {state_id}");
        }
        if let Some(layer_id) = &leaf.layer_id {
            let _ = write!(out, " {layer_id}");
        }
        let _ = writeln!(out, " {}", leaf.node_id);
    }

    let link_type = if network.is_directed() {
        "directed"
    } else {
        "undirected"
    };
    let _ = writeln!(out, "*Links {link_type}");

    for &module_index in &modules {
        let node = network.node(module_index);
        let Some(module) = node.as_module() else {
            continue;
        };

        let _ = writeln!(
            out,
            "*Links {} {} {} {} {}",
            node.path,
            flow_format(module.enter_flow),
            flow_format(node.exit_flow),
            module.links().len(),
            module.child_count()
        );

        let mut links = module.links().iter().collect::<Vec<_>>();
        links.sort_by(|a, b| b.flow.total_cmp(&a.flow));
        for link in links {
            let _ = writeln!(
                out,
                "{} {} {}",
                network.node(link.source).id,
                network.node(link.target).id,
                flow_format(link.flow)
            );
        }
    }

    out
}

/// Backslash escapes the characters the tokenizer treats specially inside quotes.
fn escape_name(name: &str) -> Cow<'_, str> {
    if !name.contains(['"', '\\']) {
        return Cow::Borrowed(name);
    }
    let mut escaped = String::with_capacity(name.len() + 2);
    for ch in name.chars() {
        if matches!(ch, '"' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    Cow::Owned(escaped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ftree::{parse_ftree, tokenize};

    const SMALL: &str = "\
*Nodes 3
1:1 0.5 \"a\" 1
1:2 0.25 \"b\" 2
2 0.25 \"c\" 3
*Links undirected
*Links root 0 0 1 2
1 2 0.125
*Links 1 0.1 0.125 2 2
1 2 0.0625
2 1 0.3
";

    #[test]
    fn writes_every_section() {
        let network = Network::from_ftree(&parse_ftree(&tokenize(SMALL)));
        let text = serialize_ftree(&network);

        assert!(text.contains("*Modules 1\n1 0.75 \"a, b\" 0.125\n"), "{text}");
        assert!(text.contains("*Nodes 3\n1:1 0.5 \"a\" 1\n1:2 0.25 \"b\" 2\n2 0.25 \"c\" 3\n"));
        assert!(text.contains("*Links undirected\n*Links root 0 0 1 2\n1 2 0.125\n"));
        assert!(text.contains("*Links 1 0.1 0.125 2 2\n2 1 0.3\n1 2 0.0625\n"), "{text}");
    }

    #[test]
    fn quotes_in_names_survive_a_round_trip() {
        let text = "1 1 \"the \\\"big\\\" one\" 1\n*Links directed\n*Links root 0 0 0 1\n";
        let network = Network::from_ftree(&parse_ftree(&tokenize(text)));
        let leaf = network.find_by_path_str("1").unwrap();
        assert_eq!(network.name(leaf), "the \"big\" one");

        let written = serialize_ftree(&network);
        assert!(written.contains("1 1 \"the \\\"big\\\" one\" 1\n"), "{written}");
        let reparsed = Network::from_ftree(&parse_ftree(&tokenize(&written)));
        let leaf = reparsed.find_by_path_str("1").unwrap();
        assert_eq!(reparsed.name(leaf), "the \"big\" one");
    }

    #[test]
    fn identifiers_are_written_as_read() {
        let text = "1 1 \"a\" 7 02134\n*Links directed\n*Links root 0 0 0 1\n";
        let network = Network::from_ftree(&parse_ftree(&tokenize(text)));
        assert!(serialize_ftree(&network).contains("1 1 \"a\" 7 02134\n"));
    }

    #[test]
    fn output_parses_without_errors() {
        let network = Network::from_ftree(&parse_ftree(&tokenize(SMALL)));
        let reparsed = parse_ftree(&tokenize(&serialize_ftree(&network)));
        assert!(reparsed.errors.is_empty(), "{:?}", reparsed.errors);
        assert!(!reparsed.meta.directed);
        assert_eq!(reparsed.tree.len(), 3);
        assert_eq!(reparsed.modules.len(), 1);
    }
}
