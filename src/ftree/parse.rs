use tracing::warn;

use crate::tree_path::TreePath;

use super::tokenize::{Field, Row};

/// One leaf row of the tree section.
#[derive(Clone, Debug, PartialEq)]
pub struct TreeRow {
    pub path: TreePath,
    pub flow: f64,
    pub name: String,
    pub state_id: Option<String>,
    pub layer_id: Option<String>,
    pub node_id: String,
}

/// One row of the optional `*Modules` section.
#[derive(Clone, Debug, PartialEq)]
pub struct ModuleRow {
    pub path: TreePath,
    pub flow: f64,
    pub name: String,
    pub exit_flow: f64,
}

/// A link between two children of one module, still addressed by local child id.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RawLink {
    pub source: u32,
    pub target: u32,
    pub flow: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LinkSection {
    pub path: TreePath,
    pub enter_flow: f64,
    pub exit_flow: f64,
    pub num_edges: usize,
    pub num_children: usize,
    pub links: Vec<RawLink>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FTreeMeta {
    pub directed: bool,
}

impl Default for FTreeMeta {
    fn default() -> Self {
        Self { directed: true }
    }
}

/// Everything the parser could recover from the rows, plus every problem it ran into.
///
/// Parsing never aborts; callers treat a non-empty `errors` list as a failed load.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParsedFTree {
    pub modules: Vec<ModuleRow>,
    pub tree: Vec<TreeRow>,
    pub links: Vec<LinkSection>,
    pub errors: Vec<String>,
    pub meta: FTreeMeta,
}

pub fn parse_ftree(rows: &[Row]) -> ParsedFTree {
    let mut result = ParsedFTree::default();
    let mut index = 0usize;

    if rows.get(index).is_some_and(|row| header_is(row, "*Modules")) {
        index += 1;
        while let Some(row) = rows.get(index).filter(|row| !is_header(row)) {
            match parse_module_row(row) {
                Ok(module) => result.modules.push(module),
                Err(error) => result.errors.push(format!("row {}: {error}", index + 1)),
            }
            index += 1;
        }
    }

    if rows.get(index).is_some_and(|row| {
        header_is(row, "*Nodes") || header_is(row, "*Tree") || header_is(row, "*Vertices")
    }) {
        index += 1;
    }

    while let Some(row) = rows.get(index).filter(|row| !is_header(row)) {
        match parse_tree_row(row) {
            Ok(leaf) => result.tree.push(leaf),
            Err(error) => result.errors.push(format!("row {}: {error}", index + 1)),
        }
        index += 1;
    }

    if result.tree.is_empty() {
        result.errors.push("No tree data found".to_owned());
    }

    match rows.get(index).and_then(|row| link_type(row)) {
        Some(directed) => {
            result.meta.directed = directed;
            index += 1;
        }
        None => result
            .errors
            .push("Expected link type declaration '*Links directed|undirected'".to_owned()),
    }

    let mut in_valid_section = false;
    for (offset, row) in rows[index.min(rows.len())..].iter().enumerate() {
        let row_number = index + offset + 1;

        if header_is(row, "*Links") {
            match parse_link_header(row) {
                Ok(section) => {
                    result.links.push(section);
                    in_valid_section = true;
                }
                Err(error) => {
                    result.errors.push(format!("row {row_number}: {error}"));
                    in_valid_section = false;
                }
            }
            continue;
        }

        if is_header(row) {
            result
                .errors
                .push(format!("row {row_number}: unexpected section header '{}'", row[0]));
            in_valid_section = false;
            continue;
        }

        // data rows of a rejected header are dropped with it
        if !in_valid_section {
            continue;
        }

        match parse_link_row(row) {
            Ok(link) => {
                if let Some(section) = result.links.last_mut() {
                    section.links.push(link);
                }
            }
            Err(error) => result.errors.push(format!("row {row_number}: {error}")),
        }
    }

    if result.links.is_empty() {
        result.errors.push("No link data found".to_owned());
    }

    result
}

fn is_header(row: &Row) -> bool {
    row.first().is_some_and(Field::is_header)
}

fn header_is(row: &Row, name: &str) -> bool {
    row.first().is_some_and(|field| field.header_is(name))
}

fn field_path(field: &Field) -> Result<TreePath, String> {
    match field {
        Field::Number { .. } => field
            .as_id()
            .ok_or_else(|| format!("invalid tree path '{field}'"))
            .and_then(|id| TreePath::from_segments(vec![id]).map_err(|error| error.to_string())),
        Field::Text(text) => text.parse::<TreePath>().map_err(|error| error.to_string()),
    }
}

fn field_flow(field: &Field, what: &str) -> Result<f64, String> {
    field
        .as_number()
        .ok_or_else(|| format!("{what} '{field}' is not a number"))
}

fn parse_module_row(row: &Row) -> Result<ModuleRow, String> {
    if row.len() != 4 {
        return Err(format!(
            "module row should have 4 fields, found {}",
            row.len()
        ));
    }

    Ok(ModuleRow {
        path: field_path(&row[0])?,
        flow: field_flow(&row[1], "flow")?,
        name: row[2].to_string(),
        exit_flow: field_flow(&row[3], "exit flow")?,
    })
}

fn parse_tree_row(row: &Row) -> Result<TreeRow, String> {
    let (state_id, layer_id) = match row.len() {
        4 => (None, None),
        5 => (Some(row[3].to_string()), None),
        6 => (Some(row[3].to_string()), Some(row[4].to_string())),
        count => {
            return Err(format!(
                "tree row should have 4 to 6 fields, found {count}"
            ));
        }
    };

    let path = field_path(&row[0])?;
    if path.is_root() {
        return Err("tree row cannot address the root".to_owned());
    }

    Ok(TreeRow {
        path,
        flow: field_flow(&row[1], "flow")?,
        name: row[2].to_string(),
        state_id,
        layer_id,
        node_id: row[row.len() - 1].to_string(),
    })
}

fn link_type(row: &Row) -> Option<bool> {
    if row.len() != 2 || !header_is(row, "*Links") {
        return None;
    }

    if row[1].header_is("directed") {
        Some(true)
    } else if row[1].header_is("undirected") {
        Some(false)
    } else {
        None
    }
}

fn parse_link_header(row: &Row) -> Result<LinkSection, String> {
    let (enter_flow, rest) = match row.len() {
        6 => (Some(field_flow(&row[2], "enter flow")?), &row[3..]),
        5 => {
            warn!(path = %row[1], "link header without enter flow, reading legacy layout");
            (None, &row[2..])
        }
        count => {
            return Err(format!(
                "link header should have 5 or 6 fields, found {count}"
            ));
        }
    };

    let exit_flow = field_flow(&rest[0], "exit flow")?;
    let num_edges = rest[1]
        .as_id()
        .ok_or_else(|| format!("edge count '{}' is not an integer", rest[1]))?;
    let num_children = rest[2]
        .as_id()
        .ok_or_else(|| format!("child count '{}' is not an integer", rest[2]))?;

    Ok(LinkSection {
        path: field_path(&row[1])?,
        enter_flow: enter_flow.unwrap_or(exit_flow),
        exit_flow,
        num_edges: num_edges as usize,
        num_children: num_children as usize,
        links: Vec::with_capacity(num_edges as usize),
    })
}

fn parse_link_row(row: &Row) -> Result<RawLink, String> {
    if !(2..=3).contains(&row.len()) {
        return Err(format!(
            "link row should have 3 fields, found {}",
            row.len()
        ));
    }

    let source = row[0]
        .as_id()
        .filter(|id| *id > 0)
        .ok_or_else(|| format!("invalid link source '{}'", row[0]))?;
    let target = row[1]
        .as_id()
        .filter(|id| *id > 0)
        .ok_or_else(|| format!("invalid link target '{}'", row[1]))?;
    let flow = match row.get(2) {
        Some(field) => field_flow(field, "link flow")?,
        None => 1.0,
    };

    Ok(RawLink {
        source,
        target,
        flow,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ftree::tokenize::tokenize;

    const VALID: &str = "\
# v1
*Modules 2
1 0.6 \"Alpha\" 0.1
2 0.4 \"Beta\" 0.1
*Nodes 4
1:1 0.4 \"a\" 1
1:2 0.2 \"b\" 2
2:1 0.3 \"c\" 3
2:2 0.1 \"d\" 4
*Links directed
*Links root 0 0 2 2
1 2 0.1
2 1 0.1
*Links 1 0.1 0.1 1 2
1 2 0.3
*Links 2 0.1 0.1 1 2
2 1 0.05
";

    fn parse(text: &str) -> ParsedFTree {
        parse_ftree(&tokenize(text))
    }

    #[test]
    fn well_formed_input_has_no_errors() {
        let parsed = parse(VALID);
        assert!(parsed.errors.is_empty(), "{:?}", parsed.errors);
        assert_eq!(parsed.modules.len(), 2);
        assert_eq!(parsed.tree.len(), 4);
        assert_eq!(parsed.links.len(), 3);
        assert!(parsed.meta.directed);
        assert!(parsed.links[0].path.is_root());
        assert_eq!(parsed.links[1].links, vec![RawLink {
            source: 1,
            target: 2,
            flow: 0.3
        }]);
        assert_eq!(parsed.tree[0].node_id, "1");
    }

    #[test]
    fn short_tree_row_is_one_error() {
        let text = VALID.replace("1:2 0.2 \"b\" 2", "1:2 0.2 \"b\"");
        let parsed = parse(&text);
        assert_eq!(parsed.errors.len(), 1, "{:?}", parsed.errors);
        assert_eq!(parsed.tree.len(), 3);
    }

    #[test]
    fn missing_link_type_is_one_error_and_defaults_to_directed() {
        let text = VALID.replace("*Links directed\n", "");
        let parsed = parse(&text);
        assert_eq!(parsed.errors.len(), 1, "{:?}", parsed.errors);
        assert!(parsed.meta.directed);
        assert_eq!(parsed.links.len(), 3);
    }

    #[test]
    fn four_field_link_header_loses_all_link_data() {
        let text = "\
1 0.5 \"a\" 1
2 0.5 \"b\" 2
*Links undirected
*Links root 2 2
1 2 1
";
        let parsed = parse(text);
        assert_eq!(parsed.errors.len(), 2, "{:?}", parsed.errors);
        assert!(!parsed.meta.directed);
        assert!(parsed.links.is_empty());
    }

    #[test]
    fn legacy_header_shifts_fields() {
        let text = "\
1 1 \"a\" 1
*Links directed
*Links root 0.25 0 1
";
        let parsed = parse(text);
        assert!(parsed.errors.is_empty(), "{:?}", parsed.errors);
        let section = &parsed.links[0];
        assert_eq!(section.exit_flow, 0.25);
        assert_eq!(section.enter_flow, 0.25);
        assert_eq!(section.num_edges, 0);
        assert_eq!(section.num_children, 1);
    }

    #[test]
    fn state_and_layer_fields_are_kept() {
        let text = "\
1:1 0.5 \"a\" 7 2 11
1:2 0.5 \"b\" 8 12
*Links directed
*Links root 0 0 0 1
";
        let parsed = parse(text);
        assert!(parsed.errors.is_empty(), "{:?}", parsed.errors);
        assert_eq!(parsed.tree[0].state_id.as_deref(), Some("7"));
        assert_eq!(parsed.tree[0].layer_id.as_deref(), Some("2"));
        assert_eq!(parsed.tree[0].node_id, "11");
        assert_eq!(parsed.tree[1].state_id.as_deref(), Some("8"));
        assert_eq!(parsed.tree[1].layer_id, None);
    }

    #[test]
    fn malformed_link_rows_are_skipped() {
        let text = VALID.replace("1 2 0.3", "1 x 0.3");
        let parsed = parse(&text);
        assert_eq!(parsed.errors.len(), 1, "{:?}", parsed.errors);
        assert!(parsed.links[1].links.is_empty());
    }

    #[test]
    fn link_flow_defaults_to_one() {
        let text = VALID.replace("2 1 0.05", "2 1");
        let parsed = parse(&text);
        assert!(parsed.errors.is_empty());
        assert_eq!(parsed.links[2].links[0].flow, 1.0);
    }

    #[test]
    fn empty_input_reports_every_missing_section() {
        let parsed = parse_ftree(&[]);
        assert_eq!(parsed.errors.len(), 3, "{:?}", parsed.errors);
    }
}
