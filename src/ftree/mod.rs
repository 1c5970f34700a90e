mod flow_format;
mod parse;
mod serialize;
mod tokenize;

use thiserror::Error;
use tracing::{debug, warn};

use crate::network::Network;

pub use flow_format::flow_format;
pub use parse::{FTreeMeta, LinkSection, ModuleRow, ParsedFTree, RawLink, TreeRow, parse_ftree};
pub use serialize::serialize_ftree;
pub use tokenize::{Field, Row, tokenize};

#[derive(Debug, Error)]
pub enum LoadError {
    /// The file parsed with problems; only the first one is reported.
    #[error("{message}")]
    Content { message: String, error_count: usize },
}

/// Tokenizes, parses and builds a network, refusing the load on any content error.
pub fn load_network(text: &str) -> Result<Network, LoadError> {
    let rows = tokenize(text);
    let parsed = parse_ftree(&rows);

    if !parsed.errors.is_empty() {
        return Err(content_error(&parsed.errors));
    }

    debug!(
        rows = rows.len(),
        leaves = parsed.tree.len(),
        link_sections = parsed.links.len(),
        "parsed network file"
    );
    Network::try_from_ftree(&parsed).map_err(|problems| content_error(&problems))
}

fn content_error(errors: &[String]) -> LoadError {
    for error in errors {
        warn!(%error, "content error");
    }
    LoadError::Content {
        message: errors.first().cloned().unwrap_or_default(),
        error_count: errors.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn surfaces_only_the_first_error() {
        let error = load_network("1 0.5 \"a\"\n").unwrap_err();
        let LoadError::Content {
            message,
            error_count,
        } = error;
        assert!(message.contains("tree row"), "{message}");
        assert_eq!(error_count, 4);
    }

    #[test]
    fn refuses_rows_that_do_not_fit_the_tree() {
        let error = load_network("1 0.5 \"a\" 1\n1 0.5 \"b\" 2\n*Links directed\n*Links root 0 0 0 1\n")
            .unwrap_err();
        let LoadError::Content {
            message,
            error_count,
        } = error;
        assert_eq!(message, "tree path 1 is used more than once");
        assert_eq!(error_count, 1);
    }

    #[test]
    fn loads_well_formed_text() {
        let network = load_network("1 1 \"a\" 1\n*Links directed\n*Links root 0 0 0 1\n").unwrap();
        assert_eq!(network.total_children(network.root()), 1);
    }
}
