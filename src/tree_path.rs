use std::fmt;
use std::str::FromStr;

use thiserror::Error;

pub const ROOT_SENTINEL: &str = "root";

/// Location of a node in the module tree: the chain of local child ids from the root.
///
/// The root itself is the empty chain and prints as `root`; everything else prints as
/// colon-joined ids such as `1:4:2`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TreePath(Vec<u32>);

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TreePathError {
    #[error("empty tree path")]
    Empty,
    #[error("invalid tree path segment '{0}'")]
    InvalidSegment(String),
    #[error("tree path segments must be positive")]
    ZeroSegment,
}

impl TreePath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn from_segments(segments: Vec<u32>) -> Result<Self, TreePathError> {
        if segments.contains(&0) {
            return Err(TreePathError::ZeroSegment);
        }
        Ok(Self(segments))
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn segments(&self) -> &[u32] {
        &self.0
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }

    /// Local id of the addressed node within its parent, `None` for the root.
    pub fn last(&self) -> Option<u32> {
        self.0.last().copied()
    }

    pub fn parent(&self) -> Option<TreePath> {
        if self.is_root() {
            return None;
        }
        Some(Self(self.0[..self.0.len() - 1].to_vec()))
    }

    pub fn child(&self, id: u32) -> TreePath {
        let mut segments = Vec::with_capacity(self.0.len() + 1);
        segments.extend_from_slice(&self.0);
        segments.push(id);
        Self(segments)
    }

    /// True when `self` lies strictly below `ancestor`.
    pub fn is_descendant_of(&self, ancestor: &TreePath) -> bool {
        self.0.len() > ancestor.0.len() && self.0.starts_with(&ancestor.0)
    }
}

impl fmt::Display for TreePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            return f.write_str(ROOT_SENTINEL);
        }

        for (index, segment) in self.0.iter().enumerate() {
            if index > 0 {
                f.write_str(":")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

impl FromStr for TreePath {
    type Err = TreePathError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        if value.is_empty() {
            return Err(TreePathError::Empty);
        }
        if value == ROOT_SENTINEL {
            return Ok(Self::root());
        }

        let segments = value
            .split(':')
            .map(|segment| {
                segment
                    .parse::<u32>()
                    .map_err(|_| TreePathError::InvalidSegment(segment.to_owned()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_segments(segments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_prints_paths() {
        let path: TreePath = "1:4:2".parse().unwrap();
        assert_eq!(path.segments(), &[1, 4, 2]);
        assert_eq!(path.to_string(), "1:4:2");
        assert_eq!(path.last(), Some(2));
        assert_eq!(path.parent().unwrap().to_string(), "1:4");
    }

    #[test]
    fn root_sentinel_round_trips() {
        let root: TreePath = "root".parse().unwrap();
        assert!(root.is_root());
        assert_eq!(root.to_string(), "root");
        assert_eq!(root.parent(), None);
        assert_eq!(root.child(3).to_string(), "3");
    }

    #[test]
    fn rejects_malformed_paths() {
        assert_eq!("".parse::<TreePath>(), Err(TreePathError::Empty));
        assert_eq!("1:0".parse::<TreePath>(), Err(TreePathError::ZeroSegment));
        assert_eq!(
            "1:x".parse::<TreePath>(),
            Err(TreePathError::InvalidSegment("x".to_owned()))
        );
        assert!("1::2".parse::<TreePath>().is_err());
    }

    #[test]
    fn descendant_check_is_strict() {
        let parent: TreePath = "2".parse().unwrap();
        let child: TreePath = "2:1".parse().unwrap();
        assert!(child.is_descendant_of(&parent));
        assert!(child.is_descendant_of(&TreePath::root()));
        assert!(!parent.is_descendant_of(&parent));
        assert!(!parent.is_descendant_of(&child));
    }
}
