use std::fmt;

/// Externally assigned `(section, row)` identifier of a node.
///
/// Index paths come from the data source and shift when nodes are inserted
/// or deleted before them in the same section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IndexPath {
    pub section: usize,
    pub row: usize,
}

impl IndexPath {
    pub const fn new(section: usize, row: usize) -> Self {
        Self { section, row }
    }
}

impl fmt::Display for IndexPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.section, self.row)
    }
}

/// External identity of a connection: the index paths of its endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionPath {
    pub parent: IndexPath,
    pub child: IndexPath,
}

impl ConnectionPath {
    pub const fn new(parent: IndexPath, child: IndexPath) -> Self {
        Self { parent, child }
    }
}

impl fmt::Display for ConnectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.parent, self.child)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_path_display() {
        assert_eq!(IndexPath::new(0, 2).to_string(), "(0, 2)");
    }

    #[test]
    fn test_connection_path_display() {
        let path = ConnectionPath::new(IndexPath::new(0, 0), IndexPath::new(1, 3));
        assert_eq!(path.to_string(), "(0, 0) -> (1, 3)");
    }

    #[test]
    fn test_index_paths_order_by_section_then_row() {
        let mut paths = vec![IndexPath::new(1, 0), IndexPath::new(0, 5), IndexPath::new(0, 1)];
        paths.sort();
        assert_eq!(
            paths,
            vec![IndexPath::new(0, 1), IndexPath::new(0, 5), IndexPath::new(1, 0)]
        );
    }
}
