//! Table dependency graph for filter-aware dump ordering.
//!
//! Provides:
//! - Incremental edge insertion that rejects cycles
//! - Topological sorting for processing order
//! - Ancestor / descendant queries

use super::TableId;
use std::collections::VecDeque;

/// Directed graph over tables, stored as adjacency lists indexed by TableId.
///
/// An edge parent → child means the child's filter reads data from the parent,
/// so the parent must be fully dumped before the child is evaluated.
#[derive(Debug, Default, Clone)]
pub struct DependencyGraph {
    /// For each table, list of parent tables (tables this table's filter reads)
    parents: Vec<Vec<TableId>>,
    /// For each table, list of child tables (tables whose filters read this one)
    children: Vec<Vec<TableId>>,
}

/// Outcome of a successful edge insertion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeOutcome {
    Added,
    /// The edge already existed; nothing changed
    Duplicate,
}

/// The edge would have closed a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleDetected {
    pub parent: TableId,
    pub child: TableId,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a vertex, returning its ID
    pub fn add_vertex(&mut self) -> TableId {
        let id = TableId(self.parents.len() as u32);
        self.parents.push(Vec::new());
        self.children.push(Vec::new());
        id
    }

    /// Add the edge `parent → child`.
    ///
    /// Self-edges and edges whose parent is already reachable from the child
    /// are rejected.
    pub fn add_edge(&mut self, parent: TableId, child: TableId) -> Result<EdgeOutcome, CycleDetected> {
        if self.parents[child.index()].contains(&parent) {
            return Ok(EdgeOutcome::Duplicate);
        }
        if parent == child || self.is_ancestor(child, parent) {
            return Err(CycleDetected { parent, child });
        }
        self.parents[child.index()].push(parent);
        self.children[parent.index()].push(child);
        Ok(EdgeOutcome::Added)
    }

    /// Get the number of tables in the graph
    pub fn len(&self) -> usize {
        self.parents.len()
    }

    /// Check if the graph is empty
    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }

    /// Direct parents of a table
    pub fn parents(&self, id: TableId) -> &[TableId] {
        &self.parents[id.index()]
    }

    /// Direct children of a table
    pub fn children(&self, id: TableId) -> &[TableId] {
        &self.children[id.index()]
    }

    /// Check whether `parent → child` is an edge
    pub fn has_edge(&self, parent: TableId, child: TableId) -> bool {
        self.parents[child.index()].contains(&parent)
    }

    /// Perform topological sort using Kahn's algorithm.
    ///
    /// Returns tables in dependency order (parents before children). Ties are
    /// broken by table ID, so the order is stable for a given configuration.
    /// `add_edge` keeps the graph acyclic, so every table is ordered.
    pub fn topo_sort(&self) -> Vec<TableId> {
        let n = self.len();

        // Calculate in-degrees (number of parents for each table)
        let mut in_degree: Vec<usize> = self.parents.iter().map(Vec::len).collect();

        // Start with tables that have no parents (roots)
        let mut queue: VecDeque<TableId> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, &deg)| deg == 0)
            .map(|(i, _)| TableId(i as u32))
            .collect();

        let mut order = Vec::with_capacity(n);

        while let Some(table_id) = queue.pop_front() {
            order.push(table_id);

            // Reduce in-degree of all children
            for &child_id in &self.children[table_id.index()] {
                in_degree[child_id.index()] -= 1;
                if in_degree[child_id.index()] == 0 {
                    queue.push_back(child_id);
                }
            }
        }

        order
    }

    /// Check if table A is an ancestor of table B (B's filter reads A directly or transitively)
    pub fn is_ancestor(&self, ancestor: TableId, descendant: TableId) -> bool {
        if ancestor == descendant {
            return false;
        }

        let mut visited = vec![false; self.len()];
        let mut queue = VecDeque::new();
        queue.push_back(descendant);

        while let Some(current) = queue.pop_front() {
            for &parent in &self.parents[current.index()] {
                if parent == ancestor {
                    return true;
                }
                if !visited[parent.index()] {
                    visited[parent.index()] = true;
                    queue.push_back(parent);
                }
            }
        }

        false
    }

    /// Get all ancestor tables of a given table (tables it depends on, directly or transitively)
    pub fn ancestors(&self, id: TableId) -> Vec<TableId> {
        self.walk(id, &self.parents)
    }

    /// Get all descendant tables of a given table (tables that depend on it)
    pub fn descendants(&self, id: TableId) -> Vec<TableId> {
        self.walk(id, &self.children)
    }

    fn walk(&self, id: TableId, edges: &[Vec<TableId>]) -> Vec<TableId> {
        let mut found = Vec::new();
        let mut visited = vec![false; self.len()];
        let mut queue = VecDeque::new();

        for &next in &edges[id.index()] {
            queue.push_back(next);
            visited[next.index()] = true;
        }

        while let Some(current) = queue.pop_front() {
            found.push(current);
            for &next in &edges[current.index()] {
                if !visited[next.index()] {
                    visited[next.index()] = true;
                    queue.push_back(next);
                }
            }
        }

        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(n: usize) -> DependencyGraph {
        let mut g = DependencyGraph::new();
        for _ in 0..n {
            g.add_vertex();
        }
        g
    }

    #[test]
    fn test_duplicate_edge_is_not_an_error() {
        let mut g = graph(2);
        assert_eq!(g.add_edge(TableId(0), TableId(1)), Ok(EdgeOutcome::Added));
        assert_eq!(g.add_edge(TableId(0), TableId(1)), Ok(EdgeOutcome::Duplicate));
        assert_eq!(g.parents(TableId(1)), &[TableId(0)]);
    }

    #[test]
    fn test_self_edge_is_a_cycle() {
        let mut g = graph(1);
        assert!(g.add_edge(TableId(0), TableId(0)).is_err());
    }

    #[test]
    fn test_transitive_cycle_rejected() {
        let mut g = graph(3);
        g.add_edge(TableId(0), TableId(1)).unwrap();
        g.add_edge(TableId(1), TableId(2)).unwrap();
        let err = g.add_edge(TableId(2), TableId(0)).unwrap_err();
        assert_eq!(err.parent, TableId(2));
        assert_eq!(err.child, TableId(0));
        // Graph left unchanged
        assert!(g.parents(TableId(0)).is_empty());
        assert_eq!(g.topo_sort().len(), 3);
    }

    #[test]
    fn test_topo_sort_orders_children_after_parents() {
        // Declared child-first to make sure declaration order is not relied on
        let mut g = graph(4);
        g.add_edge(TableId(3), TableId(0)).unwrap();
        g.add_edge(TableId(2), TableId(3)).unwrap();
        g.add_edge(TableId(1), TableId(0)).unwrap();

        let order = g.topo_sort();
        assert_eq!(order.len(), 4);
        let pos = |id: u32| order.iter().position(|&t| t == TableId(id)).unwrap();
        assert!(pos(3) < pos(0));
        assert!(pos(2) < pos(3));
        assert!(pos(1) < pos(0));
    }

    #[test]
    fn test_ancestors_and_descendants() {
        let mut g = graph(4);
        g.add_edge(TableId(0), TableId(1)).unwrap();
        g.add_edge(TableId(1), TableId(2)).unwrap();

        let mut ancestors = g.ancestors(TableId(2));
        ancestors.sort();
        assert_eq!(ancestors, vec![TableId(0), TableId(1)]);
        assert_eq!(g.descendants(TableId(0)).len(), 2);
        assert!(g.is_ancestor(TableId(0), TableId(2)));
        assert!(!g.is_ancestor(TableId(2), TableId(0)));
    }
}
