//! Module dependency graph
//!
//! Edges point from an importing module to the module it imports. An edge
//! is only recorded once it is known not to close a cycle.

use std::collections::{HashMap, HashSet};

/// Normalize path separators in a module key
pub fn normalize_key(key: &str) -> String {
    key.replace('\\', "/")
}

/// Directed import graph keyed by module key
#[derive(Debug, Default)]
pub struct DependencyGraph {
    edges: HashMap<String, Vec<String>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether adding `from -> to` would close a cycle.
    ///
    /// On a cycle the edge is not added and the cycle is returned, starting
    /// and ending at `from`. Otherwise the edge is recorded and `None` is
    /// returned.
    pub fn detect_cycle(&mut self, from: &str, to: &str) -> Option<Vec<String>> {
        let from = normalize_key(from);
        let to = normalize_key(to);

        let mut visited = HashSet::new();
        let mut path = Vec::new();
        if let Some(cycle) = self.find_cycle_path(&to, &from, &mut visited, &mut path) {
            log::debug!("import cycle: {}", cycle.join(" -> "));
            return Some(cycle);
        }

        let targets = self.edges.entry(from).or_default();
        if !targets.contains(&to) {
            targets.push(to);
        }
        None
    }

    /// Depth-first search from `current` looking for `target`
    fn find_cycle_path(
        &self,
        current: &str,
        target: &str,
        visited: &mut HashSet<String>,
        path: &mut Vec<String>,
    ) -> Option<Vec<String>> {
        if current == target {
            let mut cycle = Vec::with_capacity(path.len() + 2);
            cycle.push(target.to_string());
            cycle.extend(path.iter().cloned());
            cycle.push(target.to_string());
            return Some(cycle);
        }
        if !visited.insert(current.to_string()) {
            return None;
        }

        path.push(current.to_string());
        if let Some(next) = self.edges.get(current) {
            for neighbor in next {
                if let Some(cycle) = self.find_cycle_path(neighbor, target, visited, path) {
                    return Some(cycle);
                }
            }
        }
        path.pop();
        None
    }

    /// Modules directly imported by `from`
    pub fn edges(&self, from: &str) -> &[String] {
        self.edges
            .get(&normalize_key(from))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn has_edge(&self, from: &str, to: &str) -> bool {
        self.edges(from).iter().any(|t| *t == normalize_key(to))
    }

    /// Every module that appears in the graph, sorted
    pub fn nodes(&self) -> Vec<&str> {
        let mut nodes: Vec<&str> = self
            .edges
            .iter()
            .flat_map(|(from, to)| std::iter::once(from.as_str()).chain(to.iter().map(String::as_str)))
            .collect();
        nodes.sort_unstable();
        nodes.dedup();
        nodes
    }

    /// Drop the edge `from -> to`, if present
    pub fn remove_edge(&mut self, from: &str, to: &str) -> bool {
        let to = normalize_key(to);
        match self.edges.get_mut(&normalize_key(from)) {
            Some(targets) => {
                let before = targets.len();
                targets.retain(|t| *t != to);
                targets.len() != before
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.edges.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn path(keys: &[&str]) -> Vec<String> {
        keys.iter().map(|k| k.to_string()).collect()
    }

    #[test]
    fn test_three_module_cycle() {
        let mut graph = DependencyGraph::new();
        assert_eq!(graph.detect_cycle("A", "B"), None);
        assert_eq!(graph.detect_cycle("B", "C"), None);
        assert_eq!(graph.detect_cycle("C", "A"), Some(path(&["C", "A", "B", "C"])));
        assert!(!graph.has_edge("C", "A"));
    }

    #[test]
    fn test_two_module_cycle() {
        let mut graph = DependencyGraph::new();
        assert_eq!(graph.detect_cycle("A", "B"), None);
        assert_eq!(graph.detect_cycle("B", "A"), Some(path(&["B", "A", "B"])));
        assert_eq!(graph.edges("B"), &[] as &[String]);
    }

    #[test]
    fn test_self_import() {
        let mut graph = DependencyGraph::new();
        assert_eq!(graph.detect_cycle("A", "A"), Some(path(&["A", "A"])));
    }

    #[test]
    fn test_tree_edges_are_recorded() {
        let mut graph = DependencyGraph::new();
        let edges = [("A", "B"), ("A", "C"), ("B", "D"), ("C", "E")];
        for (from, to) in edges {
            assert_eq!(graph.detect_cycle(from, to), None);
        }
        for (from, to) in edges {
            assert!(graph.has_edge(from, to), "missing edge {} -> {}", from, to);
        }
        assert_eq!(graph.edges("A"), &["B".to_string(), "C".to_string()]);
    }

    #[test]
    fn test_diamond_is_not_a_cycle() {
        let mut graph = DependencyGraph::new();
        assert_eq!(graph.detect_cycle("A", "B"), None);
        assert_eq!(graph.detect_cycle("A", "C"), None);
        assert_eq!(graph.detect_cycle("B", "D"), None);
        assert_eq!(graph.detect_cycle("C", "D"), None);
        assert_eq!(graph.detect_cycle("B", "C"), None);
        assert_eq!(graph.nodes(), vec!["A", "B", "C", "D"]);
        for (from, to) in [("A", "B"), ("A", "C"), ("B", "D"), ("C", "D"), ("B", "C")] {
            assert!(graph.has_edge(from, to), "missing edge {} -> {}", from, to);
        }
    }

    #[test]
    fn test_separators_are_normalized() {
        let mut graph = DependencyGraph::new();
        assert_eq!(graph.detect_cycle("lib\\a", "lib/b"), None);
        assert!(graph.has_edge("lib/a", "lib\\b"));
        assert_eq!(
            graph.detect_cycle("lib/b", "lib\\a"),
            Some(path(&["lib/b", "lib/a", "lib/b"]))
        );
    }

    #[test]
    fn test_duplicate_edges_are_recorded_once() {
        let mut graph = DependencyGraph::new();
        graph.detect_cycle("A", "B");
        graph.detect_cycle("A", "B");
        assert_eq!(graph.edges("A"), &["B".to_string()]);
    }

    #[test]
    fn test_removed_edge_no_longer_closes_a_cycle() {
        let mut graph = DependencyGraph::new();
        assert_eq!(graph.detect_cycle("A", "B"), None);
        assert!(graph.remove_edge("A", "B"));
        assert!(!graph.remove_edge("A", "B"));
        assert!(!graph.has_edge("A", "B"));
        assert_eq!(graph.detect_cycle("B", "A"), None);
    }
}
