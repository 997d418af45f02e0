//! Directed acyclic dependency graph over string ids
//!
//! An edge `A -> B` means "A requires the value of B". The graph never contains a loop: edges
//! that would close one are rejected when they are added and leave the graph untouched.
use crate::error::{Error, Result};
use indexmap::{IndexMap, IndexSet};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DependencyGraph {
    /// vertex -> the vertices it depends on
    edges: IndexMap<String, IndexSet<String>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adding an existing vertex is a no-op
    pub fn add_vertex(&mut self, id: impl Into<String>) {
        self.edges.entry(id.into()).or_default();
    }

    pub fn contains(&self, id: &str) -> bool {
        self.edges.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.values().map(IndexSet::len).sum()
    }

    /// Vertices in insertion order
    pub fn vertices(&self) -> impl Iterator<Item = &str> {
        self.edges.keys().map(String::as_str)
    }

    /// Direct dependencies of `id`
    pub fn dependencies_of(&self, id: &str) -> Option<impl Iterator<Item = &str>> {
        self.edges
            .get(id)
            .map(|dependencies| dependencies.iter().map(String::as_str))
    }

    /// Record that `from` depends on every vertex in `to`
    ///
    /// Missing vertices are added. Either all edges are added or, on error, none.
    pub fn add_edges<I, S>(&mut self, from: &str, to: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let to: Vec<String> = to.into_iter().map(Into::into).collect();

        for dependency in &to {
            if dependency == from {
                return Err(Error::SelfReferencingDependency {
                    vertex: from.to_string(),
                });
            }

            if self.reaches(dependency, from) {
                return Err(Error::CyclicDependency {
                    from: from.to_string(),
                    to: dependency.clone(),
                });
            }
        }

        self.add_vertex(from);
        for dependency in to {
            tracing::trace!(from = %from, to = %dependency, "add edge");
            self.add_vertex(dependency.as_str());
            if let Some(dependencies) = self.edges.get_mut(from) {
                dependencies.insert(dependency);
            }
        }

        Ok(())
    }

    /// Remove `id` and every edge that starts or ends at it
    pub fn remove_vertex(&mut self, id: &str) -> bool {
        if self.edges.shift_remove(id).is_none() {
            return false;
        }

        for dependencies in self.edges.values_mut() {
            dependencies.shift_remove(id);
        }
        true
    }

    /// `id` and everything it (transitively) depends on, with the edges between them
    pub fn subgraph(&self, id: &str) -> Result<DependencyGraph> {
        if !self.contains(id) {
            return Err(Error::UnknownVertex(id.to_string()));
        }

        let mut reachable: IndexSet<&str> = IndexSet::new();
        let mut pending = vec![id];
        while let Some(vertex) = pending.pop() {
            if !reachable.insert(vertex) {
                continue;
            }
            if let Some(dependencies) = self.edges.get(vertex) {
                pending.extend(dependencies.iter().map(String::as_str));
            }
        }

        let edges = reachable
            .iter()
            .map(|vertex| (vertex.to_string(), self.edges[*vertex].clone()))
            .collect();

        Ok(DependencyGraph { edges })
    }

    /// Every vertex exactly once, dependencies before their dependents
    ///
    /// Ties are broken by (shorter id first, then lexicographic order) so equal graphs always sort
    /// the same way.
    pub fn topological_sort(&self) -> Vec<String> {
        let mut unresolved: IndexMap<&str, usize> = IndexMap::with_capacity(self.edges.len());
        let mut dependents: IndexMap<&str, Vec<&str>> = IndexMap::new();
        for (vertex, dependencies) in &self.edges {
            unresolved.insert(vertex, dependencies.len());
            for dependency in dependencies {
                dependents.entry(dependency).or_default().push(vertex);
            }
        }

        let mut ready: BTreeSet<(usize, &str)> = unresolved
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(vertex, _)| (vertex.len(), *vertex))
            .collect();

        let mut order = Vec::with_capacity(self.edges.len());
        while let Some((_, vertex)) = ready.pop_first() {
            order.push(vertex.to_string());

            for dependent in dependents.get(vertex).into_iter().flatten() {
                if let Some(count) = unresolved.get_mut(dependent) {
                    *count -= 1;
                    if *count == 0 {
                        ready.insert((dependent.len(), *dependent));
                    }
                }
            }
        }

        debug_assert_eq!(order.len(), self.edges.len(), "graph contains a loop");
        order
    }

    /// `true` if `target` can be reached from `start` by following dependencies
    fn reaches(&self, start: &str, target: &str) -> bool {
        let mut seen: IndexSet<&str> = IndexSet::new();
        let mut pending = vec![start];

        while let Some(vertex) = pending.pop() {
            if vertex == target {
                return true;
            }
            if !seen.insert(vertex) {
                continue;
            }
            if let Some(dependencies) = self.edges.get(vertex) {
                pending.extend(dependencies.iter().map(String::as_str));
            }
        }

        false
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn position(order: &[String], vertex: &str) -> usize {
        order
            .iter()
            .position(|v| v == vertex)
            .unwrap_or_else(|| panic!("{vertex} missing from {order:?}"))
    }

    fn assert_valid_order(graph: &DependencyGraph) {
        let order = graph.topological_sort();
        assert_eq!(order.len(), graph.len());

        let unique: IndexSet<&String> = order.iter().collect();
        assert_eq!(unique.len(), order.len(), "duplicates in {order:?}");

        for vertex in graph.vertices() {
            for dependency in graph.dependencies_of(vertex).unwrap() {
                assert!(
                    position(&order, dependency) < position(&order, vertex),
                    "{dependency} must come before {vertex} in {order:?}"
                );
            }
        }
    }

    #[test]
    fn add_vertex_is_idempotent() {
        let mut graph = DependencyGraph::new();
        graph.add_vertex("a");
        graph.add_edges("a", ["b"]).unwrap();
        graph.add_vertex("a");

        assert_eq!(graph.len(), 2);
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn self_reference_is_rejected() {
        let mut graph = DependencyGraph::new();
        graph.add_edges("a", ["b"]).unwrap();
        let before = graph.clone();

        let err = graph.add_edges("a", ["c", "a"]).unwrap_err();
        assert!(matches!(err, Error::SelfReferencingDependency { vertex } if vertex == "a"));
        assert_eq!(graph, before);
    }

    #[test]
    fn cycles_are_rejected() {
        let mut graph = DependencyGraph::new();
        graph.add_edges("a", ["b"]).unwrap();
        graph.add_edges("b", ["c"]).unwrap();
        let before = graph.clone();

        let err = graph.add_edges("c", ["d", "a"]).unwrap_err();
        assert!(matches!(err, Error::CyclicDependency { from, to } if from == "c" && to == "a"));
        assert_eq!(graph, before);
        assert!(!graph.contains("d"));
    }

    #[test]
    fn diamond_is_not_a_cycle() {
        let mut graph = DependencyGraph::new();
        graph.add_edges("top", ["left", "right"]).unwrap();
        graph.add_edges("left", ["bottom"]).unwrap();
        graph.add_edges("right", ["bottom"]).unwrap();

        assert_valid_order(&graph);
        assert_eq!(graph.topological_sort(), vec!["bottom", "left", "right", "top"]);
    }

    #[test]
    fn ties_break_by_length_then_name() {
        let mut graph = DependencyGraph::new();
        for vertex in ["ccc", "bb", "b", "a", "aa"] {
            graph.add_vertex(vertex);
        }

        assert_eq!(graph.topological_sort(), vec!["a", "b", "aa", "bb", "ccc"]);
    }

    #[test]
    fn order_is_independent_of_insertion() {
        let mut one = DependencyGraph::new();
        one.add_edges("x.y", ["a"]).unwrap();
        one.add_vertex("b");

        let mut two = DependencyGraph::new();
        two.add_vertex("b");
        two.add_vertex("a");
        two.add_edges("x.y", ["a"]).unwrap();

        assert_eq!(one.topological_sort(), two.topological_sort());
    }

    #[test]
    fn larger_graph_sorts_dependencies_first() {
        let mut graph = DependencyGraph::new();
        for i in 0..40usize {
            let dependencies: Vec<String> = (0..i)
                .filter(|j| (i * 7 + j * 3) % 5 == 0)
                .map(|j| format!("v{j}"))
                .collect();
            graph.add_edges(&format!("v{i}"), dependencies).unwrap();
        }

        assert_eq!(graph.len(), 40);
        assert_valid_order(&graph);

        // every back edge closes a loop
        for vertex in graph.vertices().map(str::to_string).collect::<Vec<_>>() {
            let dependencies: Vec<String> = graph
                .dependencies_of(&vertex)
                .unwrap()
                .map(str::to_string)
                .collect();
            for dependency in dependencies {
                let before = graph.clone();
                assert!(graph.add_edges(&dependency, [vertex.as_str()]).is_err());
                assert_eq!(graph, before);
            }
        }
    }

    #[test]
    fn remove_vertex_cascades() {
        let mut graph = DependencyGraph::new();
        graph.add_edges("a", ["b", "c"]).unwrap();
        graph.add_edges("b", ["c"]).unwrap();

        assert!(graph.remove_vertex("c"));
        assert!(!graph.remove_vertex("c"));
        assert_eq!(graph.len(), 2);
        assert_eq!(graph.edge_count(), 1);

        // the removed edge no longer blocks the reverse direction
        graph.add_edges("c", ["a"]).unwrap();
    }

    #[test]
    fn subgraph_contains_transitive_dependencies() {
        let mut graph = DependencyGraph::new();
        graph.add_edges("a", ["b"]).unwrap();
        graph.add_edges("b", ["c"]).unwrap();
        graph.add_edges("d", ["c"]).unwrap();
        graph.add_vertex("e");

        let sub = graph.subgraph("a").unwrap();
        let mut vertices: Vec<&str> = sub.vertices().collect();
        vertices.sort();
        assert_eq!(vertices, vec!["a", "b", "c"]);
        assert_eq!(sub.edge_count(), 2);
        assert_eq!(sub.topological_sort(), vec!["c", "b", "a"]);

        assert!(matches!(graph.subgraph("zzz"), Err(Error::UnknownVertex(_))));
    }
}
