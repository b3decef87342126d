//! Component dependency graph
//!
//! Parents compose children, so children are generated first. Edges run
//! parent to child. A batch that passed [`crate::schema::validate_batch`] is
//! acyclic; state edited by hand may not be, so cycles are collapsed into a
//! single wave instead of being followed.

use std::collections::{BTreeMap, BTreeSet};

use petgraph::Direction;
use petgraph::algo::{condensation, kosaraju_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Dfs, Reversed};

use crate::component::ComponentSpec;

/// Parent/child relations of a batch
#[derive(Debug, Clone, Default)]
pub struct ComponentGraph {
    graph: DiGraph<String, ()>,
    index: BTreeMap<String, NodeIndex>,
    children: BTreeMap<String, Vec<String>>,
}

impl ComponentGraph {
    /// Build the graph from a batch of specs
    pub fn new<'a>(specs: impl IntoIterator<Item = &'a ComponentSpec>) -> Self {
        let mut graph = Self::default();
        let specs: Vec<&ComponentSpec> = specs.into_iter().collect();
        for spec in &specs {
            graph.node(&spec.name);
            graph
                .children
                .insert(spec.name.clone(), spec.children.clone());
        }
        for spec in &specs {
            let parent = graph.node(&spec.name);
            for child in &spec.children {
                let child = graph.node(child);
                graph.graph.update_edge(parent, child, ());
            }
        }
        graph
    }

    fn node(&mut self, name: &str) -> NodeIndex {
        if let Some(index) = self.index.get(name) {
            return *index;
        }
        let index = self.graph.add_node(name.to_string());
        self.index.insert(name.to_string(), index);
        index
    }

    /// Direct children of a component, in declaration order
    pub fn children_of(&self, name: &str) -> &[String] {
        self.children.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Direct parents of a component
    pub fn parents_of(&self, name: &str) -> impl Iterator<Item = &String> {
        self.index
            .get(name)
            .into_iter()
            .flat_map(|i| self.graph.neighbors_directed(*i, Direction::Incoming))
            .map(|p| &self.graph[p])
    }

    /// Every transitive ancestor of a component
    pub fn ancestors(&self, name: &str) -> BTreeSet<String> {
        let Some(start) = self.index.get(name).copied() else {
            return BTreeSet::new();
        };
        let reversed = Reversed(&self.graph);
        let mut dfs = Dfs::new(reversed, start);
        let mut out = BTreeSet::new();
        while let Some(node) = dfs.next(reversed) {
            if node != start {
                out.insert(self.graph[node].clone());
            }
        }
        out
    }

    /// Every transitive descendant of a component
    pub fn descendants(&self, name: &str) -> BTreeSet<String> {
        let Some(start) = self.index.get(name).copied() else {
            return BTreeSet::new();
        };
        let mut dfs = Dfs::new(&self.graph, start);
        let mut out = BTreeSet::new();
        while let Some(node) = dfs.next(&self.graph) {
            if node != start {
                out.insert(self.graph[node].clone());
            }
        }
        out
    }

    /// True if some component is, transitively, its own child
    pub fn is_cyclic(&self) -> bool {
        toposort(&self.graph, None).is_err()
    }

    /// One cycle as a path that starts and ends on the same component
    pub fn cycle(&self) -> Option<Vec<String>> {
        let component = kosaraju_scc(&self.graph).into_iter().find(|scc| {
            scc.len() > 1 || self.graph.contains_edge(scc[0], scc[0])
        })?;
        let members: BTreeSet<NodeIndex> = component.iter().copied().collect();

        // Every member of a strongly connected component has a successor
        // inside it, so this walk revisits a node.
        let start = component
            .iter()
            .copied()
            .min_by(|a, b| self.graph[*a].cmp(&self.graph[*b]))?;
        let mut path = vec![start];
        loop {
            let current = *path.last()?;
            let next = self
                .graph
                .neighbors_directed(current, Direction::Outgoing)
                .filter(|n| members.contains(n))
                .min_by(|a, b| self.graph[*a].cmp(&self.graph[*b]))?;
            if let Some(at) = path.iter().position(|n| *n == next) {
                let mut cycle: Vec<String> =
                    path[at..].iter().map(|n| self.graph[*n].clone()).collect();
                cycle.push(self.graph[next].clone());
                return Some(cycle);
            }
            path.push(next);
        }
    }

    /// Components grouped into waves, children before parents.
    ///
    /// Every component in a wave depends only on components in earlier
    /// waves, so the members of one wave can be generated concurrently.
    /// Components on a cycle share a wave.
    pub fn waves(&self) -> Vec<Vec<String>> {
        let condensed = condensation(self.graph.clone(), true);
        let Ok(order) = toposort(&condensed, None) else {
            return Vec::new();
        };

        let mut height = vec![0usize; condensed.node_count()];
        for node in order.into_iter().rev() {
            height[node.index()] = condensed
                .neighbors_directed(node, Direction::Outgoing)
                .map(|child| height[child.index()] + 1)
                .max()
                .unwrap_or(0);
        }

        let depth = height.iter().copied().max().map_or(0, |m| m + 1);
        let mut waves = vec![Vec::new(); depth];
        for node in condensed.node_indices() {
            waves[height[node.index()]].extend(condensed[node].iter().cloned());
        }
        for wave in &mut waves {
            wave.sort();
        }
        waves
    }

    /// All components in dependency order, children before parents
    pub fn dependency_order(&self) -> Vec<String> {
        self.waves().into_iter().flatten().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> Vec<ComponentSpec> {
        // App -> (Header, TodoList), TodoList -> TodoItem, Header -> Logo
        let mut app = ComponentSpec::new("App");
        app.children = vec!["Header".into(), "TodoList".into()];
        let mut header = ComponentSpec::new("Header");
        header.children = vec!["Logo".into()];
        let mut list = ComponentSpec::new("TodoList");
        list.children = vec!["TodoItem".into()];
        vec![
            app,
            header,
            list,
            ComponentSpec::new("TodoItem"),
            ComponentSpec::new("Logo"),
        ]
    }

    #[test]
    fn test_waves_put_children_first() {
        let graph = ComponentGraph::new(&tree());
        let waves = graph.waves();
        assert_eq!(waves.len(), 3);
        assert_eq!(waves[0], vec!["Logo".to_string(), "TodoItem".to_string()]);
        assert_eq!(waves[1], vec!["Header".to_string(), "TodoList".to_string()]);
        assert_eq!(waves[2], vec!["App".to_string()]);
    }

    #[test]
    fn test_dependency_order_respects_edges() {
        let specs = tree();
        let graph = ComponentGraph::new(&specs);
        let order = graph.dependency_order();
        let pos = |n: &str| order.iter().position(|x| x == n).unwrap();
        for spec in &specs {
            for child in &spec.children {
                assert!(pos(child) < pos(&spec.name));
            }
        }
    }

    #[test]
    fn test_ancestors_and_descendants() {
        let graph = ComponentGraph::new(&tree());
        let ancestors = graph.ancestors("TodoItem");
        assert_eq!(
            ancestors.into_iter().collect::<Vec<_>>(),
            vec!["App".to_string(), "TodoList".to_string()]
        );
        assert_eq!(graph.descendants("Header").len(), 1);
        assert!(graph.ancestors("App").is_empty());
    }

    #[test]
    fn test_shared_child_has_two_parents() {
        let mut specs = tree();
        specs[1].children.push("TodoItem".into());
        let graph = ComponentGraph::new(&specs);
        assert_eq!(graph.parents_of("TodoItem").count(), 2);
    }

    #[test]
    fn test_cyclic_graph_still_yields_waves() {
        let mut a = ComponentSpec::new("Alpha");
        a.children = vec!["Beta".into()];
        let mut b = ComponentSpec::new("Beta");
        b.children = vec!["Alpha".into(), "Leaf".into()];
        let mut root = ComponentSpec::new("Root");
        root.children = vec!["Alpha".into()];
        let specs = vec![root, a, b, ComponentSpec::new("Leaf")];

        let graph = ComponentGraph::new(&specs);
        assert!(graph.is_cyclic());
        assert_eq!(
            graph.waves(),
            vec![
                vec!["Leaf".to_string()],
                vec!["Alpha".to_string(), "Beta".to_string()],
                vec!["Root".to_string()],
            ]
        );
        assert_eq!(
            graph.cycle(),
            Some(vec!["Alpha".to_string(), "Beta".to_string(), "Alpha".to_string()])
        );
        assert_eq!(graph.descendants("Root").len(), 3);
    }

    #[test]
    fn test_long_chain_does_not_recurse() {
        let specs: Vec<ComponentSpec> = (0..5_000)
            .map(|i| {
                let mut spec = ComponentSpec::new(format!("Node{}", i));
                if i + 1 < 5_000 {
                    spec.children = vec![format!("Node{}", i + 1)];
                }
                spec
            })
            .collect();
        let graph = ComponentGraph::new(&specs);
        assert!(!graph.is_cyclic());
        assert_eq!(graph.waves().len(), 5_000);
        assert_eq!(graph.cycle(), None);
    }
}
