use std::collections::HashMap;

use indexmap::IndexSet;

use crate::{container::Container, token::ModuleToken};

/// Tree over the module import graph
///
/// Every module appears once, below the importer that puts it deepest. Nodes are
/// addressed by index, parent and child links are plain indices.
pub struct TopologyTree {
    nodes: Vec<ModuleToken>,
    links: HashMap<ModuleToken, usize>,
    parents: Vec<Option<usize>>,
    children: Vec<IndexSet<usize>>,
}

impl TopologyTree {
    pub fn new(container: &Container, root: &ModuleToken) -> Self {
        let mut tree = TopologyTree {
            nodes: Vec::new(),
            links: HashMap::new(),
            parents: Vec::new(),
            children: Vec::new(),
        };
        let root = tree.push(root.clone(), None);
        tree.traverse(container, root, 1);
        tree
    }

    fn push(&mut self, token: ModuleToken, parent: Option<usize>) -> usize {
        let index = self.nodes.len();
        self.nodes.push(token.clone());
        self.links.insert(token, index);
        self.parents.push(parent);
        self.children.push(IndexSet::new());
        if let Some(parent) = parent {
            self.children[parent].insert(index);
        }
        index
    }

    fn traverse(&mut self, container: &Container, node: usize, depth: usize) {
        let Ok(module) = container.module(&self.nodes[node]) else {
            return;
        };
        for child in module.imports() {
            if let Some(&existing) = self.links.get(child) {
                if self.has_cycle_with(node, existing) {
                    continue;
                }
                if self.depth(existing) < depth {
                    self.relink(existing, node);
                }
                continue;
            }

            let child = self.push(child.clone(), Some(node));
            self.traverse(container, child, depth + 1);
        }
    }

    /// True if `other` is `node` or one of its ancestors
    fn has_cycle_with(&self, node: usize, other: usize) -> bool {
        let mut current = Some(node);
        while let Some(index) = current {
            if index == other {
                return true;
            }
            current = self.parents[index];
        }
        false
    }

    fn relink(&mut self, node: usize, parent: usize) {
        if let Some(previous) = self.parents[node] {
            self.children[previous].shift_remove(&node);
        }
        self.parents[node] = Some(parent);
        self.children[parent].insert(node);
    }

    /// Distance of a node from the root
    pub fn depth(&self, node: usize) -> usize {
        let mut depth = 0;
        let mut current = self.parents[node];
        while let Some(parent) = current {
            depth += 1;
            current = self.parents[parent];
        }
        depth
    }

    pub fn depth_of(&self, token: &ModuleToken) -> Option<usize> {
        self.links.get(token).map(|&node| self.depth(node))
    }

    /// Visits every module depth first, parents before children
    pub fn walk(&self, mut visit: impl FnMut(&ModuleToken, usize)) {
        if self.nodes.is_empty() {
            return;
        }
        let mut stack = vec![(0, 0)];
        while let Some((node, depth)) = stack.pop() {
            visit(&self.nodes[node], depth);
            for &child in self.children[node].iter().rev() {
                stack.push((child, depth + 1));
            }
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Assigns every non global module its depth below `root`
///
/// Global modules keep `usize::MAX` so they come first in distance ordered lifecycles.
pub fn calculate_distances(container: &mut Container, root: &ModuleToken) {
    let tree = TopologyTree::new(container, root);
    let mut distances = Vec::with_capacity(tree.len());
    tree.walk(|token, depth| distances.push((token.clone(), depth)));

    for (token, depth) in distances {
        if !container.is_global_module(&token) {
            container.set_distance(&token, depth);
        }
    }
    let globals = container
        .global_modules()
        .map(|module| module.token().clone())
        .collect::<Vec<_>>();
    for token in globals {
        container.set_distance(&token, usize::MAX);
    }
}
