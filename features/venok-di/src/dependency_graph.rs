use std::{
    collections::{BTreeMap, HashSet},
    sync::Arc,
};

use thiserror::Error;

use crate::{
    container::{Container, DependencyLookup},
    errors::InjectError,
    instance_wrapper::InstanceWrapper,
};

/// Graph of the entire application
/// Used to check circular and unknown dependencies before anything is instantiated
pub struct DependencyGraph {
    map: BTreeMap<u64, DependencyGraphEntry>,
    errors: Vec<InjectError>,
}

impl DependencyGraph {
    pub fn new(container: &Container) -> Self {
        let mut graph = Self {
            map: Default::default(),
            errors: Vec::new(),
        };

        for wrapper in container.wrappers() {
            graph.add(container, wrapper);
        }

        graph
    }

    fn add(&mut self, container: &Container, wrapper: &Arc<InstanceWrapper>) {
        if self.map.contains_key(&wrapper.id()) {
            return;
        }

        let mut dependencies = Vec::new();
        for (index, dependency) in Container::dependencies_of(wrapper).iter().enumerate() {
            match container.lookup_dependency(wrapper, index, dependency) {
                Ok(DependencyLookup::Wrapper(found)) => dependencies.push(found.id()),
                Ok(DependencyLookup::ModuleRef | DependencyLookup::Missing) => {}
                // Missing dependencies are reported once, here
                Err(error) => self.errors.push(error),
            }
        }

        self.map.insert(
            wrapper.id(),
            DependencyGraphEntry {
                name: wrapper.name().to_string(),
                dependencies,
            },
        );
    }

    /// Validate the graph
    ///
    /// Returns a list of all issues
    pub fn check(&self) -> Result<(), DependencyGraphErrors> {
        let mut checked = HashSet::new();
        let mut errors = self.errors.clone();
        for (id, entry) in &self.map {
            let mut dependency_chain = Vec::new();
            check_recurse(
                self,
                &mut checked,
                &mut errors,
                &mut dependency_chain,
                *id,
                entry,
            );
        }

        if !errors.is_empty() {
            return Err(DependencyGraphErrors { errors });
        }

        return Ok(());

        fn check_recurse(
            graph: &DependencyGraph,
            checked: &mut HashSet<u64>,
            errors: &mut Vec<InjectError>,
            dependency_chain: &mut Vec<(u64, String)>,
            id: u64,
            entry: &DependencyGraphEntry,
        ) {
            // Circular Dependency Check
            if let Some(start) = dependency_chain.iter().position(|(seen, _)| *seen == id) {
                let mut chain = dependency_chain[start..]
                    .iter()
                    .map(|(_, name)| name.clone())
                    .collect::<Vec<_>>();
                chain.push(entry.name.clone());
                errors.push(InjectError::CircularDependency { chain });
                return;
            }

            // Skip other checks if already checked
            if !checked.insert(id) {
                return;
            };

            dependency_chain.push((id, entry.name.clone()));

            for dependency in &entry.dependencies {
                if let Some(next_entry) = graph.map.get(dependency) {
                    check_recurse(graph, checked, errors, dependency_chain, *dependency, next_entry);
                }
            }

            dependency_chain.pop();
        }
    }
}

struct DependencyGraphEntry {
    name: String,
    dependencies: Vec<u64>,
}

impl std::fmt::Display for DependencyGraphErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut display = Vec::new();
        display.push("The dependency graph had one or more errors:".to_string());
        for error in &self.errors {
            display.push(format!("- {}", error));
        }
        f.write_str(&display.join("\n"))
    }
}

#[derive(Error, Debug, Clone)]
pub struct DependencyGraphErrors {
    pub errors: Vec<InjectError>,
}

impl DependencyGraphErrors {
    pub fn unknown_dependencies(&self) -> impl Iterator<Item = &InjectError> {
        self.errors
            .iter()
            .filter(|error| matches!(error, InjectError::UnknownDependency { .. }))
    }

    pub fn circular_dependencies(&self) -> impl Iterator<Item = &InjectError> {
        self.errors
            .iter()
            .filter(|error| matches!(error, InjectError::CircularDependency { .. }))
    }
}
