// ABOUTME: Task registry holding definitions with category and tag indexes
// ABOUTME: Supports lookup, removal, export and dependency validation with cycle path reporting

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

use super::definition::TaskDefinition;
use super::schema::{OutputSpec, ParamSpec};
use crate::engine::error::{EngineError, Result};

#[derive(Debug, Default)]
pub struct TaskRegistry {
    tasks: IndexMap<String, Arc<TaskDefinition>>,
    categories: HashMap<String, IndexSet<String>>,
    tags: HashMap<String, IndexSet<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencyProblem {
    MissingDependency { task: String, dependency: String },
    UnknownConflict { task: String, conflict: String },
    Cycle { path: Vec<String> },
}

impl std::fmt::Display for DependencyProblem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DependencyProblem::MissingDependency { task, dependency } => {
                write!(f, "Task '{}' depends on unknown task '{}'", task, dependency)
            }
            DependencyProblem::UnknownConflict { task, conflict } => {
                write!(f, "Task '{}' conflicts with unknown task '{}'", task, conflict)
            }
            DependencyProblem::Cycle { path } => {
                write!(f, "Circular dependency: {}", path.join(" -> "))
            }
        }
    }
}

/// Serializable view of a registered task
#[derive(Debug, Clone, Serialize)]
pub struct TaskSummary {
    pub name: String,
    pub description: String,
    pub category: String,
    pub version: String,
    pub priority: i32,
    pub tags: Vec<String>,
    pub dependencies: Vec<String>,
    pub inputs: IndexMap<String, ParamSpec>,
    pub outputs: IndexMap<String, OutputSpec>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, definition: TaskDefinition) -> Result<()> {
        let id = definition.id().to_string();
        if self.tasks.contains_key(&id) {
            return Err(EngineError::DuplicateId { task_id: id });
        }

        self.categories
            .entry(definition.metadata.category.clone())
            .or_default()
            .insert(id.clone());
        for tag in &definition.metadata.tags {
            self.tags.entry(tag.clone()).or_default().insert(id.clone());
        }

        debug!("Registered task: {}", id);
        self.tasks.insert(id, Arc::new(definition));
        Ok(())
    }

    pub fn unregister(&mut self, task_id: &str) -> bool {
        let Some(definition) = self.tasks.shift_remove(task_id) else {
            return false;
        };

        let category = &definition.metadata.category;
        if let Some(ids) = self.categories.get_mut(category) {
            ids.shift_remove(task_id);
            if ids.is_empty() {
                self.categories.remove(category);
            }
        }

        for tag in &definition.metadata.tags {
            if let Some(ids) = self.tags.get_mut(tag) {
                ids.shift_remove(task_id);
                if ids.is_empty() {
                    self.tags.remove(tag);
                }
            }
        }

        debug!("Unregistered task: {}", task_id);
        true
    }

    pub fn get(&self, task_id: &str) -> Option<Arc<TaskDefinition>> {
        self.tasks.get(task_id).cloned()
    }

    pub fn get_by_category(&self, category: &str) -> Vec<Arc<TaskDefinition>> {
        self.categories
            .get(category)
            .map(|ids| ids.iter().filter_map(|id| self.get(id)).collect())
            .unwrap_or_default()
    }

    /// Tasks carrying all (`match_all`) or any of `tags`, in registration order
    pub fn get_by_tags<S: AsRef<str>>(&self, tags: &[S], match_all: bool) -> Vec<Arc<TaskDefinition>> {
        if tags.is_empty() {
            return Vec::new();
        }

        let buckets: Vec<Option<&IndexSet<String>>> =
            tags.iter().map(|tag| self.tags.get(tag.as_ref())).collect();

        self.tasks
            .iter()
            .filter(|(id, _)| {
                let mut hits = buckets
                    .iter()
                    .map(|bucket| bucket.is_some_and(|ids| ids.contains(id.as_str())));
                if match_all {
                    hits.all(|hit| hit)
                } else {
                    hits.any(|hit| hit)
                }
            })
            .map(|(_, definition)| Arc::clone(definition))
            .collect()
    }

    pub fn list_all(&self) -> Vec<Arc<TaskDefinition>> {
        self.tasks.values().cloned().collect()
    }

    pub fn task_ids(&self) -> Vec<String> {
        self.tasks.keys().cloned().collect()
    }

    pub fn list_categories(&self) -> Vec<String> {
        let sorted: BTreeSet<&String> = self.categories.keys().collect();
        sorted.into_iter().cloned().collect()
    }

    pub fn list_tags(&self) -> Vec<String> {
        let sorted: BTreeSet<&String> = self.tags.keys().collect();
        sorted.into_iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn contains(&self, task_id: &str) -> bool {
        self.tasks.contains_key(task_id)
    }

    /// Tasks that list `task_id` among their dependencies
    pub fn get_dependents(&self, task_id: &str) -> Vec<Arc<TaskDefinition>> {
        self.tasks
            .values()
            .filter(|definition| definition.metadata.dependencies.contains(task_id))
            .cloned()
            .collect()
    }

    pub fn export(&self) -> IndexMap<String, TaskSummary> {
        self.tasks
            .iter()
            .map(|(id, definition)| {
                let metadata = &definition.metadata;
                let summary = TaskSummary {
                    name: metadata.name.clone(),
                    description: metadata.description.clone(),
                    category: metadata.category.clone(),
                    version: metadata.version.clone(),
                    priority: metadata.priority,
                    tags: metadata.tags.iter().cloned().collect(),
                    dependencies: metadata.dependencies.iter().cloned().collect(),
                    inputs: definition.schema.inputs.clone(),
                    outputs: definition.schema.outputs.clone(),
                };
                (id.clone(), summary)
            })
            .collect()
    }

    /// Report unknown references and cycles. Never modifies the registry.
    pub fn validate_dependencies(&self) -> Vec<DependencyProblem> {
        let mut problems = Vec::new();

        for (id, definition) in &self.tasks {
            for dependency in &definition.metadata.dependencies {
                if !self.tasks.contains_key(dependency) {
                    problems.push(DependencyProblem::MissingDependency {
                        task: id.clone(),
                        dependency: dependency.clone(),
                    });
                }
            }
            for conflict in &definition.metadata.conflicts {
                if !self.tasks.contains_key(conflict) {
                    problems.push(DependencyProblem::UnknownConflict {
                        task: id.clone(),
                        conflict: conflict.clone(),
                    });
                }
            }
        }

        let mut visited = HashSet::new();
        for id in self.tasks.keys() {
            if !visited.contains(id.as_str()) {
                let mut path = Vec::new();
                self.find_cycles(id, &mut visited, &mut path, &mut problems);
            }
        }

        if problems.is_empty() {
            info!("Dependency validation passed for {} tasks", self.tasks.len());
        }
        problems
    }

    /// Depth-first walk along dependency edges. `path` is the recursion stack.
    fn find_cycles<'a>(
        &'a self,
        id: &'a str,
        visited: &mut HashSet<&'a str>,
        path: &mut Vec<&'a str>,
        problems: &mut Vec<DependencyProblem>,
    ) {
        visited.insert(id);
        path.push(id);

        if let Some(definition) = self.tasks.get(id) {
            for dependency in &definition.metadata.dependencies {
                if let Some(start) = path.iter().position(|on_stack| *on_stack == dependency) {
                    let mut cycle: Vec<String> =
                        path[start..].iter().map(|s| s.to_string()).collect();
                    cycle.push(dependency.clone());
                    problems.push(DependencyProblem::Cycle { path: cycle });
                } else if self.tasks.contains_key(dependency)
                    && !visited.contains(dependency.as_str())
                {
                    self.find_cycles(dependency, visited, path, problems);
                }
            }
        }

        path.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::{Executable, InputOutputSchema, TaskMetadata};
    use serde_json::json;

    fn definition(metadata: TaskMetadata) -> TaskDefinition {
        TaskDefinition::new(
            metadata,
            InputOutputSchema::new(),
            Executable::from_fn(|_| Ok(json!(null))),
        )
    }

    fn task(id: &str, deps: &[&str]) -> TaskDefinition {
        definition(TaskMetadata::new(id, id).with_dependencies(deps.iter().copied()))
    }

    #[test]
    fn test_register_rejects_duplicates() {
        let mut registry = TaskRegistry::new();
        registry.register(task("a", &[])).unwrap();

        let err = registry.register(task("a", &[])).unwrap_err();
        assert!(matches!(err, EngineError::DuplicateId { ref task_id } if task_id == "a"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unregister_cleans_indexes() {
        let mut registry = TaskRegistry::new();
        registry
            .register(definition(
                TaskMetadata::new("fetch", "Fetch")
                    .with_category("network")
                    .with_tags(["io", "remote"]),
            ))
            .unwrap();
        registry
            .register(definition(
                TaskMetadata::new("parse", "Parse").with_tags(["io"]),
            ))
            .unwrap();

        assert!(registry.unregister("fetch"));
        assert!(!registry.unregister("fetch"));

        assert!(registry.get_by_category("network").is_empty());
        assert!(registry.get_by_tags(&["remote"], false).is_empty());
        assert_eq!(registry.list_categories(), vec!["general"]);
        assert_eq!(registry.list_tags(), vec!["io"]);
        let io: Vec<String> = registry
            .get_by_tags(&["io"], true)
            .iter()
            .map(|d| d.id().to_string())
            .collect();
        assert_eq!(io, vec!["parse"]);
    }

    #[test]
    fn test_tag_union_and_intersection() {
        let mut registry = TaskRegistry::new();
        registry
            .register(definition(TaskMetadata::new("a", "A").with_tags(["x", "y"])))
            .unwrap();
        registry
            .register(definition(TaskMetadata::new("b", "B").with_tags(["y"])))
            .unwrap();
        registry
            .register(definition(TaskMetadata::new("c", "C").with_tags(["z"])))
            .unwrap();

        let ids = |defs: Vec<Arc<TaskDefinition>>| -> Vec<String> {
            defs.iter().map(|d| d.id().to_string()).collect()
        };

        assert_eq!(ids(registry.get_by_tags(&["x", "y"], true)), vec!["a"]);
        assert_eq!(ids(registry.get_by_tags(&["x", "z"], false)), vec!["a", "c"]);
        assert_eq!(ids(registry.get_by_tags(&["y"], false)), vec!["a", "b"]);
        assert!(registry.get_by_tags::<&str>(&[], false).is_empty());
    }

    #[test]
    fn test_validate_reports_missing_and_cycles() {
        let mut registry = TaskRegistry::new();
        registry.register(task("a", &["b"])).unwrap();
        registry.register(task("b", &["c"])).unwrap();
        registry.register(task("c", &["a"])).unwrap();
        registry.register(task("d", &["ghost"])).unwrap();

        let problems = registry.validate_dependencies();
        assert!(problems.contains(&DependencyProblem::MissingDependency {
            task: "d".to_string(),
            dependency: "ghost".to_string(),
        }));

        let cycle = problems
            .iter()
            .find_map(|p| match p {
                DependencyProblem::Cycle { path } => Some(path.join(" -> ")),
                _ => None,
            })
            .unwrap();
        assert_eq!(cycle, "a -> b -> c -> a");
        assert_eq!(registry.len(), 4);
    }

    #[test]
    fn test_dependents_and_export() {
        let mut registry = TaskRegistry::new();
        registry.register(task("study", &[])).unwrap();
        registry.register(task("develop", &["study"])).unwrap();
        registry.register(task("review", &["study"])).unwrap();

        let dependents: Vec<String> = registry
            .get_dependents("study")
            .iter()
            .map(|d| d.id().to_string())
            .collect();
        assert_eq!(dependents, vec!["develop", "review"]);

        let exported = registry.export();
        assert_eq!(exported["develop"].dependencies, vec!["study"]);
        assert!(registry.validate_dependencies().is_empty());
    }
}
