// ABOUTME: Orchestrator turning a task request into an immutable execution plan
// ABOUTME: Builds the dependency graph, orders and layers tasks, and generates data mappings

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use super::dependency::DependencyGraph;
use super::error::{EngineError, Result};
use crate::dataflow::ExpressionResolver;
use crate::tasks::{TaskDefinition, TaskRegistry};

/// Caller-supplied ordering constraint: `task` runs after `depends_on`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "HintRepr", into = "HintRepr")]
pub struct DependencyHint {
    pub task: String,
    pub depends_on: String,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum HintRepr {
    Pair(String, String),
    Text(String),
}

impl DependencyHint {
    pub fn new(task: impl Into<String>, depends_on: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            depends_on: depends_on.into(),
        }
    }
}

impl FromStr for DependencyHint {
    type Err = String;

    /// Accepts `"a depends on b"` or `"a:b"`
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (task, dependency) = s
            .split_once(" depends on ")
            .or_else(|| s.split_once(':'))
            .ok_or_else(|| {
                format!(
                    "invalid dependency hint '{}', expected 'task:dependency' or 'task depends on dependency'",
                    s
                )
            })?;

        let (task, dependency) = (task.trim(), dependency.trim());
        if task.is_empty() || dependency.is_empty() {
            return Err(format!("invalid dependency hint '{}': empty task id", s));
        }
        Ok(Self::new(task, dependency))
    }
}

impl TryFrom<HintRepr> for DependencyHint {
    type Error = String;

    fn try_from(repr: HintRepr) -> std::result::Result<Self, Self::Error> {
        match repr {
            HintRepr::Pair(task, depends_on) => Ok(Self { task, depends_on }),
            HintRepr::Text(text) => text.parse(),
        }
    }
}

impl From<DependencyHint> for HintRepr {
    fn from(hint: DependencyHint) -> Self {
        HintRepr::Pair(hint.task, hint.depends_on)
    }
}

impl fmt::Display for DependencyHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} depends on {}", self.task, self.depends_on)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "SecondaryRepr")]
pub struct SecondaryTask {
    pub id: String,
    #[serde(default)]
    pub parameters: IndexMap<String, Value>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SecondaryRepr {
    Id(String),
    Full {
        id: String,
        #[serde(default)]
        parameters: IndexMap<String, Value>,
    },
}

impl From<SecondaryRepr> for SecondaryTask {
    fn from(repr: SecondaryRepr) -> Self {
        match repr {
            SecondaryRepr::Id(id) => SecondaryTask {
                id,
                parameters: IndexMap::new(),
            },
            SecondaryRepr::Full { id, parameters } => SecondaryTask { id, parameters },
        }
    }
}

/// What to run: a primary task, ordered secondaries with their own
/// parameters, global parameters and extra ordering hints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRequest {
    pub primary: String,
    #[serde(default)]
    pub secondary: Vec<SecondaryTask>,
    #[serde(default)]
    pub parameters: IndexMap<String, Value>,
    #[serde(default)]
    pub dependencies: Vec<DependencyHint>,
}

impl TaskRequest {
    pub fn new(primary: impl Into<String>) -> Self {
        Self {
            primary: primary.into(),
            secondary: Vec::new(),
            parameters: IndexMap::new(),
            dependencies: Vec::new(),
        }
    }

    pub fn with_secondary(mut self, id: impl Into<String>, parameters: IndexMap<String, Value>) -> Self {
        self.secondary.push(SecondaryTask {
            id: id.into(),
            parameters,
        });
        self
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: Value) -> Self {
        self.parameters.insert(name.into(), value);
        self
    }

    pub fn with_dependency(mut self, task: impl Into<String>, depends_on: impl Into<String>) -> Self {
        self.dependencies.push(DependencyHint::new(task, depends_on));
        self
    }

    /// Requested ids, primary first, without duplicates
    pub fn task_ids(&self) -> Vec<String> {
        let mut ids = IndexSet::new();
        ids.insert(self.primary.clone());
        for secondary in &self.secondary {
            ids.insert(secondary.id.clone());
        }
        ids.into_iter().collect()
    }

    /// Task-specific parameters of a secondary task
    pub fn parameters_for(&self, task_id: &str) -> Option<&IndexMap<String, Value>> {
        self.secondary
            .iter()
            .find(|secondary| secondary.id == task_id)
            .map(|secondary| &secondary.parameters)
    }
}

/// Complete, immutable result of orchestration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrchestrationPlan {
    /// Task id -> ids that depend on it
    pub execution_graph: IndexMap<String, Vec<String>>,
    pub execution_layers: Vec<Vec<String>>,
    /// Task id -> parameter name -> expression or literal
    pub data_mappings: IndexMap<String, IndexMap<String, Value>>,
    pub execution_order: Vec<String>,
}

impl OrchestrationPlan {
    pub fn total_tasks(&self) -> usize {
        self.execution_order.len()
    }

    pub fn total_layers(&self) -> usize {
        self.execution_layers.len()
    }

    pub fn layer_of(&self, task_id: &str) -> Option<usize> {
        self.execution_layers
            .iter()
            .position(|layer| layer.iter().any(|id| id == task_id))
    }

    pub fn dependents_of(&self, task_id: &str) -> &[String] {
        self.execution_graph
            .get(task_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn contains_task(&self, task_id: &str) -> bool {
        self.execution_order.iter().any(|id| id == task_id)
    }

    /// Largest layer size
    pub fn max_parallelism(&self) -> usize {
        self.execution_layers
            .iter()
            .map(Vec::len)
            .max()
            .unwrap_or(0)
    }

    pub fn mapping_for(&self, task_id: &str) -> Option<&IndexMap<String, Value>> {
        self.data_mappings.get(task_id)
    }
}

pub struct Orchestrator {
    registry: Arc<TaskRegistry>,
    resolver: ExpressionResolver,
}

impl Orchestrator {
    pub fn new(registry: Arc<TaskRegistry>) -> Self {
        Self {
            registry,
            resolver: ExpressionResolver::new(),
        }
    }

    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.registry
    }

    fn definition(&self, task_id: &str) -> Result<Arc<TaskDefinition>> {
        self.registry
            .get(task_id)
            .ok_or_else(|| EngineError::UnknownTask {
                task_id: task_id.to_string(),
            })
    }

    /// Build an execution plan for `request`
    #[instrument(skip(self, request), fields(primary = %request.primary))]
    pub fn orchestrate(&self, request: &TaskRequest) -> Result<OrchestrationPlan> {
        let requested = request.task_ids();
        for task_id in &requested {
            self.definition(task_id)?;
        }

        let planned = self.plan_task_set(&requested)?;
        let definitions: IndexMap<String, Arc<TaskDefinition>> = planned
            .iter()
            .map(|id| Ok((id.clone(), self.definition(id)?)))
            .collect::<Result<_>>()?;
        debug!(
            "Planning {} tasks ({} requested)",
            definitions.len(),
            requested.len()
        );

        let graph = self.build_graph(&definitions, &request.dependencies);
        let execution_order = graph.topological_order()?;
        let execution_layers = layer_tasks(&execution_order, &graph, &definitions);
        let data_mappings = self.generate_mappings(&execution_order, &graph, &definitions, request)?;

        let plan = OrchestrationPlan {
            execution_graph: graph.adjacency(),
            execution_layers,
            data_mappings,
            execution_order,
        };

        info!(
            "Execution plan: {} layers, {} tasks total, max parallelism: {}",
            plan.total_layers(),
            plan.total_tasks(),
            plan.max_parallelism()
        );
        Ok(plan)
    }

    /// Plan a plain id list sharing one parameter map. The first id is the primary.
    pub fn orchestrate_from_tasks<S: AsRef<str>>(
        &self,
        task_ids: &[S],
        parameters: IndexMap<String, Value>,
    ) -> Result<OrchestrationPlan> {
        let Some((primary, rest)) = task_ids.split_first() else {
            return Ok(OrchestrationPlan::default());
        };

        let mut request = TaskRequest::new(primary.as_ref());
        request.parameters = parameters;
        for id in rest {
            request = request.with_secondary(id.as_ref(), IndexMap::new());
        }
        self.orchestrate(&request)
    }

    /// Whether the known ids in `task_ids` have no direct dependency or
    /// conflict among themselves
    pub fn can_execute_in_parallel<S: AsRef<str>>(&self, task_ids: &[S]) -> bool {
        let definitions: Vec<Arc<TaskDefinition>> = task_ids
            .iter()
            .filter_map(|id| self.registry.get(id.as_ref()))
            .collect();

        for (i, a) in definitions.iter().enumerate() {
            for b in &definitions[i + 1..] {
                if a.id() == b.id() {
                    continue;
                }
                if a.metadata.dependencies.contains(b.id())
                    || b.metadata.dependencies.contains(a.id())
                    || a.metadata.conflicts_with(&b.metadata)
                {
                    return false;
                }
            }
        }
        true
    }

    /// Requested ids plus the transitive closure of their registered
    /// dependencies, dependencies inserted first
    fn plan_task_set(&self, requested: &[String]) -> Result<IndexSet<String>> {
        let mut planned = IndexSet::new();
        let mut visiting = IndexSet::new();
        for task_id in requested {
            self.collect_dependencies(task_id, &mut planned, &mut visiting)?;
        }
        Ok(planned)
    }

    fn collect_dependencies(
        &self,
        task_id: &str,
        planned: &mut IndexSet<String>,
        visiting: &mut IndexSet<String>,
    ) -> Result<()> {
        // a task on the stack closes a cycle; the topological sort reports it
        if planned.contains(task_id) || visiting.contains(task_id) {
            return Ok(());
        }

        let definition = self.definition(task_id)?;
        visiting.insert(task_id.to_string());
        for dependency in &definition.metadata.dependencies {
            self.collect_dependencies(dependency, planned, visiting)?;
        }
        visiting.shift_remove(task_id);
        planned.insert(task_id.to_string());
        Ok(())
    }

    fn build_graph(
        &self,
        definitions: &IndexMap<String, Arc<TaskDefinition>>,
        hints: &[DependencyHint],
    ) -> DependencyGraph {
        let mut graph = DependencyGraph::new();
        for (task_id, definition) in definitions {
            graph.add_task(task_id, definition.metadata.priority);
        }

        for (task_id, definition) in definitions {
            for dependency in &definition.metadata.dependencies {
                graph.add_dependency(task_id, dependency);
            }
        }

        for hint in hints {
            if !graph.add_dependency(&hint.task, &hint.depends_on) {
                warn!("Ignoring dependency hint outside the plan: {}", hint);
            }
        }

        graph
    }

    /// Choose a value source for every declared input of every planned task
    fn generate_mappings(
        &self,
        order: &[String],
        graph: &DependencyGraph,
        definitions: &IndexMap<String, Arc<TaskDefinition>>,
        request: &TaskRequest,
    ) -> Result<IndexMap<String, IndexMap<String, Value>>> {
        let position: HashMap<&str, usize> = order
            .iter()
            .enumerate()
            .map(|(index, id)| (id.as_str(), index))
            .collect();

        let mut mappings = IndexMap::new();
        for task_id in order {
            let definition = &definitions[task_id];
            let specific = request.parameters_for(task_id);

            let mut dependencies = graph.get_dependencies(task_id);
            dependencies.sort_by_key(|dep| std::cmp::Reverse(position.get(dep.as_str()).copied()));

            let mut mapping = IndexMap::new();
            for (name, spec) in &definition.schema.inputs {
                let source = specific
                    .and_then(|params| params.get(name))
                    .or_else(|| request.parameters.get(name))
                    .cloned()
                    .or_else(|| {
                        dependencies
                            .iter()
                            .find(|dep| definitions[dep.as_str()].schema.declares_output(name))
                            .map(|dep| Value::String(format!("{{{{ {}.{} }}}}", dep, name)))
                    })
                    .or_else(|| spec.default.clone());

                match source {
                    Some(value) => {
                        mapping.insert(name.clone(), value);
                    }
                    None if spec.required => {
                        return Err(EngineError::UnresolvedParameter {
                            task_id: task_id.clone(),
                            parameter: name.clone(),
                        });
                    }
                    None => {}
                }
            }

            // undeclared task-specific parameters pass through unchanged
            if let Some(params) = specific {
                for (name, value) in params {
                    if !mapping.contains_key(name) {
                        mapping.insert(name.clone(), value.clone());
                    }
                }
            }

            for (name, value) in &mapping {
                self.resolver
                    .validate_value(value)
                    .map_err(|e| EngineError::InvalidExpression {
                        task_id: task_id.clone(),
                        parameter: name.clone(),
                        reason: e.to_string(),
                    })?;
            }

            mappings.insert(task_id.clone(), mapping);
        }

        Ok(mappings)
    }
}

/// Assign each task to the earliest layer after all of its dependencies that
/// holds no related, conflicting or sequential task
fn layer_tasks(
    order: &[String],
    graph: &DependencyGraph,
    definitions: &IndexMap<String, Arc<TaskDefinition>>,
) -> Vec<Vec<String>> {
    let mut layers: Vec<Vec<String>> = Vec::new();
    let mut exclusive: Vec<bool> = Vec::new();
    let mut layer_of: HashMap<&str, usize> = HashMap::new();

    for task_id in order {
        let metadata = &definitions[task_id].metadata;
        let floor = graph
            .get_dependencies(task_id)
            .iter()
            .filter_map(|dep| layer_of.get(dep.as_str()))
            .map(|layer| layer + 1)
            .max()
            .unwrap_or(0);

        let existing = if metadata.can_parallel {
            (floor..layers.len()).find(|&index| {
                !exclusive[index]
                    && layers[index].iter().all(|member| {
                        !graph.are_related(task_id, member)
                            && !metadata.conflicts_with(&definitions[member].metadata)
                    })
            })
        } else {
            None
        };

        let index = match existing {
            Some(index) => {
                layers[index].push(task_id.clone());
                index
            }
            None => {
                layers.push(vec![task_id.clone()]);
                exclusive.push(!metadata.can_parallel);
                layers.len() - 1
            }
        };
        layer_of.insert(task_id.as_str(), index);
    }

    layers
}
