// ABOUTME: Output formatters for run reports and orchestration plans
// ABOUTME: Provides JSON, YAML and handlebars-rendered text formatting

use handlebars::Handlebars;
use serde_json::{json, Value};

use super::error::Result;
use crate::engine::{OrchestrationPlan, RunReport, TaskOutcome, TaskSummaryEntry};

pub trait OutputFormatter: Send + Sync {
    fn format_report(&self, report: &RunReport) -> Result<String>;

    fn format_plan(&self, plan: &OrchestrationPlan) -> Result<String>;
}

pub struct JsonFormatter {
    pretty: bool,
}

impl JsonFormatter {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    fn render<T: serde::Serialize>(&self, value: &T) -> Result<String> {
        let content = if self.pretty {
            serde_json::to_string_pretty(value)?
        } else {
            serde_json::to_string(value)?
        };
        Ok(content)
    }
}

impl OutputFormatter for JsonFormatter {
    fn format_report(&self, report: &RunReport) -> Result<String> {
        self.render(report)
    }

    fn format_plan(&self, plan: &OrchestrationPlan) -> Result<String> {
        self.render(plan)
    }
}

pub struct YamlFormatter;

impl OutputFormatter for YamlFormatter {
    fn format_report(&self, report: &RunReport) -> Result<String> {
        Ok(serde_yaml::to_string(report)?)
    }

    fn format_plan(&self, plan: &OrchestrationPlan) -> Result<String> {
        Ok(serde_yaml::to_string(plan)?)
    }
}

const REPORT_TEMPLATE: &str = "\
Session {{session_id}}: {{status}}
{{successful}}/{{total}} tasks succeeded, {{failed}} failed ({{success_rate}}%) in {{duration}}
{{#each layers}}
Layer {{this.number}}
{{#each this.tasks}}
  [{{this.status}}] {{this.id}} ({{this.duration}}{{#if this.retries}}, {{this.retries}} retries{{/if}})
{{#if this.error}}
    error: {{this.error}}
{{/if}}
{{#if this.output}}
    output: {{this.output}}
{{/if}}
{{/each}}
{{/each}}
";

const PLAN_TEMPLATE: &str = "\
Plan: {{total_tasks}} tasks in {{total_layers}} layers (max parallelism {{max_parallelism}})
{{#each layers}}
Layer {{this.number}}: {{#each this.tasks}}{{this}}{{#unless @last}}, {{/unless}}{{/each}}
{{/each}}
{{#each mappings}}
  {{this.task}} <- {{#each this.params}}{{this}}{{#unless @last}}; {{/unless}}{{/each}}
{{/each}}
";

/// Human-readable text rendered from handlebars templates
pub struct TextFormatter {
    handlebars: Handlebars<'static>,
}

impl TextFormatter {
    pub fn new() -> Self {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(false);
        handlebars.register_escape_fn(handlebars::no_escape);
        Self { handlebars }
    }

    fn report_view(report: &RunReport) -> Value {
        let layers: Vec<Value> = report
            .plan
            .execution_layers
            .iter()
            .enumerate()
            .map(|(index, layer)| {
                let tasks: Vec<Value> = layer
                    .iter()
                    .map(|task_id| {
                        let outcome = report.results.get(task_id);
                        let entry = summary_entry(report, task_id);
                        let status = match (entry, outcome) {
                            (Some(entry), _) => entry.status.to_string(),
                            (None, Some(TaskOutcome::Success(_))) => "success".to_string(),
                            (None, Some(TaskOutcome::Failure { .. })) => "failed".to_string(),
                            (None, None) => "pending".to_string(),
                        };
                        json!({
                            "id": task_id,
                            "status": status,
                            "duration": entry
                                .map(|e| format!("{}ms", e.duration.as_millis()))
                                .unwrap_or_else(|| "0ms".to_string()),
                            "retries": entry.map(|e| e.retry_count).unwrap_or(0),
                            "error": outcome.and_then(TaskOutcome::error),
                            "output": outcome
                                .and_then(TaskOutcome::output)
                                .filter(|value| !value.is_null())
                                .map(Value::to_string),
                        })
                    })
                    .collect();
                json!({ "number": index + 1, "tasks": tasks })
            })
            .collect();

        json!({
            "session_id": report.session_id,
            "status": if report.is_success() { "success" } else { "failed" },
            "total": report.summary.total,
            "successful": report.summary.successful,
            "failed": report.summary.failed,
            "success_rate": format!("{:.1}", report.summary.success_rate()),
            "duration": format!("{}ms", report.summary.total_duration.as_millis()),
            "layers": layers,
        })
    }

    fn plan_view(plan: &OrchestrationPlan) -> Value {
        let layers: Vec<Value> = plan
            .execution_layers
            .iter()
            .enumerate()
            .map(|(index, tasks)| json!({ "number": index + 1, "tasks": tasks }))
            .collect();

        let mappings: Vec<Value> = plan
            .data_mappings
            .iter()
            .filter(|(_, params)| !params.is_empty())
            .map(|(task, params)| {
                let params: Vec<String> = params
                    .iter()
                    .map(|(name, value)| match value {
                        Value::String(text) => format!("{name} = {text}"),
                        other => format!("{name} = {other}"),
                    })
                    .collect();
                json!({ "task": task, "params": params })
            })
            .collect();

        json!({
            "total_tasks": plan.total_tasks(),
            "total_layers": plan.total_layers(),
            "max_parallelism": plan.max_parallelism(),
            "layers": layers,
            "mappings": mappings,
        })
    }
}

fn summary_entry<'a>(report: &'a RunReport, task_id: &str) -> Option<&'a TaskSummaryEntry> {
    report
        .summary
        .tasks
        .iter()
        .find(|entry| entry.task_id == task_id)
}

impl Default for TextFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputFormatter for TextFormatter {
    fn format_report(&self, report: &RunReport) -> Result<String> {
        Ok(self
            .handlebars
            .render_template(REPORT_TEMPLATE, &Self::report_view(report))?)
    }

    fn format_plan(&self, plan: &OrchestrationPlan) -> Result<String> {
        Ok(self
            .handlebars
            .render_template(PLAN_TEMPLATE, &Self::plan_view(plan))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{ExecutionSummary, ExecutionTrace};
    use indexmap::IndexMap;

    fn sample_plan() -> OrchestrationPlan {
        let mut plan = OrchestrationPlan::default();
        plan.execution_graph
            .insert("study".to_string(), vec!["develop".to_string()]);
        plan.execution_graph.insert("develop".to_string(), vec![]);
        plan.execution_layers = vec![vec!["study".to_string()], vec!["develop".to_string()]];
        plan.execution_order = vec!["study".to_string(), "develop".to_string()];
        let mut mapping = IndexMap::new();
        mapping.insert("notes".to_string(), json!("{{ study.notes }}"));
        plan.data_mappings.insert("develop".to_string(), mapping);
        plan.data_mappings.insert("study".to_string(), IndexMap::new());
        plan
    }

    fn sample_report() -> RunReport {
        let mut study = ExecutionTrace::new("study", IndexMap::new());
        study.mark_started();
        study.mark_completed(json!({"notes": "read <docs>"}));
        let mut develop = ExecutionTrace::new("develop", IndexMap::new());
        develop.mark_started();
        develop.increment_retry();
        develop.mark_failed("compile error");

        let mut results = IndexMap::new();
        results.insert(
            "study".to_string(),
            TaskOutcome::Success(json!({"notes": "read <docs>"})),
        );
        results.insert("develop".to_string(), TaskOutcome::failure("compile error"));

        RunReport {
            session_id: "s-1".to_string(),
            plan: sample_plan(),
            results,
            summary: ExecutionSummary::from_traces(Some("s-1".to_string()), &[study, develop]),
        }
    }

    #[test]
    fn test_json_formatter() {
        let report = sample_report();
        let compact = JsonFormatter::new(false).format_report(&report).unwrap();
        let parsed: Value = serde_json::from_str(&compact).unwrap();

        assert_eq!(parsed["session_id"], "s-1");
        assert_eq!(parsed["results"]["develop"]["error"], "compile error");
        assert_eq!(parsed["results"]["study"]["notes"], "read <docs>");
        assert!(!compact.contains('\n'));

        let pretty = JsonFormatter::new(true).format_plan(&report.plan).unwrap();
        assert!(pretty.contains('\n'));
    }

    #[test]
    fn test_yaml_formatter() {
        let yaml = YamlFormatter.format_plan(&sample_plan()).unwrap();
        let parsed: OrchestrationPlan = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, sample_plan());
    }

    #[test]
    fn test_text_report() {
        let text = TextFormatter::new()
            .format_report(&sample_report())
            .unwrap();

        assert!(text.contains("Session s-1: failed"));
        assert!(text.contains("1/2 tasks succeeded"));
        assert!(text.contains("[success] study"));
        assert!(text.contains("[failed] develop"));
        assert!(text.contains("1 retries"));
        assert!(text.contains("error: compile error"));
        // no HTML escaping
        assert!(text.contains("read <docs>"));
    }

    #[test]
    fn test_text_plan() {
        let text = TextFormatter::new()
            .format_plan(&sample_plan())
            .unwrap();

        assert!(text.contains("Plan: 2 tasks in 2 layers"));
        assert!(text.contains("Layer 1: study"));
        assert!(text.contains("Layer 2: develop"));
        assert!(text.contains("develop <- notes = {{ study.notes }}"));
    }
}
