//! Output formatters for test results
//!
//! Provides table, JSON, CSV and summary renderings of run summaries, test
//! listings and hook listings.

use anyhow::{Context, Result};
use serde::Serialize;
use std::io::Write;
use std::path::Path;

use crate::hooks::HookInfo;
use crate::models::{HookExecution, RunSummary, TestInfo, TestResult, TestStatus};

/// Output format options
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    JsonPretty,
    Csv,
    Summary,
}

impl OutputFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "table" => Some(OutputFormat::Table),
            "json" => Some(OutputFormat::Json),
            "json-pretty" | "jsonpretty" => Some(OutputFormat::JsonPretty),
            "csv" => Some(OutputFormat::Csv),
            "summary" => Some(OutputFormat::Summary),
            _ => None,
        }
    }
}

/// Result formatter
pub struct ResultFormatter {
    format: OutputFormat,
    colorize: bool,
}

impl ResultFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            colorize: true,
        }
    }

    pub fn no_color(mut self) -> Self {
        self.colorize = false;
        self
    }

    /// Format a single test result
    pub fn format_result(&self, result: &TestResult) -> String {
        match self.format {
            OutputFormat::Table => self.format_result_table(result),
            OutputFormat::Json => serde_json::to_string(result).unwrap_or_default(),
            OutputFormat::JsonPretty => serde_json::to_string_pretty(result).unwrap_or_default(),
            OutputFormat::Csv => results_csv(std::slice::from_ref(result), false).unwrap_or_default(),
            OutputFormat::Summary => self.format_result_summary(result),
        }
    }

    fn status_label(&self, status: TestStatus) -> String {
        let label = format!("{} {}", status.symbol(), status);
        if !self.colorize {
            return label;
        }
        let color = match status {
            TestStatus::Passed => "32",
            TestStatus::Failed => "31",
            TestStatus::Cancelled => "33",
        };
        format!("\x1b[{color}m{label}\x1b[0m")
    }

    fn format_result_table(&self, result: &TestResult) -> String {
        let mut line = format!(
            "{:40} {:12} [{:>6}ms]",
            result.display_name,
            self.status_label(result.status),
            result.duration_ms
        );
        if let Some(message) = &result.message {
            line.push_str(&format!("  {message}"));
        }
        for failure in &result.hook_failures {
            line.push_str(&format!("\n    hook: {failure}"));
        }
        line
    }

    fn format_hook_execution(&self, execution: &HookExecution) -> String {
        let mut line = format!(
            "{:18} {:21} {:12} [{:>6}ms]",
            execution.kind,
            format!("{} [{}]", execution.name, execution.scope_id),
            self.status_label(execution.status),
            execution.duration_ms
        );
        if let Some(message) = &execution.message {
            line.push_str(&format!("  {message}"));
        }
        line
    }

    fn format_result_summary(&self, result: &TestResult) -> String {
        format!(
            "{} {} ({}ms)",
            result.status.symbol(),
            result.display_name,
            result.duration_ms
        )
    }

    /// Format a run summary
    pub fn format_summary(&self, summary: &RunSummary) -> String {
        match self.format {
            OutputFormat::Table => self.format_summary_table(summary),
            OutputFormat::Json => serde_json::to_string(summary).unwrap_or_default(),
            OutputFormat::JsonPretty => serde_json::to_string_pretty(summary).unwrap_or_default(),
            OutputFormat::Csv => results_csv(&summary.results, true).unwrap_or_default(),
            OutputFormat::Summary => self.format_summary_brief(summary),
        }
    }

    fn format_summary_table(&self, summary: &RunSummary) -> String {
        let mut output = String::new();

        output.push_str("\n══════════════════════════════════════════════════════════════════\n");
        output.push_str(" Test Run\n");
        output.push_str("══════════════════════════════════════════════════════════════════\n");

        for result in &summary.results {
            output.push_str(&format!(" {}\n", self.format_result_table(result)));
        }

        if !summary.hook_executions.is_empty() {
            output.push_str("──────────────────────────────────────────────────────────────────\n");
            output.push_str(" Hooks:\n");
            for execution in &summary.hook_executions {
                output.push_str(&format!(" {}\n", self.format_hook_execution(execution)));
            }
        }

        if !summary.hook_failures.is_empty() {
            output.push_str("──────────────────────────────────────────────────────────────────\n");
            output.push_str(" Hook failures:\n");
            for failure in &summary.hook_failures {
                output.push_str(&format!("   ! {failure}\n"));
            }
        }

        output.push_str("══════════════════════════════════════════════════════════════════\n");

        let pass_str = if self.colorize {
            format!("\x1b[32m{}\x1b[0m", summary.passed)
        } else {
            summary.passed.to_string()
        };
        let fail_str = if self.colorize && summary.failed > 0 {
            format!("\x1b[31m{}\x1b[0m", summary.failed)
        } else {
            summary.failed.to_string()
        };

        output.push_str(&format!(
            " Total: {} | Pass: {} | Fail: {} | Cancelled: {}\n",
            summary.total, pass_str, fail_str, summary.cancelled
        ));
        output.push_str(&format!(
            " Pass Rate: {:5.1}% | Duration: {}ms\n",
            summary.pass_rate(),
            summary.total_duration_ms
        ));

        output
    }

    fn format_summary_brief(&self, summary: &RunSummary) -> String {
        let mut line = format!(
            "{}/{} passed, {} failed, {} cancelled ({:.1}%) in {}ms",
            summary.passed,
            summary.total,
            summary.failed,
            summary.cancelled,
            summary.pass_rate(),
            summary.total_duration_ms
        );
        if !summary.hook_executions.is_empty() {
            let failed = summary
                .hook_executions
                .iter()
                .filter(|e| !e.status.is_success())
                .count();
            line.push_str(&format!(
                ", {} hook run(s) ({} not passed)",
                summary.hook_executions.len(),
                failed
            ));
        }
        if !summary.hook_failures.is_empty() {
            line.push_str(&format!(", {} hook failure(s)", summary.hook_failures.len()));
        }
        line
    }

    /// Format a discovered test listing
    pub fn format_tests(&self, tests: &[TestInfo]) -> String {
        match self.format {
            OutputFormat::Json | OutputFormat::JsonPretty => self.to_json(tests),
            OutputFormat::Csv => tests_csv(tests).unwrap_or_default(),
            OutputFormat::Summary => format!("{} tests discovered", tests.len()),
            OutputFormat::Table => {
                let mut output = format!(
                    "{:40} {:20} {:12} {:>5}  {}\n",
                    "TEST", "CLASS", "ASSEMBLY", "ORDER", "MODE"
                );
                for test in tests {
                    output.push_str(&format!(
                        "{:40} {:20} {:12} {:>5}  {}\n",
                        test.display_name, test.class_scope, test.assembly_scope, test.order, test.mode
                    ));
                }
                output.push_str(&format!("\n{} tests\n", tests.len()));
                output
            }
        }
    }

    /// Format a hook listing
    pub fn format_hooks(&self, hooks: &[HookInfo]) -> String {
        match self.format {
            OutputFormat::Json | OutputFormat::JsonPretty => self.to_json(hooks),
            OutputFormat::Csv => hooks_csv(hooks).unwrap_or_default(),
            OutputFormat::Summary => format!("{} hooks registered", hooks.len()),
            OutputFormat::Table => {
                let mut output = String::new();
                for hook in hooks {
                    let timeout = hook
                        .timeout_ms
                        .map(|ms| format!("{ms}ms"))
                        .unwrap_or_else(|| "-".to_string());
                    output.push_str(&format!(
                        "{:22} order {:>3}  timeout {:>8}  {:14} {}\n",
                        hook.kind.to_string(),
                        hook.order,
                        timeout,
                        hook.executor,
                        hook
                    ));
                }
                output.push_str(&format!("\n{} hooks\n", hooks.len()));
                output
            }
        }
    }

    fn to_json<T: Serialize + ?Sized>(&self, value: &T) -> String {
        if self.format == OutputFormat::JsonPretty {
            serde_json::to_string_pretty(value).unwrap_or_default()
        } else {
            serde_json::to_string(value).unwrap_or_default()
        }
    }
}

impl Default for ResultFormatter {
    fn default() -> Self {
        Self::new(OutputFormat::Table)
    }
}

fn finish_csv(writer: csv::Writer<Vec<u8>>) -> Result<String> {
    let bytes = writer.into_inner().context("Failed to flush CSV output")?;
    String::from_utf8(bytes).context("CSV output is not UTF-8")
}

fn results_csv(results: &[TestResult], header: bool) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    if header {
        writer.write_record([
            "test_id",
            "display_name",
            "status",
            "duration_ms",
            "message",
            "hook_failures",
        ])?;
    }
    for result in results {
        let status = result.status.to_string();
        let duration = result.duration_ms.to_string();
        let hook_failures = result.hook_failures.join("; ");
        writer.write_record([
            result.test_id.as_str(),
            result.display_name.as_str(),
            status.as_str(),
            duration.as_str(),
            result.message.as_deref().unwrap_or(""),
            hook_failures.as_str(),
        ])?;
    }
    finish_csv(writer)
}

fn tests_csv(tests: &[TestInfo]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for test in tests {
        writer.serialize(test)?;
    }
    finish_csv(writer)
}

fn hooks_csv(hooks: &[HookInfo]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(["name", "kind", "order", "timeout_ms", "scope_id", "executor"])?;
    for hook in hooks {
        let kind = hook.kind.to_string();
        let order = hook.order.to_string();
        let timeout = hook.timeout_ms.map(|ms| ms.to_string()).unwrap_or_default();
        writer.write_record([
            hook.name.as_str(),
            kind.as_str(),
            order.as_str(),
            timeout.as_str(),
            hook.scope_id.as_deref().unwrap_or(""),
            hook.executor,
        ])?;
    }
    finish_csv(writer)
}

/// Write a run summary to a file
pub fn write_results_to_file(
    path: impl AsRef<Path>,
    summary: &RunSummary,
    format: OutputFormat,
) -> Result<()> {
    let path = path.as_ref();
    let formatter = ResultFormatter::new(format).no_color();
    let content = formatter.format_summary(summary);

    let mut file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create output file: {}", path.display()))?;
    file.write_all(content.as_bytes())?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::HookKind;
    use tempfile::tempdir;

    fn summary() -> RunSummary {
        RunSummary::new(
            vec![
                TestResult::pass("Api::b", 12),
                TestResult::fail("Api::a", 30, "expected 200, got 500, body \"oops\"")
                    .with_hook_failures(vec!["Error executing After(Test) hook 'flush'".to_string()]),
                TestResult::cancelled("Api::c", "run cancelled"),
            ],
            vec!["1 After(Class) hook(s) failed".to_string()],
            120,
        )
        .with_hook_executions(vec![
            HookExecution {
                name: "seed".to_string(),
                kind: "Before(Class)".to_string(),
                scope_id: "Api".to_string(),
                status: TestStatus::Passed,
                duration_ms: 4,
                message: None,
            },
            HookExecution {
                name: "drop".to_string(),
                kind: "After(Class)".to_string(),
                scope_id: "Api".to_string(),
                status: TestStatus::Failed,
                duration_ms: 1,
                message: Some("table locked".to_string()),
            },
        ])
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!(OutputFormat::parse("json"), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::parse("TABLE"), Some(OutputFormat::Table));
        assert_eq!(OutputFormat::parse("json-pretty"), Some(OutputFormat::JsonPretty));
        assert_eq!(OutputFormat::parse("unknown"), None);
    }

    #[test]
    fn test_format_result_summary() {
        let result = TestResult::pass("Api::health", 100).with_display_name("health check");
        let formatter = ResultFormatter::new(OutputFormat::Summary);
        let output = formatter.format_result(&result);
        assert!(output.contains("health check"));
        assert!(output.contains("100ms"));
    }

    #[test]
    fn test_table_lists_results_and_hook_failures() {
        let output = ResultFormatter::new(OutputFormat::Table)
            .no_color()
            .format_summary(&summary());

        assert!(output.contains("✗ FAIL"));
        assert!(output.contains("○ CANCELLED"));
        assert!(output.contains("hook: Error executing After(Test) hook 'flush'"));
        assert!(output.contains("! 1 After(Class) hook(s) failed"));
        assert!(output.contains("Total: 3 | Pass: 1 | Fail: 1 | Cancelled: 1"));
        assert!(!output.contains("\x1b["));
    }

    #[test]
    fn test_hook_runs_are_rendered() {
        let table = ResultFormatter::new(OutputFormat::Table)
            .no_color()
            .format_summary(&summary());
        let hooks_at = table.find(" Hooks:").unwrap();
        let seed = table.find("seed [Api]").unwrap();
        let drop = table.find("drop [Api]").unwrap();
        assert!(hooks_at < seed && seed < drop);
        assert!(table[drop..].lines().next().unwrap().contains("✗ FAIL"));
        assert!(table.contains("table locked"));

        let brief = ResultFormatter::new(OutputFormat::Summary).format_summary(&summary());
        assert!(brief.contains("2 hook run(s) (1 not passed)"));

        let plain = ResultFormatter::new(OutputFormat::Table)
            .no_color()
            .format_summary(&RunSummary::new(vec![TestResult::pass("Api::a", 1)], Vec::new(), 1));
        assert!(!plain.contains(" Hooks:"));
    }

    #[test]
    fn test_json_round_trips() {
        let output = ResultFormatter::new(OutputFormat::Json).format_summary(&summary());
        let parsed: RunSummary = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed.total, 3);
        assert_eq!(parsed.hook_failures.len(), 1);
        assert_eq!(parsed.hook_executions[1].status, TestStatus::Failed);
    }

    #[test]
    fn test_csv_quotes_messages() {
        let output = ResultFormatter::new(OutputFormat::Csv).format_summary(&summary());
        let mut reader = csv::Reader::from_reader(output.as_bytes());
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();

        assert_eq!(rows.len(), 3);
        // Sorted by id: Api::a first.
        assert_eq!(&rows[0][0], "Api::a");
        assert_eq!(&rows[0][4], "expected 200, got 500, body \"oops\"");
        assert_eq!(&rows[1][2], "PASS");
    }

    #[test]
    fn test_format_hooks_and_tests() {
        let hooks = vec![HookInfo {
            name: "seed".to_string(),
            kind: HookKind::BEFORE_CLASS,
            order: 1,
            timeout_ms: Some(500),
            scope_id: Some("Orders".to_string()),
            executor: "inline",
        }];
        let table = ResultFormatter::new(OutputFormat::Table).format_hooks(&hooks);
        assert!(table.contains("Before(Class)"));
        assert!(table.contains("500ms"));

        let csv = ResultFormatter::new(OutputFormat::Csv).format_hooks(&hooks);
        assert!(csv.lines().nth(1).unwrap().starts_with("seed,Before(Class),1,500,Orders,inline"));

        let tests = vec![TestInfo {
            id: "Orders::create".to_string(),
            display_name: "Orders::create".to_string(),
            class_scope: "Orders".to_string(),
            assembly_scope: "default".to_string(),
            order: 0,
            mode: "parallel".to_string(),
        }];
        let json = ResultFormatter::new(OutputFormat::Json).format_tests(&tests);
        assert!(json.contains("\"class_scope\":\"Orders\""));
        let csv = ResultFormatter::new(OutputFormat::Csv).format_tests(&tests);
        assert!(csv.starts_with("id,display_name,class_scope"));
    }

    #[test]
    fn test_write_results_to_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("results.json");

        write_results_to_file(&path, &summary(), OutputFormat::JsonPretty).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"passed\": 1"));
    }
}
