//! Output and reporting for sgsync

use crate::cli::OutputFormat;
use crate::error::Error;
use crate::modules::{ModuleOutput, ModuleStatus};
use colored::Colorize;

/// Render a successful run
pub fn render_result(output: &ModuleOutput, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => json_result(output).to_string(),
        OutputFormat::Human => human_result(output),
    }
}

/// Render a fatal error
pub fn render_failure(err: &Error, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => serde_json::json!({
            "failed": true,
            "changed": false,
            "msg": err.to_string(),
        })
        .to_string(),
        OutputFormat::Human => format!("{}: {}", "failed".red().bold(), err),
    }
}

/// Machine-readable result: the module's data fields flattened next to
/// `changed`, `msg` and `status`.
pub fn json_result(output: &ModuleOutput) -> serde_json::Value {
    let mut result = serde_json::Map::new();
    result.insert("changed".to_string(), output.changed.into());
    result.insert("msg".to_string(), output.msg.clone().into());
    result.insert("status".to_string(), output.status.to_string().into());
    for (key, value) in &output.data {
        result.insert(key.clone(), value.clone());
    }
    if let Some(ref diff) = output.diff {
        result.insert(
            "diff".to_string(),
            serde_json::to_value(diff).unwrap_or(serde_json::Value::Null),
        );
    }
    serde_json::Value::Object(result)
}

fn human_result(output: &ModuleOutput) -> String {
    let status = match output.status {
        ModuleStatus::Changed => "changed".yellow(),
        ModuleStatus::Ok => "ok".green(),
    };
    let mut lines = vec![format!("{}: {}", status, output.msg)];

    for (key, marker) in [("rules_added", "+"), ("rules_removed", "-")] {
        let Some(rules) = output.data.get(key).and_then(|v| v.as_array()) else {
            continue;
        };
        for rule in rules.iter().filter_map(|r| r.as_str()) {
            let line = format!("  {} {}", marker, rule);
            lines.push(if marker == "+" {
                line.green().to_string()
            } else {
                line.red().to_string()
            });
        }
    }

    if let Some(ref diff) = output.diff {
        lines.push(format!("{}", "--- before".red()));
        lines.extend(diff.before.lines().map(|l| format!("    {}", l)));
        lines.push(format!("{}", "+++ after".green()));
        lines.extend(diff.after.lines().map(|l| format!("    {}", l)));
        if let Some(ref details) = diff.details {
            lines.push(format!("    ({})", details.bright_black()));
        }
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::{Diff, ModuleError};

    #[test]
    fn test_json_result_flattens_data() {
        let output = ModuleOutput::changed("Updated")
            .with_data("group_id", serde_json::json!("sg-1"))
            .with_data("rules_added", serde_json::json!(["ingress tcp 80-80 cidr=0.0.0.0/0"]));

        let json = json_result(&output);
        assert_eq!(json["changed"], true);
        assert_eq!(json["group_id"], "sg-1");
        assert_eq!(json["status"], "changed");
        assert!(json.get("diff").is_none());
    }

    #[test]
    fn test_json_result_null_group_id() {
        let output =
            ModuleOutput::changed("Would create").with_data("group_id", serde_json::Value::Null);
        assert!(json_result(&output)["group_id"].is_null());
    }

    #[test]
    fn test_human_result_lists_rules() {
        colored::control::set_override(false);
        let output = ModuleOutput::changed("Updated security group 'web'")
            .with_data("rules_added", serde_json::json!(["ingress tcp 80-80 cidr=0.0.0.0/0"]))
            .with_data("rules_removed", serde_json::json!(["ingress tcp 22-22 cidr=10.0.0.0/8"]))
            .with_diff(Diff::new("a", "b"));

        let text = render_result(&output, OutputFormat::Human);
        assert!(text.starts_with("changed: Updated security group 'web'"));
        assert!(text.contains("  + ingress tcp 80-80 cidr=0.0.0.0/0"));
        assert!(text.contains("  - ingress tcp 22-22 cidr=10.0.0.0/8"));
        assert!(text.contains("--- before"));
    }

    #[test]
    fn test_failure_json() {
        let err: Error = ModuleError::GroupInUse {
            name: "web".to_string(),
            group_id: "sg-1".to_string(),
            instances: "i-1".to_string(),
        }
        .into();

        let json: serde_json::Value =
            serde_json::from_str(&render_failure(&err, OutputFormat::Json)).unwrap();
        assert_eq!(json["failed"], true);
        assert!(json["msg"].as_str().unwrap().contains("i-1"));
    }
}
