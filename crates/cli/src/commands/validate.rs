//! `validate` command implementation.

use anyhow::{Context, Result};
use outputs::{split_spec, Scheme};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    framing: String,
    queue_capacity: usize,
    output_count: usize,
    listener_count: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    // Check file exists
    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    // Try to load and validate
    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(config) => {
            let warnings = collect_warnings(&config);
            let listener_count = config
                .outputs
                .iter()
                .filter(|o| builtin_scheme(&o.uri).is_some_and(|s| s.is_listener()))
                .count();

            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    framing: format!("{:?}", config.input.framing),
                    queue_capacity: config.listen.queue_capacity,
                    output_count: config.outputs.len(),
                    listener_count,
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

fn builtin_scheme(uri: &str) -> Option<Scheme> {
    Scheme::from_name(split_spec(uri).0)
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(config: &contracts::FanoutConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    // Custom schemes are only known to embedders that register them
    for output in &config.outputs {
        if builtin_scheme(&output.uri).is_none() {
            warnings.push(format!(
                "Output '{}' uses a scheme fanout does not provide",
                output.uri
            ));
        }
    }

    if config
        .outputs
        .iter()
        .filter(|o| builtin_scheme(&o.uri) == Some(Scheme::Stdout))
        .count()
        > 1
    {
        warnings.push("stdout is listed more than once - data will be duplicated".to_string());
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Framing: {}", summary.framing);
            println!("  Queue capacity: {}", summary.queue_capacity);
            println!("  Outputs: {}", summary.output_count);
            println!("  Listeners: {}", summary.listener_count);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validate_file(content: &str) -> ValidationResult {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fanout.toml");
        std::fs::write(&path, content).unwrap();
        validate_config(&ValidateArgs {
            config: path,
            json: false,
        })
    }

    #[test]
    fn test_valid_config_summary() {
        let result = validate_file(
            "[[outputs]]\nuri = \"tcp-listen://:9000\"\n\n[[outputs]]\nuri = \"custom://x\"\n",
        );
        assert!(result.valid);
        let summary = result.summary.unwrap();
        assert_eq!(summary.output_count, 2);
        assert_eq!(summary.listener_count, 1);
        assert_eq!(result.warnings.unwrap().len(), 1);
    }

    #[test]
    fn test_invalid_config_reports_error() {
        let result = validate_file("[listen]\nqueue_capacity = 0\n\n[[outputs]]\nuri = \"stdout\"\n");
        assert!(!result.valid);
        assert!(result.error.is_some());
    }

    #[test]
    fn test_missing_file() {
        let result = validate_config(&ValidateArgs {
            config: "/nope/fanout.toml".into(),
            json: false,
        });
        assert!(!result.valid);
    }
}
