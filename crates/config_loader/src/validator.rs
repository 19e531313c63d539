//! 配置校验模块
//!
//! 校验规则：
//! - 数值范围 (queue_capacity / shutdown_timeout_ms / chunk_size)
//! - 至少一个 output
//! - output uri 必须包含 scheme
//! - 监听类 output 不可重复

use std::collections::HashSet;

use contracts::FanoutConfig;
use validator::Validate;

use crate::ConfigError;

/// 校验 FanoutConfig 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(config: &FanoutConfig) -> Result<(), ConfigError> {
    validate_ranges(config)?;
    validate_outputs_present(config)?;
    validate_output_schemes(config)?;
    validate_unique_listeners(config)?;
    Ok(())
}

/// 校验数值范围 (derive 规则)
fn validate_ranges(config: &FanoutConfig) -> Result<(), ConfigError> {
    config.validate().map_err(|errors| {
        let field = errors
            .errors()
            .keys()
            .next()
            .map(|k| k.to_string())
            .unwrap_or_else(|| "config".to_string());
        ConfigError::validation(field, errors.to_string())
    })
}

fn validate_outputs_present(config: &FanoutConfig) -> Result<(), ConfigError> {
    if config.outputs.is_empty() {
        return Err(ConfigError::validation(
            "outputs",
            "at least one output is required",
        ));
    }
    Ok(())
}

/// 校验 uri 格式
///
/// `stdout` / `stderr` 可省略 `://`。
fn validate_output_schemes(config: &FanoutConfig) -> Result<(), ConfigError> {
    for (idx, output) in config.outputs.iter().enumerate() {
        let scheme = scheme_of(&output.uri);
        let bare_stream = matches!(output.uri.as_str(), "stdout" | "stderr");

        if scheme.is_empty() || (!output.uri.contains("://") && !bare_stream) {
            return Err(ConfigError::validation(
                format!("outputs[{}].uri", idx),
                format!("'{}' is not of the form scheme://argument", output.uri),
            ));
        }
    }
    Ok(())
}

/// 同一监听地址只能出现一次 (`-server` 视为 `-listen` 的别名)
fn validate_unique_listeners(config: &FanoutConfig) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for (idx, output) in config.outputs.iter().enumerate() {
        let scheme = scheme_of(&output.uri);
        let Some(family) = scheme
            .strip_suffix("-listen")
            .or_else(|| scheme.strip_suffix("-server"))
        else {
            continue;
        };
        let argument = output.uri.split_once("://").map_or("", |(_, a)| a);
        if family != "unix" && is_ephemeral(argument) {
            continue;
        }

        if !seen.insert((family, argument)) {
            return Err(ConfigError::validation(
                format!("outputs[{}].uri", idx),
                format!("duplicate listening output '{}'", output.uri),
            ));
        }
    }
    Ok(())
}

/// 端口 0 每次绑定都会分配新端口，不算重复
fn is_ephemeral(argument: &str) -> bool {
    let address = argument.split_once('/').map_or(argument, |(address, _)| address);
    address.rsplit_once(':').is_some_and(|(_, port)| port == "0")
}

fn scheme_of(uri: &str) -> &str {
    uri.split_once("://").map_or(uri, |(scheme, _)| scheme)
}
