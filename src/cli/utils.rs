use std::fs;
use std::io::Read;

use anyhow::Context;
use serde_json::{json, Value};

use crate::cli::OutputFormat;

/// Output a success message in the appropriate format
pub fn output_success(output_format: &OutputFormat, message: &str, data: Option<Value>) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({ "message": message });
            if let Some(data) = data {
                response["data"] = data;
            }
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            println!("✓ {}", message);
        }
    }
    Ok(())
}

/// Output an error message in the appropriate format
pub fn output_error(output_format: &OutputFormat, message: &str) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&json!({ "error": message }))?);
        }
        OutputFormat::Text => {
            eprintln!("Error: {}", message);
        }
    }
    Ok(())
}

/// Reads a JSON document from a file, or from stdin when `path` is `-`.
pub fn read_json_input(path: &str) -> anyhow::Result<Value> {
    let raw = if path == "-" {
        let mut buffer = String::new();
        std::io::stdin().read_to_string(&mut buffer).context("failed to read stdin")?;
        buffer
    } else {
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path))?
    };
    serde_json::from_str(&raw).with_context(|| format!("{} is not valid JSON", path))
}

/// Writes pretty JSON to a file, or to stdout without a path.
pub fn write_json_output(path: Option<&str>, value: &Value) -> anyhow::Result<()> {
    let pretty = serde_json::to_string_pretty(value)?;
    match path {
        Some(path) => fs::write(path, pretty).with_context(|| format!("failed to write {}", path)),
        None => {
            println!("{}", pretty);
            Ok(())
        }
    }
}

/// Number of entries in a JSON array, zero for anything else.
pub fn count_items(value: &Value) -> usize {
    value.as_array().map_or(0, Vec::len)
}
