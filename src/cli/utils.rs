use serde_json::{json, Value};

use crate::cli::OutputFormat;

/// Output a success message in the appropriate format; object `data` is merged into the JSON body
pub fn output_success(output_format: OutputFormat, message: &str, data: Option<Value>) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": true,
                "message": message
            });

            match (response.as_object_mut(), data) {
                (Some(body), Some(Value::Object(extra))) => body.extend(extra),
                (Some(body), Some(other)) => {
                    body.insert("data".to_string(), other);
                }
                _ => {}
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
pub fn output_error(output_format: OutputFormat, message: &str, error_code: Option<&str>) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": false,
                "error": message
            });

            if let Some(code) = error_code {
                response["error_code"] = json!(code);
            }

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            eprintln!("Error: {}", message);
        }
    }
    Ok(())
}

/// Two-column text listing, e.g. table name and row count
pub fn print_rows<'a>(header: (&str, &str), rows: impl IntoIterator<Item = (&'a str, String)>) {
    println!("{:<24} {}", header.0, header.1);
    println!("{}", "-".repeat(40));
    for (name, value) in rows {
        println!("{:<24} {}", name, value);
    }
}
