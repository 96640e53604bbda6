use serde_json::{json, Value};

use crate::cli::OutputFormat;
use crate::taxonomy::model::TaxonomyTree;

/// Output a success message in the appropriate format
pub fn output_success(output_format: &OutputFormat, message: &str, data: Option<Value>) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": true,
                "message": message
            });

            if let (Some(Value::Object(extra)), Some(body)) = (data, response.as_object_mut()) {
                body.extend(extra);
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
pub fn output_error(output_format: &OutputFormat, message: &str, error_code: Option<&str>) -> anyhow::Result<()> {
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

/// Output an empty collection in the appropriate format
pub fn output_empty_collection(output_format: &OutputFormat, collection_name: &str, message: &str) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    collection_name: []
                }))?
            );
        }
        OutputFormat::Text => {
            println!("{}", message);
        }
    }
    Ok(())
}

/// Pretty JSON, or the pre-rendered text lines
pub fn output_data(output_format: &OutputFormat, data: &Value, text: &[String]) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(data)?),
        OutputFormat::Text => {
            for line in text {
                println!("{}", line);
            }
        }
    }
    Ok(())
}

/// Indented outline of the taxonomy
pub fn render_tree(tree: &TaxonomyTree) -> Vec<String> {
    let mut lines = Vec::new();
    for grade in tree.grades() {
        lines.push(format!("{} [{}] ({})", grade.name, grade.slug, grade.id));
        for topic in tree.topics_of(&grade.id) {
            lines.push(format!("  {} [{}] ({})", topic.name, topic.slug, topic.id));
            for section in tree.sections_of(&topic.id) {
                lines.push(format!("    {} [{}] ({})", section.name, section.slug, section.id));
            }
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxonomy::model::fixtures::sample_tree;

    #[test]
    fn tree_outline_follows_sort_order() {
        let lines = render_tree(&sample_tree());
        assert_eq!(lines[0], "Lớp 10 [lop-10] (lop-10)");
        assert_eq!(lines[1], "  Chủ đề 1 [cd-1] (cd-1)");
        assert_eq!(lines[2], "    Mục A [muc-a] (muc-a)");
        assert_eq!(lines.last().map(String::as_str), Some("Lớp 12 [lop-12] (lop-12)"));
    }
}
