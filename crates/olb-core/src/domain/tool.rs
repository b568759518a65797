//! Discovered tool entries.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumString};

/// Application surface a tool operates on.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ToolCategory {
    #[strum(to_string = "word", serialize = "document")]
    Word,
    #[strum(to_string = "excel", serialize = "spreadsheet")]
    Excel,
    #[strum(to_string = "powerpoint", serialize = "ppt", serialize = "presentation")]
    PowerPoint,
    #[default]
    General,
}

impl ToolCategory {
    /// Category from an advertised tag, falling back to the tool name prefix.
    pub fn resolve(advertised: Option<&str>, tool_name: &str) -> Self {
        if let Some(category) = advertised.and_then(|tag| tag.parse().ok()) {
            return category;
        }
        let lower = tool_name.to_ascii_lowercase();
        if lower.starts_with("word_") {
            Self::Word
        } else if lower.starts_with("excel_") {
            Self::Excel
        } else if lower.starts_with("ppt_") || lower.starts_with("powerpoint_") {
            Self::PowerPoint
        } else {
            Self::General
        }
    }
}

/// One addressable tool in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolEntry {
    /// Name callers use. Unique across the catalog.
    pub name: String,
    /// Name the owning server knows the tool by.
    pub remote_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub input_schema: Value,
    pub category: ToolCategory,
    pub server_id: String,
    /// Supported `action` values for action-multiplexed tools.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actions: Option<Vec<String>>,
}

impl ToolEntry {
    /// Top-level fields the input schema marks as required.
    pub fn required_fields(&self) -> Vec<&str> {
        self.input_schema
            .get("required")
            .and_then(Value::as_array)
            .map(|fields| fields.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    pub const fn is_multi_action(&self) -> bool {
        self.actions.is_some()
    }
}

/// The closed `action` set declared by a schema, if any.
///
/// A tool is action-multiplexed when its schema has a string property named
/// `action` constrained by a non-empty `enum`.
pub fn actions_from_schema(schema: &Value) -> Option<Vec<String>> {
    let variants = schema
        .get("properties")?
        .get("action")?
        .get("enum")?
        .as_array()?;
    let actions: Vec<String> = variants
        .iter()
        .filter_map(Value::as_str)
        .map(str::to_owned)
        .collect();
    (!actions.is_empty()).then_some(actions)
}
