//! Output formats for word diffs.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use super::word::{ChangeTag, DiffSegment};

/// Output format for a rendered diff.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DiffFormat {
    /// JSON array of `{"tag": ..., "text": ...}` objects.
    Structured,
    /// Plain text with `[-removed-]` and `{+added+}` markers.
    Text,
    /// Inline `<del>` / `<ins>` markup.
    #[default]
    Html,
}

/// Escape text so a downstream HTML renderer treats it as inert content.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

pub(crate) fn render(segments: &[DiffSegment], format: DiffFormat) -> String {
    match format {
        DiffFormat::Structured => {
            let items = segments
                .iter()
                .map(|s| {
                    serde_json::json!({
                        "tag": s.tag,
                        "text": escape_html(&s.text),
                    })
                })
                .collect();
            serde_json::Value::Array(items).to_string()
        }
        DiffFormat::Text => segments
            .iter()
            .map(|s| {
                let text = escape_html(&s.text);
                match s.tag {
                    ChangeTag::Equal => text,
                    ChangeTag::Delete => format!("[-{}-]", text),
                    ChangeTag::Insert => format!("{{+{}+}}", text),
                }
            })
            .collect(),
        DiffFormat::Html => segments
            .iter()
            .map(|s| {
                let text = escape_html(&s.text);
                match s.tag {
                    ChangeTag::Equal => text,
                    ChangeTag::Delete => format!("<del class=\"differ\">{}</del>", text),
                    ChangeTag::Insert => format!("<ins class=\"differ\">{}</ins>", text),
                }
            })
            .collect(),
    }
}
