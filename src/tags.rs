//! Tag derivation for ingested snippets.

use crate::snippet::SourceRecord;

/// Tag present on every snippet.
pub const BASE_TAG: &str = "react";

/// Tags for a record in fixed order: `react`, `recommended`, `upvoted`, `model:<name>`.
pub fn derive_tags(record: &SourceRecord) -> Vec<String> {
    let mut tags = vec![BASE_TAG.to_string()];
    if record.recommended {
        tags.push("recommended".to_string());
    }
    if record.upvoted {
        tags.push("upvoted".to_string());
    }
    if let Some(model) = record.model_name() {
        tags.push(format!("model:{model}"));
    }
    tags
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn record(recommended: bool, upvoted: bool, model: Option<&str>) -> SourceRecord {
        SourceRecord {
            messages: Vec::new(),
            recommended,
            upvoted,
            model: model.map(str::to_string),
        }
    }

    #[test]
    fn plain_record_is_only_react() {
        assert_eq!(derive_tags(&record(false, false, None)), vec!["react"]);
    }

    #[test]
    fn recommended_with_model() {
        assert_eq!(
            derive_tags(&record(true, false, Some("gpt-4"))),
            vec!["react", "recommended", "model:gpt-4"]
        );
    }

    #[test]
    fn all_flags_keep_fixed_order() {
        assert_eq!(
            derive_tags(&record(true, true, Some("claude"))),
            vec!["react", "recommended", "upvoted", "model:claude"]
        );
    }

    #[test]
    fn blank_model_is_ignored() {
        assert_eq!(derive_tags(&record(false, true, Some(""))), vec!["react", "upvoted"]);
    }
}
