//! Grounding context composition.
//!
//! Renders retrieved records into the text block spliced into the prompt.
//! Bounding the record set is a separate step (`ContextLimits::apply`) so
//! `compose` stays a pure function of its input.

use serde::{Deserialize, Serialize};

use super::record::DocumentRecord;

/// Inserted when retrieval produced nothing, so the prompt always carries a
/// context section.
pub const NO_CONTEXT_SENTINEL: &str = "[no grounding context available]";

/// Upper bounds on what is handed to `compose`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextLimits {
    pub max_records: Option<usize>,
    /// Applied to the rendered text of whole records; a record that would
    /// overflow is dropped together with everything after it.
    pub max_chars: Option<usize>,
}

impl ContextLimits {
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn apply(&self, records: Vec<DocumentRecord>) -> Vec<DocumentRecord> {
        let mut records = records;
        if let Some(max) = self.max_records {
            records.truncate(max);
        }

        let Some(budget) = self.max_chars else {
            return records;
        };

        let mut used = 0;
        let mut kept = Vec::with_capacity(records.len());
        for record in records {
            let separator = if kept.is_empty() { 0 } else { 2 };
            let cost = render_record(&record).chars().count() + separator;
            if used + cost > budget {
                tracing::debug!(
                    "Context budget of {} chars reached at {}",
                    budget,
                    record.id
                );
                break;
            }
            used += cost;
            kept.push(record);
        }
        kept
    }
}

pub struct ContextComposer;

impl ContextComposer {
    pub fn compose(records: &[DocumentRecord]) -> String {
        if records.is_empty() {
            return NO_CONTEXT_SENTINEL.to_string();
        }

        records
            .iter()
            .map(render_record)
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

fn render_record(record: &DocumentRecord) -> String {
    let fields = &record.fields;
    let mut lines = vec![format!("Name: {}", record.title)];

    let optional = [
        ("Category", &fields.category),
        ("Prep time", &fields.prep_time),
        ("Cook time", &fields.cook_time),
        ("Servings", &fields.servings),
    ];
    for (label, value) in optional {
        if let Some(value) = value.as_deref().filter(|v| !v.trim().is_empty()) {
            lines.push(format!("{}: {}", label, value));
        }
    }

    for (key, value) in &fields.extra {
        if !value.trim().is_empty() {
            lines.push(format!("{}: {}", key, value));
        }
    }

    lines.push(format!("Ingredients: {}", fields.ingredients));
    lines.push(format!("Instructions: {}", fields.instructions));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::RecordFields;

    fn cookie() -> DocumentRecord {
        let mut fields = RecordFields {
            category: Some("Dessert".to_string()),
            prep_time: Some("15 m".to_string()),
            servings: Some("48 cookies".to_string()),
            ingredients: "flour, butter".to_string(),
            instructions: "Bake.".to_string(),
            ..RecordFields::default()
        };
        fields.extra.insert("yield".to_string(), "4 trays".to_string());
        fields.extra.insert("cuisine".to_string(), "American".to_string());
        DocumentRecord::new("recipe_0", "Cookies", fields)
    }

    #[test]
    fn empty_input_yields_sentinel() {
        assert_eq!(ContextComposer::compose(&[]), NO_CONTEXT_SENTINEL);
    }

    #[test]
    fn fields_render_in_fixed_order() {
        let text = ContextComposer::compose(&[cookie()]);
        assert_eq!(
            text,
            "Name: Cookies\nCategory: Dessert\nPrep time: 15 m\nServings: 48 cookies\n\
             cuisine: American\nyield: 4 trays\nIngredients: flour, butter\nInstructions: Bake."
        );
    }

    #[test]
    fn records_are_separated_by_blank_line_and_deterministic() {
        let other = DocumentRecord::new(
            "recipe_1",
            "Toast",
            RecordFields {
                ingredients: "bread".to_string(),
                instructions: "Toast it.".to_string(),
                ..RecordFields::default()
            },
        );
        let records = vec![cookie(), other];

        let first = ContextComposer::compose(&records);
        assert_eq!(first, ContextComposer::compose(&records));
        assert!(first.contains("Instructions: Bake.\n\nName: Toast"));
    }

    #[test]
    fn limits_drop_whole_records() {
        let records: Vec<_> = (0..4)
            .map(|i| {
                DocumentRecord::new(
                    format!("r{}", i),
                    format!("Dish {}", i),
                    RecordFields::default(),
                )
            })
            .collect();

        let by_count = ContextLimits {
            max_records: Some(2),
            max_chars: None,
        };
        assert_eq!(by_count.apply(records.clone()).len(), 2);

        let one = render_record(&records[0]).chars().count();
        let by_chars = ContextLimits {
            max_records: None,
            max_chars: Some(one * 2 + 2),
        };
        let kept = by_chars.apply(records.clone());
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[1].id, "r1");

        assert_eq!(ContextLimits::unbounded().apply(records).len(), 4);
    }
}
