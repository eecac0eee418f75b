//! Corpus sources: the bundled sample recipes and YAML/JSON corpus files.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use super::record::{DocumentRecord, RecordFields};
use crate::core::errors::RagError;

/// A corpus entry as written in a file; `id` is optional.
#[derive(Debug, Clone, Deserialize)]
pub struct CorpusEntry {
    #[serde(default)]
    pub id: Option<String>,
    pub title: String,
    #[serde(flatten)]
    pub fields: RecordFields,
}

/// Turns entries into records, assigning `"{prefix}_{index}"` to entries without an id.
///
/// Positional ids keep a static corpus stable across restarts, which is what
/// makes re-ingestion idempotent.
pub fn assign_ids(
    entries: Vec<CorpusEntry>,
    prefix: &str,
) -> Result<Vec<DocumentRecord>, RagError> {
    let mut seen = HashSet::new();
    let mut records = Vec::with_capacity(entries.len());

    for (idx, entry) in entries.into_iter().enumerate() {
        if entry.title.trim().is_empty() {
            return Err(RagError::Corpus(format!("entry {} has an empty title", idx)));
        }

        let id = match entry.id {
            Some(id) if !id.trim().is_empty() => id,
            _ => format!("{}_{}", prefix, idx),
        };
        if !seen.insert(id.clone()) {
            return Err(RagError::Corpus(format!("duplicate id '{}'", id)));
        }

        records.push(DocumentRecord::new(id, entry.title, entry.fields));
    }

    Ok(records)
}

/// Reads a YAML (or JSON) list of corpus entries.
pub fn load_corpus_file(path: &Path, prefix: &str) -> Result<Vec<DocumentRecord>, RagError> {
    let contents = fs::read_to_string(path)
        .map_err(|e| RagError::Corpus(format!("cannot read {}: {}", path.display(), e)))?;
    let entries: Vec<CorpusEntry> = serde_yaml::from_str(&contents)
        .map_err(|e| RagError::Corpus(format!("cannot parse {}: {}", path.display(), e)))?;
    assign_ids(entries, prefix)
}

pub fn sample_recipes(prefix: &str) -> Vec<DocumentRecord> {
    let samples = [
        (
            "Classic Chocolate Chip Cookies",
            "2 1/4 cups flour, 1 tsp baking soda, 1 cup butter, 3/4 cup sugar, 3/4 cup brown sugar, 2 eggs, 2 tsp vanilla, 2 cups chocolate chips",
            "Mix flour and soda. Beat butter and sugars. Add eggs and vanilla. Stir in flour then chips. Bake at 375°F for 9-11 mins.",
            ("15 m", "11 m", "48 cookies", "Dessert"),
        ),
        (
            "Spaghetti Carbonara",
            "1 lb spaghetti, 6 oz pancetta, 4 eggs, 1 cup Parmesan, garlic, pepper",
            "Cook pasta. Fry pancetta. Beat eggs with cheese. Toss hot pasta with pancetta and egg mixture quickly to create creamy sauce.",
            ("10 m", "15 m", "4 servings", "Main Course"),
        ),
        (
            "Chicken Tikka Masala",
            "Chicken breast, yogurt, tikka spices, onion, garlic, tomato sauce, heavy cream, butter",
            "Marinate chicken. Grill it. Simmer onion, spices, and tomato sauce. Add cream and chicken. Simmer 10 mins.",
            ("2 hr", "30 m", "6 servings", "Main Course"),
        ),
        (
            "Greek Salad",
            "Tomatoes, cucumber, red onion, feta cheese, olives, olive oil, oregano",
            "Chop veggies. Mix with olives. Whisk oil and oregano. Toss everything together. Top with feta.",
            ("15 m", "0 m", "6 servings", "Salad"),
        ),
        (
            "Banana Bread",
            "3 bananas, 1/3 cup melted butter, 1 tsp baking soda, 3/4 cup sugar, 1 egg, 1.5 cups flour",
            "Mash bananas. Mix in butter, soda, sugar, egg. Fold in flour. Bake at 350°F for 60 mins.",
            ("10 m", "60 m", "8 slices", "Dessert"),
        ),
    ];

    samples
        .into_iter()
        .enumerate()
        .map(
            |(idx, (title, ingredients, instructions, (prep, cook, servings, category)))| {
                DocumentRecord::new(
                    format!("{}_{}", prefix, idx),
                    title,
                    RecordFields {
                        category: Some(category.to_string()),
                        prep_time: Some(prep.to_string()),
                        cook_time: Some(cook.to_string()),
                        servings: Some(servings.to_string()),
                        ingredients: ingredients.to_string(),
                        instructions: instructions.to_string(),
                        ..RecordFields::default()
                    },
                )
            },
        )
        .collect()
}
