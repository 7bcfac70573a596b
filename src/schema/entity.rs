use serde::{Deserialize, Serialize};

use crate::core::table::Table;

/// Normalize a display name into the key used for lookups.
///
/// Lowercases, trims, turns spaces and hyphens into underscores and drops
/// every character outside `[a-z0-9_]`. Already-normalized names pass
/// through unchanged.
pub fn clean_name(name: &str) -> String {
    name.to_lowercase()
        .trim()
        .replace([' ', '-'], "_")
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_')
        .collect()
}

/// A content record: a creature, item, place, ability or anything else
/// that entity text can reference with a curly placeholder.
///
/// Text fields left empty are treated as absent by the renderers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Entity {
    pub name: String,
    /// Lookup key derived from `name` when the entity enters a store.
    pub clean_name: String,
    pub hp: String,
    pub scores: Vec<String>,
    pub skills: Vec<String>,
    pub holds: String,
    pub tags: Vec<String>,
    pub requirements: Vec<String>,
    pub cost: Vec<String>,
    pub speed: String,
    pub target: String,
    pub to_hit: String,
    pub attacks: Vec<String>,
    pub effect: String,
    pub table: Option<Table>,
    pub flavor_text: String,
    pub full_text: String,
    pub encumbrance: String,
    pub meta_tags: Vec<String>,
}

impl Entity {
    /// A bare entity with a name and an effect line, the common shape for
    /// hand-built content.
    pub fn new(name: &str, effect: &str) -> Self {
        Self {
            name: name.to_string(),
            clean_name: clean_name(name),
            effect: effect.to_string(),
            ..Self::default()
        }
    }

    pub fn with_table(mut self, table: Table) -> Self {
        self.table = Some(table);
        self
    }

    pub fn has_table(&self) -> bool {
        self.table.is_some()
    }

    pub fn has_meta_tag(&self, tag: &str) -> bool {
        self.meta_tags.iter().any(|t| t == tag)
    }

    /// Value of a single-text field by its content-file name.
    pub fn text_field(&self, field: &str) -> Option<&str> {
        let value = match field {
            "name" => &self.name,
            "clean_name" => &self.clean_name,
            "hp" => &self.hp,
            "holds" => &self.holds,
            "speed" => &self.speed,
            "target" => &self.target,
            "to_hit" => &self.to_hit,
            "effect" => &self.effect,
            "flavor_text" => &self.flavor_text,
            "full_text" => &self.full_text,
            "encumbrance" => &self.encumbrance,
            _ => return None,
        };
        Some(value.as_str())
    }

    /// Value of a list field by its content-file name.
    pub fn list_field(&self, field: &str) -> Option<&[String]> {
        let value = match field {
            "scores" => &self.scores,
            "skills" => &self.skills,
            "tags" => &self.tags,
            "requirements" => &self.requirements,
            "cost" => &self.cost,
            "attacks" => &self.attacks,
            "meta_tags" => &self.meta_tags,
            _ => return None,
        };
        Some(value.as_slice())
    }

    /// All list fields with their names, in rendering order.
    pub fn list_fields(&self) -> [(&'static str, &[String]); 7] {
        [
            ("scores", self.scores.as_slice()),
            ("skills", self.skills.as_slice()),
            ("tags", self.tags.as_slice()),
            ("requirements", self.requirements.as_slice()),
            ("cost", self.cost.as_slice()),
            ("attacks", self.attacks.as_slice()),
            ("meta_tags", self.meta_tags.as_slice()),
        ]
    }

    /// Every displayed text value, table outcomes included, in rendering
    /// order.
    pub fn text_fields_mut(&mut self) -> Vec<&mut String> {
        let mut fields = vec![&mut self.name, &mut self.hp];
        fields.extend(self.scores.iter_mut());
        fields.extend(self.skills.iter_mut());
        fields.push(&mut self.holds);
        fields.extend(self.tags.iter_mut());
        fields.extend(self.requirements.iter_mut());
        fields.extend(self.cost.iter_mut());
        fields.extend([&mut self.speed, &mut self.target, &mut self.to_hit]);
        fields.extend(self.attacks.iter_mut());
        fields.push(&mut self.effect);
        if let Some(table) = self.table.as_mut() {
            fields.extend(table.outcomes.iter_mut().map(|(_, text)| text));
        }
        fields.extend([
            &mut self.flavor_text,
            &mut self.full_text,
            &mut self.encumbrance,
        ]);
        fields
    }
}
