use serde::{Deserialize, Serialize};

/// One decoded `{...}` placeholder.
///
/// `{2d4 goblin 1d6}` asks for 2d4 goblins and a 1d6 roll on the goblin
/// table; `{3 goblin}` asks for exactly three; `{1d20}` is a bare roll with
/// no entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Curly {
    /// The token exactly as it appeared in the text, braces included.
    pub raw_match: String,
    /// Leading dice notation, empty when the quantity was literal or absent.
    pub quantity_dice: String,
    /// Normalized entity name, empty for a bare dice roll.
    pub entity_name: String,
    /// Trailing dice notation for a table roll.
    pub table_dice: String,
    pub quantity: u32,
    pub table_result: Option<i64>,
}

impl Curly {
    /// A placeholder referring to `quantity` of an entity, as if written
    /// `{<quantity> <entity_name>}`.
    pub fn for_entity(entity_name: &str, quantity: u32) -> Self {
        Self {
            raw_match: format!("{{{} {}}}", quantity, entity_name),
            quantity_dice: String::new(),
            entity_name: entity_name.to_string(),
            table_dice: String::new(),
            quantity,
            table_result: None,
        }
    }

    /// True when the placeholder is only a dice roll.
    pub fn is_bare_roll(&self) -> bool {
        self.entity_name.is_empty()
    }

    /// Text that replaces the token once its dice have been rolled.
    pub fn rolled_text(&self) -> String {
        format!("{} {}", self.quantity, self.entity_name)
            .trim()
            .to_string()
    }
}
