/// Expansion engine — breadth-first resolution of a placeholder into a tree
/// of entities.
///
/// Each resolved entity's Markdown text is parsed again for placeholders,
/// which are queued and resolved in turn. The configured output format only
/// shapes the text stored on the nodes. Content may reference itself, so
/// expansion stops once the tree holds [`MAX_TREE_ENTRIES`] nodes.

use rand::Rng;
use serde::Serialize;
use std::collections::VecDeque;
use thiserror::Error;
use tracing::debug;

use crate::core::curly::{has_entity_refs, parse_curlies, substitute_rolls_in};
use crate::core::dice::{self, DiceError};
use crate::core::render::{RenderOptions, Renderer, TextType};
use crate::core::store::{EntityLookup, LookupError};
use crate::core::table::TableError;
use crate::schema::curly::Curly;
use crate::schema::entity::Entity;
use crate::schema::tree::{EntityTree, NonUniqueAggregate};

/// Expansion stops adding nodes once the tree reaches this size.
pub const MAX_TREE_ENTRIES: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExpansionError {
    #[error("expected exactly one placeholder, found {0}")]
    NotSingleToken(usize),
    #[error("dice error: {0}")]
    Dice(#[from] DiceError),
    #[error("table error: {0}")]
    Table(#[from] TableError),
    #[error("lookup error: {0}")]
    Lookup(#[from] LookupError),
}

/// Result of one expansion call.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Expansion {
    pub tree: EntityTree,
    pub non_unique: NonUniqueAggregate,
}

impl Expansion {
    pub fn render(&self) -> String {
        render_expansion(self)
    }
}

/// Placeholders waiting in the queue, each with how many times to resolve it.
struct Group {
    placeholders: Vec<(Curly, u32)>,
    is_root: bool,
}

/// An entity looked up and parsed for one node, before uniqueness is decided.
struct ResolvedNode<'e> {
    entity: &'e Entity,
    /// Outcome of the entity's table, when it was rolled.
    outcome: Option<String>,
    nested: Vec<Curly>,
}

impl ResolvedNode<'_> {
    /// Whether rendering this node involved a roll that could come out
    /// differently for the next node of the same entity.
    fn is_random(&self) -> bool {
        self.outcome.is_some() || self.nested.iter().any(|c| !c.quantity_dice.is_empty())
    }
}

/// Resolves placeholders against an entity lookup and renders each node
/// with a renderer.
pub struct ExpansionEngine<'a> {
    lookup: &'a dyn EntityLookup,
    renderer: &'a dyn Renderer,
    options: RenderOptions,
}

impl<'a> ExpansionEngine<'a> {
    pub fn new(lookup: &'a dyn EntityLookup, renderer: &'a dyn Renderer) -> Self {
        Self {
            lookup,
            renderer,
            options: RenderOptions::default(),
        }
    }

    /// Render options for the text stored on nodes. `skip_table` is decided
    /// per node.
    pub fn with_render_options(mut self, options: RenderOptions) -> Self {
        self.options = options;
        self
    }

    // Placeholders are always read from unescaped Markdown: typesetting
    // strips braces and escaping rewrites underscores inside tokens.
    fn parse_options(&self, skip_table: bool) -> RenderOptions {
        RenderOptions {
            text_type: TextType::Markdown,
            escape_for_output: false,
            skip_table,
            ..self.options
        }
    }

    fn resolve_node<R: Rng + ?Sized>(
        &self,
        curly: &Curly,
        roll_dice: bool,
        rng: &mut R,
    ) -> Result<ResolvedNode<'a>, ExpansionError> {
        let entity = self.lookup.find_by_normalized_name(&curly.entity_name)?;
        let rolled_table = roll_dice && entity.has_table();
        let options = self.parse_options(rolled_table);
        let mut text = self.renderer.render(entity, &options);

        let outcome = match entity.table.as_ref().filter(|_| rolled_table) {
            Some(table) => Some(table.resolve(curly.table_result, rng)?.to_string()),
            None => None,
        };
        if let Some(outcome) = &outcome {
            text.push_str(&self.renderer.table_result(outcome, &options));
        }

        let nested = parse_curlies(&text, rng)?;
        Ok(ResolvedNode {
            entity,
            outcome,
            nested,
        })
    }

    /// Text of `entity` in the output format, with the tokens of `rolls`
    /// replaced by their rolled text and a rolled table `outcome` appended.
    fn display_text(&self, entity: &Entity, outcome: Option<&str>, rolls: &[Curly]) -> String {
        // Fields left out of the output must not take a substitution.
        let mut shown = entity.clone();
        if !self.options.include_full_text {
            shown.full_text.clear();
        }
        if outcome.is_some() {
            shown.table = None;
        }
        let mut outcome = outcome.map(str::to_string);
        {
            let mut fields = shown.text_fields_mut();
            fields.extend(outcome.as_mut());
            substitute_rolls_in(&mut fields, rolls);
        }

        let options = RenderOptions {
            skip_table: outcome.is_some(),
            ..self.options
        };
        let mut text = self.renderer.render(&shown, &options);
        if let Some(outcome) = &outcome {
            text.push_str(&self.renderer.table_result(outcome, &options));
        }
        text
    }

    /// Expand `root` breadth-first into a tree.
    ///
    /// With `roll_dice`, tables are rolled, nested placeholders are replaced
    /// in the node text by their rolled quantity, and each nested entity is
    /// queued as many times as rolled. Without it, nested placeholders are
    /// queued once each, as written. Without `expand_entities` only the root
    /// group is resolved.
    ///
    /// Nodes whose text came out of a roll are unique and keep their text.
    /// Other nodes are counted in the non-unique aggregate and their own text
    /// is left blank. Nodes of the root group are always unique.
    pub fn expand<R: Rng + ?Sized>(
        &self,
        root: &Curly,
        expand_entities: bool,
        roll_dice: bool,
        rng: &mut R,
    ) -> Result<Expansion, ExpansionError> {
        let mut tree = EntityTree::new();
        let mut non_unique = NonUniqueAggregate::new();
        let mut queue = VecDeque::from([Group {
            placeholders: vec![(root.clone(), root.quantity)],
            is_root: true,
        }]);

        let mut truncated = false;

        'groups: while tree.len() < MAX_TREE_ENTRIES {
            let Some(group) = queue.pop_front() else {
                break;
            };
            let parent = tree.last_id();

            for (curly, times) in &group.placeholders {
                if curly.entity_name.is_empty() {
                    continue;
                }
                for _ in 0..*times {
                    if tree.len() >= MAX_TREE_ENTRIES {
                        truncated = true;
                        break 'groups;
                    }
                    let node = self.resolve_node(curly, roll_dice, rng)?;
                    let unique = group.is_root || node.is_random();
                    let outcome = node.outcome.as_deref();

                    let text = if unique {
                        let rolls: &[Curly] = if roll_dice { &node.nested } else { &[] };
                        self.display_text(node.entity, outcome, rolls)
                    } else {
                        let first = match non_unique.get(&curly.entity_name) {
                            Some(_) => String::new(),
                            None => self.display_text(node.entity, outcome, &[]),
                        };
                        non_unique.record(&curly.entity_name, &first);
                        String::new()
                    };

                    if roll_dice {
                        if expand_entities {
                            queue.extend(
                                node.nested
                                    .iter()
                                    .filter(|c| !c.entity_name.is_empty() && c.quantity > 0)
                                    .map(|c| Group {
                                        placeholders: vec![(c.clone(), c.quantity)],
                                        is_root: false,
                                    }),
                            );
                        }
                    } else if expand_entities && !node.nested.is_empty() {
                        queue.push_back(Group {
                            placeholders: node.nested.iter().map(|c| (c.clone(), 1)).collect(),
                            is_root: false,
                        });
                    }

                    let id = tree.push(parent, curly.clone(), unique, text);
                    debug!(id, entity = %curly.entity_name, unique, "expanded node");
                }
            }
        }

        if truncated || !queue.is_empty() {
            debug!(
                entries = tree.len(),
                pending = queue.len(),
                "expansion stopped at the node cap"
            );
        }

        Ok(Expansion { tree, non_unique })
    }

    /// Parse `text` as exactly one placeholder, adding braces if missing.
    pub fn parse_single<R: Rng + ?Sized>(
        &self,
        text: &str,
        rng: &mut R,
    ) -> Result<Curly, ExpansionError> {
        let text = text.trim();
        let wrapped = if text.starts_with('{') && text.ends_with('}') {
            text.to_string()
        } else {
            format!("{{{}}}", text)
        };
        match <[Curly; 1]>::try_from(parse_curlies(&wrapped, rng)?) {
            Ok([curly]) => Ok(curly),
            Err(curlies) => Err(ExpansionError::NotSingleToken(curlies.len())),
        }
    }

    /// Evaluate a single ad-hoc placeholder such as `2d6`, `goblin` or
    /// `{1d4 goblin 3}` and return display text.
    ///
    /// A bare roll returns the rolled number. An entity without nested
    /// references, or any entity when `expand_entities` is off, returns its
    /// rendered text; with `roll_dice` that text is headed by the rolled
    /// quantity and has its placeholders rolled. Otherwise the full tree is
    /// expanded and rendered.
    pub fn evaluate_one<R: Rng + ?Sized>(
        &self,
        text: &str,
        expand_entities: bool,
        roll_dice: bool,
        rng: &mut R,
    ) -> Result<String, ExpansionError> {
        let root = self.parse_single(text, rng)?;
        if root.is_bare_roll() {
            return Ok(dice::evaluate(&root.quantity_dice, rng)?.to_string());
        }

        let entity = self.lookup.find_by_normalized_name(&root.entity_name)?;
        let text = self.renderer.render(entity, &self.parse_options(false));
        let nested = parse_curlies(&text, rng)?;

        if !expand_entities || !has_entity_refs(&nested) {
            if roll_dice {
                return Ok(format!(
                    "{} {}  \n{}",
                    root.quantity,
                    entity.name,
                    self.display_text(entity, None, &nested)
                ));
            }
            return Ok(self.display_text(entity, None, &[]));
        }

        let expansion = self.expand(&root, expand_entities, roll_dice, rng)?;
        Ok(render_expansion(&expansion))
    }
}

/// Render an expansion as Markdown: the non-unique entities with their
/// counts first (omitted when there are none), then the text of every
/// unique node in tree order.
pub fn render_expansion(expansion: &Expansion) -> String {
    let mut non_unique = String::new();
    if !expansion.non_unique.is_empty() {
        non_unique.push_str("### Non Unique Entities:\n");
        for entry in expansion.non_unique.iter() {
            non_unique.push_str(&format!(
                "\n{} {}  \n\n{}",
                entry.count, entry.name, entry.text
            ));
        }
    }

    let mut unique = String::from("### Unique Entities, Full Tree:\n");
    for node in expansion.tree.unique_entries() {
        unique.push('\n');
        unique.push_str(&node.text);
    }

    format!("{}\n{}", non_unique, unique).trim().to_string()
}
