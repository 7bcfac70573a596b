/// Content store — loading entities from RON files and looking them up by
/// normalized name.

use ron::extensions::Extensions;
use rustc_hash::FxHashMap;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

use crate::core::render::{RenderOptions, Renderer};
use crate::schema::entity::{clean_name, Entity};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("entity not found: {0}")]
    EntityNotFound(String),
    #[error("entity name '{name}' is ambiguous ({matches} matches)")]
    AmbiguousEntity { name: String, matches: usize },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("duplicate content key: {0}")]
    DuplicateKey(String),
}

/// Read-only access to entities by normalized name.
pub trait EntityLookup {
    /// Find the single entity whose normalized name matches `name`.
    fn find_by_normalized_name(&self, name: &str) -> Result<&Entity, LookupError>;
}

/// A query over entity fields, used by [`ContentStore::filter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// A text field equals the value.
    Equals { field: String, value: String },
    /// A list field contains every value.
    ContainsAll { field: String, values: Vec<String> },
}

impl Filter {
    pub fn equals(field: &str, value: &str) -> Self {
        Filter::Equals {
            field: field.to_string(),
            value: value.to_string(),
        }
    }

    pub fn contains_all(field: &str, values: &[&str]) -> Self {
        Filter::ContainsAll {
            field: field.to_string(),
            values: values.iter().map(|v| v.to_string()).collect(),
        }
    }

    pub fn matches(&self, entity: &Entity) -> bool {
        match self {
            Filter::Equals { field, value } => entity.text_field(field) == Some(value.as_str()),
            Filter::ContainsAll { field, values } => entity
                .list_field(field)
                .is_some_and(|list| values.iter().all(|v| list.contains(v))),
        }
    }
}

/// In-memory entity collection keyed by source key, indexed by normalized
/// name.
#[derive(Debug, Clone, Default)]
pub struct ContentStore {
    entries: Vec<(String, Entity)>,
    keys: FxHashMap<String, usize>,
    by_name: FxHashMap<String, Vec<usize>>,
}

fn ron_options() -> ron::Options {
    ron::Options::default().with_default_extension(Extensions::IMPLICIT_SOME)
}

impl ContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entity under a source key. Its `clean_name` is derived from
    /// its display name and its table, if any, is expanded.
    pub fn insert(&mut self, key: &str, mut entity: Entity) -> Result<(), StoreError> {
        if self.keys.contains_key(key) {
            return Err(StoreError::DuplicateKey(key.to_string()));
        }
        entity.clean_name = clean_name(&entity.name);
        entity.table = entity.table.take().map(|t| t.expand());

        let index = self.entries.len();
        self.keys.insert(key.to_string(), index);
        self.by_name
            .entry(entity.clean_name.clone())
            .or_default()
            .push(index);
        self.entries.push((key.to_string(), entity));
        Ok(())
    }

    /// Parse a content file: a RON map from source key to entity.
    pub fn parse_ron(input: &str) -> Result<ContentStore, StoreError> {
        let mut store = ContentStore::new();
        store.extend_from_ron(input)?;
        Ok(store)
    }

    /// Load a single content file.
    pub fn load_from_ron(path: &Path) -> Result<ContentStore, StoreError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    /// Load every `.ron` file below `dir`, descending into subdirectories.
    /// Keys must be unique across all files.
    pub fn load_from_dir(dir: &Path) -> Result<ContentStore, StoreError> {
        let mut store = ContentStore::new();
        store.load_dir_into(dir)?;
        info!(dir = %dir.display(), entities = store.len(), "loaded content");
        Ok(store)
    }

    fn load_dir_into(&mut self, dir: &Path) -> Result<(), StoreError> {
        let mut paths = std::fs::read_dir(dir)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<Result<Vec<_>, _>>()?;
        paths.sort();

        for path in paths {
            if path.is_dir() {
                self.load_dir_into(&path)?;
            } else if path.extension().and_then(|s| s.to_str()) == Some("ron") {
                let contents = std::fs::read_to_string(&path)?;
                let added = self.extend_from_ron(&contents)?;
                debug!(path = %path.display(), entities = added, "loaded content file");
            }
        }
        Ok(())
    }

    fn extend_from_ron(&mut self, input: &str) -> Result<usize, StoreError> {
        let raw: BTreeMap<String, Entity> = ron_options().from_str(input)?;
        let added = raw.len();
        for (key, entity) in raw {
            self.insert(&key, entity)?;
        }
        Ok(added)
    }

    /// Move every entity of `other` into this store.
    pub fn merge(&mut self, other: ContentStore) -> Result<(), StoreError> {
        for (key, entity) in other.entries {
            self.insert(&key, entity)?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entity stored under a source key.
    pub fn get(&self, key: &str) -> Option<&Entity> {
        self.keys.get(key).map(|&i| &self.entries[i].1)
    }

    /// All entities in insertion order.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entries.iter().map(|(_, e)| e)
    }

    /// Number of entities sharing each normalized name, for names used more
    /// than once.
    pub fn ambiguous_names(&self) -> BTreeMap<&str, usize> {
        self.by_name
            .iter()
            .filter(|(_, ids)| ids.len() > 1)
            .map(|(name, ids)| (name.as_str(), ids.len()))
            .collect()
    }

    /// Every value seen in each list field, sorted and deduplicated.
    pub fn unique_list_values(&self) -> BTreeMap<&'static str, Vec<String>> {
        let mut seen: BTreeMap<&'static str, BTreeSet<String>> = BTreeMap::new();
        for entity in self.entities() {
            for (field, values) in entity.list_fields() {
                if values.is_empty() {
                    continue;
                }
                seen.entry(field).or_default().extend(values.iter().cloned());
            }
        }
        seen.into_iter()
            .map(|(field, values)| (field, values.into_iter().collect()))
            .collect()
    }

    /// Entities matching every filter.
    pub fn filter(&self, filters: &[Filter]) -> Vec<&Entity> {
        self.entities()
            .filter(|e| filters.iter().all(|f| f.matches(e)))
            .collect()
    }

    /// Render every entity, sorted by name, one after another. Entities
    /// tagged `deprecated` in their meta tags are left out unless asked for.
    pub fn render_section(
        &self,
        renderer: &dyn Renderer,
        options: &RenderOptions,
        include_deprecated: bool,
    ) -> String {
        let mut entities: Vec<&Entity> = self
            .entities()
            .filter(|e| include_deprecated || !e.has_meta_tag("deprecated"))
            .collect();
        entities.sort_by(|a, b| a.name.cmp(&b.name));

        let mut text = String::new();
        for entity in entities {
            text.push_str(&renderer.render(entity, options));
            text.push('\n');
        }
        text
    }
}

impl EntityLookup for ContentStore {
    fn find_by_normalized_name(&self, name: &str) -> Result<&Entity, LookupError> {
        let name = clean_name(name);
        match self.by_name.get(&name).map(Vec::as_slice) {
            Some([index]) => Ok(&self.entries[*index].1),
            Some(ids) if ids.len() > 1 => Err(LookupError::AmbiguousEntity {
                name,
                matches: ids.len(),
            }),
            _ => Err(LookupError::EntityNotFound(name)),
        }
    }
}
