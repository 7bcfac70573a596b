use rustc_hash::FxHashMap;
use serde::Serialize;

use super::curly::Curly;

/// One resolved placeholder in an expansion tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeEntry {
    pub id: usize,
    pub entity: String,
    pub children: Vec<usize>,
    /// Whether the node's expansion involved randomness. Non-unique nodes
    /// keep their text in the aggregate instead.
    pub unique: bool,
    pub text: String,
    pub curly: Curly,
}

/// Arena of expansion nodes. A node's id is its index; nodes are only ever
/// appended.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EntityTree {
    entries: Vec<TreeEntry>,
}

impl EntityTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a node, linking it under `parent` when given. Returns its id.
    pub fn push(
        &mut self,
        parent: Option<usize>,
        curly: Curly,
        unique: bool,
        text: String,
    ) -> usize {
        let id = self.entries.len();
        if let Some(parent) = parent.and_then(|p| self.entries.get_mut(p)) {
            parent.children.push(id);
        }
        self.entries.push(TreeEntry {
            id,
            entity: curly.entity_name.clone(),
            children: Vec::new(),
            unique,
            text,
            curly,
        });
        id
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: usize) -> Option<&TreeEntry> {
        self.entries.get(id)
    }

    /// Id of the most recently appended node.
    pub fn last_id(&self) -> Option<usize> {
        self.entries.len().checked_sub(1)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TreeEntry> {
        self.entries.iter()
    }

    pub fn unique_entries(&self) -> impl Iterator<Item = &TreeEntry> {
        self.entries.iter().filter(|e| e.unique)
    }
}

/// Shared text and occurrence count for a deterministic expansion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NonUniqueEntity {
    pub name: String,
    pub text: String,
    pub count: u32,
}

/// Bucket of non-unique expansions keyed by entity name, in first-seen
/// order. The text of a bucket is written once; later sightings only bump
/// the count.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NonUniqueAggregate {
    entries: Vec<NonUniqueEntity>,
    #[serde(skip)]
    index: FxHashMap<String, usize>,
}

impl NonUniqueAggregate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one sighting of `name`, storing `text` if it is the first.
    pub fn record(&mut self, name: &str, text: &str) {
        match self.index.get(name) {
            Some(&i) => self.entries[i].count += 1,
            None => {
                self.index.insert(name.to_string(), self.entries.len());
                self.entries.push(NonUniqueEntity {
                    name: name.to_string(),
                    text: text.to_string(),
                    count: 1,
                });
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&NonUniqueEntity> {
        self.index.get(name).map(|&i| &self.entries[i])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NonUniqueEntity> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_links_children_by_id() {
        let mut tree = EntityTree::new();
        let root = tree.push(None, Curly::for_entity("camp", 1), true, "camp".into());
        let a = tree.push(Some(root), Curly::for_entity("goblin", 1), false, String::new());
        let b = tree.push(Some(root), Curly::for_entity("goblin", 1), false, String::new());
        assert_eq!((root, a, b), (0, 1, 2));
        assert_eq!(tree.get(root).unwrap().children, vec![1, 2]);
        assert_eq!(tree.last_id(), Some(2));
        assert_eq!(tree.unique_entries().count(), 1);
    }

    #[test]
    fn empty_tree_has_no_last_id() {
        let tree = EntityTree::new();
        assert!(tree.is_empty());
        assert_eq!(tree.last_id(), None);
    }

    #[test]
    fn aggregate_keeps_first_text() {
        let mut agg = NonUniqueAggregate::new();
        agg.record("goblin", "first");
        agg.record("rat", "a rat");
        agg.record("goblin", "second");
        let goblin = agg.get("goblin").unwrap();
        assert_eq!(goblin.text, "first");
        assert_eq!(goblin.count, 2);
        let order: Vec<&str> = agg.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(order, vec!["goblin", "rat"]);
    }
}
