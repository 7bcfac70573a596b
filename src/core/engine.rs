/// The top-level engine: content store, renderer and seeded randomness
/// behind one handle.

use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

use crate::core::expansion::{render_expansion, Expansion, ExpansionEngine, ExpansionError};
use crate::core::render::{EntityRenderer, RenderOptions, TextType};
use crate::core::store::{ContentStore, StoreError};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("content error: {0}")]
    Store(#[from] StoreError),
    #[error("expansion error: {0}")]
    Expansion(#[from] ExpansionError),
}

/// Evaluates placeholders against loaded content. Built via
/// `CurlyEngine::builder()`.
pub struct CurlyEngine {
    store: ContentStore,
    renderer: EntityRenderer,
    options: RenderOptions,
    seed: u64,
    generation_count: u64,
}

/// Builder for constructing a `CurlyEngine`.
pub struct CurlyEngineBuilder {
    content_dirs: Vec<String>,
    seed: u64,
    text_type: TextType,
    escape_for_output: bool,
    /// Directly provided content (for testing without files).
    store: Option<ContentStore>,
}

impl CurlyEngine {
    pub fn builder() -> CurlyEngineBuilder {
        CurlyEngineBuilder {
            content_dirs: Vec::new(),
            seed: 0,
            text_type: TextType::Markdown,
            escape_for_output: false,
            store: None,
        }
    }

    pub fn store(&self) -> &ContentStore {
        &self.store
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Reseed the engine. Calls after this replay the same rolls as a fresh
    /// engine built with `seed`.
    pub fn set_seed(&mut self, seed: u64) {
        self.seed = seed;
        self.generation_count = 0;
    }

    fn next_rng(&mut self) -> StdRng {
        let rng = StdRng::seed_from_u64(self.seed.wrapping_add(self.generation_count));
        self.generation_count += 1;
        rng
    }

    fn expansion_engine(&self) -> ExpansionEngine<'_> {
        ExpansionEngine::new(&self.store, &self.renderer).with_render_options(self.options)
    }

    /// Evaluate a single placeholder (`"2d6"`, `"goblin"`, `"{1d4 goblin}"`)
    /// to display text.
    pub fn evaluate_one(
        &mut self,
        token: &str,
        expand_entities: bool,
        roll_dice: bool,
    ) -> Result<String, EngineError> {
        let mut rng = self.next_rng();
        let text = self
            .expansion_engine()
            .evaluate_one(token, expand_entities, roll_dice, &mut rng)?;
        Ok(text)
    }

    /// Expand a single placeholder into its full entity tree.
    pub fn expand(
        &mut self,
        token: &str,
        expand_entities: bool,
        roll_dice: bool,
    ) -> Result<Expansion, EngineError> {
        let mut rng = self.next_rng();
        let engine = self.expansion_engine();
        let root = engine.parse_single(token, &mut rng)?;
        Ok(engine.expand(&root, expand_entities, roll_dice, &mut rng)?)
    }

    pub fn render_expansion(&self, expansion: &Expansion) -> String {
        render_expansion(expansion)
    }
}

impl CurlyEngineBuilder {
    /// Load every `.ron` file under `path`. May be given more than once.
    pub fn content_dir(mut self, path: &str) -> Self {
        self.content_dirs.push(path.to_string());
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn text_type(mut self, text_type: TextType) -> Self {
        self.text_type = text_type;
        self
    }

    pub fn escape_for_output(mut self, escape: bool) -> Self {
        self.escape_for_output = escape;
        self
    }

    /// Provide content directly (for testing without files).
    pub fn with_store(mut self, store: ContentStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn build(self) -> Result<CurlyEngine, EngineError> {
        let mut store = self.store.unwrap_or_default();

        for dir in &self.content_dirs {
            let path = Path::new(dir);
            if !path.exists() {
                warn!(dir = %dir, "content directory not found, skipping");
                continue;
            }
            store.merge(ContentStore::load_from_dir(path)?)?;
        }
        info!(entities = store.len(), seed = self.seed, "curly engine ready");

        Ok(CurlyEngine {
            store,
            renderer: EntityRenderer,
            options: RenderOptions {
                text_type: self.text_type,
                escape_for_output: self.escape_for_output,
                ..RenderOptions::default()
            },
            seed: self.seed,
            generation_count: 0,
        })
    }
}
