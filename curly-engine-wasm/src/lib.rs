//! WASM bindings for curly-engine — rolls placeholders in the browser.

use wasm_bindgen::prelude::*;

use curly_engine::core::engine::CurlyEngine;
use curly_engine::core::render::TextType;
use curly_engine::core::store::ContentStore;

// ---------------------------------------------------------------------------
// JSON helper types for communication across the WASM boundary
// ---------------------------------------------------------------------------
#[derive(serde::Serialize)]
struct EntityInfo {
    name: String,
    clean_name: String,
    tags: Vec<String>,
    has_table: bool,
}

// ---------------------------------------------------------------------------
// CurlyEngineHandle — the JS-facing API
// ---------------------------------------------------------------------------
#[wasm_bindgen]
pub struct CurlyEngineHandle {
    engine: CurlyEngine,
    content_ron: String,
}

#[wasm_bindgen]
impl CurlyEngineHandle {
    /// Create an engine from a RON content map (source key to entity).
    #[wasm_bindgen(constructor)]
    pub fn new(content_ron: &str, seed: u64) -> Result<CurlyEngineHandle, JsError> {
        let engine = build_engine(content_ron, seed, false)?;
        Ok(CurlyEngineHandle {
            engine,
            content_ron: content_ron.to_string(),
        })
    }

    /// Evaluate one placeholder, e.g. `"2d6"` or `"{1d4 goblin 3}"`, and
    /// return Markdown (or LaTeX after `set_typeset(true)`).
    pub fn evaluate(&mut self, token: &str, expand: bool, roll: bool) -> Result<String, JsError> {
        self.engine
            .evaluate_one(token, expand, roll)
            .map_err(|e| JsError::new(&format!("Evaluation error: {e}")))
    }

    /// Expand a placeholder and return the tree and non-unique aggregate as
    /// JSON.
    pub fn expand_tree_json(&mut self, token: &str, roll: bool) -> Result<String, JsError> {
        let expansion = self
            .engine
            .expand(token, true, roll)
            .map_err(|e| JsError::new(&format!("Expansion error: {e}")))?;
        serde_json::to_string(&expansion)
            .map_err(|e| JsError::new(&format!("Serialization error: {e}")))
    }

    /// Return a JSON array describing every loaded entity.
    pub fn entities(&self) -> Result<String, JsError> {
        let mut entities: Vec<EntityInfo> = self
            .engine
            .store()
            .entities()
            .map(|e| EntityInfo {
                name: e.name.clone(),
                clean_name: e.clean_name.clone(),
                tags: e.tags.clone(),
                has_table: e.has_table(),
            })
            .collect();
        entities.sort_by(|a, b| a.name.cmp(&b.name));
        serde_json::to_string(&entities)
            .map_err(|e| JsError::new(&format!("Serialization error: {e}")))
    }

    /// Return a JSON object of list field name to the values used in content.
    pub fn list_values(&self) -> Result<String, JsError> {
        serde_json::to_string(&self.engine.store().unique_list_values())
            .map_err(|e| JsError::new(&format!("Serialization error: {e}")))
    }

    /// Switch between Markdown and LaTeX output.
    pub fn set_typeset(&mut self, typeset: bool) -> Result<(), JsError> {
        self.engine = build_engine(&self.content_ron, self.engine.seed(), typeset)?;
        Ok(())
    }

    /// Reset the engine with a new seed (same content).
    pub fn reset(&mut self, seed: u64) {
        self.engine.set_seed(seed);
    }
}

fn build_engine(content_ron: &str, seed: u64, typeset: bool) -> Result<CurlyEngine, JsError> {
    let store = ContentStore::parse_ron(content_ron)
        .map_err(|e| JsError::new(&format!("Content error: {e}")))?;
    let text_type = if typeset {
        TextType::Typeset
    } else {
        TextType::Markdown
    };
    CurlyEngine::builder()
        .seed(seed)
        .text_type(text_type)
        .with_store(store)
        .build()
        .map_err(|e| JsError::new(&format!("Engine error: {e}")))
}
