//! Curly engine — recursive placeholder expansion for tabletop content.
//!
//! Expands `{quantity entity table}` placeholders found in entity text into
//! a tree of resolved entities, rolling dice and random tables on the way.

pub mod core;
pub mod schema;
