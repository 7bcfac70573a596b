pub mod curly;
pub mod dice;
pub mod engine;
pub mod expansion;
pub mod render;
pub mod store;
pub mod table;
