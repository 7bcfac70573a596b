pub mod curly;
pub mod entity;
pub mod tree;
