//! Command implementations

pub mod knowledge_base;
pub mod operation;
pub mod profile;
pub mod quickstart;
