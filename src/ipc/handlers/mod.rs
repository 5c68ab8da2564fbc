pub mod ai_cache;
pub mod core;
pub mod curriculum;
pub mod plans;
pub mod selection;
