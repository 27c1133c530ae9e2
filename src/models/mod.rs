pub mod metadata;
pub mod placement;
pub mod task;
