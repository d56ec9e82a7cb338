//! The engine pipeline: slug resolution, query planning, pagination and
//! frame assembly.

pub mod engine;
pub mod frame;
pub mod pagination;
pub mod queries;
pub mod registry;
pub mod repos;
pub mod search;

pub use engine::{Engine, FrameRequest};
pub use frame::LeftFrame;
pub use registry::SlugRegistry;
pub use repos::{ReadStore, StoreError};
pub use search::SearchKeys;
