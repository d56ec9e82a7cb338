//! Topic list engine for a community dictionary.
//!
//! Produces the left-hand navigation frame: virtual lists (`today`,
//! `agenda`, `debe`, `on-this-day`, ...) and database-backed categories,
//! personalized per viewer, cached per slug with day-boundary-aware TTLs,
//! and paginated into a serialization-ready [`application::LeftFrame`].
//!
//! Hosts construct an [`application::Engine`] from an
//! [`config::EngineConfig`], a [`infra::Clock`], a
//! [`application::ReadStore`] adapter and a [`cache::TopicListCache`]
//! backend, then call [`application::Engine::build_left_frame`] per
//! request.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
pub mod presentation;

pub use application::{Engine, FrameRequest, LeftFrame};
pub use config::EngineConfig;
pub use domain::error::EngineError;
pub use domain::rows::Row;
pub use domain::viewer::Viewer;
