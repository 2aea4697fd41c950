//! Processing strategies for the collage backend.
//!
//! This crate provides the [`ProcessingStrategy`] trait, the
//! [`StrategyRegistry`] that maps request strategy names to implementations,
//! and the collaborator services strategies depend on.
//!
//! # Strategies
//!
//! - `fast` - Thumbnail every asset and lay them out on a grid
//! - `thorough` - Analyze assets first, keep confident ones, resample with Lanczos
//!
//! # Usage
//!
//! ```rust,no_run
//! use collage_jobs::{register_builtin_strategies, Collaborators, StrategyRegistry};
//!
//! let registry = StrategyRegistry::new(Collaborators::local("./assets", "./composites"));
//! register_builtin_strategies(&registry, 0.5);
//! assert!(registry.resolve("fast").is_ok());
//! ```

mod collaborators;
mod composite;
mod error;
mod fast;
mod payload;
mod registry;
mod strategy;
mod thorough;

pub use async_trait::async_trait;
pub use collaborators::{
    AnalysisReport, Collaborators, ImageAnalyzer, InMemoryProgressTracker, LocalStorage,
    ProgressSnapshot, ProgressTracker, RecognitionService, StorageService, StoredObject,
};
pub use error::{non_fatal, CollaboratorError, RegistryError, StrategyError};
pub use fast::FastStrategy;
pub use payload::{CompositePayload, OutputVariant, MAX_ASSETS, MAX_TILE_SIZE, MIN_TILE_SIZE};
pub use registry::{StrategyFactory, StrategyRegistry};
pub use strategy::{report_progress, ProcessingStrategy, StrategyInput};
pub use thorough::ThoroughStrategy;

use std::sync::Arc;

/// Register the built-in strategies with the registry.
///
/// `min_confidence` is the recognition threshold the thorough strategy keeps
/// assets at or above.
pub fn register_builtin_strategies(registry: &StrategyRegistry, min_confidence: f32) {
    registry.register(strategy_names::FAST, |collaborators| {
        Arc::new(FastStrategy::new(collaborators))
    });
    registry.register(strategy_names::THOROUGH, move |collaborators| {
        Arc::new(ThoroughStrategy::new(collaborators, min_confidence))
    });
}

/// Strategy name constants for type-safe strategy references.
pub mod strategy_names {
    pub const FAST: &str = "fast";
    pub const THOROUGH: &str = "thorough";
}
