//! Category calculators and their registry.

use async_trait::async_trait;
use insights_core::Result;
use insights_manager::{PrefetchRequest, SharedDataContext};
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::result::CategoryResult;

/// Computes the metrics of one insight category from shared data.
///
/// Calculators never fetch on their own: they declare what they need with
/// [`requirements`](Self::requirements) and read it from the context. A
/// calculator whose inputs are missing should still return a result, with
/// the affected metrics explaining the gap in their `detail`.
#[async_trait]
pub trait CategoryCalculator: Send + Sync + Debug {
    /// Identifier of the category (e.g. `volatility`).
    fn category_id(&self) -> &str;

    /// Data this category reads.
    fn requirements(&self) -> PrefetchRequest;

    /// Compute the category from `context`.
    ///
    /// With `force_refresh` the calculator must bypass any cache of its own.
    async fn compute(
        &self,
        context: &SharedDataContext,
        force_refresh: bool,
    ) -> Result<CategoryResult>;
}

/// Registered calculators, keyed by category id.
///
/// Built once at startup and handed to the pipeline.
#[derive(Default)]
pub struct CategoryRegistry {
    calculators: BTreeMap<String, Arc<dyn CategoryCalculator>>,
}

impl std::fmt::Debug for CategoryRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CategoryRegistry")
            .field("categories", &self.ids())
            .finish()
    }
}

impl CategoryRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a calculator, replacing any earlier one with the same id.
    ///
    /// Returns the replaced calculator.
    pub fn register(
        &mut self,
        calculator: Arc<dyn CategoryCalculator>,
    ) -> Option<Arc<dyn CategoryCalculator>> {
        let id = calculator.category_id().trim().to_lowercase();
        debug!(category = %id, "Registering category calculator");
        let replaced = self.calculators.insert(id.clone(), calculator);
        if replaced.is_some() {
            warn!(category = %id, "Replacing previously registered calculator");
        }
        replaced
    }

    /// Builder form of [`register`](Self::register).
    #[must_use]
    pub fn with(mut self, calculator: Arc<dyn CategoryCalculator>) -> Self {
        self.register(calculator);
        self
    }

    /// Calculator for `category_id`.
    #[must_use]
    pub fn get(&self, category_id: &str) -> Option<Arc<dyn CategoryCalculator>> {
        self.calculators
            .get(&category_id.trim().to_lowercase())
            .cloned()
    }

    /// Registered category ids, sorted.
    #[must_use]
    pub fn ids(&self) -> Vec<&str> {
        self.calculators.keys().map(String::as_str).collect()
    }

    /// Number of registered categories.
    #[must_use]
    pub fn len(&self) -> usize {
        self.calculators.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.calculators.is_empty()
    }
}
