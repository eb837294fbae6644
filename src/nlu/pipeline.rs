//! Synchronous interpretation pipeline
//!
//! normalize -> extract -> classify -> resolve -> build, over one immutable
//! catalog. No I/O happens here; annotations, when available, are fetched by
//! the caller and passed in.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use super::annotator::Annotation;
use super::catalog::Catalog;
use super::entity::{Entity, EntityExtractor};
use super::intent::{IntentClassifier, IntentResult};
use super::normalizer::{NormalizedText, Normalizer};
use super::query::{Outcome, QueryBuilder};
use super::slots::{Route, SlotResolver, SlotSet};

/// Everything the pipeline derived from one utterance
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Interpretation {
    /// Normalized utterance the offsets refer to
    pub text: String,
    pub intent: IntentResult,
    pub entities: Vec<Entity>,
    pub slots: SlotSet,
    pub outcome: Outcome,
}

/// The composed NLU pipeline
#[derive(Debug, Clone)]
pub struct Pipeline {
    catalog: Arc<Catalog>,
    normalizer: Normalizer,
    extractor: EntityExtractor,
    classifier: IntentClassifier,
    resolver: SlotResolver,
    builder: QueryBuilder,
}

impl Pipeline {
    /// Builds every stage over a shared catalog
    ///
    /// Fails with [`crate::Error::InvalidCatalog`] when the tables do not pass
    /// [`Catalog::validate`].
    pub fn new(catalog: Arc<Catalog>) -> Result<Self> {
        catalog.validate()?;
        let normalizer = Normalizer::new(Arc::clone(&catalog))?;
        let extractor = EntityExtractor::new(Arc::clone(&catalog), normalizer.clone())?;
        let classifier = IntentClassifier::new(Arc::clone(&catalog));

        Ok(Self {
            catalog,
            normalizer,
            extractor,
            classifier,
            resolver: SlotResolver::new(),
            builder: QueryBuilder::new(),
        })
    }

    /// Pipeline over the built-in tables
    pub fn with_builtin_catalog() -> Result<Self> {
        Self::new(Arc::new(Catalog::builtin()))
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Whitespace-collapsed form the entity offsets refer to
    pub fn normalize(&self, text: &str) -> NormalizedText {
        self.normalizer.normalize(text)
    }

    /// Runs all stages
    pub fn interpret(&self, text: &str, annotations: Option<&[Annotation]>) -> Result<Interpretation> {
        let normalized = self.normalizer.normalize(text);
        let entities = self.extractor.extract(&normalized.original, annotations)?;
        let intent = self.classifier.classify(&normalized);
        let slots = self
            .resolver
            .resolve(intent.primary_intent, &entities, &normalized);
        let outcome = self.builder.build(intent.primary_intent, &slots);

        debug!(
            intent = %intent.primary_intent,
            entities = entities.len(),
            slots = slots.len(),
            "utterance interpreted"
        );

        Ok(Interpretation {
            text: normalized.original,
            intent,
            entities,
            slots,
            outcome,
        })
    }

    /// Entity extraction only
    pub fn extract_entities(&self, text: &str, annotations: Option<&[Annotation]>) -> Result<Vec<Entity>> {
        let normalized = self.normalizer.normalize(text);
        self.extractor.extract(&normalized.original, annotations)
    }

    /// Intent classification only
    pub fn classify(&self, text: &str) -> IntentResult {
        self.classifier.classify(&self.normalizer.normalize(text))
    }

    /// Source and destination, independent of the intent
    pub fn extract_route(&self, text: &str, annotations: Option<&[Annotation]>) -> Result<Route> {
        let normalized = self.normalizer.normalize(text);
        let entities = self.extractor.extract(&normalized.original, annotations)?;
        Ok(self.resolver.resolve_route(&entities, &normalized))
    }
}
