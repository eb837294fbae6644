//! Request boundary around the pipeline
//!
//! Validates the inbound text, asks the annotator (when present) under a time
//! budget, and falls back to pattern-only extraction when it cannot answer.

use crate::config::{AnnotatorConfig, NluConfig};
use crate::error::{Error, Result};
use crate::nlu::{
    Annotation, AnnotatorCapability, Entity, IntentResult, Interpretation, Pipeline, Route,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Shared, cloneable NLU service
#[derive(Debug, Clone)]
pub struct NluService {
    pipeline: Arc<Pipeline>,
    annotator: AnnotatorCapability,
    annotator_budget: Duration,
}

impl NluService {
    pub fn new(pipeline: Pipeline, annotator: AnnotatorCapability) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            annotator,
            annotator_budget: AnnotatorConfig::default().call_budget(),
        }
    }

    /// Pattern-only service over the built-in catalog
    pub fn builtin() -> Result<Self> {
        Ok(Self::new(
            Pipeline::with_builtin_catalog()?,
            AnnotatorCapability::Absent,
        ))
    }

    /// Loads the catalog and selects the annotator capability
    pub async fn from_config(config: &NluConfig) -> Result<Self> {
        let catalog = Arc::new(config.load_catalog()?);
        let pipeline = Pipeline::new(catalog)?;
        let annotator = AnnotatorCapability::from_config(&config.annotator).await;

        Ok(Self::new(pipeline, annotator).with_annotator_budget(config.annotator.call_budget()))
    }

    /// Sets how long to wait for the annotator before falling back
    pub fn with_annotator_budget(mut self, budget: Duration) -> Self {
        self.annotator_budget = budget;
        self
    }

    pub fn annotator(&self) -> &AnnotatorCapability {
        &self.annotator
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Full pipeline: intent, entities, slots and outcome
    pub async fn process(&self, text: Option<&str>) -> Result<Interpretation> {
        let text = validate_text(text)?;
        let annotations = self.annotations(text).await;
        self.pipeline.interpret(text, annotations.as_deref())
    }

    /// Entity extraction only
    pub async fn entities(&self, text: Option<&str>) -> Result<Vec<Entity>> {
        let text = validate_text(text)?;
        let annotations = self.annotations(text).await;
        self.pipeline.extract_entities(text, annotations.as_deref())
    }

    /// Intent classification only; never consults the annotator
    pub fn intent(&self, text: Option<&str>) -> Result<IntentResult> {
        let text = validate_text(text)?;
        Ok(self.pipeline.classify(text))
    }

    /// Source and destination only
    pub async fn route(&self, text: Option<&str>) -> Result<Route> {
        let text = validate_text(text)?;
        let annotations = self.annotations(text).await;
        self.pipeline.extract_route(text, annotations.as_deref())
    }

    /// Annotations for `text`, or `None` when the annotator is absent or failing
    async fn annotations(&self, text: &str) -> Option<Vec<Annotation>> {
        let AnnotatorCapability::Present(annotator) = &self.annotator else {
            return None;
        };

        let normalized = self.pipeline.normalize(text);
        let call = annotator.annotate(&normalized.original);

        let failure = match tokio::time::timeout(self.annotator_budget, call).await {
            Ok(Ok(annotations)) => {
                debug!(count = annotations.len(), "annotator answered");
                return Some(annotations);
            }
            Ok(Err(e)) => e,
            Err(_) => Error::AnnotatorUnavailable(format!(
                "no answer within {} ms",
                self.annotator_budget.as_millis()
            )),
        };

        if failure.is_recoverable() {
            info!("falling back to pattern extraction: {}", failure);
        } else {
            warn!("annotator fault, falling back to pattern extraction: {}", failure);
        }
        None
    }
}

/// Rejects missing or blank text before it reaches the pipeline
fn validate_text(text: Option<&str>) -> Result<&str> {
    match text {
        None => Err(Error::MalformedRequest("missing 'text' field".to_string())),
        Some(t) if t.trim().is_empty() => {
            Err(Error::MalformedRequest("'text' is empty".to_string()))
        }
        Some(t) => Ok(t),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nlu::{AnnotationLabel, Annotator, EntitySource, EntityValue, IntentKind};
    use async_trait::async_trait;

    struct FixedAnnotator(Vec<Annotation>);

    #[async_trait]
    impl Annotator for FixedAnnotator {
        async fn annotate(&self, _text: &str) -> Result<Vec<Annotation>> {
            Ok(self.0.clone())
        }

        fn name(&self) -> &str {
            "fixed"
        }

        async fn health_check(&self) -> Result<()> {
            Ok(())
        }
    }

    struct FailingAnnotator;

    #[async_trait]
    impl Annotator for FailingAnnotator {
        async fn annotate(&self, _text: &str) -> Result<Vec<Annotation>> {
            Err(Error::AnnotatorUnavailable("model not loaded".to_string()))
        }

        fn name(&self) -> &str {
            "failing"
        }

        async fn health_check(&self) -> Result<()> {
            Err(Error::AnnotatorUnavailable("model not loaded".to_string()))
        }
    }

    struct BrokenAnnotator;

    #[async_trait]
    impl Annotator for BrokenAnnotator {
        async fn annotate(&self, _text: &str) -> Result<Vec<Annotation>> {
            Err(Error::Extraction("span offsets out of range".to_string()))
        }

        fn name(&self) -> &str {
            "broken"
        }

        async fn health_check(&self) -> Result<()> {
            Ok(())
        }
    }

    struct SlowAnnotator;

    #[async_trait]
    impl Annotator for SlowAnnotator {
        async fn annotate(&self, _text: &str) -> Result<Vec<Annotation>> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Vec::new())
        }

        fn name(&self) -> &str {
            "slow"
        }

        async fn health_check(&self) -> Result<()> {
            Ok(())
        }
    }

    fn service_with<A: Annotator + 'static>(annotator: A) -> NluService {
        NluService::new(
            Pipeline::with_builtin_catalog().unwrap(),
            AnnotatorCapability::present(annotator),
        )
    }

    #[tokio::test]
    async fn test_missing_and_blank_text_rejected() {
        let service = NluService::builtin().unwrap();
        assert!(matches!(
            service.process(None).await,
            Err(Error::MalformedRequest(_))
        ));
        assert!(matches!(
            service.entities(Some("   ")).await,
            Err(Error::MalformedRequest(_))
        ));
        assert!(service.intent(Some("\t\n")).unwrap_err().is_client_error());
    }

    #[tokio::test]
    async fn test_annotations_are_used_when_present() {
        let service = service_with(FixedAnnotator(vec![Annotation::new(
            "Chennai",
            AnnotationLabel::Location,
        )]));
        let entities = service
            .entities(Some("flights from Chennai"))
            .await
            .unwrap();
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].source, EntitySource::Annotator);
        assert_eq!(entities[0].value, EntityValue::Place("Chennai".into()));
    }

    #[tokio::test]
    async fn test_failing_annotator_falls_back() {
        let with_failure = service_with(FailingAnnotator)
            .process(Some("Show flights from DEL to BOM"))
            .await
            .unwrap();
        let pattern_only = NluService::builtin()
            .unwrap()
            .process(Some("Show flights from DEL to BOM"))
            .await
            .unwrap();
        assert_eq!(with_failure, pattern_only);
    }

    #[tokio::test]
    async fn test_annotator_fault_still_falls_back() {
        let result = service_with(BrokenAnnotator)
            .entities(Some("Show flights from DEL to BOM"))
            .await
            .unwrap();
        assert_eq!(result.len(), 2);
        assert!(result.iter().all(|e| e.source == EntitySource::Pattern));
    }

    #[tokio::test]
    async fn test_slow_annotator_times_out() {
        let service = service_with(SlowAnnotator).with_annotator_budget(Duration::from_millis(20));
        let result = service
            .process(Some("Check booking status for PNR ABC1234"))
            .await
            .unwrap();
        assert_eq!(result.intent.primary_intent, IntentKind::BookingStatus);
    }

    #[tokio::test]
    async fn test_route_endpoint_logic() {
        let route = NluService::builtin()
            .unwrap()
            .route(Some("from Calcutta to Pune"))
            .await
            .unwrap();
        assert_eq!(route.source, Some(EntityValue::Place("Kolkata".into())));
        assert_eq!(route.destination, Some(EntityValue::Place("Pune".into())));
    }
}
