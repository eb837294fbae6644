//! Optional external named-entity annotator
//!
//! The annotator is a capability selected once at startup: either present,
//! backed by some [`Annotator`] implementation, or absent. The pipeline always
//! works without it.

use crate::config::AnnotatorConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Label attached to an annotated span
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AnnotationLabel {
    #[serde(alias = "location", alias = "LOCATION", alias = "GPE", alias = "LOC")]
    Location,
    #[serde(alias = "date", alias = "DATE")]
    Date,
    #[serde(alias = "organization", alias = "ORGANIZATION", alias = "ORG")]
    Organization,
    #[serde(alias = "money", alias = "MONEY")]
    Money,
    #[serde(alias = "person", alias = "PERSON", alias = "PER")]
    Person,
    /// Any label outside the set above (CARDINAL, TIME, NORP, ...); skipped
    #[serde(other)]
    Other,
}

/// A span of text with its label
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Annotation {
    /// Span text as it appears in the utterance
    pub text: String,
    /// Entity label
    pub label: AnnotationLabel,
}

impl Annotation {
    /// Creates a new annotation
    pub fn new(text: impl Into<String>, label: AnnotationLabel) -> Self {
        Self {
            text: text.into(),
            label,
        }
    }
}

/// External text annotation capability
#[async_trait]
pub trait Annotator: Send + Sync {
    /// Labels the entity spans found in `text`
    async fn annotate(&self, text: &str) -> Result<Vec<Annotation>>;

    /// Short name for logs and health output
    fn name(&self) -> &str;

    /// Checks whether the backing service answers
    async fn health_check(&self) -> Result<()>;
}

/// Whether an annotator is available for this process
#[derive(Clone, Default)]
pub enum AnnotatorCapability {
    /// Pattern-only extraction
    #[default]
    Absent,
    /// Annotations merged ahead of pattern results
    Present(Arc<dyn Annotator>),
}

impl fmt::Debug for AnnotatorCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnnotatorCapability::Absent => f.write_str("Absent"),
            AnnotatorCapability::Present(annotator) => {
                f.debug_tuple("Present").field(&annotator.name()).finish()
            }
        }
    }
}

impl AnnotatorCapability {
    /// Wraps an annotator
    pub fn present<A: Annotator + 'static>(annotator: A) -> Self {
        AnnotatorCapability::Present(Arc::new(annotator))
    }

    /// Checks if an annotator is configured
    pub fn is_present(&self) -> bool {
        matches!(self, AnnotatorCapability::Present(_))
    }

    /// Name of the configured annotator, if any
    pub fn name(&self) -> Option<&str> {
        match self {
            AnnotatorCapability::Absent => None,
            AnnotatorCapability::Present(annotator) => Some(annotator.name()),
        }
    }

    /// Picks the capability from configuration, probing the service once
    ///
    /// Never fails: a disabled, misconfigured or unreachable annotator yields
    /// [`AnnotatorCapability::Absent`].
    pub async fn from_config(config: &AnnotatorConfig) -> Self {
        if !config.enabled {
            debug!("annotator disabled by configuration");
            return AnnotatorCapability::Absent;
        }

        let annotator = match HttpAnnotator::from_config(config) {
            Ok(annotator) => annotator,
            Err(e) => {
                warn!("annotator client could not be built: {}", e);
                return AnnotatorCapability::Absent;
            }
        };

        match annotator.health_check().await {
            Ok(()) => {
                info!("annotator available at {}", config.url);
                AnnotatorCapability::present(annotator)
            }
            Err(e) => {
                info!("annotator unavailable, using pattern extraction only: {}", e);
                AnnotatorCapability::Absent
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct AnnotateRequest<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct AnnotateResponse {
    #[serde(default)]
    annotations: Vec<Annotation>,
}

/// Annotator backed by an HTTP service
///
/// `POST {url}/annotate` with `{"text": ...}` answers
/// `{"annotations": [{"text": ..., "label": ...}]}`.
#[derive(Debug, Clone)]
pub struct HttpAnnotator {
    client: Client,
    base_url: String,
    max_retries: u32,
    retry_delay: Duration,
}

impl HttpAnnotator {
    /// Creates a client with the configured timeout and retry policy
    pub fn from_config(config: &AnnotatorConfig) -> Result<Self> {
        if config.url.trim().is_empty() {
            return Err(Error::Config("annotator url is empty".to_string()));
        }

        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            max_retries: config.max_retries,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        })
    }

    async fn send_once(&self, text: &str) -> std::result::Result<Vec<Annotation>, Attempt> {
        let response = self
            .client
            .post(format!("{}/annotate", self.base_url))
            .json(&AnnotateRequest { text })
            .send()
            .await
            .map_err(|e| Attempt::Retry(e.to_string()))?;

        let status = response.status();
        if status.is_server_error() {
            return Err(Attempt::Retry(format!("annotator returned {}", status)));
        }
        if !status.is_success() {
            return Err(Attempt::GiveUp(format!("annotator returned {}", status)));
        }

        let body: AnnotateResponse = response
            .json()
            .await
            .map_err(|e| Attempt::GiveUp(format!("invalid annotator response: {}", e)))?;
        Ok(body.annotations)
    }
}

/// Outcome of a failed request attempt
enum Attempt {
    Retry(String),
    GiveUp(String),
}

#[async_trait]
impl Annotator for HttpAnnotator {
    async fn annotate(&self, text: &str) -> Result<Vec<Annotation>> {
        let mut attempt = 0;
        loop {
            match self.send_once(text).await {
                Ok(annotations) => {
                    debug!(count = annotations.len(), attempt, "annotations received");
                    return Ok(annotations);
                }
                Err(Attempt::Retry(reason)) if attempt < self.max_retries => {
                    attempt += 1;
                    debug!(attempt, "annotator request failed, retrying: {}", reason);
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(Attempt::Retry(reason)) | Err(Attempt::GiveUp(reason)) => {
                    return Err(Error::AnnotatorUnavailable(reason));
                }
            }
        }
    }

    fn name(&self) -> &str {
        "http"
    }

    async fn health_check(&self) -> Result<()> {
        let response = self
            .client
            .get(format!("{}/health", self.base_url))
            .send()
            .await
            .map_err(|e| Error::AnnotatorUnavailable(e.to_string()))?;

        match response.status() {
            StatusCode::OK => Ok(()),
            status => Err(Error::AnnotatorUnavailable(format!(
                "health check returned {}",
                status
            ))),
        }
    }
}
