//! Natural language understanding for airline reservation queries
//!
//! This module turns one utterance into an intent, typed entities, resolved
//! slots and a parameter-bound query descriptor.

pub mod annotator;
pub mod catalog;
pub mod entity;
pub mod intent;
pub mod normalizer;
pub mod pipeline;
pub mod query;
pub mod slots;

pub use annotator::{Annotation, AnnotationLabel, Annotator, AnnotatorCapability, HttpAnnotator};
pub use catalog::{Catalog, IntentDefinition, PlaceDefinition};
pub use entity::{
    Currency, Entity, EntityExtractor, EntityKind, EntitySource, EntityValue, IdentifierKind,
    MoneyAmount, TravelClass,
};
pub use intent::{IntentClassifier, IntentKind, IntentResult, RankedIntent};
pub use normalizer::{NormalizedText, Normalizer};
pub use pipeline::{Interpretation, Pipeline};
pub use query::{
    ActionKind, ActionRequest, Direction, Field, InsufficientSlots, Operator, OrderBy, Outcome,
    Predicate, QueryBuilder, QueryDescriptor, Target,
};
pub use slots::{Route, SlotName, SlotResolver, SlotSet};
