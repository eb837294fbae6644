//! Entity extraction and recognition
//!
//! Two sources are composed: fixed pattern rules, always available, and an
//! optional list of annotations from an external recognizer. Annotator results
//! come first and own their spans: a pattern result is dropped when it
//! overlaps an annotated entity of the same kind, or when an entity with the
//! same kind and normalized value is already present.

use crate::error::{Error, Result};
use chrono::NaiveDate;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use super::annotator::{Annotation, AnnotationLabel};
use super::catalog::Catalog;
use super::normalizer::Normalizer;

/// What sort of identifier an entity carries
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierKind {
    /// 7-character booking reference (PNR)
    BookingReference,
    /// 12-digit national identity number (Aadhaar)
    NationalId,
}

/// Entity type classification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// City, airport code or other place
    Location,
    /// Calendar date or date expression
    Date,
    /// Booking reference or national id
    Identifier(IdentifierKind),
    /// Currency amount
    Money,
    /// Cabin class
    TravelClass,
    /// Airline from the catalog
    AirlineName,
    /// Other organization named by the annotator
    Organization,
    /// Person named by the annotator
    Person,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Location => f.write_str("location"),
            EntityKind::Date => f.write_str("date"),
            EntityKind::Identifier(IdentifierKind::BookingReference) => {
                f.write_str("booking_reference")
            }
            EntityKind::Identifier(IdentifierKind::NationalId) => f.write_str("national_id"),
            EntityKind::Money => f.write_str("money"),
            EntityKind::TravelClass => f.write_str("travel_class"),
            EntityKind::AirlineName => f.write_str("airline"),
            EntityKind::Organization => f.write_str("organization"),
            EntityKind::Person => f.write_str("person"),
        }
    }
}

/// Where an entity came from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EntitySource {
    /// Fixed-format pattern rule
    Pattern,
    /// City synonym table
    Synonym,
    /// External annotator
    Annotator,
}

/// Cabin class
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TravelClass {
    Economy,
    Business,
    Premium,
}

impl TravelClass {
    /// All classes, in detection priority order
    pub const ALL: [TravelClass; 3] = [
        TravelClass::Economy,
        TravelClass::Business,
        TravelClass::Premium,
    ];

    /// Lower-case keyword that selects this class
    pub fn keyword(&self) -> &'static str {
        match self {
            TravelClass::Economy => "economy",
            TravelClass::Business => "business",
            TravelClass::Premium => "premium",
        }
    }
}

impl fmt::Display for TravelClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TravelClass::Economy => f.write_str("Economy"),
            TravelClass::Business => f.write_str("Business"),
            TravelClass::Premium => f.write_str("Premium"),
        }
    }
}

/// Currency recognized from its symbol
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Inr,
    Usd,
}

impl Currency {
    fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "₹" => Some(Currency::Inr),
            "$" => Some(Currency::Usd),
            _ => None,
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Currency::Inr => f.write_str("INR"),
            Currency::Usd => f.write_str("USD"),
        }
    }
}

/// An amount in the currency's minor unit (paise, cents)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MoneyAmount {
    pub currency: Currency,
    pub minor_units: i64,
}

impl fmt::Display for MoneyAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}.{:02}",
            self.currency,
            self.minor_units / 100,
            self.minor_units % 100
        )
    }
}

/// Typed, normalized entity value
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum EntityValue {
    /// Upper-case 3-letter airport code
    Code(String),
    /// Canonical city name
    Place(String),
    /// Calendar date
    Date(NaiveDate),
    /// Currency amount
    Money(MoneyAmount),
    /// Upper-case booking reference
    Reference(String),
    /// Digits-only national id
    NationalId(String),
    /// Cabin class
    Class(TravelClass),
    /// Catalog airline name
    Airline(String),
    /// Trimmed free text the recognizer could not type further
    Text(String),
}

impl fmt::Display for EntityValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityValue::Code(s)
            | EntityValue::Place(s)
            | EntityValue::Reference(s)
            | EntityValue::NationalId(s)
            | EntityValue::Airline(s)
            | EntityValue::Text(s) => f.write_str(s),
            EntityValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            EntityValue::Money(m) => write!(f, "{}", m),
            EntityValue::Class(c) => write!(f, "{}", c),
        }
    }
}

/// Represents an extracted entity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Entity {
    /// Entity type
    pub kind: EntityKind,
    /// Text as it appears in the utterance
    pub raw_text: String,
    /// Value derived from `raw_text`
    #[serde(rename = "normalized_value")]
    pub value: EntityValue,
    /// Start position in the normalized utterance
    pub start: usize,
    /// End position in the normalized utterance
    pub end: usize,
    /// Which recognizer produced it
    pub source: EntitySource,
}

impl Entity {
    fn spanning(
        kind: EntityKind,
        value: EntityValue,
        text: &str,
        (start, end): (usize, usize),
        source: EntitySource,
    ) -> Self {
        Self {
            kind,
            raw_text: text[start..end].to_string(),
            value,
            start,
            end,
            source,
        }
    }

    /// Checks if this is a location entity
    pub fn is_location(&self) -> bool {
        self.kind == EntityKind::Location
    }

    /// Whether the two byte spans share at least one byte
    pub fn overlaps(&self, other: &Entity) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Compiled fixed-format recognizers
#[derive(Debug, Clone)]
struct PatternSet {
    national_id: Regex,
    iso_date: Regex,
    dmy_date: Regex,
    money: Regex,
    booking_reference: Regex,
    airport_code: Regex,
}

impl PatternSet {
    fn new() -> Result<Self> {
        Ok(Self {
            national_id: Regex::new(r"\b(?:\d{4}[ ./-]?\d{4}[ ./-]?\d{4}|\d{12,})\b")?,
            iso_date: Regex::new(r"\b(\d{4})-(\d{2})-(\d{2})\b")?,
            dmy_date: Regex::new(r"\b(\d{1,2})[/-](\d{1,2})[/-](\d{4})\b")?,
            money: Regex::new(r"([₹$])\s?(\d{1,3}(?:,\d{3})+|\d+)(?:\.(\d{2}))?")?,
            booking_reference: Regex::new(r"\b[A-Za-z0-9]{7}\b")?,
            airport_code: Regex::new(r"\b[A-Z]{3}\b")?,
        })
    }
}

/// Spans already taken by a higher-priority pattern
#[derive(Debug, Default)]
struct Claims(Vec<(usize, usize)>);

impl Claims {
    /// Takes the span unless it overlaps one already taken
    fn claim(&mut self, start: usize, end: usize) -> bool {
        if self.0.iter().any(|&(s, e)| start < e && s < end) {
            return false;
        }
        self.0.push((start, end));
        true
    }
}

/// Pattern and annotation based entity extractor
#[derive(Debug, Clone)]
pub struct EntityExtractor {
    catalog: Arc<Catalog>,
    normalizer: Normalizer,
    patterns: PatternSet,
}

impl EntityExtractor {
    /// Compiles the pattern rules
    pub fn new(catalog: Arc<Catalog>, normalizer: Normalizer) -> Result<Self> {
        Ok(Self {
            catalog,
            normalizer,
            patterns: PatternSet::new()?,
        })
    }

    /// Extracts every entity from `text`, merging optional annotations
    ///
    /// The result is ordered by position in `text`.
    pub fn extract(&self, text: &str, annotations: Option<&[Annotation]>) -> Result<Vec<Entity>> {
        let mut merged: Vec<Entity> = Vec::new();

        if let Some(annotations) = annotations {
            for entity in self.annotated_entities(text, annotations) {
                push_unique(&mut merged, entity);
            }
        }
        let annotated = merged.len();

        for entity in self.extract_patterns(text)? {
            if merged[..annotated]
                .iter()
                .any(|e| e.kind == entity.kind && e.overlaps(&entity))
            {
                debug!(span = %entity.raw_text, "pattern match inside an annotated span, dropped");
                continue;
            }
            push_unique(&mut merged, entity);
        }

        merged.sort_by_key(|e| e.start);

        debug!(count = merged.len(), "entities extracted");
        Ok(merged)
    }

    /// Pattern rules only, in priority order for overlapping spans
    fn extract_patterns(&self, text: &str) -> Result<Vec<Entity>> {
        let mut claims = Claims::default();
        let mut entities = Vec::new();

        for m in self.patterns.national_id.find_iter(text) {
            if !claims.claim(m.start(), m.end()) {
                continue;
            }
            let digits: String = m.as_str().chars().filter(char::is_ascii_digit).take(12).collect();
            entities.push(Entity::spanning(
                EntityKind::Identifier(IdentifierKind::NationalId),
                EntityValue::NationalId(digits),
                text,
                (m.start(), m.end()),
                EntitySource::Pattern,
            ));
        }

        self.extract_dates(text, &mut claims, &mut entities)?;
        self.extract_money(text, &mut claims, &mut entities)?;

        for m in self.patterns.booking_reference.find_iter(text) {
            let candidate = m.as_str();
            if !looks_like_reference(candidate) || !claims.claim(m.start(), m.end()) {
                continue;
            }
            entities.push(Entity::spanning(
                EntityKind::Identifier(IdentifierKind::BookingReference),
                EntityValue::Reference(candidate.to_ascii_uppercase()),
                text,
                (m.start(), m.end()),
                EntitySource::Pattern,
            ));
        }

        for m in self.patterns.airport_code.find_iter(text) {
            if self.catalog.is_reserved_code(m.as_str()) || !claims.claim(m.start(), m.end()) {
                continue;
            }
            entities.push(Entity::spanning(
                EntityKind::Location,
                EntityValue::Code(m.as_str().to_string()),
                text,
                (m.start(), m.end()),
                EntitySource::Pattern,
            ));
        }

        for mention in self.normalizer.place_mentions(text) {
            if !claims.claim(mention.start, mention.end) {
                continue;
            }
            entities.push(Entity::spanning(
                EntityKind::Location,
                EntityValue::Place(mention.canonical),
                text,
                (mention.start, mention.end),
                EntitySource::Synonym,
            ));
        }

        let folded = text.to_ascii_lowercase();

        if let Some((class, start)) = TravelClass::ALL
            .iter()
            .find_map(|class| folded.find(class.keyword()).map(|pos| (*class, pos)))
        {
            entities.push(Entity::spanning(
                EntityKind::TravelClass,
                EntityValue::Class(class),
                text,
                (start, start + class.keyword().len()),
                EntitySource::Pattern,
            ));
        }

        if let Some((airline, start)) = self.catalog.airlines.iter().find_map(|airline| {
            folded
                .find(&airline.to_ascii_lowercase())
                .map(|pos| (airline, pos))
        }) {
            entities.push(Entity::spanning(
                EntityKind::AirlineName,
                EntityValue::Airline(airline.clone()),
                text,
                (start, start + airline.len()),
                EntitySource::Pattern,
            ));
        }

        Ok(entities)
    }

    fn extract_dates(
        &self,
        text: &str,
        claims: &mut Claims,
        entities: &mut Vec<Entity>,
    ) -> Result<()> {
        for caps in self.patterns.iso_date.captures_iter(text) {
            let (start, end) = whole_span(&caps)?;
            let date = NaiveDate::from_ymd_opt(
                number(&caps, 1)?,
                number(&caps, 2)?,
                number(&caps, 3)?,
            );
            push_date(text, date, (start, end), claims, entities);
        }

        for caps in self.patterns.dmy_date.captures_iter(text) {
            let (start, end) = whole_span(&caps)?;
            let date = NaiveDate::from_ymd_opt(
                number(&caps, 3)?,
                number(&caps, 2)?,
                number(&caps, 1)?,
            );
            push_date(text, date, (start, end), claims, entities);
        }

        Ok(())
    }

    fn extract_money(
        &self,
        text: &str,
        claims: &mut Claims,
        entities: &mut Vec<Entity>,
    ) -> Result<()> {
        for caps in self.patterns.money.captures_iter(text) {
            let (start, end) = whole_span(&caps)?;
            let Some(amount) = money_from_captures(&caps)? else {
                debug!(raw = &text[start..end], "money amount out of range");
                continue;
            };
            if !claims.claim(start, end) {
                continue;
            }
            entities.push(Entity::spanning(
                EntityKind::Money,
                EntityValue::Money(amount),
                text,
                (start, end),
                EntitySource::Pattern,
            ));
        }
        Ok(())
    }

    /// Converts annotations to entities, locating each span in `text`
    fn annotated_entities(&self, text: &str, annotations: &[Annotation]) -> Vec<Entity> {
        let mut taken: Vec<(usize, usize)> = Vec::new();
        let mut entities = Vec::new();

        for annotation in annotations {
            let needle = annotation.text.trim();
            if needle.is_empty() {
                continue;
            }
            let Some(span) = locate(text, needle, &taken) else {
                debug!(span = needle, "annotation not found in text, dropped");
                continue;
            };
            let raw = &text[span.0..span.1];
            let (kind, value) = match annotation.label {
                AnnotationLabel::Location => {
                    (EntityKind::Location, self.normalizer.normalize_location(raw))
                }
                AnnotationLabel::Date => (
                    EntityKind::Date,
                    parse_date(raw)
                        .map(EntityValue::Date)
                        .unwrap_or_else(|| EntityValue::Text(raw.to_lowercase())),
                ),
                AnnotationLabel::Money => (
                    EntityKind::Money,
                    self.parse_money(raw)
                        .map(EntityValue::Money)
                        .unwrap_or_else(|| EntityValue::Text(raw.to_string())),
                ),
                AnnotationLabel::Organization => match self.catalog_airline(raw) {
                    Some(airline) => (EntityKind::AirlineName, EntityValue::Airline(airline)),
                    None => (EntityKind::Organization, EntityValue::Text(raw.to_string())),
                },
                AnnotationLabel::Person => (EntityKind::Person, EntityValue::Text(raw.to_string())),
                AnnotationLabel::Other => {
                    debug!(span = needle, "annotation label not used, dropped");
                    continue;
                }
            };
            taken.push(span);

            entities.push(Entity::spanning(
                kind,
                value,
                text,
                span,
                EntitySource::Annotator,
            ));
        }

        entities
    }

    fn parse_money(&self, raw: &str) -> Option<MoneyAmount> {
        let caps = self.patterns.money.captures(raw)?;
        money_from_captures(&caps).ok().flatten()
    }

    fn catalog_airline(&self, raw: &str) -> Option<String> {
        let folded = raw.to_lowercase();
        self.catalog
            .airlines
            .iter()
            .find(|a| a.to_lowercase() == folded)
            .cloned()
    }
}

/// Parses `YYYY-MM-DD`, `D/M/YYYY` or `D-M-YYYY`
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%d/%m/%Y"))
        .or_else(|_| NaiveDate::parse_from_str(raw, "%d-%m-%Y"))
        .ok()
}

/// Letters mixed with digits, or seven capitals as typed ("ABCDEFG")
fn looks_like_reference(candidate: &str) -> bool {
    let has_letter = candidate.chars().any(|c| c.is_ascii_alphabetic());
    let has_digit = candidate.chars().any(|c| c.is_ascii_digit());
    (has_letter && has_digit) || candidate.chars().all(|c| c.is_ascii_uppercase())
}

fn push_unique(entities: &mut Vec<Entity>, entity: Entity) {
    let duplicate = entities
        .iter()
        .any(|e| e.kind == entity.kind && e.value == entity.value);
    if !duplicate {
        entities.push(entity);
    }
}

fn push_date(
    text: &str,
    date: Option<NaiveDate>,
    (start, end): (usize, usize),
    claims: &mut Claims,
    entities: &mut Vec<Entity>,
) {
    let Some(date) = date else {
        debug!(raw = &text[start..end], "not a calendar date");
        return;
    };
    if claims.claim(start, end) {
        entities.push(Entity::spanning(
            EntityKind::Date,
            EntityValue::Date(date),
            text,
            (start, end),
            EntitySource::Pattern,
        ));
    }
}

/// First occurrence of `needle` not overlapping a taken span, exact case first
fn locate(text: &str, needle: &str, taken: &[(usize, usize)]) -> Option<(usize, usize)> {
    let free = |&(start, end): &(usize, usize)| !taken.iter().any(|&(s, e)| start < e && s < end);

    text.match_indices(needle)
        .map(|(pos, m)| (pos, pos + m.len()))
        .find(free)
        .or_else(|| {
            // ASCII folding keeps byte offsets aligned with `text`
            let folded_text = text.to_ascii_lowercase();
            let folded_needle = needle.to_ascii_lowercase();
            folded_text
                .match_indices(&folded_needle)
                .map(|(pos, m)| (pos, pos + m.len()))
                .find(free)
        })
}

fn whole_span(caps: &Captures<'_>) -> Result<(usize, usize)> {
    caps.get(0)
        .map(|m| (m.start(), m.end()))
        .ok_or_else(|| Error::Extraction("pattern matched without a span".to_string()))
}

fn group<'t>(caps: &Captures<'t>, index: usize) -> Result<&'t str> {
    caps.get(index)
        .map(|m| m.as_str())
        .ok_or_else(|| Error::Extraction(format!("capture group {} missing", index)))
}

fn number<T: std::str::FromStr>(caps: &Captures<'_>, index: usize) -> Result<T> {
    let digits = group(caps, index)?;
    digits
        .parse::<T>()
        .map_err(|_| Error::Extraction(format!("capture group {} is not numeric: {}", index, digits)))
}

/// `Ok(None)` when the amount does not fit; `Err` only for a broken pattern
fn money_from_captures(caps: &Captures<'_>) -> Result<Option<MoneyAmount>> {
    let Some(currency) = Currency::from_symbol(group(caps, 1)?) else {
        return Err(Error::Extraction("unknown currency symbol".to_string()));
    };
    let whole: String = group(caps, 2)?.chars().filter(|c| *c != ',').collect();
    let Ok(whole) = whole.parse::<i64>() else {
        return Ok(None);
    };
    let fraction = match caps.get(3) {
        Some(m) => m
            .as_str()
            .parse::<i64>()
            .map_err(|_| Error::Extraction("fraction is not numeric".to_string()))?,
        None => 0,
    };
    Ok(whole
        .checked_mul(100)
        .and_then(|v| v.checked_add(fraction))
        .map(|minor_units| MoneyAmount {
            currency,
            minor_units,
        }))
}
