//! Text canonicalization and city synonym resolution

use crate::error::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::catalog::Catalog;
use super::entity::EntityValue;

/// An utterance with whitespace collapsed, in original and folded casing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NormalizedText {
    /// Trimmed text, single spaces, original casing
    pub original: String,
    /// `original` lower-cased, used for keyword comparison
    pub folded: String,
}

impl NormalizedText {
    /// Alphanumeric words of the folded text
    pub fn words(&self) -> impl Iterator<Item = &str> {
        self.folded
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
    }

    /// Whether `word` appears as a whole word
    pub fn has_word(&self, word: &str) -> bool {
        self.words().any(|w| w == word)
    }

    /// Checks if nothing is left after trimming
    pub fn is_empty(&self) -> bool {
        self.original.is_empty()
    }
}

/// A synonym-table hit in the text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceMention {
    /// Byte offset of the first character
    pub start: usize,
    /// Byte offset one past the last character
    pub end: usize,
    /// Matched text as written
    pub raw: String,
    /// Canonical city name
    pub canonical: String,
}

/// Pure, deterministic text normalizer
#[derive(Debug, Clone)]
pub struct Normalizer {
    catalog: Arc<Catalog>,
    /// One word-bounded, case-insensitive pattern per catalog place, in table order
    place_patterns: Vec<(Regex, usize)>,
}

impl Normalizer {
    /// Compiles the synonym patterns for a catalog
    pub fn new(catalog: Arc<Catalog>) -> Result<Self> {
        let mut place_patterns = Vec::with_capacity(catalog.places.len());

        for (index, place) in catalog.places.iter().enumerate() {
            if place.synonyms.is_empty() {
                continue;
            }
            let mut synonyms: Vec<&str> = place.synonyms.iter().map(String::as_str).collect();
            // Longest first so "new delhi" is preferred over "delhi"
            synonyms.sort_by(|a, b| b.len().cmp(&a.len()));
            let alternation = synonyms
                .iter()
                .map(|s| regex::escape(s))
                .collect::<Vec<_>>()
                .join("|");
            let pattern = Regex::new(&format!(r"(?i)\b(?:{})\b", alternation))?;
            place_patterns.push((pattern, index));
        }

        Ok(Self {
            catalog,
            place_patterns,
        })
    }

    /// Collapses whitespace and produces the folded form
    pub fn normalize(&self, text: &str) -> NormalizedText {
        let original = text.split_whitespace().collect::<Vec<_>>().join(" ");
        let folded = original.to_lowercase();
        NormalizedText { original, folded }
    }

    /// Resolves a single token or phrase to its canonical city
    pub fn canonical_place(&self, token: &str) -> Option<&str> {
        let needle = token.trim().to_lowercase();
        self.catalog
            .places
            .iter()
            .find(|place| place.synonyms.iter().any(|s| *s == needle))
            .map(|place| place.canonical.as_str())
    }

    /// Normalized value for a location span
    ///
    /// Upper-case 3-letter codes stay codes; synonyms become their canonical
    /// city; anything else is title-cased.
    pub fn normalize_location(&self, raw: &str) -> EntityValue {
        let trimmed = raw.trim();
        if is_airport_code(trimmed) {
            return EntityValue::Code(trimmed.to_string());
        }
        match self.canonical_place(trimmed) {
            Some(canonical) => EntityValue::Place(canonical.to_string()),
            None => EntityValue::Place(title_case(trimmed)),
        }
    }

    /// Every synonym mention, in utterance order
    ///
    /// When two synonyms overlap, the one from the earlier table entry wins.
    pub fn place_mentions(&self, text: &str) -> Vec<PlaceMention> {
        let mut mentions: Vec<PlaceMention> = Vec::new();

        for (pattern, index) in &self.place_patterns {
            let canonical = &self.catalog.places[*index].canonical;
            for m in pattern.find_iter(text) {
                let overlaps = mentions
                    .iter()
                    .any(|existing| m.start() < existing.end && existing.start < m.end());
                if overlaps {
                    continue;
                }
                mentions.push(PlaceMention {
                    start: m.start(),
                    end: m.end(),
                    raw: m.as_str().to_string(),
                    canonical: canonical.clone(),
                });
            }
        }

        mentions.sort_by_key(|m| m.start);
        mentions
    }
}

/// Three ASCII upper-case letters
pub fn is_airport_code(token: &str) -> bool {
    token.len() == 3 && token.chars().all(|c| c.is_ascii_uppercase())
}

/// "air india" -> "Air India"
pub fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(|c| c.to_lowercase()))
                    .collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
