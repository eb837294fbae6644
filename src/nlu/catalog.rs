//! Read-only registry of the fixed tables the pipeline runs against
//!
//! The registry is loaded once at startup (built-in tables, optionally
//! replaced section by section from a TOML file), validated, and then shared
//! behind an `Arc` without further mutation.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use super::intent::IntentKind;

/// Trigger keywords for one intent
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IntentDefinition {
    /// The intent these triggers score
    pub intent: IntentKind,
    /// Keywords or phrases, matched as case-insensitive substrings
    pub triggers: Vec<String>,
}

impl IntentDefinition {
    /// Creates a new intent definition
    pub fn new(intent: IntentKind, triggers: &[&str]) -> Self {
        Self {
            intent,
            triggers: triggers.iter().map(|t| t.to_string()).collect(),
        }
    }
}

/// Synonyms that resolve to one canonical city name
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlaceDefinition {
    /// Canonical city name
    pub canonical: String,
    /// Spellings, old names and lower-case airport codes
    pub synonyms: Vec<String>,
}

impl PlaceDefinition {
    /// Creates a new place definition
    pub fn new(canonical: &str, synonyms: &[&str]) -> Self {
        Self {
            canonical: canonical.to_string(),
            synonyms: synonyms.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Fixed tables consulted by the normalizer, extractor and classifier
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Catalog {
    /// Intents in declaration order; the order breaks score ties
    pub intents: Vec<IntentDefinition>,
    /// City synonym table; the first entry wins on overlapping mentions
    pub places: Vec<PlaceDefinition>,
    /// Airline names; the first one found in the text wins
    pub airlines: Vec<String>,
    /// Upper-case 3-letter tokens that are never airport codes
    pub reserved_codes: Vec<String>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Catalog {
    /// The built-in airline reservation tables
    pub fn builtin() -> Self {
        use IntentKind::*;

        Self {
            intents: vec![
                IntentDefinition::new(
                    SearchFlights,
                    &["search", "find", "show", "available", "flights", "from"],
                ),
                IntentDefinition::new(
                    CancelBooking,
                    &["cancel", "cancellation", "cancel booking", "cancel my booking"],
                ),
                IntentDefinition::new(
                    ShowPayments,
                    &["payment", "paid", "transaction", "invoice", "payment status"],
                ),
                IntentDefinition::new(BoardingPass, &["boarding", "pass", "gate", "seat"]),
                IntentDefinition::new(
                    BookingStatus,
                    &["booking", "status", "pnr", "check", "my booking"],
                ),
                IntentDefinition::new(ListAirlines, &["airline", "rating", "all airlines"]),
                IntentDefinition::new(
                    BookFlight,
                    &["book", "reserve", "ticket", "aadhaar", "book a flight", "book flight"],
                ),
                IntentDefinition::new(
                    ShowCustomers,
                    &["customer", "user", "passenger", "list", "all customers"],
                ),
                IntentDefinition::new(FlightDetails, &["flight", "detail", "information"]),
            ],
            places: vec![
                PlaceDefinition::new("Delhi", &["delhi", "new delhi", "ndls"]),
                PlaceDefinition::new("Mumbai", &["mumbai", "bombay", "bom"]),
                PlaceDefinition::new("Bangalore", &["bangalore", "bengaluru", "blr"]),
                PlaceDefinition::new("Kolkata", &["kolkata", "calcutta", "ccu"]),
                PlaceDefinition::new("Hyderabad", &["hyderabad", "hyd"]),
                PlaceDefinition::new("Pune", &["pune", "pnq"]),
                PlaceDefinition::new("Goa", &["goa", "goi"]),
                PlaceDefinition::new("Jaipur", &["jaipur", "jai", "jpr"]),
            ],
            airlines: [
                "IndiGo",
                "Air India",
                "SpiceJet",
                "GoAir",
                "Vistara",
                "Emirates",
                "United",
            ]
            .iter()
            .map(|a| a.to_string())
            .collect(),
            reserved_codes: vec!["PNR".to_string()],
        }
    }

    /// Parses a catalog from TOML; sections left out keep the built-in tables
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let catalog: Catalog = toml::from_str(content)?;
        catalog.into_validated()
    }

    /// Loads a catalog file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Case-folds every table and checks it for consistency
    pub fn into_validated(mut self) -> Result<Self> {
        for definition in &mut self.intents {
            for trigger in &mut definition.triggers {
                *trigger = trigger.trim().to_lowercase();
            }
        }
        for place in &mut self.places {
            place.canonical = place.canonical.trim().to_string();
            for synonym in &mut place.synonyms {
                *synonym = synonym.trim().to_lowercase();
            }
        }
        for airline in &mut self.airlines {
            *airline = airline.trim().to_string();
        }
        for code in &mut self.reserved_codes {
            *code = code.trim().to_uppercase();
        }

        self.validate()?;
        Ok(self)
    }

    /// Checks the tables without modifying them
    pub fn validate(&self) -> Result<()> {
        if self.intents.is_empty() {
            return Err(Error::InvalidCatalog("no intents declared".to_string()));
        }

        let mut seen = BTreeSet::new();
        for definition in &self.intents {
            if definition.intent == IntentKind::Unrecognized {
                return Err(Error::InvalidCatalog(
                    "the unrecognized sentinel cannot carry triggers".to_string(),
                ));
            }
            if !seen.insert(definition.intent) {
                return Err(Error::InvalidCatalog(format!(
                    "intent '{}' declared more than once",
                    definition.intent
                )));
            }
            if definition.triggers.is_empty() {
                return Err(Error::InvalidCatalog(format!(
                    "intent '{}' has no triggers",
                    definition.intent
                )));
            }
            if definition.triggers.iter().any(|t| t.is_empty()) {
                return Err(Error::InvalidCatalog(format!(
                    "intent '{}' has an empty trigger",
                    definition.intent
                )));
            }
            if let Some(trigger) = definition.triggers.iter().find(|t| !is_folded(t)) {
                return Err(Error::InvalidCatalog(format!(
                    "trigger '{}' of intent '{}' is not trimmed lower-case",
                    trigger, definition.intent
                )));
            }
        }

        let mut owners: BTreeMap<&str, &str> = BTreeMap::new();
        for place in &self.places {
            if place.canonical.is_empty() {
                return Err(Error::InvalidCatalog("place without canonical name".into()));
            }
            for synonym in &place.synonyms {
                if synonym.is_empty() {
                    return Err(Error::InvalidCatalog(format!(
                        "empty synonym for '{}'",
                        place.canonical
                    )));
                }
                if !is_folded(synonym) {
                    return Err(Error::InvalidCatalog(format!(
                        "synonym '{}' of '{}' is not trimmed lower-case",
                        synonym, place.canonical
                    )));
                }
                if let Some(previous) = owners.insert(synonym.as_str(), place.canonical.as_str()) {
                    if previous != place.canonical {
                        return Err(Error::InvalidCatalog(format!(
                            "synonym '{}' maps to both '{}' and '{}'",
                            synonym, previous, place.canonical
                        )));
                    }
                }
            }
        }

        if self.airlines.iter().any(|a| a.is_empty()) {
            return Err(Error::InvalidCatalog("empty airline name".to_string()));
        }

        Ok(())
    }

    /// Looks up the definition of an intent
    pub fn intent(&self, kind: IntentKind) -> Option<&IntentDefinition> {
        self.intents.iter().find(|d| d.intent == kind)
    }

    /// Whether an upper-case token is excluded from airport code detection
    pub fn is_reserved_code(&self, token: &str) -> bool {
        self.reserved_codes.iter().any(|c| c == token)
    }
}

/// Matching runs against folded text, so table entries must already be folded
fn is_folded(entry: &str) -> bool {
    entry.trim() == entry && entry.to_lowercase() == entry
}
