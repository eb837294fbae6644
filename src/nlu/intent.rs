//! Intent catalog and keyword-overlap classification

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use super::catalog::Catalog;
use super::normalizer::NormalizedText;

/// The closed set of intents the pipeline understands
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    /// Search flights on a route
    SearchFlights,
    /// Cancel an existing booking
    CancelBooking,
    /// Look up payments
    ShowPayments,
    /// Show a boarding pass
    BoardingPass,
    /// Check the status of a booking
    BookingStatus,
    /// List airlines
    ListAirlines,
    /// Start a new booking
    BookFlight,
    /// Show customers
    ShowCustomers,
    /// Detailed schedule for a route
    FlightDetails,
    /// Nothing in the catalog matched
    Unrecognized,
}

impl IntentKind {
    /// Stable snake_case name
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentKind::SearchFlights => "search_flights",
            IntentKind::CancelBooking => "cancel_booking",
            IntentKind::ShowPayments => "show_payments",
            IntentKind::BoardingPass => "boarding_pass",
            IntentKind::BookingStatus => "booking_status",
            IntentKind::ListAirlines => "list_airlines",
            IntentKind::BookFlight => "book_flight",
            IntentKind::ShowCustomers => "show_customers",
            IntentKind::FlightDetails => "flight_details",
            IntentKind::Unrecognized => "unrecognized",
        }
    }

    /// Returns a human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            IntentKind::SearchFlights => "Search available flights",
            IntentKind::CancelBooking => "Cancel a booking",
            IntentKind::ShowPayments => "Show payment details",
            IntentKind::BoardingPass => "Show a boarding pass",
            IntentKind::BookingStatus => "Check booking status",
            IntentKind::ListAirlines => "List airlines",
            IntentKind::BookFlight => "Book a flight",
            IntentKind::ShowCustomers => "Show customers",
            IntentKind::FlightDetails => "Show flight details",
            IntentKind::Unrecognized => "Unrecognized request",
        }
    }

    /// Checks if this intent needs a multi-step interaction instead of a read query
    pub fn is_action(&self) -> bool {
        matches!(self, IntentKind::BookFlight | IntentKind::CancelBooking)
    }
}

impl fmt::Display for IntentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One scored candidate
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RankedIntent {
    /// Candidate intent
    pub intent: IntentKind,
    /// Number of distinct triggers found in the text
    pub score: usize,
}

/// Classification result
///
/// `confidence` is the primary intent's score over its trigger count. It ranks
/// and thresholds; it is not a probability.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IntentResult {
    /// Best-scoring intent, or the unrecognized sentinel
    pub primary_intent: IntentKind,
    /// Score normalized against the intent's trigger count, in [0, 1]
    pub confidence: f64,
    /// Every intent that scored, best first
    pub ranked_intents: Vec<RankedIntent>,
}

impl IntentResult {
    /// The sentinel result for text that matched nothing
    pub fn unrecognized() -> Self {
        Self {
            primary_intent: IntentKind::Unrecognized,
            confidence: 0.0,
            ranked_intents: Vec::new(),
        }
    }

    /// Whether some catalog intent matched
    pub fn is_recognized(&self) -> bool {
        self.primary_intent != IntentKind::Unrecognized
    }

    /// The runner-up, if any
    pub fn best_alternative(&self) -> Option<RankedIntent> {
        self.ranked_intents.get(1).copied()
    }
}

/// Keyword-overlap classifier over the catalog's trigger tables
#[derive(Debug, Clone)]
pub struct IntentClassifier {
    catalog: Arc<Catalog>,
}

impl IntentClassifier {
    /// Creates a classifier over a shared catalog
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }

    /// Scores the folded text against every catalog intent
    pub fn classify(&self, text: &NormalizedText) -> IntentResult {
        let folded = text.folded.as_str();

        let mut ranked: Vec<RankedIntent> = self
            .catalog
            .intents
            .iter()
            .filter_map(|definition| {
                let score = distinct_triggers(&definition.triggers)
                    .filter(|trigger| folded.contains(*trigger))
                    .count();
                (score > 0).then_some(RankedIntent {
                    intent: definition.intent,
                    score,
                })
            })
            .collect();

        // Stable sort keeps declaration order among equal scores
        ranked.sort_by(|a, b| b.score.cmp(&a.score));

        let Some(top) = ranked.first().copied() else {
            debug!("no intent matched: {:?}", folded);
            return IntentResult::unrecognized();
        };

        let trigger_count = self
            .catalog
            .intent(top.intent)
            .map(|d| distinct_triggers(&d.triggers).count())
            .unwrap_or(1)
            .max(1);
        let confidence = (top.score as f64 / trigger_count as f64).min(1.0);

        debug!(
            intent = %top.intent,
            score = top.score,
            confidence,
            candidates = ranked.len(),
            "intent classified"
        );

        IntentResult {
            primary_intent: top.intent,
            confidence,
            ranked_intents: ranked,
        }
    }
}

fn distinct_triggers(triggers: &[String]) -> impl Iterator<Item = &str> {
    triggers
        .iter()
        .map(String::as_str)
        .collect::<BTreeSet<_>>()
        .into_iter()
}
