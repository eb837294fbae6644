//! Query descriptor building
//!
//! Turns an intent and its slots into a declarative, parameter-bound request
//! for the data layer. Bound values are always typed [`EntityValue`]s; no
//! text from the utterance is ever spliced into a query fragment.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use super::entity::EntityValue;
use super::intent::IntentKind;
use super::slots::{SlotName, SlotSet};

/// Data-store entity a descriptor reads from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    Flights,
    Bookings,
    BoardingPasses,
    Payments,
    Airlines,
    Customers,
}

/// Column a predicate or ordering refers to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Source,
    Destination,
    DepartureDate,
    DepartureTime,
    Price,
    Airline,
    Pnr,
    AadhaarNo,
    TransactionDate,
    Rating,
    CustomerId,
}

/// Comparison applied by a predicate
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Eq,
    Lte,
    Contains,
}

/// `field operator value`, with the value bound as a parameter
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Predicate {
    pub field: Field,
    pub operator: Operator,
    pub value: EntityValue,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrderBy {
    pub field: Field,
    pub direction: Direction,
}

/// Declarative read request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueryDescriptor {
    pub target: Target,
    pub predicates: Vec<Predicate>,
    pub order_by: Option<OrderBy>,
    pub limit: u32,
}

impl QueryDescriptor {
    fn new(target: Target, limit: u32) -> Self {
        Self {
            target,
            predicates: Vec::new(),
            order_by: None,
            limit,
        }
    }

    fn order(mut self, field: Field, direction: Direction) -> Self {
        self.order_by = Some(OrderBy { field, direction });
        self
    }

    /// Adds a predicate when the slot is filled
    fn bind(mut self, slots: &SlotSet, slot: SlotName, field: Field, operator: Operator) -> Self {
        if let Some(value) = slots.get(slot) {
            self.predicates.push(Predicate {
                field,
                operator,
                value: value.clone(),
            });
        }
        self
    }
}

/// Multi-step interaction the caller must drive
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    BookFlight,
    CancelBooking,
}

/// Structured "needs more input" response for action intents
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActionRequest {
    pub action: ActionKind,
    pub collected: SlotSet,
    pub missing: Vec<SlotName>,
}

impl ActionRequest {
    /// Checks if every required slot has been collected
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

/// A recognized intent lacking a required slot
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InsufficientSlots {
    pub intent: IntentKind,
    pub missing: Vec<SlotName>,
    pub reason: String,
}

impl InsufficientSlots {
    fn new(intent: IntentKind, missing: Vec<SlotName>) -> Self {
        let names = missing
            .iter()
            .map(SlotName::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        Self {
            intent,
            reason: format!("{} needs: {}", intent.description(), names),
            missing,
        }
    }
}

/// Result of building from an intent and its slots
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    Query(QueryDescriptor),
    Action(ActionRequest),
    InsufficientSlots(InsufficientSlots),
    /// Ask the user to rephrase
    Unrecognized { suggestions: Vec<String> },
}

impl Outcome {
    pub fn as_query(&self) -> Option<&QueryDescriptor> {
        match self {
            Outcome::Query(query) => Some(query),
            _ => None,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Query(q) => write!(f, "query({:?}, {} predicates)", q.target, q.predicates.len()),
            Outcome::Action(a) => write!(f, "action({:?}, {} missing)", a.action, a.missing.len()),
            Outcome::InsufficientSlots(s) => write!(f, "insufficient({})", s.reason),
            Outcome::Unrecognized { .. } => f.write_str("unrecognized"),
        }
    }
}

const REPHRASE_EXAMPLES: [&str; 3] = [
    "Show flights from DEL to BOM",
    "Check booking status for PNR ABC1234",
    "Show boarding pass for XYZ9876",
];

const BOOKING_SLOTS: [SlotName; 5] = [
    SlotName::Source,
    SlotName::Destination,
    SlotName::TravelDate,
    SlotName::TravelClass,
    SlotName::NationalId,
];

/// Maps each intent to its fixed descriptor template
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryBuilder;

impl QueryBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Builds the descriptor, action request or shortfall for `intent`
    pub fn build(&self, intent: IntentKind, slots: &SlotSet) -> Outcome {
        use Direction::*;

        let outcome = match intent {
            IntentKind::SearchFlights => Outcome::Query(
                QueryDescriptor::new(Target::Flights, 10)
                    .bind(slots, SlotName::Source, Field::Source, Operator::Eq)
                    .bind(slots, SlotName::Destination, Field::Destination, Operator::Eq)
                    .bind(slots, SlotName::TravelDate, Field::DepartureDate, Operator::Eq)
                    .bind(slots, SlotName::MaxPrice, Field::Price, Operator::Lte)
                    .bind(slots, SlotName::Airline, Field::Airline, Operator::Contains)
                    .order(Field::Price, Asc),
            ),
            IntentKind::FlightDetails => {
                match require(intent, slots, &[SlotName::Source, SlotName::Destination]) {
                    Err(shortfall) => shortfall,
                    Ok(()) => Outcome::Query(
                        QueryDescriptor::new(Target::Flights, 20)
                            .bind(slots, SlotName::Source, Field::Source, Operator::Eq)
                            .bind(slots, SlotName::Destination, Field::Destination, Operator::Eq)
                            .bind(slots, SlotName::TravelDate, Field::DepartureDate, Operator::Eq)
                            .order(Field::DepartureTime, Asc),
                    ),
                }
            }
            IntentKind::BookingStatus => by_reference(intent, slots, Target::Bookings),
            IntentKind::BoardingPass => by_reference(intent, slots, Target::BoardingPasses),
            IntentKind::ShowPayments => Outcome::Query(
                QueryDescriptor::new(Target::Payments, 20)
                    .bind(slots, SlotName::Identifier, Field::Pnr, Operator::Eq)
                    .order(Field::TransactionDate, Desc),
            ),
            IntentKind::ListAirlines => {
                Outcome::Query(QueryDescriptor::new(Target::Airlines, 50).order(Field::Rating, Desc))
            }
            IntentKind::ShowCustomers => Outcome::Query(
                QueryDescriptor::new(Target::Customers, 20)
                    .bind(slots, SlotName::NationalId, Field::AadhaarNo, Operator::Eq)
                    .order(Field::CustomerId, Asc),
            ),
            IntentKind::BookFlight => Outcome::Action(ActionRequest {
                action: ActionKind::BookFlight,
                collected: slots.clone(),
                missing: slots.missing(&BOOKING_SLOTS),
            }),
            IntentKind::CancelBooking => Outcome::Action(ActionRequest {
                action: ActionKind::CancelBooking,
                collected: slots.clone(),
                missing: slots.missing(&[SlotName::Identifier]),
            }),
            IntentKind::Unrecognized => Outcome::Unrecognized {
                suggestions: REPHRASE_EXAMPLES.iter().map(|s| s.to_string()).collect(),
            },
        };

        debug!(intent = %intent, outcome = %outcome, "descriptor built");
        outcome
    }
}

fn require(intent: IntentKind, slots: &SlotSet, names: &[SlotName]) -> Result<(), Outcome> {
    let missing = slots.missing(names);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(Outcome::InsufficientSlots(InsufficientSlots::new(intent, missing)))
    }
}

fn by_reference(intent: IntentKind, slots: &SlotSet, target: Target) -> Outcome {
    match require(intent, slots, &[SlotName::Identifier]) {
        Err(shortfall) => shortfall,
        Ok(()) => Outcome::Query(
            QueryDescriptor::new(target, 1).bind(slots, SlotName::Identifier, Field::Pnr, Operator::Eq),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nlu::entity::{Currency, MoneyAmount};

    fn code(c: &str) -> EntityValue {
        EntityValue::Code(c.to_string())
    }

    #[test]
    fn test_search_flights_binds_typed_values() {
        let slots = SlotSet::new()
            .with(SlotName::Source, code("DEL"))
            .with(SlotName::Destination, code("BOM"))
            .with(
                SlotName::MaxPrice,
                EntityValue::Money(MoneyAmount {
                    currency: Currency::Inr,
                    minor_units: 500_000,
                }),
            );
        let outcome = QueryBuilder::new().build(IntentKind::SearchFlights, &slots);
        let query = outcome.as_query().unwrap();

        assert_eq!(query.target, Target::Flights);
        assert_eq!(query.limit, 10);
        assert_eq!(
            query.order_by,
            Some(OrderBy {
                field: Field::Price,
                direction: Direction::Asc
            })
        );
        let fields: Vec<_> = query.predicates.iter().map(|p| (p.field, p.operator)).collect();
        assert_eq!(
            fields,
            vec![
                (Field::Source, Operator::Eq),
                (Field::Destination, Operator::Eq),
                (Field::Price, Operator::Lte)
            ]
        );
        assert_eq!(query.predicates[0].value, code("DEL"));
    }

    #[test]
    fn test_booking_status_requires_identifier() {
        let outcome = QueryBuilder::new().build(IntentKind::BookingStatus, &SlotSet::new());
        match outcome {
            Outcome::InsufficientSlots(shortfall) => {
                assert_eq!(shortfall.intent, IntentKind::BookingStatus);
                assert_eq!(shortfall.missing, vec![SlotName::Identifier]);
                assert!(shortfall.reason.contains("identifier"));
            }
            other => panic!("expected insufficient slots, got {:?}", other),
        }
    }

    #[test]
    fn test_boarding_pass_query() {
        let slots = SlotSet::new().with(
            SlotName::Identifier,
            EntityValue::Reference("XYZ9876".into()),
        );
        let outcome = QueryBuilder::new().build(IntentKind::BoardingPass, &slots);
        let query = outcome.as_query().unwrap();
        assert_eq!(query.target, Target::BoardingPasses);
        assert_eq!(query.limit, 1);
        assert_eq!(query.predicates[0].field, Field::Pnr);
        assert_eq!(query.order_by, None);
    }

    #[test]
    fn test_flight_details_requires_route() {
        let slots = SlotSet::new().with(SlotName::Source, code("DEL"));
        let outcome = QueryBuilder::new().build(IntentKind::FlightDetails, &slots);
        assert!(matches!(
            outcome,
            Outcome::InsufficientSlots(InsufficientSlots { ref missing, .. })
                if missing == &vec![SlotName::Destination]
        ));
    }

    #[test]
    fn test_list_airlines_defaults() {
        let outcome = QueryBuilder::new().build(IntentKind::ListAirlines, &SlotSet::new());
        let query = outcome.as_query().unwrap();
        assert!(query.predicates.is_empty());
        assert_eq!(query.limit, 50);
        assert_eq!(query.order_by.map(|o| o.direction), Some(Direction::Desc));
    }

    #[test]
    fn test_optional_filters() {
        let builder = QueryBuilder::new();
        let payments = builder.build(IntentKind::ShowPayments, &SlotSet::new());
        assert!(payments.as_query().unwrap().predicates.is_empty());

        let slots = SlotSet::new().with(
            SlotName::NationalId,
            EntityValue::NationalId("123456789012".into()),
        );
        let customers = builder.build(IntentKind::ShowCustomers, &slots);
        assert_eq!(
            customers.as_query().unwrap().predicates[0].field,
            Field::AadhaarNo
        );
    }

    #[test]
    fn test_book_flight_is_an_action() {
        let slots = SlotSet::new().with(SlotName::Source, code("DEL"));
        match QueryBuilder::new().build(IntentKind::BookFlight, &slots) {
            Outcome::Action(request) => {
                assert_eq!(request.action, ActionKind::BookFlight);
                assert!(!request.is_complete());
                assert_eq!(request.missing.len(), 4);
                assert!(request.collected.contains(SlotName::Source));
            }
            other => panic!("expected action, got {:?}", other),
        }
    }

    #[test]
    fn test_unrecognized_offers_examples() {
        match QueryBuilder::new().build(IntentKind::Unrecognized, &SlotSet::new()) {
            Outcome::Unrecognized { suggestions } => assert_eq!(suggestions.len(), 3),
            other => panic!("expected unrecognized, got {:?}", other),
        }
    }

    #[test]
    fn test_outcome_serialization_is_tagged() {
        let outcome = QueryBuilder::new().build(IntentKind::ListAirlines, &SlotSet::new());
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["kind"], "query");
        assert_eq!(json["target"], "airlines");
        assert_eq!(json["order_by"]["field"], "rating");
    }
}
