//! Slot resolution: intent-specific fields derived from extracted entities

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

use super::entity::{Entity, EntityKind, EntityValue, IdentifierKind};
use super::intent::IntentKind;
use super::normalizer::NormalizedText;

/// Named slot an intent can carry
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum SlotName {
    Source,
    Destination,
    TravelDate,
    TravelClass,
    Identifier,
    NationalId,
    Airline,
    MaxPrice,
}

impl SlotName {
    /// Stable snake_case name
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotName::Source => "source",
            SlotName::Destination => "destination",
            SlotName::TravelDate => "travel_date",
            SlotName::TravelClass => "travel_class",
            SlotName::Identifier => "identifier",
            SlotName::NationalId => "national_id",
            SlotName::Airline => "airline",
            SlotName::MaxPrice => "max_price",
        }
    }

    /// Slots this intent collects, in resolution order
    pub fn for_intent(intent: IntentKind) -> &'static [SlotName] {
        use SlotName::*;

        match intent {
            IntentKind::SearchFlights => {
                &[Source, Destination, TravelDate, TravelClass, Airline, MaxPrice]
            }
            IntentKind::FlightDetails => &[Source, Destination, TravelDate],
            IntentKind::BookingStatus
            | IntentKind::BoardingPass
            | IntentKind::ShowPayments
            | IntentKind::CancelBooking => &[Identifier],
            IntentKind::ShowCustomers => &[NationalId],
            IntentKind::BookFlight => {
                &[Source, Destination, TravelDate, TravelClass, NationalId, Airline]
            }
            IntentKind::ListAirlines | IntentKind::Unrecognized => &[],
        }
    }
}

impl fmt::Display for SlotName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved slots; absent keys are a normal, partial result
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct SlotSet(BTreeMap<SlotName, EntityValue>);

impl SlotSet {
    /// Creates an empty slot set
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a slot
    pub fn with(mut self, name: SlotName, value: EntityValue) -> Self {
        self.0.insert(name, value);
        self
    }

    pub fn get(&self, name: SlotName) -> Option<&EntityValue> {
        self.0.get(&name)
    }

    pub fn contains(&self, name: SlotName) -> bool {
        self.0.contains_key(&name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Slots in name order
    pub fn iter(&self) -> impl Iterator<Item = (SlotName, &EntityValue)> {
        self.0.iter().map(|(name, value)| (*name, value))
    }

    /// Which of `names` are not filled
    pub fn missing(&self, names: &[SlotName]) -> Vec<SlotName> {
        names
            .iter()
            .copied()
            .filter(|name| !self.contains(*name))
            .collect()
    }

    /// Source and destination view
    pub fn route(&self) -> Route {
        Route {
            source: self.get(SlotName::Source).cloned(),
            destination: self.get(SlotName::Destination).cloned(),
        }
    }

    fn insert_first<'a>(
        &mut self,
        name: SlotName,
        entities: &'a [Entity],
        accept: impl Fn(&'a Entity) -> Option<&'a EntityValue>,
    ) {
        if let Some(value) = entities.iter().find_map(accept) {
            self.0.insert(name, value.clone());
        }
    }
}

/// Source and destination of a trip
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Route {
    pub source: Option<EntityValue>,
    pub destination: Option<EntityValue>,
}

impl Route {
    /// Checks if both ends are known
    pub fn is_complete(&self) -> bool {
        self.source.is_some() && self.destination.is_some()
    }
}

/// Maps entities onto the slots of an intent
///
/// Resolution is total: every (intent, entities) pair yields a slot set.
#[derive(Debug, Clone, Copy, Default)]
pub struct SlotResolver;

impl SlotResolver {
    pub fn new() -> Self {
        Self
    }

    /// Fills the slots `intent` collects from `entities`
    pub fn resolve(&self, intent: IntentKind, entities: &[Entity], text: &NormalizedText) -> SlotSet {
        let wanted = SlotName::for_intent(intent);
        let mut slots = SlotSet::new();

        if wanted.contains(&SlotName::Source) {
            let route = self.resolve_route(entities, text);
            if let Some(source) = route.source {
                slots.0.insert(SlotName::Source, source);
            }
            if let Some(destination) = route.destination {
                slots.0.insert(SlotName::Destination, destination);
            }
        }

        for name in wanted {
            match name {
                SlotName::Source | SlotName::Destination => {}
                SlotName::TravelDate => slots.insert_first(*name, entities, |e| match &e.value {
                    EntityValue::Date(_) => Some(&e.value),
                    _ => None,
                }),
                SlotName::TravelClass => {
                    slots.insert_first(*name, entities, value_of(EntityKind::TravelClass))
                }
                SlotName::Identifier => slots.insert_first(
                    *name,
                    entities,
                    value_of(EntityKind::Identifier(IdentifierKind::BookingReference)),
                ),
                SlotName::NationalId => slots.insert_first(
                    *name,
                    entities,
                    value_of(EntityKind::Identifier(IdentifierKind::NationalId)),
                ),
                SlotName::Airline => {
                    slots.insert_first(*name, entities, value_of(EntityKind::AirlineName))
                }
                SlotName::MaxPrice => slots.insert_first(*name, entities, |e| match &e.value {
                    EntityValue::Money(_) => Some(&e.value),
                    _ => None,
                }),
            }
        }

        debug!(intent = %intent, filled = slots.len(), "slots resolved");
        slots
    }

    /// Positional route assignment
    ///
    /// Two or more locations: the first is the source and the second the
    /// destination. A single location is the source after the word "from",
    /// otherwise the destination after the word "to", otherwise unassigned.
    pub fn resolve_route(&self, entities: &[Entity], text: &NormalizedText) -> Route {
        let locations: Vec<&EntityValue> = entities
            .iter()
            .filter(|e| e.is_location())
            .map(|e| &e.value)
            .collect();

        match locations.as_slice() {
            [] => Route::default(),
            [only] if text.has_word("from") => Route {
                source: Some((*only).clone()),
                destination: None,
            },
            [only] if text.has_word("to") => Route {
                source: None,
                destination: Some((*only).clone()),
            },
            [_] => Route::default(),
            [first, second, ..] => Route {
                source: Some((*first).clone()),
                destination: Some((*second).clone()),
            },
        }
    }
}

fn value_of<'a>(kind: EntityKind) -> impl Fn(&'a Entity) -> Option<&'a EntityValue> {
    move |e| (e.kind == kind).then_some(&e.value)
}
