use airline_nlu::nlu::{
    ActionKind, Annotation, AnnotationLabel, Catalog, Direction, EntityKind, EntityValue, Field, IdentifierKind, IntentKind,
    Interpretation, Operator, Outcome, Pipeline, QueryDescriptor, SlotName, Target, TravelClass,
};
use chrono::NaiveDate;

fn interpret(text: &str) -> Interpretation {
    Pipeline::with_builtin_catalog()
        .unwrap()
        .interpret(text, None)
        .unwrap()
}

fn query(interpretation: &Interpretation) -> &QueryDescriptor {
    interpretation
        .outcome
        .as_query()
        .unwrap_or_else(|| panic!("expected a query, got {:?}", interpretation.outcome))
}

fn code(c: &str) -> EntityValue {
    EntityValue::Code(c.to_string())
}

#[test]
fn test_search_flights_scenario() {
    let result = interpret("Show flights from DEL to BOM");

    assert_eq!(result.intent.primary_intent, IntentKind::SearchFlights);

    let locations: Vec<_> = result
        .entities
        .iter()
        .filter(|e| e.kind == EntityKind::Location)
        .map(|e| e.value.clone())
        .collect();
    assert_eq!(locations, vec![code("DEL"), code("BOM")]);

    assert_eq!(result.slots.get(SlotName::Source), Some(&code("DEL")));
    assert_eq!(result.slots.get(SlotName::Destination), Some(&code("BOM")));

    let q = query(&result);
    assert_eq!(q.target, Target::Flights);
    assert_eq!(q.predicates.len(), 2);
    assert_eq!(q.predicates[0].field, Field::Source);
    assert_eq!(q.predicates[0].operator, Operator::Eq);
    assert_eq!(q.predicates[0].value, code("DEL"));
    assert_eq!(q.predicates[1].field, Field::Destination);
    assert_eq!(q.predicates[1].value, code("BOM"));
    let order = q.order_by.unwrap();
    assert_eq!((order.field, order.direction), (Field::Price, Direction::Asc));
    assert_eq!(q.limit, 10);
}

#[test]
fn test_annotated_multiword_place_keeps_route() {
    let annotations = vec![
        Annotation::new("Navi Mumbai", AnnotationLabel::Location),
        Annotation::new("Pune", AnnotationLabel::Location),
        Annotation::new("2", AnnotationLabel::Other),
    ];
    let result = Pipeline::with_builtin_catalog()
        .unwrap()
        .interpret("Search flights from Navi Mumbai to Pune", Some(&annotations))
        .unwrap();

    let navi_mumbai = EntityValue::Place("Navi Mumbai".into());
    let pune = EntityValue::Place("Pune".into());
    assert_eq!(result.slots.get(SlotName::Source), Some(&navi_mumbai));
    assert_eq!(result.slots.get(SlotName::Destination), Some(&pune));

    let q = query(&result);
    assert_eq!(q.predicates[0].value, navi_mumbai);
    assert_eq!(q.predicates[1].value, pune);
}

#[test]
fn test_booking_status_scenario() {
    let result = interpret("Check booking status for PNR ABC1234");

    assert_eq!(result.intent.primary_intent, IntentKind::BookingStatus);
    assert!(result.entities.iter().any(|e| {
        e.kind == EntityKind::Identifier(IdentifierKind::BookingReference)
            && e.value == EntityValue::Reference("ABC1234".into())
    }));
    assert_eq!(
        result.slots.get(SlotName::Identifier),
        Some(&EntityValue::Reference("ABC1234".into()))
    );

    let q = query(&result);
    assert_eq!(q.target, Target::Bookings);
    assert_eq!(q.predicates.len(), 1);
    assert_eq!(q.predicates[0].field, Field::Pnr);
    assert_eq!(q.limit, 1);
}

#[test]
fn test_list_airlines_scenario() {
    let result = interpret("List all airlines");

    assert_eq!(result.intent.primary_intent, IntentKind::ListAirlines);
    assert!(result.slots.is_empty());

    let q = query(&result);
    assert_eq!(q.target, Target::Airlines);
    assert!(q.predicates.is_empty());
    let order = q.order_by.unwrap();
    assert_eq!((order.field, order.direction), (Field::Rating, Direction::Desc));
}

#[test]
fn test_unrecognized_scenario() {
    let result = interpret("asdlkj qweqwe");

    assert_eq!(result.intent.primary_intent, IntentKind::Unrecognized);
    assert_eq!(result.intent.confidence, 0.0);
    assert!(result.intent.ranked_intents.is_empty());
    assert!(matches!(result.outcome, Outcome::Unrecognized { ref suggestions } if !suggestions.is_empty()));
}

#[test]
fn test_missing_identifier_scenario() {
    let result = interpret("Check booking status");

    assert_eq!(result.intent.primary_intent, IntentKind::BookingStatus);
    match result.outcome {
        Outcome::InsufficientSlots(shortfall) => {
            assert_eq!(shortfall.missing, vec![SlotName::Identifier]);
        }
        other => panic!("expected insufficient slots, got {:?}", other),
    }
}

#[test]
fn test_boarding_pass() {
    let result = interpret("Show my boarding pass for XYZ9876");

    assert_eq!(result.intent.primary_intent, IntentKind::BoardingPass);
    let q = query(&result);
    assert_eq!(q.target, Target::BoardingPasses);
    assert_eq!(q.predicates[0].value, EntityValue::Reference("XYZ9876".into()));
}

#[test]
fn test_search_with_price_cap_and_synonyms() {
    let result = interpret("Find flights from Bombay to Bengaluru under ₹5,000 on IndiGo");

    assert_eq!(result.intent.primary_intent, IntentKind::SearchFlights);
    let q = query(&result);
    let bound: Vec<_> = q
        .predicates
        .iter()
        .map(|p| (p.field, p.operator, p.value.to_string()))
        .collect();
    assert_eq!(
        bound,
        vec![
            (Field::Source, Operator::Eq, "Mumbai".to_string()),
            (Field::Destination, Operator::Eq, "Bangalore".to_string()),
            (Field::Price, Operator::Lte, "INR 5000.00".to_string()),
            (Field::Airline, Operator::Contains, "IndiGo".to_string()),
        ]
    );
}

#[test]
fn test_book_flight_collects_everything() {
    let result = interpret(
        "Book a flight from Delhi to Mumbai on 15/08/2024 in economy, aadhaar 1234 5678 9012",
    );

    assert_eq!(result.intent.primary_intent, IntentKind::BookFlight);
    match &result.outcome {
        Outcome::Action(request) => {
            assert_eq!(request.action, ActionKind::BookFlight);
            assert!(request.is_complete(), "missing: {:?}", request.missing);
            assert_eq!(
                request.collected.get(SlotName::TravelDate),
                Some(&EntityValue::Date(NaiveDate::from_ymd_opt(2024, 8, 15).unwrap()))
            );
            assert_eq!(
                request.collected.get(SlotName::TravelClass),
                Some(&EntityValue::Class(TravelClass::Economy))
            );
            assert_eq!(
                request.collected.get(SlotName::NationalId),
                Some(&EntityValue::NationalId("123456789012".into()))
            );
        }
        other => panic!("expected action, got {:?}", other),
    }
}

#[test]
fn test_cancel_booking_without_reference() {
    let result = interpret("Please cancel my booking");

    assert_eq!(result.intent.primary_intent, IntentKind::CancelBooking);
    match result.outcome {
        Outcome::Action(request) => {
            assert_eq!(request.action, ActionKind::CancelBooking);
            assert_eq!(request.missing, vec![SlotName::Identifier]);
        }
        other => panic!("expected action, got {:?}", other),
    }
}

fn assert_bound_values_are_normalized(text: &str) {
    let catalog = Catalog::builtin();
    let result = interpret(text);
    let Some(q) = result.outcome.as_query() else {
        return;
    };

    for predicate in &q.predicates {
        match &predicate.value {
            EntityValue::Code(c) => {
                assert_eq!(c.len(), 3);
                assert!(c.chars().all(|ch| ch.is_ascii_uppercase()), "{}", c);
            }
            EntityValue::Place(p) => {
                assert!(catalog.places.iter().any(|d| &d.canonical == p), "{}", p);
            }
            EntityValue::Reference(r) => {
                assert_eq!(r.len(), 7);
                assert!(r.chars().all(|ch| ch.is_ascii_uppercase() || ch.is_ascii_digit()));
            }
            EntityValue::NationalId(n) => {
                assert_eq!(n.len(), 12);
                assert!(n.chars().all(|ch| ch.is_ascii_digit()));
            }
            EntityValue::Airline(a) => assert!(catalog.airlines.contains(a)),
            EntityValue::Date(_) | EntityValue::Money(_) | EntityValue::Class(_) => {}
            EntityValue::Text(t) => panic!("free text bound into a predicate: {}", t),
        }
    }
}

#[test]
fn test_injection_attempts_only_bind_typed_values() {
    let hostile = [
        "Show flights from DEL to BOM'; DROP TABLE flight;--",
        "Check booking status for PNR ABC1234' OR '1'='1",
        "Show customers with aadhaar 1234-5678-9012; DELETE FROM customer",
        "show payments for ZZZ9999\" UNION SELECT * FROM payment --",
        "Find flights from Goa to \"Pune OR 1=1\" on emirates",
    ];
    for text in hostile {
        assert_bound_values_are_normalized(text);
    }

    let result = interpret(hostile[0]);
    let q = query(&result);
    assert_eq!(q.predicates.len(), 2);
    assert_eq!(q.predicates[0].value, code("DEL"));
    assert_eq!(q.predicates[1].value, code("BOM"));
}

#[test]
fn test_pattern_only_extraction_never_fails() {
    let inputs = [
        "Show flights from DEL to BOM",
        "flights on 2024-02-30",
        "₹99999999999999999999 cheapest flight",
        "premium economy business",
        "",
        "   ",
        "ñandú ✈ 東京 to مومباي",
        "PNR",
    ];
    let pipeline = Pipeline::with_builtin_catalog().unwrap();
    for text in inputs {
        assert!(pipeline.interpret(text, None).is_ok(), "failed on {:?}", text);
    }
}

#[test]
fn test_repeated_runs_are_identical() {
    let pipeline = Pipeline::with_builtin_catalog().unwrap();
    let text = "Find business class flights from Calcutta to Hyderabad on 2024-12-01";
    let first = serde_json::to_string(&pipeline.interpret(text, None).unwrap()).unwrap();
    for _ in 0..5 {
        let again = serde_json::to_string(&pipeline.interpret(text, None).unwrap()).unwrap();
        assert_eq!(first, again);
    }
}

#[test]
fn test_custom_catalog_places() {
    let catalog = Catalog::from_toml_str(
        r#"
        [[places]]
        canonical = "Chennai"
        synonyms = ["chennai", "madras"]

        [[places]]
        canonical = "Kochi"
        synonyms = ["kochi", "cochin"]
        "#,
    )
    .unwrap();
    let pipeline = Pipeline::new(std::sync::Arc::new(catalog)).unwrap();

    let route = pipeline
        .extract_route("Search flights from Madras to Cochin", None)
        .unwrap();
    assert_eq!(route.source, Some(EntityValue::Place("Chennai".into())));
    assert_eq!(route.destination, Some(EntityValue::Place("Kochi".into())));
}
