use chorus_core::models::{ClaimValue, EventPayload, PayloadKind};
use test_fixtures::{golden_event, load_fixture_value};

#[test]
fn golden_event_decodes_and_validates() {
    let event = golden_event();
    assert_eq!(event.kind(), PayloadKind::KnowledgeUpdate);
    assert_eq!(event.logical_time.counter, 3);
    assert!(event.signature.is_none());
    assert!(event.covers.is_empty());
    assert!(event.validate_structure().is_ok());

    let attestation = event.attestation.clone().unwrap();
    assert_eq!(attestation.claim_id, event.event_id);
    assert_eq!(attestation.value, ClaimValue::Numeric(0.9));

    let EventPayload::KnowledgeUpdate(update) = &event.payload else {
        panic!("expected knowledge update");
    };
    assert_eq!(update.item.evidence.len(), 2);
}

#[test]
fn golden_event_reencodes_to_the_same_document() {
    let raw = load_fixture_value("golden/experience_event.json");
    let reencoded = serde_json::to_value(golden_event()).unwrap();
    assert_eq!(reencoded, raw);
}
