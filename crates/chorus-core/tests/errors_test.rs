use chorus_core::errors::*;
use uuid::Uuid;

#[test]
fn only_invariant_violations_are_fatal() {
    let id = Uuid::new_v4();
    let non_fatal = [
        SyncError::MalformedEvent {
            event_id: id,
            reason: "bad".into(),
        },
        SyncError::InvalidSignature { event_id: id },
        SyncError::PayloadMismatch {
            event_id: id,
            expected: "memory_add".into(),
            found: "belief_update".into(),
        },
        SyncError::CausalBufferFull {
            event_id: id,
            capacity: 4,
        },
    ];
    for err in non_fatal {
        assert!(!err.is_fatal(), "{err} should not be fatal");
        assert_eq!(err.event_id(), Some(id));
    }

    let violation = SyncError::StateInvariantViolation {
        details: "merge not idempotent".into(),
    };
    assert!(violation.is_fatal());
    assert!(SyncError::Halted.is_fatal());
    assert_eq!(SyncError::Halted.event_id(), None);
}

#[test]
fn subsystem_errors_convert_into_umbrella() {
    let err: ChorusError = GossipError::PeerUnreachable {
        peer: "r2".into(),
        reason: "down".into(),
    }
    .into();
    assert!(!err.is_fatal());
    assert!(err.to_string().contains("r2"));

    let err: ChorusError = SyncError::StateInvariantViolation {
        details: "x".into(),
    }
    .into();
    assert!(err.is_fatal());

    let err: ChorusError = EmbeddingError::ProviderUnavailable {
        provider: "onnx".into(),
    }
    .into();
    assert!(matches!(err, ChorusError::Embedding(_)));
}

#[test]
fn serde_errors_convert() {
    let parse: Result<u32, _> = serde_json::from_str("not json");
    let err: ChorusError = parse.unwrap_err().into();
    assert!(matches!(err, ChorusError::SerializationError(_)));
}
