//! Causal delivery releases every origin's events in counter order, whatever
//! order they arrive in.

use chorus_sync::{Admission, DeliveryTracker, Released};
use proptest::prelude::*;
use test_fixtures::knowledge_event;

fn arrival_orders() -> impl Strategy<Value = Vec<(bool, u64)>> {
    (1usize..12).prop_flat_map(|n| {
        let events: Vec<(bool, u64)> = (1..=n as u64)
            .flat_map(|c| [(false, c), (true, c)])
            .collect();
        Just(events).prop_shuffle()
    })
}

proptest! {
    #[test]
    fn any_arrival_order_applies_in_counter_order(arrivals in arrival_orders()) {
        let mut tracker = DeliveryTracker::new(64);
        let mut applied: Vec<(String, u64)> = Vec::new();

        for (second, counter) in arrivals {
            let origin = if second { "b" } else { "a" };
            let event = knowledge_event(origin, counter, "k", 0.5, true);
            match tracker.admit(&event) {
                Admission::Duplicate => {}
                Admission::Waiting(_) => tracker.buffer(event).unwrap(),
                Admission::Ready => {
                    tracker.mark_delivered(&event);
                    applied.push((origin.to_string(), counter));
                    while let Some(released) = tracker.next_release() {
                        if let Released::Ready(event) = released {
                            tracker.mark_delivered(&event);
                            applied.push((
                                event.origin_replica.to_string(),
                                event.logical_time.counter,
                            ));
                        }
                    }
                }
            }
        }

        prop_assert_eq!(tracker.buffered(), 0);
        for origin in ["a", "b"] {
            let order: Vec<u64> = applied
                .iter()
                .filter(|(o, _)| o == origin)
                .map(|(_, c)| *c)
                .collect();
            let expected: Vec<u64> = (1..=order.len() as u64).collect();
            prop_assert_eq!(order, expected);
        }
    }
}
