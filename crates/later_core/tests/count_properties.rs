mod common;

use common::{force_cached_count, harness, note, stored_item_count};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Step {
    Create,
    Delete(usize),
    Drift(i64),
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        3 => Just(Step::Create),
        2 => any::<usize>().prop_map(Step::Delete),
        1 => (0i64..8).prop_map(Step::Drift),
    ]
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn gateway_alone_keeps_cache_exact(creates in prop::collection::vec(any::<bool>(), 1..40)) {
        runtime().block_on(async {
            let h = harness();
            let space = h.service.create_container("Inbox", None).await.unwrap();
            let mut live = Vec::new();

            for create in creates {
                if create || live.is_empty() {
                    live.push(h.service.create_item(space.id, note("entry")).await.unwrap().id);
                } else if let Some(id) = live.pop() {
                    h.service.delete_item(id).await.unwrap();
                }
                let cached = h.service.get_count(space.id).await.unwrap();
                prop_assert_eq!(cached, live.len() as u64);
            }
            prop_assert!(h.service.recent_events().is_empty());
            Ok(())
        })?;
    }

    #[test]
    fn reconcile_restores_accuracy_after_drift(steps in prop::collection::vec(step(), 1..40)) {
        runtime().block_on(async {
            let h = harness();
            let space = h.service.create_container("Inbox", None).await.unwrap();
            let mut live = Vec::new();

            for step in steps {
                match step {
                    Step::Create => {
                        live.push(h.service.create_item(space.id, note("entry")).await.unwrap().id);
                    }
                    Step::Delete(pick) => {
                        if !live.is_empty() {
                            let id = live.swap_remove(pick % live.len());
                            h.service.delete_item(id).await.unwrap();
                        }
                    }
                    Step::Drift(value) => force_cached_count(&h.conn, space.id, value),
                }
            }

            let result = h.service.reconcile(space.id).await.unwrap();
            let actual = stored_item_count(&h.conn, space.id);
            prop_assert_eq!(actual, live.len() as u64);
            prop_assert_eq!(result.count_after(), Some(actual));
            prop_assert_eq!(h.service.get_count(space.id).await.unwrap(), actual);

            let again = h.service.reconcile(space.id).await.unwrap();
            prop_assert!(!again.corrected());
            Ok(())
        })?;
    }
}
