//! Property-based tests for history merging and reply assembly

use super::*;
use crate::config::WidgetConfig;
use crate::transport::testing::MockTransport;
use crate::transport::Session;
use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use std::collections::HashSet;

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_role() -> impl Strategy<Value = Role> {
    prop_oneof![Just(Role::User), Just(Role::Assistant)]
}

/// Small id and content pools so collisions actually happen
fn arb_message() -> impl Strategy<Value = Message> {
    (
        "[a-f]",
        arb_role(),
        prop_oneof![Just("Hi"), Just(" Hi "), Just("Hello"), Just("Pricing?")],
        0i64..50,
    )
        .prop_map(|(id, role, content, secs)| Message {
            id,
            content: content.to_string(),
            role,
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
                + Duration::seconds(secs),
            session_id: Some("s-1".to_string()),
        })
}

fn arb_messages() -> impl Strategy<Value = Vec<Message>> {
    prop::collection::vec(arb_message(), 0..8)
}

fn id_set(messages: &[Message]) -> HashSet<String> {
    messages.iter().map(|m| m.id.clone()).collect()
}

// ============================================================================
// Merge
// ============================================================================

proptest! {
    #[test]
    fn merge_has_unique_ids(local in arb_messages(), fetched in arb_messages()) {
        let merged = merge_history(&local, fetched);
        prop_assert_eq!(id_set(&merged).len(), merged.len());
    }

    #[test]
    fn merge_is_sorted(local in arb_messages(), fetched in arb_messages()) {
        let merged = merge_history(&local, fetched);
        prop_assert!(merged.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[test]
    fn merge_keeps_every_fetched_id(local in arb_messages(), fetched in arb_messages()) {
        let expected = id_set(&fetched);
        let merged = merge_history(&local, fetched);
        prop_assert!(expected.is_subset(&id_set(&merged)));
    }

    #[test]
    fn merge_drops_only_duplicates(local in arb_messages(), fetched in arb_messages()) {
        let fetched_ids = id_set(&fetched);
        let fetched_keys: HashSet<(Role, String)> = fetched
            .iter()
            .map(|m| (m.role, m.content.trim().to_string()))
            .collect();
        let merged_ids = id_set(&merge_history(&local, fetched));

        for message in &local {
            let (role, content) = message.content_key();
            let duplicate = fetched_ids.contains(&message.id)
                || fetched_keys.contains(&(role, content.to_string()));
            prop_assert!(duplicate || merged_ids.contains(&message.id));
        }
    }

    #[test]
    fn merge_again_changes_nothing(local in arb_messages(), fetched in arb_messages()) {
        let once = merge_history(&local, fetched.clone());
        let twice = merge_history(&once, fetched);
        prop_assert_eq!(id_set(&once), id_set(&twice));
        prop_assert_eq!(once.len(), twice.len());
    }

    #[test]
    fn empty_fetch_keeps_local(local in arb_messages()) {
        let merged = merge_history(&local, Vec::new());
        let expected: HashSet<String> = id_set(&local);
        prop_assert_eq!(id_set(&merged), expected);
    }
}

// ============================================================================
// Reply assembly
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn reply_is_token_concatenation(tokens in prop::collection::vec("[a-zA-Z0-9 .,!?]{1,8}", 1..10)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        let reply = runtime.block_on(async {
            let mock = MockTransport::new();
            mock.queue_session(Ok(Session::with_id("s-1")));
            let refs: Vec<&str> = tokens.iter().map(String::as_str).collect();
            mock.queue_text_reply(&refs);

            let manager = ConversationManager::new(
                mock,
                &WidgetConfig::new("agent-1", "key-1"),
                Callbacks::new(),
            );
            manager.send_message("Hi", None).await
        });

        let SendOutcome::Completed(message) = reply else {
            return Err(TestCaseError::fail("send did not complete"));
        };
        prop_assert_eq!(message.content, tokens.concat());
    }
}
