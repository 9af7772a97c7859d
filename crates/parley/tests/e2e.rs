// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end integration tests for the complete Parley pipeline.
//!
//! Each test creates an isolated TestHarness with a temp SQLite registry,
//! mock adapters and a manual clock. Tests are independent and order-insensitive.

use std::sync::Arc;
use std::time::Duration;

use parley_agent::{AbortReason, AgentLoop, CommandOutcome, DispatchOutcome};
use parley_core::{AuthRegistry, ChatId, ChatKind, ReplyRef, Role};
use parley_test_utils::{MockReply, TestHarness, group_message, private_message};
use tokio_util::sync::CancellationToken;

fn turn_texts(turns: &[parley_core::ConversationTurn]) -> Vec<String> {
    turns.iter().map(|t| t.text()).collect()
}

// ---- Private chat round trip ----

#[tokio::test]
async fn test_private_hello_gets_reply_and_two_turns() {
    let harness = TestHarness::builder()
        .with_mock_responses(vec!["hi".to_string()])
        .with_authorized(&[42])
        .build()
        .await
        .unwrap();

    let reply = harness.send_private(42, "hello").await.unwrap();
    assert_eq!(reply.as_deref(), Some("hi"));

    let context = harness
        .dispatcher
        .contexts()
        .snapshot(ChatId(42))
        .await
        .expect("context should exist");
    let turns: Vec<_> = context.turns().cloned().collect();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0].role, Role::User);
    assert_eq!(turns[0].text(), "hello");
    assert_eq!(turns[1].role, Role::Assistant);
    assert_eq!(turns[1].text(), "hi");

    let requests = harness.mock_provider.requests().await;
    assert_eq!(requests.len(), 1);
    let system = requests[0].turns[0].text();
    assert_eq!(requests[0].turns[0].role, Role::System);
    assert!(system.contains("private telegram chat"));
    assert!(system.contains("User telegram nickname is: tester."));
    assert!(!system.contains("group chat with name"));
}

#[tokio::test]
async fn test_reply_quotes_the_inbound_message() {
    let harness = TestHarness::builder()
        .with_authorized(&[42])
        .build()
        .await
        .unwrap();

    let msg = private_message(42, "hello");
    let inbound_id = msg.id.clone();
    harness.dispatch(msg).await.unwrap();

    let sent = harness.mock_channel.sent_messages().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].chat_id, ChatId(42));
    assert_eq!(sent[0].reply_to_message_id.as_deref(), Some(inbound_id.as_str()));
    assert_eq!(harness.mock_channel.typing().await, vec![ChatId(42)]);
}

// ---- Authorization ----

#[tokio::test]
async fn test_unauthorized_chat_is_ignored() {
    let harness = TestHarness::builder().build().await.unwrap();

    let outcome = harness.dispatch(private_message(99, "hello")).await.unwrap();
    assert!(matches!(
        outcome,
        DispatchOutcome::Aborted {
            reason: AbortReason::Unauthorized,
            ..
        }
    ));
    assert!(!harness.dispatcher.contexts().contains(ChatId(99)));
    assert!(harness.mock_provider.requests().await.is_empty());
    assert_eq!(harness.mock_channel.sent_count().await, 0);
}

#[tokio::test]
async fn test_register_unregister_flow() {
    let harness = TestHarness::builder()
        .with_registration_secret("s3cret")
        .build()
        .await
        .unwrap();

    let denied = harness.dispatch(private_message(7, "/register nope")).await.unwrap();
    assert!(matches!(
        denied,
        DispatchOutcome::Aborted {
            reason: AbortReason::RegistrationDenied,
            ..
        }
    ));
    assert!(!harness.registry.is_authorized(ChatId(7)).await.unwrap());
    assert_eq!(harness.mock_channel.sent_count().await, 0);

    let registered = harness.dispatch(private_message(7, "/register s3cret")).await.unwrap();
    assert_eq!(registered, DispatchOutcome::Command(CommandOutcome::Registered));
    assert!(harness.registry.is_authorized(ChatId(7)).await.unwrap());

    let reply = harness.send_private(7, "hello").await.unwrap();
    assert_eq!(reply.as_deref(), Some("mock response"));

    let unregistered = harness.dispatch(private_message(7, "/unregister")).await.unwrap();
    assert_eq!(unregistered, DispatchOutcome::Command(CommandOutcome::Unregistered));
    assert!(!harness.registry.is_authorized(ChatId(7)).await.unwrap());
    assert!(!harness.dispatcher.contexts().contains(ChatId(7)));

    assert_eq!(harness.send_private(7, "still there?").await.unwrap(), None);
}

#[tokio::test]
async fn test_clear_drops_history() {
    let harness = TestHarness::builder()
        .with_authorized(&[5])
        .build()
        .await
        .unwrap();

    harness.send_private(5, "remember this").await.unwrap();
    let cleared = harness.dispatch(private_message(5, "/clear")).await.unwrap();
    assert_eq!(cleared, DispatchOutcome::Command(CommandOutcome::Cleared));

    harness.send_private(5, "fresh start").await.unwrap();
    let requests = harness.mock_provider.requests().await;
    assert_eq!(turn_texts(&requests[1].turns[1..]), vec!["fresh start"]);
}

// ---- Context window ----

#[tokio::test]
async fn test_capacity_two_keeps_most_recent_turns() {
    let harness = TestHarness::builder()
        .with_mock_responses(vec!["A1".to_string(), "A2".to_string()])
        .with_context_length(2)
        .with_authorized(&[1])
        .build()
        .await
        .unwrap();

    harness.send_private(1, "U1").await.unwrap();
    harness.send_private(1, "U2").await.unwrap();

    let requests = harness.mock_provider.requests().await;
    assert_eq!(requests[1].turns[0].role, Role::System);
    assert_eq!(turn_texts(&requests[1].turns[1..]), vec!["A1", "U2"]);

    let context = harness.dispatcher.contexts().snapshot(ChatId(1)).await.unwrap();
    let texts: Vec<String> = context.turns().map(|t| t.text()).collect();
    assert_eq!(texts, vec!["U2", "A2"]);
}

#[tokio::test]
async fn test_context_expires_at_exact_timeout() {
    let harness = TestHarness::builder()
        .with_context_timeout(600)
        .with_authorized(&[3])
        .build()
        .await
        .unwrap();

    harness.send_private(3, "first").await.unwrap();
    harness.advance_secs(599);
    harness.send_private(3, "second").await.unwrap();
    harness.advance_secs(600);
    harness.send_private(3, "third").await.unwrap();

    let requests = harness.mock_provider.requests().await;
    assert_eq!(
        turn_texts(&requests[1].turns[1..]),
        vec!["first", "mock response", "second"]
    );
    assert_eq!(turn_texts(&requests[2].turns[1..]), vec!["third"]);
}

// ---- Provider failures ----

#[tokio::test]
async fn test_rate_limit_keeps_only_user_turn() {
    let harness = TestHarness::builder()
        .with_authorized(&[8])
        .build()
        .await
        .unwrap();
    harness.mock_provider.push(MockReply::RateLimited).await;

    let outcome = harness.dispatch(private_message(8, "hello")).await.unwrap();
    assert!(matches!(
        outcome,
        DispatchOutcome::Aborted {
            reason: AbortReason::RateLimited,
            ..
        }
    ));

    let sent = harness.mock_channel.sent_messages().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].text, harness.config.agent.rate_limit_reply);

    let context = harness.dispatcher.contexts().snapshot(ChatId(8)).await.unwrap();
    assert_eq!(context.len(), 1);
    assert_eq!(context.turns().next().map(|t| t.role), Some(Role::User));
}

#[tokio::test]
async fn test_empty_completion_sends_error_reply() {
    let harness = TestHarness::builder()
        .with_authorized(&[8])
        .build()
        .await
        .unwrap();
    harness.mock_provider.push(MockReply::Empty).await;

    let reply = harness.send_private(8, "hello").await.unwrap();
    assert_eq!(reply.as_deref(), Some(harness.config.agent.error_reply.as_str()));
    let context = harness.dispatcher.contexts().snapshot(ChatId(8)).await.unwrap();
    assert_eq!(context.len(), 1);
}

// ---- Group chats ----

#[tokio::test]
async fn test_group_trigger_is_stripped_and_roster_grows() {
    let harness = TestHarness::builder()
        .with_bot_name("Parley")
        .with_authorized(&[-100])
        .build()
        .await
        .unwrap();

    let ignored = harness
        .dispatch(group_message(-100, "alice", "just chatting"))
        .await
        .unwrap();
    assert!(matches!(
        ignored,
        DispatchOutcome::Aborted {
            reason: AbortReason::NotAddressed,
            ..
        }
    ));

    harness
        .dispatch(group_message(-100, "alice", "!ai what's new?"))
        .await
        .unwrap();
    harness
        .dispatch(group_message(-100, "bob", "!ai and with you?"))
        .await
        .unwrap();

    let requests = harness.mock_provider.requests().await;
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].turns[1].text(), "what's new?");

    let system = requests[1].turns[0].text();
    assert!(system.contains("Your name is: Parley"));
    assert!(system.contains("You are member of group chat with name: test group"));
    assert!(system.contains("nicknamed as: bob"));
    assert!(system.contains("alice"));
}

#[tokio::test]
async fn test_group_reply_to_bot_is_answered() {
    let harness = TestHarness::builder()
        .with_authorized(&[-100])
        .build()
        .await
        .unwrap();

    let mut to_bot = group_message(-100, "alice", "thanks, and more?");
    to_bot.reply_to = Some(ReplyRef {
        sender_id: Some(777),
        to_self: true,
    });
    let mut to_other = group_message(-100, "alice", "agreed");
    to_other.reply_to = Some(ReplyRef {
        sender_id: Some(1001),
        to_self: false,
    });

    assert!(matches!(
        harness.dispatch(to_bot).await.unwrap(),
        DispatchOutcome::Delivered { .. }
    ));
    assert!(matches!(
        harness.dispatch(to_other).await.unwrap(),
        DispatchOutcome::Aborted {
            reason: AbortReason::ForeignReply,
            ..
        }
    ));
}

#[tokio::test]
async fn test_channel_posts_are_never_served() {
    let harness = TestHarness::builder()
        .with_authorized(&[-200])
        .build()
        .await
        .unwrap();

    let mut post = private_message(-200, "announcement");
    post.chat_kind = ChatKind::Channel;
    let outcome = harness.dispatch(post).await.unwrap();
    assert!(matches!(
        outcome,
        DispatchOutcome::Aborted {
            reason: AbortReason::UnsupportedChat,
            ..
        }
    ));
    assert!(harness.mock_provider.requests().await.is_empty());
}

// ---- Agent loop over the harness ----

#[tokio::test]
async fn test_agent_loop_serves_injected_messages() {
    let harness = TestHarness::builder()
        .with_authorized(&[1, 2])
        .build()
        .await
        .unwrap();

    harness.mock_channel.inject_message(private_message(1, "one")).await;
    harness.mock_channel.inject_message(private_message(2, "two")).await;
    harness.mock_channel.inject_message(private_message(99, "nobody")).await;

    let mut agent = AgentLoop::new(
        harness.mock_channel.clone(),
        Arc::clone(&harness.dispatcher),
        &harness.config.context,
    );
    let cancel = CancellationToken::new();
    let run = tokio::spawn({
        let cancel = cancel.clone();
        async move { agent.run(cancel).await }
    });

    assert!(
        harness
            .mock_channel
            .wait_for_sent(2, Duration::from_secs(5))
            .await
    );
    cancel.cancel();
    run.await.unwrap().unwrap();

    let mut chats: Vec<ChatId> = harness
        .mock_channel
        .sent_messages()
        .await
        .into_iter()
        .map(|m| m.chat_id)
        .collect();
    chats.sort();
    assert_eq!(chats, vec![ChatId(1), ChatId(2)]);
}
