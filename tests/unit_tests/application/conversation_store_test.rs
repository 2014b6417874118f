use std::sync::Arc;
use std::time::Duration;

use ragchat::application::services::{ConversationError, ConversationStore, derive_title};
use ragchat::domain::{ConversationId, DEFAULT_CONVERSATION_TITLE, MessageRole};
use ragchat::infrastructure::persistence::InMemoryConversationRepository;

fn store() -> ConversationStore {
    ConversationStore::new(Arc::new(InMemoryConversationRepository::new()))
}

#[tokio::test]
async fn given_new_conversation_when_reading_history_then_it_is_empty_and_untitled() {
    let store = store();

    let conversation = store.create("alice").await.unwrap();
    let history = store.history(conversation.id, "alice").await.unwrap();

    assert!(history.is_empty());
    assert_eq!(conversation.title, None);
    assert_eq!(conversation.display_title(), DEFAULT_CONVERSATION_TITLE);
}

#[tokio::test]
async fn given_two_conversations_when_created_then_ids_differ() {
    let store = store();

    let first = store.create("alice").await.unwrap();
    let second = store.create("alice").await.unwrap();

    assert_ne!(first.id, second.id);
}

#[tokio::test]
async fn given_appends_when_reading_history_then_order_and_positions_match() {
    let store = store();
    let conversation = store.create("alice").await.unwrap();

    let first = store
        .append_message(conversation.id, MessageRole::User, "Hi".to_string())
        .await
        .unwrap();
    let second = store
        .append_message(conversation.id, MessageRole::Assistant, "Hello!".to_string())
        .await
        .unwrap();

    assert_eq!(first.position, 0);
    assert_eq!(second.position, 1);

    let history = store.history(conversation.id, "alice").await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].content, "Hi");
    assert!(history[0].role.is_user());
    assert_eq!(history[1].content, "Hello!");
    assert_eq!(history[1].role, MessageRole::Assistant);
}

#[tokio::test]
async fn given_unknown_conversation_when_appending_then_not_found() {
    let store = store();
    let missing = ConversationId::new();

    let result = store
        .append_message(missing, MessageRole::User, "Hi".to_string())
        .await;

    assert!(matches!(result, Err(ConversationError::NotFound(id)) if id == missing));
}

#[tokio::test]
async fn given_unknown_conversation_when_getting_then_not_found() {
    let store = store();

    let result = store.get(ConversationId::new(), "alice").await;

    assert!(matches!(result, Err(ConversationError::NotFound(_))));
}

#[tokio::test]
async fn given_conversation_of_other_owner_when_reading_then_not_found() {
    let store = store();
    let conversation = store.create("alice").await.unwrap();

    let history = store.history(conversation.id, "bob").await;
    let title = store.set_title(conversation.id, "bob", "stolen").await;

    assert!(matches!(history, Err(ConversationError::NotFound(_))));
    assert!(matches!(title, Err(ConversationError::NotFound(_))));
    let unchanged = store.get(conversation.id, "alice").await.unwrap();
    assert_eq!(unchanged.title, None);
}

#[tokio::test]
async fn given_concurrent_appends_to_different_conversations_when_reading_then_each_history_is_gapless() {
    let store = Arc::new(store());
    let first = store.create("alice").await.unwrap().id;
    let second = store.create("alice").await.unwrap().id;

    let mut tasks = Vec::new();
    for id in [first, second] {
        let store = store.clone();
        tasks.push(tokio::spawn(async move {
            for i in 0..50 {
                store
                    .append_message(id, MessageRole::User, format!("{}-{}", id, i))
                    .await
                    .unwrap();
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    for id in [first, second] {
        let history = store.history(id, "alice").await.unwrap();
        assert_eq!(history.len(), 50);
        for (i, message) in history.iter().enumerate() {
            assert_eq!(message.position, i);
            assert_eq!(message.content, format!("{}-{}", id, i));
            assert_eq!(message.conversation_id, id);
        }
    }
}

#[tokio::test]
async fn given_concurrent_appends_to_same_conversation_when_reading_then_positions_are_unique() {
    let store = Arc::new(store());
    let id = store.create("alice").await.unwrap().id;

    let mut tasks = Vec::new();
    for writer in 0..8 {
        let store = store.clone();
        tasks.push(tokio::spawn(async move {
            let mut positions = Vec::new();
            for i in 0..10 {
                let message = store
                    .append_message(id, MessageRole::User, format!("w{}-{}", writer, i))
                    .await
                    .unwrap();
                positions.push(message.position);
            }
            positions
        }));
    }

    let mut all_positions = Vec::new();
    for task in tasks {
        let positions = task.await.unwrap();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        all_positions.extend(positions);
    }
    all_positions.sort_unstable();

    assert_eq!(all_positions, (0..80).collect::<Vec<_>>());
    let history = store.history(id, "alice").await.unwrap();
    assert_eq!(history.len(), 80);
}

#[tokio::test]
async fn given_several_conversations_when_listing_then_most_recently_updated_comes_first() {
    let store = store();
    let older = store.create("alice").await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    let newer = store.create("alice").await.unwrap();
    store.create("bob").await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;

    store
        .append_message(older.id, MessageRole::User, "bump".to_string())
        .await
        .unwrap();

    let listed = store.list("alice").await.unwrap();

    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].id, older.id);
    assert_eq!(listed[1].id, newer.id);
    assert_eq!(listed[1].title, DEFAULT_CONVERSATION_TITLE);
}

#[tokio::test]
async fn given_title_when_set_then_listing_shows_it() {
    let store = store();
    let conversation = store.create("alice").await.unwrap();

    store
        .set_title(conversation.id, "alice", "Returns")
        .await
        .unwrap();

    let listed = store.list("alice").await.unwrap();
    assert_eq!(listed[0].title, "Returns");
}

#[test]
fn given_short_message_when_deriving_title_then_whitespace_is_collapsed() {
    assert_eq!(derive_title("  What is\n the   return policy? "), "What is the return policy?");
}

#[test]
fn given_long_message_when_deriving_title_then_cut_on_word_boundary() {
    let title = derive_title(
        "Could you please explain in detail how the warranty interacts with the return policy",
    );

    assert!(title.ends_with("..."));
    let body = title.trim_end_matches("...");
    assert!(body.chars().count() <= 50);
    assert!(!body.ends_with(' '));
    assert!("Could you please explain in detail how the warranty".starts_with(body));
}

#[test]
fn given_blank_message_when_deriving_title_then_default_title() {
    assert_eq!(derive_title("   \n\t"), DEFAULT_CONVERSATION_TITLE);
}

#[tokio::test]
async fn given_very_long_conversation_when_reading_history_then_every_message_is_returned() {
    let store = store();
    let conversation = store.create("alice").await.unwrap();
    let total = 10_050;

    for i in 0..total {
        let role = if i % 2 == 0 {
            MessageRole::User
        } else {
            MessageRole::Assistant
        };
        store
            .append_message(conversation.id, role, format!("message {i}"))
            .await
            .unwrap();
    }

    let history = store.history(conversation.id, "alice").await.unwrap();
    assert_eq!(history.len(), total);
    assert!(history.iter().enumerate().all(|(i, m)| m.position == i));
    assert_eq!(history[0].content, "message 0");
    assert_eq!(history[total - 1].content, format!("message {}", total - 1));
}
