//! End-to-end pipeline tests against a scripted model.
//!
//! These exercise the full orchestration path — history handling, chain
//! inputs, streaming, persistence — with the mock model injected through
//! the resolver override, exactly as the keyless development path wires it.

use std::sync::Arc;

use futures::StreamExt;
use pagetutor::llm::mock::MockChatModel;
use pagetutor::{AppConfig, CredentialStore, Explainer, HistoryStore, ModelResolver};

fn pipeline(
    dir: &tempfile::TempDir,
    model: Arc<MockChatModel>,
) -> (Explainer, HistoryStore) {
    let config = AppConfig::builder().data_dir(dir.path()).build().unwrap();
    let history = HistoryStore::new(config.history_path());
    let resolver = ModelResolver::new(CredentialStore::in_memory(), 2)
        .with_override(model as Arc<dyn pagetutor::ChatModel>);
    (Explainer::new(resolver, history.clone(), &config), history)
}

async fn drain(mut stream: pagetutor::TokenStream) -> String {
    let mut text = String::new();
    while let Some(item) = stream.next().await {
        text.push_str(&item.expect("stream should not fail"));
    }
    text
}

/// The full upload scenario: a one-page PDF whose structural extraction
/// produced "Hello world", a fresh (non-follow-up) conversation, a scripted
/// expert response streamed in fragments.
#[tokio::test]
async fn fresh_conversation_streams_and_records_one_turn() {
    let dir = tempfile::tempdir().unwrap();
    let model = Arc::new(MockChatModel::streaming([
        "This page ",
        "is a greeting ",
        "example.",
    ]));
    let (explainer, history) = pipeline(&dir, Arc::clone(&model));

    // Stale history from an earlier conversation must not survive.
    history.append("stale prompt", "stale answer").await.unwrap();

    let stream = explainer
        .stream_explanation("What does this mean?", "Hello world", false)
        .await
        .unwrap();
    let text = drain(stream).await;

    assert_eq!(text, "This page is a greeting example.");

    let transcript = history.read().await.unwrap();
    assert_eq!(
        transcript,
        "User: What does this mean?\n\nAgent: This page is a greeting example.\n\n"
    );

    // The extracted page text reached the chain.
    let messages = model.last_messages().unwrap();
    assert!(messages[1].content.contains("Hello world"));
    assert!(!messages[1].content.contains("stale prompt"));
}

#[tokio::test]
async fn follow_up_accumulates_turns_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let model = Arc::new(MockChatModel::replying("second answer"));
    let (explainer, history) = pipeline(&dir, Arc::clone(&model));

    history.append("first question", "first answer").await.unwrap();

    let stream = explainer
        .stream_explanation("second question", "Hello world", true)
        .await
        .unwrap();
    drain(stream).await;

    let transcript = history.read().await.unwrap();
    assert_eq!(
        transcript,
        "User: first question\n\nAgent: first answer\n\n\
         User: second question\n\nAgent: second answer\n\n"
    );

    // Prior turns were forwarded into the chain inputs.
    let messages = model.last_messages().unwrap();
    assert!(messages[1].content.contains("User: first question"));
}

#[tokio::test]
async fn consecutive_fresh_conversations_never_accumulate() {
    let dir = tempfile::tempdir().unwrap();
    let model = Arc::new(MockChatModel::replying("answer"));
    let (explainer, history) = pipeline(&dir, model);

    for round in 0..3 {
        let prompt = format!("question {round}");
        let stream = explainer
            .stream_explanation(&prompt, "page", false)
            .await
            .unwrap();
        drain(stream).await;

        let transcript = history.read().await.unwrap();
        assert_eq!(transcript, format!("User: {prompt}\n\nAgent: answer\n\n"));
    }
}
