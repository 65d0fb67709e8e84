use std::sync::Arc;
use std::time::Duration;

use core_test_support::CountingEmbedder;
use core_test_support::PARAGRAPH_TWO;
use core_test_support::ScriptedCompletion;
use core_test_support::test_config;
use core_test_support::transient;
use core_test_support::two_paragraph_resume;
use pretty_assertions::assert_eq;
use resumebot_core::RagConfig;
use resumebot_core::RagError;
use resumebot_core::RetrievalOrchestrator;
use resumebot_core::ServiceFailure;

const QUESTION: &str = "What did she study at the University of Coimbra?";

fn build(
    config: RagConfig,
    completion: Arc<ScriptedCompletion>,
) -> (RetrievalOrchestrator, Arc<CountingEmbedder>) {
    let embedder = CountingEmbedder::new(256);
    let orchestrator = RetrievalOrchestrator::new(config, embedder.clone(), completion).unwrap();
    (orchestrator, embedder)
}

#[tokio::test]
async fn top_chunk_comes_from_second_paragraph_and_answer_is_cached() {
    let completion = ScriptedCompletion::answering("Distributed systems.");
    let (orchestrator, embedder) = build(test_config(), completion.clone());

    let report = orchestrator.ingest(&two_paragraph_resume()).await.unwrap();
    assert_eq!(report.chunks, 6);
    assert_eq!(embedder.calls(), 6);

    let answer = orchestrator.ask(QUESTION).await.unwrap();
    assert_eq!(answer.text, "Distributed systems.");
    assert!(!answer.from_cache);
    assert_eq!(answer.sources.len(), 1);
    let top = &answer.sources[0];
    assert!(
        PARAGRAPH_TWO.contains(top.text.as_str()),
        "top chunk {:?} is not from paragraph two",
        top.text
    );

    let key = orchestrator.question_key("what did she   study at the university of coimbra?");
    assert!(orchestrator.response_cache().contains(&key));
    assert_eq!(
        orchestrator.response_cache().get(&key).as_deref(),
        Some("Distributed systems.")
    );

    let prompts = completion.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains(QUESTION));
    assert!(prompts[0].contains(top.text.as_str()));
}

#[tokio::test(start_paused = true)]
async fn cached_answer_expires_after_ttl() {
    let completion = ScriptedCompletion::answering("Coimbra.");
    let config = RagConfig {
        cache_ttl_secs: 60,
        ..test_config()
    };
    let (orchestrator, _) = build(config, completion.clone());
    orchestrator.ingest(&two_paragraph_resume()).await.unwrap();

    orchestrator.ask(QUESTION).await.unwrap();
    tokio::time::advance(Duration::from_secs(30)).await;
    let cached = orchestrator.ask(QUESTION).await.unwrap();
    assert!(cached.from_cache);
    assert_eq!(completion.calls(), 1);

    tokio::time::advance(Duration::from_secs(31)).await;
    let fresh = orchestrator.ask(QUESTION).await.unwrap();
    assert!(!fresh.from_cache);
    assert_eq!(completion.calls(), 2);
    assert_eq!(orchestrator.stats().response_cache.expirations, 1);
}

#[tokio::test]
async fn question_matching_a_chunk_reuses_its_embedding_and_ranks_it_first() {
    let completion = ScriptedCompletion::answering("ok");
    let (orchestrator, embedder) = build(test_config(), completion);
    orchestrator.ingest(&two_paragraph_resume()).await.unwrap();
    let entries = orchestrator.snapshot_entries().unwrap();
    let target = &entries[4];

    let answer = orchestrator.ask(&target.text).await.unwrap();

    assert_eq!(embedder.calls(), entries.len());
    assert_eq!(answer.sources[0].id, target.id);
    assert!((answer.sources[0].score - 1.0).abs() < 1e-5);
}

#[tokio::test]
async fn embedding_failure_is_retrieval_failure() {
    let completion = ScriptedCompletion::answering("unused");
    let (orchestrator, embedder) = build(test_config(), completion.clone());
    orchestrator.ingest(&two_paragraph_resume()).await.unwrap();

    embedder.set_failing(true);
    let err = orchestrator.ask("Where does Maria live?").await.unwrap_err();
    assert!(matches!(err, RagError::RetrievalFailed(_)), "{err:?}");
    assert_eq!(completion.calls(), 0);
}

#[tokio::test]
async fn ingestion_propagates_embedding_failure() {
    let completion = ScriptedCompletion::answering("unused");
    let (orchestrator, embedder) = build(test_config(), completion);
    embedder.set_failing(true);

    let err = orchestrator.ingest(&two_paragraph_resume()).await.unwrap_err();
    assert!(matches!(err, RagError::EmbeddingService(_)));
    assert!(!orchestrator.health().ready);

    embedder.set_failing(false);
    orchestrator.ingest(&two_paragraph_resume()).await.unwrap();
    assert!(orchestrator.health().ready);
}

#[tokio::test(start_paused = true)]
async fn transient_failures_are_retried_then_succeed() {
    let completion = ScriptedCompletion::scripted(
        vec![transient("503"), transient("connection reset")],
        Ok("Eventually.".to_string()),
    );
    let config = RagConfig {
        gemini_max_retries: 3,
        ..test_config()
    };
    let (orchestrator, _) = build(config, completion.clone());
    orchestrator.ingest(&two_paragraph_resume()).await.unwrap();

    let answer = orchestrator.ask(QUESTION).await.unwrap();
    assert_eq!(answer.text, "Eventually.");
    assert_eq!(completion.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_are_reported_and_not_cached() {
    let completion = ScriptedCompletion::scripted(Vec::new(), transient("503"));
    let config = RagConfig {
        gemini_max_retries: 3,
        ..test_config()
    };
    let (orchestrator, _) = build(config, completion.clone());
    orchestrator.ingest(&two_paragraph_resume()).await.unwrap();

    let err = orchestrator.ask(QUESTION).await.unwrap_err();
    assert!(matches!(
        err,
        RagError::InferenceRetriesExhausted { attempts: 3, .. }
    ));
    assert!(err.is_retryable());
    assert_eq!(completion.calls(), 3);
    assert!(!orchestrator
        .response_cache()
        .contains(&orchestrator.question_key(QUESTION)));
}

#[tokio::test]
async fn rejection_fails_immediately() {
    let completion = ScriptedCompletion::scripted(
        Vec::new(),
        Err(ServiceFailure::Rejected("API key not valid".to_string())),
    );
    let (orchestrator, _) = build(test_config(), completion.clone());
    orchestrator.ingest(&two_paragraph_resume()).await.unwrap();

    let err = orchestrator.ask(QUESTION).await.unwrap_err();
    assert!(matches!(err, RagError::InferenceService(_)));
    assert!(!err.is_retryable());
    assert_eq!(completion.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn completion_rate_limit_denies_the_extra_request() {
    let completion = ScriptedCompletion::answering("fine");
    let config = RagConfig {
        rate_limit: 2,
        rate_limit_period_secs: 60,
        ..test_config()
    };
    let (orchestrator, _) = build(config, completion.clone());
    orchestrator.ingest(&two_paragraph_resume()).await.unwrap();

    orchestrator.ask("first question").await.unwrap();
    orchestrator.ask("second question").await.unwrap();
    let err = orchestrator.ask("third question").await.unwrap_err();
    assert!(matches!(err, RagError::RateLimitExceeded { .. }));
    assert_eq!(err.status().http_status(), 429);
    assert_eq!(completion.calls(), 2);

    // Cached answers need no permit.
    assert!(orchestrator.ask("first question").await.unwrap().from_cache);

    tokio::time::advance(Duration::from_secs(60)).await;
    orchestrator.ask("third question").await.unwrap();
    assert_eq!(completion.calls(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_asks_interleave_safely() {
    let completion = ScriptedCompletion::slow("answer", Duration::from_millis(20));
    let (orchestrator, _) = build(test_config(), completion.clone());
    let orchestrator = Arc::new(orchestrator);
    orchestrator.ingest(&two_paragraph_resume()).await.unwrap();

    let questions = ["Where does Maria live?", "Which languages?", "Which year?"];
    let handles: Vec<_> = (0..30)
        .map(|i| orchestrator.spawn_ask(questions[i % questions.len()]))
        .collect();
    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap().text, "answer");
    }

    let stats = orchestrator.stats();
    assert_eq!(stats.response_cache.size, questions.len());
    assert_eq!(
        stats.response_cache.hits + stats.response_cache.misses,
        30
    );
    assert!(completion.calls() >= questions.len());
}

#[tokio::test]
async fn ask_before_ingestion_is_not_ready() {
    let completion = ScriptedCompletion::answering("unused");
    let (orchestrator, embedder) = build(test_config(), completion);
    let err = orchestrator.ask(QUESTION).await.unwrap_err();
    assert!(matches!(err, RagError::EmptyIndex));
    assert_eq!(err.status().http_status(), 503);
    assert_eq!(embedder.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn aborted_ask_leaves_caches_consistent() {
    let completion = ScriptedCompletion::slow("Distributed systems.", Duration::from_secs(5));
    let (orchestrator, embedder) = build(test_config(), completion.clone());
    let orchestrator = Arc::new(orchestrator);
    orchestrator.ingest(&two_paragraph_resume()).await.unwrap();
    let chunk_embeddings = embedder.calls();

    let handle = orchestrator.spawn_ask(QUESTION);
    while completion.calls() == 0 {
        tokio::task::yield_now().await;
    }
    // The completion call is now sleeping.
    let responses_before = orchestrator.stats().response_cache;
    handle.abort();
    assert!(handle.await.unwrap_err().is_cancelled());

    let key = orchestrator.question_key(QUESTION);
    assert!(!orchestrator.response_cache().contains(&key));
    assert_eq!(orchestrator.stats().response_cache, responses_before);
    assert_eq!(embedder.calls(), chunk_embeddings + 1);

    let answer = orchestrator.ask(QUESTION).await.unwrap();
    assert_eq!(answer.text, "Distributed systems.");
    assert!(!answer.from_cache);
    // The question vector survived the abort.
    assert_eq!(embedder.calls(), chunk_embeddings + 1);
    assert_eq!(completion.calls(), 2);
    assert!(orchestrator.response_cache().contains(&key));
}

#[tokio::test]
async fn huge_cache_ttl_is_accepted() {
    let completion = ScriptedCompletion::answering("Coimbra.");
    let config = RagConfig {
        cache_ttl_secs: u64::MAX,
        ..test_config()
    };
    let (orchestrator, _) = build(config, completion.clone());
    orchestrator.ingest(&two_paragraph_resume()).await.unwrap();

    assert!(!orchestrator.ask(QUESTION).await.unwrap().from_cache);
    assert!(orchestrator.ask(QUESTION).await.unwrap().from_cache);
    assert_eq!(completion.calls(), 1);
}
