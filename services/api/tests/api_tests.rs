//! Integration tests for the HTTP surface.
//!
//! The router runs over the in-memory datastore with scripted completion and
//! embedding services, so no PostgreSQL or vendor API is needed.

use api_lib::config::Config;
use api_lib::web::{build_router, state::AppState};
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{Duration, Utc};
use hadith_core::domain::ProgressStatus;
use hadith_core::memory::{sample_hadith, InMemoryStore};
use hadith_core::ports::{
    CompletionRequest, CompletionService, DatabaseService, EmbeddingService, PortError,
    PortResult, TextStream,
};
use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha2::Sha256;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tower::util::ServiceExt; // for `oneshot` method
use uuid::Uuid;

const WEBHOOK_KEY: &[u8] = b"integration-signing-key";

//=========================================================================================
// Fakes and Helpers
//=========================================================================================

/// Answers every completion with the same text; streams it word by word.
struct ScriptedCompletion {
    reply: Option<String>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedCompletion {
    fn last_prompt(&self) -> String {
        self.prompts.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl CompletionService for ScriptedCompletion {
    async fn complete(&self, request: CompletionRequest) -> PortResult<String> {
        self.prompts.lock().unwrap().push(request.prompt);
        self.reply
            .clone()
            .ok_or_else(|| PortError::Unexpected("DeepSeek API error: 503".to_string()))
    }

    async fn complete_streaming(&self, request: CompletionRequest) -> PortResult<TextStream> {
        let reply = self.complete(request).await?;
        let words: Vec<PortResult<String>> = reply
            .split_inclusive(' ')
            .map(|w| Ok(w.to_string()))
            .collect();
        Ok(Box::pin(futures::stream::iter(words)))
    }
}

struct FixedEmbedder {
    vector: Vec<f32>,
    calls: AtomicUsize,
}

#[async_trait]
impl EmbeddingService for FixedEmbedder {
    async fn embed(&self, _text: &str) -> PortResult<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.vector.clone())
    }
}

struct TestApp {
    store: Arc<InMemoryStore>,
    embedder: Arc<FixedEmbedder>,
    completion: Arc<ScriptedCompletion>,
    router: Router,
}

impl TestApp {
    async fn send(&self, request: Request<Body>) -> (StatusCode, Vec<u8>, axum::http::HeaderMap) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Should read body");
        (status, bytes.to_vec(), headers)
    }

    async fn json(&self, request: Request<Body>) -> (StatusCode, Value) {
        let (status, bytes, _) = self.send(request).await;
        let body = serde_json::from_slice(&bytes).expect("Should parse JSON");
        (status, body)
    }

    /// Stores a live session for `user_id` and returns the matching cookie header.
    async fn sign_in(&self, user_id: &str) -> String {
        let session_id = format!("session-{}", user_id);
        self.store
            .create_auth_session(&session_id, user_id, Utc::now() + Duration::days(1))
            .await
            .unwrap();
        format!("session={}", session_id)
    }
}

fn config(webhook_secret: Option<String>) -> Config {
    Config::from_lookup(move |key| match key {
        "DATABASE_URL" => Some("postgres://unused/hadith".to_string()),
        "DEEPSEEK_API_KEY" => Some("sk-test".to_string()),
        "CLERK_WEBHOOK_SECRET" => webhook_secret.clone(),
        _ => None,
    })
    .unwrap()
}

fn webhook_secret() -> String {
    format!("whsec_{}", STANDARD.encode(WEBHOOK_KEY))
}

fn setup_app_with(reply: Option<&str>, webhook_secret: Option<String>) -> TestApp {
    let store = Arc::new(InMemoryStore::new());
    let embedder = Arc::new(FixedEmbedder {
        vector: vec![1.0, 0.0, 0.0],
        calls: AtomicUsize::new(0),
    });
    let completion = Arc::new(ScriptedCompletion {
        reply: reply.map(str::to_string),
        prompts: Mutex::new(Vec::new()),
    });
    let state = AppState::new(
        Arc::new(config(webhook_secret)),
        store.clone(),
        completion.clone(),
        embedder.clone(),
    );
    TestApp {
        store,
        embedder,
        completion,
        router: build_router(Arc::new(state)),
    }
}

fn setup_app(reply: &str) -> TestApp {
    setup_app_with(Some(reply), Some(webhook_secret()))
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn get_with_cookie(uri: &str, cookie: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::COOKIE, cookie)
        .body(Body::empty())
        .unwrap()
}

fn json_request(method: &str, uri: &str, body: Value, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn signed_webhook(body: &str, timestamp: i64, key: &[u8]) -> Request<Body> {
    let mut mac = Hmac::<Sha256>::new_from_slice(key).unwrap();
    mac.update(format!("msg_1.{}.{}", timestamp, body).as_bytes());
    let signature = STANDARD.encode(mac.finalize().into_bytes());
    Request::builder()
        .method("POST")
        .uri("/api/webhook/clerk")
        .header(header::CONTENT_TYPE, "application/json")
        .header("svix-id", "msg_1")
        .header("svix-timestamp", timestamp.to_string())
        .header("svix-signature", format!("v1,{}", signature))
        .body(Body::from(body.to_string()))
        .unwrap()
}

const QUIZ_REPLY: &str = r#"```json
[
  {"question": "Who narrated the hadith?", "options": ["Abu Hurairah", "Aisha", "Anas", "Umar"], "correctAnswer": "A", "explanation": "He is named in the chain."},
  {"question": "What is encouraged?", "options": ["Anger", "Mercy", "Pride", "Haste"], "correctAnswer": "Mercy", "explanation": "The text praises mercy."},
  {"question": "Which book?", "options": ["Muslim", "Tirmidhi", "Bukhari", "Abu Dawud"], "correctAnswer": "C", "explanation": "It is recorded in Bukhari."}
]
```"#;

//=========================================================================================
// Health and Search
//=========================================================================================

#[tokio::test]
async fn health_endpoint_answers_with_an_envelope() {
    let app = setup_app("unused");
    let (status, body) = app.json(get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
}

#[tokio::test]
async fn search_without_a_query_is_a_bad_request() {
    let app = setup_app("unused");
    let (status, body) = app.json(get("/api/hadiths/search")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "success": false, "error": "Search query is required" }));
}

#[tokio::test]
async fn search_rejects_unknown_types_and_non_numeric_paging() {
    let app = setup_app("unused");

    let (status, body) = app.json(get("/api/hadiths/search?q=mercy&type=fuzzy")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (status, body) = app.json(get("/api/hadiths/search?q=mercy&limit=ten")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn search_with_an_out_of_range_page_is_a_bad_request() {
    let app = setup_app("unused");
    app.store.insert_hadith(sample_hadith("Bukhari", "Show mercy."));

    let (status, body) = app
        .json(get("/api/hadiths/search?q=mercy&page=9223372036854775807"))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "success": false, "error": "page is out of range" }));
}

#[tokio::test]
async fn keyword_search_only_returns_rows_containing_the_term() {
    let app = setup_app("unused");
    app.store
        .insert_hadith(sample_hadith("Bukhari", "Allah is merciful to those who show MERCY."));
    app.store
        .insert_hadith(sample_hadith("Muslim", "Actions are judged by intentions."));
    let mut by_narrator = sample_hadith("Tirmidhi", "The strong one controls anger.");
    by_narrator.narrated_by = "Jarir, on mercy".to_string();
    app.store.insert_hadith(by_narrator);

    let (status, body) = app
        .json(get("/api/hadiths/search?q=mercy&type=text"))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let rows = body["data"].as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["book_name"], "Bukhari");
    assert_eq!(rows[1]["book_name"], "Tirmidhi");
    assert!(rows.iter().all(|r| r.get("similarity").is_none()));
    assert_eq!(app.embedder.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn semantic_search_embeds_once_and_ranks_in_the_datastore() {
    let app = setup_app("unused");
    let mut close = sample_hadith("Bukhari", "Be merciful to those on earth.");
    close.embedding = Some(vec![1.0, 0.0, 0.0]);
    let mut far = sample_hadith("Muslim", "Cleanliness is half of faith.");
    far.embedding = Some(vec![0.0, 1.0, 0.0]);
    app.store.insert_hadith(close);
    app.store.insert_hadith(far);

    let (status, body) = app
        .json(get("/api/hadiths/search?q=compassion&type=semantic&limit=5"))
        .await;

    assert_eq!(status, StatusCode::OK);
    let rows = body["data"].as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["book_name"], "Bukhari");
    assert!(rows[0]["similarity"].as_f64().unwrap() > 0.99);
    assert_eq!(app.embedder.calls.load(Ordering::SeqCst), 1);
    assert_eq!(app.store.match_calls(), 1);
}

#[tokio::test]
async fn backfill_stores_the_embedding_or_reports_an_unknown_hadith() {
    let app = setup_app("unused");
    let hadith = sample_hadith("Bukhari", "Smiling at your brother is charity.");
    let id = hadith.id;
    app.store.insert_hadith(hadith);

    let (status, _) = app
        .json(json_request(
            "POST",
            "/api/hadiths/search",
            json!({ "hadithId": id, "text": "Smiling is charity" }),
            None,
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        app.store.get_hadith(id).await.unwrap().embedding,
        Some(vec![1.0, 0.0, 0.0])
    );

    let (status, body) = app
        .json(json_request(
            "POST",
            "/api/hadiths/search",
            json!({ "hadithId": Uuid::new_v4(), "text": "anything" }),
            None,
        ))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);

    let (status, _) = app
        .json(json_request("POST", "/api/hadiths/search", json!({ "hadithId": id }), None))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn single_hadith_lookup_is_404_when_absent() {
    let app = setup_app("unused");
    let (status, body) = app
        .json(get(&format!("/api/hadiths/{}", Uuid::new_v4())))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
}

//=========================================================================================
// AI Gateway
//=========================================================================================

#[tokio::test]
async fn unknown_ai_action_is_rejected() {
    let app = setup_app("unused");
    let (status, body) = app
        .json(json_request("POST", "/api/ai", json!({ "action": "summarize" }), None))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "success": false, "error": "Invalid action" }));
}

#[tokio::test]
async fn quiz_action_returns_exactly_the_requested_questions() {
    let app = setup_app(QUIZ_REPLY);
    let hadith = sample_hadith("Bukhari", "Allah is merciful to the merciful.");
    let id = hadith.id;
    app.store.insert_hadith(hadith);

    let (status, body) = app
        .json(json_request(
            "POST",
            "/api/ai",
            json!({ "action": "quiz", "hadithId": id, "count": 3 }),
            None,
        ))
        .await;

    assert_eq!(status, StatusCode::OK);
    let questions = body["data"]["questions"].as_array().unwrap();
    assert_eq!(questions.len(), 3);
    assert_eq!(questions[0]["correctAnswer"], "Abu Hurairah");
    assert_eq!(questions[2]["correctAnswer"], "Bukhari");
    assert!(questions.iter().all(|q| q["options"].as_array().unwrap().len() == 4));
}

#[tokio::test]
async fn malformed_quiz_reply_is_a_server_error() {
    let app = setup_app("Here are some questions you might enjoy!");
    let hadith = sample_hadith("Bukhari", "Allah is merciful to the merciful.");
    let id = hadith.id;
    app.store.insert_hadith(hadith);

    let (status, body) = app
        .json(json_request(
            "POST",
            "/api/ai",
            json!({ "action": "quiz", "hadithId": id }),
            None,
        ))
        .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("Malformed upstream response"));
}

#[tokio::test]
async fn challenge_difficulty_is_one_of_the_three_levels() {
    let app = setup_app(
        r#"{"question": "Name three acts of charity.", "hint": "Think small.", "difficulty": "medium"}"#,
    );
    let (status, body) = app
        .json(json_request(
            "POST",
            "/api/ai",
            json!({ "action": "challenge", "topics": ["charity"] }),
            None,
        ))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["challenge"]["difficulty"], "medium");
}

#[tokio::test]
async fn explain_for_an_unknown_hadith_is_not_found() {
    let app = setup_app("An explanation.");
    let (status, body) = app
        .json(json_request(
            "POST",
            "/api/ai",
            json!({ "action": "explain", "hadithId": Uuid::new_v4() }),
            None,
        ))
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn recommend_builds_on_the_users_recent_topics() {
    let app = setup_app(r#"["Gratitude", "Trust in Allah"]"#);
    let mut hadith = sample_hadith("Sahih Muslim", "Patience is light.");
    hadith.topics = vec!["patience".to_string()];
    let id = hadith.id;
    app.store.insert_hadith(hadith);
    app.store
        .record_progress("user_r", id, ProgressStatus::Completed)
        .await
        .unwrap();

    let (status, body) = app
        .json(json_request(
            "POST",
            "/api/ai",
            json!({ "action": "recommend", "userId": "user_r", "count": 2 }),
            None,
        ))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["recommendations"], json!(["Gratitude", "Trust in Allah"]));
    assert!(app.completion.last_prompt().contains("topics: patience"));
}

#[tokio::test]
async fn malformed_recommendations_are_a_server_error() {
    let app = setup_app("Try studying gratitude next.");
    let (status, body) = app
        .json(json_request(
            "POST",
            "/api/ai",
            json!({ "action": "recommend", "userId": "user_r" }),
            None,
        ))
        .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn ask_answers_from_hadiths_on_the_requested_topics() {
    let app = setup_app("Patience brings reward.");
    let mut on_topic = sample_hadith("Sahih Muslim", "Patience is light.");
    on_topic.topics = vec!["patience".to_string()];
    let mut off_topic = sample_hadith("Sahih al-Bukhari", "Charity does not decrease wealth.");
    off_topic.topics = vec!["charity".to_string()];
    app.store.insert_hadith(on_topic);
    app.store.insert_hadith(off_topic);

    let (status, body) = app
        .json(json_request(
            "POST",
            "/api/ai",
            json!({ "action": "ask", "question": "Why be patient?", "topics": ["patience"] }),
            None,
        ))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["answer"], "Patience brings reward.");
    let prompt = app.completion.last_prompt();
    assert!(prompt.contains("Patience is light."));
    assert!(!prompt.contains("Charity does not decrease wealth."));
}

#[tokio::test]
async fn vendor_failure_message_is_passed_through() {
    let app = setup_app_with(None, None);
    let (status, body) = app
        .json(json_request(
            "POST",
            "/api/ai",
            json!({ "action": "ask", "question": "What is sadaqah?", "topics": [] }),
            None,
        ))
        .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("DeepSeek API error: 503"));
}

//=========================================================================================
// Chat
//=========================================================================================

#[tokio::test]
async fn chat_anchors_on_a_direct_text_match() {
    let app = setup_app("Mercy is central to this teaching.");
    app.store
        .insert_hadith(sample_hadith("Bukhari", "Those who show mercy will be shown mercy."));

    let (status, body) = app
        .json(json_request(
            "POST",
            "/api/chat",
            json!({ "message": "show mercy", "history": [] }),
            None,
        ))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["response"], "Mercy is central to this teaching.");
    assert_eq!(body["hadith"]["book"], "Bukhari");
    assert_eq!(body["hadith"]["narrator"], "Abu Hurairah");
}

#[tokio::test]
async fn chat_without_a_match_proceeds_without_a_hadith() {
    let app = setup_app("Let us talk about patience.");
    app.store
        .insert_hadith(sample_hadith("Bukhari", "Those who show mercy will be shown mercy."));

    let (status, body) = app
        .json(json_request(
            "POST",
            "/api/chat",
            json!({ "message": "patience", "history": [{ "role": "user", "content": "salam" }] }),
            None,
        ))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["hadith"], Value::Null);
}

#[tokio::test]
async fn blank_chat_messages_are_rejected_before_any_lookup() {
    let app = setup_app("unused");
    app.store
        .insert_hadith(sample_hadith("Bukhari", "Those who show mercy will be shown mercy."));

    for uri in ["/api/chat", "/api/chat/stream"] {
        let (status, body) = app
            .json(json_request("POST", uri, json!({ "message": "   " }), None))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        assert_eq!(
            body,
            json!({ "success": false, "error": "Missing required field: message" })
        );
    }
}

#[tokio::test]
async fn chat_failure_uses_the_fixed_error_body() {
    let app = setup_app_with(None, None);
    let (status, body) = app
        .json(json_request("POST", "/api/chat", json!({ "message": "hello" }), None))
        .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "error": "Failed to process request" }));
}

#[tokio::test]
async fn chat_stream_sends_hadith_fragments_then_done() {
    let app = setup_app("Patience is light.");
    let request = json_request(
        "POST",
        "/api/chat/stream",
        json!({
            "message": "patience",
            "currentHadith": { "text": "Patience is light.", "book": "Muslim", "narrator": "Abu Malik" }
        }),
        None,
    );
    let (status, bytes, headers) = app.send(request).await;
    let text = String::from_utf8(bytes).unwrap();

    assert_eq!(status, StatusCode::OK);
    assert!(headers[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));
    assert!(text.contains("event: hadith"));
    assert!(text.contains("\"book\":\"Muslim\""));
    assert!(text.contains("data: Patience "));
    assert!(text.contains("data: light."));
    assert!(text.contains("event: done"));
}

//=========================================================================================
// Profiles and Activity
//=========================================================================================

#[tokio::test]
async fn profile_requires_a_session() {
    let app = setup_app("unused");
    let (status, body) = app.json(get("/api/user/profile")).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({ "success": false, "error": "Unauthorized" }));

    let (status, _) = app
        .json(get_with_cookie("/api/user/profile", "session=forged"))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn first_profile_fetch_creates_a_zeroed_row_once() {
    let app = setup_app("unused");
    let cookie = app.sign_in("user_1").await;

    let (status, first) = app.json(get_with_cookie("/api/user/profile", &cookie)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["data"]["id"], "user_1");
    assert_eq!(first["data"]["points"], 0);
    assert_eq!(first["data"]["hadiths_read"], 0);
    assert_eq!(first["data"]["favorites_count"], 0);

    let (_, second) = app.json(get_with_cookie("/api/user/profile", &cookie)).await;
    assert_eq!(second["data"]["created_at"], first["data"]["created_at"]);
    assert_eq!(app.store.profile_count(), 1);
}

#[tokio::test]
async fn profile_upsert_and_patch() {
    let app = setup_app("unused");
    let cookie = app.sign_in("user_2").await;

    let (status, _) = app
        .json(json_request(
            "PATCH",
            "/api/user/profile",
            json!({ "points": 5 }),
            Some(&cookie),
        ))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app
        .json(json_request(
            "POST",
            "/api/user/profile",
            json!({ "username": "yusuf" }),
            Some(&cookie),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["username"], "yusuf");
    assert_eq!(body["message"], "Profile updated successfully");

    let (status, body) = app
        .json(json_request(
            "PATCH",
            "/api/user/profile",
            json!({ "points": 40, "streak": 3 }),
            Some(&cookie),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["points"], 40);
    assert_eq!(body["data"]["current_streak"], 3);
    assert_eq!(body["data"]["username"], "yusuf");
}

#[tokio::test]
async fn completing_a_hadith_awards_points_once() {
    let app = setup_app("unused");
    let cookie = app.sign_in("user_3").await;
    let hadith = sample_hadith("Bukhari", "The best of you are those who learn.");
    let id = hadith.id;
    app.store.insert_hadith(hadith);

    for status in ["in_progress", "completed", "completed"] {
        let (code, body) = app
            .json(json_request(
                "POST",
                "/api/progress",
                json!({ "hadithId": id, "status": status }),
                Some(&cookie),
            ))
            .await;
        assert_eq!(code, StatusCode::OK);
        assert_eq!(body["data"]["status"], status);
    }

    let (_, profile) = app.json(get_with_cookie("/api/user/profile", &cookie)).await;
    assert_eq!(profile["data"]["hadiths_read"], 1);
    assert_eq!(profile["data"]["points"], 10);
    assert_eq!(profile["data"]["progress_count"], 1);
}

#[tokio::test]
async fn progress_on_an_unknown_hadith_is_not_found() {
    let app = setup_app("unused");
    let cookie = app.sign_in("user_4").await;
    let (status, _) = app
        .json(json_request(
            "POST",
            "/api/progress",
            json!({ "hadithId": Uuid::new_v4(), "status": "completed" }),
            Some(&cookie),
        ))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn favorites_can_be_added_listed_and_removed() {
    let app = setup_app("unused");
    let cookie = app.sign_in("user_5").await;
    let hadith = sample_hadith("Muslim", "Religion is sincerity.");
    let id = hadith.id;
    app.store.insert_hadith(hadith);

    let (status, _) = app
        .json(json_request("POST", "/api/favorites", json!({ "hadithId": id }), Some(&cookie)))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, body) = app.json(get_with_cookie("/api/favorites", &cookie)).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"][0]["english_text"], "Religion is sincerity.");

    let delete = |uri: String| {
        Request::builder()
            .method("DELETE")
            .uri(uri)
            .header(header::COOKIE, cookie.clone())
            .body(Body::empty())
            .unwrap()
    };
    let (status, _) = app.json(delete(format!("/api/favorites/{}", id))).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.json(delete(format!("/api/favorites/{}", id))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn quiz_results_add_their_score_to_the_profile() {
    let app = setup_app("unused");
    let cookie = app.sign_in("user_6").await;

    let (status, body) = app
        .json(json_request(
            "POST",
            "/api/quiz-results",
            json!({ "score": 7, "timeSpent": 95, "answers": { "1": "A" } }),
            Some(&cookie),
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["score"], 7);

    let (_, profile) = app.json(get_with_cookie("/api/user/profile", &cookie)).await;
    assert_eq!(profile["data"]["quizzes_completed"], 1);
    assert_eq!(profile["data"]["points"], 7);
    assert_eq!(profile["data"]["quiz_results_count"], 1);

    let (status, _) = app
        .json(json_request(
            "POST",
            "/api/quiz-results",
            json!({ "score": -1, "timeSpent": 10, "answers": {} }),
            Some(&cookie),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn oversized_quiz_scores_are_rejected_without_storing_anything() {
    let app = setup_app("unused");
    let cookie = app.sign_in("user_7").await;

    for _ in 0..2 {
        let (status, body) = app
            .json(json_request(
                "POST",
                "/api/quiz-results",
                json!({ "score": i32::MAX, "timeSpent": 10, "answers": {} }),
                Some(&cookie),
            ))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    let (_, profile) = app.json(get_with_cookie("/api/user/profile", &cookie)).await;
    assert_eq!(profile["data"]["points"], 0);
    assert_eq!(profile["data"]["quizzes_completed"], 0);
    assert_eq!(profile["data"]["quiz_results_count"], 0);
}

//=========================================================================================
// Identity Webhook
//=========================================================================================

#[tokio::test]
async fn signed_user_created_event_creates_a_profile() {
    let app = setup_app("unused");
    let body = json!({
        "type": "user.created",
        "data": {
            "id": "user_clerk_1",
            "username": null,
            "email_addresses": [{ "email_address": "maryam@example.com" }]
        }
    })
    .to_string();

    let (status, _) = app
        .json(signed_webhook(&body, Utc::now().timestamp(), WEBHOOK_KEY))
        .await;

    assert_eq!(status, StatusCode::CREATED);
    let summary = app.store.get_profile_summary("user_clerk_1").await.unwrap();
    assert_eq!(summary.profile.username.as_deref(), Some("maryam"));
}

#[tokio::test]
async fn deleting_an_unknown_user_is_a_handled_404() {
    let app = setup_app("unused");
    let body = json!({ "type": "user.deleted", "data": { "id": "user_missing" } }).to_string();

    let (status, response) = app
        .json(signed_webhook(&body, Utc::now().timestamp(), WEBHOOK_KEY))
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(response, json!({ "success": false, "error": "Profile not found" }));
}

#[tokio::test]
async fn deleting_a_known_user_removes_the_profile() {
    let app = setup_app("unused");
    app.store.ensure_profile("user_gone", None).await.unwrap();
    let body = json!({ "type": "user.deleted", "data": { "id": "user_gone" } }).to_string();

    let (status, _) = app
        .json(signed_webhook(&body, Utc::now().timestamp(), WEBHOOK_KEY))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.store.profile_count(), 0);
}

#[tokio::test]
async fn webhook_rejects_bad_signatures_and_missing_headers() {
    let app = setup_app("unused");
    let body = json!({ "type": "user.created", "data": { "id": "user_x" } }).to_string();

    let (status, response) = app
        .json(signed_webhook(&body, Utc::now().timestamp(), b"some-other-key"))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response["error"], "Error verifying webhook");

    let stale = Utc::now().timestamp() - 10 * 60;
    let (status, _) = app.json(signed_webhook(&body, stale, WEBHOOK_KEY)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, response) = app.json(signed_webhook(&body, i64::MIN, WEBHOOK_KEY)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response["error"], "Error verifying webhook");

    let (status, response) = app
        .json(json_request("POST", "/api/webhook/clerk", json!({}), None))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response["error"], "Missing svix headers");
    assert_eq!(app.store.profile_count(), 0);
}

#[tokio::test]
async fn webhook_without_a_configured_secret_is_a_server_error() {
    let app = setup_app_with(Some("unused"), None);
    let body = json!({ "type": "user.created", "data": { "id": "user_x" } }).to_string();

    let (status, response) = app
        .json(signed_webhook(&body, Utc::now().timestamp(), WEBHOOK_KEY))
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response["success"], false);
}

#[tokio::test]
async fn unhandled_event_types_are_acknowledged() {
    let app = setup_app("unused");
    let body = json!({ "type": "session.created", "data": { "id": "sess_1" } }).to_string();

    let (status, _) = app
        .json(signed_webhook(&body, Utc::now().timestamp(), WEBHOOK_KEY))
        .await;
    assert_eq!(status, StatusCode::OK);
}

//=========================================================================================
// Pages and Local Auth
//=========================================================================================

#[tokio::test]
async fn dashboard_without_a_session_redirects_to_sign_in() {
    let app = setup_app("unused");
    let (status, _, headers) = app.send(get("/dashboard")).await;

    assert_eq!(status, StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(headers[header::LOCATION], "/sign-in");
}

#[tokio::test]
async fn signed_in_users_skip_the_entry_pages() {
    let app = setup_app("unused");
    let cookie = app.sign_in("user_7").await;

    for path in ["/", "/sign-in", "/sign-up"] {
        let (status, _, headers) = app.send(get_with_cookie(path, &cookie)).await;
        assert_eq!(status, StatusCode::TEMPORARY_REDIRECT, "{}", path);
        assert_eq!(headers[header::LOCATION], "/dashboard");
    }

    let (status, bytes, _) = app.send(get_with_cookie("/dashboard", &cookie)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(String::from_utf8(bytes).unwrap().contains("Points: 0"));
    assert_eq!(app.store.profile_count(), 1);
}

#[tokio::test]
async fn expired_sessions_count_as_signed_out() {
    let app = setup_app("unused");
    app.store
        .create_auth_session("old", "user_8", Utc::now() - Duration::minutes(1))
        .await
        .unwrap();

    let (status, _, headers) = app.send(get_with_cookie("/dashboard", "session=old")).await;
    assert_eq!(status, StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(headers[header::LOCATION], "/sign-in");

    let (status, _, _) = app.send(get_with_cookie("/sign-in", "session=old")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn signup_login_and_logout_round_trip_the_session_cookie() {
    let app = setup_app("unused");
    let credentials = json!({ "email": "Bilal@Example.com", "password": "adhan-at-dawn" });

    let (status, _, headers) = app
        .send(json_request("POST", "/auth/signup", credentials.clone(), None))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let set_cookie = headers[header::SET_COOKIE].to_str().unwrap().to_string();
    assert!(set_cookie.contains("HttpOnly"));
    let cookie = set_cookie.split(';').next().unwrap().to_string();

    let (status, profile) = app.json(get_with_cookie("/api/user/profile", &cookie)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["data"]["username"], "bilal");

    let (status, _) = app
        .json(json_request("POST", "/auth/signup", credentials.clone(), None))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .json(json_request(
            "POST",
            "/auth/login",
            json!({ "email": "bilal@example.com", "password": "wrong" }),
            None,
        ))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _, headers) = app
        .send(json_request("POST", "/auth/login", credentials, None))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(headers.contains_key(header::SET_COOKIE));

    let (status, _, _) = app
        .send(json_request("POST", "/auth/logout", json!({}), Some(&cookie)))
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.json(get_with_cookie("/api/user/profile", &cookie)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

fn form_request(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn browser_forms_sign_up_and_sign_in_then_land_on_the_dashboard() {
    let app = setup_app("unused");

    let (_, page, _) = app.send(get("/sign-up")).await;
    assert!(String::from_utf8(page).unwrap().contains("action=\"/sign-up\""));

    let (status, _, headers) = app
        .send(form_request("/sign-up", "email=hafsa%40example.com&password=night-prayer"))
        .await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(headers[header::LOCATION], "/dashboard");
    let cookie = headers[header::SET_COOKIE]
        .to_str()
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .to_string();

    let (status, bytes, _) = app.send(get_with_cookie("/dashboard", &cookie)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(String::from_utf8(bytes).unwrap().contains("hafsa"));

    let (status, _, headers) = app
        .send(form_request("/sign-in", "email=hafsa%40example.com&password=night-prayer"))
        .await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(headers[header::LOCATION], "/dashboard");
    assert!(headers.contains_key(header::SET_COOKIE));

    let (status, body) = app
        .json(form_request("/sign-in", "email=hafsa%40example.com&password=wrong"))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
}
