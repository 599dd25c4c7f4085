//! End-to-end API tests: drive the full router with in-memory state, no
//! network. Each test builds its own state so they can run in parallel.

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use buddy_backend::openai::OpenAI;
use buddy_backend::routes::build_router;
use buddy_backend::store::AppState;

fn app() -> Router {
  build_router(AppState::new())
}

async fn call(
  app: &Router,
  method: Method,
  uri: &str,
  token: Option<&str>,
  body: Option<Value>,
) -> (StatusCode, Value) {
  let mut req = Request::builder().method(method).uri(uri);
  if let Some(t) = token {
    req = req.header(header::AUTHORIZATION, format!("Bearer {t}"));
  }
  let req = match body {
    Some(v) => req
      .header(header::CONTENT_TYPE, "application/json")
      .body(Body::from(v.to_string()))
      .unwrap(),
    None => req.body(Body::empty()).unwrap(),
  };

  let res = app.clone().oneshot(req).await.unwrap();
  let status = res.status();
  let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
  let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
  (status, value)
}

async fn register(app: &Router, username: &str) -> String {
  let (status, body) = call(
    app,
    Method::POST,
    "/api/v1/auth/register",
    None,
    Some(json!({
      "username": username,
      "email": format!("{username}@example.com"),
      "password": "hunter2hunter2",
    })),
  )
  .await;
  assert_eq!(status, StatusCode::OK, "register failed: {body}");
  body["data"]["token"].as_str().unwrap().to_string()
}

fn full_marks_quiz() -> Value {
  json!({
    "kind": "quiz",
    "responses": [
      { "questionId": "q1", "answer": "56" },
      { "questionId": "q2", "answer": true },
      { "questionId": "q3", "answer": "25" },
    ]
  })
}

#[tokio::test]
async fn register_start_submit_flow() {
  let app = app();
  let token = register(&app, "ana").await;

  let (status, body) = call(
    &app,
    Method::POST,
    "/api/v1/challenges/seed-math-basics/start",
    Some(&token),
    Some(json!({})),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["data"]["resumed"], json!(false));
  assert_eq!(body["data"]["attempt"]["attemptNumber"], json!(1));

  let (status, body) = call(
    &app,
    Method::POST,
    "/api/v1/challenges/seed-math-basics/submit",
    Some(&token),
    Some(full_marks_quiz()),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["success"], json!(true));
  assert_eq!(body["data"]["attempt"]["percentage"], json!(100));
  assert_eq!(body["data"]["attempt"]["passed"], json!(true));
  // Base 50 + perfect 25 + fast 10 + first-attempt 10.
  assert_eq!(body["data"]["xpEarned"], json!(95));
  let badge_ids: Vec<&str> = body["data"]["newBadges"]
    .as_array()
    .unwrap()
    .iter()
    .map(|b| b["badgeId"].as_str().unwrap())
    .collect();
  assert!(badge_ids.contains(&"badge-first-steps"));
  assert!(badge_ids.contains(&"badge-perfect-score"));

  // The dashboard reflects the whole update.
  let (status, body) =
    call(&app, Method::GET, "/api/v1/analytics/dashboard", Some(&token), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["data"]["challengesCompleted"], json!(1));
  assert_eq!(body["data"]["streakCurrent"], json!(1));
  assert_eq!(body["data"]["totalXp"], json!(295));
}

#[tokio::test]
async fn submit_without_start_is_a_clean_400() {
  let app = app();
  let token = register(&app, "bob").await;
  let (status, body) = call(
    &app,
    Method::POST,
    "/api/v1/challenges/seed-math-basics/submit",
    Some(&token),
    Some(full_marks_quiz()),
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["success"], json!(false));
  assert_eq!(body["message"], json!("No active attempt found"));
}

#[tokio::test]
async fn protected_routes_require_a_token() {
  let app = app();
  let (status, body) = call(&app, Method::GET, "/api/v1/auth/profile", None, None).await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);
  assert_eq!(body["success"], json!(false));

  let (status, _) = call(&app, Method::GET, "/api/v1/auth/profile", Some("not.a.token"), None).await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn public_challenge_listing_hides_answers() {
  let app = app();
  let (status, body) = call(&app, Method::GET, "/api/v1/challenges", None, None).await;
  assert_eq!(status, StatusCode::OK);
  let items = body["data"].as_array().unwrap();
  assert!(!items.is_empty());
  for item in items {
    if let Some(questions) = item["content"]["questions"].as_array() {
      for q in questions {
        assert!(q.get("correctAnswer").is_none(), "answer leaked: {q}");
      }
    }
  }
}

#[tokio::test]
async fn duplicate_registration_conflicts() {
  let app = app();
  register(&app, "carol").await;
  let (status, body) = call(
    &app,
    Method::POST,
    "/api/v1/auth/register",
    None,
    Some(json!({
      "username": "carol",
      "email": "other@example.com",
      "password": "hunter2hunter2",
    })),
  )
  .await;
  assert_eq!(status, StatusCode::CONFLICT);
  assert_eq!(body["success"], json!(false));
}

#[tokio::test]
async fn login_works_with_username_or_email() {
  let app = app();
  register(&app, "dave").await;
  for identifier in ["dave", "dave@example.com"] {
    let (status, body) = call(
      &app,
      Method::POST,
      "/api/v1/auth/login",
      None,
      Some(json!({ "identifier": identifier, "password": "hunter2hunter2" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login as {identifier}: {body}");
    assert!(body["data"]["token"].as_str().is_some());
  }

  let (status, _) = call(
    &app,
    Method::POST,
    "/api/v1/auth/login",
    None,
    Some(json!({ "identifier": "dave", "password": "wrong-password" })),
  )
  .await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn path_enrollment_and_milestones() {
  let app = app();
  let token = register(&app, "erin").await;

  let (status, _) = call(
    &app,
    Method::POST,
    "/api/v1/learning-paths/seed-path-foundations/enroll",
    Some(&token),
    Some(json!({})),
  )
  .await;
  assert_eq!(status, StatusCode::OK);

  // Enrolling twice conflicts.
  let (status, _) = call(
    &app,
    Method::POST,
    "/api/v1/learning-paths/seed-path-foundations/enroll",
    Some(&token),
    Some(json!({})),
  )
  .await;
  assert_eq!(status, StatusCode::CONFLICT);

  // Step 2 requires step 1 first.
  let (status, body) = call(
    &app,
    Method::POST,
    "/api/v1/learning-paths/seed-path-foundations/steps/2/complete",
    Some(&token),
    Some(json!({ "score": 90, "timeSpent": 120 })),
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

  let mut percentages = Vec::new();
  for n in [1, 2, 3, 4] {
    let (status, body) = call(
      &app,
      Method::POST,
      &format!("/api/v1/learning-paths/seed-path-foundations/steps/{n}/complete"),
      Some(&token),
      Some(json!({ "score": 90, "timeSpent": 120 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "step {n}: {body}");
    percentages.push(body["data"]["progress"]["progressPercentage"].as_u64().unwrap());
    if n == 4 {
      assert_eq!(body["data"]["pathCompleted"], json!(true));
      let kinds: Vec<&str> = body["data"]["newMilestones"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["kind"].as_str().unwrap())
        .collect();
      assert_eq!(kinds, vec!["completion"]);
    }
  }
  assert_eq!(percentages, vec![25, 50, 75, 100]);

  let (status, body) = call(
    &app,
    Method::GET,
    "/api/v1/learning-paths/seed-path-foundations/progress",
    Some(&token),
    None,
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["data"]["completed"], json!(true));
  assert_eq!(body["data"]["milestones"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn system_analytics_is_admin_only() {
  let app = app();
  let token = register(&app, "frank").await;
  let (status, _) = call(&app, Method::GET, "/api/v1/analytics/system", Some(&token), None).await;
  assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn tutor_chat_falls_back_without_model() {
  // No OPENAI_API_KEY in the test environment, so replies are canned.
  let app = app();
  let token = register(&app, "gina").await;

  let (status, body) = call(
    &app,
    Method::POST,
    "/api/v1/ai/chat/start",
    Some(&token),
    Some(json!({ "contextKind": "general" })),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  let session_id = body["data"]["id"].as_str().unwrap().to_string();

  let (status, body) = call(
    &app,
    Method::POST,
    &format!("/api/v1/ai/chat/{session_id}/message"),
    Some(&token),
    Some(json!({ "message": "How do I get better at fractions?" })),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["data"]["canned"], json!(true));

  let (status, body) = call(
    &app,
    Method::GET,
    &format!("/api/v1/ai/chat/{session_id}"),
    Some(&token),
    None,
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  // Welcome message, user turn, persisted canned reply.
  assert_eq!(body["data"]["messages"].as_array().unwrap().len(), 3);

  // Another account cannot read the session.
  let other = register(&app, "hugo").await;
  let (status, _) = call(
    &app,
    Method::GET,
    &format!("/api/v1/ai/chat/{session_id}"),
    Some(&other),
    None,
  )
  .await;
  assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn tutor_chat_degrades_when_upstream_is_unreachable() {
  // A configured but failing model must degrade to the canned reply with a
  // 200, never surface the connection error to the client.
  let mut state = AppState::new();
  state.openai = Some(OpenAI {
    client: reqwest::Client::new(),
    api_key: "test-key".into(),
    base_url: "http://127.0.0.1:9".into(),
    model: "test-model".into(),
  });
  let fallback = state.prompts.tutor_fallback.clone();
  let app = build_router(state);
  let token = register(&app, "iris").await;

  let (status, body) = call(
    &app,
    Method::POST,
    "/api/v1/ai/chat/start",
    Some(&token),
    Some(json!({ "contextKind": "general" })),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  let session_id = body["data"]["id"].as_str().unwrap().to_string();

  let (status, body) = call(
    &app,
    Method::POST,
    &format!("/api/v1/ai/chat/{session_id}/message"),
    Some(&token),
    Some(json!({ "message": "Help me with loops?" })),
  )
  .await;
  assert_eq!(status, StatusCode::OK, "{body}");
  assert_eq!(body["data"]["canned"], json!(true));
  assert_eq!(body["data"]["reply"], json!(fallback.clone()));

  // The fallback is persisted into the conversation like any reply.
  let (status, body) = call(
    &app,
    Method::GET,
    &format!("/api/v1/ai/chat/{session_id}"),
    Some(&token),
    None,
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  let messages = body["data"]["messages"].as_array().unwrap();
  assert_eq!(messages.len(), 3);
  assert_eq!(messages[2]["content"], json!(fallback));
}
