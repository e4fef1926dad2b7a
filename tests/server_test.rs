use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use grade_proxy::clients::{
    build_http_client, build_provider, CompletionProvider, RawReply, TurnstileClient,
};
use grade_proxy::{router, AppResult, AppState, Config, GradeFlow, ProviderKind, Submission};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ORIGIN: &str = "https://dayhocsangtao.com";

/// 用 wiremock 充当 Turnstile 和模型服务
struct Upstreams {
    turnstile: MockServer,
    llm: MockServer,
}

impl Upstreams {
    async fn start() -> Self {
        Self {
            turnstile: MockServer::start().await,
            llm: MockServer::start().await,
        }
    }

    fn config(&self, provider: ProviderKind) -> Config {
        Config {
            provider,
            turnstile_secret: Some("ts-secret".to_string()),
            turnstile_verify_url: format!("{}/siteverify", self.turnstile.uri()),
            gemini_api_key: Some("gm-key".to_string()),
            gemini_base_url: self.llm.uri(),
            openai_api_key: Some("sk-key".to_string()),
            openai_base_url: self.llm.uri(),
            upstream_timeout_secs: 5,
            ..Config::default()
        }
    }

    async fn turnstile_says(&self, success: bool, expected_calls: u64) {
        Mock::given(method("POST"))
            .and(path("/siteverify"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": success,
                "error-codes": if success { json!([]) } else { json!(["invalid-input-response"]) }
            })))
            .expect(expected_calls)
            .mount(&self.turnstile)
            .await;
    }

    async fn gemini_says(&self, text: &str, expected_calls: u64) {
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{ "content": { "parts": [{ "text": text }] } }]
            })))
            .expect(expected_calls)
            .mount(&self.llm)
            .await;
    }
}

async fn spawn_with_flow(flow: GradeFlow, config: &Config) -> String {
    let state = AppState::new(flow, &config.allowed_origins);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, router(state)).await.unwrap();
    });

    format!("http://{}/api/grade", addr)
}

async fn spawn_app(config: Config) -> String {
    let http = build_http_client(config.upstream_timeout_secs).unwrap();
    let verifier = Arc::new(TurnstileClient::new(&config, http.clone()));
    let provider = build_provider(&config, http);
    let flow = GradeFlow::new(&config, verifier, provider);
    spawn_with_flow(flow, &config).await
}

fn grade_body() -> Value {
    json!({
        "turnstileToken": "tok",
        "submissions": [
            { "qid": 1, "points": 5, "prompt": "Giải x^2 = 4", "solutionKey": "x = ±2", "rubric": ["Khai căn", "Hai nghiệm"] },
            { "qid": 2, "points": 3, "prompt": "Tính đạo hàm của x^3", "solutionKey": "3x^2", "rubric": ["Công thức"] }
        ]
    })
}

async fn post(url: &str, body: &Value) -> reqwest::Response {
    reqwest::Client::new()
        .post(url)
        .header("Origin", ORIGIN)
        .header("X-Forwarded-For", "203.0.113.9, 10.0.0.2")
        .json(body)
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_preflight_returns_no_content_with_cors() {
    let upstreams = Upstreams::start().await;
    let url = spawn_app(upstreams.config(ProviderKind::Gemini)).await;

    let response = reqwest::Client::new()
        .request(reqwest::Method::OPTIONS, &url)
        .header("Origin", ORIGIN)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 204);
    let headers = response.headers();
    assert_eq!(headers["access-control-allow-origin"], ORIGIN);
    assert_eq!(headers["vary"], "Origin");
    assert_eq!(headers["access-control-allow-methods"], "POST, OPTIONS");
    assert_eq!(headers["access-control-allow-headers"], "Content-Type");
}

#[tokio::test]
async fn test_unknown_origin_is_not_echoed_and_get_is_rejected() {
    let upstreams = Upstreams::start().await;
    let url = spawn_app(upstreams.config(ProviderKind::Gemini)).await;

    let response = reqwest::Client::new()
        .get(&url)
        .header("Origin", "https://evil.example")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 405);
    assert!(response.headers().get("access-control-allow-origin").is_none());
    assert_eq!(response.headers()["vary"], "Origin");
    assert_eq!(response.text().await.unwrap(), "Method not allowed");
}

#[tokio::test]
async fn test_missing_token_makes_no_outbound_calls() {
    let upstreams = Upstreams::start().await;
    upstreams.turnstile_says(true, 0).await;
    upstreams.gemini_says("{}", 0).await;
    let url = spawn_app(upstreams.config(ProviderKind::Gemini)).await;

    let response = post(&url, &json!({ "submissions": [{ "qid": 1, "points": 5 }] })).await;

    assert_eq!(response.status().as_u16(), 403);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Missing Turnstile token");
}

#[tokio::test]
async fn test_garbage_body_is_treated_as_missing_token() {
    let upstreams = Upstreams::start().await;
    let url = spawn_app(upstreams.config(ProviderKind::Gemini)).await;

    let response = reqwest::Client::new()
        .post(&url)
        .header("Content-Type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 403);
}

#[tokio::test]
async fn test_empty_batch_is_bad_request() {
    let upstreams = Upstreams::start().await;
    let url = spawn_app(upstreams.config(ProviderKind::Gemini)).await;

    let response = post(&url, &json!({ "turnstileToken": "tok", "submissions": [] })).await;

    assert_eq!(response.status().as_u16(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Missing submissions");
}

#[tokio::test]
async fn test_missing_secret_is_server_error() {
    let upstreams = Upstreams::start().await;
    let config = Config {
        turnstile_secret: None,
        ..upstreams.config(ProviderKind::Gemini)
    };
    let url = spawn_app(config).await;

    let response = post(&url, &grade_body()).await;

    assert_eq!(response.status().as_u16(), 500);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Missing env TURNSTILE_SECRET");
}

#[tokio::test]
async fn test_gemini_scores_are_clamped() {
    let upstreams = Upstreams::start().await;

    Mock::given(method("POST"))
        .and(path("/siteverify"))
        .and(body_string_contains("secret=ts-secret"))
        .and(body_string_contains("remoteip=203.0.113.9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
        .expect(1)
        .mount(&upstreams.turnstile)
        .await;
    upstreams
        .gemini_says(
            "Đây là kết quả:\n```json\n{\"results\":[\
             {\"qid\":1,\"score\":9,\"feedback\":\"Đúng hết\",\"key_points_hit\":[\"Khai căn\",\"Hai nghiệm\"]},\
             {\"qid\":2,\"score\":-1,\"feedback\":\"Sai công thức\",\"key_points_hit\":[]},\
             {\"qid\":7,\"score\":12,\"feedback\":\"?\",\"key_points_hit\":[]}]}\n```",
            1,
        )
        .await;
    let url = spawn_app(upstreams.config(ProviderKind::Gemini)).await;

    let response = post(&url, &grade_body()).await;

    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(response.headers()["access-control-allow-origin"], ORIGIN);
    let body: Value = response.json().await.unwrap();
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 3);
    assert_eq!(results[0]["score"], 5);
    assert_eq!(results[0]["key_points_hit"], json!(["Khai căn", "Hai nghiệm"]));
    assert_eq!(results[1]["score"], 0);
    // 找不到题目的结果原样返回
    assert_eq!(results[2]["score"], 12);
}

#[tokio::test]
async fn test_loosely_typed_reply_is_still_graded() {
    let upstreams = Upstreams::start().await;
    upstreams.turnstile_says(true, 1).await;
    upstreams
        .gemini_says(
            "{\"results\":[\
             {\"qid\":1,\"score\":8,\"feedback\":null,\"key_points_hit\":[1]},\
             {\"qid\":9}]}",
            1,
        )
        .await;
    let url = spawn_app(upstreams.config(ProviderKind::Gemini)).await;

    let response = post(&url, &grade_body()).await;

    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(
        body,
        json!({ "results": [
            { "qid": 1, "score": 5, "feedback": null, "key_points_hit": [1] },
            { "qid": 9 }
        ] })
    );
}

#[tokio::test]
async fn test_rejected_challenge_never_reaches_provider() {
    let upstreams = Upstreams::start().await;
    upstreams.turnstile_says(false, 1).await;
    upstreams.gemini_says("{}", 0).await;
    let url = spawn_app(upstreams.config(ProviderKind::Gemini)).await;

    let response = post(&url, &grade_body()).await;

    assert_eq!(response.status().as_u16(), 403);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Turnstile not passed");
    assert_eq!(body["verify"]["error-codes"][0], "invalid-input-response");
}

#[tokio::test]
async fn test_prose_reply_is_bad_gateway() {
    let upstreams = Upstreams::start().await;
    upstreams.turnstile_says(true, 1).await;
    upstreams
        .gemini_says("Tôi không thể chấm các bài này", 1)
        .await;
    let url = spawn_app(upstreams.config(ProviderKind::Gemini)).await;

    let response = post(&url, &grade_body()).await;

    assert_eq!(response.status().as_u16(), 502);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Gemini returned non-JSON");
    assert_eq!(body["detail"]["text"], "Tôi không thể chấm các bài này");
    assert!(body["detail"]["parseError"].as_str().is_some());
}

#[tokio::test]
async fn test_provider_error_status_is_bad_gateway() {
    let upstreams = Upstreams::start().await;
    upstreams.turnstile_says(true, 1).await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("model overloaded"))
        .mount(&upstreams.llm)
        .await;
    let url = spawn_app(upstreams.config(ProviderKind::Gemini)).await;

    let response = post(&url, &grade_body()).await;

    assert_eq!(response.status().as_u16(), 502);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Gemini error");
    assert_eq!(body["status"], 503);
    assert_eq!(body["detail"], "model overloaded");
}

#[tokio::test]
async fn test_slow_provider_times_out() {
    let upstreams = Upstreams::start().await;
    upstreams.turnstile_says(true, 1).await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "candidates": [] }))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&upstreams.llm)
        .await;
    let config = Config {
        upstream_timeout_secs: 1,
        ..upstreams.config(ProviderKind::Gemini)
    };
    let url = spawn_app(config).await;

    let response = post(&url, &grade_body()).await;

    assert_eq!(response.status().as_u16(), 502);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Gemini error");
    assert_eq!(body["detail"], "request timed out after 1s");
}

#[tokio::test]
async fn test_openai_structured_output_is_clamped() {
    let upstreams = Upstreams::start().await;
    upstreams.turnstile_says(true, 1).await;
    Mock::given(method("POST"))
        .and(path("/responses"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "resp_1",
            "status": "completed",
            "output": [{
                "type": "message",
                "role": "assistant",
                "content": [{
                    "type": "output_text",
                    "text": "{\"results\":[{\"qid\":1,\"score\":4.5,\"feedback\":\"Tốt\",\"key_points_hit\":[\"Khai căn\"]},{\"qid\":2,\"score\":30,\"feedback\":\"Quá điểm\",\"key_points_hit\":[]}]}"
                }]
            }]
        })))
        .expect(1)
        .mount(&upstreams.llm)
        .await;
    let url = spawn_app(upstreams.config(ProviderKind::OpenAi)).await;

    let response = post(&url, &grade_body()).await;

    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["results"][0]["score"], 4.5);
    assert_eq!(body["results"][1]["score"], 3);
}

struct PanickingProvider;

#[async_trait]
impl CompletionProvider for PanickingProvider {
    fn name(&self) -> &str {
        "Panicky"
    }

    fn api_key_var(&self) -> &str {
        "PANICKY_KEY"
    }

    fn is_configured(&self) -> bool {
        true
    }

    async fn complete(&self, _rubric: &str, _batch: &[Submission]) -> AppResult<RawReply> {
        panic!("provider exploded")
    }
}

#[tokio::test]
async fn test_panic_becomes_generic_server_error() {
    let upstreams = Upstreams::start().await;
    upstreams.turnstile_says(true, 1).await;
    let config = upstreams.config(ProviderKind::Gemini);
    let http = build_http_client(config.upstream_timeout_secs).unwrap();
    let verifier = Arc::new(TurnstileClient::new(&config, http));
    let flow = GradeFlow::new(&config, verifier, Arc::new(PanickingProvider));
    let url = spawn_with_flow(flow, &config).await;

    let response = post(&url, &grade_body()).await;

    assert_eq!(response.status().as_u16(), 500);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Server error");
    assert_eq!(body["message"], "provider exploded");
}
