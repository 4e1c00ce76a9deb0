use super::*;
use axum::{extract::Query, routing::post, Json, Router};
use std::collections::HashMap;
use tokio::net::TcpListener;

async fn serve(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("serve");
    });
    format!("http://{addr}")
}

fn config(base_url: String) -> HttpGeneratorConfig {
    HttpGeneratorConfig {
        api_key: "test-key".into(),
        model: "test-model".into(),
        base_url,
        timeout: Duration::from_secs(5),
    }
}

fn reply_with(text: &'static str) -> Router {
    Router::new().route(
        "/v1beta/models/*rest",
        post(
            move |Query(query): Query<HashMap<String, String>>,
                  Json(body): Json<serde_json::Value>| async move {
                assert_eq!(query.get("key").map(String::as_str), Some("test-key"));
                let prompt = body["contents"][0]["parts"][0]["text"]
                    .as_str()
                    .unwrap_or_default()
                    .to_string();
                assert!(prompt.contains("pirates"), "prompt was {prompt}");
                assert_eq!(
                    body["generationConfig"]["responseMimeType"],
                    "application/json"
                );
                Json(serde_json::json!({
                    "candidates": [{ "content": { "parts": [{ "text": text }] } }]
                }))
            },
        ),
    )
}

#[test]
fn prompt_mentions_theme_and_count() {
    let prompt = build_prompt(Some(" pirates "), 25);
    assert!(prompt.contains("25 unique"));
    assert!(prompt.contains("themes: pirates."));
    let prompt = build_prompt(None, 25);
    assert!(prompt.contains("variety of topics"));
}

#[test]
fn parses_plain_and_fenced_arrays() {
    assert_eq!(
        parse_word_array("[\"A\", \"B\"]").expect("plain"),
        vec!["A".to_string(), "B".to_string()]
    );
    assert_eq!(
        parse_word_array("```json\n[\"A\", \"B\"]\n```").expect("fenced"),
        vec!["A".to_string(), "B".to_string()]
    );
    assert_eq!(
        parse_word_array("```[\"A\"]```").expect("inline fence"),
        vec!["A".to_string()]
    );
}

#[test]
fn rejects_non_string_arrays() {
    assert!(matches!(
        parse_word_array("[1, 2, 3]"),
        Err(GeneratorError::Malformed(_))
    ));
    assert!(matches!(
        parse_word_array("{\"words\": []}"),
        Err(GeneratorError::Malformed(_))
    ));
}

#[tokio::test]
async fn generator_extracts_words_from_model_response() {
    let base_url = serve(reply_with("```json\n[\"ship\", \"parrot\", \"map\"]\n```")).await;
    let generator = HttpWordGenerator::new(config(base_url)).expect("client");
    let words = generator.generate(Some("pirates"), 3).await.expect("words");
    assert_eq!(words, vec!["ship", "parrot", "map"]);
}

#[tokio::test]
async fn generator_reports_http_errors() {
    let router = Router::new().route(
        "/v1beta/models/*rest",
        post(|| async { axum::http::StatusCode::INTERNAL_SERVER_ERROR }),
    );
    let base_url = serve(router).await;
    let generator = HttpWordGenerator::new(config(base_url)).expect("client");
    let err = generator.generate(None, 3).await.expect_err("should fail");
    assert!(matches!(err, GeneratorError::Http(_)));
}

#[tokio::test]
async fn generator_reports_missing_text() {
    let router = Router::new().route(
        "/v1beta/models/*rest",
        post(|| async { Json(serde_json::json!({ "candidates": [] })) }),
    );
    let base_url = serve(router).await;
    let generator = HttpWordGenerator::new(config(base_url)).expect("client");
    let err = generator.generate(None, 3).await.expect_err("should fail");
    assert!(matches!(err, GeneratorError::Malformed(_)));
}
