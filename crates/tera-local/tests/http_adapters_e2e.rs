use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::collections::HashMap;
use std::net::SocketAddr;
use tera_core::{Error, Mode, SearchHit, SearchQuery};
use tera_local::llm::{build_chat_model, ChatModelConfig, LlmProvider};
use tera_local::search::{build_search_provider, SearchBackend};

async fn serve(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn query(q: &str, max_results: usize) -> SearchQuery {
    SearchQuery {
        query: q.to_string(),
        max_results,
        timeout_ms: Some(5_000),
    }
}

#[tokio::test]
async fn brave_adapter_sends_key_and_normalizes_results() {
    let app = Router::new().route(
        "/res/v1/web/search",
        get(
            |headers: HeaderMap, q: axum::extract::Query<HashMap<String, String>>| async move {
                if headers.get("x-subscription-token").and_then(|v| v.to_str().ok()) != Some("brave-test") {
                    return (StatusCode::UNAUTHORIZED, Json(serde_json::json!({})));
                }
                assert_eq!(q.get("count").map(String::as_str), Some("5"));
                assert_eq!(q.get("country").map(String::as_str), Some("us"));
                let term = q.get("q").cloned().unwrap_or_default();
                (
                    StatusCode::OK,
                    Json(serde_json::json!({
                        "web": {"results": [
                            {"url": "https://example.com/a", "title": format!("{term} A")},
                            {"url": "https://example.com/b"}
                        ]}
                    })),
                )
            },
        ),
    );
    let addr = serve(app).await;
    std::env::set_var("TERA_BRAVE_ENDPOINT", format!("http://{addr}/res/v1/web/search"));
    std::env::set_var("TERA_BRAVE_API_KEY", "brave-test");
    std::env::remove_var("TERA_BRAVE_COUNTRY");

    let provider = build_search_provider(SearchBackend::Brave, reqwest::Client::new()).unwrap();
    let resp = provider.search(&query("rust", 5)).await.unwrap();

    assert_eq!(resp.provider, "brave");
    assert_eq!(
        resp.results,
        vec![
            SearchHit::new("rust A", "https://example.com/a"),
            SearchHit::new("", "https://example.com/b"),
        ]
    );
}

#[tokio::test]
async fn serper_adapter_posts_query_and_surfaces_http_errors() {
    let app = Router::new().route(
        "/search",
        post(|headers: HeaderMap, Json(body): Json<serde_json::Value>| async move {
            if headers.get("x-api-key").and_then(|v| v.to_str().ok()) != Some("serper-test") {
                return (StatusCode::UNAUTHORIZED, Json(serde_json::json!({})));
            }
            if body["q"] == "boom" {
                return (StatusCode::INTERNAL_SERVER_ERROR, Json(serde_json::json!({})));
            }
            assert_eq!(body["num"], 2);
            (
                StatusCode::OK,
                Json(serde_json::json!({
                    "organic": [
                        {"title": "Paris", "link": "https://en.wikipedia.org/wiki/Paris"},
                        {"title": "Capital", "link": "https://example.com/capital"}
                    ]
                })),
            )
        }),
    );
    let addr = serve(app).await;
    std::env::set_var("TERA_SERPER_ENDPOINT", format!("http://{addr}/search"));
    std::env::set_var("TERA_SERPER_API_KEY", "serper-test");

    let provider = build_search_provider(SearchBackend::Serper, reqwest::Client::new()).unwrap();
    let resp = provider.search(&query("capital of France", 2)).await.unwrap();
    assert_eq!(resp.results.len(), 2);
    assert_eq!(resp.results[0].link, "https://en.wikipedia.org/wiki/Paris");

    let err = provider.search(&query("boom", 2)).await.unwrap_err();
    assert!(matches!(err, Error::Search(ref m) if m.contains("HTTP 500")), "{err}");
}

#[tokio::test]
async fn duckduckgo_adapter_scrapes_html_with_fixed_policy() {
    let app = Router::new().route(
        "/html/",
        get(|q: axum::extract::Query<HashMap<String, String>>| async move {
            assert_eq!(q.get("kl").map(String::as_str), Some("us-en"));
            assert_eq!(q.get("kp").map(String::as_str), Some("1"));
            assert_eq!(q.get("df").map(String::as_str), Some("y"));
            axum::response::Html(
                r#"<div class="result"><a class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fexample.org%2Fparis">Paris</a></div>"#,
            )
        }),
    );
    let addr = serve(app).await;
    std::env::set_var("TERA_DUCKDUCKGO_ENDPOINT", format!("http://{addr}/html/"));

    let provider =
        build_search_provider(SearchBackend::DuckDuckGo, reqwest::Client::new()).unwrap();
    let resp = provider.search(&query("paris", 2)).await.unwrap();

    assert_eq!(resp.results, vec![SearchHit::new("Paris", "https://example.org/paris")]);
}

#[tokio::test]
async fn openai_compatible_client_round_trips_a_chat() {
    let app = Router::new().route(
        "/chat/completions",
        post(|headers: HeaderMap, Json(body): Json<serde_json::Value>| async move {
            assert_eq!(
                headers.get("authorization").and_then(|v| v.to_str().ok()),
                Some("Bearer openai-test")
            );
            assert_eq!(body["model"], "gpt-4");
            assert_eq!(body["messages"][0]["role"], "system");
            // OpenAI is not a JSON-mode host.
            assert!(body.get("response_format").is_none());
            Json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "{\"ok\":true}"}}]
            }))
        }),
    );
    let addr = serve(app).await;
    std::env::set_var("TERA_LLM_BASE_URL", format!("http://{addr}"));
    std::env::set_var("TERA_OPENAI_API_KEY", "openai-test");
    std::env::remove_var("TERA_OPENAI_MODEL_DEEP");
    std::env::remove_var("OPENAI_MODEL_DEEP");

    let model = build_chat_model(
        &ChatModelConfig::new(LlmProvider::OpenAi, Mode::Deep),
        reqwest::Client::new(),
    )
    .unwrap();
    assert_eq!(model.model(), "gpt-4");

    let out = model.chat("sys", "user", true).await.unwrap();
    assert_eq!(out, "{\"ok\":true}");
}
