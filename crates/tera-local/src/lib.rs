//! Network-backed collaborators for the research coordinator: search
//! adapters, chat-model clients and the model-driven capabilities.

pub mod agents;
pub mod llm;
pub mod prompts;
pub mod search;

/// First non-blank value among `keys`, in order.
pub(crate) fn env_any(keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| {
        std::env::var(k)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    })
}

/// Shared HTTP client. Per-request timeouts are set by each adapter.
pub fn http_client() -> tera_core::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("tera/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| tera_core::Error::NotConfigured(format!("http client: {e}")))
}
