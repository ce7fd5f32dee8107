use crate::env_any;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;
use tera_core::{Error, Result, SearchHit, SearchProvider, SearchQuery, SearchResponse};

fn timeout_ms_from_query(q: &SearchQuery) -> u64 {
    q.timeout_ms.unwrap_or(20_000).clamp(1_000, 60_000)
}

fn serper_api_key_from_env() -> Option<String> {
    env_any(&["TERA_SERPER_API_KEY", "SERPER_API_KEY"])
}

fn brave_api_key_from_env() -> Option<String> {
    env_any(&["TERA_BRAVE_API_KEY", "BRAVE_API_KEY", "BRAVE_SEARCH_API_KEY"])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchBackend {
    DuckDuckGo,
    Serper,
    Brave,
}

impl SearchBackend {
    pub fn all() -> [Self; 3] {
        [Self::DuckDuckGo, Self::Serper, Self::Brave]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DuckDuckGo => "duckduckgo",
            Self::Serper => "serper",
            Self::Brave => "brave",
        }
    }

    /// Whether credentials are present. DuckDuckGo needs none.
    pub fn is_configured(&self) -> bool {
        match self {
            Self::DuckDuckGo => true,
            Self::Serper => serper_api_key_from_env().is_some(),
            Self::Brave => brave_api_key_from_env().is_some(),
        }
    }
}

impl fmt::Display for SearchBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "duckduckgo" | "ddg" | "1" => Ok(Self::DuckDuckGo),
            "serper" | "google" | "2" => Ok(Self::Serper),
            "brave" | "3" => Ok(Self::Brave),
            other => Err(Error::InvalidConfig(format!(
                "unknown search provider {other:?} (allowed: duckduckgo, serper, brave)"
            ))),
        }
    }
}

/// Builds the one backend a session will use. Missing credentials fail here,
/// before any research round starts.
pub fn build_search_provider(
    backend: SearchBackend,
    client: reqwest::Client,
) -> Result<Arc<dyn SearchProvider>> {
    let provider: Arc<dyn SearchProvider> = match backend {
        SearchBackend::DuckDuckGo => Arc::new(DuckDuckGoSearchProvider::from_env(client)),
        SearchBackend::Serper => Arc::new(SerperSearchProvider::from_env(client)?),
        SearchBackend::Brave => Arc::new(BraveSearchProvider::from_env(client)?),
    };
    Ok(provider)
}

fn timings(t0: Instant) -> BTreeMap<String, u128> {
    let mut timings_ms = BTreeMap::new();
    timings_ms.insert("search".to_string(), t0.elapsed().as_millis());
    timings_ms
}

/// Keyless HTML search. Fixed policy: US English region, safe search on,
/// results from the past year.
#[derive(Debug, Clone)]
pub struct DuckDuckGoSearchProvider {
    client: reqwest::Client,
    endpoint: String,
    region: String,
    safe_search: bool,
    time_limit: Option<String>,
}

impl DuckDuckGoSearchProvider {
    pub fn from_env(client: reqwest::Client) -> Self {
        Self {
            client,
            endpoint: env_any(&["TERA_DUCKDUCKGO_ENDPOINT"])
                .unwrap_or_else(|| "https://html.duckduckgo.com/html/".to_string()),
            region: env_any(&["TERA_DUCKDUCKGO_REGION"]).unwrap_or_else(|| "us-en".to_string()),
            safe_search: true,
            time_limit: Some("y".to_string()),
        }
    }
}

/// Result anchors from the HTML endpoint, ads skipped, in page order.
pub fn parse_duckduckgo_html(html: &str) -> Vec<SearchHit> {
    let doc = html_scraper::Html::parse_document(html);
    let (Some(result_sel), Some(anchor_sel)) = (
        html_scraper::Selector::parse("div.result").ok(),
        html_scraper::Selector::parse("a.result__a").ok(),
    ) else {
        return Vec::new();
    };

    let mut out = Vec::new();
    for el in doc.select(&result_sel) {
        if el
            .value()
            .attr("class")
            .is_some_and(|c| c.contains("result--ad"))
        {
            continue;
        }
        let Some(a) = el.select(&anchor_sel).next() else {
            continue;
        };
        let Some(link) = a.value().attr("href").and_then(decode_duckduckgo_link) else {
            continue;
        };
        let title = a.text().collect::<Vec<_>>().join(" ");
        let title = title.split_whitespace().collect::<Vec<_>>().join(" ");
        out.push(SearchHit { title, link });
    }
    out
}

/// Unwraps `//duckduckgo.com/l/?uddg=<target>` redirects; drops other
/// DuckDuckGo-internal links (ads, `/y.js`).
fn decode_duckduckgo_link(href: &str) -> Option<String> {
    let href = href.trim();
    let absolute = if let Some(rest) = href.strip_prefix("//") {
        format!("https://{rest}")
    } else if href.starts_with('/') {
        format!("https://duckduckgo.com{href}")
    } else {
        href.to_string()
    };
    let url = url::Url::parse(&absolute).ok()?;
    let internal = url
        .host_str()
        .is_some_and(|h| h == "duckduckgo.com" || h.ends_with(".duckduckgo.com"));
    if internal {
        if !url.path().starts_with("/l/") {
            return None;
        }
        return url
            .query_pairs()
            .find(|(k, _)| k == "uddg")
            .map(|(_, v)| v.into_owned())
            .filter(|v| v.starts_with("http://") || v.starts_with("https://"));
    }
    matches!(url.scheme(), "http" | "https").then_some(absolute)
}

#[async_trait::async_trait]
impl SearchProvider for DuckDuckGoSearchProvider {
    fn name(&self) -> &'static str {
        "duckduckgo"
    }

    async fn search(&self, q: &SearchQuery) -> Result<SearchResponse> {
        let t0 = Instant::now();
        let timeout_ms = timeout_ms_from_query(q);

        let mut req = self
            .client
            .get(&self.endpoint)
            .query(&[("q", q.query.as_str()), ("kl", self.region.as_str())]);
        if self.safe_search {
            req = req.query(&[("kp", "1")]);
        }
        if let Some(df) = self.time_limit.as_deref() {
            req = req.query(&[("df", df)]);
        }

        let resp = req
            .timeout(std::time::Duration::from_millis(timeout_ms))
            .send()
            .await
            .map_err(|e| Error::Search(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Search(format!("duckduckgo search HTTP {status}")));
        }
        let body = resp.text().await.map_err(|e| Error::Search(e.to_string()))?;

        Ok(SearchResponse {
            results: parse_duckduckgo_html(&body),
            provider: "duckduckgo".to_string(),
            timings_ms: timings(t0),
        })
    }
}

/// Google results through serper.dev.
#[derive(Debug, Clone)]
pub struct SerperSearchProvider {
    client: reqwest::Client,
    api_key: String,
}

impl SerperSearchProvider {
    pub fn from_env(client: reqwest::Client) -> Result<Self> {
        let api_key = serper_api_key_from_env().ok_or_else(|| {
            Error::NotConfigured("missing TERA_SERPER_API_KEY (or SERPER_API_KEY)".to_string())
        })?;
        Ok(Self { client, api_key })
    }

    fn endpoint() -> String {
        env_any(&["TERA_SERPER_ENDPOINT"])
            .unwrap_or_else(|| "https://google.serper.dev/search".to_string())
    }
}

#[derive(Debug, Deserialize)]
struct SerperResponse {
    organic: Option<Vec<SerperOrganic>>,
}

#[derive(Debug, Deserialize)]
struct SerperOrganic {
    title: Option<String>,
    link: Option<String>,
}

#[async_trait::async_trait]
impl SearchProvider for SerperSearchProvider {
    fn name(&self) -> &'static str {
        "serper"
    }

    async fn search(&self, q: &SearchQuery) -> Result<SearchResponse> {
        let t0 = Instant::now();
        let timeout_ms = timeout_ms_from_query(q);

        let body = serde_json::json!({
            "q": q.query,
            "num": q.max_results,
        });
        let resp = self
            .client
            .post(Self::endpoint())
            .header("X-API-KEY", &self.api_key)
            .json(&body)
            .timeout(std::time::Duration::from_millis(timeout_ms))
            .send()
            .await
            .map_err(|e| Error::Search(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Search(format!("serper search HTTP {status}")));
        }

        let parsed: SerperResponse = resp
            .json()
            .await
            .map_err(|e| Error::Search(e.to_string()))?;
        let results = parsed
            .organic
            .unwrap_or_default()
            .into_iter()
            .filter_map(|r| {
                Some(SearchHit {
                    link: r.link?,
                    title: r.title.unwrap_or_default(),
                })
            })
            .collect();

        Ok(SearchResponse {
            results,
            provider: "serper".to_string(),
            timings_ms: timings(t0),
        })
    }
}

#[derive(Debug, Clone)]
pub struct BraveSearchProvider {
    client: reqwest::Client,
    api_key: String,
    country: String,
}

impl BraveSearchProvider {
    pub fn from_env(client: reqwest::Client) -> Result<Self> {
        let api_key = brave_api_key_from_env().ok_or_else(|| {
            Error::NotConfigured("missing TERA_BRAVE_API_KEY (or BRAVE_API_KEY)".to_string())
        })?;
        let country = env_any(&["TERA_BRAVE_COUNTRY"]).unwrap_or_else(|| "us".to_string());
        Ok(Self {
            client,
            api_key,
            country,
        })
    }

    fn endpoint() -> String {
        // Docs: https://api.search.brave.com/res/v1/web/search
        env_any(&["TERA_BRAVE_ENDPOINT"])
            .unwrap_or_else(|| "https://api.search.brave.com/res/v1/web/search".to_string())
    }
}

#[derive(Debug, Deserialize)]
struct BraveWebSearchResponse {
    web: Option<BraveWeb>,
}

#[derive(Debug, Deserialize)]
struct BraveWeb {
    results: Option<Vec<BraveWebResult>>,
}

#[derive(Debug, Deserialize)]
struct BraveWebResult {
    url: String,
    title: Option<String>,
}

#[async_trait::async_trait]
impl SearchProvider for BraveSearchProvider {
    fn name(&self) -> &'static str {
        "brave"
    }

    async fn search(&self, q: &SearchQuery) -> Result<SearchResponse> {
        let t0 = Instant::now();
        let timeout_ms = timeout_ms_from_query(q);

        let resp = self
            .client
            .get(Self::endpoint())
            .header("X-Subscription-Token", &self.api_key)
            .query(&[
                ("q", q.query.clone()),
                ("count", q.max_results.to_string()),
                ("country", self.country.clone()),
            ])
            .timeout(std::time::Duration::from_millis(timeout_ms))
            .send()
            .await
            .map_err(|e| Error::Search(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Search(format!("brave search HTTP {status}")));
        }

        let parsed: BraveWebSearchResponse = resp
            .json()
            .await
            .map_err(|e| Error::Search(e.to_string()))?;
        let results = parsed
            .web
            .and_then(|w| w.results)
            .unwrap_or_default()
            .into_iter()
            .map(|r| SearchHit {
                title: r.title.unwrap_or_default(),
                link: r.url,
            })
            .collect();

        Ok(SearchResponse {
            results,
            provider: "brave".to_string(),
            timings_ms: timings(t0),
        })
    }
}
