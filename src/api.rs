use anyhow::{Context, Result, anyhow, bail};
use regex::Regex;
use reqwest::Client;
use scraper::{Html, Selector};
use serde::de::DeserializeOwned;

use crate::types::{
    AnimeDetail, AnimeListResponse, ApiEnvelope, EpisodeDetail, GenreAnimeResponse,
    GenreListResponse, HomeData, ResolveStreamingResponse, ScheduleResponse, SearchResponse,
    StreamingServer, StreamingServerItem,
};

pub const DEFAULT_BASE_URL: &str = "https://otakudesu-api.dakunesu.workers.dev";
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0 Safari/537.36";

/// Client for the Otakudesu catalog API. All the heavy lifting (scraping,
/// host resolution) happens upstream; this client only fetches and unwraps
/// the JSON envelope.
pub struct CatalogClient {
    client: Client,
    base_url: String,
}

impl CatalogClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, endpoint);
        let response = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            bail!("Otakudesu API HTTP {status} for {endpoint}");
        }
        let envelope: ApiEnvelope<T> = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse response for {endpoint}"))?;
        Self::extract_data(envelope)
    }

    fn extract_data<T>(envelope: ApiEnvelope<T>) -> Result<T> {
        if !envelope.success {
            bail!(
                "Otakudesu API error: {}",
                envelope
                    .message
                    .unwrap_or_else(|| String::from("request failed"))
            );
        }
        envelope
            .data
            .ok_or_else(|| anyhow!("Otakudesu API returned empty response"))
    }

    pub async fn home(&self) -> Result<HomeData> {
        self.get_json("/api/home").await
    }

    pub async fn ongoing(&self, page: u32) -> Result<AnimeListResponse> {
        self.get_json(&format!("/api/ongoing?page={page}")).await
    }

    pub async fn complete(&self, page: u32) -> Result<AnimeListResponse> {
        self.get_json(&format!("/api/complete?page={page}")).await
    }

    pub async fn anime_detail(&self, slug: &str) -> Result<AnimeDetail> {
        self.get_json(&format!("/api/anime/{slug}")).await
    }

    pub async fn episode_detail(&self, slug: &str) -> Result<EpisodeDetail> {
        self.get_json(&format!("/api/episode/{slug}")).await
    }

    pub async fn genres(&self) -> Result<GenreListResponse> {
        self.get_json("/api/genres").await
    }

    pub async fn anime_by_genre(&self, genre: &str, page: u32) -> Result<GenreAnimeResponse> {
        self.get_json(&format!("/api/genres/{genre}?page={page}"))
            .await
    }

    pub async fn schedule(&self) -> Result<ScheduleResponse> {
        self.get_json("/api/schedule").await
    }

    pub async fn search(&self, query: &str) -> Result<SearchResponse> {
        let encoded: String = url::form_urlencoded::byte_serialize(query.as_bytes()).collect();
        self.get_json(&format!("/api/search?q={encoded}")).await
    }

    pub async fn resolve_streaming(&self, data_content: &str) -> Result<ResolveStreamingResponse> {
        let body = serde_json::json!({ "dataContent": data_content });
        let response = self
            .client
            .post(format!("{}/api/resolve-streaming", self.base_url))
            .header("Accept", "application/json")
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            bail!("Otakudesu API HTTP {status} for /api/resolve-streaming");
        }
        let envelope: ApiEnvelope<ResolveStreamingResponse> = serde_json::from_str(&text)
            .with_context(|| "failed to parse resolve-streaming response")?;
        Self::extract_data(envelope)
    }
}

/// Numeric rank of a quality label: "1080p" sorts above "480p", labels
/// without digits rank last.
pub fn quality_rank(quality: &str) -> u32 {
    let re = Regex::new(r"(\d+)").expect("valid regex");
    re.captures(quality)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0)
}

/// Extract the episode number from an episode title like
/// "Boruto Episode 12 Subtitle Indonesia". Falls back to "1".
pub fn episode_number_from_title(title: &str) -> String {
    let re = Regex::new(r"(?i)episode\s*(\d+)").expect("valid regex");
    re.captures(title)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| String::from("1"))
}

/// Streaming servers flattened into a single list, best quality first and
/// the upstream default server first within each quality.
pub fn ranked_servers(servers: &[StreamingServer]) -> Vec<(String, StreamingServerItem)> {
    let mut qualities: Vec<&StreamingServer> = servers.iter().collect();
    qualities.sort_by(|a, b| quality_rank(&b.quality).cmp(&quality_rank(&a.quality)));

    let mut ranked = Vec::new();
    for group in qualities {
        let mut items: Vec<&StreamingServerItem> = group.servers.iter().collect();
        items.sort_by_key(|item| !item.is_default.unwrap_or(false));
        for item in items {
            ranked.push((group.quality.clone(), item.clone()));
        }
    }
    ranked
}

/// Pull the embed target out of an HTML fragment returned by the streaming
/// resolver when no direct URL is available.
pub fn embed_src_from_html(html: &str) -> Option<String> {
    let document = Html::parse_fragment(html);
    let iframe_sel = Selector::parse("iframe[src]").expect("valid CSS selector");
    let video_sel = Selector::parse("video[src], video source[src]").expect("valid CSS selector");
    document
        .select(&iframe_sel)
        .chain(document.select(&video_sel))
        .filter_map(|element| element.value().attr("src"))
        .map(str::to_string)
        .next()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StreamingServer;

    #[test]
    fn quality_rank_reads_leading_digits() {
        assert_eq!(quality_rank("1080p"), 1080);
        assert_eq!(quality_rank("480p"), 480);
        assert_eq!(quality_rank("HD 720p"), 720);
        assert_eq!(quality_rank("auto"), 0);
    }

    #[test]
    fn episode_number_extraction() {
        assert_eq!(
            episode_number_from_title("Boruto Episode 12 Subtitle Indonesia"),
            "12"
        );
        assert_eq!(episode_number_from_title("EPISODE 3"), "3");
        assert_eq!(episode_number_from_title("OVA Special"), "1");
    }

    #[test]
    fn ranked_servers_prefers_quality_then_default() {
        let servers = vec![
            StreamingServer {
                quality: "480p".into(),
                servers: vec![StreamingServerItem {
                    provider: "low".into(),
                    data_content: "c1".into(),
                    is_default: Some(true),
                }],
            },
            StreamingServer {
                quality: "1080p".into(),
                servers: vec![
                    StreamingServerItem {
                        provider: "alt".into(),
                        data_content: "c2".into(),
                        is_default: None,
                    },
                    StreamingServerItem {
                        provider: "main".into(),
                        data_content: "c3".into(),
                        is_default: Some(true),
                    },
                ],
            },
        ];

        let ranked = ranked_servers(&servers);
        assert_eq!(ranked.len(), 3);
        assert_eq!(ranked[0].0, "1080p");
        assert_eq!(ranked[0].1.provider, "main");
        assert_eq!(ranked[1].1.provider, "alt");
        assert_eq!(ranked[2].0, "480p");
    }

    #[test]
    fn embed_src_from_iframe() {
        let html = r#"<div><iframe src="https://desustream.example/embed/abc" allowfullscreen></iframe></div>"#;
        assert_eq!(
            embed_src_from_html(html).as_deref(),
            Some("https://desustream.example/embed/abc")
        );
    }

    #[test]
    fn embed_src_from_video_source() {
        let html = r#"<video controls><source src="https://cdn.example/ep1.mp4" type="video/mp4"></video>"#;
        assert_eq!(
            embed_src_from_html(html).as_deref(),
            Some("https://cdn.example/ep1.mp4")
        );
    }

    #[test]
    fn embed_src_missing() {
        assert_eq!(embed_src_from_html("<p>no player here</p>"), None);
    }

    #[test]
    fn envelope_failure_carries_message() {
        let envelope: ApiEnvelope<HomeData> = serde_json::from_str(
            r#"{"success": false, "message": "not found", "data": null}"#,
        )
        .unwrap();
        let err = CatalogClient::extract_data(envelope).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn envelope_success_without_data_is_an_error() {
        let envelope: ApiEnvelope<HomeData> =
            serde_json::from_str(r#"{"success": true, "message": null, "data": null}"#).unwrap();
        assert!(CatalogClient::extract_data(envelope).is_err());
    }

    #[test]
    fn anime_card_deserializes_from_api_shape() {
        let card: crate::types::AnimeCard = serde_json::from_str(
            r#"{
                "title": "Frieren",
                "slug": "frieren-sub-indo",
                "poster": "https://img.example/frieren.jpg",
                "episode": "Episode 28",
                "releaseDay": "Jumat",
                "releaseDate": "03 Des"
            }"#,
        )
        .unwrap();
        assert_eq!(card.slug, "frieren-sub-indo");
        assert_eq!(card.release_day.as_deref(), Some("Jumat"));
        assert!(card.rating.is_none());
    }
}
