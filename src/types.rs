use serde::Deserialize;

/// Envelope wrapped around every Otakudesu API payload. The upstream also
/// sends `statusCode`, `timestamp`, `path`, and `responseTime`, none of
/// which this client consumes.
#[derive(Debug, Deserialize)]
pub struct ApiEnvelope<T> {
    pub success: bool,
    pub message: Option<String>,
    pub data: Option<T>,
}

/// A title as it appears in list views (home, ongoing, complete, genre,
/// search). Ongoing cards carry the release-day fields.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnimeCard {
    pub title: String,
    pub slug: String,
    pub poster: String,
    pub episode: Option<String>,
    pub rating: Option<String>,
    pub release_day: Option<String>,
    pub release_date: Option<String>,
    pub total_episode: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HomeData {
    pub ongoing: Vec<AnimeCard>,
    pub complete: Vec<AnimeCard>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: u32,
    pub total_pages: u32,
    pub has_prev_page: bool,
    pub has_next_page: bool,
    pub prev_page: Option<u32>,
    pub next_page: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct AnimeListResponse {
    pub anime: Vec<AnimeCard>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EpisodeListItem {
    pub episode: String,
    pub slug: String,
    pub date: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DownloadLink {
    pub provider: String,
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchLink {
    pub resolution: String,
    pub links: Vec<DownloadLink>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnimeDetail {
    pub title: String,
    pub japanese: String,
    pub score: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub status: String,
    pub total_episode: String,
    pub duration: String,
    pub release_date: String,
    pub studio: String,
    pub genres: Vec<String>,
    pub synopsis: String,
    pub poster: String,
    pub batch: Option<Vec<BatchLink>>,
    pub episodes: Vec<EpisodeListItem>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamingServerItem {
    pub provider: String,
    pub data_content: String,
    pub is_default: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StreamingServer {
    pub quality: String,
    pub servers: Vec<StreamingServerItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DownloadSection {
    pub resolution: String,
    pub links: Vec<DownloadLink>,
}

/// The anime a given episode belongs to, as referenced from episode pages.
#[derive(Debug, Clone, Deserialize)]
pub struct AnimeRef {
    pub title: String,
    pub slug: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpisodeDetail {
    pub title: String,
    pub anime: AnimeRef,
    pub next_episode: Option<String>,
    pub streaming_url: Option<String>,
    #[serde(default)]
    pub streaming_servers: Vec<StreamingServer>,
    #[serde(default)]
    pub download_links: Vec<DownloadSection>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Genre {
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Deserialize)]
pub struct GenreListResponse {
    pub genres: Vec<Genre>,
}

#[derive(Debug, Deserialize)]
pub struct GenreAnimeResponse {
    pub genre: String,
    pub anime: Vec<AnimeCard>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleAnime {
    pub title: String,
    pub slug: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleDay {
    pub day: String,
    pub anime: Vec<ScheduleAnime>,
}

#[derive(Debug, Deserialize)]
pub struct ScheduleResponse {
    pub schedule: Vec<ScheduleDay>,
}

#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    pub anime: Vec<AnimeCard>,
}

/// Result of resolving a streaming server's `dataContent`. The resolver
/// usually returns a playable/embeddable `url`; some hosts only hand back
/// an embed HTML fragment.
#[derive(Debug, Deserialize)]
pub struct ResolveStreamingResponse {
    pub url: Option<String>,
    pub html: Option<String>,
}
