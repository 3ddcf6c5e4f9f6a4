use anyhow::{Context, Result, bail};
use chrono::DateTime;
use clap::Parser;
use dialoguer::{FuzzySelect, Select, theme::ColorfulTheme};

mod api;
mod config;
mod player;
mod schedule;
mod storage;
mod types;

use api::{CatalogClient, embed_src_from_html, episode_number_from_title};
use config::Settings;
use player::{choose_server, launch_player};
use schedule::{ReleaseLocale, next_release_now};
use storage::{FileStore, WatchHistoryEntry, WatchState, WatchedEpisode};
use types::{AnimeCard, AnimeDetail, DownloadLink, EpisodeDetail, Pagination};

const CONTINUE_WATCHING_LIMIT: usize = 20;

#[derive(Debug, Parser)]
#[command(
    name = "sukanime",
    about = "Browse, bookmark, and stream anime from Otakudesu.",
    version
)]
struct Cli {
    /// Browse currently airing titles.
    #[arg(long)]
    ongoing: bool,

    /// Browse finished titles.
    #[arg(long)]
    complete: bool,

    /// Page to start browsing from.
    #[arg(long, default_value_t = 1, value_name = "N")]
    page: u32,

    /// Browse titles for a genre slug (e.g. "action").
    #[arg(long, value_name = "SLUG")]
    genre: Option<String>,

    /// List all genres and pick one.
    #[arg(long)]
    genres: bool,

    /// Show the weekly release schedule.
    #[arg(long)]
    schedule: bool,

    /// Resume from watch history.
    #[arg(long)]
    history: bool,

    /// Wipe watch history.
    #[arg(long)]
    clear_history: bool,

    /// Continue watching: the latest episode per title.
    #[arg(long = "continue")]
    continue_watching: bool,

    /// Pick from saved bookmarks.
    #[arg(long)]
    bookmarks: bool,

    /// Toggle a bookmark for the selected title instead of playing it.
    #[arg(long)]
    bookmark: bool,

    /// Open episode download links in the browser instead of streaming.
    #[arg(long)]
    download: bool,

    /// Jump straight to an episode number.
    #[arg(short = 'e', long, value_name = "NUMBER")]
    episode: Option<String>,

    #[arg(value_name = "QUERY")]
    query: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let result = run().await;
    if let Err(err) = &result {
        eprintln!("error: {err:?}");
    }
    result
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load()?;
    let client = CatalogClient::new(&settings.api_base_url)?;
    let watch_state = WatchState::new(FileStore::open());

    if cli.clear_history {
        watch_state.clear_history();
        println!("Watch history cleared.");
        return Ok(());
    }
    if cli.schedule {
        return show_schedule(&cli, &client, &settings, &watch_state).await;
    }
    if cli.history {
        return resume_from_history(&cli, &client, &settings, &watch_state).await;
    }
    if cli.continue_watching {
        return continue_watching(&cli, &client, &settings, &watch_state).await;
    }
    if cli.bookmarks {
        return browse_bookmarks(&cli, &client, &settings, &watch_state).await;
    }
    if cli.genres || cli.genre.is_some() {
        return browse_genre(&cli, &client, &settings, &watch_state).await;
    }
    if cli.ongoing || cli.complete {
        return browse_listing(&cli, &client, &settings, &watch_state).await;
    }
    if cli.query.is_empty() {
        return show_home(&cli, &client, &settings, &watch_state).await;
    }

    let query = cli.query.join(" ");
    let results = client.search(&query).await?.anime;
    if results.is_empty() {
        bail!("No results for \"{query}\"");
    }

    let labels: Vec<String> = results.iter().map(card_label).collect();
    let selection = FuzzySelect::with_theme(&theme())
        .with_prompt("Select a title (Esc to cancel)")
        .items(&labels)
        .default(0)
        .interact_opt()?;
    let Some(idx) = selection else {
        println!("Cancelled.");
        return Ok(());
    };
    let card = results[idx].clone();

    if cli.bookmark {
        toggle_bookmark(&watch_state, &card);
        return Ok(());
    }
    play_anime(&cli, &client, &settings, &watch_state, &card.slug, None).await
}

fn theme() -> ColorfulTheme {
    ColorfulTheme::default()
}

/// List label for an anime card. Ongoing cards get their release
/// countdown appended ("Besok", "2 hari lagi", ...).
fn card_label(card: &AnimeCard) -> String {
    let mut label = card.title.clone();
    if let Some(episode) = &card.episode {
        label.push_str(&format!(" [{episode}]"));
    }
    if let Some(rating) = &card.rating {
        if !rating.is_empty() {
            label.push_str(&format!(" ★{rating}"));
        }
    }
    if let Some(total) = &card.total_episode {
        if !total.is_empty() {
            label.push_str(&format!(" · {total} eps"));
        }
    }
    if let Some(day) = &card.release_day {
        if let Some(next) =
            next_release_now(ReleaseLocale::indonesian(), day, card.release_date.as_deref())
        {
            // Mirror the web UI's urgency colors: just released / airing
            // tomorrow get a marker, everything else just the text.
            let marker = if next.just_released {
                "● "
            } else if next.is_soon {
                "○ "
            } else {
                ""
            };
            label.push_str(&format!(" · {marker}{}", next.text));
        }
    }
    label
}

fn history_label(entry: &WatchHistoryEntry) -> String {
    let watched = DateTime::from_timestamp_millis(entry.watched_at)
        .map(|ts| ts.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| String::from("unknown"));
    format!(
        "{} · episode {} · watched {}",
        entry.anime_title, entry.episode_number, watched
    )
}

fn toggle_bookmark(watch_state: &WatchState<FileStore>, card: &AnimeCard) {
    if watch_state.is_bookmarked(&card.slug) {
        watch_state.remove_bookmark(&card.slug);
        println!("Removed bookmark for {}.", card.title);
    } else {
        watch_state.add_bookmark(&card.slug, &card.title, &card.poster);
        println!("Bookmarked {}.", card.title);
    }
}

enum HomePick {
    Resume(WatchHistoryEntry),
    Card(AnimeCard),
}

/// Default view when no query is given: continue-watching lanes followed
/// by the ongoing and complete rows from the home endpoint.
async fn show_home(
    cli: &Cli,
    client: &CatalogClient,
    settings: &Settings,
    watch_state: &WatchState<FileStore>,
) -> Result<()> {
    let home = client.home().await?;
    let lanes = watch_state.continue_watching(CONTINUE_WATCHING_LIMIT);

    let mut labels = Vec::new();
    let mut picks = Vec::new();
    for entry in lanes {
        labels.push(format!(
            "Continue · {} (episode {})",
            entry.anime_title, entry.episode_number
        ));
        picks.push(HomePick::Resume(entry));
    }
    for card in home.ongoing {
        labels.push(format!("Ongoing · {}", card_label(&card)));
        picks.push(HomePick::Card(card));
    }
    for card in home.complete {
        labels.push(format!("Complete · {}", card_label(&card)));
        picks.push(HomePick::Card(card));
    }
    if labels.is_empty() {
        println!("Nothing to show. Try `sukanime <name>`.");
        return Ok(());
    }

    let selection = FuzzySelect::with_theme(&theme())
        .with_prompt("Select a title (Esc to cancel)")
        .items(&labels)
        .default(0)
        .interact_opt()?;
    let Some(idx) = selection else {
        println!("Cancelled.");
        return Ok(());
    };

    match &picks[idx] {
        HomePick::Resume(entry) => {
            play_anime(
                cli,
                client,
                settings,
                watch_state,
                &entry.anime_slug,
                Some(entry.episode_slug.clone()),
            )
            .await
        }
        HomePick::Card(card) => {
            if cli.bookmark {
                toggle_bookmark(watch_state, card);
                return Ok(());
            }
            play_anime(cli, client, settings, watch_state, &card.slug, None).await
        }
    }
}

enum PagePick {
    Card(AnimeCard),
    Jump(u32),
    Cancel,
}

fn pick_from_page(cards: &[AnimeCard], pagination: &Pagination) -> Result<PagePick> {
    let mut labels: Vec<String> = cards.iter().map(card_label).collect();
    let next = pagination
        .has_next_page
        .then(|| pagination.next_page.unwrap_or(pagination.current_page + 1));
    let prev = pagination.has_prev_page.then(|| {
        pagination
            .prev_page
            .unwrap_or_else(|| pagination.current_page.saturating_sub(1).max(1))
    });
    if let Some(page) = next {
        labels.push(format!("Next page ({page}) →"));
    }
    if let Some(page) = prev {
        labels.push(format!("← Previous page ({page})"));
    }

    let selection = Select::with_theme(&theme())
        .with_prompt("Select a title (Esc to cancel)")
        .items(&labels)
        .default(0)
        .interact_opt()?;
    let Some(idx) = selection else {
        return Ok(PagePick::Cancel);
    };
    if idx < cards.len() {
        return Ok(PagePick::Card(cards[idx].clone()));
    }

    let mut offset = idx - cards.len();
    if let Some(page) = next {
        if offset == 0 {
            return Ok(PagePick::Jump(page));
        }
        offset -= 1;
    }
    if let Some(page) = prev {
        if offset == 0 {
            return Ok(PagePick::Jump(page));
        }
    }
    Ok(PagePick::Cancel)
}

async fn browse_listing(
    cli: &Cli,
    client: &CatalogClient,
    settings: &Settings,
    watch_state: &WatchState<FileStore>,
) -> Result<()> {
    let mut page = cli.page;
    loop {
        let listing = if cli.complete {
            client.complete(page).await?
        } else {
            client.ongoing(page).await?
        };
        let heading = if cli.complete { "complete" } else { "ongoing" };
        println!(
            "Showing {heading} titles, page {}/{}.",
            listing.pagination.current_page, listing.pagination.total_pages
        );

        match pick_from_page(&listing.anime, &listing.pagination)? {
            PagePick::Card(card) => {
                if cli.bookmark {
                    toggle_bookmark(watch_state, &card);
                    continue;
                }
                play_anime(cli, client, settings, watch_state, &card.slug, None).await?;
            }
            PagePick::Jump(target) => page = target,
            PagePick::Cancel => return Ok(()),
        }
    }
}

async fn browse_genre(
    cli: &Cli,
    client: &CatalogClient,
    settings: &Settings,
    watch_state: &WatchState<FileStore>,
) -> Result<()> {
    let slug = match &cli.genre {
        Some(slug) => slug.clone(),
        None => {
            let genres = client.genres().await?.genres;
            if genres.is_empty() {
                bail!("No genres available.");
            }
            let labels: Vec<String> = genres.iter().map(|genre| genre.name.clone()).collect();
            let selection = FuzzySelect::with_theme(&theme())
                .with_prompt("Select a genre (Esc to cancel)")
                .items(&labels)
                .default(0)
                .interact_opt()?;
            let Some(idx) = selection else {
                println!("Cancelled.");
                return Ok(());
            };
            genres[idx].slug.clone()
        }
    };

    let mut page = cli.page;
    loop {
        let listing = client.anime_by_genre(&slug, page).await?;
        println!(
            "Genre {}: page {}/{}.",
            listing.genre, listing.pagination.current_page, listing.pagination.total_pages
        );

        match pick_from_page(&listing.anime, &listing.pagination)? {
            PagePick::Card(card) => {
                if cli.bookmark {
                    toggle_bookmark(watch_state, &card);
                    continue;
                }
                play_anime(cli, client, settings, watch_state, &card.slug, None).await?;
            }
            PagePick::Jump(target) => page = target,
            PagePick::Cancel => return Ok(()),
        }
    }
}

async fn show_schedule(
    cli: &Cli,
    client: &CatalogClient,
    settings: &Settings,
    watch_state: &WatchState<FileStore>,
) -> Result<()> {
    let mut schedule = client.schedule().await?.schedule;
    if schedule.is_empty() {
        println!("Schedule is empty.");
        return Ok(());
    }

    // Closest release day first; days with an unrecognized name sink to
    // the bottom.
    let locale = ReleaseLocale::indonesian();
    schedule.sort_by_key(|day| {
        next_release_now(locale, &day.day, None).map_or(u32::MAX, |next| next.days_until)
    });

    let mut labels = Vec::new();
    let mut slugs = Vec::new();
    for day in &schedule {
        let countdown = next_release_now(locale, &day.day, None)
            .map(|next| format!(" · {}", next.text))
            .unwrap_or_default();
        for anime in &day.anime {
            labels.push(format!("[{}{countdown}] {}", day.day, anime.title));
            slugs.push(anime.slug.clone());
        }
    }
    if labels.is_empty() {
        println!("No scheduled titles this week.");
        return Ok(());
    }

    let selection = FuzzySelect::with_theme(&theme())
        .with_prompt("Weekly schedule (Esc to quit)")
        .items(&labels)
        .default(0)
        .interact_opt()?;
    let Some(idx) = selection else {
        return Ok(());
    };
    play_anime(cli, client, settings, watch_state, &slugs[idx], None).await
}

async fn resume_from_history(
    cli: &Cli,
    client: &CatalogClient,
    settings: &Settings,
    watch_state: &WatchState<FileStore>,
) -> Result<()> {
    let history = watch_state.history();
    if history.is_empty() {
        println!("Watch history is empty.");
        return Ok(());
    }

    let labels: Vec<String> = history.iter().map(history_label).collect();
    let selection = Select::with_theme(&theme())
        .with_prompt("Select an entry to resume (Esc to cancel)")
        .items(&labels)
        .default(0)
        .interact_opt()?;
    let Some(idx) = selection else {
        println!("Cancelled.");
        return Ok(());
    };
    let entry = history[idx].clone();
    play_anime(
        cli,
        client,
        settings,
        watch_state,
        &entry.anime_slug,
        Some(entry.episode_slug),
    )
    .await
}

async fn continue_watching(
    cli: &Cli,
    client: &CatalogClient,
    settings: &Settings,
    watch_state: &WatchState<FileStore>,
) -> Result<()> {
    let lanes = watch_state.continue_watching(CONTINUE_WATCHING_LIMIT);
    if lanes.is_empty() {
        println!("Nothing to continue. Watch something first.");
        return Ok(());
    }

    let labels: Vec<String> = lanes.iter().map(history_label).collect();
    let selection = Select::with_theme(&theme())
        .with_prompt("Continue watching (Esc to cancel)")
        .items(&labels)
        .default(0)
        .interact_opt()?;
    let Some(idx) = selection else {
        println!("Cancelled.");
        return Ok(());
    };
    let entry = lanes[idx].clone();
    play_anime(
        cli,
        client,
        settings,
        watch_state,
        &entry.anime_slug,
        Some(entry.episode_slug),
    )
    .await
}

async fn browse_bookmarks(
    cli: &Cli,
    client: &CatalogClient,
    settings: &Settings,
    watch_state: &WatchState<FileStore>,
) -> Result<()> {
    let bookmarks = watch_state.bookmarks();
    if bookmarks.is_empty() {
        println!("No bookmarks saved yet. Add one with `sukanime --bookmark <name>`.");
        return Ok(());
    }

    let labels: Vec<String> = bookmarks
        .iter()
        .map(|bookmark| {
            let added = DateTime::from_timestamp_millis(bookmark.added_at)
                .map(|ts| ts.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| String::from("unknown"));
            format!("{} · added {added}", bookmark.title)
        })
        .collect();
    let selection = Select::with_theme(&theme())
        .with_prompt("Select a bookmark (Esc to cancel)")
        .items(&labels)
        .default(0)
        .interact_opt()?;
    let Some(idx) = selection else {
        println!("Cancelled.");
        return Ok(());
    };
    play_anime(
        cli,
        client,
        settings,
        watch_state,
        &bookmarks[idx].slug,
        None,
    )
    .await
}

/// The watch loop: pick an episode, resolve a stream, hand it to the
/// player, record the watch, advance.
async fn play_anime(
    cli: &Cli,
    client: &CatalogClient,
    settings: &Settings,
    watch_state: &WatchState<FileStore>,
    anime_slug: &str,
    resume_episode_slug: Option<String>,
) -> Result<()> {
    let detail = client.anime_detail(anime_slug).await?;
    if detail.episodes.is_empty() {
        bail!("No episodes listed for {}", detail.title);
    }
    println!("{} ({})", detail.title, detail.japanese);
    println!(
        "{} · {} · {} episodes · {} · scored {}",
        detail.kind, detail.status, detail.total_episode, detail.duration, detail.score
    );
    println!(
        "{} · aired {} · {}",
        detail.studio,
        detail.release_date,
        detail.genres.join(", ")
    );
    if !detail.synopsis.is_empty() {
        println!("{}", detail.synopsis);
    }
    println!("{} episodes listed.", detail.episodes.len());

    let last_watched = watch_state.last_watched(anime_slug);
    if let Some(prev) = &last_watched {
        println!("Last watched: episode {}.", prev.episode_number);
    }

    // --episode flag first, then an explicit resume target; both jump
    // straight into playback. Otherwise default the list selection to the
    // last-watched episode.
    let flagged = cli.episode.as_ref().and_then(|number| {
        detail
            .episodes
            .iter()
            .find(|item| episode_number_from_title(&item.episode) == number.trim())
            .map(|item| item.slug.clone())
    });
    if cli.episode.is_some() && flagged.is_none() {
        println!(
            "Episode {} not found for {}. Showing the episode list.",
            cli.episode.as_deref().unwrap_or_default(),
            detail.title
        );
    }
    let resume = resume_episode_slug
        .filter(|slug| detail.episodes.iter().any(|item| &item.slug == slug));

    let (mut current_slug, mut skip_selection) = match flagged.or(resume) {
        Some(slug) => (slug, true),
        None => (
            last_watched
                .as_ref()
                .and_then(|prev| {
                    detail
                        .episodes
                        .iter()
                        .find(|item| item.slug == prev.episode_slug)
                })
                .map(|item| item.slug.clone())
                .unwrap_or_else(|| detail.episodes[0].slug.clone()),
            false,
        ),
    };

    let labels: Vec<String> = detail
        .episodes
        .iter()
        .map(|item| format!("{} ({})", item.episode, item.date))
        .collect();

    loop {
        let default_idx = detail
            .episodes
            .iter()
            .position(|item| item.slug == current_slug)
            .unwrap_or(0);

        let idx = if skip_selection {
            skip_selection = false;
            default_idx
        } else {
            let selection = Select::with_theme(&theme())
                .with_prompt("Episode to play (Enter to select, Esc to cancel)")
                .items(&labels)
                .default(default_idx)
                .interact_opt()?;
            let Some(i) = selection else {
                println!("Exiting playback loop.");
                return Ok(());
            };
            i
        };

        let chosen = detail.episodes[idx].clone();
        let auto_advance = idx == default_idx;

        println!("Fetching {}...", chosen.episode);
        let episode = match client.episode_detail(&chosen.slug).await {
            Ok(episode) => episode,
            Err(err) => {
                println!("Error fetching episode: {err}");
                continue;
            }
        };

        if cli.download {
            open_download_link(&detail, &episode)?;
            continue;
        }

        let stream_url = match resolve_stream_url(client, &episode).await {
            Ok(Some(url)) => url,
            Ok(None) => {
                println!(
                    "Could not resolve a stream for {}. Try another server or episode.",
                    chosen.episode
                );
                continue;
            }
            Err(err) => {
                println!("Error resolving stream: {err}");
                continue;
            }
        };

        launch_player(&settings.player, &stream_url, &episode.title).await?;

        watch_state.record_watch(WatchedEpisode {
            anime_slug: episode.anime.slug.clone(),
            anime_title: episode.anime.title.clone(),
            anime_poster: detail.poster.clone(),
            episode_slug: chosen.slug.clone(),
            episode_number: episode_number_from_title(&episode.title),
        });

        // Advance along the upstream's own next-episode pointer.
        let next_slug = episode
            .next_episode
            .filter(|slug| detail.episodes.iter().any(|item| &item.slug == slug));
        match (auto_advance, next_slug) {
            (true, Some(next)) => current_slug = next,
            (true, None) => {
                println!("No further episodes found. Exiting.");
                return Ok(());
            }
            (false, candidate) => current_slug = candidate.unwrap_or(chosen.slug),
        }
    }
}

/// Prefer the upstream's default streaming URL; otherwise pick a server
/// and resolve its `dataContent`, falling back to the embed HTML when the
/// resolver returns no direct URL.
async fn resolve_stream_url(
    client: &CatalogClient,
    episode: &EpisodeDetail,
) -> Result<Option<String>> {
    if let Some(url) = &episode.streaming_url {
        if !url.is_empty() {
            return Ok(Some(url.clone()));
        }
    }

    let Some((quality, server)) = choose_server(&episode.streaming_servers)? else {
        return Ok(None);
    };
    println!("Resolving {quality} stream via {}...", server.provider);
    let resolved = client.resolve_streaming(&server.data_content).await?;
    if let Some(url) = resolved.url {
        if !url.is_empty() {
            return Ok(Some(url));
        }
    }
    Ok(resolved.html.as_deref().and_then(embed_src_from_html))
}

/// Per-episode download links, falling back to the title's batch links
/// when the episode page offers none.
fn open_download_link(detail: &AnimeDetail, episode: &EpisodeDetail) -> Result<()> {
    let sections: Vec<(String, &[DownloadLink])> = if episode.download_links.is_empty() {
        detail
            .batch
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|batch| (format!("Batch {}", batch.resolution), batch.links.as_slice()))
            .collect()
    } else {
        episode
            .download_links
            .iter()
            .map(|section| (section.resolution.clone(), section.links.as_slice()))
            .collect()
    };
    if sections.is_empty() {
        println!("No download links for this episode.");
        return Ok(());
    }

    let resolution_labels: Vec<String> = sections
        .iter()
        .map(|(resolution, links)| format!("{resolution} ({} providers)", links.len()))
        .collect();
    let selection = Select::with_theme(&theme())
        .with_prompt("Select a resolution (Esc to cancel)")
        .items(&resolution_labels)
        .default(0)
        .interact_opt()?;
    let Some(idx) = selection else {
        return Ok(());
    };
    let (resolution, links) = &sections[idx];
    if links.is_empty() {
        println!("No providers for {resolution}.");
        return Ok(());
    }

    let provider_labels: Vec<String> = links.iter().map(|link| link.provider.clone()).collect();
    let selection = Select::with_theme(&theme())
        .with_prompt("Select a provider (Esc to cancel)")
        .items(&provider_labels)
        .default(0)
        .interact_opt()?;
    let Some(idx) = selection else {
        return Ok(());
    };
    let link = &links[idx];

    println!("Opening {} in the browser...", link.provider);
    open::that(&link.url).with_context(|| format!("failed to open {}", link.url))?;
    Ok(())
}
