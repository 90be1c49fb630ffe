use anyhow::Result;
use clap::{Parser, Subcommand};
use futures::stream::{self, StreamExt};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::Config;
use crate::core::{self, Error, OrderBy, Scraper, SearchQuery, VideoRecord};

#[derive(Parser)]
#[command(name = "vidscrape")]
#[command(about = "Normalized video metadata from Vimeo, Blip.tv and Google Video")]
#[command(version)]
pub struct Cli {
    /// Configuration file (default: ./vidscrape.toml when present)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Fetch metadata for one or more videos
    Video {
        #[arg(value_name = "URL", required = true)]
        urls: Vec<String>,

        /// Number of concurrent fetches (default from config)
        #[arg(short = 'j', long)]
        concurrent: Option<usize>,
    },

    /// Walk a user, channel, album or show feed
    Feed {
        #[arg(value_name = "URL")]
        url: String,

        /// Stop after this many videos
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Search one site
    Search {
        /// Suite id, see `vidscrape suites`
        suite: String,

        #[arg(value_name = "TERMS", required = true)]
        terms: Vec<String>,

        /// Terms the results must not contain
        #[arg(short, long)]
        exclude: Vec<String>,

        /// latest or relevant
        #[arg(short, long)]
        order_by: Option<String>,

        /// Stop after this many videos
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// List the supported sites
    Suites,
}

impl Cli {
    pub async fn run(&self) -> Result<()> {
        let config = Config::load(self.config.as_deref())?;
        let mut scraper = Scraper::new(Arc::new(config.transport()?));
        if let Some(signer) = config.signer() {
            tracing::debug!("using configured credentials");
            scraper = scraper.with_signer(signer);
        }

        match &self.command {
            Command::Video { urls, concurrent } => {
                let concurrent = concurrent.unwrap_or(config.concurrent_fetches).max(1);
                fetch_videos(&scraper, urls, concurrent).await
            }
            Command::Feed { url, limit } => walk_feed(&scraper, url, *limit).await,
            Command::Search {
                suite,
                terms,
                exclude,
                order_by,
                limit,
            } => {
                let mut query = SearchQuery::new(terms.iter().cloned()).exclude(exclude.iter().cloned());
                if let Some(order_by) = order_by {
                    query = query.order_by(order_by.parse::<OrderBy>()?);
                }
                search(&scraper, suite, query, *limit).await
            }
            Command::Suites => list_suites(&scraper),
        }
    }
}

async fn fetch_videos(scraper: &Scraper, urls: &[String], concurrent: usize) -> Result<()> {
    tracing::info!("Fetching {} video(s), {} at a time", urls.len(), concurrent);

    let mut results: Vec<(usize, String, core::Result<VideoRecord>)> =
        stream::iter(urls.iter().cloned().enumerate())
            .map(|(index, url)| {
                let scraper = scraper.clone();
                async move {
                    let result = scraper.fetch_video(&url).await;
                    (index, url, result)
                }
            })
            .buffer_unordered(concurrent)
            .collect()
            .await;
    results.sort_by_key(|(index, _, _)| *index);

    let mut videos = Vec::new();
    let mut failures = 0;
    for (_, url, result) in results {
        match result {
            Ok(record) => videos.push(json!({ "url": url, "video": record })),
            Err(e) => {
                failures += 1;
                eprintln!("{}: {}", url, e);
            }
        }
    }
    print_json(&json!(videos))?;

    if failures > 0 {
        anyhow::bail!("{} of {} video(s) failed", failures, urls.len());
    }
    Ok(())
}

async fn walk_feed(scraper: &Scraper, url: &str, limit: Option<usize>) -> Result<()> {
    let mut feed = scraper.feed(url)?;
    let info = feed.load().await?.clone();
    tracing::info!("Feed: {}", info.title.as_deref().unwrap_or(url));

    let items = feed.collect(limit).await?;
    let videos = keep_records(items);
    print_json(&json!({
        "url": feed.url(),
        "info": info,
        "total": feed.total(),
        "termination": feed.termination(),
        "videos": videos,
    }))
}

async fn search(
    scraper: &Scraper,
    suite: &str,
    query: SearchQuery,
    limit: Option<usize>,
) -> Result<()> {
    let search_string = query.search_string();
    let mut session = scraper.search(suite, query)?;
    tracing::info!("Searching {} for {:?}", suite, search_string);

    let items = session.collect(limit).await?;
    let videos = keep_records(items);
    print_json(&json!({
        "suite": suite,
        "query": search_string,
        "total": session.total(),
        "videos": videos,
    }))
}

fn list_suites(scraper: &Scraper) -> Result<()> {
    let suites: Vec<_> = scraper
        .registry()
        .suites()
        .iter()
        .map(|suite| {
            json!({
                "id": suite.id(),
                "name": suite.display_name(),
                "search": suite.supports_search(),
                "order_bys": suite.order_bys(),
            })
        })
        .collect();
    print_json(&json!(suites))
}

/// Drops listing items that could not be mapped, reporting them on stderr.
fn keep_records(items: Vec<core::Result<VideoRecord>>) -> Vec<VideoRecord> {
    items
        .into_iter()
        .filter_map(|item| match item {
            Ok(record) => Some(record),
            Err(Error::VideoDeleted(link)) => {
                eprintln!("deleted: {}", link);
                None
            }
            Err(e) => {
                eprintln!("skipped: {}", e);
                None
            }
        })
        .collect()
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
