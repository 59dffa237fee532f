use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{header, Client};
use serde::Deserialize;
use std::collections::HashSet;
use tracing::{debug, warn};

use crate::config::Config;
use crate::models::{MediaDate, MediaDetail, MediaKind, MediaSummary, Page};

const LANGUAGE: &str = "en-US";

/// Fail-soft view of TMDB: every fault collapses to an empty list or `None`.
#[async_trait]
pub trait TmdbApi: Send + Sync {
    async fn popular_movies(&self, page: Page) -> Vec<MediaSummary>;
    async fn popular_shows(&self, page: Page) -> Vec<MediaSummary>;
    async fn movie_detail(&self, id: i64) -> Option<MediaDetail>;
    async fn show_detail(&self, id: i64) -> Option<MediaDetail>;
}

#[derive(Debug, Clone)]
pub struct TmdbClient {
    client: Client,
    base_url: String,
    read_token: String,
}

impl TmdbClient {
    pub fn new(config: &Config) -> Self {
        Self {
            client: Client::new(),
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            read_token: config.read_token.clone(),
        }
    }

    pub async fn try_popular_movies(&self, page: Page) -> Result<Vec<MediaSummary>> {
        let data: ListResponse<MovieListItem> =
            self.get_json("movie/popular", Some(page)).await?;
        Ok(normalize_summaries(data.results.into_iter().map(|m| {
            MediaSummary {
                id: m.id,
                title: m.title.unwrap_or_default(),
                poster_path: m.poster_path,
            }
        })))
    }

    pub async fn try_popular_shows(&self, page: Page) -> Result<Vec<MediaSummary>> {
        let data: ListResponse<ShowListItem> = self.get_json("tv/popular", Some(page)).await?;
        Ok(normalize_summaries(data.results.into_iter().map(|s| {
            MediaSummary {
                id: s.id,
                title: s.name.unwrap_or_default(),
                poster_path: s.poster_path,
            }
        })))
    }

    pub async fn try_movie_detail(&self, id: i64) -> Result<MediaDetail> {
        let detail: MovieDetail = self.get_json(&format!("movie/{id}"), None).await?;
        let dates = detail
            .release_date
            .filter(|d| !d.is_empty())
            .map(|d| MediaDate {
                label: "Release date".to_string(),
                value: d,
            })
            .into_iter()
            .collect();
        Ok(MediaDetail {
            kind: MediaKind::Movie,
            id: detail.id,
            title: detail.title,
            overview: detail.overview.unwrap_or_default(),
            dates,
            genres: names(detail.genres),
            poster_path: detail.poster_path,
            runtime_minutes: detail.runtime.filter(|r| *r > 0),
        })
    }

    pub async fn try_show_detail(&self, id: i64) -> Result<MediaDetail> {
        let detail: ShowDetail = self.get_json(&format!("tv/{id}"), None).await?;
        let dates = [
            ("First aired", detail.first_air_date),
            ("Last aired", detail.last_air_date),
        ]
        .into_iter()
        .filter_map(|(label, value)| {
            value.filter(|v| !v.is_empty()).map(|value| MediaDate {
                label: label.to_string(),
                value,
            })
        })
        .collect();
        Ok(MediaDetail {
            kind: MediaKind::Tv,
            id: detail.id,
            title: detail.name,
            overview: detail.overview.unwrap_or_default(),
            dates,
            genres: names(detail.genres),
            poster_path: detail.poster_path,
            runtime_minutes: None,
        })
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        page: Option<Page>,
    ) -> Result<T> {
        let url = format!("{}/{}", self.base_url, path);
        let mut query = vec![("language", LANGUAGE.to_string())];
        if let Some(page) = page {
            query.push(("page", page.number().to_string()));
        }
        debug!(url = %url, "TMDB request");

        let res = self
            .client
            .get(&url)
            .query(&query)
            .bearer_auth(&self.read_token)
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .context("request failed")?;
        let status = res.status();
        let text = res.text().await.context("reading body failed")?;
        if !status.is_success() {
            return Err(anyhow!("{} -> {}: {}", url, status, text));
        }
        let parsed: T = serde_json::from_str(&text).context("JSON parse failed")?;
        Ok(parsed)
    }
}

#[async_trait]
impl TmdbApi for TmdbClient {
    async fn popular_movies(&self, page: Page) -> Vec<MediaSummary> {
        self.try_popular_movies(page).await.unwrap_or_else(|e| {
            warn!("Error fetching popular movies: {:#}", e);
            Vec::new()
        })
    }

    async fn popular_shows(&self, page: Page) -> Vec<MediaSummary> {
        self.try_popular_shows(page).await.unwrap_or_else(|e| {
            warn!("Error fetching popular shows: {:#}", e);
            Vec::new()
        })
    }

    async fn movie_detail(&self, id: i64) -> Option<MediaDetail> {
        match self.try_movie_detail(id).await {
            Ok(detail) => Some(detail),
            Err(e) => {
                warn!("Error fetching movie {}: {:#}", id, e);
                None
            }
        }
    }

    async fn show_detail(&self, id: i64) -> Option<MediaDetail> {
        match self.try_show_detail(id).await {
            Ok(detail) => Some(detail),
            Err(e) => {
                warn!("Error fetching show {}: {:#}", id, e);
                None
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct ListResponse<T> {
    results: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct MovieListItem {
    id: i64,
    title: Option<String>,
    poster_path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ShowListItem {
    id: i64,
    name: Option<String>,
    poster_path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Genre {
    name: String,
}

#[derive(Debug, Deserialize)]
struct MovieDetail {
    id: i64,
    title: String,
    overview: Option<String>,
    release_date: Option<String>,
    runtime: Option<u32>,
    poster_path: Option<String>,
    genres: Option<Vec<Genre>>,
}

#[derive(Debug, Deserialize)]
struct ShowDetail {
    id: i64,
    name: String,
    overview: Option<String>,
    first_air_date: Option<String>,
    last_air_date: Option<String>,
    poster_path: Option<String>,
    genres: Option<Vec<Genre>>,
}

fn names(genres: Option<Vec<Genre>>) -> Vec<String> {
    genres
        .map(|g| g.into_iter().map(|x| x.name).collect())
        .unwrap_or_default()
}

/// Drops blank titles and repeated ids, keeping first occurrences in order.
fn normalize_summaries(items: impl IntoIterator<Item = MediaSummary>) -> Vec<MediaSummary> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|s| !s.title.trim().is_empty())
        .filter(|s| seen.insert(s.id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(id: i64, title: &str) -> MediaSummary {
        MediaSummary {
            id,
            title: title.to_string(),
            poster_path: None,
        }
    }

    #[test]
    fn normalize_drops_blank_titles_and_duplicate_ids() {
        let out = normalize_summaries(vec![
            summary(1, "One"),
            summary(2, "  "),
            summary(1, "One again"),
            summary(3, "Three"),
        ]);
        let ids: Vec<i64> = out.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(out[0].title, "One");
    }

    #[test]
    fn genre_names_default_to_empty() {
        assert!(names(None).is_empty());
        let list = vec![
            Genre {
                name: "Drama".to_string(),
            },
            Genre {
                name: "Crime".to_string(),
            },
        ];
        assert_eq!(names(Some(list)), vec!["Drama", "Crime"]);
    }

    #[test]
    fn list_item_tolerates_missing_or_null_title() {
        let raw = r#"{"results":[{"id":7,"poster_path":null},{"id":8,"title":null}]}"#;
        let data: ListResponse<MovieListItem> = serde_json::from_str(raw).unwrap();
        assert_eq!(data.results.len(), 2);
        assert!(data.results.iter().all(|m| m.title.is_none()));

        let raw = r#"{"results":[{"id":9,"name":null}]}"#;
        let data: ListResponse<ShowListItem> = serde_json::from_str(raw).unwrap();
        assert!(data.results[0].name.is_none());
    }
}
