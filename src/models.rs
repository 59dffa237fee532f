use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Highest page TMDB will serve for list endpoints.
pub const MAX_PAGE: u32 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Movie,
    Tv,
}

impl MediaKind {
    /// Path segment used both by TMDB and by our own routes.
    pub fn as_path(&self) -> &'static str {
        match self {
            MediaKind::Movie => "movie",
            MediaKind::Tv => "tv",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_path())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page(u32);

impl Page {
    pub fn new(number: u32) -> Result<Self> {
        if number == 0 || number > MAX_PAGE {
            bail!("page must be between 1 and {MAX_PAGE}, got {number}");
        }
        Ok(Self(number))
    }

    pub fn number(&self) -> u32 {
        self.0
    }
}

impl Default for Page {
    fn default() -> Self {
        Self(1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaSummary {
    pub id: i64,
    pub title: String,
    pub poster_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaDate {
    pub label: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaDetail {
    pub kind: MediaKind,
    pub id: i64,
    pub title: String,
    pub overview: String,
    pub dates: Vec<MediaDate>,
    pub genres: Vec<String>,
    pub poster_path: Option<String>,
    pub runtime_minutes: Option<u32>,
}

/// Joins the image host prefix with an API-relative poster path.
pub fn poster_url(image_base: &str, poster_path: Option<&str>) -> Option<String> {
    let path = poster_path.map(str::trim).filter(|p| !p.is_empty())?;
    let base = image_base.trim_end_matches('/');
    if path.starts_with('/') {
        Some(format!("{base}{path}"))
    } else {
        Some(format!("{base}/{path}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_defaults_to_first() {
        assert_eq!(Page::default().number(), 1);
    }

    #[test]
    fn page_rejects_out_of_range() {
        assert!(Page::new(0).is_err());
        assert!(Page::new(MAX_PAGE + 1).is_err());
        assert_eq!(Page::new(MAX_PAGE).unwrap().number(), MAX_PAGE);
    }

    #[test]
    fn poster_url_joins_prefix_and_path() {
        assert_eq!(
            poster_url("https://image.tmdb.org/t/p/w500", Some("/abc.jpg")),
            Some("https://image.tmdb.org/t/p/w500/abc.jpg".to_string())
        );
        assert_eq!(
            poster_url("https://image.tmdb.org/t/p/w500/", Some("abc.jpg")),
            Some("https://image.tmdb.org/t/p/w500/abc.jpg".to_string())
        );
    }

    #[test]
    fn poster_url_absent_for_missing_or_blank_path() {
        assert_eq!(poster_url("https://img", None), None);
        assert_eq!(poster_url("https://img", Some("  ")), None);
    }

    #[test]
    fn media_kind_round_trips_through_path() {
        let kind: MediaKind = serde_json::from_str("\"tv\"").unwrap();
        assert_eq!(kind, MediaKind::Tv);
        assert_eq!(MediaKind::Movie.to_string(), "movie");
    }
}
