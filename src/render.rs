use anyhow::{Context, Result};
use askama::Template;

use crate::models::{poster_url, MediaDetail, MediaKind, MediaSummary};
use crate::view::ViewState;

#[derive(Template)]
#[template(path = "loading.html")]
struct LoadingTemplate;

#[derive(Template)]
#[template(path = "page.html")]
struct PageTemplate {
    movies: Vec<TileView>,
    shows: Vec<TileView>,
    details: Vec<DetailView>,
}

pub struct TileView {
    pub kind: &'static str,
    pub id: i64,
    pub title: String,
    pub poster_url: Option<String>,
    pub expanded: bool,
}

pub struct DetailView {
    pub kind: &'static str,
    pub title: String,
    pub overview: String,
    pub dates: Vec<(String, String)>,
    pub genres: Vec<String>,
    pub runtime_minutes: Option<u32>,
    pub poster_url: Option<String>,
}

pub fn render_view(state: &ViewState, image_base: &str) -> Result<String> {
    if state.loading {
        return LoadingTemplate
            .render()
            .context("rendering loading page failed");
    }

    let tiles = |kind: MediaKind, items: &[MediaSummary]| -> Vec<TileView> {
        let expanded_id = state.expanded(kind).map(|d| d.id);
        items
            .iter()
            .map(|s| TileView {
                kind: kind.as_path(),
                id: s.id,
                title: s.title.clone(),
                poster_url: poster_url(image_base, s.poster_path.as_deref()),
                expanded: expanded_id == Some(s.id),
            })
            .collect()
    };

    let details = [MediaKind::Movie, MediaKind::Tv]
        .into_iter()
        .filter_map(|kind| state.expanded(kind))
        .map(|d| detail_view(d, image_base))
        .collect();

    PageTemplate {
        movies: tiles(MediaKind::Movie, &state.movies),
        shows: tiles(MediaKind::Tv, &state.shows),
        details,
    }
    .render()
    .context("rendering page failed")
}

fn detail_view(detail: &MediaDetail, image_base: &str) -> DetailView {
    DetailView {
        kind: detail.kind.as_path(),
        title: detail.title.clone(),
        overview: detail.overview.clone(),
        dates: detail
            .dates
            .iter()
            .map(|d| (d.label.clone(), d.value.clone()))
            .collect(),
        genres: detail.genres.clone(),
        runtime_minutes: match detail.kind {
            MediaKind::Movie => detail.runtime_minutes,
            MediaKind::Tv => None,
        },
        poster_url: poster_url(image_base, detail.poster_path.as_deref()),
    }
}
