use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::models::{MediaDetail, MediaKind, MediaSummary, Page};
use crate::tmdb::TmdbApi;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewState {
    pub loading: bool,
    pub movies: Vec<MediaSummary>,
    pub shows: Vec<MediaSummary>,
    pub expanded_movie: Option<MediaDetail>,
    pub expanded_show: Option<MediaDetail>,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            loading: true,
            movies: Vec::new(),
            shows: Vec::new(),
            expanded_movie: None,
            expanded_show: None,
        }
    }
}

impl ViewState {
    pub fn expanded(&self, kind: MediaKind) -> Option<&MediaDetail> {
        match kind {
            MediaKind::Movie => self.expanded_movie.as_ref(),
            MediaKind::Tv => self.expanded_show.as_ref(),
        }
    }

    fn expanded_mut(&mut self, kind: MediaKind) -> &mut Option<MediaDetail> {
        match kind {
            MediaKind::Movie => &mut self.expanded_movie,
            MediaKind::Tv => &mut self.expanded_show,
        }
    }
}

/// What a click on a grid item ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Collapsed,
    Expanded,
    Unchanged,
}

pub struct ViewController {
    tmdb: Arc<dyn TmdbApi>,
    state: Mutex<ViewState>,
}

impl ViewController {
    pub fn new(tmdb: Arc<dyn TmdbApi>) -> Self {
        Self {
            tmdb,
            state: Mutex::new(ViewState::default()),
        }
    }

    pub async fn snapshot(&self) -> ViewState {
        self.state.lock().await.clone()
    }

    /// Loads both popular lists concurrently and clears `loading` once both settle.
    pub async fn mount(&self) {
        let page = Page::default();
        let (movies, shows) = tokio::join!(
            self.tmdb.popular_movies(page),
            self.tmdb.popular_shows(page)
        );
        info!(
            movies = movies.len(),
            shows = shows.len(),
            "Popular lists loaded"
        );
        let mut state = self.state.lock().await;
        state.movies = movies;
        state.shows = shows;
        state.loading = false;
    }

    // The lock is released while the detail request is in flight, so two
    // overlapping clicks resolve in whatever order their responses land.
    pub async fn select(&self, kind: MediaKind, id: i64) -> Selection {
        {
            let mut state = self.state.lock().await;
            let slot = state.expanded_mut(kind);
            if slot.as_ref().map(|d| d.id) == Some(id) {
                *slot = None;
                debug!(%kind, id, "Collapsed detail");
                return Selection::Collapsed;
            }
        }

        let detail = match kind {
            MediaKind::Movie => self.tmdb.movie_detail(id).await,
            MediaKind::Tv => self.tmdb.show_detail(id).await,
        };

        match detail {
            Some(detail) => {
                debug!(%kind, id, title = %detail.title, "Expanded detail");
                *self.state.lock().await.expanded_mut(kind) = Some(detail);
                Selection::Expanded
            }
            None => Selection::Unchanged,
        }
    }

    pub async fn close(&self, kind: MediaKind) {
        *self.state.lock().await.expanded_mut(kind) = None;
    }
}
