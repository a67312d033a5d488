// Library overview and season drill-down endpoints.

use axum::extract::{Path, State};
use axum::response::Json;
use tracing::error;

use super::common::{ApiError, ApiResult};
use crate::reconcile::{LibraryKind, LibraryOverview, SeasonEpisodes};
use crate::web::AppState;

pub async fn tv_overview(State(state): State<AppState>) -> ApiResult<LibraryOverview> {
    library_overview(state, LibraryKind::Series).await
}

pub async fn movies_overview(State(state): State<AppState>) -> ApiResult<LibraryOverview> {
    library_overview(state, LibraryKind::Movies).await
}

async fn library_overview(state: AppState, kind: LibraryKind) -> ApiResult<LibraryOverview> {
    match state.reconciler.library_overview(kind).await {
        Ok(overview) => Ok(Json(overview)),
        Err(e) => {
            error!("{} library overview failed: {}", kind.service(), e);
            Err(ApiError::bad_gateway(e.to_string()))
        }
    }
}

pub async fn season_episodes(
    Path((series_id, season_number)): Path<(i64, i64)>,
    State(state): State<AppState>,
) -> ApiResult<SeasonEpisodes> {
    match state
        .reconciler
        .season_episodes(series_id, season_number)
        .await
    {
        Ok(episodes) => Ok(Json(episodes)),
        Err(e) => {
            error!(
                "episode listing failed for series {} season {}: {}",
                series_id, season_number, e
            );
            Err(e.into())
        }
    }
}
