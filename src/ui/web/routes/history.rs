use axum::Json;
use axum::extract::State;

use crate::base_system::history::{HistoryEntry, HistoryLedger};
use crate::ui::web::state::AppState;

pub(crate) async fn api_history(State(state): State<AppState>) -> Json<Vec<HistoryEntry>> {
    let path = state.history_path.as_ref().clone();
    let max = state.max_history;
    let entries = tokio::task::spawn_blocking(move || {
        HistoryLedger::load(path, max).entries().to_vec()
    })
    .await
    .unwrap_or_default();
    Json(entries)
}
