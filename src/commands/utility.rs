use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::state::AppState;

pub async fn status_axum(State(state): State<AppState>) -> Json<Value> {
    let dataset = state.dataset.lock().unwrap();
    Json(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "dataset_loaded": dataset.is_some(),
        "file_name": dataset.as_ref().map(|book| book.file_name.clone()),
        "rows": dataset.as_ref().map(|book| book.rows),
    }))
}
