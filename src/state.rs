use crate::commands::dataset::OrderBook;
use std::sync::{Arc, Mutex};

/// Global app state. The uploaded order book is held in memory for the
/// lifetime of the process, mirroring the "upload once, query many times"
/// flow of the desktop tool. No persistence.
#[derive(Clone, Default)]
pub struct AppState {
    pub dataset: Arc<Mutex<Option<OrderBook>>>,
}
