use std::collections::BTreeMap;

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{DateTime, Duration, NaiveDateTime};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::commands::dataset::{
    month_label, OrderBook, COL_AMOUNT, COL_CATEGORY, COL_CUSTOMER, COL_MAIN_TYPE,
    COL_MONTH_INDEX, COL_ORDER_TIME, COL_ORDER_TYPE, COL_PRODUCT, COL_STAFF,
};
use crate::error::{DamaiError, DamaiResult};
use crate::state::AppState;

/// Categorical columns the month-over-month comparison runs over. Columns
/// missing from the upload are skipped, not errors.
pub const CATEGORY_COLUMNS: [&str; 5] = [
    COL_CUSTOMER,
    COL_PRODUCT,
    COL_MAIN_TYPE,
    COL_CATEGORY,
    COL_ORDER_TYPE,
];

pub const MSG_UPLOAD_FIRST: &str = "请先上传文件。";
pub const MSG_PRODUCT_REQUIRED: &str = "请输入要查询的商品名称。";
pub const MSG_PRODUCT_NOT_FOUND: &str = "查询不到此商品，请重新输入。";
pub const MSG_NO_COMPARABLE: &str = "最近两个月没有可对比的数据。";

const MS_PER_DAY: i64 = 86_400_000;
const DAY_FORMAT: &str = "%m月%d日";

/// One group's month-over-month comparison. Only groups with revenue in
/// both months appear.
#[derive(Debug, Clone, Serialize)]
pub struct MomentumRow {
    pub group: String,
    pub prior_amount: f64,
    pub latest_amount: f64,
    /// (latest - prior) / prior * 100
    pub ratio: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MomentumTable {
    pub column: String,
    pub prior_month: String,
    pub latest_month: String,
    pub rows: Vec<MomentumRow>,
}

/// Per (customer, BD) purchase-interval summary for one product.
#[derive(Debug, Clone, Serialize)]
pub struct CycleRow {
    pub customer: String,
    pub staff: String,
    pub product: String,
    pub avg_interval_days: f64,
    pub min_interval_days: i64,
    pub max_interval_days: i64,
    pub last_order: String,
    pub forecast: String,
}

/// An empty product match is a distinct outcome, not an error.
#[derive(Debug)]
pub enum CycleOutcome {
    NotFound,
    Summary(Vec<CycleRow>),
}

#[derive(Deserialize)]
pub struct CycleQuery {
    pub product: String,
}

pub async fn momentum_analysis_axum(State(state): State<AppState>) -> DamaiResult<Json<Value>> {
    let book = current_dataset(&state)?;
    let tables = momentum_tables(&book)?;
    Ok(Json(json!({
        "file_name": book.file_name,
        "tables": tables,
    })))
}

pub async fn cycle_analysis_axum(
    State(state): State<AppState>,
    Query(params): Query<CycleQuery>,
) -> DamaiResult<Json<Value>> {
    let product = require_product(&params.product)?;
    let book = current_dataset(&state)?;
    match purchase_cycle(&book, &product)? {
        CycleOutcome::NotFound => Ok(Json(json!({
            "found": false,
            "message": MSG_PRODUCT_NOT_FOUND,
        }))),
        CycleOutcome::Summary(rows) => Ok(Json(json!({
            "found": true,
            "product": product,
            "rows": rows,
        }))),
    }
}

/// Clone the stored dataset out of the state lock. DataFrame columns are
/// reference counted, so this does not copy row data.
pub fn current_dataset(state: &AppState) -> DamaiResult<OrderBook> {
    state
        .dataset
        .lock()
        .unwrap()
        .clone()
        .ok_or_else(|| DamaiError::Validation(MSG_UPLOAD_FIRST.into()))
}

pub fn require_product(raw: &str) -> DamaiResult<String> {
    let product = raw.trim();
    if product.is_empty() {
        return Err(DamaiError::Validation(MSG_PRODUCT_REQUIRED.into()));
    }
    Ok(product.to_string())
}

/// Month-over-month comparison for every categorical column present in the
/// upload. A column that yields no comparable group produces no table.
pub fn momentum_tables(book: &OrderBook) -> DamaiResult<Vec<MomentumTable>> {
    let latest = match book.frame.column(COL_MONTH_INDEX)?.i32()?.max() {
        Some(latest) => latest,
        None => return Ok(Vec::new()),
    };

    let mut tables = Vec::new();
    for column in CATEGORY_COLUMNS {
        if !book.has_column(column) {
            continue;
        }
        if let Some(table) = momentum_for_column(&book.frame, column, latest)? {
            tables.push(table);
        }
    }
    Ok(tables)
}

fn momentum_for_column(
    frame: &DataFrame,
    column: &str,
    latest: i32,
) -> DamaiResult<Option<MomentumTable>> {
    // 1. Monthly revenue per group
    let monthly = frame
        .clone()
        .lazy()
        .filter(col(column).is_not_null().and(col(COL_MONTH_INDEX).is_not_null()))
        .group_by([col(column), col(COL_MONTH_INDEX)])
        .agg([col(COL_AMOUNT).sum().alias("月度金额")])
        .collect()?;

    let groups = monthly.column(column)?.str()?;
    let months = monthly.column(COL_MONTH_INDEX)?.i32()?;
    let sums = monthly.column("月度金额")?.f64()?;

    // 2. Split into the two months under comparison
    let prior = latest - 1;
    let mut latest_amounts: BTreeMap<String, f64> = BTreeMap::new();
    let mut prior_amounts: BTreeMap<String, f64> = BTreeMap::new();
    for i in 0..monthly.height() {
        let (Some(group), Some(month), Some(amount)) = (groups.get(i), months.get(i), sums.get(i))
        else {
            continue;
        };
        if month == latest {
            latest_amounts.insert(group.to_string(), amount);
        } else if month == prior {
            prior_amounts.insert(group.to_string(), amount);
        }
    }

    // 3. Ratio for groups present in both months, descending
    let mut rows = Vec::new();
    for (group, latest_amount) in &latest_amounts {
        if let Some(prior_amount) = prior_amounts.get(group) {
            rows.push(MomentumRow {
                group: group.clone(),
                prior_amount: *prior_amount,
                latest_amount: *latest_amount,
                ratio: (latest_amount - prior_amount) / prior_amount * 100.0,
            });
        }
    }
    if rows.is_empty() {
        return Ok(None);
    }
    rows.sort_by(|a, b| b.ratio.total_cmp(&a.ratio));

    Ok(Some(MomentumTable {
        column: column.to_string(),
        prior_month: month_label(prior),
        latest_month: month_label(latest),
        rows,
    }))
}

/// Purchase-interval statistics for an exact product-name match.
pub fn purchase_cycle(book: &OrderBook, product: &str) -> DamaiResult<CycleOutcome> {
    for required in [COL_PRODUCT, COL_STAFF] {
        if !book.has_column(required) {
            return Err(DamaiError::Validation(format!(
                "表格缺少必需列：{}",
                required
            )));
        }
    }

    let filtered = book
        .frame
        .clone()
        .lazy()
        .filter(col(COL_PRODUCT).eq(lit(product)))
        .collect()?;
    if filtered.height() == 0 {
        return Ok(CycleOutcome::NotFound);
    }

    // Rows without a parseable timestamp carry no interval information.
    let ordered = filtered
        .lazy()
        .filter(col(COL_ORDER_TIME).is_not_null())
        .sort([COL_CUSTOMER, COL_ORDER_TIME], SortMultipleOptions::default())
        .collect()?;

    let customers = ordered.column(COL_CUSTOMER)?.str()?;
    let staff = ordered.column(COL_STAFF)?.str()?;
    let times = ordered.column(COL_ORDER_TIME)?.cast(&DataType::Int64)?;
    let times = times.i64()?;

    // Successive day-differences per customer, attributed to the
    // (customer, BD) of the later order. Rows with no BD keep feeding the
    // diff chain and the recency lookup but form no summary group.
    let mut intervals: BTreeMap<(String, String), Vec<i64>> = BTreeMap::new();
    let mut last_seen: BTreeMap<String, i64> = BTreeMap::new();
    let mut prev: Option<(String, i64)> = None;
    for i in 0..ordered.height() {
        let (Some(customer), Some(ts)) = (customers.get(i), times.get(i)) else {
            continue;
        };
        let diff = match &prev {
            Some((prev_customer, prev_ts)) if prev_customer == customer => {
                Some((ts - prev_ts) / MS_PER_DAY)
            }
            _ => None,
        };
        prev = Some((customer.to_string(), ts));

        last_seen
            .entry(customer.to_string())
            .and_modify(|seen| *seen = (*seen).max(ts))
            .or_insert(ts);

        if let (Some(diff), Some(staff_name)) = (diff, staff.get(i)) {
            intervals
                .entry((customer.to_string(), staff_name.to_string()))
                .or_default()
                .push(diff);
        }
    }

    let mut rows = Vec::new();
    for ((customer, staff_name), diffs) in intervals {
        let (Some(&min), Some(&max)) = (diffs.iter().min(), diffs.iter().max()) else {
            continue;
        };
        let mean = diffs.iter().sum::<i64>() as f64 / diffs.len() as f64;
        // Customers whose every interval is zero carry no cycle signal.
        if mean == 0.0 && min == 0 && max == 0 {
            continue;
        }

        let Some(recent) = last_seen.get(&customer).copied().and_then(datetime_from_ms) else {
            continue;
        };
        let forecast = recent + Duration::milliseconds((mean * MS_PER_DAY as f64).round() as i64);

        rows.push(CycleRow {
            customer,
            staff: staff_name,
            product: product.to_string(),
            avg_interval_days: mean,
            min_interval_days: min,
            max_interval_days: max,
            last_order: recent.format(DAY_FORMAT).to_string(),
            forecast: forecast.format(DAY_FORMAT).to_string(),
        });
    }

    Ok(CycleOutcome::Summary(rows))
}

fn datetime_from_ms(ms: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp_millis(ms).map(|time| time.naive_utc())
}
