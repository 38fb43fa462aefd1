use std::collections::HashMap;
use std::io::Cursor;

use axum::{
    extract::{Multipart, State},
    Json,
};
use calamine::{open_workbook_auto_from_rs, Data, DataType as _, Reader};
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use polars::prelude::*;
use serde_json::{json, Value};

use crate::error::{DamaiError, DamaiResult};
use crate::state::AppState;

// Column headers of the source spreadsheet. The upload keeps the Chinese
// names end to end so exports line up with what the operators see.
pub const COL_CUSTOMER: &str = "客户名称";
pub const COL_PRODUCT: &str = "商品名称";
pub const COL_MAIN_TYPE: &str = "主营类型";
pub const COL_CATEGORY: &str = "商品分类";
pub const COL_ORDER_TYPE: &str = "订单类型";
pub const COL_STAFF: &str = "BD";
pub const COL_ORDER_TIME: &str = "下单时间";
pub const COL_AMOUNT: &str = "实付金额";
/// Derived calendar-month index (`year * 12 + month0`), null when the
/// timestamp failed to parse.
pub const COL_MONTH_INDEX: &str = "月份序号";

pub const MSG_NO_FILE: &str = "没有文件上传";
pub const MSG_EMPTY_FILENAME: &str = "未选择文件";

/// One source row, as read from the sheet. Unparseable timestamps become
/// `None`; the row itself is kept and filtered per analysis mode.
#[derive(Debug, Clone, Default)]
pub struct RawOrder {
    pub customer: Option<String>,
    pub product: Option<String>,
    pub main_type: Option<String>,
    pub category: Option<String>,
    pub order_type: Option<String>,
    pub staff: Option<String>,
    pub order_time: Option<NaiveDateTime>,
    pub amount: f64,
}

/// The uploaded dataset: original header list (for column presence checks)
/// plus the derived DataFrame all analyses run against.
#[derive(Debug, Clone)]
pub struct OrderBook {
    pub file_name: String,
    pub columns: Vec<String>,
    pub rows: usize,
    pub frame: DataFrame,
}

impl OrderBook {
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|column| column == name)
    }
}

pub async fn upload_workbook_axum(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> DamaiResult<Json<Value>> {
    let (file_name, bytes) = read_upload(&mut multipart).await?;
    let book = read_workbook(&file_name, bytes)?;
    tracing::info!("Loaded {} rows from {}", book.rows, book.file_name);

    let summary = json!({
        "file_name": book.file_name,
        "rows": book.rows,
        "columns": book.columns,
    });
    *state.dataset.lock().unwrap() = Some(book);
    Ok(Json(summary))
}

/// Pull the `file` field out of a multipart upload.
pub async fn read_upload(multipart: &mut Multipart) -> DamaiResult<(String, Vec<u8>)> {
    let mut upload = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some("file") {
            let file_name = field.file_name().unwrap_or_default().to_string();
            upload = Some((file_name, field.bytes().await?.to_vec()));
        }
    }

    let (file_name, bytes) = upload.ok_or_else(|| DamaiError::Validation(MSG_NO_FILE.into()))?;
    if file_name.is_empty() {
        return Err(DamaiError::Validation(MSG_EMPTY_FILENAME.into()));
    }
    Ok((file_name, bytes))
}

/// Parse workbook bytes into an [`OrderBook`]. Only the first sheet is
/// read; the first row is the header.
pub fn read_workbook(file_name: &str, bytes: Vec<u8>) -> DamaiResult<OrderBook> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))?;
    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| DamaiError::Validation("表格文件中没有工作表".into()))?;
    let range = workbook.worksheet_range(&sheet_name)?;

    let mut rows = range.rows();
    let header_row = rows
        .next()
        .ok_or_else(|| DamaiError::Validation("表格文件为空".into()))?;

    let mut header: HashMap<String, usize> = HashMap::new();
    let mut columns = Vec::new();
    for (idx, cell) in header_row.iter().enumerate() {
        if let Some(name) = cell.as_string() {
            let name = name.trim().to_string();
            if !name.is_empty() && !header.contains_key(&name) {
                header.insert(name.clone(), idx);
                columns.push(name);
            }
        }
    }

    for required in [COL_ORDER_TIME, COL_AMOUNT] {
        if !header.contains_key(required) {
            return Err(DamaiError::Validation(format!(
                "表格缺少必需列：{}",
                required
            )));
        }
    }

    let mut orders = Vec::new();
    for row in rows {
        orders.push(RawOrder {
            customer: string_cell(row, header.get(COL_CUSTOMER)),
            product: string_cell(row, header.get(COL_PRODUCT)),
            main_type: string_cell(row, header.get(COL_MAIN_TYPE)),
            category: string_cell(row, header.get(COL_CATEGORY)),
            order_type: string_cell(row, header.get(COL_ORDER_TYPE)),
            staff: string_cell(row, header.get(COL_STAFF)),
            order_time: datetime_cell(row, header.get(COL_ORDER_TIME)),
            amount: numeric_cell(row, header.get(COL_AMOUNT)).unwrap_or(0.0),
        });
    }

    let frame = build_frame(&orders)?;
    Ok(OrderBook {
        file_name: file_name.to_string(),
        columns,
        rows: orders.len(),
        frame,
    })
}

/// Build the analysis DataFrame from raw rows.
pub fn build_frame(orders: &[RawOrder]) -> DamaiResult<DataFrame> {
    let mut customers = Vec::with_capacity(orders.len());
    let mut products = Vec::with_capacity(orders.len());
    let mut main_types = Vec::with_capacity(orders.len());
    let mut categories = Vec::with_capacity(orders.len());
    let mut order_types = Vec::with_capacity(orders.len());
    let mut staff = Vec::with_capacity(orders.len());
    let mut order_times = Vec::with_capacity(orders.len());
    let mut month_indices = Vec::with_capacity(orders.len());
    let mut amounts = Vec::with_capacity(orders.len());

    for order in orders {
        customers.push(order.customer.clone());
        products.push(order.product.clone());
        main_types.push(order.main_type.clone());
        categories.push(order.category.clone());
        order_types.push(order.order_type.clone());
        staff.push(order.staff.clone());
        order_times.push(order.order_time);
        month_indices.push(order.order_time.as_ref().map(month_index));
        amounts.push(order.amount);
    }

    let frame = df!(
        COL_CUSTOMER => customers,
        COL_PRODUCT => products,
        COL_MAIN_TYPE => main_types,
        COL_CATEGORY => categories,
        COL_ORDER_TYPE => order_types,
        COL_STAFF => staff,
        COL_ORDER_TIME => order_times,
        COL_MONTH_INDEX => month_indices,
        COL_AMOUNT => amounts,
    )?;
    Ok(frame)
}

pub fn month_index(time: &NaiveDateTime) -> i32 {
    time.year() * 12 + time.month0() as i32
}

pub fn month_label(index: i32) -> String {
    format!("{}-{:02}", index.div_euclid(12), index.rem_euclid(12) + 1)
}

fn string_cell(row: &[Data], idx: Option<&usize>) -> Option<String> {
    let cell = row.get(*idx?)?;
    let value = cell.as_string()?;
    let value = value.trim().to_string();
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

fn numeric_cell(row: &[Data], idx: Option<&usize>) -> Option<f64> {
    let cell = row.get(*idx?)?;
    cell.as_f64().or_else(|| {
        cell.as_string()
            .and_then(|raw| raw.trim().replace(',', "").parse().ok())
    })
}

fn datetime_cell(row: &[Data], idx: Option<&usize>) -> Option<NaiveDateTime> {
    let cell = row.get(*idx?)?;
    if let Some(time) = cell.as_datetime() {
        return Some(time);
    }
    parse_order_datetime(&cell.as_string()?)
}

/// Lenient timestamp parser for the string forms that show up in exports
/// from order systems. Anything else is treated as missing.
pub fn parse_order_datetime(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    const DATETIME_FORMATS: [&str; 4] = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y/%m/%d %H:%M:%S",
        "%Y/%m/%d %H:%M",
    ];
    for format in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(parsed);
        }
    }

    const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%Y%m%d"];
    for format in DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(raw, format) {
            return parsed.and_hms_opt(0, 0, 0);
        }
    }
    None
}
