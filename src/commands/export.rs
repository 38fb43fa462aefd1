use axum::{
    extract::{Multipart, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use rust_xlsxwriter::Workbook;
use serde_json::json;

use crate::commands::analysis::{
    current_dataset, momentum_tables, purchase_cycle, require_product, CycleOutcome, CycleQuery,
    CycleRow, MomentumTable, MSG_NO_COMPARABLE, MSG_PRODUCT_NOT_FOUND,
};
use crate::commands::dataset::{read_upload, read_workbook};
use crate::error::DamaiResult;
use crate::state::AppState;

const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

const CYCLE_SHEET_NAME: &str = "购买周期分析结果";
const CYCLE_HEADERS: [&str; 8] = [
    "客户名称",
    "BD",
    "平均购买周期(天)",
    "最短购买周期(天)",
    "最长购买周期(天)",
    "最近一次下单时间",
    "预测购买时间",
    "商品名称",
];

/// Multi-sheet comparison report for the stored dataset.
pub async fn momentum_report_axum(State(state): State<AppState>) -> DamaiResult<Response> {
    let book = current_dataset(&state)?;
    let tables = momentum_tables(&book)?;
    momentum_response(&tables)
}

/// One-shot mode: upload a workbook and get the comparison report straight
/// back, without touching the stored dataset.
pub async fn upload_report_axum(mut multipart: Multipart) -> DamaiResult<Response> {
    let (file_name, bytes) = read_upload(&mut multipart).await?;
    let book = read_workbook(&file_name, bytes)?;
    tracing::info!("One-shot report over {} rows from {}", book.rows, book.file_name);
    let tables = momentum_tables(&book)?;
    momentum_response(&tables)
}

pub async fn cycle_report_axum(
    State(state): State<AppState>,
    Query(params): Query<CycleQuery>,
) -> DamaiResult<Response> {
    let product = require_product(&params.product)?;
    let book = current_dataset(&state)?;
    match purchase_cycle(&book, &product)? {
        CycleOutcome::NotFound => Ok((
            StatusCode::NOT_FOUND,
            Json(json!({ "found": false, "message": MSG_PRODUCT_NOT_FOUND })),
        )
            .into_response()),
        CycleOutcome::Summary(rows) => {
            let buffer = cycle_workbook(&rows)?;
            Ok(xlsx_response(buffer, "purchase_cycle_result.xlsx"))
        }
    }
}

fn momentum_response(tables: &[MomentumTable]) -> DamaiResult<Response> {
    if tables.is_empty() {
        return Ok((
            StatusCode::NOT_FOUND,
            Json(json!({ "found": false, "message": MSG_NO_COMPARABLE })),
        )
            .into_response());
    }
    let buffer = momentum_workbook(tables)?;
    Ok(xlsx_response(buffer, "analysis_result.xlsx"))
}

/// One worksheet per categorical column, named after the column.
pub fn momentum_workbook(tables: &[MomentumTable]) -> DamaiResult<Vec<u8>> {
    let mut workbook = Workbook::new();
    for table in tables {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(&table.column)?;
        worksheet.write_string(0, 0, &table.column)?;
        worksheet.write_string(0, 1, &table.prior_month)?;
        worksheet.write_string(0, 2, &table.latest_month)?;
        worksheet.write_string(0, 3, "环比(%)")?;
        for (i, row) in table.rows.iter().enumerate() {
            let r = (i + 1) as u32;
            worksheet.write_string(r, 0, &row.group)?;
            worksheet.write_number(r, 1, row.prior_amount)?;
            worksheet.write_number(r, 2, row.latest_amount)?;
            worksheet.write_number(r, 3, row.ratio)?;
        }
    }
    Ok(workbook.save_to_buffer()?)
}

pub fn cycle_workbook(rows: &[CycleRow]) -> DamaiResult<Vec<u8>> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(CYCLE_SHEET_NAME)?;
    for (c, header) in CYCLE_HEADERS.iter().enumerate() {
        worksheet.write_string(0, c as u16, *header)?;
    }
    for (i, row) in rows.iter().enumerate() {
        let r = (i + 1) as u32;
        worksheet.write_string(r, 0, &row.customer)?;
        worksheet.write_string(r, 1, &row.staff)?;
        worksheet.write_number(r, 2, row.avg_interval_days)?;
        worksheet.write_number(r, 3, row.min_interval_days as f64)?;
        worksheet.write_number(r, 4, row.max_interval_days as f64)?;
        worksheet.write_string(r, 5, &row.last_order)?;
        worksheet.write_string(r, 6, &row.forecast)?;
        worksheet.write_string(r, 7, &row.product)?;
    }
    Ok(workbook.save_to_buffer()?)
}

fn xlsx_response(buffer: Vec<u8>, file_name: &str) -> Response {
    (
        [
            (header::CONTENT_TYPE, XLSX_CONTENT_TYPE.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name),
            ),
        ],
        buffer,
    )
        .into_response()
}
