#[cfg(test)]
mod tests {
    use crate::commands::analysis::{momentum_tables, purchase_cycle, CycleOutcome, MomentumTable};
    use crate::commands::dataset::{
        build_frame, month_index, month_label, parse_order_datetime, OrderBook, RawOrder,
    };
    use chrono::NaiveDate;

    const BASE_COLUMNS: [&str; 5] = ["客户名称", "商品名称", "BD", "下单时间", "实付金额"];

    fn order(customer: &str, product: &str, staff: &str, time: &str, amount: f64) -> RawOrder {
        RawOrder {
            customer: Some(customer.to_string()),
            product: Some(product.to_string()),
            staff: Some(staff.to_string()),
            order_time: parse_order_datetime(time),
            amount,
            ..Default::default()
        }
    }

    fn book(columns: &[&str], orders: Vec<RawOrder>) -> OrderBook {
        OrderBook {
            file_name: "test.xlsx".to_string(),
            columns: columns.iter().map(|column| column.to_string()).collect(),
            rows: orders.len(),
            frame: build_frame(&orders).unwrap(),
        }
    }

    fn customer_table(tables: &[MomentumTable]) -> &MomentumTable {
        tables
            .iter()
            .find(|table| table.column == "客户名称")
            .expect("customer table missing")
    }

    #[test]
    fn test_month_over_month_ratio() {
        let book = book(
            &BASE_COLUMNS,
            vec![
                order("甲公司", "青岛啤酒", "小王", "2024-01-05", 100.0),
                order("甲公司", "青岛啤酒", "小王", "2024-02-05", 150.0),
            ],
        );

        let tables = momentum_tables(&book).unwrap();
        let table = customer_table(&tables);
        assert_eq!(table.prior_month, "2024-01");
        assert_eq!(table.latest_month, "2024-02");
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0].group, "甲公司");
        assert_eq!(table.rows[0].prior_amount, 100.0);
        assert_eq!(table.rows[0].latest_amount, 150.0);
        assert_eq!(table.rows[0].ratio, 50.0);
    }

    /// Groups with revenue in only one of the two months are excluded, not
    /// zero-filled.
    #[test]
    fn test_month_over_month_excludes_partial_groups() {
        let book = book(
            &BASE_COLUMNS,
            vec![
                order("甲公司", "青岛啤酒", "小王", "2024-01-05", 100.0),
                order("甲公司", "青岛啤酒", "小王", "2024-02-05", 150.0),
                order("乙公司", "青岛啤酒", "小李", "2024-02-10", 200.0),
                order("丙公司", "青岛啤酒", "小李", "2024-01-12", 80.0),
            ],
        );

        let tables = momentum_tables(&book).unwrap();
        let table = customer_table(&tables);
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0].group, "甲公司");
    }

    #[test]
    fn test_month_over_month_sorted_descending() {
        let book = book(
            &BASE_COLUMNS,
            vec![
                order("甲公司", "青岛啤酒", "小王", "2024-01-05", 100.0),
                order("甲公司", "青岛啤酒", "小王", "2024-02-05", 150.0),
                order("乙公司", "青岛啤酒", "小李", "2024-01-08", 100.0),
                order("乙公司", "青岛啤酒", "小李", "2024-02-08", 300.0),
                order("丙公司", "青岛啤酒", "小李", "2024-01-12", 100.0),
                order("丙公司", "青岛啤酒", "小李", "2024-02-12", 80.0),
            ],
        );

        let tables = momentum_tables(&book).unwrap();
        let table = customer_table(&tables);
        let groups: Vec<&str> = table.rows.iter().map(|row| row.group.as_str()).collect();
        assert_eq!(groups, vec!["乙公司", "甲公司", "丙公司"]);
        for pair in table.rows.windows(2) {
            assert!(pair[0].ratio >= pair[1].ratio);
        }
    }

    #[test]
    fn test_month_over_month_across_year_boundary() {
        let book = book(
            &BASE_COLUMNS,
            vec![
                order("甲公司", "青岛啤酒", "小王", "2023-12-20", 100.0),
                order("甲公司", "青岛啤酒", "小王", "2024-01-10", 110.0),
            ],
        );

        let tables = momentum_tables(&book).unwrap();
        let table = customer_table(&tables);
        assert_eq!(table.prior_month, "2023-12");
        assert_eq!(table.latest_month, "2024-01");
        assert!((table.rows[0].ratio - 10.0).abs() < 1e-9);
    }

    /// Categorical columns absent from the upload header are skipped.
    #[test]
    fn test_absent_category_column_skipped() {
        let book = book(
            &["客户名称", "下单时间", "实付金额"],
            vec![
                order("甲公司", "青岛啤酒", "小王", "2024-01-05", 100.0),
                order("甲公司", "青岛啤酒", "小王", "2024-02-05", 150.0),
            ],
        );

        let tables = momentum_tables(&book).unwrap();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].column, "客户名称");
    }

    #[test]
    fn test_cycle_product_not_found() {
        let book = book(
            &BASE_COLUMNS,
            vec![order("甲公司", "青岛啤酒", "小王", "2024-01-05", 100.0)],
        );

        let outcome = purchase_cycle(&book, "不存在的商品").unwrap();
        assert!(matches!(outcome, CycleOutcome::NotFound));
    }

    /// Exact match only: a substring of a product name finds nothing.
    #[test]
    fn test_cycle_match_is_exact() {
        let book = book(
            &BASE_COLUMNS,
            vec![order("甲公司", "青岛啤酒500ml", "小王", "2024-01-05", 100.0)],
        );

        let outcome = purchase_cycle(&book, "青岛啤酒").unwrap();
        assert!(matches!(outcome, CycleOutcome::NotFound));
    }

    /// A single order yields no interval, so the customer is dropped from
    /// the summary.
    #[test]
    fn test_cycle_single_order_excluded() {
        let book = book(
            &BASE_COLUMNS,
            vec![order("甲公司", "青岛啤酒", "小王", "2024-01-05", 100.0)],
        );

        match purchase_cycle(&book, "青岛啤酒").unwrap() {
            CycleOutcome::Summary(rows) => assert!(rows.is_empty()),
            CycleOutcome::NotFound => panic!("product should match"),
        }
    }

    #[test]
    fn test_cycle_interval_statistics() {
        let book = book(
            &BASE_COLUMNS,
            vec![
                order("甲公司", "青岛啤酒", "小王", "2024-01-05", 100.0),
                order("甲公司", "青岛啤酒", "小王", "2024-01-15", 120.0),
                order("甲公司", "青岛啤酒", "小王", "2024-01-19", 90.0),
            ],
        );

        let CycleOutcome::Summary(rows) = purchase_cycle(&book, "青岛啤酒").unwrap() else {
            panic!("product should match");
        };
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.customer, "甲公司");
        assert_eq!(row.staff, "小王");
        assert_eq!(row.min_interval_days, 4);
        assert_eq!(row.max_interval_days, 10);
        assert_eq!(row.avg_interval_days, 7.0);
        assert!(row.avg_interval_days >= row.min_interval_days as f64);
        assert!(row.avg_interval_days <= row.max_interval_days as f64);
        assert_eq!(row.last_order, "01月19日");
        assert_eq!(row.forecast, "01月26日");
    }

    /// Same-day repeat orders produce all-zero intervals, which carry no
    /// cycle signal and are filtered.
    #[test]
    fn test_cycle_zero_intervals_filtered() {
        let book = book(
            &BASE_COLUMNS,
            vec![
                order("甲公司", "青岛啤酒", "小王", "2024-01-05", 100.0),
                order("甲公司", "青岛啤酒", "小王", "2024-01-05", 60.0),
            ],
        );

        let CycleOutcome::Summary(rows) = purchase_cycle(&book, "青岛啤酒").unwrap() else {
            panic!("product should match");
        };
        assert!(rows.is_empty());
    }

    /// Rows whose timestamp failed to parse are discarded before interval
    /// computation.
    #[test]
    fn test_cycle_unparseable_dates_discarded() {
        let mut bad = order("甲公司", "青岛啤酒", "小王", "invalid", 50.0);
        bad.order_time = None;
        let book = book(
            &BASE_COLUMNS,
            vec![
                order("甲公司", "青岛啤酒", "小王", "2024-01-05", 100.0),
                bad,
                order("甲公司", "青岛啤酒", "小王", "2024-01-12", 80.0),
            ],
        );

        let CycleOutcome::Summary(rows) = purchase_cycle(&book, "青岛啤酒").unwrap() else {
            panic!("product should match");
        };
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].min_interval_days, 7);
        assert_eq!(rows[0].max_interval_days, 7);
    }

    #[test]
    fn test_cycle_requires_staff_column() {
        let book = book(
            &["客户名称", "商品名称", "下单时间", "实付金额"],
            vec![order("甲公司", "青岛啤酒", "小王", "2024-01-05", 100.0)],
        );

        assert!(purchase_cycle(&book, "青岛啤酒").is_err());
    }

    #[test]
    fn test_parse_order_datetime() {
        assert_eq!(
            parse_order_datetime("2023-10-27"),
            NaiveDate::from_ymd_opt(2023, 10, 27).unwrap().and_hms_opt(0, 0, 0)
        );
        assert_eq!(
            parse_order_datetime("2023/10/27 08:30:00"),
            NaiveDate::from_ymd_opt(2023, 10, 27).unwrap().and_hms_opt(8, 30, 0)
        );
        assert_eq!(
            parse_order_datetime("20231027"),
            NaiveDate::from_ymd_opt(2023, 10, 27).unwrap().and_hms_opt(0, 0, 0)
        );
        assert_eq!(parse_order_datetime("invalid"), None);
        assert_eq!(parse_order_datetime(""), None);
    }

    #[test]
    fn test_month_index_and_label() {
        let may = NaiveDate::from_ymd_opt(2024, 5, 3)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        let december = NaiveDate::from_ymd_opt(2023, 12, 31)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let january = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();

        assert_eq!(month_label(month_index(&may)), "2024-05");
        assert_eq!(month_index(&january) - month_index(&december), 1);
    }
}
