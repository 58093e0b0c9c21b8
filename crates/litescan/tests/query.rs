//! End-to-end queries against testkit-built database images.

use std::collections::HashSet;
use std::io::Write;

use litescan::{
    parse_statement, plan_select, CancelToken, Database, PagerConfig, QueryPlan, ScanError,
    Statement, Value,
};
use litescan_sql::SelectStatement;
use litescan_testkit::{int, text, DbBuilder, SchemaObj};

async fn open_image(bytes: &[u8]) -> (tempfile::NamedTempFile, Database) {
    let mut f = tempfile::NamedTempFile::new().unwrap();
    f.write_all(bytes).unwrap();
    f.flush().unwrap();
    let db = Database::open(f.path(), PagerConfig::default())
        .await
        .unwrap();
    (f, db)
}

fn select(sql: &str) -> SelectStatement {
    match parse_statement(sql).unwrap() {
        Statement::Select(s) => s,
        other => panic!("expected SELECT, got {other:?}"),
    }
}

/// apples / oranges with an index on apples(color); apples spans an
/// interior page so multi-page traversal is exercised everywhere.
fn orchard_db() -> Vec<u8> {
    let mut builder = DbBuilder::new(512);

    let apples_left = builder.add_table_leaf(&[
        (1, vec![Value::Null, text("Granny Smith"), text("Light Green")]),
        (2, vec![Value::Null, text("Fuji"), text("Red")]),
    ]);
    let apples_right = builder.add_table_leaf(&[
        (3, vec![Value::Null, text("Honeycrisp"), text("Blush Red")]),
        (4, vec![Value::Null, text("Golden Delicious"), text("Yellow")]),
        (5, vec![Value::Null, text("Banana Apple"), text("Yellow")]),
    ]);
    let apples_root = builder.add_table_interior(&[(apples_left, 2)], apples_right);

    let oranges = builder.add_table_leaf(&[
        (1, vec![Value::Null, text("Mandarin")]),
        (2, vec![Value::Null, text("Tangelo")]),
        (3, vec![Value::Null, text("Tangerine")]),
        (4, vec![Value::Null, text("Clementine")]),
        (5, vec![Value::Null, text("Valencia")]),
        (6, vec![Value::Null, text("Navel")]),
    ]);

    let empty = builder.add_table_leaf(&[]);

    // Index on apples(color): entries sorted by key, split over two leaves
    // under an interior root.
    let idx_left = builder.add_index_leaf(&[
        vec![text("Blush Red"), int(3)],
        vec![text("Light Green"), Value::One],
    ]);
    let idx_right = builder.add_index_leaf(&[
        vec![text("Red"), int(2)],
        vec![text("Yellow"), int(4)],
        vec![text("Yellow"), int(5)],
    ]);
    let idx_root =
        builder.add_index_interior(&[(idx_left, vec![text("Light Green"), Value::One])], idx_right);

    builder.set_schema(&[
        SchemaObj::table(
            "apples",
            apples_root,
            "CREATE TABLE apples (id integer primary key, name text, color text)",
        ),
        SchemaObj::table(
            "oranges",
            oranges,
            "CREATE TABLE oranges (id integer primary key, name text)",
        ),
        SchemaObj::table("empty", empty, "CREATE TABLE empty (v text)"),
        SchemaObj::index(
            "idx_apples_color",
            "apples",
            idx_root,
            "CREATE INDEX idx_apples_color ON apples (color)",
        ),
    ]);
    builder.finish()
}

#[tokio::test]
async fn catalog_shape() {
    let (_f, db) = open_image(&orchard_db()).await;
    assert_eq!(db.user_table_count(), 3);
    assert_eq!(
        db.table_names(),
        vec!["sqlite_master", "apples", "oranges", "empty"]
    );

    let apples = db.table("apples").unwrap();
    assert_eq!(apples.schema().len(), 3);
    assert!(apples.schema()[0].is_integer_primary_key);
    assert_eq!(apples.indexes().len(), 1);
    assert_eq!(
        apples.indexes()[0].indexed_columns(),
        &["color".to_owned()]
    );

    // Case-insensitive table lookup.
    assert!(db.table("APPLES").is_ok());
    assert!(matches!(
        db.table("grapes"),
        Err(ScanError::NoSuchTable { .. })
    ));
}

#[tokio::test]
async fn count_equals_row_iteration_length() {
    let (_f, db) = open_image(&orchard_db()).await;
    let cancel = CancelToken::new();
    for name in ["apples", "oranges", "empty"] {
        let table = db.table(name).unwrap();
        let count = table.count(&cancel).await.unwrap();
        let rows = table.rows(&cancel).await.unwrap();
        assert_eq!(count, rows.len() as u64, "{name}");
    }
}

#[tokio::test]
async fn count_shapes() {
    let (_f, db) = open_image(&orchard_db()).await;
    let cancel = CancelToken::new();
    // Empty table.
    assert_eq!(db.table("empty").unwrap().count(&cancel).await.unwrap(), 0);
    // Single leaf equals its cell count.
    assert_eq!(db.table("oranges").unwrap().count(&cancel).await.unwrap(), 6);
    // Multi-page tree equals the sum over leaves.
    assert_eq!(db.table("apples").unwrap().count(&cancel).await.unwrap(), 5);
}

#[tokio::test]
async fn rowid_alias_materializes_from_cell_rowid() {
    let (_f, db) = open_image(&orchard_db()).await;
    let cancel = CancelToken::new();
    let apples = db.table("apples").unwrap();
    let rows = apples.rows(&cancel).await.unwrap();
    assert_eq!(rows[0].get(0), Some(&Value::Integer(1)));
    assert_eq!(rows[4].get(0), Some(&Value::Integer(5)));
    assert_eq!(rows[4].get(1), Some(&Value::Text("Banana Apple".to_owned())));
}

#[tokio::test]
async fn get_by_rowid_hit_and_miss() {
    let (_f, db) = open_image(&orchard_db()).await;
    let cancel = CancelToken::new();
    let apples = db.table("apples").unwrap();

    let row = apples.get_by_rowid(3, &cancel).await.unwrap().unwrap();
    assert_eq!(row.get(1), Some(&Value::Text("Honeycrisp".to_owned())));

    assert!(apples.get_by_rowid(99, &cancel).await.unwrap().is_none());
}

#[tokio::test]
async fn index_search_rowids_subset_of_scan_matches() {
    let (_f, db) = open_image(&orchard_db()).await;
    let cancel = CancelToken::new();
    let apples = db.table("apples").unwrap();
    let index = &apples.indexes()[0];

    for key in ["Yellow", "Red", "Blush Red", "Light Green", "Missing"] {
        let index_rowids: HashSet<i64> = index
            .search_by_key(key, &cancel)
            .await
            .unwrap()
            .iter()
            .map(|e| e.rowid)
            .collect();
        let scan_rowids: HashSet<i64> = apples
            .rows(&cancel)
            .await
            .unwrap()
            .iter()
            .filter(|r| r.get(2).unwrap().render() == key)
            .map(|r| r.rowid)
            .collect();
        // The traversal ran clean, so the subset is exact equality here.
        assert_eq!(index_rowids, scan_rowids, "key {key}");
    }
}

#[tokio::test]
async fn index_count_covers_all_entries() {
    let (_f, db) = open_image(&orchard_db()).await;
    let apples = db.table("apples").unwrap();
    let index = &apples.indexes()[0];
    assert_eq!(index.count(&CancelToken::new()).await.unwrap(), 5);
}

#[tokio::test]
async fn planner_picks_index_only_for_eligible_conjuncts() {
    let (_f, db) = open_image(&orchard_db()).await;
    let apples = db.table("apples").unwrap();

    let eligible = select("SELECT name FROM apples WHERE color = 'Yellow'");
    assert!(plan_select(&apples, eligible.where_clause.as_ref()).is_index_lookup());

    // Equality on the indexed column inside an AND conjunction.
    let conjunct = select("SELECT name FROM apples WHERE name != 'x' AND color = 'Red'");
    match plan_select(&apples, conjunct.where_clause.as_ref()) {
        QueryPlan::IndexLookup { index, key } => {
            assert_eq!(index.name(), "idx_apples_color");
            assert_eq!(key, "Red");
        }
        QueryPlan::TableScan => panic!("expected index lookup"),
    }

    // No WHERE, non-equality, unindexed column, OR at the top: all scans.
    for sql in [
        "SELECT name FROM apples",
        "SELECT name FROM apples WHERE color != 'Red'",
        "SELECT name FROM apples WHERE name = 'Fuji'",
        "SELECT name FROM apples WHERE color = 'Red' OR name = 'Fuji'",
    ] {
        let stmt = select(sql);
        assert!(
            !plan_select(&apples, stmt.where_clause.as_ref()).is_index_lookup(),
            "{sql}"
        );
    }
}

#[tokio::test]
async fn index_lookup_and_table_scan_agree() {
    let (_f, db) = open_image(&orchard_db()).await;
    let cancel = CancelToken::new();

    // Planned as an index lookup.
    let indexed = select("SELECT name, color FROM apples WHERE color = 'Yellow'");
    let via_index = db
        .execute(&Statement::Select(indexed), &cancel)
        .await
        .unwrap();

    // Same predicate made index-ineligible by a tautological OR.
    let scanned =
        select("SELECT name, color FROM apples WHERE color = 'Yellow' OR color = 'Yellow'");
    let via_scan = db
        .execute(&Statement::Select(scanned), &cancel)
        .await
        .unwrap();

    assert_eq!(via_index, via_scan);
    assert_eq!(
        via_index,
        vec![
            "Golden Delicious|Yellow".to_owned(),
            "Banana Apple|Yellow".to_owned()
        ]
    );
}

#[tokio::test]
async fn executor_projections_and_filters() {
    let (_f, db) = open_image(&orchard_db()).await;
    let cancel = CancelToken::new();

    async fn run(db: &Database, cancel: &CancelToken, sql: &str) -> litescan::Result<Vec<String>> {
        let stmt = Statement::Select(select(sql));
        db.execute(&stmt, cancel).await
    }

    assert_eq!(
        run(&db, &cancel, "SELECT COUNT(*) FROM oranges").await.unwrap(),
        vec!["6"]
    );
    assert_eq!(
        run(&db, &cancel, "SELECT COUNT(*) FROM apples WHERE color = 'Yellow'")
            .await
            .unwrap(),
        vec!["2"]
    );
    assert_eq!(
        run(&db, &cancel, "SELECT name FROM apples WHERE color = 'Red'")
            .await
            .unwrap(),
        vec!["Fuji"]
    );
    assert_eq!(
        run(&db, &cancel, "SELECT * FROM apples WHERE name = 'Fuji'")
            .await
            .unwrap(),
        vec!["2|Fuji|Red"]
    );
    assert_eq!(
        run(&db, &cancel, "SELECT name FROM oranges LIMIT 2").await.unwrap(),
        vec!["Mandarin", "Tangelo"]
    );
    assert_eq!(
        run(&db, &cancel, "SELECT name FROM oranges LIMIT 0").await.unwrap(),
        Vec::<String>::new()
    );
    assert_eq!(
        run(&db, &cancel, "SELECT COUNT(*) FROM oranges LIMIT 0")
            .await
            .unwrap(),
        Vec::<String>::new()
    );
    assert_eq!(
        run(&db, &cancel, "SELECT COUNT(*) FROM oranges LIMIT 1")
            .await
            .unwrap(),
        vec!["6"]
    );
    assert_eq!(
        run(&db, &cancel, "SELECT name FROM empty").await.unwrap(),
        Vec::<String>::new()
    );
    // AND / OR / parentheses.
    assert_eq!(
        run(
            &db,
            &cancel,
            "SELECT name FROM apples WHERE (color = 'Red' OR color = 'Yellow') AND name != 'Banana Apple'"
        )
        .await
        .unwrap(),
        vec!["Fuji", "Golden Delicious"]
    );

    let err = run(&db, &cancel, "SELECT nope FROM apples").await.unwrap_err();
    assert!(matches!(err, ScanError::NoSuchColumn { .. }));
}

#[tokio::test]
async fn repeated_operations_are_idempotent() {
    let (_f, db) = open_image(&orchard_db()).await;
    let cancel = CancelToken::new();
    let stmt = Statement::Select(select("SELECT name, color FROM apples WHERE color = 'Yellow'"));

    let first = db.execute(&stmt, &cancel).await.unwrap();
    let second = db.execute(&stmt, &cancel).await.unwrap();
    assert_eq!(first, second);

    let apples = db.table("apples").unwrap();
    assert_eq!(
        apples.count(&cancel).await.unwrap(),
        apples.count(&cancel).await.unwrap()
    );
}

#[tokio::test]
async fn cancelled_query_surfaces_cancellation() {
    let (_f, db) = open_image(&orchard_db()).await;
    let cancel = CancelToken::new();
    cancel.cancel();
    let stmt = Statement::Select(select("SELECT name FROM apples"));
    let err = db.execute(&stmt, &cancel).await.unwrap_err();
    assert!(matches!(err, ScanError::Cancelled));
}

#[tokio::test]
async fn write_statements_refused() {
    let (_f, db) = open_image(&orchard_db()).await;
    let cancel = CancelToken::new();
    for sql in ["INSERT INTO apples VALUES (1)", "UPDATE apples SET name = 'x'", "DELETE FROM apples"] {
        let stmt = parse_statement(sql).unwrap();
        let err = db.execute(&stmt, &cancel).await.unwrap_err();
        assert!(matches!(err, ScanError::UnsupportedStatement { .. }), "{sql}");
    }
}

#[tokio::test]
async fn unparseable_index_sql_disables_planning_but_not_opening() {
    let mut builder = DbBuilder::new(512);
    let t = builder.add_table_leaf(&[(1, vec![text("x")])]);
    let idx = builder.add_index_leaf(&[vec![text("x"), Value::One]]);
    builder.set_schema(&[
        SchemaObj::table("t", t, "CREATE TABLE t (v text)"),
        SchemaObj::index("broken", "t", idx, "CREATE INDEX broken"),
    ]);
    let (_f, db) = open_image(&builder.finish()).await;

    let table = db.table("t").unwrap();
    assert_eq!(table.indexes().len(), 1);
    assert!(table.indexes()[0].indexed_columns().is_empty());

    let stmt = select("SELECT v FROM t WHERE v = 'x'");
    assert!(!plan_select(&table, stmt.where_clause.as_ref()).is_index_lookup());
}

#[tokio::test]
async fn unparseable_create_table_fails_open() {
    let mut builder = DbBuilder::new(512);
    let t = builder.add_table_leaf(&[]);
    builder.set_schema(&[SchemaObj::table("t", t, "CREATE TABLE t")]);

    let mut f = tempfile::NamedTempFile::new().unwrap();
    f.write_all(&builder.finish()).unwrap();
    f.flush().unwrap();

    let err = Database::open(f.path(), PagerConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ScanError::SchemaUnparseable { .. }));
}
