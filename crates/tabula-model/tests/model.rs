//! End-to-end model behaviour against real SQLite databases.

use std::sync::Arc;

use serde_json::{json, Value};
use tabula_db::{Database, DbRuntimeSettings};
use tabula_model::{FindOptions, Model, ModelDefinition, ModelError, PageOptions, PageQuery, UpdateOptions};
use tabula_schema::{Bounds, ColumnDecl, Limits};
use tabula_types::{ErrorKind, Filter, IfExists, Record};

fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

fn users() -> ModelDefinition {
    ModelDefinition::new("users")
        .column(
            "name",
            ColumnDecl::new("string").with_limits(Limits::Bounds(Bounds {
                min: Some(1.0),
                max: Some(64.0),
            })),
        )
        .column("tags", ColumnDecl::new("string[]"))
        .column("scores", ColumnDecl::new("int[]"))
        .column("age", ColumnDecl::new("int?"))
        .column("active", ColumnDecl::new("boolean").with_default(true))
        .column("secret", ColumnDecl::new("string?").hidden())
}

async fn open_users() -> (Arc<Database>, Model) {
    let db = Arc::new(Database::in_memory());
    let model = Model::open(Arc::clone(&db), &users())
        .await
        .expect("model should open");
    (db, model)
}

async fn add_user(model: &Model, name: &str, tags: &[&str]) -> Value {
    let ids = model
        .add(vec![record(json!({ "name": name, "tags": tags }))], IfExists::Default)
        .await
        .expect("add should succeed");
    ids[0].clone()
}

#[tokio::test]
async fn added_rows_read_back_decoded() {
    let (_db, model) = open_users().await;

    let ids = model
        .add(
            vec![
                record(json!({"name": "ada", "tags": ["x", "y"], "age": "36", "secret": "s"})),
                record(json!({"name": "bob"})),
            ],
            IfExists::Default,
        )
        .await
        .expect("add should succeed");
    assert_eq!(ids, vec![json!(1), json!(2)]);

    let ada = model
        .get(1, FindOptions::default())
        .await
        .expect("get should succeed")
        .expect("row should exist");
    assert_eq!(ada["id"], json!(1));
    assert_eq!(ada["name"], json!("ada"));
    assert_eq!(ada["tags"], json!(["x", "y"]));
    assert_eq!(ada["scores"], json!([]));
    assert_eq!(ada["age"], json!(36));
    assert_eq!(ada["active"], json!(true));
    assert!(!ada.contains_key("secret"));

    let bob = model
        .get(2, FindOptions::default())
        .await
        .expect("get should succeed")
        .expect("row should exist");
    assert_eq!(bob["tags"], json!([]));
    assert_eq!(bob["age"], Value::Null);

    let raw = model
        .get(
            1,
            FindOptions {
                raw: true,
                ..FindOptions::default()
            },
        )
        .await
        .expect("get should succeed")
        .expect("row should exist");
    assert_eq!(raw["secret"], json!("s"));
    assert_eq!(raw["active"], json!(1));
    assert_eq!(raw["tags"], json!("x\u{1f}y"));
}

#[tokio::test]
async fn explicit_primary_key_round_trip() {
    let db = Arc::new(Database::in_memory());
    let definition = ModelDefinition::new("people")
        .column("id", ColumnDecl::new("int").primary())
        .column(
            "name",
            ColumnDecl::new("string").with_limits(Limits::Bounds(Bounds {
                min: Some(2.0),
                max: Some(100.0),
            })),
        )
        .column("tags", ColumnDecl::new("string[]"));
    let model = Model::open(db, &definition).await.expect("model should open");

    model
        .add(vec![record(json!({"name": "a", "tags": ["x", "y"]}))], IfExists::Default)
        .await
        .expect("add should succeed");

    let row = model
        .get(1, FindOptions::default())
        .await
        .expect("get should succeed")
        .expect("row should exist");
    assert_eq!(row, record(json!({"id": 1, "name": "a", "tags": ["x", "y"]})));
}

#[tokio::test]
async fn arrays_of_every_length_keep_their_order() {
    let (_db, model) = open_users().await;

    for k in 0..6i64 {
        let scores: Vec<i64> = (0..k).rev().collect();
        let ids = model
            .add(
                vec![record(json!({"name": format!("n{k}"), "scores": scores}))],
                IfExists::Default,
            )
            .await
            .expect("add should succeed");
        let row = model
            .get(ids[0].clone(), FindOptions::default())
            .await
            .expect("get should succeed")
            .expect("row should exist");
        assert_eq!(row["scores"], json!(scores), "k = {k}");
    }
}

#[tokio::test]
async fn skip_policy_inserts_default_rows_and_ignores_conflicts() {
    let db = Arc::new(Database::in_memory());
    let definition = ModelDefinition::new("counters")
        .column("label", ColumnDecl::new("string").with_default("none"))
        .column("n", ColumnDecl::new("int").with_default(0));
    let model = Model::open(db, &definition).await.expect("model should open");

    let ids = model
        .add(vec![Record::new(), Record::new()], IfExists::Skip)
        .await
        .expect("add should succeed");
    assert_eq!(ids.len(), 2);
    assert_eq!(model.count(None, None).await.expect("count should succeed"), 2);

    let again = model
        .add(vec![record(json!({"id": 1, "label": "dup"}))], IfExists::Skip)
        .await
        .expect("skipped insert should succeed");
    assert!(again.is_empty());

    let err = model
        .add(vec![record(json!({"id": 1, "label": "dup"}))], IfExists::Default)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SqlError);

    let first = model
        .get(1, FindOptions::default())
        .await
        .expect("get should succeed")
        .expect("row should exist");
    assert_eq!(first["label"], json!("none"));
}

#[tokio::test]
async fn overwrite_replaces_the_row_and_its_arrays() {
    let (_db, model) = open_users().await;
    add_user(&model, "ada", &["old", "older"]).await;

    model
        .add(
            vec![record(json!({"id": 1, "name": "ada2", "tags": ["new"]}))],
            IfExists::Overwrite,
        )
        .await
        .expect("overwrite should succeed");

    let row = model
        .get(1, FindOptions::default())
        .await
        .expect("get should succeed")
        .expect("row should exist");
    assert_eq!(row["name"], json!("ada2"));
    assert_eq!(row["tags"], json!(["new"]));
}

#[tokio::test]
async fn add_and_return_reads_rows_back() {
    let (_db, model) = open_users().await;
    let rows = model
        .add_and_return(
            vec![
                record(json!({"name": "a", "tags": "p,q"})),
                record(json!({"name": "b"})),
            ],
            IfExists::Default,
        )
        .await
        .expect("add should succeed");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["tags"], json!(["p", "q"]));
    assert_eq!(rows[1]["name"], json!("b"));
}

#[tokio::test]
async fn empty_inputs_are_rejected() {
    let (_db, model) = open_users().await;
    let err = model.add(Vec::new(), IfExists::Default).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoData);

    let err = model.get(Value::Null, FindOptions::default()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoId);

    let err = model
        .update(1, Record::new(), UpdateOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoData);

    let err = model.count(Some(json!(1)), Some("nope")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadKey);
}

#[tokio::test]
async fn update_of_a_missing_row_is_no_entry() {
    let (_db, model) = open_users().await;
    let err = model
        .update(42, record(json!({"name": "x"})), UpdateOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoEntry);
}

#[tokio::test]
async fn update_rewrites_columns_and_arrays() {
    let (_db, model) = open_users().await;
    add_user(&model, "ada", &["x", "y"]).await;
    add_user(&model, "bob", &["keep"]).await;

    model
        .update(
            1,
            record(json!({"age": 37, "tags": ["z"], "active": false})),
            UpdateOptions::default(),
        )
        .await
        .expect("update should succeed");

    let ada = model
        .get(1, FindOptions::default())
        .await
        .expect("get should succeed")
        .expect("row should exist");
    assert_eq!(ada["age"], json!(37));
    assert_eq!(ada["tags"], json!(["z"]));
    assert_eq!(ada["active"], json!(false));

    let bob = model
        .get(2, FindOptions::default())
        .await
        .expect("get should succeed")
        .expect("row should exist");
    assert_eq!(bob["tags"], json!(["keep"]));
}

#[tokio::test]
async fn update_by_another_key_must_match_one_row() {
    let (_db, model) = open_users().await;
    add_user(&model, "twin", &[]).await;
    add_user(&model, "twin", &[]).await;

    let err = model
        .update(
            "twin",
            record(json!({"age": 1})),
            UpdateOptions::default().id_key("name"),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ModelError::MultiAction { count: 2, .. }));
}

#[tokio::test]
async fn change_callback_can_edit_or_veto() {
    let (_db, model) = open_users().await;
    add_user(&model, "ada", &[]).await;

    let shout = UpdateOptions::default().on_change(|matched, changes| {
        let name = matched[0]["name"].as_str().unwrap_or_default().to_uppercase();
        changes.insert("name".into(), json!(name));
        Ok(())
    });
    model
        .update(1, record(json!({"age": 5})), shout)
        .await
        .expect("update should succeed");

    let veto = UpdateOptions::default()
        .on_change(|_, _| Err(ModelError::Vetoed("read only".into())));
    let err = model
        .update(1, record(json!({"age": 6})), veto)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Vetoed);

    let row = model
        .get(1, FindOptions::default())
        .await
        .expect("get should succeed")
        .expect("row should exist");
    assert_eq!(row["name"], json!("ADA"));
    assert_eq!(row["age"], json!(5));
}

#[tokio::test]
async fn swap_exchanges_keys_or_renames() {
    let (_db, model) = open_users().await;
    add_user(&model, "a", &["ta"]).await;
    add_user(&model, "b", &["tb"]).await;

    model.swap(1, 2, None).await.expect("swap should succeed");
    let one = model
        .get(1, FindOptions::default())
        .await
        .expect("get should succeed")
        .expect("row should exist");
    assert_eq!(one["name"], json!("b"));
    assert_eq!(one["tags"], json!(["tb"]));

    model.swap(1, 9, None).await.expect("rename should succeed");
    assert!(model
        .get(1, FindOptions::default())
        .await
        .expect("get should succeed")
        .is_none());
    let nine = model
        .get(9, FindOptions::default())
        .await
        .expect("get should succeed")
        .expect("row should exist");
    assert_eq!(nine["tags"], json!(["tb"]));

    let err = model.swap(5, 1, None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoEntry);
}

#[tokio::test]
async fn remove_checks_every_id_and_cascades() {
    let (_db, model) = open_users().await;
    add_user(&model, "a", &["t1", "t2"]).await;
    add_user(&model, "b", &["t3"]).await;

    let err = model
        .batch_remove(vec![json!(1), json!(7)], None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoEntry);
    assert_eq!(model.count(None, None).await.expect("count should succeed"), 2);

    let removed = model
        .batch_remove(vec![json!(1), json!(2)], None)
        .await
        .expect("remove should succeed");
    assert_eq!(removed, 2);

    let leftovers = model
        .custom("SELECT COUNT(*) AS n FROM users_tags", Vec::new(), true)
        .await
        .expect("custom query should run");
    assert_eq!(leftovers[0]["n"], json!(0));

    let err = model.remove(1, None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoEntry);
}

#[tokio::test]
async fn find_supports_partial_matching_and_arrays() {
    let (_db, model) = open_users().await;
    add_user(&model, "ada lovelace", &["math"]).await;
    add_user(&model, "grace", &["navy", "cobol"]).await;

    let partial = FindOptions {
        partial: true,
        ..FindOptions::default()
    };
    let rows = model
        .find(Filter::eq("name", "love"), partial.clone())
        .await
        .expect("find should succeed");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["name"], json!("ada lovelace"));

    let rows = model
        .find(Filter::eq("tags", "cob"), partial)
        .await
        .expect("find should succeed");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["name"], json!("grace"));

    let rows = model
        .find(Filter::eq("NAME", "grace"), FindOptions::default())
        .await
        .expect("keys should match ignoring case");
    assert_eq!(rows.len(), 1);
}

#[tokio::test]
async fn unrestricted_or_branches_match_every_row() {
    let (_db, model) = open_users().await;
    add_user(&model, "ada", &[]).await;
    add_user(&model, "bob", &[]).await;
    model
        .update(2, record(json!({"age": 7})), UpdateOptions::default())
        .await
        .expect("update should succeed");

    let anything = Filter::Or(vec![Filter::eq("name", "zzz"), Filter::All]);
    let rows = model
        .find(anything.clone(), FindOptions::default())
        .await
        .expect("find should succeed");
    assert_eq!(rows.len(), 2);

    let rows = model
        .find(
            Filter::And(vec![anything, Filter::eq("age", 7)]),
            FindOptions::default(),
        )
        .await
        .expect("find should succeed");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["name"], json!("bob"));
}

#[tokio::test]
async fn decoded_rows_follow_declaration_order() {
    let (_db, model) = open_users().await;
    add_user(&model, "ada", &["x"]).await;

    let row = model
        .get(1, FindOptions::default())
        .await
        .expect("get should succeed")
        .expect("row should exist");
    let keys: Vec<_> = row.keys().map(String::as_str).collect();
    assert_eq!(keys, ["id", "name", "tags", "scores", "age", "active"]);
}

#[tokio::test]
async fn pages_are_clamped_and_sorted() {
    let (_db, model) = open_users().await;
    let rows: Vec<Record> = (0..12)
        .map(|i| record(json!({"name": format!("user{i:02}"), "age": 100 - i})))
        .collect();
    model
        .add(rows, IfExists::Default)
        .await
        .expect("add should succeed");

    let page = model
        .get_page_data(PageQuery { page: 9, size: 5 }, PageOptions::default())
        .await
        .expect("page should load");
    assert_eq!(page.page, 3);
    assert_eq!(page.page_count, 3);
    assert_eq!(page.total, 12);
    assert_eq!(page.data.len(), 2);
    assert_eq!(page.sizes, vec![5, 10, 25, 50, 100]);

    let first = model
        .get_page(1, 3, false, Some("age"))
        .await
        .expect("page should load");
    let ages: Vec<_> = first.iter().map(|row| row["age"].clone()).collect();
    assert_eq!(ages, vec![json!(89), json!(90), json!(91)]);

    let last = model
        .get_page(1, 1, true, None)
        .await
        .expect("page should load");
    assert_eq!(last[0]["id"], json!(12));

    let err = model.get_page(1, 0, false, None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoSize);

    let err = model
        .get_page(1, 5, false, Some("missing"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadKey);
}

#[tokio::test]
async fn closed_database_reports_no_db() {
    let (db, model) = open_users().await;
    assert!(db.close());

    let err = model.count(None, None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoDb);

    let err = Model::new(&users())
        .expect("schema should build")
        .find(Filter::All, FindOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoDb);
}

#[tokio::test]
async fn file_databases_persist_across_handles() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let path = dir.path().join("tabula.db");
    let path = path.to_str().expect("temp path should be utf-8");

    let db = Arc::new(Database::new(path, DbRuntimeSettings::default()));
    let model = Model::open(Arc::clone(&db), &users())
        .await
        .expect("model should open");
    add_user(&model, "kept", &["a", "b"]).await;
    db.close();

    let db = Arc::new(Database::new(path, DbRuntimeSettings::default()));
    let model = Model::open(db, &users()).await.expect("model should reopen");
    let row = model
        .get(1, FindOptions::default())
        .await
        .expect("get should succeed")
        .expect("row should exist");
    assert_eq!(row["name"], json!("kept"));
    assert_eq!(row["tags"], json!(["a", "b"]));
}

#[tokio::test]
async fn concurrent_adds_share_one_database() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let path = dir.path().join("shared.db");
    let db = Arc::new(Database::new(
        path.to_str().expect("temp path should be utf-8"),
        DbRuntimeSettings::default(),
    ));
    let model = Arc::new(
        Model::open(db, &users())
            .await
            .expect("model should open"),
    );

    let tasks: Vec<_> = (0..8)
        .map(|i| {
            let model = Arc::clone(&model);
            tokio::spawn(async move { add_user(&model, &format!("u{i}"), &["t"]).await })
        })
        .collect();
    for task in tasks {
        task.await.expect("task should not panic");
    }

    assert_eq!(model.count(None, None).await.expect("count should succeed"), 8);
    let tagged = model
        .count(Some(json!("u3")), Some("name"))
        .await
        .expect("count should succeed");
    assert_eq!(tagged, 1);
}
