//! Bulk write engine against SQLite.

mod test_utils;

use catalog_sync::bulk::{BulkWriter, TableKind};
use catalog_sync::models::{BrandRecord, Catalog, ModelRecord, Rebate, TireProduct, WheelProduct};
use sea_orm::{ConnectionTrait, Statement};
use serde_json::json;
use test_utils::{MAX_PARAMS, column_values, count_rows, setup_test_db, tire_json, wheel_json};

fn brands(names: &[&str]) -> Vec<BrandRecord> {
    names
        .iter()
        .map(|name| BrandRecord {
            name: name.to_string(),
        })
        .collect()
}

fn tire(value: serde_json::Value) -> TireProduct {
    serde_json::from_value(value).unwrap()
}

#[tokio::test]
async fn brands_are_chunked_and_deduplicated() {
    let db = setup_test_db().await.unwrap();
    let writer = BulkWriter::new(db.clone(), 3);

    let names: Vec<String> = (0..25).map(|i| format!("Brand {i:02}")).collect();
    let records: Vec<BrandRecord> = names
        .iter()
        .map(|name| BrandRecord { name: name.clone() })
        .collect();

    let report = writer.bulk_write(Catalog::Tires, &records).await;
    assert!(report.is_success());
    assert_eq!(report.statements, 9);

    // Existing names are ignored, not duplicated.
    let again = writer
        .bulk_write(Catalog::Tires, &brands(&["Brand 00", "Brand 24", "Brand 99"]))
        .await;
    assert!(again.is_success());
    assert_eq!(count_rows(&db, "tire_brands").await.unwrap(), 26);
    assert_eq!(count_rows(&db, "wheel_brands").await.unwrap(), 0);
}

#[tokio::test]
async fn models_keep_first_written_row() {
    let db = setup_test_db().await.unwrap();
    let writer = BulkWriter::new(db.clone(), MAX_PARAMS);

    let first = ModelRecord {
        name: "Defender".to_string(),
        brand_name: Some("Michelin".to_string()),
        taxonomy_id: None,
    };
    let second = ModelRecord {
        brand_name: Some("Other".to_string()),
        ..first.clone()
    };

    writer.bulk_write(Catalog::Wheels, &[first]).await;
    writer.bulk_write(Catalog::Wheels, &[second]).await;

    assert_eq!(
        column_values(&db, "wheel_models", "brand_name", "id").await.unwrap(),
        vec![Some("Michelin".to_string())]
    );
}

#[tokio::test]
async fn products_are_upserted_by_id() {
    let db = setup_test_db().await.unwrap();
    let writer = BulkWriter::new(db.clone(), MAX_PARAMS);

    let items: Vec<TireProduct> = (1..=5).map(|id| tire(tire_json(id, "Advanta", "AT"))).collect();
    let report = writer.bulk_write(Catalog::Tires, &items).await;
    assert!(report.is_success());
    // 37 columns per tire row, 100 parameters per statement: 2 rows each.
    assert_eq!(report.statements, 3);

    let mut changed = tire_json(3, "Advanta", "AT");
    changed["availability"] = json!("Discontinued");
    writer
        .bulk_write(Catalog::Tires, &[tire(changed)])
        .await
        .into_result()
        .unwrap();

    assert_eq!(count_rows(&db, "tire_products").await.unwrap(), 5);
    let availability = column_values(&db, "tire_products", "availability", "id")
        .await
        .unwrap();
    assert_eq!(availability[2].as_deref(), Some("Discontinued"));
    assert_eq!(
        column_values(&db, "tire_products", "warranty", "id").await.unwrap()[0].as_deref(),
        Some("60000 miles")
    );
}

#[tokio::test]
async fn repeated_product_id_in_one_batch_keeps_last_copy() {
    let db = setup_test_db().await.unwrap();
    let writer = BulkWriter::new(db.clone(), MAX_PARAMS);

    let mut later = tire_json(1, "Advanta", "AT");
    later["availability"] = json!("Backorder");
    let items = vec![
        tire(tire_json(1, "Advanta", "AT")),
        tire(later),
        tire(tire_json(2, "Advanta", "AT")),
    ];

    let report = writer.bulk_write(Catalog::Tires, &items).await;

    assert!(report.is_success());
    assert_eq!(report.records, 2);
    // Both remaining rows fit one statement, so id 1 appears there only once.
    assert_eq!(report.statements, 1);
    assert_eq!(
        column_values(&db, "tire_products", "availability", "id").await.unwrap(),
        vec![Some("Backorder".to_string()), Some("In Stock".to_string())]
    );
}

#[tokio::test]
async fn repeated_rebate_id_keeps_last_copy() {
    let db = setup_test_db().await.unwrap();
    let writer = BulkWriter::new(db.clone(), MAX_PARAMS);

    let rebates: Vec<Rebate> = [("A", "first"), ("A", "second")]
        .iter()
        .map(|(id, title)| serde_json::from_value(json!({ "id": id, "title": title })).unwrap())
        .collect();

    let report = writer.bulk_write(Catalog::Wheels, &rebates).await;

    assert!(report.is_success());
    assert_eq!(report.records, 1);
    assert_eq!(
        column_values(&db, "wheel_rebates", "title", "id").await.unwrap(),
        vec![Some("second".to_string())]
    );
}

#[tokio::test]
async fn wheel_offset_lands_in_its_column() {
    let db = setup_test_db().await.unwrap();
    let writer = BulkWriter::new(db.clone(), MAX_PARAMS);

    let wheel: WheelProduct = serde_json::from_value(wheel_json(7, "Enkei", "RPF1")).unwrap();
    writer
        .bulk_write(Catalog::Wheels, &[wheel])
        .await
        .into_result()
        .unwrap();

    let row = db
        .query_one(Statement::from_string(
            db.get_database_backend(),
            "SELECT wheel_offset, lugs FROM wheel_products WHERE id = '7'".to_string(),
        ))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.try_get::<Option<f64>>("", "wheel_offset").unwrap(), Some(35.0));
    assert_eq!(row.try_get::<Option<f64>>("", "lugs").unwrap(), Some(5.0));
}

#[tokio::test]
async fn fractional_tire_ratings_are_stored() {
    let db = setup_test_db().await.unwrap();
    let writer = BulkWriter::new(db.clone(), MAX_PARAMS);

    let mut value = tire_json(1, "Advanta", "AT");
    value["maxInflationPressure"] = json!(44.5);
    value["revsPerMile"] = json!(702);
    writer
        .bulk_write(Catalog::Tires, &[tire(value)])
        .await
        .into_result()
        .unwrap();

    let row = db
        .query_one(Statement::from_string(
            db.get_database_backend(),
            "SELECT max_inflation_pressure, revs_per_mile FROM tire_products WHERE id = '1'"
                .to_string(),
        ))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        row.try_get::<Option<f64>>("", "max_inflation_pressure").unwrap(),
        Some(44.5)
    );
    assert_eq!(row.try_get::<Option<f64>>("", "revs_per_mile").unwrap(), Some(702.0));
}

#[tokio::test]
async fn record_wider_than_limit_is_reported() {
    let db = setup_test_db().await.unwrap();
    let writer = BulkWriter::new(db.clone(), 10);

    let report = writer
        .bulk_write(Catalog::Tires, &[tire(tire_json(1, "Advanta", "AT"))])
        .await;

    assert!(!report.is_success());
    assert_eq!(report.statements, 0);
    assert_eq!(count_rows(&db, "tire_products").await.unwrap(), 0);
}

#[tokio::test]
async fn deleting_rebates_clears_product_references() {
    let db = setup_test_db().await.unwrap();
    let writer = BulkWriter::new(db.clone(), MAX_PARAMS);

    let rebates: Vec<Rebate> = ["A", "B"]
        .iter()
        .map(|id| serde_json::from_value(json!({ "id": id })).unwrap())
        .collect();
    writer.bulk_write(Catalog::Tires, &rebates).await;

    let mut with_a = tire_json(1, "Advanta", "AT");
    with_a["rebate"] = json!({ "id": "A" });
    let mut with_b = tire_json(2, "Advanta", "AT");
    with_b["rebate"] = json!({ "id": "B" });
    writer
        .bulk_write(Catalog::Tires, &[tire(with_a), tire(with_b)])
        .await;

    let report = writer
        .delete_by_ids(Catalog::Tires, TableKind::Rebates, &["A".to_string()])
        .await;
    assert!(report.is_success());

    assert_eq!(
        writer.stored_ids(Catalog::Tires, TableKind::Rebates).await.unwrap(),
        vec!["B".to_string()]
    );
    assert_eq!(
        column_values(&db, "tire_products", "rebate_id", "id").await.unwrap(),
        vec![None, Some("B".to_string())]
    );
}

#[tokio::test]
async fn products_are_deleted_by_id() {
    let db = setup_test_db().await.unwrap();
    let writer = BulkWriter::new(db.clone(), MAX_PARAMS);

    let items: Vec<TireProduct> = (1..=4).map(|id| tire(tire_json(id, "Advanta", "AT"))).collect();
    writer.bulk_write(Catalog::Tires, &items).await;

    let report = writer
        .delete_by_ids(
            Catalog::Tires,
            TableKind::Products,
            &["2".to_string(), "4".to_string(), "404".to_string()],
        )
        .await;

    assert!(report.is_success());
    assert_eq!(
        column_values(&db, "tire_products", "id", "id").await.unwrap(),
        vec![Some("1".to_string()), Some("3".to_string())]
    );
}
