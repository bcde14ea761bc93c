use chrono::NaiveDate;
use officebook_core::db::migrations::latest_version;
use officebook_core::db::open_db_in_memory;
use officebook_core::{
    EntityType, Record, RecordListQuery, RecordPatch, RecordRepository, RecordService,
    RecordValidationError, RepoError, SqliteRecordRepository,
};
use rusqlite::Connection;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use uuid::Uuid;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn create_and_get_roundtrip() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteRecordRepository::try_new(&mut conn).unwrap();

    let record = Record::new(EntityType::LicPolicy, date(2025, 2, 10))
        .with_field("client_name", json!("S. Kulkarni"))
        .with_field("policy_number", json!("881234567"));
    let created = repo.create_record(&record).unwrap();
    assert_eq!(created.sequence_number, Some(1));

    let loaded = repo.get_record(record.uuid, false).unwrap().unwrap();
    assert_eq!(loaded, created);
    assert_eq!(loaded.fields["policy_number"], json!("881234567"));
    assert!(loaded.is_active());
}

#[test]
fn create_persists_sanitized_fields() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteRecordRepository::try_new(&mut conn).unwrap();

    let record = Record::new(EntityType::Bill, date(2025, 6, 1))
        .with_category("cheque")
        .with_field("amount", json!(4500))
        .with_field("cheque_number", json!("000123"))
        .with_field("transaction_id", json!("stale"));
    repo.create_record(&record).unwrap();

    let loaded = repo.get_record(record.uuid, false).unwrap().unwrap();
    assert_eq!(loaded.fields["cheque_number"], json!("000123"));
    assert_eq!(loaded.fields["transaction_id"], Value::Null);
    assert_eq!(loaded.fields["amount"], json!(4500));
}

#[test]
fn create_rejects_prenumbered_record() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteRecordRepository::try_new(&mut conn).unwrap();

    let mut record = Record::new(EntityType::LicPolicy, date(2025, 2, 10));
    record.sequence_number = Some(42);
    let err = repo.create_record(&record).unwrap_err();
    assert!(matches!(err, RepoError::SequenceAlreadyAssigned(id) if id == record.uuid));
}

#[test]
fn validation_failure_blocks_create_and_update() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteRecordRepository::try_new(&mut conn).unwrap();

    let missing_category = Record::new(EntityType::GicPolicy, date(2025, 5, 1));
    let err = repo.create_record(&missing_category).unwrap_err();
    assert!(matches!(
        err,
        RepoError::Validation(RecordValidationError::MissingCategory { .. })
    ));

    let valid = Record::new(EntityType::GicPolicy, date(2025, 5, 1)).with_category("motor");
    let mut stored = repo.create_record(&valid).unwrap();
    stored.category = Some("marine".to_string());
    let err = repo.update_record(&stored).unwrap_err();
    assert!(matches!(
        err,
        RepoError::Validation(RecordValidationError::UnknownCategory { .. })
    ));
}

#[test]
fn update_within_window_keeps_number() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteRecordRepository::try_new(&mut conn).unwrap();

    let record = Record::new(EntityType::RtoWork, date(2025, 3, 3))
        .with_category("renewal")
        .with_field("vehicle_number", json!("MH14XY0001"));
    let mut stored = repo.create_record(&record).unwrap();

    stored.occurred_on = date(2025, 3, 28);
    stored.category = Some("transfer".to_string());
    stored.fields.insert("buyer_name".to_string(), json!("A. Shinde"));
    stored.fields.insert("valid_till".to_string(), json!("2030-03-01"));
    let updated = repo.update_record(&stored).unwrap();

    assert_eq!(updated.sequence_number, Some(1));
    let loaded = repo.get_record(record.uuid, false).unwrap().unwrap();
    assert_eq!(loaded.occurred_on, date(2025, 3, 28));
    assert_eq!(loaded.fields["buyer_name"], json!("A. Shinde"));
    assert_eq!(loaded.fields["valid_till"], Value::Null);
}

#[test]
fn update_rejects_sequence_change() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteRecordRepository::try_new(&mut conn).unwrap();

    let mut stored = repo
        .create_record(&Record::new(EntityType::LicPolicy, date(2025, 2, 10)))
        .unwrap();
    stored.sequence_number = Some(9);
    let err = repo.update_record(&stored).unwrap_err();
    assert!(matches!(
        err,
        RepoError::SequenceImmutable {
            stored: 1,
            requested: 9,
            ..
        }
    ));
}

#[test]
fn update_rejects_moving_to_another_window() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteRecordRepository::try_new(&mut conn).unwrap();

    let mut stored = repo
        .create_record(&Record::new(EntityType::LicPolicy, date(2025, 3, 31)))
        .unwrap();
    stored.occurred_on = date(2025, 4, 1);
    let err = repo.update_record(&stored).unwrap_err();
    match err {
        RepoError::WindowChanged { from, to, .. } => {
            assert_eq!(from, "FY2024-25");
            assert_eq!(to, "FY2025-26");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn update_not_found_returns_not_found() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteRecordRepository::try_new(&mut conn).unwrap();

    let record = Record::new(EntityType::LicPolicy, date(2025, 2, 10));
    let err = repo.update_record(&record).unwrap_err();
    assert!(matches!(err, RepoError::NotFound(id) if id == record.uuid));
}

#[test]
fn update_rejects_entity_change() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteRecordRepository::try_new(&mut conn).unwrap();

    let mut stored = repo
        .create_record(&Record::new(EntityType::LicPolicy, date(2025, 2, 10)))
        .unwrap();
    stored.entity = EntityType::Bill;
    stored.category = Some("cash".to_string());
    let err = repo.update_record(&stored).unwrap_err();
    assert!(matches!(err, RepoError::EntityImmutable { .. }));
}

#[test]
fn soft_delete_is_idempotent_and_hides_record() {
    let mut conn = open_db_in_memory().unwrap();
    let id = {
        let mut repo = SqliteRecordRepository::try_new(&mut conn).unwrap();
        let stored = repo
            .create_record(&Record::new(EntityType::LicPolicy, date(2025, 2, 10)))
            .unwrap();

        repo.soft_delete_record(stored.uuid).unwrap();
        assert!(repo.get_record(stored.uuid, false).unwrap().is_none());
        let deleted = repo.get_record(stored.uuid, true).unwrap().unwrap();
        assert!(deleted.deleted_at.is_some());
        stored.uuid
    };

    conn.execute(
        "UPDATE records SET deleted_at = 1000 WHERE uuid = ?1;",
        [id.to_string()],
    )
    .unwrap();

    let repo = SqliteRecordRepository::try_new(&mut conn).unwrap();
    repo.soft_delete_record(id).unwrap();
    let deleted = repo.get_record(id, true).unwrap().unwrap();
    assert_eq!(deleted.deleted_at, Some(1000));
}

#[test]
fn soft_delete_unknown_record_returns_not_found() {
    let mut conn = open_db_in_memory().unwrap();
    let repo = SqliteRecordRepository::try_new(&mut conn).unwrap();

    let id = Uuid::new_v4();
    let err = repo.soft_delete_record(id).unwrap_err();
    assert!(matches!(err, RepoError::NotFound(missing) if missing == id));
}

#[test]
fn list_excludes_deleted_by_default_and_can_include_them() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteRecordRepository::try_new(&mut conn).unwrap();

    let active = repo
        .create_record(&Record::new(EntityType::LicPolicy, date(2025, 2, 10)))
        .unwrap();
    let deleted = repo
        .create_record(&Record::new(EntityType::LicPolicy, date(2025, 2, 11)))
        .unwrap();
    repo.soft_delete_record(deleted.uuid).unwrap();

    let visible = repo.list_records(&RecordListQuery::default()).unwrap();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].uuid, active.uuid);

    let all = repo
        .list_records(&RecordListQuery {
            include_deleted: true,
            ..RecordListQuery::default()
        })
        .unwrap();
    assert_eq!(all.len(), 2);
}

#[test]
fn list_filters_by_entity_and_window_in_sequence_order() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteRecordRepository::try_new(&mut conn).unwrap();

    for day in [5, 1, 9] {
        repo.create_record(&Record::new(EntityType::LicPolicy, date(2025, 1, day)))
            .unwrap();
    }
    repo.create_record(&Record::new(EntityType::LicPolicy, date(2025, 4, 2)))
        .unwrap();
    repo.create_record(&Record::new(EntityType::Bill, date(2025, 1, 3)).with_category("cash"))
        .unwrap();

    let query = RecordListQuery {
        entity: Some(EntityType::LicPolicy),
        window_key: Some("FY2024-25".to_string()),
        ..RecordListQuery::default()
    };
    let page = repo.list_records(&query).unwrap();
    let numbers: Vec<_> = page.iter().map(|r| r.sequence_number.unwrap()).collect();
    let days: Vec<_> = page.iter().map(|r| r.occurred_on).collect();
    assert_eq!(numbers, vec![1, 2, 3]);
    assert_eq!(days, vec![date(2025, 1, 5), date(2025, 1, 1), date(2025, 1, 9)]);
}

#[test]
fn list_pagination_with_limit_and_offset_is_stable() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteRecordRepository::try_new(&mut conn).unwrap();

    for day in 1..=4 {
        repo.create_record(&Record::new(EntityType::LicPolicy, date(2025, 5, day)))
            .unwrap();
    }

    let limited = repo
        .list_records(&RecordListQuery {
            limit: Some(2),
            offset: 1,
            ..RecordListQuery::default()
        })
        .unwrap();
    let numbers: Vec<_> = limited.iter().map(|r| r.sequence_number.unwrap()).collect();
    assert_eq!(numbers, vec![2, 3]);

    let offset_only = repo
        .list_records(&RecordListQuery {
            offset: 3,
            ..RecordListQuery::default()
        })
        .unwrap();
    assert_eq!(offset_only.len(), 1);
    assert_eq!(offset_only[0].sequence_number, Some(4));
}

#[test]
fn corrupted_row_is_reported_not_masked() {
    let mut conn = open_db_in_memory().unwrap();
    let id = {
        let mut repo = SqliteRecordRepository::try_new(&mut conn).unwrap();
        repo.create_record(&Record::new(EntityType::LicPolicy, date(2025, 2, 10)))
            .unwrap()
            .uuid
    };
    conn.execute(
        "UPDATE records SET fields = 'not json' WHERE uuid = ?1;",
        [id.to_string()],
    )
    .unwrap();

    let repo = SqliteRecordRepository::try_new(&mut conn).unwrap();
    let err = repo.get_record(id, false).unwrap_err();
    assert!(matches!(err, RepoError::InvalidData(_)));
}

#[test]
fn service_creates_edits_and_lists_window() {
    let mut conn = open_db_in_memory().unwrap();
    let repo = SqliteRecordRepository::try_new(&mut conn).unwrap();
    let mut service = RecordService::new(repo);

    let mut fields = BTreeMap::new();
    fields.insert("client_name".to_string(), json!("P. Jadhav"));
    fields.insert("sip_amount".to_string(), json!(2000));
    let created = service
        .create_record(
            EntityType::MfInvestment,
            date(2025, 7, 1),
            Some("sip".to_string()),
            fields,
        )
        .unwrap();
    assert_eq!(created.sequence_number, Some(1));

    let mut patch = RecordPatch {
        category: Some("lumpsum".to_string()),
        ..RecordPatch::default()
    };
    patch
        .fields
        .insert("lumpsum_amount".to_string(), json!(50000));
    let edited = service.edit_record(created.uuid, patch).unwrap();
    assert_eq!(edited.fields["sip_amount"], Value::Null);
    assert_eq!(edited.fields["lumpsum_amount"], json!(50000));
    assert_eq!(edited.fields["client_name"], json!("P. Jadhav"));

    let window = service
        .list_window(EntityType::MfInvestment, date(2025, 12, 31), false)
        .unwrap();
    assert_eq!(window.len(), 1);
    assert_eq!(service.next_sequence(EntityType::MfInvestment, date(2025, 1, 1)).unwrap(), 2);
    assert_eq!(service.next_sequence(EntityType::MfInvestment, date(2026, 1, 1)).unwrap(), 1);
}

#[test]
fn service_import_keeps_caller_id_and_update_replaces_content() {
    let mut conn = open_db_in_memory().unwrap();
    let repo = SqliteRecordRepository::try_new(&mut conn).unwrap();
    let mut service = RecordService::new(repo);

    service
        .create_record(
            EntityType::GicPolicy,
            date(2025, 9, 2),
            Some("health".to_string()),
            BTreeMap::new(),
        )
        .unwrap();

    let external_id = Uuid::new_v4();
    let imported = service
        .import_record(
            &Record::with_id(external_id, EntityType::GicPolicy, date(2025, 9, 3))
                .with_category("motor")
                .with_field("vehicle_number", json!("MH12AB1234"))
                .with_field("sum_insured", json!(300000)),
        )
        .unwrap();
    assert_eq!(imported.uuid, external_id);
    assert_eq!(imported.sequence_number, Some(2));
    assert_eq!(imported.fields["sum_insured"], Value::Null);

    let mut replacement = imported.clone();
    replacement.category = Some("fire".to_string());
    replacement
        .fields
        .insert("sum_insured".to_string(), json!(500000));
    let updated = service.update_record(&replacement).unwrap();
    assert_eq!(updated.uuid, external_id);
    assert_eq!(updated.sequence_number, Some(2));
    assert_eq!(updated.fields["vehicle_number"], Value::Null);
    assert_eq!(updated.fields["sum_insured"], json!(500000));

    let loaded = service.get_record(external_id, false).unwrap().unwrap();
    assert_eq!(loaded, updated);
}

#[test]
fn repository_rejects_uninitialized_connection() {
    let mut conn = Connection::open_in_memory().unwrap();

    let result = SqliteRecordRepository::try_new(&mut conn);
    match result {
        Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version: 0,
        }) => assert!(expected_version > 0),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("expected uninitialized connection error"),
    }
}

#[test]
fn repository_rejects_connection_without_records_table() {
    let mut conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(&format!("PRAGMA user_version = {};", latest_version()))
        .unwrap();

    let result = SqliteRecordRepository::try_new(&mut conn);
    assert!(matches!(
        result,
        Err(RepoError::MissingRequiredTable("records"))
    ));
}

#[test]
fn repository_rejects_connection_missing_required_column() {
    let mut conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TABLE records (
            uuid TEXT PRIMARY KEY NOT NULL,
            entity_type TEXT NOT NULL,
            sequence_number INTEGER NOT NULL,
            occurred_on TEXT NOT NULL
        );",
    )
    .unwrap();
    conn.execute_batch(&format!("PRAGMA user_version = {};", latest_version()))
        .unwrap();

    let result = SqliteRecordRepository::try_new(&mut conn);
    assert!(matches!(
        result,
        Err(RepoError::MissingRequiredColumn {
            table: "records",
            column: "window_key"
        })
    ));
}
