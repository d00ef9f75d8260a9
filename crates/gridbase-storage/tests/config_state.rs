use gridbase_model::{ColumnType, ComparisonFunction, SortDirection};
use gridbase_storage::{Storage, StorageError};
use uuid::Uuid;

struct Fixture {
    storage: Storage,
    table_id: Uuid,
    name_col: Uuid,
    age_col: Uuid,
}

fn fixture() -> Fixture {
    let storage = Storage::open_in_memory().expect("open storage");
    let base = storage.create_base("Test base", "user-1").expect("create base");
    let table = storage.create_table(base.id, "People").expect("create table");
    let name_col = storage
        .create_column(table.id, "Name", ColumnType::Text)
        .expect("create Name column");
    let age_col = storage
        .create_column(table.id, "Age", ColumnType::Number)
        .expect("create Age column");
    Fixture {
        storage,
        table_id: table.id,
        name_col: name_col.id,
        age_col: age_col.id,
    }
}

#[test]
fn creating_a_duplicate_filter_reactivates_the_existing_record() {
    let fx = fixture();

    let original = fx
        .storage
        .create_filter(fx.age_col, ComparisonFunction::GreaterThan, Some("30"))
        .expect("create filter");
    fx.storage
        .set_filter_state(original.id, None, Some(false))
        .expect("deactivate");

    let again = fx
        .storage
        .create_filter(fx.age_col, ComparisonFunction::GreaterThan, Some("30"))
        .expect("recreate filter");
    assert_eq!(again.id, original.id);
    assert!(again.is_active);
    assert_eq!(fx.storage.list_filters(fx.table_id).expect("list filters").len(), 1);

    // A different value is a different record.
    let other = fx
        .storage
        .create_filter(fx.age_col, ComparisonFunction::GreaterThan, Some("40"))
        .expect("create filter");
    assert_ne!(other.id, original.id);
    assert_eq!(fx.storage.list_filters(fx.table_id).expect("list filters").len(), 2);
}

#[test]
fn value_less_filters_deduplicate_on_their_function() {
    let fx = fixture();

    let first = fx
        .storage
        .create_filter(fx.name_col, ComparisonFunction::IsEmpty, None)
        .expect("create filter");
    // A stray value on a value-less function is discarded, so this is the
    // same record.
    let second = fx
        .storage
        .create_filter(fx.name_col, ComparisonFunction::IsEmpty, Some("ignored"))
        .expect("recreate filter");

    assert_eq!(second.id, first.id);
    assert_eq!(second.comparison_value, None);
    assert_eq!(fx.storage.list_filters(fx.table_id).expect("list filters").len(), 1);
}

#[test]
fn create_filter_requires_a_value_for_comparisons() {
    let fx = fixture();

    let err = fx
        .storage
        .create_filter(fx.age_col, ComparisonFunction::LessThan, None)
        .expect_err("value-less LESS_THAN");
    match err {
        StorageError::MissingComparisonValue(function) => {
            assert_eq!(function, ComparisonFunction::LessThan);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn create_filter_rejects_unknown_columns() {
    let fx = fixture();
    let missing = Uuid::new_v4();

    let err = fx
        .storage
        .create_filter(missing, ComparisonFunction::IsEmpty, None)
        .expect_err("unknown column");
    match err {
        StorageError::ColumnNotFound(id) => assert_eq!(id, missing),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn set_filter_state_updates_value_and_activation_independently() {
    let fx = fixture();
    let filter = fx
        .storage
        .create_filter(fx.age_col, ComparisonFunction::GreaterThan, Some("30"))
        .expect("create filter");

    let updated = fx
        .storage
        .set_filter_state(filter.id, Some("40"), None)
        .expect("update value");
    assert_eq!(updated.comparison_value.as_deref(), Some("40"));
    assert!(updated.is_active);

    let updated = fx
        .storage
        .set_filter_state(filter.id, None, Some(false))
        .expect("update activation");
    assert_eq!(updated.comparison_value.as_deref(), Some("40"));
    assert!(!updated.is_active);
}

#[test]
fn set_filter_state_ignores_values_on_value_less_functions() {
    let fx = fixture();
    let filter = fx
        .storage
        .create_filter(fx.name_col, ComparisonFunction::IsNotEmpty, None)
        .expect("create filter");

    let updated = fx
        .storage
        .set_filter_state(filter.id, Some("stray"), Some(true))
        .expect("update filter");
    assert_eq!(updated.comparison_value, None);
}

#[test]
fn only_one_sort_order_is_active_per_column() {
    let fx = fixture();

    let asc = fx
        .storage
        .create_sort_order(fx.age_col, SortDirection::Asc)
        .expect("create asc");
    let desc = fx
        .storage
        .create_sort_order(fx.age_col, SortDirection::Desc)
        .expect("create desc");
    assert_ne!(desc.id, asc.id);

    let all = fx.storage.list_sort_orders(fx.table_id).expect("list sorts");
    assert_eq!(all.len(), 2);
    let active = fx
        .storage
        .list_active_sort_orders(fx.table_id)
        .expect("active sorts");
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, desc.id);

    // Asking for ASC again reactivates the original record.
    let again = fx
        .storage
        .create_sort_order(fx.age_col, SortDirection::Asc)
        .expect("recreate asc");
    assert_eq!(again.id, asc.id);
    let active = fx
        .storage
        .list_active_sort_orders(fx.table_id)
        .expect("active sorts");
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, asc.id);
}

#[test]
fn changing_direction_activates_the_sibling_record() {
    let fx = fixture();
    let asc = fx
        .storage
        .create_sort_order(fx.age_col, SortDirection::Asc)
        .expect("create asc");

    let flipped = fx
        .storage
        .set_sort_order_state(asc.id, Some(SortDirection::Desc), None)
        .expect("flip direction");
    assert_ne!(flipped.id, asc.id);
    assert_eq!(flipped.direction, SortDirection::Desc);
    assert!(flipped.is_active);

    // The ASC record stays behind, deactivated.
    let all = fx.storage.list_sort_orders(fx.table_id).expect("list sorts");
    assert_eq!(all.len(), 2);
    let original = all.iter().find(|s| s.id == asc.id).expect("asc record kept");
    assert!(!original.is_active);
}

#[test]
fn sort_orders_on_different_columns_coexist() {
    let fx = fixture();

    let by_age = fx
        .storage
        .create_sort_order(fx.age_col, SortDirection::Desc)
        .expect("sort by age");
    let by_name = fx
        .storage
        .create_sort_order(fx.name_col, SortDirection::Asc)
        .expect("sort by name");

    let active = fx
        .storage
        .list_active_sort_orders(fx.table_id)
        .expect("active sorts");
    assert_eq!(active.len(), 2);
    // Precedence follows creation order.
    assert_eq!(active[0].id, by_age.id);
    assert_eq!(active[1].id, by_name.id);
}

#[test]
fn hide_column_is_idempotent_and_toggleable() {
    let fx = fixture();

    let hidden = fx.storage.hide_column(fx.name_col).expect("hide");
    let again = fx.storage.hide_column(fx.name_col).expect("hide again");
    assert_eq!(again.id, hidden.id);
    assert!(again.is_active);
    assert_eq!(
        fx.storage
            .list_hidden_columns(fx.table_id)
            .expect("list hidden")
            .len(),
        1
    );

    let shown = fx
        .storage
        .set_hidden_column_state(hidden.id, false)
        .expect("unhide");
    assert!(!shown.is_active);
    assert!(fx
        .storage
        .list_active_hidden_columns(fx.table_id)
        .expect("active hidden")
        .is_empty());

    let rehidden = fx.storage.hide_column(fx.name_col).expect("rehide");
    assert_eq!(rehidden.id, hidden.id);
    assert!(rehidden.is_active);
}

#[test]
fn deleting_a_filter_removes_the_record_for_good() {
    let fx = fixture();
    let filter = fx
        .storage
        .create_filter(fx.age_col, ComparisonFunction::GreaterThan, Some("30"))
        .expect("create filter");

    fx.storage.delete_filter(filter.id).expect("delete filter");
    assert!(fx.storage.list_filters(fx.table_id).expect("list filters").is_empty());

    // Recreating after a hard delete mints a fresh record.
    let fresh = fx
        .storage
        .create_filter(fx.age_col, ComparisonFunction::GreaterThan, Some("30"))
        .expect("recreate filter");
    assert_ne!(fresh.id, filter.id);
}

#[test]
fn missing_records_are_reported_by_kind() {
    let fx = fixture();
    let missing = Uuid::new_v4();

    match fx.storage.set_filter_state(missing, None, Some(true)) {
        Err(StorageError::FilterNotFound(id)) => assert_eq!(id, missing),
        other => panic!("unexpected result: {other:?}"),
    }
    match fx.storage.set_sort_order_state(missing, None, Some(true)) {
        Err(StorageError::SortOrderNotFound(id)) => assert_eq!(id, missing),
        other => panic!("unexpected result: {other:?}"),
    }
    match fx.storage.set_hidden_column_state(missing, true) {
        Err(StorageError::HiddenColumnNotFound(id)) => assert_eq!(id, missing),
        other => panic!("unexpected result: {other:?}"),
    }
    match fx.storage.delete_sort_order(missing) {
        Err(StorageError::SortOrderNotFound(id)) => assert_eq!(id, missing),
        other => panic!("unexpected result: {other:?}"),
    }
    match fx.storage.delete_hidden_column(missing) {
        Err(StorageError::HiddenColumnNotFound(id)) => assert_eq!(id, missing),
        other => panic!("unexpected result: {other:?}"),
    }
}
