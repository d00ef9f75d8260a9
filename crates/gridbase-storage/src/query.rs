//! The dynamic row-query engine.
//!
//! A [`RowQuery`] compiles into two SQL statements sharing one predicate:
//! a COUNT over the filtered rows and a windowed page query. Filters render
//! as correlated EXISTS clauses over the row's cells, sort keys as
//! correlated scalar lookups with a creation-order tie-breaker appended
//! last, and each returned row aggregates its visible cells to JSON in the
//! same statement, so a page costs two queries regardless of size.

use crate::config::{active_filters, active_sort_orders};
use crate::storage::{ensure_table, Result, Storage, StorageError};
use gridbase_model::{
    canonicalize_number, CellData, ColumnType, ComparisonFunction, FilterJoin, FilterSpec,
    RowData, RowPage, RowQuery, RowWindow, SortSpec,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Transaction};
use std::collections::HashMap;
use uuid::Uuid;

impl Storage {
    /// Runs a row query against a table.
    ///
    /// Filters select rows, sort keys order them, hidden columns drop
    /// cells from the payload without affecting row membership, and the
    /// window cuts one page out of the ordered result. `total_count`
    /// always reflects the full filtered result. Everything is answered
    /// inside one transaction from one compiled predicate, so the page
    /// and the count can never disagree.
    pub fn list_rows(&self, table_id: Uuid, query: &RowQuery) -> Result<RowPage> {
        let mut conn = self.conn.lock().expect("storage mutex poisoned");
        let tx = conn.transaction()?;
        let page = run_row_query(&tx, table_id, query)?;
        tx.commit()?;
        Ok(page)
    }

    /// Runs the query described by the table's active filters and sort
    /// orders. The active set is resolved inside the same transaction as
    /// the query itself, so a concurrent view switch cannot tear the
    /// configuration snapshot.
    pub fn list_rows_active(&self, table_id: Uuid, window: Option<RowWindow>) -> Result<RowPage> {
        let mut conn = self.conn.lock().expect("storage mutex poisoned");
        let tx = conn.transaction()?;

        ensure_table(&tx, table_id)?;
        let filters = active_filters(&tx, table_id)?;
        let sorts = active_sort_orders(&tx, table_id)?;
        let mut query = RowQuery::from_active(&filters, &sorts);
        query.window = window;

        let page = run_row_query(&tx, table_id, &query)?;
        tx.commit()?;
        Ok(page)
    }
}

fn run_row_query(tx: &Transaction<'_>, table_id: Uuid, query: &RowQuery) -> Result<RowPage> {
    ensure_table(tx, table_id)?;

    for filter in &query.filters {
        if filter.comparison_function.requires_value() && filter.comparison_value.is_none() {
            return Err(StorageError::MissingComparisonValue(
                filter.comparison_function,
            ));
        }
    }

    let column_types = resolve_column_types(tx, table_id, query)?;
    let hidden = hidden_column_ids(tx, table_id)?;
    let compiled = compile(query, &column_types);

    match execute(tx, table_id, &compiled, &hidden, query.window) {
        Ok(page) => Ok(page),
        Err(StorageError::Sqlite(e)) => {
            tracing::error!(error = %e, table = %table_id, "row query failed");
            Err(StorageError::QueryExecution)
        }
        Err(StorageError::Json(e)) => {
            tracing::error!(error = %e, table = %table_id, "row query failed");
            Err(StorageError::QueryExecution)
        }
        Err(other) => Err(other),
    }
}

/// Resolves the type of every column the query references, rejecting
/// references to columns of other tables or to none at all.
fn resolve_column_types(
    tx: &Transaction<'_>,
    table_id: Uuid,
    query: &RowQuery,
) -> Result<HashMap<Uuid, ColumnType>> {
    let mut referenced: Vec<Uuid> = Vec::new();
    for filter in &query.filters {
        if !referenced.contains(&filter.column_id) {
            referenced.push(filter.column_id);
        }
    }
    for sort in &query.sorts {
        if !referenced.contains(&sort.column_id) {
            referenced.push(sort.column_id);
        }
    }
    if referenced.is_empty() {
        return Ok(HashMap::new());
    }

    let placeholders = vec!["?"; referenced.len()].join(", ");
    let sql =
        format!("SELECT id, type FROM columns WHERE table_id = ? AND id IN ({placeholders})");
    let mut values: Vec<Value> = Vec::with_capacity(referenced.len() + 1);
    values.push(Value::Text(table_id.to_string()));
    for id in &referenced {
        values.push(Value::Text(id.to_string()));
    }

    let mut stmt = tx.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(values.iter()), |r| {
        Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?))
    })?;

    let mut types = HashMap::new();
    for row in rows {
        let (id, raw_type) = row?;
        let id = Uuid::parse_str(&id).map_err(|_| rusqlite::Error::InvalidQuery)?;
        let column_type = raw_type
            .parse::<ColumnType>()
            .map_err(|_| rusqlite::Error::InvalidQuery)?;
        types.insert(id, column_type);
    }

    for id in &referenced {
        if !types.contains_key(id) {
            return Err(StorageError::ForeignColumn {
                column: *id,
                table: table_id,
            });
        }
    }
    Ok(types)
}

/// Column ids of the table's actively hidden columns.
fn hidden_column_ids(tx: &Transaction<'_>, table_id: Uuid) -> Result<Vec<String>> {
    let mut stmt = tx.prepare(
        r#"
        SELECT h.column_id
        FROM hidden_columns h
        JOIN columns c ON c.id = h.column_id
        WHERE c.table_id = ?1 AND h.is_active = 1
        "#,
    )?;
    let rows = stmt.query_map(params![table_id.to_string()], |r| r.get::<_, String>(0))?;

    let mut ids = Vec::new();
    for id in rows {
        ids.push(id?);
    }
    Ok(ids)
}

/// The WHERE and ORDER BY fragments compiled from one query, each with its
/// bound parameter values in placeholder order.
struct Compiled {
    /// Combined filter predicate over the row alias `r`; `None` when the
    /// query has no filters.
    predicate: Option<String>,
    predicate_params: Vec<Value>,
    /// Sort terms preceding the position tie-breaker.
    order_terms: Vec<String>,
    order_params: Vec<Value>,
}

fn compile(query: &RowQuery, column_types: &HashMap<Uuid, ColumnType>) -> Compiled {
    // resolve_column_types has verified every referenced column.
    let mut clauses = Vec::new();
    let mut predicate_params = Vec::new();
    for filter in &query.filters {
        clauses.push(filter_clause(
            filter,
            column_types[&filter.column_id],
            &mut predicate_params,
        ));
    }
    let joiner = match query.join {
        FilterJoin::Any => " OR ",
        FilterJoin::All => " AND ",
    };
    let predicate = if clauses.is_empty() {
        None
    } else {
        Some(format!("({})", clauses.join(joiner)))
    };

    let mut order_terms = Vec::new();
    let mut order_params = Vec::new();
    for sort in &query.sorts {
        order_terms.push(sort_term(
            sort,
            column_types[&sort.column_id],
            &mut order_params,
        ));
    }

    Compiled {
        predicate,
        predicate_params,
        order_terms,
        order_params,
    }
}

/// Renders one filter as an EXISTS clause over the row's cells, pushing
/// its parameters in placeholder order.
fn filter_clause(
    filter: &FilterSpec,
    column_type: ColumnType,
    params: &mut Vec<Value>,
) -> String {
    params.push(Value::Text(filter.column_id.to_string()));
    let value = filter.comparison_value.clone().unwrap_or_default();

    let comparison = match filter.comparison_function {
        ComparisonFunction::IsEmpty => "(cf.value IS NULL OR cf.value = '')".to_string(),
        ComparisonFunction::IsNotEmpty => "(cf.value IS NOT NULL AND cf.value <> '')".to_string(),
        ComparisonFunction::Equals => equality_comparison("=", column_type, value, params),
        ComparisonFunction::NotEquals => equality_comparison("<>", column_type, value, params),
        ComparisonFunction::GreaterThan => ordering_comparison(">", column_type, value, params),
        ComparisonFunction::LessThan => ordering_comparison("<", column_type, value, params),
        ComparisonFunction::GreaterThanOrEqual => {
            ordering_comparison(">=", column_type, value, params)
        }
        ComparisonFunction::LessThanOrEqual => {
            ordering_comparison("<=", column_type, value, params)
        }
        ComparisonFunction::Contains => {
            params.push(Value::Text(format!("%{value}%")));
            "cf.value LIKE ?".to_string()
        }
        ComparisonFunction::NotContains => {
            params.push(Value::Text(format!("%{value}%")));
            "cf.value NOT LIKE ?".to_string()
        }
    };

    format!("EXISTS (SELECT 1 FROM cells cf WHERE cf.row_id = r.id AND cf.column_id = ? AND {comparison})")
}

fn equality_comparison(
    op: &str,
    column_type: ColumnType,
    value: String,
    params: &mut Vec<Value>,
) -> String {
    match column_type {
        ColumnType::Text => {
            params.push(Value::Text(value));
            format!("cf.value {op} ? COLLATE NOCASE")
        }
        ColumnType::Number => {
            // Stored NUMBER values are canonical, so fold a numeric
            // spelling of the comparison value to the same form.
            let value = canonicalize_number(&value).unwrap_or(value);
            params.push(Value::Text(value));
            format!("cf.value {op} ?")
        }
    }
}

fn ordering_comparison(
    op: &str,
    column_type: ColumnType,
    value: String,
    params: &mut Vec<Value>,
) -> String {
    params.push(Value::Text(value));
    match column_type {
        // Empty cells cast to NULL so they never satisfy an ordering
        // comparison.
        ColumnType::Number => format!("CAST(NULLIF(cf.value, '') AS REAL) {op} CAST(? AS REAL)"),
        ColumnType::Text => format!("cf.value {op} ? COLLATE NOCASE"),
    }
}

/// Renders one sort key as a correlated scalar lookup ordering term,
/// pushing its parameter.
fn sort_term(sort: &SortSpec, column_type: ColumnType, params: &mut Vec<Value>) -> String {
    params.push(Value::Text(sort.column_id.to_string()));
    let direction = sort.direction.as_str();
    match column_type {
        // Empty NUMBER cells cast to NULL and land last with missing ones.
        ColumnType::Number => format!(
            "(SELECT CAST(NULLIF(cs.value, '') AS REAL) FROM cells cs \
             WHERE cs.row_id = r.id AND cs.column_id = ? LIMIT 1) {direction} NULLS LAST"
        ),
        ColumnType::Text => format!(
            "(SELECT cs.value FROM cells cs \
             WHERE cs.row_id = r.id AND cs.column_id = ? LIMIT 1) COLLATE NOCASE {direction} NULLS LAST"
        ),
    }
}

fn execute(
    tx: &Transaction<'_>,
    table_id: Uuid,
    compiled: &Compiled,
    hidden: &[String],
    window: Option<RowWindow>,
) -> Result<RowPage> {
    let mut count_sql = String::from("SELECT COUNT(*) FROM rows r WHERE r.table_id = ?");
    if let Some(predicate) = &compiled.predicate {
        count_sql.push_str(" AND ");
        count_sql.push_str(predicate);
    }
    let table_param = Value::Text(table_id.to_string());
    let mut count_params: Vec<&Value> = vec![&table_param];
    count_params.extend(compiled.predicate_params.iter());
    let total_count: u64 =
        tx.query_row(&count_sql, params_from_iter(count_params), |r| r.get(0))?;

    let hidden_filter = if hidden.is_empty() {
        String::new()
    } else {
        format!(
            " AND c.column_id NOT IN ({})",
            vec!["?"; hidden.len()].join(", ")
        )
    };
    let mut page_sql = format!(
        r#"
        SELECT r.id,
          COALESCE(json_group_array(json_object(
              'id', c.id, 'columnId', c.column_id, 'value', c.value,
              'column', json_object('id', col.id, 'name', col.name, 'type', col.type))
            ORDER BY col.position) FILTER (WHERE c.id IS NOT NULL), '[]')
        FROM rows r
        LEFT JOIN cells c ON c.row_id = r.id{hidden_filter}
        LEFT JOIN columns col ON col.id = c.column_id
        WHERE r.table_id = ?
        "#
    );
    if let Some(predicate) = &compiled.predicate {
        page_sql.push_str(" AND ");
        page_sql.push_str(predicate);
    }
    page_sql.push_str(" GROUP BY r.id ORDER BY ");
    for term in &compiled.order_terms {
        page_sql.push_str(term);
        page_sql.push_str(", ");
    }
    page_sql.push_str("r.position ASC");
    if window.is_some() {
        page_sql.push_str(" LIMIT ? OFFSET ?");
    }

    let mut page_params: Vec<Value> = Vec::new();
    for column_id in hidden {
        page_params.push(Value::Text(column_id.clone()));
    }
    page_params.push(Value::Text(table_id.to_string()));
    page_params.extend(compiled.predicate_params.iter().cloned());
    page_params.extend(compiled.order_params.iter().cloned());
    if let Some(window) = window {
        page_params.push(Value::Integer(window.limit as i64));
        page_params.push(Value::Integer(window.offset as i64));
    }

    let mut stmt = tx.prepare(&page_sql)?;
    let rows = stmt.query_map(params_from_iter(page_params.iter()), |r| {
        Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?))
    })?;

    let mut out = Vec::new();
    for row in rows {
        let (id, cells_json) = row?;
        let id = Uuid::parse_str(&id).map_err(|_| rusqlite::Error::InvalidQuery)?;
        let cells: Vec<CellData> = serde_json::from_str(&cells_json)?;
        out.push(RowData { id, cells });
    }

    Ok(RowPage {
        total_count,
        rows: out,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridbase_model::SortDirection;

    fn filter_spec(
        column_id: Uuid,
        function: ComparisonFunction,
        value: Option<&str>,
    ) -> FilterSpec {
        FilterSpec {
            column_id,
            comparison_function: function,
            comparison_value: value.map(str::to_string),
        }
    }

    fn text(value: &str) -> Value {
        Value::Text(value.to_string())
    }

    #[test]
    fn text_equality_compiles_to_nocase_comparison() {
        let column_id = Uuid::new_v4();
        let mut params = Vec::new();
        let clause = filter_clause(
            &filter_spec(column_id, ComparisonFunction::Equals, Some("Alice")),
            ColumnType::Text,
            &mut params,
        );

        assert_eq!(
            clause,
            "EXISTS (SELECT 1 FROM cells cf WHERE cf.row_id = r.id AND cf.column_id = ? \
             AND cf.value = ? COLLATE NOCASE)"
        );
        assert_eq!(params, vec![text(&column_id.to_string()), text("Alice")]);
    }

    #[test]
    fn number_equality_canonicalizes_the_bound_value() {
        let column_id = Uuid::new_v4();
        let mut params = Vec::new();
        filter_clause(
            &filter_spec(column_id, ComparisonFunction::Equals, Some("007")),
            ColumnType::Number,
            &mut params,
        );
        assert_eq!(params[1], text("7"));

        // A value no number cell can hold is bound as is and matches nothing.
        let mut params = Vec::new();
        filter_clause(
            &filter_spec(column_id, ComparisonFunction::NotEquals, Some("junk")),
            ColumnType::Number,
            &mut params,
        );
        assert_eq!(params[1], text("junk"));
    }

    #[test]
    fn number_ordering_casts_both_sides() {
        let column_id = Uuid::new_v4();
        let mut params = Vec::new();
        let clause = filter_clause(
            &filter_spec(column_id, ComparisonFunction::GreaterThan, Some("30")),
            ColumnType::Number,
            &mut params,
        );

        assert!(clause.contains("CAST(NULLIF(cf.value, '') AS REAL) > CAST(? AS REAL)"));
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn containment_wraps_the_value_in_wildcards() {
        let column_id = Uuid::new_v4();
        let mut params = Vec::new();
        let clause = filter_clause(
            &filter_spec(column_id, ComparisonFunction::NotContains, Some("ann")),
            ColumnType::Text,
            &mut params,
        );

        assert!(clause.contains("cf.value NOT LIKE ?"));
        assert_eq!(params[1], text("%ann%"));
    }

    #[test]
    fn presence_checks_bind_only_the_column() {
        let column_id = Uuid::new_v4();
        let mut params = Vec::new();
        let clause = filter_clause(
            &filter_spec(column_id, ComparisonFunction::IsEmpty, None),
            ColumnType::Text,
            &mut params,
        );

        assert!(clause.contains("(cf.value IS NULL OR cf.value = '')"));
        assert_eq!(params, vec![text(&column_id.to_string())]);
    }

    #[test]
    fn join_policy_picks_the_connective() {
        let column_id = Uuid::new_v4();
        let mut types = HashMap::new();
        types.insert(column_id, ColumnType::Text);
        let filters = vec![
            filter_spec(column_id, ComparisonFunction::IsEmpty, None),
            filter_spec(column_id, ComparisonFunction::IsNotEmpty, None),
        ];

        let any = compile(
            &RowQuery {
                filters: filters.clone(),
                ..RowQuery::default()
            },
            &types,
        );
        let predicate = any.predicate.expect("predicate");
        assert!(predicate.contains(") OR EXISTS"));
        assert!(!predicate.contains(") AND EXISTS"));

        let all = compile(
            &RowQuery {
                filters,
                join: FilterJoin::All,
                ..RowQuery::default()
            },
            &types,
        );
        assert!(all.predicate.expect("predicate").contains(") AND EXISTS"));
    }

    #[test]
    fn empty_query_compiles_to_no_predicate_or_order_terms() {
        let compiled = compile(&RowQuery::default(), &HashMap::new());
        assert!(compiled.predicate.is_none());
        assert!(compiled.predicate_params.is_empty());
        assert!(compiled.order_terms.is_empty());
    }

    #[test]
    fn sort_terms_order_nulls_last_in_both_directions() {
        let column_id = Uuid::new_v4();
        let mut params = Vec::new();

        let term = sort_term(
            &SortSpec {
                column_id,
                direction: SortDirection::Desc,
            },
            ColumnType::Number,
            &mut params,
        );
        assert!(term.starts_with("(SELECT CAST(NULLIF(cs.value, '') AS REAL)"));
        assert!(term.ends_with("DESC NULLS LAST"));

        let term = sort_term(
            &SortSpec {
                column_id,
                direction: SortDirection::Asc,
            },
            ColumnType::Text,
            &mut params,
        );
        assert!(term.contains("COLLATE NOCASE ASC NULLS LAST"));
        assert_eq!(params.len(), 2);
    }
}
