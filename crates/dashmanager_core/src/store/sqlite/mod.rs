//! SQLite implementation of the generic data-access contract.
//!
//! # Responsibility
//! - Translate `Select`/insert/update/delete requests into parameterized SQL.
//! - Convert between JSON row values and SQLite column storage.
//!
//! # Invariants
//! - Identifiers come from the static table schema only; values are always
//!   bound as parameters.
//! - Multi-row inserts are applied in one SQLite transaction (one call).
//! - Unordered selects return rows in insertion (`rowid`) order.

use super::{
    check_filters, check_row_columns, Column, ColumnKind, DataStore, Filter, Order, Row, Select,
    StoreError, StoreResult, Table,
};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection};
use serde_json::{Number, Value};

pub mod migrations;
mod open;

pub use open::{open_store, open_store_in_memory};

/// Dashboard store over one owned SQLite connection.
pub struct SqliteDataStore {
    conn: Connection,
}

impl SqliteDataStore {
    pub(crate) fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    /// Underlying connection, for diagnostics and tests.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn select_rows(
        &self,
        table: Table,
        filters: &[Filter],
        order: Option<Order>,
    ) -> StoreResult<Vec<Row>> {
        let columns = table.columns();
        let column_list = columns
            .iter()
            .map(|column| quote(column.name))
            .collect::<Vec<_>>()
            .join(", ");
        let mut sql = format!("SELECT {column_list} FROM {}", quote(table.name()));
        let mut binds = Vec::new();
        append_where(&mut sql, &mut binds, table, filters)?;

        match order {
            Some(order) => {
                table.column(order.column)?;
                sql.push_str(&format!(
                    " ORDER BY {} {}, rowid ASC",
                    quote(order.column),
                    if order.descending { "DESC" } else { "ASC" }
                ));
            }
            None => sql.push_str(" ORDER BY rowid ASC"),
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(binds))?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(read_row(row, table, columns)?);
        }
        Ok(out)
    }
}

impl DataStore for SqliteDataStore {
    fn check_connection(&self) -> StoreResult<()> {
        self.conn
            .query_row("SELECT COUNT(*) FROM people;", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }

    fn select(&self, query: &Select) -> StoreResult<Vec<Row>> {
        query.check()?;
        let mut parents = self.select_rows(query.table, &query.filters, query.order)?;

        for child in &query.embeds {
            let key = child
                .parent_key(query.table)
                .ok_or(StoreError::InvalidEmbed {
                    parent: query.table.name(),
                    child: child.name(),
                })?;
            let order = child.embed_order().map(|column| Order {
                column,
                descending: false,
            });

            for parent in parents.iter_mut() {
                let parent_id = parent.get("id").cloned().unwrap_or(Value::Null);
                let children = if parent_id.is_null() {
                    Vec::new()
                } else {
                    self.select_rows(*child, &[Filter::eq(key, parent_id)], order)?
                };
                parent.insert(
                    child.name().to_string(),
                    Value::Array(children.into_iter().map(Value::Object).collect()),
                );
            }
        }

        Ok(parents)
    }

    fn insert(&self, table: Table, rows: &[Row]) -> StoreResult<Vec<Row>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let tx = self.conn.unchecked_transaction()?;
        for row in rows {
            check_row_columns(table, row)?;
            if row.is_empty() {
                return Err(StoreError::InvalidRow(format!(
                    "empty insert row for table `{}`",
                    table.name()
                )));
            }

            let names = row.keys().map(|name| quote(name)).collect::<Vec<_>>();
            let placeholders = vec!["?"; names.len()].join(", ");
            let sql = format!(
                "INSERT INTO {} ({}) VALUES ({placeholders});",
                quote(table.name()),
                names.join(", ")
            );
            let binds = bind_row(table, row)?;
            tx.execute(&sql, params_from_iter(binds))?;
        }
        tx.commit()?;

        Ok(rows.to_vec())
    }

    fn update(&self, table: Table, values: &Row, filters: &[Filter]) -> StoreResult<usize> {
        if filters.is_empty() {
            return Err(StoreError::MissingFilter(table.name()));
        }
        check_row_columns(table, values)?;
        check_filters(table, filters)?;
        if values.is_empty() {
            return Err(StoreError::InvalidRow(format!(
                "empty update for table `{}`",
                table.name()
            )));
        }

        let assignments = values
            .keys()
            .map(|name| format!("{} = ?", quote(name)))
            .collect::<Vec<_>>()
            .join(", ");
        let mut sql = format!("UPDATE {} SET {assignments}", quote(table.name()));
        let mut binds = bind_row(table, values)?;
        append_where(&mut sql, &mut binds, table, filters)?;

        Ok(self.conn.execute(&sql, params_from_iter(binds))?)
    }

    fn delete(&self, table: Table, filters: &[Filter]) -> StoreResult<usize> {
        if filters.is_empty() {
            return Err(StoreError::MissingFilter(table.name()));
        }

        let mut sql = format!("DELETE FROM {}", quote(table.name()));
        let mut binds = Vec::new();
        append_where(&mut sql, &mut binds, table, filters)?;

        Ok(self.conn.execute(&sql, params_from_iter(binds))?)
    }
}

fn quote(identifier: &str) -> String {
    format!("\"{identifier}\"")
}

fn append_where(
    sql: &mut String,
    binds: &mut Vec<SqlValue>,
    table: Table,
    filters: &[Filter],
) -> StoreResult<()> {
    for (index, filter) in filters.iter().enumerate() {
        let column = table.column(filter.column)?;
        sql.push_str(if index == 0 { " WHERE " } else { " AND " });
        if filter.value.is_null() {
            sql.push_str(&format!("{} IS NULL", quote(column.name)));
        } else {
            sql.push_str(&format!("{} = ?", quote(column.name)));
            binds.push(to_sql_value(table, column, &filter.value)?);
        }
    }
    Ok(())
}

fn bind_row(table: Table, row: &Row) -> StoreResult<Vec<SqlValue>> {
    row.iter()
        .map(|(name, value)| to_sql_value(table, table.column(name)?, value))
        .collect()
}

fn to_sql_value(table: Table, column: Column, value: &Value) -> StoreResult<SqlValue> {
    if value.is_null() {
        return Ok(SqlValue::Null);
    }

    let converted = match column.kind {
        ColumnKind::Text => value.as_str().map(|text| SqlValue::Text(text.to_string())),
        ColumnKind::Integer => value.as_i64().map(SqlValue::Integer),
        ColumnKind::Real => value.as_f64().map(SqlValue::Real),
        ColumnKind::Bool => value
            .as_bool()
            .map(|flag| SqlValue::Integer(i64::from(flag)))
            .or_else(|| value.as_i64().map(SqlValue::Integer)),
        ColumnKind::Json => Some(SqlValue::Text(serde_json::to_string(value)?)),
    };

    converted.ok_or_else(|| {
        StoreError::InvalidRow(format!(
            "column `{}.{}` cannot store `{value}`",
            table.name(),
            column.name
        ))
    })
}

fn read_row(row: &rusqlite::Row<'_>, table: Table, columns: &[Column]) -> StoreResult<Row> {
    let mut out = Row::new();
    for (index, column) in columns.iter().enumerate() {
        let value = match column.kind {
            ColumnKind::Text => row
                .get::<_, Option<String>>(index)?
                .map_or(Value::Null, Value::String),
            ColumnKind::Integer => row
                .get::<_, Option<i64>>(index)?
                .map_or(Value::Null, Value::from),
            ColumnKind::Real => row
                .get::<_, Option<f64>>(index)?
                .and_then(Number::from_f64)
                .map_or(Value::Null, Value::Number),
            ColumnKind::Bool => row
                .get::<_, Option<i64>>(index)?
                .map_or(Value::Null, |flag| Value::Bool(flag != 0)),
            ColumnKind::Json => match row.get::<_, Option<String>>(index)? {
                Some(text) => serde_json::from_str(&text).map_err(|err| {
                    StoreError::InvalidRow(format!(
                        "invalid json in `{}.{}`: {err}",
                        table.name(),
                        column.name
                    ))
                })?,
                None => Value::Null,
            },
        };
        out.insert(column.name.to_string(), value);
    }
    Ok(out)
}
