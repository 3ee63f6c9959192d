//! Generic data-access contract over the relational dashboard tables.
//!
//! # Responsibility
//! - Define request/response style select/insert/update/delete with equality
//!   filters, independent from any concrete backend.
//! - Describe table columns so every backend can reject unknown columns.
//!
//! # Invariants
//! - Rows are JSON objects keyed by column name.
//! - `update` and `delete` always require at least one filter.
//! - Embedded child rows are returned under the child table name.
//!
//! # See also
//! - `store::rows` for typed row shapes and join-flattening.

use serde_json::{Map, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod rest;
pub mod rows;
pub mod sqlite;

pub use rest::RestDataStore;
pub use sqlite::{open_store, open_store_in_memory, SqliteDataStore};

/// One table row as a JSON object.
pub type Row = Map<String, Value>;

pub type StoreResult<T> = Result<T, StoreError>;

/// Data-access error for every store backend.
#[derive(Debug)]
pub enum StoreError {
    Sqlite(rusqlite::Error),
    Http(reqwest::Error),
    /// Backend answered with a non-success HTTP status.
    Status {
        status: u16,
        body: String,
    },
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
    UnknownColumn {
        table: &'static str,
        column: String,
    },
    /// `update`/`delete` issued without filters.
    MissingFilter(&'static str),
    InvalidEmbed {
        parent: &'static str,
        child: &'static str,
    },
    /// Row payload does not match the table or DTO shape.
    InvalidRow(String),
    /// Backend refused or could not serve the request.
    Unavailable(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::Http(err) => write!(f, "{err}"),
            Self::Status { status, body } => {
                write!(f, "store request failed with status {status}: {body}")
            }
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "database schema version {db_version} is newer than supported {latest_supported}"
            ),
            Self::UnknownColumn { table, column } => {
                write!(f, "unknown column `{column}` on table `{table}`")
            }
            Self::MissingFilter(table) => {
                write!(f, "refusing unfiltered write on table `{table}`")
            }
            Self::InvalidEmbed { parent, child } => {
                write!(f, "table `{child}` cannot be embedded in `{parent}`")
            }
            Self::InvalidRow(message) => write!(f, "invalid row: {message}"),
            Self::Unavailable(message) => write!(f, "store unavailable: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::Http(err) => Some(err),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(value: reqwest::Error) -> Self {
        Self::Http(value)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::InvalidRow(value.to_string())
    }
}

/// Storage type of a column, used for value conversion by SQL backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Integer,
    Real,
    Bool,
    /// JSON array/object stored as text.
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub kind: ColumnKind,
}

const fn col(name: &'static str, kind: ColumnKind) -> Column {
    Column { name, kind }
}

const PEOPLE_COLUMNS: &[Column] = &[
    col("id", ColumnKind::Text),
    col("name", ColumnKind::Text),
    col("email", ColumnKind::Text),
    col("phone", ColumnKind::Text),
    col("bio", ColumnKind::Text),
    col("avatar", ColumnKind::Text),
];

const GROUPS_COLUMNS: &[Column] = &[
    col("id", ColumnKind::Text),
    col("name", ColumnKind::Text),
    col("description", ColumnKind::Text),
    col("avatar", ColumnKind::Text),
    col("updated_at", ColumnKind::Integer),
];

const GROUP_MEMBERS_COLUMNS: &[Column] = &[
    col("group_id", ColumnKind::Text),
    col("person_id", ColumnKind::Text),
];

const LOCATIONS_COLUMNS: &[Column] = &[
    col("id", ColumnKind::Text),
    col("name", ColumnKind::Text),
    col("address", ColumnKind::Text),
    col("visited", ColumnKind::Bool),
    col("lat", ColumnKind::Real),
    col("lng", ColumnKind::Real),
    col("updated_at", ColumnKind::Integer),
];

const LOCATION_ASSIGNMENTS_COLUMNS: &[Column] = &[
    col("location_id", ColumnKind::Text),
    col("group_id", ColumnKind::Text),
    col("person_id", ColumnKind::Text),
    col("assignment_type", ColumnKind::Text),
];

const TERRITORIES_COLUMNS: &[Column] = &[
    col("id", ColumnKind::Text),
    col("name", ColumnKind::Text),
    col("description", ColumnKind::Text),
    col("image_url", ColumnKind::Text),
    col("created_at", ColumnKind::Text),
    col("updated_at", ColumnKind::Text),
];

const TERRITORY_IMAGES_COLUMNS: &[Column] = &[
    col("id", ColumnKind::Text),
    col("territory_id", ColumnKind::Text),
    col("url", ColumnKind::Text),
    col("description", ColumnKind::Text),
    col("assigned_groups", ColumnKind::Json),
    col("assigned_people", ColumnKind::Json),
    col("position", ColumnKind::Integer),
    col("created_at", ColumnKind::Text),
];

/// Tables known to the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    People,
    Groups,
    GroupMembers,
    Locations,
    LocationAssignments,
    Territories,
    TerritoryImages,
}

impl Table {
    pub fn name(self) -> &'static str {
        match self {
            Self::People => "people",
            Self::Groups => "groups",
            Self::GroupMembers => "group_members",
            Self::Locations => "locations",
            Self::LocationAssignments => "location_assignments",
            Self::Territories => "territories",
            Self::TerritoryImages => "territory_images",
        }
    }

    pub fn columns(self) -> &'static [Column] {
        match self {
            Self::People => PEOPLE_COLUMNS,
            Self::Groups => GROUPS_COLUMNS,
            Self::GroupMembers => GROUP_MEMBERS_COLUMNS,
            Self::Locations => LOCATIONS_COLUMNS,
            Self::LocationAssignments => LOCATION_ASSIGNMENTS_COLUMNS,
            Self::Territories => TERRITORIES_COLUMNS,
            Self::TerritoryImages => TERRITORY_IMAGES_COLUMNS,
        }
    }

    pub fn column(self, name: &str) -> StoreResult<Column> {
        self.columns()
            .iter()
            .copied()
            .find(|column| column.name == name)
            .ok_or_else(|| StoreError::UnknownColumn {
                table: self.name(),
                column: name.to_string(),
            })
    }

    /// Foreign-key column on `self` that points at `parent.id`.
    pub fn parent_key(self, parent: Table) -> Option<&'static str> {
        match (parent, self) {
            (Self::Groups, Self::GroupMembers) => Some("group_id"),
            (Self::Locations, Self::LocationAssignments) => Some("location_id"),
            (Self::Territories, Self::TerritoryImages) => Some("territory_id"),
            _ => None,
        }
    }

    /// Ordering applied to embedded child rows.
    pub fn embed_order(self) -> Option<&'static str> {
        match self {
            Self::TerritoryImages => Some("position"),
            _ => None,
        }
    }
}

/// Equality filter `column = value`.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub column: &'static str,
    pub value: Value,
}

impl Filter {
    pub fn eq(column: &'static str, value: impl Into<Value>) -> Self {
        Self {
            column,
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Order {
    pub column: &'static str,
    pub descending: bool,
}

/// Select request with optional filters, embedded children and ordering.
#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    pub table: Table,
    pub filters: Vec<Filter>,
    pub embeds: Vec<Table>,
    pub order: Option<Order>,
}

impl Select {
    pub fn from(table: Table) -> Self {
        Self {
            table,
            filters: Vec::new(),
            embeds: Vec::new(),
            order: None,
        }
    }

    pub fn filter(mut self, column: &'static str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::eq(column, value));
        self
    }

    pub fn embed(mut self, child: Table) -> Self {
        self.embeds.push(child);
        self
    }

    pub fn order_by(mut self, column: &'static str, descending: bool) -> Self {
        self.order = Some(Order { column, descending });
        self
    }

    /// Checks every referenced column and embed against the schema.
    pub fn check(&self) -> StoreResult<()> {
        check_filters(self.table, &self.filters)?;
        if let Some(order) = self.order {
            self.table.column(order.column)?;
        }
        for child in &self.embeds {
            if child.parent_key(self.table).is_none() {
                return Err(StoreError::InvalidEmbed {
                    parent: self.table.name(),
                    child: child.name(),
                });
            }
        }
        Ok(())
    }
}

pub(crate) fn check_filters(table: Table, filters: &[Filter]) -> StoreResult<()> {
    for filter in filters {
        table.column(filter.column)?;
    }
    Ok(())
}

pub(crate) fn check_row_columns(table: Table, row: &Row) -> StoreResult<()> {
    for key in row.keys() {
        table.column(key)?;
    }
    Ok(())
}

/// Request/response data access over the dashboard tables.
///
/// Every method is one remote call; callers sequence multi-table writes
/// themselves and get no atomicity across calls.
pub trait DataStore: Send {
    /// Verifies that the backend is reachable and the schema is usable.
    fn check_connection(&self) -> StoreResult<()>;
    fn select(&self, query: &Select) -> StoreResult<Vec<Row>>;
    /// Inserts all rows in one call and returns their stored representation.
    fn insert(&self, table: Table, rows: &[Row]) -> StoreResult<Vec<Row>>;
    /// Returns the number of matched rows.
    fn update(&self, table: Table, values: &Row, filters: &[Filter]) -> StoreResult<usize>;
    /// Returns the number of deleted rows.
    fn delete(&self, table: Table, filters: &[Filter]) -> StoreResult<usize>;
}

impl<S: DataStore + ?Sized> DataStore for Box<S> {
    fn check_connection(&self) -> StoreResult<()> {
        (**self).check_connection()
    }

    fn select(&self, query: &Select) -> StoreResult<Vec<Row>> {
        (**self).select(query)
    }

    fn insert(&self, table: Table, rows: &[Row]) -> StoreResult<Vec<Row>> {
        (**self).insert(table, rows)
    }

    fn update(&self, table: Table, values: &Row, filters: &[Filter]) -> StoreResult<usize> {
        (**self).update(table, values, filters)
    }

    fn delete(&self, table: Table, filters: &[Filter]) -> StoreResult<usize> {
        (**self).delete(table, filters)
    }
}

#[cfg(test)]
mod tests {
    use super::{Select, StoreError, Table};

    #[test]
    fn select_check_rejects_unknown_columns_and_embeds() {
        let bad_filter = Select::from(Table::People).filter("password", "x");
        assert!(matches!(
            bad_filter.check(),
            Err(StoreError::UnknownColumn { table: "people", .. })
        ));

        let bad_embed = Select::from(Table::People).embed(Table::GroupMembers);
        assert!(matches!(
            bad_embed.check(),
            Err(StoreError::InvalidEmbed { .. })
        ));

        let ok = Select::from(Table::Groups)
            .embed(Table::GroupMembers)
            .order_by("updated_at", true);
        assert!(ok.check().is_ok());
    }

    #[test]
    fn parent_keys_match_relation_tables() {
        assert_eq!(
            Table::GroupMembers.parent_key(Table::Groups),
            Some("group_id")
        );
        assert_eq!(
            Table::LocationAssignments.parent_key(Table::Locations),
            Some("location_id")
        );
        assert_eq!(Table::People.parent_key(Table::Groups), None);
    }
}
