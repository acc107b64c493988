//! SELECT builder.

use sable_core::{OrmError, Result, Row, Value};

use super::{CompiledStatement, quote_table, where_clause};
use crate::condition::{Conditions, validate_identifier};
use crate::database::Database;
use crate::dialect::quote_path;
use crate::schema::Entity;

/// Sort direction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Order {
    /// Ascending.
    #[default]
    Asc,
    /// Descending.
    Desc,
}

impl Order {
    fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// What a SELECT returns.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Projection {
    /// `*`.
    #[default]
    All,
    /// Listed fields.
    Fields(Vec<String>),
    /// `COUNT(*) AS total`.
    Count,
    /// `SUM(field) AS total`.
    Sum(String),
}

/// An immutable SELECT description.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SelectQuery {
    /// Tables in the FROM clause; more than one is an implicit join.
    pub tables: Vec<String>,
    /// Projection.
    pub projection: Projection,
    /// `SELECT DISTINCT`.
    pub distinct: bool,
    /// WHERE conditions.
    pub conditions: Option<Conditions>,
    /// GROUP BY fields.
    pub group_by: Vec<String>,
    /// ORDER BY fields.
    pub order_by: Vec<(String, Order)>,
    /// Raw `LIMIT start[,end]`.
    pub limit: Option<(u64, Option<u64>)>,
}

/// A page of results with the unpaged total.
#[derive(Clone, Debug, PartialEq)]
pub struct Paginated<T> {
    /// Rows on this page.
    pub items: Vec<T>,
    /// Matching rows across all pages.
    pub total: u64,
    /// 1-based page number requested.
    pub page: u64,
    /// Rows per page.
    pub page_size: u64,
}

impl<T> Paginated<T> {
    /// Number of pages needed for `total` rows.
    pub fn total_pages(&self) -> u64 {
        if self.page_size == 0 {
            0
        } else {
            self.total.div_ceil(self.page_size)
        }
    }
}

/// Compile a SELECT.
///
/// Clause order: `SELECT [DISTINCT] ... FROM ... WHERE ... GROUP BY ...
/// ORDER BY ... LIMIT ...;`
pub fn compile_select(query: &SelectQuery) -> Result<CompiledStatement> {
    if query.tables.is_empty() {
        return Err(OrmError::field("table", "select needs at least one table"));
    }
    let from = query
        .tables
        .iter()
        .map(|t| quote_table(t))
        .collect::<Result<Vec<_>>>()?
        .join(", ");

    let projection = match &query.projection {
        Projection::All => "*".to_string(),
        Projection::Fields(fields) if fields.is_empty() => "*".to_string(),
        Projection::Fields(fields) => fields
            .iter()
            .map(|f| render_field(f))
            .collect::<Result<Vec<_>>>()?
            .join(", "),
        Projection::Count => "COUNT(*) AS `total`".to_string(),
        Projection::Sum(field) => format!("SUM({}) AS `total`", render_field(field)?),
    };

    let (where_sql, binds) = where_clause(query.conditions.as_ref())?;
    let mut sql = format!(
        "SELECT {}{projection} FROM {from}{where_sql}",
        if query.distinct { "DISTINCT " } else { "" }
    );

    if !query.group_by.is_empty() {
        let fields = query
            .group_by
            .iter()
            .map(|f| validate_identifier(f).map(|()| quote_path(f)))
            .collect::<Result<Vec<_>>>()?;
        sql.push_str(" GROUP BY ");
        sql.push_str(&fields.join(", "));
    }
    if !query.order_by.is_empty() {
        let fields = query
            .order_by
            .iter()
            .map(|(f, o)| validate_identifier(f).map(|()| format!("{} {}", quote_path(f), o.as_sql())))
            .collect::<Result<Vec<_>>>()?;
        sql.push_str(" ORDER BY ");
        sql.push_str(&fields.join(", "));
    }
    match query.limit {
        Some((start, Some(end))) => sql.push_str(&format!(" LIMIT {start},{end}")),
        Some((start, None)) => sql.push_str(&format!(" LIMIT {start}")),
        None => {}
    }
    sql.push(';');

    Ok(CompiledStatement {
        sql,
        binds,
        tables: query.tables.clone(),
        readonly: true,
    })
}

fn render_field(field: &str) -> Result<String> {
    if field == "*" {
        return Ok("*".to_string());
    }
    validate_identifier(field)?;
    Ok(quote_path(field))
}

/// Fluent SELECT builder.
#[derive(Debug)]
pub struct Select<'a> {
    db: &'a Database,
    query: SelectQuery,
    page: Option<(u64, u64)>,
}

impl<'a> Select<'a> {
    /// Select from `table`.
    pub fn new(db: &'a Database, table: impl Into<String>) -> Self {
        Self {
            db,
            query: SelectQuery {
                tables: vec![table.into()],
                ..SelectQuery::default()
            },
            page: None,
        }
    }

    /// Add another table to the FROM clause.
    #[must_use]
    pub fn and_from(mut self, table: impl Into<String>) -> Self {
        self.query.tables.push(table.into());
        self
    }

    /// Restrict the projection to `fields`.
    #[must_use]
    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.query.projection = Projection::Fields(fields.into_iter().map(Into::into).collect());
        self
    }

    /// `SELECT DISTINCT`.
    #[must_use]
    pub fn distinct(mut self) -> Self {
        self.query.distinct = true;
        self
    }

    /// WHERE conditions.
    #[must_use]
    pub fn filter(mut self, conditions: Conditions) -> Self {
        self.query.conditions = Some(conditions);
        self
    }

    /// Append an ORDER BY field.
    #[must_use]
    pub fn order_by(mut self, field: impl Into<String>, order: Order) -> Self {
        self.query.order_by.push((field.into(), order));
        self
    }

    /// Append a GROUP BY field.
    #[must_use]
    pub fn group_by(mut self, field: impl Into<String>) -> Self {
        self.query.group_by.push(field.into());
        self
    }

    /// Raw `LIMIT start` or `LIMIT start,end`.
    #[must_use]
    pub fn limit(mut self, start: u64, end: Option<u64>) -> Self {
        self.query.limit = Some((start, end));
        self
    }

    /// Page `page` (1-based) of `size` rows. Replaces any raw limit.
    #[must_use]
    pub fn page(mut self, page: u64, size: u64) -> Self {
        let offset = page.saturating_sub(1).saturating_mul(size);
        self.query.limit = Some((offset, Some(size)));
        self.page = Some((page, size));
        self
    }

    /// The accumulated query.
    pub fn query(&self) -> &SelectQuery {
        &self.query
    }

    /// Compile without executing.
    pub fn compile(&self) -> Result<CompiledStatement> {
        compile_select(&self.query)
    }

    /// Execute and return raw rows.
    pub fn commit(self) -> Result<Vec<Row>> {
        let stmt = self.compile()?;
        Ok(self.db.run(&stmt)?.into_rows())
    }

    /// Execute and hydrate records.
    pub fn fetch<E: Entity>(self) -> Result<Vec<E>> {
        self.commit()?.iter().map(E::from_row).collect()
    }

    /// Count matching rows first, then fetch the requested page.
    pub fn commit_paginated(self) -> Result<Paginated<Row>> {
        let Some((page, page_size)) = self.page else {
            return Err(OrmError::field("page", "commit_paginated requires page()"));
        };
        let total = self.total()?;
        let items = self.commit()?;
        Ok(Paginated {
            items,
            total,
            page,
            page_size,
        })
    }

    /// [`Self::commit_paginated`] with hydrated records.
    pub fn fetch_paginated<E: Entity>(self) -> Result<Paginated<E>> {
        let paged = self.commit_paginated()?;
        let items = paged.items.iter().map(E::from_row).collect::<Result<Vec<_>>>()?;
        Ok(Paginated {
            items,
            total: paged.total,
            page: paged.page,
            page_size: paged.page_size,
        })
    }

    /// Number of matching rows (groups, when grouped).
    pub fn count(self) -> Result<u64> {
        let query = self.aggregate(Projection::Count);
        let rows = self.db.run(&compile_select(&query)?)?.into_rows();
        count_from_rows(&query, &rows)
    }

    /// Sum of `field` over matching rows; `0` when nothing matches.
    pub fn sum(self, field: impl Into<String>) -> Result<f64> {
        let query = self.aggregate(Projection::Sum(field.into()));
        let rows = self.db.run(&compile_select(&query)?)?.into_rows();
        match rows.first().and_then(|r| r.get("total")) {
            None | Some(Value::Null) => Ok(0.0),
            Some(_) => rows[0].get_f64("total"),
        }
    }

    fn aggregate(&self, projection: Projection) -> SelectQuery {
        aggregate_query(&self.query, projection)
    }

    /// Unpaged total for pagination, keeping WHERE and GROUP BY, executed uncached.
    fn total(&self) -> Result<u64> {
        let query = self.aggregate(Projection::Count);
        let stmt = compile_select(&query)?;
        let rows = self.db.execute(&stmt.sql, &stmt.binds, true)?.into_rows();
        count_from_rows(&query, &rows)
    }
}

/// `query` reprojected as an aggregate: no DISTINCT, ORDER BY or LIMIT.
fn aggregate_query(query: &SelectQuery, projection: Projection) -> SelectQuery {
    SelectQuery {
        projection,
        distinct: false,
        limit: None,
        order_by: Vec::new(),
        ..query.clone()
    }
}

fn count_from_rows(query: &SelectQuery, rows: &[Row]) -> Result<u64> {
    if !query.group_by.is_empty() {
        return Ok(rows.len() as u64);
    }
    match rows.first() {
        Some(row) => Ok(u64::try_from(row.get_i64("total")?).unwrap_or_default()),
        None => Ok(0),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
