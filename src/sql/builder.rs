//! Fluent, per-table query builder. Identifiers are quoted, values are always bound as parameters.

use super::connection::{Connection, Row};
use crate::error::AppError;
use crate::schema::{SqlType, TableSchema};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operator {
    Eq,
    NotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
    Like,
    NotLike,
    ILike,
}

impl Operator {
    pub fn as_sql(self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::NotEq => "<>",
            Operator::Lt => "<",
            Operator::Gt => ">",
            Operator::LtEq => "<=",
            Operator::GtEq => ">=",
            Operator::Like => "LIKE",
            Operator::NotLike => "NOT LIKE",
            Operator::ILike => "ILIKE",
        }
    }
}

impl FromStr for Operator {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_uppercase().as_str() {
            "=" | "EQ" => Operator::Eq,
            "!=" | "<>" | "NE" => Operator::NotEq,
            "<" | "LT" => Operator::Lt,
            ">" | "GT" => Operator::Gt,
            "<=" | "LTE" => Operator::LtEq,
            ">=" | "GTE" => Operator::GtEq,
            "LIKE" => Operator::Like,
            "NOT LIKE" => Operator::NotLike,
            "ILIKE" => Operator::ILike,
            other => return Err(AppError::BadRequest(format!("unsupported operator '{}'", other))),
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl FromStr for Direction {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(Direction::Asc),
            "desc" => Ok(Direction::Desc),
            other => Err(AppError::BadRequest(format!("invalid sort direction '{}'", other))),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Predicate {
    pub column: String,
    pub operator: Operator,
    pub value: Value,
}

/// Accumulated query intent for one table.
#[derive(Clone, Debug, Default)]
pub struct QueryPlan {
    pub table: String,
    pub predicates: Vec<Predicate>,
    pub order: Vec<(String, Direction)>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

/// Rendered statement: SQL text plus positional parameters (`$1`, `$2`, ...).
#[derive(Clone, Debug, PartialEq)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn push_param(&mut self, v: Value) -> usize {
        self.params.push(v);
        self.params.len()
    }
}

/// Quote identifier for PostgreSQL.
pub(crate) fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

fn plain_type_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ' ')
}

/// Cast target for a native type: plain names as-is, `schema.type` quoted per part.
/// Anything else binds uncast.
fn cast_type(native: &str) -> Option<String> {
    if plain_type_name(native) {
        return Some(native.to_string());
    }
    match native.split_once('.') {
        Some((schema, name)) if plain_type_name(schema) && plain_type_name(name) => {
            Some(format!("{}.{}", quoted(schema), quoted(name)))
        }
        _ => None,
    }
}

pub struct QueryBuilder {
    conn: Arc<dyn Connection>,
    schema: Option<Arc<TableSchema>>,
    plan: QueryPlan,
}

impl QueryBuilder {
    /// Builder over a bare table name: no placeholder casts, `SELECT *`, no generated key.
    pub fn new(conn: Arc<dyn Connection>, table: impl Into<String>) -> Self {
        QueryBuilder {
            conn,
            schema: None,
            plan: QueryPlan {
                table: table.into(),
                ..QueryPlan::default()
            },
        }
    }

    /// Builder that uses the table's metadata for casts, column lists and `RETURNING <pk>`.
    pub fn for_table(conn: Arc<dyn Connection>, schema: Arc<TableSchema>) -> Self {
        QueryBuilder {
            conn,
            plan: QueryPlan {
                table: schema.table_name.clone(),
                ..QueryPlan::default()
            },
            schema: Some(schema),
        }
    }

    pub fn filter(mut self, column: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        self.plan.predicates.push(Predicate {
            column: column.into(),
            operator,
            value: value.into(),
        });
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, direction: Direction) -> Self {
        self.plan.order.push((column.into(), direction));
        self
    }

    pub fn limit(mut self, n: u64) -> Self {
        self.plan.limit = Some(n);
        self
    }

    pub fn offset(mut self, n: u64) -> Self {
        self.plan.offset = Some(n);
        self
    }

    pub fn plan(&self) -> &QueryPlan {
        &self.plan
    }

    fn table_ref(&self) -> String {
        match self.schema.as_ref().and_then(|s| s.schema_name.as_deref()) {
            Some(schema) => format!("{}.{}", quoted(schema), quoted(&self.plan.table)),
            None => quoted(&self.plan.table),
        }
    }

    fn placeholder(&self, n: usize, column: &str) -> String {
        self.schema
            .as_ref()
            .and_then(|s| s.get(column))
            .and_then(|c| c.native_type.as_deref())
            .and_then(cast_type)
            .map(|t| format!("${}::{}", n, t))
            .unwrap_or_else(|| format!("${}", n))
    }

    /// Column expression for SELECT; numeric and unknown types come back as text.
    fn select_expr(&self, column: &str) -> String {
        let q = quoted(column);
        let Some(meta) = self.schema.as_ref().and_then(|s| s.get(column)) else {
            return q;
        };
        let as_text = match meta.sql_type {
            SqlType::Decimal => true,
            SqlType::Other => !matches!(meta.native_type.as_deref(), Some("uuid" | "json" | "jsonb") | None),
            _ => false,
        };
        if as_text {
            format!("{}::text AS {}", q, q)
        } else {
            q
        }
    }

    fn column_list(&self, columns: &[&str]) -> String {
        let all = columns.is_empty() || columns == ["*"];
        match (&self.schema, all) {
            (Some(schema), true) => schema
                .columns
                .iter()
                .map(|c| self.select_expr(&c.name))
                .collect::<Vec<_>>()
                .join(", "),
            (None, true) => "*".to_string(),
            (_, false) => columns
                .iter()
                .map(|c| self.select_expr(c))
                .collect::<Vec<_>>()
                .join(", "),
        }
    }

    fn where_clause(&self, q: &mut QueryBuf) -> String {
        if self.plan.predicates.is_empty() {
            return String::new();
        }
        let parts: Vec<String> = self
            .plan
            .predicates
            .iter()
            .map(|p| {
                let n = q.push_param(p.value.clone());
                format!(
                    "{} {} {}",
                    quoted(&p.column),
                    p.operator.as_sql(),
                    self.placeholder(n, &p.column)
                )
            })
            .collect();
        format!(" WHERE {}", parts.join(" AND "))
    }

    fn order_clause(&self) -> String {
        if self.plan.order.is_empty() {
            return String::new();
        }
        let parts: Vec<String> = self
            .plan
            .order
            .iter()
            .map(|(col, dir)| format!("{} {}", quoted(col), dir))
            .collect();
        format!(" ORDER BY {}", parts.join(", "))
    }

    /// OFFSET is only rendered together with LIMIT.
    fn limit_clause(&self) -> String {
        match (self.plan.limit, self.plan.offset) {
            (Some(l), Some(o)) => format!(" LIMIT {} OFFSET {}", l, o),
            (Some(l), None) => format!(" LIMIT {}", l),
            _ => String::new(),
        }
    }

    /// Row filter shared by UPDATE and DELETE. PostgreSQL has no ORDER BY/LIMIT there,
    /// so an ordered or limited plan narrows rows through a ctid subquery.
    fn mutation_filter(&self, q: &mut QueryBuf) -> String {
        let where_clause = self.where_clause(q);
        if self.plan.order.is_empty() && self.plan.limit.is_none() {
            return where_clause;
        }
        format!(
            " WHERE ctid IN (SELECT ctid FROM {}{}{}{})",
            self.table_ref(),
            where_clause,
            self.order_clause(),
            self.limit_clause()
        )
    }

    pub fn render_select(&self, columns: &[&str]) -> QueryBuf {
        let mut q = QueryBuf::new();
        let where_clause = self.where_clause(&mut q);
        q.sql = format!(
            "SELECT {} FROM {}{}{}{}",
            self.column_list(columns),
            self.table_ref(),
            where_clause,
            self.order_clause(),
            self.limit_clause()
        );
        q
    }

    /// INSERT with columns in the map's insertion order. Returns the primary key when known.
    pub fn render_insert(&self, data: &Map<String, Value>) -> QueryBuf {
        let mut q = QueryBuf::new();
        let returning = self
            .schema
            .as_ref()
            .and_then(|s| s.primary_key.as_deref())
            .map(|pk| format!(" RETURNING {}", self.select_expr(pk)))
            .unwrap_or_default();
        if data.is_empty() {
            q.sql = format!("INSERT INTO {} DEFAULT VALUES{}", self.table_ref(), returning);
            return q;
        }
        let mut cols = Vec::with_capacity(data.len());
        let mut placeholders = Vec::with_capacity(data.len());
        for (k, v) in data {
            let n = q.push_param(v.clone());
            cols.push(quoted(k));
            placeholders.push(self.placeholder(n, k));
        }
        q.sql = format!(
            "INSERT INTO {} ({}) VALUES ({}){}",
            self.table_ref(),
            cols.join(", "),
            placeholders.join(", "),
            returning
        );
        q
    }

    /// SET parameters are numbered before WHERE parameters.
    pub fn render_update(&self, data: &Map<String, Value>) -> Result<QueryBuf, AppError> {
        if data.is_empty() {
            return Err(AppError::BadRequest("no columns to update".into()));
        }
        let mut q = QueryBuf::new();
        let sets: Vec<String> = data
            .iter()
            .map(|(k, v)| {
                let n = q.push_param(v.clone());
                format!("{} = {}", quoted(k), self.placeholder(n, k))
            })
            .collect();
        let filter = self.mutation_filter(&mut q);
        q.sql = format!("UPDATE {} SET {}{}", self.table_ref(), sets.join(", "), filter);
        Ok(q)
    }

    pub fn render_delete(&self) -> QueryBuf {
        let mut q = QueryBuf::new();
        let filter = self.mutation_filter(&mut q);
        q.sql = format!("DELETE FROM {}{}", self.table_ref(), filter);
        q
    }

    pub async fn select(&self, columns: &[&str]) -> Result<Vec<Row>, AppError> {
        let q = self.render_select(columns);
        tracing::debug!(sql = %q.sql, params = ?q.params, "select");
        Ok(self.conn.fetch_all(&q).await?)
    }

    /// Insert one row and return the generated primary key, or `Null` when the table has none.
    pub async fn insert(&self, data: &Map<String, Value>) -> Result<Value, AppError> {
        let q = self.render_insert(data);
        tracing::debug!(sql = %q.sql, params = ?q.params, "insert");
        let pk = self.schema.as_ref().and_then(|s| s.primary_key.clone());
        match pk {
            Some(pk) => {
                let rows = self.conn.fetch_all(&q).await?;
                Ok(rows
                    .into_iter()
                    .next()
                    .and_then(|mut row| row.remove(&pk))
                    .unwrap_or(Value::Null))
            }
            None => {
                self.conn.execute(&q).await?;
                Ok(Value::Null)
            }
        }
    }

    /// Returns the affected-row count; zero is not an error.
    pub async fn update(&self, data: &Map<String, Value>) -> Result<u64, AppError> {
        let q = self.render_update(data)?;
        tracing::debug!(sql = %q.sql, params = ?q.params, "update");
        Ok(self.conn.execute(&q).await?)
    }

    pub async fn delete(&self) -> Result<u64, AppError> {
        let q = self.render_delete();
        tracing::debug!(sql = %q.sql, params = ?q.params, "delete");
        Ok(self.conn.execute(&q).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::QueryExecutionError;
    use crate::schema::ColumnMeta;
    use async_trait::async_trait;
    use serde_json::json;

    struct NoConnection;

    #[async_trait]
    impl Connection for NoConnection {
        async fn fetch_all(&self, _q: &QueryBuf) -> Result<Vec<Row>, QueryExecutionError> {
            Ok(Vec::new())
        }

        async fn execute(&self, _q: &QueryBuf) -> Result<u64, QueryExecutionError> {
            Ok(0)
        }
    }

    fn conn() -> Arc<dyn Connection> {
        Arc::new(NoConnection)
    }

    fn users() -> Arc<TableSchema> {
        Arc::new(
            TableSchema::new("users")
                .with_primary_key("id")
                .column(
                    ColumnMeta::new("id", SqlType::Int)
                        .not_null()
                        .with_default("nextval('users_id_seq')")
                        .with_native_type("int4"),
                )
                .column(ColumnMeta::new("name", SqlType::Varchar).not_null().with_native_type("varchar"))
                .column(ColumnMeta::new("balance", SqlType::Decimal).with_native_type("numeric")),
        )
    }

    #[test]
    fn select_binds_every_predicate_value() {
        let q = QueryBuilder::new(conn(), "users")
            .filter("name", Operator::Eq, "x' OR '1'='1")
            .filter("age", Operator::GtEq, 18)
            .render_select(&[]);
        assert_eq!(q.sql, "SELECT * FROM \"users\" WHERE \"name\" = $1 AND \"age\" >= $2");
        assert_eq!(q.params, vec![json!("x' OR '1'='1"), json!(18)]);
        assert!(!q.sql.contains("OR '1'"));
    }

    #[test]
    fn select_order_limit_offset() {
        let q = QueryBuilder::new(conn(), "users")
            .order_by("name", Direction::Asc)
            .order_by("id", Direction::Desc)
            .limit(10)
            .offset(20)
            .render_select(&["id", "name"]);
        assert_eq!(
            q.sql,
            "SELECT \"id\", \"name\" FROM \"users\" ORDER BY \"name\" ASC, \"id\" DESC LIMIT 10 OFFSET 20"
        );
        assert!(q.params.is_empty());
    }

    #[test]
    fn offset_without_limit_is_not_rendered() {
        let q = QueryBuilder::new(conn(), "users").offset(5).render_select(&[]);
        assert_eq!(q.sql, "SELECT * FROM \"users\"");
    }

    #[test]
    fn schema_casts_placeholders_and_numeric_columns() {
        let q = QueryBuilder::for_table(conn(), users())
            .filter("id", Operator::Eq, 7)
            .render_select(&[]);
        assert_eq!(
            q.sql,
            "SELECT \"id\", \"name\", \"balance\"::text AS \"balance\" FROM \"users\" WHERE \"id\" = $1::int4"
        );
    }

    #[test]
    fn user_defined_types_cast_schema_qualified() {
        let tickets = Arc::new(
            TableSchema::new("tickets")
                .with_primary_key("id")
                .column(ColumnMeta::new("id", SqlType::Int).not_null().with_native_type("int4"))
                .column(ColumnMeta::new("mood", SqlType::Other).with_native_type("billing.mood"))
                .column(ColumnMeta::new("odd", SqlType::Other).with_native_type("a.b.c")),
        );
        let mut data = Map::new();
        data.insert("mood".into(), json!("happy"));
        data.insert("odd".into(), json!("x"));
        let q = QueryBuilder::for_table(conn(), tickets.clone())
            .filter("id", Operator::Eq, 1)
            .render_update(&data)
            .unwrap();
        assert_eq!(
            q.sql,
            "UPDATE \"tickets\" SET \"mood\" = $1::\"billing\".\"mood\", \"odd\" = $2 WHERE \"id\" = $3::int4"
        );

        let q = QueryBuilder::for_table(conn(), tickets).render_select(&["mood"]);
        assert_eq!(q.sql, "SELECT \"mood\"::text AS \"mood\" FROM \"tickets\"");
    }

    #[test]
    fn insert_keeps_key_order_and_returns_pk() {
        let mut data = Map::new();
        data.insert("name".into(), json!("A"));
        data.insert("balance".into(), json!("1.50"));
        let q = QueryBuilder::for_table(conn(), users()).render_insert(&data);
        assert_eq!(
            q.sql,
            "INSERT INTO \"users\" (\"name\", \"balance\") VALUES ($1::varchar, $2::numeric) RETURNING \"id\""
        );
        assert_eq!(q.params, vec![json!("A"), json!("1.50")]);
    }

    #[test]
    fn insert_empty_uses_default_values() {
        let q = QueryBuilder::new(conn(), "events").render_insert(&Map::new());
        assert_eq!(q.sql, "INSERT INTO \"events\" DEFAULT VALUES");
    }

    #[test]
    fn update_numbers_set_params_before_where() {
        let mut data = Map::new();
        data.insert("name".into(), json!("B"));
        let q = QueryBuilder::new(conn(), "users")
            .filter("id", Operator::Eq, 3)
            .render_update(&data)
            .unwrap();
        assert_eq!(q.sql, "UPDATE \"users\" SET \"name\" = $1 WHERE \"id\" = $2");
        assert_eq!(q.params, vec![json!("B"), json!(3)]);
    }

    #[test]
    fn update_without_columns_is_rejected() {
        let err = QueryBuilder::new(conn(), "users").render_update(&Map::new()).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn limited_delete_uses_ctid_subquery() {
        let q = QueryBuilder::new(conn(), "logs")
            .filter("level", Operator::Eq, "debug")
            .order_by("created_at", Direction::Asc)
            .limit(100)
            .render_delete();
        assert_eq!(
            q.sql,
            "DELETE FROM \"logs\" WHERE ctid IN (SELECT ctid FROM \"logs\" WHERE \"level\" = $1 ORDER BY \"created_at\" ASC LIMIT 100)"
        );
    }

    #[test]
    fn identifiers_are_quoted() {
        let q = QueryBuilder::new(conn(), "users")
            .filter("na\"me", Operator::Like, "%a%")
            .render_delete();
        assert_eq!(q.sql, "DELETE FROM \"users\" WHERE \"na\"\"me\" LIKE $1");
    }

    #[test]
    fn builder_is_not_reset_between_renders() {
        let b = QueryBuilder::new(conn(), "users").filter("id", Operator::Eq, 1);
        let first = b.render_select(&[]);
        let second = b.render_delete();
        assert_eq!(first.params, second.params);
        assert_eq!(b.plan().predicates.len(), 1);
    }

    #[test]
    fn operators_parse_from_strings() {
        assert_eq!("!=".parse::<Operator>().unwrap(), Operator::NotEq);
        assert_eq!("like".parse::<Operator>().unwrap(), Operator::Like);
        assert!("; DROP".parse::<Operator>().is_err());
        assert_eq!("DESC".parse::<Direction>().unwrap(), Direction::Desc);
    }

    #[tokio::test]
    async fn zero_affected_rows_is_ok() {
        let affected = QueryBuilder::new(conn(), "users")
            .filter("id", Operator::Eq, 99)
            .delete()
            .await
            .unwrap();
        assert_eq!(affected, 0);
    }
}
