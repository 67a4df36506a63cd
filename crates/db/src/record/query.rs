//! Accumulated query state and its SQL rendering.
//!
//! [`QueryState`] is plain data. `Record` clones it on every chain call, so a
//! state value is never shared between two chains.

use sqlx::QueryBuilder;

use super::value::Value;
use crate::error::DbError;
use crate::Driver;

/// SQL text with `?` placeholders plus the values that fill them.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Fragment {
    pub sql: String,
    pub args: Vec<Value>,
}

impl Fragment {
    pub fn new(sql: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            args,
        }
    }

    /// Append to `qb`, binding one argument per `?`.
    ///
    /// A `?` inside a single-quoted literal is plain text, and `??` stands
    /// for a literal `?` (the PostgreSQL JSONB operator).
    pub fn push_to(&self, qb: &mut QueryBuilder<'static, Driver>) -> Result<(), DbError> {
        let pieces = split_placeholders(&self.sql);
        let placeholders = pieces.len() - 1;
        if placeholders != self.args.len() {
            return Err(DbError::InvalidQuery(format!(
                "`{}` has {placeholders} placeholder(s) but {} argument(s)",
                self.sql,
                self.args.len()
            )));
        }

        let mut args = self.args.iter().cloned();
        for (i, piece) in pieces.iter().enumerate() {
            if i > 0 {
                if let Some(arg) = args.next() {
                    arg.push_bind(qb);
                }
            }
            qb.push(piece);
        }
        Ok(())
    }
}

/// Cut `sql` at its bind placeholders. Always yields at least one piece.
fn split_placeholders(sql: &str) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::with_capacity(sql.len());
    let mut quoted = false;
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            // `''` inside a literal toggles twice, which keeps it quoted.
            '\'' => {
                quoted = !quoted;
                current.push(c);
            }
            '?' if !quoted && chars.peek() == Some(&'?') => {
                chars.next();
                current.push('?');
            }
            '?' if !quoted => pieces.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    pieces.push(current);
    pieces
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Conjunction {
    And,
    Or,
    Not,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Condition {
    pub conjunction: Conjunction,
    pub fragment: Fragment,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Join {
    pub kind: &'static str,
    pub fragment: Fragment,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct QueryState {
    pub conditions: Vec<Condition>,
    pub selects: Vec<String>,
    pub orders: Vec<String>,
    pub joins: Vec<Join>,
    pub groups: Vec<String>,
    pub havings: Vec<Fragment>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub preloads: Vec<String>,
    pub unscoped: bool,
}

/// What the SELECT list should be.
pub(crate) enum Projection<'a> {
    /// Chained `select` columns, or `table.*`.
    Rows,
    Count,
    Exists,
    Column(&'a str),
}

impl QueryState {
    pub fn has_conditions(&self) -> bool {
        !self.conditions.is_empty()
    }

    pub fn is_grouped(&self) -> bool {
        !self.groups.is_empty()
    }

    /// Render a full SELECT for `table`.
    pub fn select_sql(
        &self,
        table: &str,
        projection: Projection<'_>,
    ) -> Result<QueryBuilder<'static, Driver>, DbError> {
        let mut qb = QueryBuilder::new("");
        match projection {
            Projection::Count if self.is_grouped() => {
                qb.push("SELECT COUNT(*) FROM (");
                self.push_select_body(&mut qb, table, &Projection::Rows, false)?;
                qb.push(") AS grouped_rows");
            }
            Projection::Exists => {
                qb.push("SELECT EXISTS (");
                self.push_select_body(&mut qb, table, &Projection::Rows, true)?;
                qb.push(")");
            }
            ref other => self.push_select_body(&mut qb, table, other, true)?,
        }
        Ok(qb)
    }

    fn push_select_body(
        &self,
        qb: &mut QueryBuilder<'static, Driver>,
        table: &str,
        projection: &Projection<'_>,
        with_window: bool,
    ) -> Result<(), DbError> {
        qb.push("SELECT ");
        match projection {
            Projection::Count => {
                qb.push("COUNT(*)");
            }
            Projection::Column(column) => {
                qb.push(*column);
            }
            Projection::Rows | Projection::Exists => {
                if self.selects.is_empty() || self.selects.iter().any(|s| s == "*") {
                    qb.push(format!("{table}.*"));
                } else {
                    qb.push(self.selects.join(", "));
                }
            }
        }
        qb.push(" FROM ");
        qb.push(table);

        for join in &self.joins {
            qb.push(" ");
            qb.push(join.kind);
            qb.push(" ");
            join.fragment.push_to(qb)?;
        }

        self.push_where(qb, table)?;

        if !self.groups.is_empty() {
            qb.push(" GROUP BY ");
            qb.push(self.groups.join(", "));
        }
        for (i, having) in self.havings.iter().enumerate() {
            qb.push(if i == 0 { " HAVING (" } else { " AND (" });
            having.push_to(qb)?;
            qb.push(")");
        }

        // Counting ignores ordering and windowing.
        if with_window && !matches!(projection, Projection::Count) {
            if !self.orders.is_empty() {
                qb.push(" ORDER BY ");
                qb.push(self.orders.join(", "));
            }
            match (self.limit, self.offset) {
                (Some(limit), offset) => {
                    qb.push(" LIMIT ");
                    qb.push_bind(limit);
                    if let Some(offset) = offset {
                        qb.push(" OFFSET ");
                        qb.push_bind(offset);
                    }
                }
                (None, Some(offset)) => {
                    // SQLite requires a LIMIT before OFFSET.
                    qb.push(if cfg!(feature = "postgres") {
                        " OFFSET "
                    } else {
                        " LIMIT -1 OFFSET "
                    });
                    qb.push_bind(offset);
                }
                (None, None) => {}
            }
        }
        Ok(())
    }

    /// Append ` WHERE (...) AND table.deleted_at IS NULL`.
    ///
    /// Chained predicates are each parenthesised and joined in call order, so
    /// `filter(a).or(b).filter(c)` renders `((a) OR (b) AND (c))` with normal
    /// SQL precedence.
    pub fn push_where(
        &self,
        qb: &mut QueryBuilder<'static, Driver>,
        table: &str,
    ) -> Result<(), DbError> {
        if self.conditions.is_empty() && self.unscoped {
            return Ok(());
        }
        qb.push(" WHERE ");

        if !self.conditions.is_empty() {
            qb.push("(");
            for (i, condition) in self.conditions.iter().enumerate() {
                let joiner = match (i, condition.conjunction) {
                    (0, Conjunction::Not) => "NOT ",
                    (0, _) => "",
                    (_, Conjunction::And) => " AND ",
                    (_, Conjunction::Or) => " OR ",
                    (_, Conjunction::Not) => " AND NOT ",
                };
                qb.push(joiner);
                qb.push("(");
                condition.fragment.push_to(qb)?;
                qb.push(")");
            }
            qb.push(")");
            if !self.unscoped {
                qb.push(" AND ");
            }
        }

        if !self.unscoped {
            qb.push(format!("{table}.deleted_at IS NULL"));
        }
        Ok(())
    }
}
