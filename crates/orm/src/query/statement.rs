//! Statement Types - the structured form of a select statement
//!
//! Every table instance in a statement carries its own alias so the same
//! table can be joined more than once. Result columns are labelled
//! `alias.COLUMN`.

use std::fmt;

use crate::backends::DatabaseValue;

/// Table instance with its alias
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    pub table: String,
    pub alias: String,
}

impl TableRef {
    pub fn new(table: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            alias: alias.into(),
        }
    }

    pub fn column(&self, column: impl Into<String>) -> ColumnRef {
        ColumnRef::new(self.alias.clone(), column)
    }
}

/// Column of an aliased table instance
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnRef {
    pub alias: String,
    pub column: String,
}

impl ColumnRef {
    pub fn new(alias: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            column: column.into(),
        }
    }

    /// Label of this column in result rows
    pub fn label(&self) -> String {
        format!("{}.{}", self.alias, self.column)
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.alias, self.column)
    }
}

/// Join types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinType::Inner => write!(f, "INNER JOIN"),
            JoinType::Left => write!(f, "LEFT JOIN"),
        }
    }
}

/// Join clause; `on_conditions` pairs are (joined table column, existing column)
#[derive(Debug, Clone, PartialEq)]
pub struct JoinClause {
    pub join_type: JoinType,
    pub table: TableRef,
    pub on_conditions: Vec<(ColumnRef, ColumnRef)>,
}

/// Order by direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderDirection {
    #[default]
    Asc,
    Desc,
}

impl fmt::Display for OrderDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderDirection::Asc => write!(f, "ASC"),
            OrderDirection::Desc => write!(f, "DESC"),
        }
    }
}

/// Row filter
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Eq(ColumnRef, DatabaseValue),
    IsNull(ColumnRef),
    /// Tuple membership: `(c1, c2) IN ((v1, v2), ...)`; every tuple has one
    /// value per column
    In {
        columns: Vec<ColumnRef>,
        tuples: Vec<Vec<DatabaseValue>>,
    },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
}

impl Predicate {
    /// Conjunction that flattens nested `And`s
    pub fn and(self, other: Predicate) -> Predicate {
        match (self, other) {
            (Predicate::And(mut left), Predicate::And(right)) => {
                left.extend(right);
                Predicate::And(left)
            }
            (Predicate::And(mut left), right) => {
                left.push(right);
                Predicate::And(left)
            }
            (left, right) => Predicate::And(vec![left, right]),
        }
    }
}

/// Select statement handed to a [`StatementExecutor`](crate::backends::StatementExecutor)
#[derive(Debug, Clone, PartialEq)]
pub struct SelectStatement {
    pub columns: Vec<ColumnRef>,
    pub from: TableRef,
    pub joins: Vec<JoinClause>,
    pub predicate: Option<Predicate>,
    pub order_by: Vec<(ColumnRef, OrderDirection)>,
}

impl SelectStatement {
    pub fn new(from: TableRef) -> Self {
        Self {
            columns: Vec::new(),
            from,
            joins: Vec::new(),
            predicate: None,
            order_by: Vec::new(),
        }
    }

    /// Project every listed column of an aliased table, skipping duplicates
    pub fn project<'a, I>(&mut self, table: &TableRef, columns: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        for column in columns {
            let column = table.column(column);
            if !self.columns.contains(&column) {
                self.columns.push(column);
            }
        }
    }

    pub fn join(&mut self, join_type: JoinType, table: TableRef, on_conditions: Vec<(ColumnRef, ColumnRef)>) {
        self.joins.push(JoinClause {
            join_type,
            table,
            on_conditions,
        });
    }

    /// AND a predicate onto the existing one
    pub fn restrict(&mut self, predicate: Predicate) {
        self.predicate = Some(match self.predicate.take() {
            Some(existing) => existing.and(predicate),
            None => predicate,
        });
    }

    /// Copy of this statement with an extra predicate
    pub fn restricted(&self, predicate: Predicate) -> Self {
        let mut statement = self.clone();
        statement.restrict(predicate);
        statement
    }

    /// Tables referenced by FROM and JOIN clauses
    pub fn tables(&self) -> impl Iterator<Item = &TableRef> {
        std::iter::once(&self.from).chain(self.joins.iter().map(|join| &join.table))
    }
}
