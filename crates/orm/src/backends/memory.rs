//! In-memory statement executor
//!
//! Evaluates [`SelectStatement`]s against tables held in process: nested-loop
//! joins, predicate filtering, ordering and projection. Every statement is
//! logged in rendered form. Statements can be blocked as a whole, or made to
//! fail for chosen tables.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;

use super::core::{DatabaseValue, Row, StatementExecutor};
use crate::error::DatabaseError;
use crate::object::KeyValue;
use crate::query::{ColumnRef, JoinType, OrderDirection, Predicate, SelectStatement};

type Record = BTreeMap<String, DatabaseValue>;

#[derive(Debug, Default)]
struct MemoryTable {
    columns: Vec<String>,
    records: Vec<Record>,
}

#[derive(Debug, Default)]
struct Control {
    log: Vec<String>,
    blocked: bool,
    failing_tables: HashSet<String>,
}

/// In-process tables behind the [`StatementExecutor`] interface
#[derive(Debug, Default)]
pub struct MemoryDatabase {
    tables: RwLock<HashMap<String, MemoryTable>>,
    control: Mutex<Control>,
}

/// One candidate result row: a record (or NULL side of an outer join) per alias
type Binding<'a> = Vec<(&'a str, Option<&'a Record>)>;

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a table and its columns. Declaring it again adds new columns.
    pub fn create_table(&self, table: &str, columns: &[&str]) -> Result<(), DatabaseError> {
        let mut tables = self.tables.write().map_err(|_| poisoned())?;
        let entry = tables.entry(table.to_string()).or_default();
        for column in columns {
            if !entry.columns.iter().any(|existing| existing == column) {
                entry.columns.push(column.to_string());
            }
        }
        Ok(())
    }

    /// Insert one record; columns not given are NULL
    pub fn insert(&self, table: &str, columns: &[&str], values: Vec<DatabaseValue>) -> Result<(), DatabaseError> {
        if columns.len() != values.len() {
            return Err(DatabaseError::new(format!(
                "INSERT INTO {} has {} columns but {} values",
                table,
                columns.len(),
                values.len()
            )));
        }

        self.create_table(table, columns)?;
        let mut tables = self.tables.write().map_err(|_| poisoned())?;
        let entry = tables.entry(table.to_string()).or_default();
        let record = columns
            .iter()
            .map(|column| column.to_string())
            .zip(values)
            .collect();
        entry.records.push(record);
        Ok(())
    }

    /// Number of records in a table
    pub fn table_len(&self, table: &str) -> usize {
        self.tables
            .read()
            .map(|tables| tables.get(table).map_or(0, |t| t.records.len()))
            .unwrap_or(0)
    }

    /// Rendered SQL of every statement received, in order
    pub fn statements(&self) -> Vec<String> {
        self.control.lock().map(|c| c.log.clone()).unwrap_or_default()
    }

    pub fn statement_count(&self) -> usize {
        self.control.lock().map(|c| c.log.len()).unwrap_or(0)
    }

    pub fn clear_log(&self) {
        if let Ok(mut control) = self.control.lock() {
            control.log.clear();
        }
    }

    /// Reject every statement until [`unblock_statements`](Self::unblock_statements)
    pub fn block_statements(&self) {
        if let Ok(mut control) = self.control.lock() {
            control.blocked = true;
        }
    }

    pub fn unblock_statements(&self) {
        if let Ok(mut control) = self.control.lock() {
            control.blocked = false;
        }
    }

    /// Fail every statement that reads `table`
    pub fn fail_on_table(&self, table: &str) {
        if let Ok(mut control) = self.control.lock() {
            control.failing_tables.insert(table.to_string());
        }
    }

    pub fn clear_failures(&self) {
        if let Ok(mut control) = self.control.lock() {
            control.failing_tables.clear();
        }
    }

    fn admit(&self, statement: &SelectStatement) -> Result<(), DatabaseError> {
        let mut control = self.control.lock().map_err(|_| poisoned())?;
        control.log.push(statement.to_sql());

        if control.blocked {
            return Err(DatabaseError::new("statements are blocked"));
        }

        if let Some(table) = statement
            .tables()
            .find(|table| control.failing_tables.contains(&table.table))
        {
            return Err(DatabaseError::new(format!(
                "injected failure reading table {}",
                table.table
            )));
        }

        Ok(())
    }

    fn execute(&self, statement: &SelectStatement) -> Result<Vec<Row>, DatabaseError> {
        let tables = self.tables.read().map_err(|_| poisoned())?;

        let mut aliases: HashMap<&str, &MemoryTable> = HashMap::new();
        for table_ref in statement.tables() {
            let table = tables.get(&table_ref.table).ok_or_else(|| {
                DatabaseError::new(format!("relation \"{}\" does not exist", table_ref.table))
            })?;
            if aliases.insert(table_ref.alias.as_str(), table).is_some() {
                return Err(DatabaseError::new(format!(
                    "table alias \"{}\" specified more than once",
                    table_ref.alias
                )));
            }
        }
        check_columns(statement, &aliases)?;

        let mut bindings: Vec<Binding<'_>> = aliases[statement.from.alias.as_str()]
            .records
            .iter()
            .map(|record| vec![(statement.from.alias.as_str(), Some(record))])
            .collect();

        for join in &statement.joins {
            let table = aliases[join.table.alias.as_str()];
            let alias = join.table.alias.as_str();
            let mut joined = Vec::new();

            for binding in bindings {
                let mut matched = false;
                for record in &table.records {
                    let mut candidate = binding.clone();
                    candidate.push((alias, Some(record)));
                    let on = join
                        .on_conditions
                        .iter()
                        .all(|(left, right)| values_equal(&lookup(&candidate, left), &lookup(&candidate, right)));
                    if on {
                        matched = true;
                        joined.push(candidate);
                    }
                }
                if !matched && join.join_type == JoinType::Left {
                    let mut candidate = binding;
                    candidate.push((alias, None));
                    joined.push(candidate);
                }
            }
            bindings = joined;
        }

        if let Some(predicate) = &statement.predicate {
            bindings.retain(|binding| evaluate(predicate, binding));
        }

        if !statement.order_by.is_empty() {
            bindings.sort_by(|a, b| {
                statement
                    .order_by
                    .iter()
                    .map(|(column, direction)| {
                        let ordering = sort_key(&lookup(a, column)).cmp(&sort_key(&lookup(b, column)));
                        match direction {
                            OrderDirection::Asc => ordering,
                            OrderDirection::Desc => ordering.reverse(),
                        }
                    })
                    .find(|ordering| *ordering != Ordering::Equal)
                    .unwrap_or(Ordering::Equal)
            });
        }

        let projection: Vec<ColumnRef> = if statement.columns.is_empty() {
            statement
                .tables()
                .flat_map(|table_ref| {
                    aliases[table_ref.alias.as_str()]
                        .columns
                        .iter()
                        .map(move |column| table_ref.column(column.as_str()))
                })
                .collect()
        } else {
            statement.columns.clone()
        };

        Ok(bindings
            .iter()
            .map(|binding| {
                projection
                    .iter()
                    .map(|column| (column.label(), lookup(binding, column)))
                    .collect()
            })
            .collect())
    }
}

#[async_trait]
impl StatementExecutor for MemoryDatabase {
    async fn fetch_all(&self, statement: &SelectStatement) -> Result<Vec<Row>, DatabaseError> {
        self.admit(statement)?;
        self.execute(statement)
    }
}

fn poisoned() -> DatabaseError {
    DatabaseError::new("memory database lock poisoned")
}

fn check_columns(statement: &SelectStatement, aliases: &HashMap<&str, &MemoryTable>) -> Result<(), DatabaseError> {
    let mut referenced: Vec<&ColumnRef> = statement.columns.iter().collect();
    for join in &statement.joins {
        for (left, right) in &join.on_conditions {
            referenced.push(left);
            referenced.push(right);
        }
    }
    referenced.extend(statement.order_by.iter().map(|(column, _)| column));
    if let Some(predicate) = &statement.predicate {
        predicate_columns(predicate, &mut referenced);
    }

    for column in referenced {
        let known = aliases
            .get(column.alias.as_str())
            .map_or(false, |table| table.columns.iter().any(|c| *c == column.column));
        if !known {
            return Err(DatabaseError::new(format!("column {} does not exist", column)));
        }
    }
    Ok(())
}

fn predicate_columns<'a>(predicate: &'a Predicate, out: &mut Vec<&'a ColumnRef>) {
    match predicate {
        Predicate::Eq(column, _) | Predicate::IsNull(column) => out.push(column),
        Predicate::In { columns, .. } => out.extend(columns.iter()),
        Predicate::And(parts) | Predicate::Or(parts) => {
            for part in parts {
                predicate_columns(part, out);
            }
        }
    }
}

fn lookup(binding: &Binding<'_>, column: &ColumnRef) -> DatabaseValue {
    binding
        .iter()
        .find(|(alias, _)| *alias == column.alias)
        .and_then(|(_, record)| *record)
        .and_then(|record| record.get(&column.column))
        .cloned()
        .unwrap_or(DatabaseValue::Null)
}

/// SQL equality: NULL equals nothing
fn values_equal(left: &DatabaseValue, right: &DatabaseValue) -> bool {
    match (KeyValue::from_value(left), KeyValue::from_value(right)) {
        (Some(left), Some(right)) => left == right,
        _ => false,
    }
}

/// NULLs sort first
fn sort_key(value: &DatabaseValue) -> Option<KeyValue> {
    KeyValue::from_value(value)
}

fn evaluate(predicate: &Predicate, binding: &Binding<'_>) -> bool {
    match predicate {
        Predicate::Eq(column, value) => values_equal(&lookup(binding, column), value),
        Predicate::IsNull(column) => lookup(binding, column).is_null(),
        Predicate::In { columns, tuples } => {
            let actual: Vec<DatabaseValue> = columns.iter().map(|column| lookup(binding, column)).collect();
            tuples.iter().any(|tuple| {
                tuple.len() == actual.len()
                    && actual.iter().zip(tuple).all(|(left, right)| values_equal(left, right))
            })
        }
        Predicate::And(parts) => parts.iter().all(|part| evaluate(part, binding)),
        Predicate::Or(parts) => parts.iter().any(|part| evaluate(part, binding)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::TableRef;

    fn database() -> MemoryDatabase {
        let db = MemoryDatabase::new();
        db.insert("BOX", &["ID", "BAG_ID", "NAME"], vec![1.into(), 1.into(), "big".into()]).unwrap();
        db.insert("BOX", &["ID", "BAG_ID", "NAME"], vec![2.into(), 1.into(), "small".into()]).unwrap();
        db.insert("BOX", &["ID", "BAG_ID", "NAME"], vec![3.into(), DatabaseValue::Null, "loose".into()]).unwrap();
        db.insert("BALL", &["ID", "BOX_ID"], vec![1.into(), 1.into()]).unwrap();
        db.insert("BALL", &["ID", "BOX_ID"], vec![2.into(), 1.into()]).unwrap();
        db.insert("BALL", &["ID", "BOX_ID"], vec![3.into(), 2.into()]).unwrap();
        db
    }

    fn box_with_balls(join_type: JoinType) -> SelectStatement {
        let boxes = TableRef::new("BOX", "t0");
        let balls = TableRef::new("BALL", "t1");
        let mut statement = SelectStatement::new(boxes.clone());
        statement.project(&boxes, ["ID", "NAME"]);
        statement.project(&balls, ["ID"]);
        statement.join(join_type, balls.clone(), vec![(balls.column("BOX_ID"), boxes.column("ID"))]);
        statement.order_by.push((boxes.column("ID"), OrderDirection::Asc));
        statement
    }

    #[tokio::test]
    async fn test_left_join_keeps_unmatched_rows() {
        let db = database();
        let rows = db.fetch_all(&box_with_balls(JoinType::Left)).await.unwrap();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[3].get("t0.NAME"), Some(&DatabaseValue::from("loose")));
        assert_eq!(rows[3].get("t1.ID"), Some(&DatabaseValue::Null));

        let rows = db.fetch_all(&box_with_balls(JoinType::Inner)).await.unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(db.statement_count(), 2);
    }

    #[tokio::test]
    async fn test_predicates_filter_rows() {
        let db = database();
        let boxes = TableRef::new("BOX", "t0");
        let mut statement = SelectStatement::new(boxes.clone());
        statement.project(&boxes, ["ID"]);
        statement.restrict(Predicate::In {
            columns: vec![boxes.column("BAG_ID")],
            tuples: vec![vec![DatabaseValue::Int64(1)]],
        });
        statement.order_by.push((boxes.column("ID"), OrderDirection::Desc));

        let rows = db.fetch_all(&statement).await.unwrap();
        let ids: Vec<_> = rows.iter().filter_map(|row| row.get("t0.ID").and_then(DatabaseValue::as_i64)).collect();
        assert_eq!(ids, vec![2, 1]);

        let null_bag = SelectStatement::new(boxes.clone()).restricted(Predicate::IsNull(boxes.column("BAG_ID")));
        let rows = db.fetch_all(&null_bag).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].len(), 3);
    }

    #[tokio::test]
    async fn test_unknown_columns_and_tables_fail() {
        let db = database();
        let boxes = TableRef::new("BOX", "t0");
        let mut statement = SelectStatement::new(boxes.clone());
        statement.project(&boxes, ["COLOR"]);
        assert!(db.fetch_all(&statement).await.is_err());

        let missing = SelectStatement::new(TableRef::new("CRATE", "t0"));
        let err = db.fetch_all(&missing).await.unwrap_err();
        assert!(err.message().contains("CRATE"));
    }

    #[tokio::test]
    async fn test_blocking_and_injected_failures() {
        let db = database();
        let statement = box_with_balls(JoinType::Left);

        db.block_statements();
        assert!(db.fetch_all(&statement).await.is_err());
        db.unblock_statements();

        db.fail_on_table("BALL");
        let err = db.fetch_all(&statement).await.unwrap_err();
        assert!(err.message().contains("BALL"));
        db.clear_failures();

        assert!(db.fetch_all(&statement).await.is_ok());
        assert_eq!(db.statements().len(), 3);
        db.clear_log();
        assert_eq!(db.statement_count(), 0);
        assert_eq!(db.table_len("BALL"), 3);
    }
}
