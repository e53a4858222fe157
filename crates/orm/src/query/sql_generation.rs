//! SQL generation for select statements
//!
//! Renders PostgreSQL-style SQL with `$n` placeholders. Used for diagnostics
//! and by the PostgreSQL executor.

use super::statement::*;
use crate::backends::DatabaseValue;

impl SelectStatement {
    /// Generate SQL with parameter placeholders and return parameters
    pub fn to_sql_with_params(&self) -> (String, Vec<DatabaseValue>) {
        let mut sql = String::new();
        let mut params = Vec::new();

        // SELECT clause
        sql.push_str("SELECT ");
        if self.columns.is_empty() {
            sql.push('*');
        } else {
            let columns: Vec<String> = self
                .columns
                .iter()
                .map(|column| format!("{} AS \"{}\"", column, column.label()))
                .collect();
            sql.push_str(&columns.join(", "));
        }

        // FROM clause
        sql.push_str(&format!(" FROM {} {}", self.from.table, self.from.alias));

        // JOIN clauses
        for join in &self.joins {
            sql.push_str(&format!(" {} {} {}", join.join_type, join.table.table, join.table.alias));
            if !join.on_conditions.is_empty() {
                let conditions: Vec<String> = join
                    .on_conditions
                    .iter()
                    .map(|(left, right)| format!("{} = {}", left, right))
                    .collect();
                sql.push_str(" ON ");
                sql.push_str(&conditions.join(" AND "));
            }
        }

        // WHERE clause
        if let Some(predicate) = &self.predicate {
            sql.push_str(" WHERE ");
            build_predicate(predicate, &mut sql, &mut params);
        }

        // ORDER BY clause
        if !self.order_by.is_empty() {
            let orderings: Vec<String> = self
                .order_by
                .iter()
                .map(|(column, direction)| format!("{} {}", column, direction))
                .collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&orderings.join(", "));
        }

        (sql, params)
    }

    /// SQL text only, for logging and error context
    pub fn to_sql(&self) -> String {
        self.to_sql_with_params().0
    }
}

fn placeholder(value: &DatabaseValue, params: &mut Vec<DatabaseValue>) -> String {
    params.push(value.clone());
    format!("${}", params.len())
}

fn build_predicate(predicate: &Predicate, sql: &mut String, params: &mut Vec<DatabaseValue>) {
    match predicate {
        Predicate::Eq(column, DatabaseValue::Null) | Predicate::IsNull(column) => {
            sql.push_str(&format!("{} IS NULL", column));
        }
        Predicate::Eq(column, value) => {
            let slot = placeholder(value, params);
            sql.push_str(&format!("{} = {}", column, slot));
        }
        Predicate::In { columns, tuples } => {
            if tuples.is_empty() {
                // Nothing can match an empty list
                sql.push_str("1 = 0");
                return;
            }

            let single = columns.len() == 1;
            if single {
                sql.push_str(&columns[0].to_string());
            } else {
                let names: Vec<String> = columns.iter().map(ToString::to_string).collect();
                sql.push_str(&format!("({})", names.join(", ")));
            }

            sql.push_str(" IN (");
            for (i, tuple) in tuples.iter().enumerate() {
                if i > 0 {
                    sql.push_str(", ");
                }
                let slots: Vec<String> = tuple.iter().map(|value| placeholder(value, params)).collect();
                if single {
                    sql.push_str(&slots.join(", "));
                } else {
                    sql.push_str(&format!("({})", slots.join(", ")));
                }
            }
            sql.push(')');
        }
        Predicate::And(parts) | Predicate::Or(parts) => {
            let joiner = if matches!(predicate, Predicate::And(_)) { " AND " } else { " OR " };
            if parts.is_empty() {
                sql.push_str(if matches!(predicate, Predicate::And(_)) { "1 = 1" } else { "1 = 0" });
                return;
            }
            sql.push('(');
            for (i, part) in parts.iter().enumerate() {
                if i > 0 {
                    sql.push_str(joiner);
                }
                build_predicate(part, sql, params);
            }
            sql.push(')');
        }
    }
}
