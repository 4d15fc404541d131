//! Row selection for the table gateway
//!
//! A [Query] renders to the query string understood by the REST gateway:
//! `?select=*&slug=eq.foo&order=date.desc&limit=10`.

use std::cmp::Ordering;

use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
enum Operator {
    Eq,
    Neq,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Filter {
    column: String,
    operator: Operator,
    value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Order {
    column: String,
    direction: Direction,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    filters: Vec<Filter>,
    order: Vec<Order>,
    limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(self, column: impl Into<String>, value: impl ToString) -> Self {
        self.filter(column, Operator::Eq, value)
    }

    pub fn neq(self, column: impl Into<String>, value: impl ToString) -> Self {
        self.filter(column, Operator::Neq, value)
    }

    fn filter(mut self, column: impl Into<String>, operator: Operator, value: impl ToString) -> Self {
        self.filters.push(Filter {
            column: column.into(),
            operator,
            value: value.to_string(),
        });
        self
    }

    /// Adds a sort key. Keys apply in the order they were added.
    pub fn order(mut self, column: impl Into<String>, direction: Direction) -> Self {
        self.order.push(Order {
            column: column.into(),
            direction,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Query string pairs for a `GET` on the table endpoint
    pub fn select_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![("select".to_owned(), "*".to_owned())];
        pairs.extend(self.filter_pairs());
        if !self.order.is_empty() {
            let order = self
                .order
                .iter()
                .map(|Order { column, direction }| format!("{column}.{direction}"))
                .collect::<Vec<_>>()
                .join(",");
            pairs.push(("order".to_owned(), order));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit".to_owned(), limit.to_string()));
        }
        pairs
    }

    /// Query string pairs restricting an update or a delete
    pub fn filter_pairs(&self) -> Vec<(String, String)> {
        self.filters
            .iter()
            .map(
                |Filter {
                     column,
                     operator,
                     value,
                 }| (column.clone(), format!("{operator}.{value}")),
            )
            .collect()
    }

    /// Whether a JSON row satisfies every filter of the query
    pub fn matches(&self, row: &Value) -> bool {
        self.filters.iter().all(
            |Filter {
                 column,
                 operator,
                 value,
             }| {
                let cell = row.get(column).map(cell_text);
                match operator {
                    Operator::Eq => cell.as_deref() == Some(value.as_str()),
                    Operator::Neq => cell.as_deref() != Some(value.as_str()),
                }
            },
        )
    }

    /// Filters, sorts and truncates a set of rows the way the gateway would
    pub fn apply(&self, rows: impl IntoIterator<Item = Value>) -> Vec<Value> {
        let mut rows: Vec<Value> = rows.into_iter().filter(|row| self.matches(row)).collect();
        rows.sort_by(|a, b| {
            self.order
                .iter()
                .map(|Order { column, direction }| {
                    let ordering = compare_cells(a.get(column), b.get(column));
                    match direction {
                        Direction::Asc => ordering,
                        Direction::Desc => ordering.reverse(),
                    }
                })
                .find(|ordering| ordering.is_ne())
                .unwrap_or(Ordering::Equal)
        });
        if let Some(limit) = self.limit {
            rows.truncate(limit);
        }
        rows
    }
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn compare_cells(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(a)), Some(Value::Number(b))) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::Bool(a)), Some(Value::Bool(b))) => a.cmp(b),
        // ISO dates and RFC 3339 timestamps sort lexicographically
        (a, b) => a
            .filter(|v| !v.is_null())
            .map(cell_text)
            .cmp(&b.filter(|v| !v.is_null()).map(cell_text)),
    }
}
