//! Outgoing statements and commands
//!
//! A [`Command`] is what the persistence layer is about to send to the store:
//! one or more SQL statements executed together. Each statement carries its
//! SQL text and parameters, which is all an interceptor inspects, plus the
//! structured write the reference store applies.

use std::fmt;

use serde_json::Value;

use crate::audit::HistoryRow;
use crate::models::{EntityKey, EntitySchema, Record};

/// How the persistence layer executes a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionKind {
    /// No result set (most updates and deletes)
    NonQuery,
    /// Single value result
    Scalar,
    /// Result set (inserts reading back generated values)
    Reader,
}

impl fmt::Display for ExecutionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionKind::NonQuery => write!(f, "non-query"),
            ExecutionKind::Scalar => write!(f, "scalar"),
            ExecutionKind::Reader => write!(f, "reader"),
        }
    }
}

/// Named statement parameter
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub value: Value,
}

impl Parameter {
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// Structured effect of a statement on the store
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    Insert { key: EntityKey, values: Record },
    Update { key: EntityKey, values: Record },
    Delete { key: EntityKey },
    AppendHistory(HistoryRow),
}

/// One SQL statement
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub parameters: Vec<Parameter>,
    pub write: Option<WriteOp>,
}

impl Statement {
    /// `INSERT INTO [set]([a],[b]) VALUES (@p0,@p1);`
    pub fn insert(schema: &EntitySchema, values: Record) -> Self {
        let fields: Vec<&String> = schema.fields.iter().filter(|f| values.contains_key(*f)).collect();
        let parameters: Vec<Parameter> = fields
            .iter()
            .enumerate()
            .map(|(i, f)| Parameter::new(format!("@p{}", i), values[f.as_str()].clone()))
            .collect();

        let sql = format!(
            "INSERT INTO [{}]({}) VALUES ({});",
            schema.entity_set,
            fields
                .iter()
                .map(|f| format!("[{}]", f))
                .collect::<Vec<_>>()
                .join(","),
            parameters
                .iter()
                .map(|p| p.name.as_str())
                .collect::<Vec<_>>()
                .join(",")
        );

        Self {
            sql,
            parameters,
            write: Some(WriteOp::Insert {
                key: schema.key_from(&values),
                values,
            }),
        }
    }

    /// `UPDATE [set] SET [a] = @p0 WHERE [id] = @p1;`
    pub fn update(schema: &EntitySchema, key: EntityKey, values: Record) -> Self {
        let mut parameters = Vec::new();
        let assignments: Vec<String> = schema
            .fields
            .iter()
            .filter(|f| !schema.is_key(f) && values.contains_key(*f))
            .map(|f| {
                let name = format!("@p{}", parameters.len());
                parameters.push(Parameter::new(name.as_str(), values[f.as_str()].clone()));
                format!("[{}] = {}", f, name)
            })
            .collect();
        let predicate = where_clause(&key, &mut parameters);

        Self {
            sql: format!(
                "UPDATE [{}] SET {} WHERE {};",
                schema.entity_set,
                assignments.join(", "),
                predicate
            ),
            parameters,
            write: Some(WriteOp::Update { key, values }),
        }
    }

    /// `DELETE FROM [set] WHERE [id] = @p0;`
    pub fn delete(schema: &EntitySchema, key: EntityKey) -> Self {
        let mut parameters = Vec::new();
        let predicate = where_clause(&key, &mut parameters);

        Self {
            sql: format!("DELETE FROM [{}] WHERE {};", schema.entity_set, predicate),
            parameters,
            write: Some(WriteOp::Delete { key }),
        }
    }
}

fn where_clause(key: &EntityKey, parameters: &mut Vec<Parameter>) -> String {
    key.members
        .iter()
        .map(|(field, value)| {
            let name = format!("@p{}", parameters.len());
            parameters.push(Parameter::new(name.as_str(), value.clone()));
            format!("[{}] = {}", field, name)
        })
        .collect::<Vec<_>>()
        .join(" AND ")
}

/// A batch of statements sent to the store in one round trip
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub execution: ExecutionKind,
    statements: Vec<Statement>,
}

impl Command {
    pub fn new(execution: ExecutionKind, statement: Statement) -> Self {
        Self {
            execution,
            statements: vec![statement],
        }
    }

    /// Full command text as sent to the store
    pub fn text(&self) -> String {
        self.statements
            .iter()
            .map(|s| s.sql.as_str())
            .collect::<Vec<_>>()
            .join("")
    }

    /// Whether the command starts with INSERT, UPDATE or DELETE
    pub fn is_data_mutating(&self) -> bool {
        let text = self.text();
        let head = text.trim_start();
        ["INSERT", "UPDATE", "DELETE"].iter().any(|verb| {
            head.get(..verb.len())
                .map(|prefix| prefix.eq_ignore_ascii_case(verb))
                .unwrap_or(false)
        })
    }

    /// Whether the command text mentions `table`
    pub fn targets_table(&self, table: &str) -> bool {
        self.text().contains(table)
    }

    /// Put a statement in front of the command's own statements
    pub fn prepend(&mut self, statement: Statement) {
        self.statements.insert(0, statement);
    }

    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    pub fn parameters(&self) -> impl Iterator<Item = &Parameter> {
        self.statements.iter().flat_map(|s| s.parameters.iter())
    }
}
