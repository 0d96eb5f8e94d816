//! Scripted collaborator fakes for strategy tests

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, bail, Result};

use sweep_core::{CommandError, CommandRunner};

use crate::engine::QueryEngine;

/// `CommandRunner` returning canned output per command line
#[derive(Default)]
pub struct ScriptedRunner {
    outputs: HashMap<String, Vec<String>>,
    failures: HashMap<String, String>,
    calls: RefCell<Vec<String>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_output(mut self, command: &str, lines: &[&str]) -> Self {
        self.outputs.insert(
            command.to_string(),
            lines.iter().map(|line| line.to_string()).collect(),
        );
        self
    }

    pub fn with_failure(mut self, command: &str, detail: &str) -> Self {
        self.failures
            .insert(command.to_string(), detail.to_string());
        self
    }

    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Every command line seen, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, command: &str) -> Result<Vec<String>, CommandError> {
        self.calls.borrow_mut().push(command.to_string());

        if let Some(detail) = self.failures.get(command) {
            return Err(CommandError {
                command: command.to_string(),
                status: "exit status: 1".to_string(),
                detail: detail.clone(),
            });
        }

        // Unscripted commands (typically removals) succeed silently
        Ok(self.outputs.get(command).cloned().unwrap_or_default())
    }
}

/// `QueryEngine` with canned tables and partitions, recording DDL
#[derive(Default)]
pub struct ScriptedEngine {
    tables: Vec<String>,
    partitions: HashMap<String, Vec<String>>,
    list_tables_failure: Option<String>,
    ddl: RefCell<Vec<String>>,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tables(mut self, names: &[&str]) -> Self {
        self.tables = names.iter().map(|name| name.to_string()).collect();
        self
    }

    pub fn with_partitions(mut self, table: &str, partitions: &[&str]) -> Self {
        self.partitions.insert(
            table.to_string(),
            partitions.iter().map(|p| p.to_string()).collect(),
        );
        self
    }

    pub fn with_list_tables_failure(mut self, detail: &str) -> Self {
        self.list_tables_failure = Some(detail.to_string());
        self
    }

    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Every DDL statement executed, in order
    pub fn ddl(&self) -> Vec<String> {
        self.ddl.borrow().clone()
    }
}

impl QueryEngine for ScriptedEngine {
    fn list_tables(&self, _database: &str) -> Result<Vec<String>> {
        if let Some(detail) = &self.list_tables_failure {
            bail!("{}", detail);
        }
        Ok(self.tables.clone())
    }

    fn list_partitions(&self, database: &str, table: &str) -> Result<Vec<String>> {
        self.partitions
            .get(table)
            .cloned()
            .ok_or_else(|| anyhow!("table {}.{} is not partitioned", database, table))
    }

    fn execute_ddl(&self, statement: &str) -> Result<()> {
        self.ddl.borrow_mut().push(statement.to_string());
        Ok(())
    }
}
