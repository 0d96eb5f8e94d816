//! Query-engine collaborator for the warehouse backend

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use sweep_core::CommandRunner;

/// Metadata queries and DDL issuance against the table warehouse
///
/// The cleaner only reads metadata and issues drops; implementations
/// decide how statements actually reach the engine.
pub trait QueryEngine {
    /// All table names in a database
    fn list_tables(&self, database: &str) -> Result<Vec<String>>;

    /// Partition key strings of a table, in listing order
    ///
    /// Fails for non-partitioned tables; an empty list means the table is
    /// partitioned but holds no data.
    fn list_partitions(&self, database: &str, table: &str) -> Result<Vec<String>>;

    /// Execute one DDL statement
    fn execute_ddl(&self, statement: &str) -> Result<()>;
}

/// Engine that shells out, wrapping statements in a command template
///
/// `show tables`, `show partitions` and drops all go through the same
/// template (`hive -e` by default); a statement already carrying the
/// template is passed through untouched.
pub struct ShellQueryEngine {
    runner: Arc<dyn CommandRunner>,
    ddl_command: String,
}

impl ShellQueryEngine {
    pub fn new(runner: Arc<dyn CommandRunner>, ddl_command: impl Into<String>) -> Self {
        Self {
            runner,
            ddl_command: ddl_command.into(),
        }
    }

    fn run_statement(&self, statement: &str) -> Result<Vec<String>> {
        let command = if statement.contains(&self.ddl_command) {
            statement.to_string()
        } else {
            format!("{} \"{}\"", self.ddl_command, statement)
        };
        let lines = self.runner.run(&command)?;
        info!("statement `{}` succeeded", statement);
        Ok(lines)
    }
}

impl QueryEngine for ShellQueryEngine {
    fn list_tables(&self, database: &str) -> Result<Vec<String>> {
        self.run_statement(&format!("show tables in {}", database))
    }

    fn list_partitions(&self, database: &str, table: &str) -> Result<Vec<String>> {
        self.run_statement(&format!("show partitions {}.{}", database, table))
    }

    fn execute_ddl(&self, statement: &str) -> Result<()> {
        self.run_statement(statement).map(|_| ())
    }
}
