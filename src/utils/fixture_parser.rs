//! Statement parser backed by a fixed table of payloads

use async_trait::async_trait;
use std::collections::HashMap;

use crate::traits::StatementParser;
use crate::types::*;

/// Parser returning pre-built statements for known byte payloads.
///
/// Any other input fails with [`LedgerError::Parse`], which makes it easy to
/// exercise corrupt-file paths.
#[derive(Debug, Clone, Default)]
pub struct FixtureParser {
    statements: HashMap<Vec<u8>, ParsedStatement>,
}

impl FixtureParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the statement produced for `data`
    pub fn with_statement(mut self, data: impl Into<Vec<u8>>, statement: ParsedStatement) -> Self {
        self.statements.insert(data.into(), statement);
        self
    }
}

#[async_trait]
impl StatementParser for FixtureParser {
    async fn parse(&self, data: &[u8], metadata: &StatementMetadata) -> LedgerResult<ParsedStatement> {
        let statement = self.statements.get(data).cloned().ok_or_else(|| {
            LedgerError::Parse(format!("Unrecognized statement file {}", metadata.file_name))
        })?;

        if let Some(expected) = metadata.bank_code {
            if expected != statement.bank_code {
                return Err(LedgerError::Parse(format!(
                    "{} is not a {} statement",
                    metadata.file_name, expected
                )));
            }
        }

        Ok(statement)
    }
}
