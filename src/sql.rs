use std::path::Path;

use crate::error::{AppError, Result};

/// Double single quotes for use inside a SQL string literal.
pub fn sql_escape(value: &str) -> String {
    value.replace('\'', "''")
}

pub fn sql_literal(value: &str) -> String {
    format!("'{}'", sql_escape(value))
}

/// A single `insert ... on conflict do update` statement written as a seed
/// file. Rows are emitted in sorted order so regenerating from the same
/// input is byte-identical.
#[derive(Debug, Clone)]
pub struct InsertStatement {
    table: String,
    columns: Vec<String>,
    conflict_key: String,
    rows: Vec<String>,
}

impl InsertStatement {
    pub fn new(table: &str, columns: &[&str], conflict_key: &str) -> Self {
        Self {
            table: table.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            conflict_key: conflict_key.to_string(),
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, values: &[&str]) -> Result<()> {
        if values.len() != self.columns.len() {
            return Err(anyhow::anyhow!(
                "{} expects {} values per row, got {}",
                self.table,
                self.columns.len(),
                values.len()
            )
            .into());
        }
        let literals: Vec<String> = values.iter().map(|v| sql_literal(v)).collect();
        self.rows.push(format!("  ({})", literals.join(", ")));
        Ok(())
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn render(&self, generator: &str) -> Result<String> {
        if self.rows.is_empty() {
            return Err(anyhow::anyhow!("no rows to write into {}", self.table).into());
        }

        let mut rows = self.rows.clone();
        rows.sort();

        // Every column but the key is refreshed on conflict.
        let assignments: Vec<String> = self
            .columns
            .iter()
            .filter(|c| **c != self.conflict_key)
            .map(|c| format!("{} = excluded.{}", c, c))
            .collect();

        Ok(format!(
            "-- THIS FILE IS GENERATED. Edit the `{}` seed generator instead of this file.\n\
             insert into {} (\n  {}\n) values\n{}\non conflict ({}) do update set\n  {};\n",
            generator,
            self.table,
            self.columns.join(",\n  "),
            rows.join(",\n"),
            self.conflict_key,
            assignments.join(",\n  ")
        ))
    }

    pub async fn write(&self, path: &Path, generator: &str) -> Result<()> {
        let sql = self.render(generator)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, sql).await.map_err(AppError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Reads a single-quoted SQL literal back into its value.
    fn parse_literal(literal: &str) -> Option<String> {
        let inner = literal.strip_prefix('\'')?.strip_suffix('\'')?;
        let mut value = String::new();
        let mut chars = inner.chars().peekable();
        while let Some(c) = chars.next() {
            if c == '\'' {
                if chars.next() != Some('\'') {
                    return None;
                }
            }
            value.push(c);
        }
        Some(value)
    }

    #[test]
    fn quotes_are_doubled_and_round_trip() {
        for value in ["Côte d'Ivoire", "''", "plain", "", "it's 'quoted'"] {
            let literal = sql_literal(value);
            assert_eq!(literal.matches('\'').count(), 2 + 2 * value.matches('\'').count());
            assert_eq!(parse_literal(&literal).as_deref(), Some(value));
        }
        assert_eq!(sql_escape("O'Brien"), "O''Brien");
    }

    #[test]
    fn renders_sorted_upsert() {
        let mut statement = InsertStatement::new("public.countries", &["iso2", "name"], "iso2");
        statement.push_row(&["US", "United States"]).unwrap();
        statement.push_row(&["CI", "Côte d'Ivoire"]).unwrap();

        let sql = statement.render("countries").unwrap();
        assert_eq!(
            sql,
            "-- THIS FILE IS GENERATED. Edit the `countries` seed generator instead of this file.\n\
             insert into public.countries (\n  iso2,\n  name\n) values\n\
             \x20 ('CI', 'Côte d''Ivoire'),\n\
             \x20 ('US', 'United States')\n\
             on conflict (iso2) do update set\n  name = excluded.name;\n"
        );
    }

    #[test]
    fn key_column_is_not_updated() {
        let mut statement = InsertStatement::new("t", &["a", "k", "b"], "k");
        statement.push_row(&["x", "1", "y"]).unwrap();
        assert!(statement
            .render("g")
            .unwrap()
            .ends_with("on conflict (k) do update set\n  a = excluded.a,\n  b = excluded.b;\n"));
    }

    #[test]
    fn rejects_bad_rows_and_empty_statements() {
        let mut statement = InsertStatement::new("t", &["k", "a"], "k");
        assert!(statement.push_row(&["only one"]).is_err());
        assert!(statement.render("g").is_err());
    }

    #[tokio::test]
    async fn write_is_byte_identical_across_runs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seeds").join("03_countries.sql");

        let mut first = InsertStatement::new("public.countries", &["iso2", "name"], "iso2");
        first.push_row(&["FR", "France"]).unwrap();
        first.push_row(&["DE", "Germany"]).unwrap();
        first.write(&path, "countries").await.unwrap();
        let before = std::fs::read(&path).unwrap();

        let mut second = InsertStatement::new("public.countries", &["iso2", "name"], "iso2");
        second.push_row(&["DE", "Germany"]).unwrap();
        second.push_row(&["FR", "France"]).unwrap();
        second.write(&path, "countries").await.unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), before);
    }
}
