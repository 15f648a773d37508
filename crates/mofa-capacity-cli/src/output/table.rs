//! Table formatting for CLI output

use comfy_table::{ContentArrangement, Table as ComfyTable};

/// Table builder for CLI output
#[derive(Debug, Clone, Default)]
pub struct TableBuilder {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl TableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set table headers
    pub fn headers(mut self, headers: &[&str]) -> Self {
        self.headers = headers.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Add a row to the table
    pub fn add_row(mut self, row: Vec<String>) -> Self {
        self.rows.push(row);
        self
    }

    #[must_use]
    pub fn build(self) -> Table {
        let mut table = ComfyTable::new();
        table.set_header(&self.headers);
        for row in self.rows {
            table.add_row(row);
        }
        table
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_width(120);
        Table { inner: table }
    }
}

/// Table for CLI output
#[derive(Debug, Clone)]
pub struct Table {
    inner: ComfyTable,
}

impl Table {
    pub fn builder() -> TableBuilder {
        TableBuilder::new()
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_builder() {
        let table = Table::builder()
            .headers(&["Architecture", "Default encoding"])
            .add_row(vec!["LlamaForCausalLM".into(), "q4_k".into()])
            .build();

        let output = table.to_string();
        assert!(output.contains("Architecture"));
        assert!(output.contains("Default encoding"));
        assert!(output.contains("LlamaForCausalLM"));
        assert!(output.contains("q4_k"));
    }
}
