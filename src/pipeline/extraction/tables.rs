use std::collections::{BTreeMap, BTreeSet};

/// One table row keyed by column header.
pub type TableRow = BTreeMap<String, String>;

/// A table as OCR returns it: header-keyed rows, possibly a fragment of a
/// table that continues on the next page.
pub type Table = Vec<TableRow>;

/// Tables found on one page.
#[derive(Debug, Clone)]
pub struct PageTables {
    pub page_number: usize,
    pub tables: Vec<Table>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StitchResult {
    pub tables: Vec<Table>,
    pub merges: usize,
}

/// Rejoins tables split across page breaks (amortization schedules, fee
/// tables). Consecutive tables with identical header sets are concatenated.
#[derive(Debug, Default)]
pub struct TableStitcher;

impl TableStitcher {
    pub fn new() -> Self {
        Self
    }

    pub fn stitch(&self, pages: &[PageTables]) -> StitchResult {
        let mut tables: Vec<Table> = Vec::new();
        let mut current: Option<Table> = None;
        let mut merges = 0;

        for page in pages {
            for table in &page.tables {
                current = match current.take() {
                    None => Some(table.clone()),
                    Some(mut open) if headers_match(&open, table) => {
                        open.extend(table.iter().cloned());
                        merges += 1;
                        tracing::debug!(page = page.page_number, "Merged continued table");
                        Some(open)
                    }
                    Some(open) => {
                        if !open.is_empty() {
                            tables.push(open);
                        }
                        Some(table.clone())
                    }
                };
            }
        }

        if let Some(open) = current {
            if !open.is_empty() {
                tables.push(open);
            }
        }

        tracing::info!(merges, tables = tables.len(), "Table stitching complete");
        StitchResult { tables, merges }
    }
}

fn headers(table: &Table) -> Option<BTreeSet<&str>> {
    table
        .first()
        .map(|row| row.keys().map(String::as_str).collect())
}

/// Two tables continue each other when both are non-empty and their first
/// rows carry the same column headers.
fn headers_match(a: &Table, b: &Table) -> bool {
    match (headers(a), headers(b)) {
        (Some(ha), Some(hb)) => ha == hb,
        _ => false,
    }
}
