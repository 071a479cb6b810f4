use anyhow::{Context, Result};
use serde::Deserialize;
use std::io::Read;

/// One row of the commune ↔ grid cell conversion table.
#[derive(Debug, Clone, Deserialize)]
pub struct ConversionRow {
    #[serde(rename = "LIBCOM")]
    pub commune: Option<String>,
    #[serde(rename = "Idcar_200m")]
    pub cell_id: Option<String>,
}

/// Mapping from commune name to the grid cells it contains, read from the
/// `bpe_carreaux.csv` lookup table. Rows may have missing values; they are
/// kept as-is and skipped per query, mirroring per-column dropna semantics.
#[derive(Debug, Clone, Default)]
pub struct ConversionTable {
    rows: Vec<ConversionRow>,
}

impl ConversionTable {
    pub fn from_rows(rows: Vec<ConversionRow>) -> Self {
        ConversionTable { rows }
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let mut rows = Vec::new();
        for record in csv_reader.deserialize() {
            let row: ConversionRow = record.context("Failed to parse conversion table row")?;
            rows.push(row);
        }
        Ok(ConversionTable { rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Distinct non-null commune names, in first-appearance order.
    pub fn communes(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for row in &self.rows {
            if let Some(commune) = &row.commune {
                if !commune.is_empty() && !seen.contains(commune) {
                    seen.push(commune.clone());
                }
            }
        }
        seen
    }

    /// Distinct non-null cell identifiers mapped to the given commune, in
    /// first-appearance order.
    pub fn cells_for(&self, commune: &str) -> Vec<String> {
        let mut seen = Vec::new();
        for row in &self.rows {
            if row.commune.as_deref() != Some(commune) {
                continue;
            }
            if let Some(cell_id) = &row.cell_id {
                if !cell_id.is_empty() && !seen.contains(cell_id) {
                    seen.push(cell_id.clone());
                }
            }
        }
        seen
    }
}
