use crate::storage::StoredArtifact;
use crate::ui::human_bytes;
use tabled::{settings::Style, Table, Tabled};

#[derive(Tabled)]
pub struct TableRow {
    #[tabled(rename = "Metric")]
    pub metric: String,
    #[tabled(rename = "Value")]
    pub value: String,
}

#[derive(Tabled)]
struct ArtifactRow {
    #[tabled(rename = "Id")]
    id: i64,
    #[tabled(rename = "Path")]
    path: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Size")]
    size: String,
    #[tabled(rename = "Range")]
    range: String,
    #[tabled(rename = "Source")]
    source: String,
}

#[derive(Default)]
pub struct TableBuilder {
    rows: Vec<TableRow>,
}

impl TableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_row(&mut self, label: &str, value: &str) {
        self.rows.push(TableRow {
            metric: label.to_string(),
            value: value.to_string(),
        });
    }

    pub fn build(&self) -> String {
        if self.rows.is_empty() {
            return String::new();
        }

        Table::new(&self.rows).with(Style::rounded()).to_string()
    }
}

pub fn stats_table(stats: &[(&str, &str)]) -> String {
    let mut builder = TableBuilder::new();
    for (label, value) in stats {
        builder.add_row(label, value);
    }
    builder.build()
}

/// Artifact listing for `treedoc artifacts`
pub fn artifact_table(artifacts: &[StoredArtifact]) -> String {
    if artifacts.is_empty() {
        return String::new();
    }

    let rows = artifacts.iter().map(|a| ArtifactRow {
        id: a.id,
        path: a.path.to_string(),
        kind: a.kind.to_string(),
        size: human_bytes(a.size),
        range: a.source_range.map(|r| r.to_string()).unwrap_or_else(|| "-".to_string()),
        source: a.source.clone().unwrap_or_else(|| "-".to_string()),
    });
    Table::new(rows).with(Style::rounded()).to_string()
}
