use crate::path::TablePath;
use crate::sql;

/// Iceberg metadata tables exposed through Dremio's table functions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableMetadata {
    History,
    Snapshot,
    Files,
    Manifests,
    Partitions,
}

impl TableMetadata {
    pub fn function_name(self) -> &'static str {
        match self {
            TableMetadata::History => "table_history",
            TableMetadata::Snapshot => "table_snapshot",
            TableMetadata::Files => "table_files",
            TableMetadata::Manifests => "table_manifests",
            TableMetadata::Partitions => "table_partitions",
        }
    }

    /// The query selecting this metadata table for `path`
    pub fn sql(self, path: &TablePath) -> String {
        sql::table_function(self.function_name(), path)
    }
}
