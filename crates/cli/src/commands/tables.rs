// `redline tables` — pipe-delimited table extraction.

use clap::Args;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use redline_common::protocol::methods;
use redline_common::types::TableView;

use crate::client::DaemonClient;
use crate::commands::block_on;
use crate::output::{self, OutputFormat};

#[derive(Debug, Args)]
pub struct TablesArgs {
    /// Handle to inspect.
    pub handle_id: Uuid,

    /// Force JSON output.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TablesResult {
    #[serde(default)]
    pub tables: Vec<TableView>,
}

pub fn run(args: TablesArgs) -> anyhow::Result<()> {
    let format = OutputFormat::detect(args.json);

    match block_on(call_tables(args.handle_id)) {
        Ok(result) => {
            output::print_output(format, &result, format_human)?;
            Ok(())
        }
        Err(e) => {
            output::print_anyhow_error(format, &e);
            Err(e)
        }
    }
}

async fn call_tables(handle_id: Uuid) -> anyhow::Result<TablesResult> {
    let client = DaemonClient::default();
    client.call(methods::GET_DOCUMENT_TABLES, json!({ "handle_id": handle_id })).await
}

fn format_human(result: &TablesResult) -> String {
    if result.tables.is_empty() {
        return "No tables found.".into();
    }

    let mut lines = Vec::new();
    for table in &result.tables {
        lines.push(format!(
            "Table at paragraph {} ({} row(s)):",
            table.paragraph_index,
            table.rows.len()
        ));
        for row in &table.rows {
            lines.push(format!("  | {} |", row.join(" | ")));
        }
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_result() -> TablesResult {
        TablesResult {
            tables: vec![TableView {
                paragraph_index: 3,
                rows: vec![
                    vec!["Quarter".into(), "Revenue".into()],
                    vec!["Q3".into(), "1.2M".into()],
                ],
            }],
        }
    }

    #[test]
    fn human_format_renders_rows() {
        let output = format_human(&sample_result());
        assert!(output.contains("Table at paragraph 3"));
        assert!(output.contains("2 row(s)"));
        assert!(output.contains("| Quarter | Revenue |"));
        assert!(output.contains("| Q3 | 1.2M |"));
    }

    #[test]
    fn human_format_no_tables() {
        let result = TablesResult { tables: vec![] };
        assert_eq!(format_human(&result), "No tables found.");
    }

    #[test]
    fn json_format_roundtrips() {
        let result = sample_result();
        let mut buf = Vec::new();
        output::write_output(&mut buf, OutputFormat::Json, &result, format_human).unwrap();
        let parsed: TablesResult = serde_json::from_slice(&buf).unwrap();
        assert_eq!(parsed.tables.len(), 1);
        assert_eq!(parsed.tables[0].rows[1][0], "Q3");
    }
}
