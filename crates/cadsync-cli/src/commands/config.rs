use crate::cli::Cli;
use crate::output::OutputWriter;
use crate::output_types::ConfigRow;
use anyhow::Result;

/// Print every setting with the layer it came from
pub fn execute(cli: &Cli, output: &OutputWriter) -> Result<()> {
    let layered = crate::config::layered(cli)?;
    // Surface validation errors even when only inspecting
    layered.resolve()?;

    let mut entries: Vec<_> = layered.to_inspection_map().into_iter().collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    output.section("Configuration");
    output.table(
        entries
            .iter()
            .map(|(key, (value, source))| ConfigRow {
                key: key.clone(),
                value: value.clone(),
                source: format!("{:?}", source),
            })
            .collect(),
    );

    let data: serde_json::Map<String, serde_json::Value> = entries
        .into_iter()
        .map(|(key, (value, source))| {
            (key, serde_json::json!({ "value": value, "source": source }))
        })
        .collect();
    output.result(data)
}
