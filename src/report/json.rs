use super::types::RunReport;
use anyhow::Result;
use std::path::Path;

/// Generate JSON report
pub fn generate(report: &RunReport, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;

    if let Some(path) = output {
        std::fs::write(path, json)?;
        println!("JSON report saved to: {}", path.display());
    } else {
        println!("{}", json);
    }

    Ok(())
}

/// Load a report previously written by a run
pub fn load(path: &Path) -> Result<RunReport> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
    let report = serde_json::from_str(&content)
        .map_err(|e| anyhow::anyhow!("{} is not a results file: {}", path.display(), e))?;
    Ok(report)
}

/// Write `results.json` into a directory
pub fn write_report(report: &RunReport, output_dir: &Path) -> Result<()> {
    let path = output_dir.join("results.json");
    std::fs::write(&path, serde_json::to_string_pretty(report)?)?;
    println!("    Generated JSON report: {}", path.display());
    Ok(())
}
