use anyhow::Result;
use serde_json::json;
use sheetfeed::{ReceiveOptions, Spreadsheet};

fn main() -> Result<()> {
    // Example program that calls the library API.
    // Configure the worksheet and credentials via env vars or a `.sheetfeedrc` file.
    let mut sheet = Spreadsheet::from_env()?;

    let meta = sheet.metadata()?;
    eprintln!(
        "Worksheet: {} ({} x {})",
        meta.title,
        meta.row_count.unwrap_or_default(),
        meta.col_count.unwrap_or_default()
    );

    let get_values = std::env::args().any(|a| a == "--values");
    let (rows, info) = sheet.receive(&ReceiveOptions { get_values }, None)?;

    println!(
        "{}",
        serde_json::to_string_pretty(&json!({ "info": info, "rows": rows }))?
    );
    Ok(())
}
