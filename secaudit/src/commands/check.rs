//! `secaudit check`

use anyhow::Result;
use secaudit_engine::report::{format_check, format_check_json};
use secaudit_engine::Auditor;

pub fn cmd_check(auditor: &Auditor, process: Option<&str>, port: Option<u16>, format: &str) -> Result<()> {
    let check = auditor.check_process_and_port(process, port);
    let rendered = match format {
        "json" => format_check_json(&check),
        _ => format_check(&check),
    };
    println!("{}", rendered);
    Ok(())
}
