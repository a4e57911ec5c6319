//! `secaudit products`

use anyhow::Result;
use secaudit_engine::report::format_products;
use secaudit_engine::Auditor;

pub fn cmd_products(auditor: &Auditor) -> Result<()> {
    let available = auditor.get_available_products();
    let known = auditor.registry().known_products();
    println!("{}", format_products(&available, &known));
    Ok(())
}
