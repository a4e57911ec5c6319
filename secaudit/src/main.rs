fn main() {
    if let Err(e) = secaudit::run_cli() {
        eprintln!("[X] {e:#}");
        std::process::exit(1);
    }
}
