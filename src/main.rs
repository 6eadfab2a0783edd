fn main() {
    let _log_guard = vantage::logging::init();

    if let Err(err) = vantage::run() {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}
