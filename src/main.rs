fn main() {
    if let Err(err) = sheet_query::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
