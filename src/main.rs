fn main() {
    if let Err(err) = series_consolidate::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
