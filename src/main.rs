fn main() {
    if let Err(err) = profit_finder::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
