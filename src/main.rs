fn main() {
    if let Err(err) = orthodraw::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
