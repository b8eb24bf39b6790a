fn main() {
    if let Err(err) = crampwave_lib::run() {
        eprintln!("crampwave: {err:#}");
        std::process::exit(1);
    }
}
