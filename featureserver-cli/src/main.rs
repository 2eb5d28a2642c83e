//! Entry point for the command-line interface.
#![forbid(unsafe_code)]

fn main() {
    if let Err(err) = featureserver_cli::run() {
        eprintln!("featureserver: {err}");
        std::process::exit(1);
    }
}
