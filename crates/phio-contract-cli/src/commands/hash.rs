use phio_contract::ContentHash;
use std::path::Path;

pub fn run(path: String) {
    let hash = ContentHash::from_file(Path::new(&path)).unwrap_or_else(|err| {
        eprintln!("error: {err}");
        std::process::exit(2);
    });
    println!("{hash}");
}
