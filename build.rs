fn main() {
    if let Err(err) = built::write_built_file() {
        panic!("Failed to acquire build-time information: {}", err);
    }
}
