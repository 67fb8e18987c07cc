fn main() {
    if let Err(e) = chatter_mesh_lib::run() {
        eprintln!("chatter-mesh: {}", e);
        std::process::exit(1);
    }
}
