fn main() {
    #[cfg(target_arch = "wasm32")]
    keepvolume::browser::launch();

    #[cfg(not(target_arch = "wasm32"))]
    eprintln!("[keepvolume] runs inside a browser page; build for wasm32-unknown-unknown");
}
