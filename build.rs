fn main() {
    let descriptor_path = std::path::PathBuf::from(std::env::var("OUT_DIR").unwrap()).join("wallet_descriptor.bin");
    tonic_build::configure()
        .build_server(true)
        .build_client(false)
        .file_descriptor_set_path(&descriptor_path)
        .compile(&["proto/wallet.proto"], &["proto"])
        .expect("failed to compile wallet.proto");
}
