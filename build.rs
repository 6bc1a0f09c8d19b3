fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed=proto/grpc_predict_v2.proto");

    // Fall back to the bundled protoc when the host has none on PATH
    if std::env::var_os("PROTOC").is_none() {
        std::env::set_var("PROTOC", protoc_bin_vendored::protoc_bin_path()?);
    }

    // The server half is only used by the in-process fake in the tests
    tonic_build::configure()
        .build_client(true)
        .build_server(true)
        .compile(&["proto/grpc_predict_v2.proto"], &["proto"])?;

    Ok(())
}
