fn main() -> Result<(), Box<dyn std::error::Error>> {
    let proto_file = "proto/yambol.proto";

    println!("cargo:rerun-if-changed={}", proto_file);

    if std::env::var_os("PROTOC").is_none() {
        std::env::set_var("PROTOC", protoc_bin_vendored::protoc_bin_path()?);
    }

    // Configure tonic code generation (outputs to OUT_DIR by default)
    tonic_build::configure()
        .build_server(true)
        .build_client(true)
        .compile_protos(&[proto_file], &["proto"])?;

    Ok(())
}
