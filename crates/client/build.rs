//! Compiles the device status RPC contract from `proto/device_status.proto`.
//!
//! Only client stubs are generated -- the serving side lives in the
//! devices themselves, outside this workspace. Generated code lands in
//! `$OUT_DIR` and is included via `tonic::include_proto!`.

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let proto_file = "../../proto/device_status.proto";

    println!("cargo:rerun-if-changed={proto_file}");

    tonic_build::configure()
        .build_server(false)
        .build_client(true)
        .compile_protos(&[proto_file], &["../../proto"])?;

    Ok(())
}
