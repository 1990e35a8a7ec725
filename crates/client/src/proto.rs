//! Generated gRPC client code for the device status contract.
//!
//! Includes the Rust code generated from `proto/device_status.proto`,
//! providing `DeviceStatusServiceClient` and the request/reply types.

tonic::include_proto!("device");
