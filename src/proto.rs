//! Generated protobuf types for the Yambol gRPC surface.

tonic::include_proto!("yambol");
