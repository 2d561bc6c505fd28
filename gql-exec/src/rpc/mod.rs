//! The RPC-backed runtime bridge: the `Transport` and
//! `DescriptorRegistry` external collaborators, and the `RpcBridge`
//! that implements [`crate::runtime::Runtime`] on top of them.

pub mod bridge;
pub mod registry;
pub mod transport;

pub use bridge::RpcBridge;
pub use registry::{DescriptorRegistry, InMemoryRegistry, MethodDescriptor, MethodKind};
pub use transport::{CancellationSignal, Transport};
