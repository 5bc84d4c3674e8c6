//! Core data model: values, frames, resources, channels and lifecycle

pub mod channel;
pub mod channels;
pub mod frame;
pub mod lifecycle;
pub mod register;
pub mod resource;
pub mod value;

pub use channel::{Binding, Channel, ChannelState};
pub use channels::Channels;
pub use frame::TimeFrame;
pub use lifecycle::{Lifecycle, RunState};
pub use register::{ConnectorFactory, Registration, Registry};
pub use resource::Resource;
pub use value::{Value, ValueKind};
