//! Core trait definitions

mod provider;

pub use provider::{ChannelHandle, ChannelProvider};
