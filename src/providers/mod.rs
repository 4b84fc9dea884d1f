//! # Provider Gateway
//!
//! Uniform call interface over external text-generation APIs plus the
//! resolution logic that picks which provider actually serves a call.

pub mod anthropic;
pub mod errors;
pub mod gateway;
pub mod google;
pub mod openai;
pub mod protocol;
pub mod resolver;
pub mod types;

pub use errors::ProviderError;
pub use gateway::{HttpProviderGateway, ProviderGateway};
pub use protocol::{protocol_for, ResellerAttribution, WireProtocol};
pub use resolver::{ProviderResolver, ResolutionTier, ResolvedProvider};
pub use types::{ProviderCallRequest, ProviderConfig, ProviderResponse, WireCompletion, WireRequest};
