//! OAuth identity providers, signed values, and session lifecycle.
//!
//! This crate holds the transport-agnostic core of authentication:
//! HMAC-signed opaque values, the provider seam with its concrete
//! implementations, the auth record and user entities, the abstract
//! record store, and the lifecycle service that ties them together.

pub mod error;
pub mod provider;
pub mod providers;
pub mod reauth;
pub mod record;
pub mod service;
pub mod signed;
pub mod store;
pub mod token;
pub mod user;

#[cfg(test)]
pub(crate) mod testutil;

pub use error::{AuthError, ProviderError, SignedValueError, StoreError};
pub use provider::{OauthProvider, ProviderDescriptor, ProviderIdentity, ProviderRegistry};
pub use reauth::{ReauthSummary, run_reauth_sweep};
pub use record::AuthRecord;
pub use service::{AuthService, SessionGate};
pub use signed::SignedValueCodec;
pub use store::AuthStore;
pub use token::{Token, UserProfile};
pub use user::User;
