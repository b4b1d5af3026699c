//! Collaborator traits consumed at the edge of the system.

use crate::error::NotypeResult;
use crate::models::account::FederatedProfile;

/// Yields the verified profile of a completed OAuth handshake.
///
/// Authenticity of the returned data is the provider's responsibility.
pub trait ProfileProvider: Send + Sync {
    /// Provider name used in logs (e.g. `google`).
    fn name(&self) -> &str;

    fn fetch_profile(
        &self,
        handshake: &str,
    ) -> impl Future<Output = NotypeResult<FederatedProfile>> + Send;
}
