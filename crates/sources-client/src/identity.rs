//! Tenant identity header
//!
//! Every registry call carries a tenant identity header: a base64-encoded JSON
//! object naming the tenant account the request acts for.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;

/// Header carrying the encoded tenant identity
pub const IDENTITY_HEADER: &str = "x-rh-identity";

/// Account used for calls that are not scoped to a single tenant
/// (tenant listing, source type listing)
pub const SYSTEM_ACCOUNT: &str = "system_orchestrator";

#[derive(Serialize)]
struct IdentityEnvelope<'a> {
    identity: AccountIdentity<'a>,
}

#[derive(Serialize)]
struct AccountIdentity<'a> {
    account_number: &'a str,
}

/// Encode the identity header value for a tenant account
pub fn encode_identity(tenant: &str) -> String {
    let envelope = IdentityEnvelope {
        identity: AccountIdentity {
            account_number: tenant,
        },
    };
    // Serializing two string fields cannot fail
    let json = serde_json::to_vec(&envelope).unwrap_or_default();
    STANDARD.encode(json)
}
