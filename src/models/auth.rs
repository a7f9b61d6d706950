//! Credential and user-identity models
//!
//! The `Credential` is owned exclusively by the token store; nothing else
//! in the crate mutates credential state directly.

use serde::{Deserialize, Serialize};

/// The credential triple held for an authenticated session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: String,
    /// CSRF token mirrored from the host cookie, when one is present
    pub csrf_token: Option<String>,
}

/// Role of the signed-in user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    Professor,
}

/// Persisted summary of the signed-in user
///
/// A session is *fully* authenticated only when a credential exists and
/// `face_verified` is true; until then protected exam views stay closed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: i64,
    pub email: String,
    pub role: Role,
    #[serde(default)]
    pub face_verified: bool,
    #[serde(default)]
    pub first_login: bool,
}

/// Access/refresh pair returned by the token endpoints
///
/// The refresh member is optional: providers may rotate it on refresh.
/// Whatever refresh token the server most recently returned is the one
/// that gets persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access: String,
    #[serde(default)]
    pub refresh: Option<String>,
}

/// Response of the password login endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub tokens: TokenPair,
    pub user: UserSummary,
}

/// Verdict of the opaque biometric verification collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceVerdict {
    pub success: bool,
}
