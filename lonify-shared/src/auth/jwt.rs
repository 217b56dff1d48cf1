/// JWT token creation and validation
///
/// The service issues its own session tokens after the external identity
/// provider has authenticated the user: `POST /jwt` exchanges the
/// provider-verified principal for a signed bearer token carrying the
/// resolved role. Tokens are signed with HS256 and validated for signature,
/// expiry, and issuer on every authenticated request.
///
/// # Example
///
/// ```
/// use lonify_shared::auth::jwt::{create_token, validate_token, Claims};
/// use lonify_shared::models::user::Role;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let secret = "test-secret-key-at-least-32-bytes-long";
/// let claims = Claims::new("firebase-uid-123", "rina@example.com", Role::Borrower);
///
/// let token = create_token(&claims, secret)?;
/// let validated = validate_token(&token, secret)?;
/// assert_eq!(validated.email, "rina@example.com");
/// assert_eq!(validated.role, Role::Borrower);
/// # Ok(())
/// # }
/// ```

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::models::user::Role;

const ISSUER: &str = "lonify";

/// Session token lifetime
const TOKEN_LIFETIME_HOURS: i64 = 24;

/// Error type for JWT operations
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    /// Failed to create token
    #[error("Failed to create token: {0}")]
    CreateError(String),

    /// Failed to validate token
    #[error("Failed to validate token: {0}")]
    ValidationError(String),

    /// Token has expired
    #[error("Token has expired")]
    Expired,

    /// Invalid issuer
    #[error("Invalid token issuer")]
    InvalidIssuer,
}

/// JWT claims structure
///
/// Standard claims plus the marketplace identity: the identity-provider
/// subject id, the email the backend keys everything by, and the role
/// resolved at issuance time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject - identity-provider uid
    pub sub: String,

    /// Email address (backend natural key)
    pub email: String,

    /// Role resolved at issuance; re-issued on role change
    pub role: Role,

    /// Issuer - always "lonify"
    pub iss: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Not before (Unix timestamp)
    pub nbf: i64,
}

impl Claims {
    /// Creates new claims with the default 24-hour lifetime
    pub fn new(uid: &str, email: &str, role: Role) -> Self {
        Self::with_expiration(uid, email, role, Duration::hours(TOKEN_LIFETIME_HOURS))
    }

    /// Creates claims with a custom lifetime
    pub fn with_expiration(uid: &str, email: &str, role: Role, expires_in: Duration) -> Self {
        let now = Utc::now();

        Self {
            sub: uid.to_string(),
            email: email.to_string(),
            role,
            iss: ISSUER.to_string(),
            iat: now.timestamp(),
            exp: (now + expires_in).timestamp(),
            nbf: now.timestamp(),
        }
    }

    /// Checks if the token has expired
    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.exp
    }
}

/// Creates a signed JWT from claims
///
/// # Errors
///
/// Returns `JwtError::CreateError` if encoding fails.
pub fn create_token(claims: &Claims, secret: &str) -> Result<String, JwtError> {
    let header = Header::new(Algorithm::HS256);
    let key = EncodingKey::from_secret(secret.as_bytes());

    encode(&header, claims, &key)
        .map_err(|e| JwtError::CreateError(format!("Token encoding failed: {}", e)))
}

/// Validates a JWT and extracts its claims
///
/// Verifies the signature, expiry, not-before, and issuer.
///
/// # Errors
///
/// Returns `JwtError::Expired` for expired tokens and
/// `JwtError::ValidationError` for any other failure.
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    let key = DecodingKey::from_secret(secret.as_bytes());

    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[ISSUER]);
    validation.validate_exp = true;
    validation.validate_nbf = true;

    let token_data = decode::<Claims>(token, &key, &validation).map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::Expired,
        jsonwebtoken::errors::ErrorKind::InvalidIssuer => JwtError::InvalidIssuer,
        _ => JwtError::ValidationError(format!("Token validation failed: {}", e)),
    })?;

    Ok(token_data.claims)
}
