/// User model and database operations
///
/// Accounts are created by the client after sign-up with the external
/// identity provider, so there is no password material here: `uid` is the
/// provider's subject id and `email` is the natural key every role and
/// suspension endpoint is addressed by.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE user_role AS ENUM ('borrower', 'manager', 'admin');
///
/// CREATE TABLE users (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     uid VARCHAR(128) NOT NULL,
///     email CITEXT NOT NULL UNIQUE,
///     name VARCHAR(255),
///     photo_url VARCHAR(512),
///     role user_role NOT NULL DEFAULT 'borrower',
///     suspended BOOLEAN NOT NULL DEFAULT FALSE,
///     suspended_reason TEXT,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::fmt;
use uuid::Uuid;

/// Marketplace roles, least privileged first
///
/// - **borrower**: applies for loans, pays fees, views own applications
/// - **manager**: authors loan products, reviews applications
/// - **admin**: manages users and global loan visibility; superset of
///   manager read access
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Least-privileged role; the default when resolution fails
    Borrower,

    /// Authors loan products and reviews applications
    Manager,

    /// Manages users, roles, suspension, and loan visibility
    Admin,
}

impl Role {
    /// Converts role to its wire string
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Borrower => "borrower",
            Role::Manager => "manager",
            Role::Admin => "admin",
        }
    }

    /// Can author and edit loan products
    pub fn can_author_loans(&self) -> bool {
        matches!(self, Role::Manager | Role::Admin)
    }

    /// Can approve or reject loan applications
    pub fn can_review_applications(&self) -> bool {
        matches!(self, Role::Manager | Role::Admin)
    }

    /// Can manage user roles and suspension
    pub fn can_manage_users(&self) -> bool {
        matches!(self, Role::Admin)
    }

    /// Can toggle a loan product's home-page visibility
    pub fn can_toggle_visibility(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User account record
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    /// Surrogate key
    pub id: Uuid,

    /// Identity-provider subject id
    pub uid: String,

    /// Email address (case-insensitive via CITEXT); unique natural key
    pub email: String,

    /// Optional display name
    pub name: Option<String>,

    /// Optional profile photo URL
    pub photo_url: Option<String>,

    /// Marketplace role
    pub role: Role,

    /// Whether the account is suspended
    pub suspended: bool,

    /// Reason recorded when the account was suspended
    pub suspended_reason: Option<String>,

    /// When the account was created
    pub created_at: DateTime<Utc>,

    /// When the account was last updated
    pub updated_at: DateTime<Utc>,
}

/// Input for registering a user after identity-provider sign-up
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUser {
    /// Identity-provider subject id
    pub uid: String,

    /// Email address
    pub email: String,

    /// Optional display name
    pub name: Option<String>,

    /// Optional profile photo URL
    pub photo_url: Option<String>,
}

impl User {
    /// Registers a user, or refreshes the profile if the email already exists
    ///
    /// Registration happens after the external identity provider has
    /// accepted the sign-up, so a repeat call for the same email is a
    /// profile refresh rather than an error. Role and suspension are never
    /// touched by this path.
    pub async fn create(pool: &PgPool, data: CreateUser) -> Result<Self, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (uid, email, name, photo_url)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (email) DO UPDATE
                SET uid = EXCLUDED.uid,
                    name = EXCLUDED.name,
                    photo_url = EXCLUDED.photo_url,
                    updated_at = NOW()
            RETURNING id, uid, email, name, photo_url, role, suspended,
                      suspended_reason, created_at, updated_at
            "#,
        )
        .bind(data.uid)
        .bind(data.email)
        .bind(data.name)
        .bind(data.photo_url)
        .fetch_one(pool)
        .await?;

        Ok(user)
    }

    /// Finds a user by email address (case-insensitive)
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, uid, email, name, photo_url, role, suspended,
                   suspended_reason, created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    /// Looks up just the stored role for an email
    ///
    /// This is the backend lookup the identity resolver consults; `None`
    /// means no account exists for that email.
    pub async fn role_by_email(pool: &PgPool, email: &str) -> Result<Option<Role>, sqlx::Error> {
        let role: Option<(Role,)> = sqlx::query_as("SELECT role FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(pool)
            .await?;

        Ok(role.map(|(r,)| r))
    }

    /// Changes a user's role
    ///
    /// Returns the updated record, or `None` if no account has that email.
    pub async fn set_role(
        pool: &PgPool,
        email: &str,
        role: Role,
    ) -> Result<Option<Self>, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET role = $2, updated_at = NOW()
            WHERE email = $1
            RETURNING id, uid, email, name, photo_url, role, suspended,
                      suspended_reason, created_at, updated_at
            "#,
        )
        .bind(email)
        .bind(role)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    /// Suspends or reinstates a user
    ///
    /// The reason is stored on suspension and cleared on reinstatement.
    pub async fn set_suspended(
        pool: &PgPool,
        email: &str,
        suspended: bool,
        reason: Option<String>,
    ) -> Result<Option<Self>, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET suspended = $2,
                suspended_reason = CASE WHEN $2 THEN $3 ELSE NULL END,
                updated_at = NOW()
            WHERE email = $1
            RETURNING id, uid, email, name, photo_url, role, suspended,
                      suspended_reason, created_at, updated_at
            "#,
        )
        .bind(email)
        .bind(suspended)
        .bind(reason)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    /// Lists users with pagination, newest first
    pub async fn list(pool: &PgPool, limit: i64, offset: i64) -> Result<Vec<Self>, sqlx::Error> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT id, uid, email, name, photo_url, role, suspended,
                   suspended_reason, created_at, updated_at
            FROM users
            ORDER BY created_at DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        Ok(users)
    }

    /// Counts total number of users
    pub async fn count(pool: &PgPool) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(pool)
            .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_permissions() {
        assert!(!Role::Borrower.can_author_loans());
        assert!(Role::Manager.can_author_loans());
        assert!(Role::Admin.can_author_loans());

        assert!(!Role::Borrower.can_review_applications());
        assert!(Role::Manager.can_review_applications());
        assert!(Role::Admin.can_review_applications());

        assert!(!Role::Manager.can_manage_users());
        assert!(Role::Admin.can_manage_users());

        assert!(!Role::Manager.can_toggle_visibility());
        assert!(Role::Admin.can_toggle_visibility());
    }

    #[test]
    fn test_role_wire_format() {
        assert_eq!(serde_json::to_string(&Role::Borrower).unwrap(), "\"borrower\"");
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");

        let role: Role = serde_json::from_str("\"manager\"").unwrap();
        assert_eq!(role, Role::Manager);
        assert_eq!(role.to_string(), "manager");
    }

    // Integration tests for database operations live in lonify-api/tests/.
}
