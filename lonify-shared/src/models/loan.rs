/// Loan product model and catalog operations
///
/// Loan products are authored by managers and browsed by everyone. The
/// public catalog only exposes products flagged `show_on_home`; an
/// authenticated listing sees the full set.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE loan_products (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     title VARCHAR(255) NOT NULL,
///     category VARCHAR(100) NOT NULL,
///     interest_rate DOUBLE PRECISION NOT NULL,
///     min_limit DOUBLE PRECISION NOT NULL,
///     max_limit DOUBLE PRECISION NOT NULL,
///     description TEXT NOT NULL,
///     image_url VARCHAR(512),
///     emi_plans INTEGER[] NOT NULL DEFAULT '{}',
///     required_documents TEXT[] NOT NULL DEFAULT '{}',
///     show_on_home BOOLEAN NOT NULL DEFAULT FALSE,
///     created_by CITEXT NOT NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Validation failures for loan product terms
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoanTermsError {
    /// Interest rate below zero
    #[error("interest rate must not be negative")]
    NegativeRate,

    /// A lending limit below zero
    #[error("lending limits must not be negative")]
    NegativeLimit,

    /// Minimum limit above maximum limit
    #[error("minimum limit must not exceed maximum limit")]
    LimitsOutOfOrder,

    /// An EMI tenure of zero months
    #[error("EMI tenures must be positive")]
    InvalidTenure,
}

impl LoanTermsError {
    /// Which request field the failure should be reported against
    pub fn field(&self) -> &'static str {
        match self {
            LoanTermsError::NegativeRate => "interest_rate",
            LoanTermsError::NegativeLimit => "min_limit",
            LoanTermsError::LimitsOutOfOrder => "max_limit",
            LoanTermsError::InvalidTenure => "emi_plans",
        }
    }
}

/// Validates the numeric terms of a loan product
///
/// Rate and both limits must be non-negative, the limits ordered, and every
/// EMI tenure positive.
///
/// # Example
///
/// ```
/// use lonify_shared::models::loan::{validate_terms, LoanTermsError};
///
/// assert!(validate_terms(5.9, 100.0, 500.0, &[6, 12]).is_ok());
/// assert_eq!(
///     validate_terms(5.9, 500.0, 100.0, &[6]),
///     Err(LoanTermsError::LimitsOutOfOrder)
/// );
/// ```
pub fn validate_terms(
    interest_rate: f64,
    min_limit: f64,
    max_limit: f64,
    emi_plans: &[i32],
) -> Result<(), LoanTermsError> {
    if interest_rate < 0.0 {
        return Err(LoanTermsError::NegativeRate);
    }
    if min_limit < 0.0 || max_limit < 0.0 {
        return Err(LoanTermsError::NegativeLimit);
    }
    if min_limit > max_limit {
        return Err(LoanTermsError::LimitsOutOfOrder);
    }
    if emi_plans.iter().any(|months| *months <= 0) {
        return Err(LoanTermsError::InvalidTenure);
    }
    Ok(())
}

/// Loan product record
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct LoanProduct {
    /// Unique product id
    pub id: Uuid,

    /// Product title
    pub title: String,

    /// Category (Personal, Business, Housing, Education, ...)
    pub category: String,

    /// Interest rate, percent
    pub interest_rate: f64,

    /// Minimum amount that can be requested
    pub min_limit: f64,

    /// Maximum amount that can be requested
    pub max_limit: f64,

    /// Marketing description
    pub description: String,

    /// Optional product image
    pub image_url: Option<String>,

    /// EMI tenure options, in months
    pub emi_plans: Vec<i32>,

    /// Document names the applicant must provide
    pub required_documents: Vec<String>,

    /// Whether the product is promoted on the landing page
    pub show_on_home: bool,

    /// Email of the manager who authored the product
    pub created_by: String,

    /// When the product was created
    pub created_at: DateTime<Utc>,

    /// When the product was last updated
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a loan product
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateLoanProduct {
    pub title: String,
    pub category: String,
    pub interest_rate: f64,
    pub min_limit: f64,
    pub max_limit: f64,
    pub description: String,
    pub image_url: Option<String>,
    pub emi_plans: Vec<i32>,
    pub required_documents: Vec<String>,
    pub show_on_home: bool,

    /// Email of the authoring manager, taken from the authenticated
    /// identity rather than the request body
    pub created_by: String,
}

/// Partial update for a loan product; only `Some` fields are written
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateLoanProduct {
    pub title: Option<String>,
    pub category: Option<String>,
    pub interest_rate: Option<f64>,
    pub min_limit: Option<f64>,
    pub max_limit: Option<f64>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub emi_plans: Option<Vec<i32>>,
    pub required_documents: Option<Vec<String>>,
}

/// Catalog listing filter; both criteria combine with logical AND
#[derive(Debug, Clone, Default)]
pub struct LoanFilter {
    /// Free-text substring match against title or description
    pub search: Option<String>,

    /// Exact category match
    pub category: Option<String>,
}

const LOAN_COLUMNS: &str = "id, title, category, interest_rate, min_limit, max_limit, \
     description, image_url, emi_plans, required_documents, show_on_home, \
     created_by, created_at, updated_at";

impl LoanProduct {
    /// Creates a new loan product
    ///
    /// Callers validate terms with [`validate_terms`] first; the database
    /// CHECK constraints are a backstop, not the error surface.
    pub async fn create(pool: &PgPool, data: CreateLoanProduct) -> Result<Self, sqlx::Error> {
        let loan = sqlx::query_as::<_, LoanProduct>(&format!(
            r#"
            INSERT INTO loan_products
                (title, category, interest_rate, min_limit, max_limit,
                 description, image_url, emi_plans, required_documents,
                 show_on_home, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {LOAN_COLUMNS}
            "#
        ))
        .bind(data.title)
        .bind(data.category)
        .bind(data.interest_rate)
        .bind(data.min_limit)
        .bind(data.max_limit)
        .bind(data.description)
        .bind(data.image_url)
        .bind(data.emi_plans)
        .bind(data.required_documents)
        .bind(data.show_on_home)
        .bind(data.created_by)
        .fetch_one(pool)
        .await?;

        Ok(loan)
    }

    /// Finds a loan product by id
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let loan = sqlx::query_as::<_, LoanProduct>(&format!(
            "SELECT {LOAN_COLUMNS} FROM loan_products WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(loan)
    }

    /// Lists loan products matching the filter, newest first
    ///
    /// `visible_only` restricts the result to products promoted on the
    /// landing page; the public catalog always passes `true`.
    pub async fn list(
        pool: &PgPool,
        filter: &LoanFilter,
        visible_only: bool,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let mut query = format!("SELECT {LOAN_COLUMNS} FROM loan_products");
        let mut clauses: Vec<String> = Vec::new();
        let mut bind_count = 0;

        if visible_only {
            clauses.push("show_on_home = TRUE".to_string());
        }
        if filter.search.is_some() {
            bind_count += 1;
            clauses.push(format!(
                "(title ILIKE ${0} OR description ILIKE ${0})",
                bind_count
            ));
        }
        if filter.category.is_some() {
            bind_count += 1;
            clauses.push(format!("category = ${}", bind_count));
        }

        if !clauses.is_empty() {
            query.push_str(" WHERE ");
            query.push_str(&clauses.join(" AND "));
        }
        query.push_str(" ORDER BY created_at DESC");

        let mut q = sqlx::query_as::<_, LoanProduct>(&query);
        if let Some(search) = &filter.search {
            q = q.bind(format!("%{}%", search));
        }
        if let Some(category) = &filter.category {
            q = q.bind(category);
        }

        q.fetch_all(pool).await
    }

    /// Applies a partial update to a loan product
    ///
    /// Returns the updated record, or `None` if the id does not resolve.
    /// Ownership (authoring manager or admin) is checked by the caller
    /// before invoking this.
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: UpdateLoanProduct,
    ) -> Result<Option<Self>, sqlx::Error> {
        // Build dynamic update based on which fields are present
        let mut query = String::from("UPDATE loan_products SET updated_at = NOW()");
        let mut bind_count = 1;

        let push = |query: &mut String, column: &str, bind_count: &mut i32| {
            *bind_count += 1;
            query.push_str(&format!(", {} = ${}", column, bind_count));
        };

        if data.title.is_some() {
            push(&mut query, "title", &mut bind_count);
        }
        if data.category.is_some() {
            push(&mut query, "category", &mut bind_count);
        }
        if data.interest_rate.is_some() {
            push(&mut query, "interest_rate", &mut bind_count);
        }
        if data.min_limit.is_some() {
            push(&mut query, "min_limit", &mut bind_count);
        }
        if data.max_limit.is_some() {
            push(&mut query, "max_limit", &mut bind_count);
        }
        if data.description.is_some() {
            push(&mut query, "description", &mut bind_count);
        }
        if data.image_url.is_some() {
            push(&mut query, "image_url", &mut bind_count);
        }
        if data.emi_plans.is_some() {
            push(&mut query, "emi_plans", &mut bind_count);
        }
        if data.required_documents.is_some() {
            push(&mut query, "required_documents", &mut bind_count);
        }

        query.push_str(&format!(
            " WHERE id = $1 RETURNING {LOAN_COLUMNS}"
        ));

        let mut q = sqlx::query_as::<_, LoanProduct>(&query).bind(id);

        if let Some(title) = data.title {
            q = q.bind(title);
        }
        if let Some(category) = data.category {
            q = q.bind(category);
        }
        if let Some(rate) = data.interest_rate {
            q = q.bind(rate);
        }
        if let Some(min_limit) = data.min_limit {
            q = q.bind(min_limit);
        }
        if let Some(max_limit) = data.max_limit {
            q = q.bind(max_limit);
        }
        if let Some(description) = data.description {
            q = q.bind(description);
        }
        if let Some(image_url) = data.image_url {
            q = q.bind(image_url);
        }
        if let Some(emi_plans) = data.emi_plans {
            q = q.bind(emi_plans);
        }
        if let Some(required_documents) = data.required_documents {
            q = q.bind(required_documents);
        }

        q.fetch_optional(pool).await
    }

    /// Deletes a loan product
    ///
    /// Every application referencing the product is removed as well via the
    /// `ON DELETE CASCADE` foreign key; the UI warns before invoking this.
    ///
    /// Returns true if a product was deleted.
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM loan_products WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Sets the landing-page visibility flag (admin only, enforced by the
    /// route layer)
    pub async fn set_show_on_home(
        pool: &PgPool,
        id: Uuid,
        show_on_home: bool,
    ) -> Result<Option<Self>, sqlx::Error> {
        let loan = sqlx::query_as::<_, LoanProduct>(&format!(
            r#"
            UPDATE loan_products
            SET show_on_home = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {LOAN_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(show_on_home)
        .fetch_optional(pool)
        .await?;

        Ok(loan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_terms_accepts_ordered_limits() {
        assert!(validate_terms(5.9, 100.0, 500.0, &[6, 12, 24]).is_ok());
        assert!(validate_terms(0.0, 0.0, 0.0, &[]).is_ok());
    }

    #[test]
    fn test_validate_terms_rejects_inverted_limits() {
        assert_eq!(
            validate_terms(5.9, 500.0, 100.0, &[6]),
            Err(LoanTermsError::LimitsOutOfOrder)
        );
    }

    #[test]
    fn test_validate_terms_rejects_negatives() {
        assert_eq!(
            validate_terms(-0.1, 100.0, 500.0, &[]),
            Err(LoanTermsError::NegativeRate)
        );
        assert_eq!(
            validate_terms(5.9, -1.0, 500.0, &[]),
            Err(LoanTermsError::NegativeLimit)
        );
    }

    #[test]
    fn test_validate_terms_rejects_zero_tenure() {
        assert_eq!(
            validate_terms(5.9, 100.0, 500.0, &[12, 0]),
            Err(LoanTermsError::InvalidTenure)
        );
    }

    #[test]
    fn test_terms_error_fields() {
        assert_eq!(LoanTermsError::NegativeRate.field(), "interest_rate");
        assert_eq!(LoanTermsError::LimitsOutOfOrder.field(), "max_limit");
    }
}
