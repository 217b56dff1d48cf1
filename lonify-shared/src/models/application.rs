/// Loan application model and lifecycle state machine
///
/// Applications are the core entity of the marketplace. Each one moves
/// through a small state machine; every mutation below enforces it both in
/// code (via [`ApplicationStatus::can_transition_to`]) and in SQL (via
/// conditional updates), so a concurrent session can never commit an
/// undefined transition.
///
/// # State Machine
///
/// ```text
/// pending → approved
///         → rejected
///         → canceled
/// ```
///
/// All three outcomes are terminal. The application fee is a parallel
/// `unpaid → paid` flag that may flip while the application is pending or
/// approved, exactly once.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE application_status AS ENUM ('pending', 'approved', 'rejected', 'canceled');
/// CREATE TYPE fee_status AS ENUM ('unpaid', 'paid');
/// ```
/// (see migrations/0001_init.sql for the full table)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::fmt;
use uuid::Uuid;

/// Lifecycle status of a loan application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "application_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    /// Submitted, awaiting review
    Pending,

    /// Accepted by a manager or admin
    Approved,

    /// Declined by a manager or admin
    Rejected,

    /// Withdrawn by the applicant
    Canceled,
}

impl ApplicationStatus {
    /// Converts status to its wire string
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::Approved => "approved",
            ApplicationStatus::Rejected => "rejected",
            ApplicationStatus::Canceled => "canceled",
        }
    }

    /// Checks if the status is terminal (no transition may leave it)
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ApplicationStatus::Approved | ApplicationStatus::Rejected | ApplicationStatus::Canceled
        )
    }

    /// Checks if a transition to the target status is defined
    pub fn can_transition_to(&self, target: ApplicationStatus) -> bool {
        match (self, target) {
            (ApplicationStatus::Pending, ApplicationStatus::Approved) => true,
            (ApplicationStatus::Pending, ApplicationStatus::Rejected) => true,
            (ApplicationStatus::Pending, ApplicationStatus::Canceled) => true,

            // Terminal states cannot transition
            _ => false,
        }
    }

    /// Whether the application fee may still be paid in this status
    pub fn fee_payable(&self) -> bool {
        matches!(self, ApplicationStatus::Pending | ApplicationStatus::Approved)
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment state of the fixed application fee
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "fee_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum FeeStatus {
    /// Fee not collected yet
    Unpaid,

    /// Fee collected; transaction id and paid-at are recorded
    Paid,
}

impl fmt::Display for FeeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FeeStatus::Unpaid => "unpaid",
            FeeStatus::Paid => "paid",
        })
    }
}

/// Errors produced by workflow mutations
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    /// Application id does not resolve
    #[error("application {0} not found")]
    NotFound(Uuid),

    /// The requested transition is not in the state machine
    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition {
        from: ApplicationStatus,
        to: ApplicationStatus,
    },

    /// Requester is not the applicant
    #[error("only the applicant may perform this action")]
    NotOwner,

    /// Fee payment replayed on an already-paid application
    #[error("application fee is already paid")]
    AlreadyPaid,

    /// Fee payment attempted in a status that no longer accepts it
    #[error("application fee cannot be paid while {0}")]
    FeeUnpayable(ApplicationStatus),

    /// Underlying database failure
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Review decision applied by a manager or admin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewAction {
    Approve,
    Reject,
}

/// Outcome of a bulk review: per-item validation, partial-failure tolerant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkOutcome {
    /// Applications whose transition was applied
    pub applied: usize,

    /// Applications skipped because they were already terminal (or gone)
    pub skipped: usize,
}

/// Loan application record
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct LoanApplication {
    /// Unique application id
    pub id: Uuid,

    /// Loan product this application is for
    pub loan_id: Uuid,

    /// Product title, copied at submission time
    pub loan_title: String,

    /// Product interest rate, copied at submission time
    pub interest_rate: f64,

    /// Applicant's identity-provider subject id
    pub applicant_uid: String,

    /// Applicant's email; ownership checks compare against this
    pub applicant_email: String,

    pub first_name: String,
    pub last_name: String,
    pub contact_number: String,
    pub national_id: String,
    pub income_source: String,
    pub monthly_income: f64,

    /// Requested amount
    pub loan_amount: f64,

    pub reason: String,
    pub address: String,
    pub extra_notes: Option<String>,

    /// Lifecycle status
    pub status: ApplicationStatus,

    /// Application fee state
    pub fee_status: FeeStatus,

    /// Processor transaction id, set when the fee is recorded
    pub transaction_id: Option<String>,

    /// When the fee was recorded
    pub paid_at: Option<DateTime<Utc>>,

    /// Stamped on approval
    pub approved_at: Option<DateTime<Utc>>,

    /// When the application was submitted
    pub created_at: DateTime<Utc>,

    /// When the application was last updated
    pub updated_at: DateTime<Utc>,
}

/// Input for submitting a loan application
///
/// Product title and rate are denormalized from the loan product by the
/// caller at submission time; applicant identity comes from the
/// authenticated context, never the request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateApplication {
    pub loan_id: Uuid,
    pub loan_title: String,
    pub interest_rate: f64,
    pub applicant_uid: String,
    pub applicant_email: String,
    pub first_name: String,
    pub last_name: String,
    pub contact_number: String,
    pub national_id: String,
    pub income_source: String,
    pub monthly_income: f64,
    pub loan_amount: f64,
    pub reason: String,
    pub address: String,
    pub extra_notes: Option<String>,
}

/// Listing filter for applications
#[derive(Debug, Clone, Default)]
pub struct ApplicationFilter {
    /// Restrict to one applicant (borrowers always filter by themselves)
    pub applicant_email: Option<String>,

    /// Exact status match; `None` lists all statuses
    pub status: Option<ApplicationStatus>,
}

const APPLICATION_COLUMNS: &str = "id, loan_id, loan_title, interest_rate, applicant_uid, \
     applicant_email, first_name, last_name, contact_number, national_id, \
     income_source, monthly_income, loan_amount, reason, address, extra_notes, \
     status, fee_status, transaction_id, paid_at, approved_at, created_at, updated_at";

impl LoanApplication {
    /// Submits a new application in `pending` status with an unpaid fee
    pub async fn create(pool: &PgPool, data: CreateApplication) -> Result<Self, sqlx::Error> {
        let application = sqlx::query_as::<_, LoanApplication>(&format!(
            r#"
            INSERT INTO loan_applications
                (loan_id, loan_title, interest_rate, applicant_uid, applicant_email,
                 first_name, last_name, contact_number, national_id, income_source,
                 monthly_income, loan_amount, reason, address, extra_notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            RETURNING {APPLICATION_COLUMNS}
            "#
        ))
        .bind(data.loan_id)
        .bind(data.loan_title)
        .bind(data.interest_rate)
        .bind(data.applicant_uid)
        .bind(data.applicant_email)
        .bind(data.first_name)
        .bind(data.last_name)
        .bind(data.contact_number)
        .bind(data.national_id)
        .bind(data.income_source)
        .bind(data.monthly_income)
        .bind(data.loan_amount)
        .bind(data.reason)
        .bind(data.address)
        .bind(data.extra_notes)
        .fetch_one(pool)
        .await?;

        Ok(application)
    }

    /// Finds an application by id
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let application = sqlx::query_as::<_, LoanApplication>(&format!(
            "SELECT {APPLICATION_COLUMNS} FROM loan_applications WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(application)
    }

    /// Lists applications matching the filter, newest first, paginated
    pub async fn list(
        pool: &PgPool,
        filter: &ApplicationFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let where_clause = Self::filter_clause(filter);

        let query = format!(
            "SELECT {APPLICATION_COLUMNS} FROM loan_applications{where_clause} \
             ORDER BY created_at DESC LIMIT {limit} OFFSET {offset}",
        );

        let mut q = sqlx::query_as::<_, LoanApplication>(&query);
        if let Some(email) = &filter.applicant_email {
            q = q.bind(email.clone());
        }
        if let Some(status) = filter.status {
            q = q.bind(status);
        }

        q.fetch_all(pool).await
    }

    /// Counts applications matching the filter (for page-count derivation)
    pub async fn count(pool: &PgPool, filter: &ApplicationFilter) -> Result<i64, sqlx::Error> {
        let where_clause = Self::filter_clause(filter);

        let query = format!("SELECT COUNT(*) FROM loan_applications{where_clause}");

        let mut q = sqlx::query_as::<_, (i64,)>(&query);
        if let Some(email) = &filter.applicant_email {
            q = q.bind(email.clone());
        }
        if let Some(status) = filter.status {
            q = q.bind(status);
        }

        let (count,) = q.fetch_one(pool).await?;
        Ok(count)
    }

    fn filter_clause(filter: &ApplicationFilter) -> String {
        let mut clauses: Vec<String> = Vec::new();
        let mut bind_count = 0;

        if filter.applicant_email.is_some() {
            bind_count += 1;
            clauses.push(format!("applicant_email = ${}", bind_count));
        }
        if filter.status.is_some() {
            bind_count += 1;
            clauses.push(format!("status = ${}", bind_count));
        }

        if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        }
    }

    /// Approves a pending application, stamping `approved_at`
    ///
    /// The conditional update only matches `pending` rows, so an already
    /// terminal application fails with `InvalidTransition` and its state is
    /// left untouched.
    pub async fn approve(pool: &PgPool, id: Uuid) -> Result<Self, WorkflowError> {
        let updated = sqlx::query_as::<_, LoanApplication>(&format!(
            r#"
            UPDATE loan_applications
            SET status = 'approved', approved_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            RETURNING {APPLICATION_COLUMNS}
            "#
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?;

        match updated {
            Some(application) => Ok(application),
            None => Err(Self::transition_failure(pool, id, ApplicationStatus::Approved).await?),
        }
    }

    /// Rejects a pending application
    pub async fn reject(pool: &PgPool, id: Uuid) -> Result<Self, WorkflowError> {
        let updated = sqlx::query_as::<_, LoanApplication>(&format!(
            r#"
            UPDATE loan_applications
            SET status = 'rejected', updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            RETURNING {APPLICATION_COLUMNS}
            "#
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?;

        match updated {
            Some(application) => Ok(application),
            None => Err(Self::transition_failure(pool, id, ApplicationStatus::Rejected).await?),
        }
    }

    /// Cancels a pending application on behalf of its applicant
    ///
    /// Fails with `NotOwner` when the requester's email does not match the
    /// applicant email, and with `InvalidTransition` once the application
    /// has left `pending`.
    pub async fn cancel(
        pool: &PgPool,
        id: Uuid,
        requester_email: &str,
    ) -> Result<Self, WorkflowError> {
        let current = Self::find_by_id(pool, id)
            .await?
            .ok_or(WorkflowError::NotFound(id))?;

        if !current.applicant_email.eq_ignore_ascii_case(requester_email) {
            return Err(WorkflowError::NotOwner);
        }

        let updated = sqlx::query_as::<_, LoanApplication>(&format!(
            r#"
            UPDATE loan_applications
            SET status = 'canceled', updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            RETURNING {APPLICATION_COLUMNS}
            "#
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?;

        updated.ok_or(WorkflowError::InvalidTransition {
            from: current.status,
            to: ApplicationStatus::Canceled,
        })
    }

    /// Records a successful fee payment; the sole path to `fee_status = paid`
    ///
    /// Allowed while the application is `pending` or `approved`, leaves the
    /// lifecycle status unchanged, and is guarded against replay: a second
    /// call (any transaction id) fails with `AlreadyPaid` while exactly one
    /// paid record remains.
    pub async fn record_payment(
        pool: &PgPool,
        id: Uuid,
        requester_email: &str,
        transaction_id: &str,
    ) -> Result<Self, WorkflowError> {
        let current = Self::find_by_id(pool, id)
            .await?
            .ok_or(WorkflowError::NotFound(id))?;

        if !current.applicant_email.eq_ignore_ascii_case(requester_email) {
            return Err(WorkflowError::NotOwner);
        }
        if current.fee_status == FeeStatus::Paid {
            return Err(WorkflowError::AlreadyPaid);
        }
        if !current.status.fee_payable() {
            return Err(WorkflowError::FeeUnpayable(current.status));
        }

        let updated = sqlx::query_as::<_, LoanApplication>(&format!(
            r#"
            UPDATE loan_applications
            SET fee_status = 'paid', transaction_id = $2, paid_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND fee_status = 'unpaid'
              AND status IN ('pending', 'approved')
            RETURNING {APPLICATION_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(transaction_id)
        .fetch_optional(pool)
        .await?;

        // A lost race means another request already recorded the fee.
        updated.ok_or(WorkflowError::AlreadyPaid)
    }

    /// Applies one review decision to a batch of applications
    ///
    /// Each item is validated independently: a pending application is
    /// transitioned, anything already terminal (or no longer present) is
    /// counted as skipped rather than failing the batch.
    pub async fn bulk_review(
        pool: &PgPool,
        ids: &[Uuid],
        action: ReviewAction,
    ) -> Result<BulkOutcome, sqlx::Error> {
        let statement = match action {
            ReviewAction::Approve => {
                "UPDATE loan_applications \
                 SET status = 'approved', approved_at = NOW(), updated_at = NOW() \
                 WHERE id = $1 AND status = 'pending'"
            }
            ReviewAction::Reject => {
                "UPDATE loan_applications \
                 SET status = 'rejected', updated_at = NOW() \
                 WHERE id = $1 AND status = 'pending'"
            }
        };

        let mut applied = 0;
        let mut skipped = 0;

        for id in ids {
            let result = sqlx::query(statement).bind(id).execute(pool).await?;
            if result.rows_affected() > 0 {
                applied += 1;
            } else {
                skipped += 1;
            }
        }

        Ok(BulkOutcome { applied, skipped })
    }

    /// Builds the error for a conditional transition that matched no row
    async fn transition_failure(
        pool: &PgPool,
        id: Uuid,
        target: ApplicationStatus,
    ) -> Result<WorkflowError, sqlx::Error> {
        match Self::find_by_id(pool, id).await? {
            Some(current) => Ok(WorkflowError::InvalidTransition {
                from: current.status,
                to: target,
            }),
            None => Ok(WorkflowError::NotFound(id)),
        }
    }
}
