use portcullis_core::{AccountId, AppError, AppResult};
use portcullis_domain::{Permission, Subject};
use tracing::warn;

/// Application service for account-scoped capability checks.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthorizationService;

impl AuthorizationService {
    /// Creates a new authorization service.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Ensures the subject holds every required capability.
    ///
    /// The error message enumerates each missing capability.
    pub fn require_permissions(
        &self,
        subject: &Subject,
        required: &[Permission],
    ) -> AppResult<()> {
        let missing = subject.missing_permissions(required);
        if missing.is_empty() {
            return Ok(());
        }

        let missing = missing
            .iter()
            .map(Permission::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        warn!(
            account_id = %subject.account_id(),
            actor_id = ?subject.actor_id(),
            missing = %missing,
            "subject lacks required permissions"
        );

        Err(AppError::Forbidden(format!(
            "subject is missing permissions [{missing}] in account '{}'",
            subject.account_id()
        )))
    }

    /// Ensures the subject holds the capability and acts inside the account.
    ///
    /// Subjects of other accounts see the account as absent.
    pub fn require_account_permissions(
        &self,
        subject: &Subject,
        account_id: AccountId,
        required: &[Permission],
    ) -> AppResult<()> {
        if subject.account_id() != account_id {
            return Err(AppError::NotFound(format!("account '{account_id}' not found")));
        }

        self.require_permissions(subject, required)
    }
}
