use portcullis_core::{AppError, AppResult};
use portcullis_domain::Actor;

use crate::AccountTransaction;

/// Change that takes an actor out of the enabled administrator set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AdminRemoval {
    Disable,
    Delete,
    Demote,
}

impl AdminRemoval {
    fn rejection(self) -> AppError {
        match self {
            Self::Disable => AppError::CantDisableLastAdmin,
            Self::Delete => AppError::CantDeleteLastAdmin,
            Self::Demote => AppError::CantDemoteLastAdmin,
        }
    }
}

/// Fails when removing `actor` would leave the account without an enabled administrator.
///
/// Must run inside the same unit of work as the mutation: the unit holds the
/// account lock, so the count can not change before commit.
pub(crate) async fn ensure_other_enabled_admin(
    transaction: &mut dyn AccountTransaction,
    actor: &Actor,
    removal: AdminRemoval,
) -> AppResult<()> {
    if !actor.is_enabled_admin() {
        return Ok(());
    }

    let enabled_admins = transaction.count_enabled_admins().await?;
    if enabled_admins <= 1 {
        return Err(removal.rejection());
    }

    Ok(())
}
