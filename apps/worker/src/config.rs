use std::env;
use std::path::PathBuf;

use portcullis_application::DeletionThreshold;
use portcullis_core::{AccountId, AppError, AppResult};
use portcullis_domain::ProviderId;
use portcullis_infrastructure::DEFAULT_NOTIFICATION_BUS_CAPACITY;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct WorkerConfig {
    pub(crate) database_url: String,
    pub(crate) database_max_connections: u32,
    pub(crate) account_id: AccountId,
    pub(crate) provider_id: ProviderId,
    pub(crate) roster_path: PathBuf,
    pub(crate) deletion_threshold: DeletionThreshold,
    pub(crate) notification_bus_capacity: usize,
}

impl WorkerConfig {
    pub(crate) fn from_env() -> AppResult<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        let required = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
                .ok_or_else(|| AppError::Validation(format!("{name} is required")))
        };

        let database_url = required("DATABASE_URL")?;
        let account_id =
            AccountId::from_uuid(parse_uuid("SYNC_ACCOUNT_ID", &required("SYNC_ACCOUNT_ID")?)?);
        let provider_id =
            ProviderId::from_uuid(parse_uuid("SYNC_PROVIDER_ID", &required("SYNC_PROVIDER_ID")?)?);
        let roster_path = PathBuf::from(required("SYNC_ROSTER_PATH")?);

        let database_max_connections = parse_or_default(
            lookup("DATABASE_MAX_CONNECTIONS"),
            "DATABASE_MAX_CONNECTIONS",
            5_u32,
        )?;
        let notification_bus_capacity = parse_or_default(
            lookup("NOTIFICATION_BUS_CAPACITY"),
            "NOTIFICATION_BUS_CAPACITY",
            DEFAULT_NOTIFICATION_BUS_CAPACITY,
        )?;
        let deletion_threshold = match lookup("SYNC_DELETION_THRESHOLD") {
            Some(value) => DeletionThreshold::parse(value.as_str())?,
            None => DeletionThreshold::default(),
        };

        if database_max_connections == 0 {
            return Err(AppError::Validation(
                "DATABASE_MAX_CONNECTIONS must be greater than zero".to_owned(),
            ));
        }

        if notification_bus_capacity == 0 {
            return Err(AppError::Validation(
                "NOTIFICATION_BUS_CAPACITY must be greater than zero".to_owned(),
            ));
        }

        Ok(Self {
            database_url,
            database_max_connections,
            account_id,
            provider_id,
            roster_path,
            deletion_threshold,
            notification_bus_capacity,
        })
    }
}

fn parse_uuid(name: &str, value: &str) -> AppResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|error| AppError::Validation(format!("{name} must be a UUID: {error}")))
}

fn parse_or_default<T>(value: Option<String>, name: &str, default: T) -> AppResult<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        Some(value) => value.trim().parse::<T>().map_err(|error| {
            AppError::Validation(format!("{name} must be a valid number: {error}"))
        }),
        None => Ok(default),
    }
}
