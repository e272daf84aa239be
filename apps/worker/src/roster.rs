use std::collections::HashMap;
use std::fs;
use std::path::Path;

use portcullis_application::{GroupRecord, MembershipRecord};
use portcullis_core::{AppError, AppResult};
use portcullis_domain::ActorId;
use serde::Deserialize;

/// Normalized directory snapshot handed over by the identity-provider collaborator.
#[derive(Debug, Deserialize)]
pub(crate) struct Roster {
    #[serde(default)]
    pub(crate) groups: Vec<GroupRecord>,
    #[serde(default)]
    pub(crate) memberships: Vec<MembershipRecord>,
    /// External actor identifier to local actor.
    #[serde(default)]
    pub(crate) actors: HashMap<String, ActorId>,
}

impl Roster {
    pub(crate) fn load(path: &Path) -> AppResult<Self> {
        let contents = fs::read_to_string(path).map_err(|error| {
            AppError::Validation(format!("failed to read roster '{}': {error}", path.display()))
        })?;

        Self::parse(contents.as_str())
    }

    fn parse(contents: &str) -> AppResult<Self> {
        serde_json::from_str(contents)
            .map_err(|error| AppError::Validation(format!("invalid roster: {error}")))
    }
}
