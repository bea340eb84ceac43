//! Single-record operations on users and statuses
//!
//! A status may only be created for an existing user and only updated by its
//! owner. Deleting a user also deletes every status it owns. The two
//! collections are not updated atomically: if the status step of a cascade
//! fails, the user is already gone and the caller gets
//! [`StatusbookError::CascadeIncomplete`].

use statusbook_common::models::{from_document, to_document};
use statusbook_common::{Result, Status, StatusbookError, StoreError, User};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::store::{Collection, Filter};

/// Field of a status document that references its owner
const OWNER_FIELD: &str = "user_id";

/// Result of a write that reached the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Applied,
    /// A record with the same id already exists
    AlreadyExists,
    NotFound,
    /// The referenced user does not exist
    OwnerNotFound,
    /// The status belongs to a different user
    OwnerMismatch,
}

impl WriteOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, WriteOutcome::Applied)
    }
}

impl fmt::Display for WriteOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            WriteOutcome::Applied => "applied",
            WriteOutcome::AlreadyExists => "already exists",
            WriteOutcome::NotFound => "not found",
            WriteOutcome::OwnerNotFound => "owner not found",
            WriteOutcome::OwnerMismatch => "owner mismatch",
        };
        f.write_str(text)
    }
}

/// CRUD over the user and status collections
#[derive(Clone)]
pub struct RecordService {
    users: Arc<dyn Collection>,
    statuses: Arc<dyn Collection>,
}

impl RecordService {
    pub fn new(users: Arc<dyn Collection>, statuses: Arc<dyn Collection>) -> Self {
        Self { users, statuses }
    }

    pub async fn add_user(&self, user: &User) -> Result<WriteOutcome> {
        let outcome = insert(self.users.as_ref(), to_document(user)?).await?;
        debug!(user_id = %user.user_id, %outcome, "add_user");
        Ok(outcome)
    }

    /// Replace every field of an existing user
    pub async fn update_user(&self, user: &User) -> Result<WriteOutcome> {
        let result = self.users.update_one(&user.user_id, to_document(user)?).await?;
        if result.matched == 0 {
            debug!(user_id = %user.user_id, "update_user: no such user");
            return Ok(WriteOutcome::NotFound);
        }
        Ok(WriteOutcome::Applied)
    }

    /// Delete a user and every status it owns
    pub async fn delete_user(&self, user_id: &str) -> Result<WriteOutcome> {
        if self.users.delete_one(user_id).await? == 0 {
            debug!(user_id, "delete_user: no such user");
            return Ok(WriteOutcome::NotFound);
        }

        match self.statuses.delete_many(&Filter::field_eq(OWNER_FIELD, user_id)).await {
            Ok(removed) => {
                info!(user_id, statuses_removed = removed, "Deleted user");
                Ok(WriteOutcome::Applied)
            }
            Err(source) => {
                error!(
                    user_id,
                    error = %source,
                    "User deleted but their statuses were not; they may now be orphaned"
                );
                Err(StatusbookError::CascadeIncomplete {
                    user_id: user_id.to_string(),
                    source,
                })
            }
        }
    }

    pub async fn search_user(&self, user_id: &str) -> Result<Option<User>> {
        find(self.users.as_ref(), user_id).await
    }

    /// Create a status for an existing user
    pub async fn add_status(&self, status: &Status) -> Result<WriteOutcome> {
        if self.users.find_one(&status.user_id).await?.is_none() {
            warn!(status_id = %status.status_id, user_id = %status.user_id, "add_status: owner does not exist");
            return Ok(WriteOutcome::OwnerNotFound);
        }

        let outcome = insert(self.statuses.as_ref(), to_document(status)?).await?;
        debug!(status_id = %status.status_id, %outcome, "add_status");
        Ok(outcome)
    }

    /// Replace the text of a status owned by `status.user_id`
    pub async fn update_status(&self, status: &Status) -> Result<WriteOutcome> {
        let Some(stored) = find::<Status>(self.statuses.as_ref(), &status.status_id).await? else {
            return Ok(WriteOutcome::NotFound);
        };

        if stored.user_id != status.user_id {
            warn!(
                status_id = %status.status_id,
                owner = %stored.user_id,
                requested_by = %status.user_id,
                "update_status: owner mismatch"
            );
            return Ok(WriteOutcome::OwnerMismatch);
        }

        let result = self.statuses.update_one(&status.status_id, to_document(status)?).await?;
        if result.matched == 0 {
            // Deleted between the lookup and the update
            return Ok(WriteOutcome::NotFound);
        }
        Ok(WriteOutcome::Applied)
    }

    pub async fn delete_status(&self, status_id: &str) -> Result<WriteOutcome> {
        if self.statuses.delete_one(status_id).await? == 0 {
            return Ok(WriteOutcome::NotFound);
        }
        Ok(WriteOutcome::Applied)
    }

    pub async fn search_status(&self, status_id: &str) -> Result<Option<Status>> {
        find(self.statuses.as_ref(), status_id).await
    }
}

async fn insert(collection: &dyn Collection, doc: statusbook_common::Document) -> Result<WriteOutcome> {
    match collection.insert_one(doc).await {
        Ok(()) => Ok(WriteOutcome::Applied),
        Err(StoreError::DuplicateKey { .. }) => Ok(WriteOutcome::AlreadyExists),
        Err(e) => Err(e.into()),
    }
}

async fn find<T: serde::de::DeserializeOwned>(collection: &dyn Collection, id: &str) -> Result<Option<T>> {
    match collection.find_one(id).await? {
        Some(doc) => Ok(Some(from_document(doc)?)),
        None => Ok(None),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::store::MemoryCollection;

    fn service() -> RecordService {
        RecordService::new(
            Arc::new(MemoryCollection::new("users")),
            Arc::new(MemoryCollection::new("statuses")),
        )
    }

    fn sesame() -> User {
        User::new("SC", "sesame@uw.edu", "Sesame", "Chan")
    }

    #[tokio::test]
    async fn test_add_user_twice() {
        let service = service();
        assert_eq!(service.add_user(&sesame()).await.unwrap(), WriteOutcome::Applied);
        assert_eq!(service.add_user(&sesame()).await.unwrap(), WriteOutcome::AlreadyExists);
    }

    #[tokio::test]
    async fn test_update_and_search_user() {
        let service = service();
        let mut user = sesame();
        assert_eq!(service.update_user(&user).await.unwrap(), WriteOutcome::NotFound);

        service.add_user(&user).await.unwrap();
        user.user_email = "chan@uw.edu".into();
        assert!(service.update_user(&user).await.unwrap().is_applied());
        assert_eq!(service.search_user("SC").await.unwrap(), Some(user));
        assert_eq!(service.search_user("nobody").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_status_lifecycle() {
        let service = service();
        service.add_user(&sesame()).await.unwrap();

        let status = Status::new("SC1", "SC", "Meow");
        assert!(service.add_status(&status).await.unwrap().is_applied());
        assert_eq!(service.add_status(&status).await.unwrap(), WriteOutcome::AlreadyExists);

        let edited = Status::new("SC1", "SC", "Purr");
        assert!(service.update_status(&edited).await.unwrap().is_applied());
        assert_eq!(service.search_status("SC1").await.unwrap(), Some(edited));

        assert!(service.delete_status("SC1").await.unwrap().is_applied());
        assert_eq!(service.delete_status("SC1").await.unwrap(), WriteOutcome::NotFound);
        assert_eq!(
            service.update_status(&status).await.unwrap(),
            WriteOutcome::NotFound
        );
    }

    #[tokio::test]
    async fn test_delete_missing_user() {
        assert_eq!(service().delete_user("ghost").await.unwrap(), WriteOutcome::NotFound);
    }

    #[test]
    fn test_outcome_display() {
        assert_eq!(WriteOutcome::OwnerMismatch.to_string(), "owner mismatch");
        assert!(!WriteOutcome::NotFound.is_applied());
    }
}
