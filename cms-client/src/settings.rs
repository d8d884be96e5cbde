//! Username form on the account settings page.

use crate::error::CmsClientError;
use crate::model::CurrentUser;
use crate::ui::Notifier;
use crate::UserStore;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tracing::{info, instrument};

pub const MIN_USERNAME_CHARS: usize = 3;
pub const MAX_USERNAME_CHARS: usize = 20;

const UPDATED: &str = "Username updated successfully!";
const UPDATE_FAILED: &str = "Failed to update username";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UsernameError {
    #[error("Username must be at least 3 characters")]
    TooShort,
    #[error("Username must be less than 20 characters")]
    TooLong,
    #[error("Username can only contain letters, numbers, underscores, and hyphens")]
    InvalidCharacters,
}

pub fn validate_username(username: &str) -> Result<(), UsernameError> {
    let len = username.chars().count();
    if len < MIN_USERNAME_CHARS {
        return Err(UsernameError::TooShort);
    }
    if len > MAX_USERNAME_CHARS {
        return Err(UsernameError::TooLong);
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(UsernameError::InvalidCharacters);
    }
    Ok(())
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error(transparent)]
    Invalid(#[from] UsernameError),
    #[error("an update is already in progress")]
    Busy,
    #[error(transparent)]
    Remote(#[from] CmsClientError),
}

pub struct SettingsController {
    users: Arc<dyn UserStore>,
    notifier: Arc<dyn Notifier>,
    submitting: AtomicBool,
}

/// Clears the in-flight flag however the submit ends.
struct Submitting<'a>(&'a AtomicBool);

impl Drop for Submitting<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl SettingsController {
    pub fn new(users: Arc<dyn UserStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            users,
            notifier,
            submitting: AtomicBool::new(false),
        }
    }

    /// Current username for the form, empty when none is set yet.
    pub async fn load(&self) -> Result<String, CmsClientError> {
        let user = self.users.current_user().await?;
        Ok(user.username.unwrap_or_default())
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting.load(Ordering::SeqCst)
    }

    #[instrument(skip(self))]
    pub async fn submit(&self, username: &str) -> Result<CurrentUser, SettingsError> {
        if let Err(err) = validate_username(username) {
            self.notifier.error(&err.to_string());
            return Err(err.into());
        }
        if self
            .submitting
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(SettingsError::Busy);
        }
        let _submitting = Submitting(&self.submitting);

        match self.users.update_username(username).await {
            Ok(user) => {
                info!(user_id = %user.id, "username updated");
                self.notifier.success(UPDATED);
                Ok(user)
            }
            Err(err) => {
                let message = err.message().unwrap_or_else(|| UPDATE_FAILED.to_string());
                self.notifier.error(&message);
                Err(err.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tokio::sync::{Notify, Semaphore};
    use uuid::Uuid;

    struct FakeUsers {
        username: Mutex<Option<String>>,
        taken: Vec<&'static str>,
        started: Notify,
        release: Option<Semaphore>,
        updates: Mutex<usize>,
    }

    impl FakeUsers {
        fn new(username: Option<&str>) -> Self {
            Self {
                username: Mutex::new(username.map(str::to_string)),
                taken: vec!["taken"],
                started: Notify::new(),
                release: None,
                updates: Mutex::new(0),
            }
        }

        fn user(&self) -> CurrentUser {
            CurrentUser {
                id: Uuid::nil(),
                email: "me@x.io".into(),
                username: self.username.lock().unwrap().clone(),
            }
        }
    }

    #[async_trait]
    impl UserStore for FakeUsers {
        async fn current_user(&self) -> Result<CurrentUser, CmsClientError> {
            Ok(self.user())
        }

        async fn update_username(&self, username: &str) -> Result<CurrentUser, CmsClientError> {
            *self.updates.lock().unwrap() += 1;
            self.started.notify_one();
            if let Some(release) = &self.release {
                release.acquire().await.unwrap().forget();
            }
            if self.taken.contains(&username) {
                return Err(CmsClientError::Conflict("Username already taken".into()));
            }
            *self.username.lock().unwrap() = Some(username.to_string());
            Ok(self.user())
        }
    }

    #[derive(Default)]
    struct Toasts(Mutex<Vec<String>>);

    impl Notifier for Toasts {
        fn success(&self, message: &str) {
            self.0.lock().unwrap().push(format!("ok: {message}"));
        }

        fn error(&self, message: &str) {
            self.0.lock().unwrap().push(format!("error: {message}"));
        }
    }

    fn controller(users: FakeUsers) -> (SettingsController, Arc<FakeUsers>, Arc<Toasts>) {
        let users = Arc::new(users);
        let toasts = Arc::new(Toasts::default());
        let ctl = SettingsController::new(users.clone(), toasts.clone());
        (ctl, users, toasts)
    }

    #[test]
    fn username_rules() {
        assert_eq!(validate_username("ab"), Err(UsernameError::TooShort));
        assert_eq!(
            validate_username(&"a".repeat(21)),
            Err(UsernameError::TooLong)
        );
        assert_eq!(
            validate_username("has space"),
            Err(UsernameError::InvalidCharacters)
        );
        assert_eq!(validate_username("ok_name-1"), Ok(()));
    }

    #[tokio::test]
    async fn load_seeds_empty_string_without_username() {
        let (ctl, _, _) = controller(FakeUsers::new(None));
        assert_eq!(ctl.load().await.unwrap(), "");

        let (ctl, _, _) = controller(FakeUsers::new(Some("writer")));
        assert_eq!(ctl.load().await.unwrap(), "writer");
    }

    #[tokio::test]
    async fn submit_reports_each_outcome() {
        let (ctl, users, toasts) = controller(FakeUsers::new(None));

        let err = ctl.submit("x!").await.unwrap_err();
        assert!(matches!(err, SettingsError::Invalid(UsernameError::TooShort)));
        assert_eq!(*users.updates.lock().unwrap(), 0);

        ctl.submit("taken").await.unwrap_err();
        let user = ctl.submit("fresh_name").await.unwrap();
        assert_eq!(user.username.as_deref(), Some("fresh_name"));
        assert!(!ctl.is_submitting());

        assert_eq!(
            *toasts.0.lock().unwrap(),
            vec![
                "error: Username must be at least 3 characters".to_string(),
                "error: Username already taken".to_string(),
                "ok: Username updated successfully!".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn overlapping_submit_is_rejected() {
        let mut users = FakeUsers::new(None);
        users.release = Some(Semaphore::new(0));
        let (ctl, users, _) = controller(users);
        let ctl = Arc::new(ctl);

        let first = tokio::spawn({
            let ctl = ctl.clone();
            async move { ctl.submit("first").await }
        });
        users.started.notified().await;
        assert!(ctl.is_submitting());
        assert!(matches!(
            ctl.submit("second").await,
            Err(SettingsError::Busy)
        ));

        users.release.as_ref().unwrap().add_permits(1);
        first.await.unwrap().unwrap();
        assert!(!ctl.is_submitting());
        assert_eq!(*users.updates.lock().unwrap(), 1);
    }
}
