//! The post editor: one working copy, one in-flight write at a time, and a
//! background autosave while a new post is being written.

mod draft;

pub use draft::{
    Field, LOCAL_INPUT_FORMAT, MAX_TAGS, MAX_TITLE_CHARS, ValidationError, WorkingCopy,
    parse_local_input, to_local_input,
};

use crate::error::CmsClientError;
use crate::model::{Post, PostStatus};
use crate::ui::{Navigator, Notifier, POSTS_ROUTE};
use crate::PostStore;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

pub const DEFAULT_AUTOSAVE_INTERVAL: Duration = Duration::from_secs(30);

const SAVE_FAILED: &str = "Failed to save post";

#[derive(Debug, Clone)]
pub struct EditorConfig {
    pub autosave_interval: Duration,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            autosave_interval: DEFAULT_AUTOSAVE_INTERVAL,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorMode {
    Create,
    Edit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveAction {
    Draft,
    Publish,
    Schedule,
}

impl SaveAction {
    /// Status to persist given what the store last reported. A published
    /// post never goes back to draft and cannot be scheduled. A silent draft
    /// save keeps a scheduled post scheduled.
    fn target_status(
        self,
        current: Option<PostStatus>,
        silent: bool,
    ) -> Result<PostStatus, ValidationError> {
        match (self, current) {
            (SaveAction::Publish, _) => Ok(PostStatus::Published),
            (SaveAction::Schedule, Some(PostStatus::Published)) => {
                Err(ValidationError::AlreadyPublished)
            }
            (SaveAction::Schedule, _) => Ok(PostStatus::Scheduled),
            (SaveAction::Draft, Some(PostStatus::Published)) => Ok(PostStatus::Published),
            (SaveAction::Draft, Some(PostStatus::Scheduled)) if silent => {
                Ok(PostStatus::Scheduled)
            }
            (SaveAction::Draft, _) => Ok(PostStatus::Draft),
        }
    }

    fn success_message(self) -> &'static str {
        match self {
            SaveAction::Publish => "Post published!",
            SaveAction::Draft | SaveAction::Schedule => "Draft saved!",
        }
    }
}

#[derive(Debug, Error)]
pub enum SaveError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Remote(#[from] CmsClientError),
    #[error("editor closed before the save finished")]
    Unmounted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutosaveOutcome {
    Saved(Uuid),
    /// Nothing typed yet, or not a new post.
    Skipped,
    /// Another write was in flight; this tick was dropped.
    Busy,
    Failed,
}

/// Collaborators the editor talks to.
#[derive(Clone)]
pub struct EditorContext {
    pub store: Arc<dyn PostStore>,
    pub notifier: Arc<dyn Notifier>,
    pub navigator: Arc<dyn Navigator>,
}

struct EditorState {
    copy: WorkingCopy,
    post_id: Option<Uuid>,
    status: Option<PostStatus>,
}

struct EditorInner {
    ctx: EditorContext,
    mode: EditorMode,
    state: Mutex<EditorState>,
    write_lock: tokio::sync::Mutex<()>,
    mounted: AtomicBool,
    autosave: Mutex<Option<JoinHandle<()>>>,
}

pub struct PostEditor {
    inner: Arc<EditorInner>,
}

impl PostEditor {
    /// Mounts an editor. In create mode the autosave task starts right away
    /// and runs until [`PostEditor::unmount`] or drop; it needs a tokio runtime.
    pub fn mount(
        mode: EditorMode,
        initial: Option<&Post>,
        ctx: EditorContext,
        config: EditorConfig,
    ) -> Self {
        let state = EditorState {
            copy: initial.map(WorkingCopy::from_post).unwrap_or_default(),
            post_id: initial.map(|p| p.id),
            status: initial.map(|p| p.status),
        };
        let inner = Arc::new(EditorInner {
            ctx,
            mode,
            state: Mutex::new(state),
            write_lock: tokio::sync::Mutex::new(()),
            mounted: AtomicBool::new(true),
            autosave: Mutex::new(None),
        });

        if mode == EditorMode::Create {
            let handle = spawn_autosave(Arc::downgrade(&inner), config.autosave_interval);
            *lock(&inner.autosave) = Some(handle);
        }

        debug!(?mode, post_id = ?inner.state().post_id, "editor mounted");
        Self { inner }
    }

    pub fn mode(&self) -> EditorMode {
        self.inner.mode
    }

    pub fn post_id(&self) -> Option<Uuid> {
        self.inner.state().post_id
    }

    pub fn working_copy(&self) -> WorkingCopy {
        self.inner.state().copy.clone()
    }

    pub fn is_persisting(&self) -> bool {
        self.inner.write_lock.try_lock().is_err()
    }

    pub fn is_mounted(&self) -> bool {
        self.inner.is_mounted()
    }

    /// Local edit only; checked when saving.
    pub fn update_field(&self, field: Field) {
        self.inner.state().copy.apply(field);
    }

    /// Waits for any in-flight write, then performs this one.
    pub async fn save(&self, action: SaveAction, silent: bool) -> Result<Uuid, SaveError> {
        let _write = self.inner.write_lock.lock().await;
        self.inner.persist(action, silent).await
    }

    pub async fn schedule(&self) -> Result<Uuid, SaveError> {
        let unscheduled = self.inner.state().copy.scheduled_for.is_empty();
        if unscheduled {
            let err = ValidationError::MissingSchedule;
            self.inner.ctx.notifier.error(&err.to_string());
            return Err(err.into());
        }
        self.save(SaveAction::Schedule, false).await
    }

    pub async fn autosave_tick(&self) -> AutosaveOutcome {
        self.inner.autosave_tick().await
    }

    /// Stops autosave. A write still in flight completes at the store but its
    /// result is not applied here.
    pub fn unmount(&self) {
        if self.inner.mounted.swap(false, Ordering::SeqCst) {
            if let Some(handle) = lock(&self.inner.autosave).take() {
                handle.abort();
            }
            debug!(post_id = ?self.post_id(), "editor unmounted");
        }
    }
}

impl Drop for PostEditor {
    fn drop(&mut self) {
        self.unmount();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn spawn_autosave(inner: Weak<EditorInner>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let Some(inner) = inner.upgrade() else { break };
            if !inner.is_mounted() {
                break;
            }
            inner.autosave_tick().await;
        }
    })
}

impl EditorInner {
    fn state(&self) -> MutexGuard<'_, EditorState> {
        lock(&self.state)
    }

    fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::SeqCst)
    }

    async fn autosave_tick(&self) -> AutosaveOutcome {
        let blank = self.state().copy.is_blank();
        if self.mode != EditorMode::Create || blank {
            return AutosaveOutcome::Skipped;
        }
        let Ok(_write) = self.write_lock.try_lock() else {
            debug!("write in flight, autosave tick dropped");
            return AutosaveOutcome::Busy;
        };
        match self.persist(SaveAction::Draft, true).await {
            Ok(id) => AutosaveOutcome::Saved(id),
            Err(_) => AutosaveOutcome::Failed,
        }
    }

    /// Caller holds `write_lock`.
    #[instrument(skip(self), fields(mode = ?self.mode))]
    async fn persist(&self, action: SaveAction, silent: bool) -> Result<Uuid, SaveError> {
        if !self.is_mounted() {
            return Err(SaveError::Unmounted);
        }

        let prepared = {
            let state = self.state();
            action
                .target_status(state.status, silent)
                .and_then(|status| state.copy.to_payload(status))
                .map(|payload| (payload, state.post_id))
        };
        let (payload, target) = match prepared {
            Ok(prepared) => prepared,
            Err(err) => {
                if silent {
                    debug!(error = %err, "autosave skipped invalid draft");
                } else {
                    self.ctx.notifier.error(&err.to_string());
                }
                return Err(err.into());
            }
        };

        let result = match target {
            Some(id) => self.ctx.store.update_post(id, &payload).await,
            None => self.ctx.store.create_post(&payload).await,
        };

        if !self.is_mounted() {
            debug!(ok = result.is_ok(), "editor gone, discarding save result");
            return Err(SaveError::Unmounted);
        }

        match result {
            Ok(post) => {
                {
                    let mut state = self.state();
                    state.post_id = Some(post.id);
                    state.status = Some(post.status);
                }
                info!(post_id = %post.id, status = %post.status, silent, "post saved");
                if !silent {
                    self.ctx.notifier.success(action.success_message());
                    if action == SaveAction::Publish {
                        self.ctx.navigator.push(POSTS_ROUTE);
                    }
                }
                Ok(post.id)
            }
            Err(err) => {
                if silent {
                    warn!(post_id = ?target, error = %err, "autosave failed");
                } else {
                    let message = err.message().unwrap_or_else(|| SAVE_FAILED.to_string());
                    self.ctx.notifier.error(&message);
                }
                Err(err.into())
            }
        }
    }
}
