//! In-memory editing sessions.
//!
//! Each session owns one [`SchemaStore`] and one [`Conversation`] for a
//! single survey. Sessions sit behind their own async mutex, so a chat turn
//! and a manual edit on the same session run one after the other while
//! different sessions never block each other. Nothing here is persisted;
//! `save` writes the store back to the survey row explicitly.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tokio::time::Instant;
use uuid::Uuid;

use formcraft_core::conversation::{Conversation, Message};
use formcraft_core::store::{SchemaSnapshot, SchemaStore};
use formcraft_core::types::DbId;
use formcraft_db::models::survey::Survey;

pub struct EditorSession {
    pub owner_id: DbId,
    pub survey_id: DbId,
    pub store: SchemaStore,
    pub conversation: Conversation,
    last_active: Instant,
}

/// What the browser sees of a session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub session_id: Uuid,
    pub survey_id: DbId,
    #[serde(flatten)]
    pub snapshot: SchemaSnapshot,
    pub messages: Vec<Message>,
}

impl EditorSession {
    fn from_survey(survey: &Survey) -> Self {
        Self {
            owner_id: survey.user_id,
            survey_id: survey.id,
            store: SchemaStore::new(
                survey.title.clone(),
                survey.schema_json.clone(),
                survey.ui_schema_json.clone(),
            ),
            conversation: Conversation::with_greeting(),
            last_active: Instant::now(),
        }
    }

    pub fn view(&self, session_id: Uuid) -> SessionView {
        SessionView {
            session_id,
            survey_id: self.survey_id,
            snapshot: self.store.snapshot(),
            messages: self.conversation.messages().to_vec(),
        }
    }
}

/// A locked session together with its id.
pub struct SessionGuard {
    pub id: Uuid,
    pub session: OwnedMutexGuard<EditorSession>,
}

impl SessionGuard {
    pub fn view(&self) -> SessionView {
        self.session.view(self.id)
    }
}

/// Map entry. `survey_id` mirrors the session's own and is readable without
/// taking the session lock.
struct Slot {
    survey_id: DbId,
    session: Arc<Mutex<EditorSession>>,
}

pub struct EditorSessionManager {
    sessions: RwLock<HashMap<Uuid, Slot>>,
    idle_timeout: Duration,
}

impl EditorSessionManager {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            idle_timeout,
        }
    }

    /// Start a session seeded from the survey row and a greeting.
    pub async fn open(&self, survey: &Survey) -> SessionView {
        let id = Uuid::new_v4();
        let session = EditorSession::from_survey(survey);
        let view = session.view(id);
        self.sessions
            .write()
            .await
            .insert(
                id,
                Slot {
                    survey_id: survey.id,
                    session: Arc::new(Mutex::new(session)),
                },
            );
        tracing::info!(session_id = %id, survey_id = survey.id, "Editor session opened");
        view
    }

    /// Lock a session owned by `owner_id` and mark it active.
    ///
    /// Sessions of other users are reported as missing.
    pub async fn acquire(&self, id: Uuid, owner_id: DbId) -> Option<SessionGuard> {
        let entry = self.session_entry(id).await?;
        let mut session = entry.lock_owned().await;
        if session.owner_id != owner_id {
            return None;
        }
        session.last_active = Instant::now();
        Some(SessionGuard { id, session })
    }

    pub async fn close(&self, id: Uuid, owner_id: DbId) -> bool {
        let Some(entry) = self.session_entry(id).await else {
            return false;
        };
        if entry.lock().await.owner_id != owner_id {
            return false;
        }
        let removed = self.sessions.write().await.remove(&id).is_some();
        if removed {
            tracing::info!(session_id = %id, "Editor session closed");
        }
        removed
    }

    /// Drop every session editing `survey_id`, including ones a request
    /// currently holds. Returns how many were closed.
    pub async fn close_for_survey(&self, survey_id: DbId) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, slot| slot.survey_id != survey_id);
        let closed = before - sessions.len();
        if closed > 0 {
            tracing::info!(survey_id, closed, "Editor sessions closed with their survey");
        }
        closed
    }

    /// Close sessions idle longer than the timeout. Sessions currently
    /// locked by a request are active by definition and are kept.
    pub async fn sweep_idle(&self) -> usize {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, slot| match slot.session.try_lock() {
            Ok(session) => now.duration_since(session.last_active) < self.idle_timeout,
            Err(_) => true,
        });
        before - sessions.len()
    }

    async fn session_entry(&self, id: Uuid) -> Option<Arc<Mutex<EditorSession>>> {
        self.sessions
            .read()
            .await
            .get(&id)
            .map(|slot| Arc::clone(&slot.session))
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
