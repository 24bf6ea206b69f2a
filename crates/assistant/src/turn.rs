//! One assistant exchange: ask the model, record the answer, apply changes.

use std::time::Duration;

use serde::Serialize;

use formcraft_core::conversation::{Conversation, Message};
use formcraft_core::schema::SchemaTarget;
use formcraft_core::store::SchemaStore;

use crate::client::{AssistantError, LlmClient};
use crate::parse::{decode_reply, Modifications};
use crate::prompt::build_messages;

pub const COMMUNICATION_FAILED: &str =
    "Sorry, communication with the assistant failed. Please try again.";
pub const UNPROCESSABLE_REPLY: &str =
    "Sorry, I couldn't process the assistant's answer. Please rephrase your request.";
pub const PATCH_WARNING: &str =
    "Some modifications could not be applied because they failed validation.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnStatus {
    Completed,
    UpstreamFailed,
    Unparseable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum PatchOutcome {
    NotRequested,
    Applied { version: u64 },
    Rejected { reason: String },
}

impl PatchOutcome {
    fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TurnOutcome {
    pub status: TurnStatus,
    pub title_changed: bool,
    pub schema: PatchOutcome,
    pub ui_schema: PatchOutcome,
    /// Messages appended to the conversation by this turn, user message first.
    pub appended: Vec<Message>,
}

impl TurnOutcome {
    fn untouched(status: TurnStatus, appended: Vec<Message>) -> Self {
        Self {
            status,
            title_changed: false,
            schema: PatchOutcome::NotRequested,
            ui_schema: PatchOutcome::NotRequested,
            appended,
        }
    }
}

/// Run one chat turn against `store`.
///
/// The title is applied whenever present; the schema and UI schema patches
/// are applied independently, so one failing never undoes the other. Model
/// or parse failures leave the store unchanged and append an explanatory
/// assistant message. A model that has not answered within `limit` counts
/// as a failure. Nothing is retried.
pub async fn run_turn(
    client: &dyn LlmClient,
    conversation: &mut Conversation,
    store: &mut SchemaStore,
    user_message: &str,
    limit: Duration,
) -> TurnOutcome {
    let request = build_messages(conversation.messages(), store, user_message);

    let user = Message::user(user_message);
    conversation.push(user.clone());
    let mut appended = vec![user];

    let answer = tokio::time::timeout(limit, client.complete(&request))
        .await
        .unwrap_or(Err(AssistantError::Timeout(limit)));

    let raw = match answer {
        Ok(raw) => raw,
        Err(e) => {
            tracing::error!(error = %e, "Assistant request failed");
            record(conversation, &mut appended, Message::assistant(COMMUNICATION_FAILED));
            return TurnOutcome::untouched(TurnStatus::UpstreamFailed, appended);
        }
    };

    let reply = match decode_reply(&raw) {
        Ok(reply) => reply,
        Err(e) => {
            tracing::warn!(error = %e, raw_len = raw.len(), "Unparseable assistant reply");
            record(conversation, &mut appended, Message::assistant(UNPROCESSABLE_REPLY));
            return TurnOutcome::untouched(TurnStatus::Unparseable, appended);
        }
    };

    record(conversation, &mut appended, Message::assistant(reply.response.clone()));

    let modifications = reply.modifications.unwrap_or_default();
    let title_changed = apply_title(store, &modifications);
    let schema = apply_target(store, SchemaTarget::Schema, modifications.schema_patch.as_ref());
    let ui_schema = apply_target(store, SchemaTarget::UiSchema, modifications.ui_schema_patch.as_ref());

    if schema.is_rejected() || ui_schema.is_rejected() {
        record(conversation, &mut appended, Message::assistant(PATCH_WARNING));
    }

    tracing::info!(
        title_changed,
        schema = ?schema,
        ui_schema = ?ui_schema,
        version = store.version(),
        "Assistant turn applied",
    );

    TurnOutcome {
        status: TurnStatus::Completed,
        title_changed,
        schema,
        ui_schema,
        appended,
    }
}

fn record(conversation: &mut Conversation, appended: &mut Vec<Message>, message: Message) {
    conversation.push(message.clone());
    appended.push(message);
}

fn apply_title(store: &mut SchemaStore, modifications: &Modifications) -> bool {
    match modifications.title.as_deref().map(str::trim) {
        Some(title) if !title.is_empty() => {
            store.set_title(title);
            true
        }
        _ => false,
    }
}

fn apply_target(
    store: &mut SchemaStore,
    target: SchemaTarget,
    patch: Option<&serde_json::Value>,
) -> PatchOutcome {
    let Some(patch) = patch.filter(|p| !p.is_null()) else {
        return PatchOutcome::NotRequested;
    };
    match store.apply_patch(target, patch) {
        Ok(version) => PatchOutcome::Applied { version },
        Err(e) => {
            tracing::warn!(document = target.as_str(), error = %e, "Assistant patch rejected");
            PatchOutcome::Rejected {
                reason: e.to_string(),
            }
        }
    }
}
