use serde::{Deserialize, Serialize};
use voyagr_model::{ConversationId, TranscriptEntry};

// ------------------------------
// Types received from the server
// ------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct OpenConversationResponse {
    pub conversation_id: ConversationId,
}

// ------------------------
// Types sent to the server
// ------------------------

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TranscriptUpload<'a> {
    pub conversation_id: &'a ConversationId,
    pub transcript: &'a [TranscriptEntry],
}
