//! Typed repository for material documents.

use std::collections::HashMap;

use tracing::info;

use lectio_models::{Material, MaterialKind, MaterialStatus};

use crate::client::FirestoreClient;
use crate::error::FirestoreResult;
use crate::types::{Document, ToFirestoreValue, Write};

/// Repository for `users/{uid}/materials/{video_id}` documents.
///
/// The document id is the source video id, so "one material per
/// (owner, video)" holds structurally: the idempotency lookup is a
/// point read and the create precondition closes the race.
pub struct MaterialRepository {
    client: FirestoreClient,
    user_id: String,
}

impl MaterialRepository {
    pub fn new(client: FirestoreClient, user_id: impl Into<String>) -> Self {
        Self { client, user_id: user_id.into() }
    }

    fn doc_path(&self, video_id: &str) -> String {
        format!("users/{}/materials/{}", self.user_id, video_id)
    }

    /// Idempotency lookup for the ledger.
    pub async fn get(&self, video_id: &str) -> FirestoreResult<Option<Material>> {
        let doc = self.client.get_document(&self.doc_path(video_id)).await?;
        Ok(doc.map(|d| document_to_material(&self.user_id, video_id, &d)))
    }

    /// Build the guarded create for a ledger commit. Fails the whole
    /// commit if a material for this video already exists.
    pub fn create_write(&self, material: &Material) -> Write {
        info!(
            user_id = %self.user_id,
            video_id = %material.video_id,
            billed_units = material.billed_units,
            "Preparing material create"
        );
        Write::create(
            self.client.document_name(&self.doc_path(&material.video_id)),
            material_to_fields(material),
        )
    }
}

fn material_to_fields(material: &Material) -> HashMap<String, crate::types::Value> {
    let mut fields = HashMap::new();
    fields.insert("owner_id".to_string(), material.owner_id.to_firestore_value());
    fields.insert("video_id".to_string(), material.video_id.to_firestore_value());
    fields.insert("kind".to_string(), material.kind.as_str().to_firestore_value());
    fields.insert("title".to_string(), material.title.to_firestore_value());
    fields.insert(
        "duration_seconds".to_string(),
        material.duration_seconds.to_firestore_value(),
    );
    fields.insert("char_count".to_string(), material.char_count.to_firestore_value());
    fields.insert("input_tokens".to_string(), material.input_tokens.to_firestore_value());
    fields.insert("billed_units".to_string(), material.billed_units.to_firestore_value());
    fields.insert("language".to_string(), material.language.to_firestore_value());
    fields.insert("status".to_string(), material.status.as_str().to_firestore_value());
    fields.insert("created_at".to_string(), material.created_at.to_firestore_value());
    fields
}

fn document_to_material(owner_id: &str, video_id: &str, doc: &Document) -> Material {
    Material {
        material_id: video_id.to_string(),
        owner_id: doc.field::<String>("owner_id").unwrap_or_else(|| owner_id.to_string()),
        video_id: doc.field::<String>("video_id").unwrap_or_else(|| video_id.to_string()),
        kind: doc
            .field::<String>("kind")
            .and_then(|s| MaterialKind::from_str(&s))
            .unwrap_or_default(),
        title: doc.field::<String>("title").unwrap_or_default(),
        duration_seconds: doc.field::<u32>("duration_seconds").unwrap_or(0),
        char_count: doc.field::<u32>("char_count").unwrap_or(0),
        input_tokens: doc.field::<u32>("input_tokens").unwrap_or(0),
        billed_units: doc.field::<u32>("billed_units").unwrap_or(0),
        language: doc.field::<String>("language").unwrap_or_else(|| "en".to_string()),
        status: doc
            .field::<String>("status")
            .and_then(|s| MaterialStatus::from_str(&s))
            .unwrap_or_default(),
        created_at: doc.field("created_at").unwrap_or_else(chrono::Utc::now),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fields_round_trip() {
        let material =
            Material::new_video_transcript("u1", "dQw4w9WgXcQ", "Lecture 1", 600, 9000, 2250, 4, "en");
        let fields = material_to_fields(&material);
        let doc = Document {
            name: None,
            fields: Some(fields),
            create_time: None,
            update_time: None,
        };
        let parsed = document_to_material("u1", "dQw4w9WgXcQ", &doc);
        assert_eq!(parsed.title, "Lecture 1");
        assert_eq!(parsed.duration_seconds, 600);
        assert_eq!(parsed.char_count, 9000);
        assert_eq!(parsed.input_tokens, 2250);
        assert_eq!(parsed.billed_units, 4);
        assert_eq!(parsed.status, MaterialStatus::Ready);
        assert_eq!(parsed.kind, MaterialKind::VideoTranscript);
    }
}
