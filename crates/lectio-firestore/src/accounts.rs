//! Typed repository for user account documents.

use std::collections::HashMap;

use chrono::Utc;

use lectio_models::{PlanTier, UserAccount};

use crate::client::FirestoreClient;
use crate::error::{FirestoreError, FirestoreResult};
use crate::types::{Document, ToFirestoreValue, Write};

/// An account document together with its server-side update time,
/// which guards conditional writes against concurrent debits.
#[derive(Debug, Clone)]
pub struct AccountSnapshot {
    pub account: UserAccount,
    pub update_time: String,
}

/// Repository for `users/{uid}` documents.
///
/// The gateway only ever reads accounts and conditionally decrements
/// the token balance inside a ledger commit; account creation and plan
/// changes belong to the account subsystem.
pub struct AccountRepository {
    client: FirestoreClient,
}

impl AccountRepository {
    pub fn new(client: FirestoreClient) -> Self {
        Self { client }
    }

    fn doc_path(uid: &str) -> String {
        format!("users/{}", uid)
    }

    /// Fetch an account. `Ok(None)` when the user document is missing.
    pub async fn get(&self, uid: &str) -> FirestoreResult<Option<AccountSnapshot>> {
        let doc = self.client.get_document(&Self::doc_path(uid)).await?;
        match doc {
            Some(d) => Ok(Some(document_to_snapshot(uid, &d)?)),
            None => Ok(None),
        }
    }

    /// Build the conditional debit write for a ledger commit: decrement
    /// the balance, bump the monthly counter, stamp the usage month.
    ///
    /// The write carries the snapshot's update time as a precondition,
    /// so it fails cleanly if any other writer touched the account
    /// after the in-transaction read.
    pub fn debit_write(
        &self,
        snapshot: &AccountSnapshot,
        new_balance: i64,
        new_materials_this_month: u32,
        month_key: &str,
    ) -> Write {
        let mut fields = HashMap::new();
        fields.insert("token_balance".to_string(), new_balance.to_firestore_value());
        fields.insert(
            "materials_this_month".to_string(),
            new_materials_this_month.to_firestore_value(),
        );
        fields.insert("usage_reset_month".to_string(), month_key.to_firestore_value());
        fields.insert("updated_at".to_string(), Utc::now().to_firestore_value());

        Write::patch_with_update_time(
            self.client.document_name(&Self::doc_path(&snapshot.account.uid)),
            fields,
            vec![
                "token_balance".to_string(),
                "materials_this_month".to_string(),
                "usage_reset_month".to_string(),
                "updated_at".to_string(),
            ],
            snapshot.update_time.clone(),
        )
    }
}

fn document_to_snapshot(uid: &str, doc: &Document) -> FirestoreResult<AccountSnapshot> {
    let update_time = doc
        .update_time
        .clone()
        .ok_or_else(|| FirestoreError::invalid_response("account document missing updateTime"))?;

    let account = UserAccount {
        uid: uid.to_string(),
        tier: doc
            .field::<String>("tier")
            .map(|s| PlanTier::from_str(&s))
            .unwrap_or_default(),
        token_balance: doc.field::<i64>("token_balance").unwrap_or(0),
        materials_this_month: doc.field::<u32>("materials_this_month").unwrap_or(0),
        usage_reset_month: doc.field::<String>("usage_reset_month"),
        is_admin: doc.field::<bool>("is_admin").unwrap_or(false),
        updated_at: doc.field("updated_at"),
    };

    Ok(AccountSnapshot { account, update_time })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Value;

    fn doc(balance: i64, tier: &str) -> Document {
        let mut fields = HashMap::new();
        fields.insert("token_balance".to_string(), balance.to_firestore_value());
        fields.insert("tier".to_string(), tier.to_firestore_value());
        fields.insert("materials_this_month".to_string(), 3u32.to_firestore_value());
        fields.insert(
            "usage_reset_month".to_string(),
            "2025-01".to_firestore_value(),
        );
        Document {
            name: None,
            fields: Some(fields),
            create_time: None,
            update_time: Some("2025-01-05T00:00:00Z".to_string()),
        }
    }

    #[test]
    fn test_document_to_snapshot() {
        let snapshot = document_to_snapshot("u1", &doc(17, "student")).unwrap();
        assert_eq!(snapshot.account.uid, "u1");
        assert_eq!(snapshot.account.token_balance, 17);
        assert_eq!(snapshot.account.tier, PlanTier::Student);
        assert_eq!(snapshot.account.materials_this_month, 3);
        assert_eq!(snapshot.update_time, "2025-01-05T00:00:00Z");
    }

    #[test]
    fn test_missing_update_time_is_invalid() {
        let mut d = doc(1, "free");
        d.update_time = None;
        assert!(document_to_snapshot("u1", &d).is_err());
    }

    #[test]
    fn test_defaults_for_sparse_documents() {
        let d = Document {
            name: None,
            fields: Some(HashMap::new()),
            create_time: None,
            update_time: Some("2025-01-05T00:00:00Z".to_string()),
        };
        let snapshot = document_to_snapshot("u1", &d).unwrap();
        assert_eq!(snapshot.account.tier, PlanTier::Free);
        assert_eq!(snapshot.account.token_balance, 0);
        assert!(!snapshot.account.is_admin);
    }

    #[test]
    fn test_unknown_tier_falls_back_to_free() {
        let mut fields = HashMap::new();
        fields.insert("tier".to_string(), Value::StringValue("platinum".to_string()));
        let d = Document {
            name: None,
            fields: Some(fields),
            create_time: None,
            update_time: Some("t".to_string()),
        };
        let snapshot = document_to_snapshot("u1", &d).unwrap();
        assert_eq!(snapshot.account.tier, PlanTier::Free);
    }
}
