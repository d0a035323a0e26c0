use std::cmp::Ordering;
use std::collections::BTreeSet;

use chrono::Utc;
use serde_json::Value;

use tenancy_core::{ListParams, ListResult, merge_fields};
use tenancy_docstore::Predicate;

use crate::model::{ACCOUNT_TYPE, Account, Document, GROUP_TYPE, INVITATION_TYPE, field};
use crate::service::membership::Changeset;
use crate::service::{AccessError, AccessService};
use crate::store_impls::{self, Record};

/// Keys no client write may change on an existing document.
const ALWAYS_PROTECTED: &[&str] = &[
    field::ID,
    field::TYPE,
    field::CREATED_AT,
    field::UPDATED_AT,
    field::UPDATED_BY,
];

impl AccessService {
    // ── Reads ──

    /// Get a document the account may read. Anything else is `NotFound`.
    pub async fn find_document(&self, account: &Account, kind: &str, id: &str) -> Result<Value, AccessError> {
        let not_found = || AccessError::NotFound(format!("{}/{}", kind, id));
        let value = self.store.find(id).await?.ok_or_else(not_found)?;
        let doc: Document = store_impls::decode(value.clone())?;
        if !doc.kind.eq_ignore_ascii_case(kind) {
            return Err(not_found());
        }
        let sharing = self.get_sharing_participants(account).await?;
        if !self.can_read(account, &doc, &sharing) {
            tracing::debug!(account = %account.id, document = %id, "read denied");
            return Err(not_found());
        }
        Ok(value)
    }

    /// List the documents of `kind` visible to the account.
    pub async fn list_documents(
        &self,
        account: &Account,
        kind: &str,
        params: &ListParams,
    ) -> Result<ListResult<Value>, AccessError> {
        let sharing = self.get_sharing_participants(account).await?;
        let at = params.valid_at.unwrap_or_else(Utc::now);
        let predicate = self.filter_for(account, kind, &sharing, Some(at));
        let mut items = self.store.query(&predicate).await?;

        if let Some((key, descending)) = params.sort_key() {
            items.sort_by(|a, b| {
                let ord = compare_json(a.get(key), b.get(key));
                if descending { ord.reverse() } else { ord }
            });
        }

        let total = items.len();
        let items = items
            .into_iter()
            .skip(params.offset)
            .take(params.limit.unwrap_or(usize::MAX))
            .collect();
        Ok(ListResult { items, total })
    }

    /// Distinct types of the documents the account owns.
    pub async fn list_owned_types(&self, account: &Account) -> Result<Vec<String>, AccessError> {
        let rows = self
            .store
            .query(&Predicate::eq(field::OWNER, account.id.as_str()))
            .await?;
        let kinds: BTreeSet<String> = rows
            .iter()
            .filter_map(|r| r.get(field::TYPE).and_then(Value::as_str))
            .map(str::to_string)
            .collect();
        Ok(kinds.into_iter().collect())
    }

    // ── Writes ──

    /// Create or update one document on behalf of `account`.
    ///
    /// `path_type` is the type the caller addressed; the body may omit its
    /// own type but must not contradict it.
    pub async fn save_document(
        &self,
        account: &Account,
        input: Value,
        path_type: &str,
    ) -> Result<Value, AccessError> {
        let mut saved = self.save_all(account, vec![(input, path_type.to_string())]).await?;
        saved
            .pop()
            .ok_or_else(|| AccessError::Validation("nothing to save".into()))
    }

    /// Create or update several typed documents in one atomic batch. Any
    /// rejected input fails the whole batch.
    pub async fn save_documents(&self, account: &Account, inputs: Vec<Value>) -> Result<Vec<Value>, AccessError> {
        let inputs = inputs.into_iter().map(|v| (v, String::new())).collect();
        self.save_all(account, inputs).await
    }

    async fn save_all(
        &self,
        account: &Account,
        inputs: Vec<(Value, String)>,
    ) -> Result<Vec<Value>, AccessError> {
        let sharing = self.get_sharing_participants(account).await?;

        let mut docs = Vec::with_capacity(inputs.len());
        for (input, path_type) in inputs {
            docs.push(self.prepare(account, &sharing, input, &path_type).await?);
        }

        let mut pending = Changeset::new();
        for doc in docs.iter().filter(|d| d.kind == GROUP_TYPE) {
            self.apply_membership(doc, false, &mut pending).await?;
        }

        let mut saved = Vec::with_capacity(docs.len());
        for doc in &docs {
            saved.push(Self::encode(doc)?);
        }
        let mut batch = saved.clone();
        batch.extend(self.encode_changed(&mut pending)?);
        self.store.save_batch(batch).await?;

        tracing::info!(account = %account.id, documents = saved.len(), accounts = pending.len(), "documents saved");
        Ok(saved)
    }

    /// Turn client input into the document to store, enforcing type,
    /// ownership, and update permission.
    async fn prepare(
        &self,
        account: &Account,
        sharing: &BTreeSet<String>,
        input: Value,
        path_type: &str,
    ) -> Result<Document, AccessError> {
        if !input.is_object() {
            return Err(AccessError::Validation("document must be a JSON object".into()));
        }

        let path_type = path_type.trim().to_lowercase();
        let body_type = input
            .get(field::TYPE)
            .and_then(Value::as_str)
            .map(|t| t.trim().to_lowercase())
            .unwrap_or_default();
        if !path_type.is_empty() && !body_type.is_empty() && path_type != body_type {
            return Err(AccessError::TypeMismatch {
                expected: path_type,
                found: body_type,
            });
        }
        let kind = if body_type.is_empty() { path_type } else { body_type };
        if kind.is_empty() {
            return Err(AccessError::Validation("document type is not set".into()));
        }

        let id = input
            .get(field::ID)
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .map(str::to_string);

        if let Some(id) = &id {
            if let Some(stored) = self.store.find(id).await? {
                return self.merge_existing(account, sharing, stored, &input, &kind);
            }
        }
        self.create_new(account, sharing, input, &kind)
    }

    fn merge_existing(
        &self,
        account: &Account,
        sharing: &BTreeSet<String>,
        stored: Value,
        input: &Value,
        kind: &str,
    ) -> Result<Document, AccessError> {
        let existing: Document = store_impls::decode(stored.clone())?;
        if existing.kind != kind {
            return Err(AccessError::TypeMismatch {
                expected: kind.to_string(),
                found: existing.kind,
            });
        }
        if !self.can_update(account, &existing, sharing) {
            tracing::debug!(account = %account.id, document = %existing.id, "update denied");
            return Err(AccessError::NotFound(format!("{}/{}", kind, existing.id)));
        }

        let policy = self.config.policy(kind);
        let mut merged = stored;
        let skipped = merge_fields(&mut merged, input, |key| {
            ALWAYS_PROTECTED.contains(&key) || policy.immutable_fields.iter().any(|f| f == key)
        });
        if !skipped.is_empty() {
            tracing::debug!(document = %existing.id, ?skipped, "ignored protected fields");
        }

        let mut doc = Document::from_value(merged)
            .map_err(|e| AccessError::Validation(format!("invalid {}: {}", kind, e)))?;
        if doc.owner != existing.owner && !self.may_assign_owner(account, sharing, &doc.owner) {
            tracing::debug!(document = %existing.id, owner = %doc.owner, "owner change ignored");
            doc.owner = existing.owner;
        }
        doc.updated_by = Some(account.id.clone());
        doc.before_update();
        Ok(doc)
    }

    /// Owners a write may name: the caller or a shared account. Admins may
    /// name anyone, the system owner included.
    fn may_assign_owner(&self, account: &Account, sharing: &BTreeSet<String>, owner: &str) -> bool {
        if account.is_admin() {
            return !owner.is_empty();
        }
        owner == account.id || (owner != self.config.system_owner && sharing.contains(owner))
    }

    fn create_new(
        &self,
        account: &Account,
        sharing: &BTreeSet<String>,
        input: Value,
        kind: &str,
    ) -> Result<Document, AccessError> {
        match kind {
            ACCOUNT_TYPE => {
                return Err(AccessError::InvalidState(
                    "accounts are created on first login".into(),
                ));
            }
            INVITATION_TYPE => {
                return Err(AccessError::InvalidState(
                    "invitations are created by requesting access".into(),
                ));
            }
            GROUP_TYPE if !self.config.can_create_groups(account.role) => {
                return Err(AccessError::InvalidState(format!(
                    "role '{}' cannot create groups",
                    account.role
                )));
            }
            _ => {}
        }

        let mut doc = Document::from_value(input)
            .map_err(|e| AccessError::Validation(format!("invalid {}: {}", kind, e)))?;
        doc.kind = kind.to_string();
        doc.created_at.clear();
        doc.updated_by = Some(account.id.clone());

        if !self.may_assign_owner(account, sharing, &doc.owner) {
            doc.owner = account.id.clone();
        }
        doc.before_create();

        if !self.can_update(account, &doc, sharing) {
            tracing::debug!(account = %account.id, owner = %doc.owner, "create denied");
            return Err(AccessError::NotFound(format!("{}/{}", kind, doc.id)));
        }
        Ok(doc)
    }

    // ── Deletes ──

    /// Delete one document. Missing, mistyped, or not deletable → `NotFound`.
    pub async fn delete_document(&self, account: &Account, kind: &str, id: &str) -> Result<usize, AccessError> {
        let doc = self
            .load::<Document>(id)
            .await?
            .filter(|d| d.kind.eq_ignore_ascii_case(kind))
            .ok_or_else(|| AccessError::NotFound(format!("{}/{}", kind, id)))?;
        self.delete_checked(account, vec![doc]).await
    }

    /// Delete documents by id. Unknown ids are ignored.
    pub async fn delete_documents(&self, account: &Account, ids: &[String]) -> Result<usize, AccessError> {
        let rows = self
            .store
            .query(&Predicate::in_strings(field::ID, ids.iter().cloned()))
            .await?;
        let mut docs = Vec::with_capacity(rows.len());
        for row in rows {
            docs.push(store_impls::decode::<Document>(row)?);
        }
        self.delete_checked(account, docs).await
    }

    /// Delete every document of `kind` the account can see.
    pub async fn delete_all(&self, account: &Account, kind: &str) -> Result<usize, AccessError> {
        let predicate = self.build_filter(account, kind).await?;
        let docs = self.query_as::<Document>(&predicate).await?;
        self.delete_checked(account, docs).await
    }

    /// All-or-nothing: one undeletable document refuses the whole request.
    async fn delete_checked(&self, account: &Account, docs: Vec<Document>) -> Result<usize, AccessError> {
        if docs.is_empty() {
            return Ok(0);
        }
        let sharing = self.get_sharing_participants(account).await?;
        for doc in &docs {
            if doc.kind == ACCOUNT_TYPE {
                return Err(AccessError::InvalidState(format!(
                    "account {} can only be deactivated",
                    doc.id
                )));
            }
            if !self.can_delete(account, doc, &sharing) {
                tracing::debug!(account = %account.id, document = %doc.id, "delete denied");
                return Err(AccessError::NotFound(format!("{}/{}", doc.kind, doc.id)));
            }
        }

        let (groups, others): (Vec<Document>, Vec<Document>) =
            docs.into_iter().partition(|d| d.kind == GROUP_TYPE);
        if !groups.is_empty() {
            self.sync_group_delete(&groups).await?;
        }
        for doc in &others {
            self.store.delete(&doc.id).await?;
        }

        let count = groups.len() + others.len();
        tracing::info!(account = %account.id, count, "documents deleted");
        Ok(count)
    }

    /// Detach every document the account owns (accounts excepted) by
    /// re-owning it to `{id}-archived-{unix_seconds}`. Groups lose the
    /// account as implicit member.
    pub async fn archive_owned(&self, account: &Account) -> Result<usize, AccessError> {
        let predicate = Predicate::And(vec![
            Predicate::eq(field::OWNER, account.id.as_str()),
            Predicate::negate(Predicate::eq(field::TYPE, ACCOUNT_TYPE)),
        ]);
        let mut docs = self.query_as::<Document>(&predicate).await?;
        if docs.is_empty() {
            return Ok(0);
        }

        let archived_owner = format!("{}-archived-{}", account.id, Utc::now().timestamp());
        let mut pending = Changeset::new();
        for doc in docs.iter_mut() {
            doc.owner = archived_owner.clone();
            doc.before_update();
            if doc.kind == GROUP_TYPE {
                self.apply_membership(doc, false, &mut pending).await?;
            }
        }

        let mut batch = Vec::with_capacity(docs.len() + pending.len());
        for doc in &docs {
            batch.push(Self::encode(doc)?);
        }
        batch.extend(self.encode_changed(&mut pending)?);
        self.store.save_batch(batch).await?;

        tracing::info!(account = %account.id, count = docs.len(), "owned documents archived");
        Ok(docs.len())
    }
}

/// Order JSON values for sorting: missing/null first, then numbers,
/// strings, booleans; mixed kinds fall back to their text form.
fn compare_json(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
        (None | Some(Value::Null), _) => Ordering::Less,
        (_, None | Some(Value::Null)) => Ordering::Greater,
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
    }
}
