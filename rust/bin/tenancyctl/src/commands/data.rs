//! Guarded document commands.

use anyhow::{Context as _, Result};
use serde_json::{Value, json};

use tenancy_core::ListParams;

use crate::context::Context;

pub async fn list(
    ctx: &Context,
    kind: &str,
    limit: Option<usize>,
    offset: usize,
    sort: Option<String>,
) -> Result<Value> {
    let account = ctx.account().await?;
    let params = ListParams {
        limit,
        offset,
        sort,
        valid_at: None,
    };
    let result = ctx.service.list_documents(&account, kind, &params).await?;
    Ok(serde_json::to_value(&result)?)
}

pub async fn types(ctx: &Context) -> Result<Value> {
    let account = ctx.account().await?;
    Ok(json!(ctx.service.list_owned_types(&account).await?))
}

pub async fn save(ctx: &Context, kind: &str, body: &str) -> Result<Value> {
    let account = ctx.account().await?;
    let input: Value = serde_json::from_str(body).context("parse --json body")?;
    Ok(ctx.service.save_document(&account, input, kind).await?)
}

pub async fn delete(ctx: &Context, kind: &str, id: &str) -> Result<Value> {
    let account = ctx.account().await?;
    let count = ctx.service.delete_document(&account, kind, id).await?;
    Ok(json!({ "deleted": count }))
}
