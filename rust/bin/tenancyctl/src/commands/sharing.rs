//! Sharing, permission, and invitation commands.

use anyhow::Result;
use serde_json::{Value, json};

use crate::context::Context;

pub async fn sharing(ctx: &Context) -> Result<Value> {
    let account = ctx.account().await?;
    let sharing = ctx.service.get_sharing_participants(&account).await?;
    Ok(json!({ "account": account.id, "sharing": sharing }))
}

pub async fn check(ctx: &Context, id: &str) -> Result<Value> {
    let account = ctx.account().await?;
    let tier = ctx.service.check(&account, id).await?;
    Ok(json!({ "account": account.id, "document": id, "tier": tier }))
}

pub async fn filter(ctx: &Context, kind: &str, lifecycle: bool) -> Result<Value> {
    let account = ctx.account().await?;
    let predicate = if lifecycle {
        ctx.service.build_lifecycle_filter(&account, kind).await?
    } else {
        ctx.service.build_filter(&account, kind).await?
    };
    Ok(serde_json::to_value(&predicate)?)
}

pub async fn request(ctx: &Context, email: &str) -> Result<Value> {
    let account = ctx.account().await?;
    let invitation = ctx.service.request_access(&account, email).await?;
    Ok(serde_json::to_value(&invitation)?)
}

pub async fn accept(ctx: &Context, inviter: &str) -> Result<Value> {
    let account = ctx.account().await?;
    let updated = ctx.service.accept_access(&account, inviter).await?;
    Ok(json!({ "account": updated.id, "participants": updated.participant_ids() }))
}

pub async fn reject(ctx: &Context, target: &str) -> Result<Value> {
    let account = ctx.account().await?;
    ctx.service.reject_access(&account, target).await?;
    Ok(json!(true))
}

pub async fn invitations(ctx: &Context) -> Result<Value> {
    let account = ctx.account().await?;
    let list = ctx.service.list_invitations(&account).await?;
    Ok(serde_json::to_value(&list)?)
}
