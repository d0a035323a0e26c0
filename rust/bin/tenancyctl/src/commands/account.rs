//! Account lifecycle commands.

use anyhow::Result;
use serde_json::Value;

use access::model::{Principal, Role};
use tenancy_docstore::DocumentStore;

use crate::context::Context;

pub async fn provision(
    ctx: &Context,
    id: String,
    email: String,
    name: Option<String>,
    photo: Option<String>,
    role: Option<String>,
) -> Result<Value> {
    let principal = Principal {
        id,
        email: Some(email),
        name,
        photo,
        impersonate: None,
    };
    let mut account = ctx.service.provision(&principal).await?;

    if let Some(role) = role {
        account.role = parse_role(&role)?;
        ctx.service
            .store()
            .save(serde_json::to_value(&account)?)
            .await?;
        tracing::info!(account = %account.id, role = %account.role, "role seeded");
    }
    Ok(serde_json::to_value(&account)?)
}

pub async fn assign_role(ctx: &Context, account_id: &str, role: &str) -> Result<Value> {
    let admin = ctx.account().await?;
    let account = ctx
        .service
        .assign_role(&admin, account_id, parse_role(role)?)
        .await?;
    Ok(serde_json::to_value(&account)?)
}

pub async fn deactivate(ctx: &Context, account_id: &str) -> Result<Value> {
    let admin = ctx.account().await?;
    let account = ctx.service.deactivate_account(&admin, account_id).await?;
    Ok(serde_json::to_value(&account)?)
}

fn parse_role(raw: &str) -> Result<Role> {
    raw.parse::<Role>().map_err(|e| anyhow::anyhow!(e))
}
