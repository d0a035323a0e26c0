//! `tenancyctl`: operator CLI for the tenancy access core.
//!
//! Works directly on a local redb document store. Every command that acts
//! on behalf of a user takes `--as <email>`; output is JSON on stdout.

mod commands;
mod context;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use tenancy_core::ServiceConfig;

/// Tenancy access-control CLI.
#[derive(Parser, Debug)]
#[command(name = "tenancyctl", about = "Tenancy access-control CLI")]
struct Cli {
    /// Base directory for data.redb and access.toml.
    #[arg(long = "data-dir", global = true)]
    data_dir: Option<PathBuf>,

    /// Path to the redb database (default: {data-dir}/data.redb).
    #[arg(long = "db", global = true)]
    db: Option<PathBuf>,

    /// Path to the access policy TOML (default: {data-dir}/access.toml).
    #[arg(long = "config", global = true)]
    config: Option<PathBuf>,

    /// Email of the acting account.
    #[arg(long = "as", global = true)]
    acting: Option<String>,

    /// Email to impersonate (admins only).
    #[arg(long = "impersonate", global = true)]
    impersonate: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Record a login: create the account on first sight, refresh it otherwise.
    Provision {
        /// Identity provider subject id.
        #[arg(long)]
        id: String,
        #[arg(long)]
        email: String,
        /// Display name ("First Last").
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        photo: Option<String>,
        /// Seed a role directly (operator bootstrap, e.g. the first admin).
        #[arg(long)]
        role: Option<String>,
    },

    /// Show the acting account's sharing set.
    Sharing,

    /// Evaluate the acting account's permission tier on a document.
    Check {
        /// Document id.
        id: String,
    },

    /// Print the store predicate used to list a type.
    Filter {
        /// Document type.
        kind: String,
        /// Include invalidated entities (admins only).
        #[arg(long)]
        lifecycle: bool,
    },

    /// List visible documents of a type.
    List {
        kind: String,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long, default_value_t = 0)]
        offset: usize,
        /// Sort field, optionally followed by " desc".
        #[arg(long)]
        sort: Option<String>,
    },

    /// List the types of documents the acting account owns.
    Types,

    /// Create or update a document from JSON.
    Save {
        kind: String,
        /// JSON body.
        #[arg(long = "json")]
        json_body: String,
    },

    /// Delete a document.
    Delete { kind: String, id: String },

    /// Request access to another account's data.
    Request { email: String },

    /// Accept a pending request from an inviter.
    Accept {
        /// Inviter account id.
        inviter: String,
    },

    /// Reject, cancel, or unshare (account id or email).
    Reject { target: String },

    /// Show incoming and outgoing invitations.
    Invitations,

    /// Change an account's role (admins only).
    #[command(name = "assign-role")]
    AssignRole { account: String, role: String },

    /// Soft-delete an account (admins only).
    Deactivate { account: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = ServiceConfig {
        data_dir: cli.data_dir.clone(),
        db_path: cli.db.clone(),
        access_config: cli.config.clone(),
    };
    let ctx = context::Context::open(&config, cli.acting.clone(), cli.impersonate.clone())?;

    let output = match cli.command {
        Commands::Provision {
            id,
            email,
            name,
            photo,
            role,
        } => commands::account::provision(&ctx, id, email, name, photo, role).await?,
        Commands::Sharing => commands::sharing::sharing(&ctx).await?,
        Commands::Check { id } => commands::sharing::check(&ctx, &id).await?,
        Commands::Filter { kind, lifecycle } => {
            commands::sharing::filter(&ctx, &kind, lifecycle).await?
        }
        Commands::List {
            kind,
            limit,
            offset,
            sort,
        } => commands::data::list(&ctx, &kind, limit, offset, sort).await?,
        Commands::Types => commands::data::types(&ctx).await?,
        Commands::Save { kind, json_body } => commands::data::save(&ctx, &kind, &json_body).await?,
        Commands::Delete { kind, id } => commands::data::delete(&ctx, &kind, &id).await?,
        Commands::Request { email } => commands::sharing::request(&ctx, &email).await?,
        Commands::Accept { inviter } => commands::sharing::accept(&ctx, &inviter).await?,
        Commands::Reject { target } => commands::sharing::reject(&ctx, &target).await?,
        Commands::Invitations => commands::sharing::invitations(&ctx).await?,
        Commands::AssignRole { account, role } => {
            commands::account::assign_role(&ctx, &account, &role).await?
        }
        Commands::Deactivate { account } => commands::account::deactivate(&ctx, &account).await?,
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "tenancyctl",
            "list",
            "task",
            "--as",
            "alice@example.com",
            "--data-dir",
            "/tmp/t",
            "--limit",
            "5",
        ])
        .unwrap();
        assert_eq!(cli.acting.as_deref(), Some("alice@example.com"));
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/t")));
        assert!(matches!(cli.command, Commands::List { limit: Some(5), .. }));
    }
}
