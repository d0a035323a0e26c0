use std::path::PathBuf;

/// Storage and policy locations shared by every binary.
///
/// Binaries fill this from their own argument parsing, then hand the
/// resolved paths to store and policy initialization.
#[derive(Debug, Clone, Default)]
pub struct ServiceConfig {
    /// Base directory for the database and the access policy file.
    pub data_dir: Option<PathBuf>,

    /// Path to the redb document database.
    /// Defaults to `{data_dir}/data.redb` if not specified.
    pub db_path: Option<PathBuf>,

    /// Path to the TOML access policy.
    /// Defaults to `{data_dir}/access.toml` if not specified.
    pub access_config: Option<PathBuf>,
}

impl ServiceConfig {
    /// Resolve the redb database path, falling back to `{data_dir}/data.redb`.
    pub fn resolve_db_path(&self) -> PathBuf {
        self.db_path
            .clone()
            .unwrap_or_else(|| self.resolve_data_subpath("data.redb"))
    }

    /// Resolve the access policy path, falling back to `{data_dir}/access.toml`.
    pub fn resolve_access_config_path(&self) -> PathBuf {
        self.access_config
            .clone()
            .unwrap_or_else(|| self.resolve_data_subpath("access.toml"))
    }

    fn resolve_data_subpath(&self, name: &str) -> PathBuf {
        self.data_dir
            .as_ref()
            .map(|d| d.join(name))
            .unwrap_or_else(|| PathBuf::from(name))
    }
}
