use crate::commands::Out;
use crate::error::{ErrorType, IntoResult};
use crate::{Config, Result};
use anyhow::Context;
use std::path::Path;

/// Creates the data directory, its backups directory, an initial `config.json` with default
/// settings and an empty database.
///
/// # Arguments
/// - `budget_home` - The directory that will be the root of the data directory, e.g.
///   `$HOME/budget`
///
/// # Errors
/// - Returns an error if any file operations fail or the directory already holds a database.
pub async fn init(budget_home: &Path) -> Result<Out<()>> {
    let config = Config::create(budget_home)
        .await
        .context("Unable to create the data directory and configs")
        .pub_result(ErrorType::Config)?;
    Ok(format!(
        "Successfully created the budget directory at {}",
        config.root().display()
    )
    .into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_init_twice() {
        let dir = TempDir::new().unwrap();
        let home = dir.path().join("budget");
        let out = init(&home).await.unwrap();
        assert!(out.message().starts_with("Successfully created"));
        assert!(Config::load(&home).await.is_ok());

        let err = init(&home).await.unwrap_err();
        assert_eq!(crate::error::error_type(&err), Some(ErrorType::Config));
    }
}
