//! Delete the face database named by the facedb configuration.

use anyhow::Result;
use facedb_cli::config::Config;
use facedb_store::{delete_if_exists, DeleteOutcome};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::load()?;
    let path = &config.db_path;

    match delete_if_exists(path)? {
        DeleteOutcome::Deleted => println!("Database '{}' deleted successfully.", path.display()),
        DeleteOutcome::NotFound => println!("Database file '{}' does not exist.", path.display()),
    }
    Ok(())
}
