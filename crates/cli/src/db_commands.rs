use {clap::Subcommand, std::path::PathBuf, warden_config::WardenConfig};

#[derive(Subcommand)]
pub enum DbAction {
    /// Delete the database file completely (default SQLite location only).
    Reset,
    /// Clear all data from tables but keep the schema intact.
    Clear,
    /// Run all pending database migrations.
    Migrate,
}

/// Path of the default database file.
fn db_path() -> PathBuf {
    warden_config::data_dir().join("warden.db")
}

pub async fn handle_db(action: DbAction) -> anyhow::Result<()> {
    let config = warden_config::discover_and_load();
    match action {
        DbAction::Reset => reset_database(&config),
        DbAction::Clear => clear_database(&config).await,
        DbAction::Migrate => run_migrations(&config).await,
    }
}

/// Delete the database file and its WAL/SHM siblings.
fn reset_database(config: &WardenConfig) -> anyhow::Result<()> {
    if let Some(url) = &config.database.url {
        anyhow::bail!("database.url is set ({url}); reset only handles the default database file");
    }

    let mut deleted = false;
    for path in sidecar_paths(&db_path()) {
        if path.exists() {
            std::fs::remove_file(&path)?;
            println!("Deleted: {}", path.display());
            deleted = true;
        }
    }

    if deleted {
        println!("Database deleted. Run `warden db migrate` to recreate it.");
    } else {
        println!("No database file found.");
    }
    Ok(())
}

fn sidecar_paths(base: &std::path::Path) -> Vec<PathBuf> {
    ["", "-wal", "-shm"]
        .iter()
        .map(|suffix| {
            let mut name = base.as_os_str().to_owned();
            name.push(suffix);
            PathBuf::from(name)
        })
        .collect()
}

/// Clear all data from tables but keep the schema intact.
async fn clear_database(config: &WardenConfig) -> anyhow::Result<()> {
    if config.database.url.is_none() && !db_path().exists() {
        println!("Database not found: {}", db_path().display());
        return Ok(());
    }
    let pool = warden_gateway::state::connect_pool(config).await?;

    // Children before parents (auth_sessions references users).
    for table in ["auth_sessions", "api_keys", "users"] {
        let query = format!("DELETE FROM {table}");
        if let Err(e) = sqlx::query(&query).execute(&pool).await {
            // Table might not exist if migrations haven't run
            eprintln!("Warning: could not clear {table}: {e}");
        } else {
            println!("Cleared table: {table}");
        }
    }

    pool.close().await;
    println!("Database cleared.");
    Ok(())
}

/// Run all pending database migrations.
async fn run_migrations(config: &WardenConfig) -> anyhow::Result<()> {
    println!("Running migrations...");
    let pool = warden_gateway::state::connect_pool(config).await?;
    warden_auth::run_migrations(&pool)
        .await
        .map_err(|e| anyhow::anyhow!("auth migrations failed: {e}"))?;
    pool.close().await;
    println!("All migrations complete.");
    Ok(())
}
