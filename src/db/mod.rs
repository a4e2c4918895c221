//! Database module for SQLite persistence.
//!
//! One table, `objects`, holds every donated object.

mod repository;

pub use repository::*;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

/// Initialize the database connection pool and run migrations.
pub async fn init_database(db_path: &Path) -> Result<SqlitePool, sqlx::Error> {
    // Ensure the parent directory exists
    if let Some(parent) = db_path.parent() {
        tokio::fs::create_dir_all(parent).await.ok();
    }

    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

    let options = SqliteConnectOptions::from_str(&db_url)?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        .busy_timeout(std::time::Duration::from_secs(30));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

/// Run database migrations.
async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS objects (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            category TEXT NOT NULL DEFAULT 'outros' CHECK (category IN (
                'sofa', 'cadeira', 'armario', 'geladeira',
                'mesa', 'cama', 'eletrodomestico', 'outros'
            )),
            description TEXT NOT NULL CHECK (length(description) <= 500),
            item_condition TEXT NOT NULL DEFAULT 'usado' CHECK (item_condition IN (
                'novo', 'seminovo', 'usado', 'precisa_reparo'
            )),
            location_city TEXT NOT NULL,
            location_city_key TEXT NOT NULL,
            location_neighborhood TEXT NOT NULL,
            donor_name TEXT NOT NULL,
            donor_phone TEXT NOT NULL,
            donor_email TEXT NOT NULL,
            available INTEGER NOT NULL DEFAULT 1,
            donation_date TEXT NOT NULL,
            images TEXT NOT NULL DEFAULT '[]',
            dimensions_width REAL,
            dimensions_height REAL,
            dimensions_depth REAL,
            dimensions_unit TEXT CHECK (dimensions_unit IS NULL OR dimensions_unit IN ('cm', 'm')),
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes for common queries
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_objects_category_available ON objects(category, available);
        CREATE INDEX IF NOT EXISTS idx_objects_city ON objects(location_city);
        CREATE INDEX IF NOT EXISTS idx_objects_donation_date ON objects(donation_date DESC);
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
