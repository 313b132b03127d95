use std::path::PathBuf;
use std::process::ExitCode;

use foodgram_sdk::loader::{load_ingredients, load_tags};
use foodgram_sdk::pool::{run_migrations, setup_pool};

/// Seeds the tags and ingredients reference tables from `<data dir>/tags.json`
/// and `<data dir>/ingredients.json`. The two loads are independent: both are
/// attempted, and the command fails if either did.
#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();

    let database_url = match std::env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            log::error!("DATABASE_URL is not set");
            return ExitCode::FAILURE;
        }
    };

    let pool = match setup_pool(&database_url).await {
        Ok(pool) => pool,
        Err(e) => {
            log::error!("Failed to connect to the database: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = run_migrations(&pool).await {
        log::error!("Failed to run migrations: {e}");
        return ExitCode::FAILURE;
    }

    let data_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("data"));

    let mut failed = false;
    if let Err(e) = load_ingredients(&data_dir.join("ingredients.json"), &pool).await {
        log::error!("Ingredients load failed: {e}");
        failed = true;
    }
    if let Err(e) = load_tags(&data_dir.join("tags.json"), &pool).await {
        log::error!("Tags load failed: {e}");
        failed = true;
    }

    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
