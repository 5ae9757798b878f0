#![deny(warnings)]

use persistence::default_sqlite_url;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let url = std::env::var("CASCADE_DATABASE_URL").unwrap_or_else(|_| default_sqlite_url().to_string());
    let pool = persistence::init_db(&url).await?;
    let observations = persistence::count_observations(&pool, i32::MIN, None).await?;
    let results = persistence::count_results(&pool).await?;
    println!(
        "DB migrated at {} | observations: {} | results: {}",
        url, observations, results
    );
    Ok(())
}
