use std::sync::Arc;

use posts_server::application::post_service::PostService;
use posts_server::data::memory::InMemoryPostRepository;
use posts_server::data::post_repository::{PostRepository, PostgresPostRepository};
use posts_server::infrastructure::config::AppConfig;
use posts_server::infrastructure::database::{create_pool, run_migrations};
use posts_server::infrastructure::file_store::LocalFileStore;
use posts_server::infrastructure::logging::init_logging;
use posts_server::utils::start_server;
use tracing::{info, warn};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let config = AppConfig::from_env()?;

    let post_repo: Arc<dyn PostRepository> = match &config.database_url {
        Some(url) => {
            let pool = create_pool(url).await?;
            run_migrations(&pool).await?;
            Arc::new(PostgresPostRepository::new(pool))
        }
        None => {
            warn!("DATABASE_URL not set, posts are kept in memory and lost on restart");
            Arc::new(InMemoryPostRepository::new())
        }
    };

    info!(root = %config.storage_root.display(), "storing images on local disk");
    let file_store = Arc::new(LocalFileStore::new(config.storage_root.clone()));

    let post_service = PostService::new(post_repo, file_store);
    start_server(config, post_service).await
}
