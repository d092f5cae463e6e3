use actix_cors::Cors;
use actix_web::{middleware::Compress, web, App, HttpServer};
use std::sync::Arc;
use tracing::{info, Level};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi; // bring trait into scope for ApiDoc::openapi()
use utoipa_swagger_ui::SwaggerUi;

use devflow::config::{validate_env_vars, AppConfig};
use devflow::jobs::JobBoard;
use devflow::openapi::ApiDoc;
use devflow::repo::Repo;
use devflow::routes::{config as api_routes, AppState};

async fn build_repo(cfg: &AppConfig) -> anyhow::Result<Arc<dyn Repo>> {
    #[cfg(feature = "mongo-store")]
    if let Some(url) = cfg.mongodb_url.as_deref() {
        let repo = devflow::repo::mongo::MongoRepo::connect(url, &cfg.mongodb_db).await?;
        info!(db = %cfg.mongodb_db, "Using MongoDB repository backend");
        return Ok(Arc::new(repo));
    }

    #[cfg(feature = "inmem-store")]
    let repo = devflow::repo::inmem::InMemRepo::in_dir(&cfg.data_dir);
    #[cfg(feature = "inmem-store")]
    info!(dir = %cfg.data_dir.display(), "Using in-memory repository backend");
    #[cfg(feature = "inmem-store")]
    return Ok(Arc::new(repo));

    #[cfg(not(feature = "inmem-store"))]
    anyhow::bail!("no repository backend: enable `inmem-store` or set MONGODB_URL with `mongo-store`");
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load .env automatically only in debug builds to reduce manual setup overhead.
    if cfg!(debug_assertions) {
        let _ = dotenv::dotenv();
    }

    validate_env_vars();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    info!("Bootstrapping devflow server");
    let cfg = AppConfig::from_env();
    info!("Frontend URL: {}", cfg.frontend_url);
    info!("Identity webhook configured: {}", cfg.webhook_secret.is_some());

    let state = AppState {
        repo: build_repo(&cfg).await?,
        jobs: Arc::new(JobBoard::new(cfg.content_dir.clone())),
        webhook_secret: cfg.webhook_secret.clone(),
    };
    let openapi = ApiDoc::openapi();
    let frontend_url = cfg.frontend_url.clone();

    let server = HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin("http://localhost:3000")
            .allowed_origin("http://127.0.0.1:3000")
            .allowed_origin(&frontend_url)
            .allow_any_header()
            .allowed_methods(["GET", "POST", "PATCH", "DELETE", "OPTIONS"])
            .supports_credentials()
            .max_age(3600);

        App::new()
            .wrap(TracingLogger::default())
            .wrap(Compress::default())
            .wrap(cors)
            .app_data(web::Data::new(state.clone()))
            .configure(api_routes)
            .service(SwaggerUi::new("/docs").url("/docs/openapi.json", openapi.clone()))
    })
    .bind((cfg.bind_addr.as_str(), cfg.port))?;

    info!("Listening on http://{}:{}", cfg.bind_addr, cfg.port);

    server.run().await?;
    Ok(())
}
