use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use anyhow::{anyhow, Context};
use axum::{
    http::{HeaderValue, Method, StatusCode},
    routing::{delete, get, get_service, post, put},
    Router,
};
use socialite_api::{AuthToken, Db, Uuid, DEFAULT_MAX_REPLY_DEPTH};
use structopt::StructOpt;
use tower_http::{
    cors::{self, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

mod db;
mod error;
mod extractors;
mod feeds;
mod friends;
mod handlers;
mod locks;
mod messages;
mod notifications;
mod populate;
mod posts;
mod uploads;
mod users;


use error::Error;
use extractors::*;
use feeds::{Broadcast, Feeds};
use locks::{PostLocks, RequestLocks};

pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!();

#[derive(Debug, StructOpt)]
#[structopt(name = "socialite-server", about = "Social network backend")]
struct Opt {
    /// Address to listen on
    #[structopt(long, env = "LISTEN_ADDR", default_value = "127.0.0.1:8080")]
    listen: SocketAddr,

    /// Postgres connection string
    #[structopt(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Keep everything in memory instead of using postgres
    #[structopt(long)]
    in_memory: bool,

    /// Bearer token allowed to call the /api/admin endpoints
    #[structopt(long, env = "ADMIN_TOKEN")]
    admin_token: Option<Uuid>,

    /// Directory where uploaded media is stored
    #[structopt(long, env = "UPLOAD_DIR", default_value = "uploads", parse(from_os_str))]
    upload_dir: PathBuf,

    /// Deepest level a reply may sit at, root comments being at level 0
    #[structopt(long, default_value = "3")]
    max_reply_depth: usize,

    /// Origin allowed to make cross-origin requests
    #[structopt(long, env = "CORS_ORIGIN", default_value = "http://localhost:3000")]
    cors_origin: String,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub admin_token: Option<AuthToken>,
    pub upload_dir: PathBuf,
    pub max_reply_depth: usize,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            admin_token: None,
            upload_dir: PathBuf::from("uploads"),
            max_reply_depth: DEFAULT_MAX_REPLY_DEPTH,
        }
    }
}

/// Everything a service call needs
pub struct Ctx<'a> {
    pub db: &'a dyn Db,
    pub feeds: &'a dyn Broadcast,
    pub locks: &'a PostLocks,
    pub request_locks: &'a RequestLocks,
    pub max_reply_depth: usize,
}

impl AppState {
    pub fn ctx(&self) -> Ctx<'_> {
        Ctx {
            db: &*self.db,
            feeds: &self.feeds,
            locks: &self.locks,
            request_locks: &self.request_locks,
            max_reply_depth: self.config.max_reply_depth,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let opt = Opt::from_args();

    let db: Arc<dyn Db> = match (opt.in_memory, &opt.database_url) {
        (true, _) => {
            tracing::warn!("running with an in-memory store, data will be lost on shutdown");
            Arc::new(socialite_memdb::MemDb::new())
        }
        (false, Some(url)) => {
            let pool = create_sqlx_pool(url)
                .await
                .with_context(|| format!("Error opening database {:?}", url))?;
            MIGRATOR
                .run(&pool)
                .await
                .context("running pending migrations")?;
            Arc::new(db::PgDb::new(pool))
        }
        (false, None) => {
            return Err(anyhow!(
                "either --database-url (or DATABASE_URL) or --in-memory must be set"
            ))
        }
    };

    tokio::fs::create_dir_all(&opt.upload_dir)
        .await
        .with_context(|| format!("creating upload directory {:?}", opt.upload_dir))?;

    let cors = CorsLayer::new()
        .allow_origin(
            opt.cors_origin
                .parse::<HeaderValue>()
                .with_context(|| format!("parsing cors origin {:?}", opt.cors_origin))?,
        )
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(cors::Any);

    let config = Config {
        admin_token: opt.admin_token.map(AuthToken),
        upload_dir: opt.upload_dir,
        max_reply_depth: opt.max_reply_depth,
    };
    let app = app(db, config).layer(cors);

    tracing::info!("listening on {}", opt.listen);
    axum::Server::bind(&opt.listen)
        .serve(app.into_make_service())
        .await
        .context("serving axum webserver")
}

pub async fn create_sqlx_pool(url: &str) -> anyhow::Result<sqlx::PgPool> {
    sqlx::postgres::PgPoolOptions::new()
        .max_connections(8)
        .connect(url)
        .await
        .context("connecting to postgres")
}

pub fn app(db: Arc<dyn Db>, config: Config) -> Router {
    let uploads = get_service(ServeDir::new(&config.upload_dir)).handle_error(
        |err: std::io::Error| async move {
            tracing::error!(?err, "failed serving uploaded file");
            (StatusCode::INTERNAL_SERVER_ERROR, "failed serving file")
        },
    );
    let state = AppState {
        db: DbPool::new(db),
        feeds: Feeds::new(),
        locks: PostLocks::new(),
        request_locks: RequestLocks::new(),
        config,
    };

    use handlers::*;
    Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/whoami", get(whoami))
        .route("/api/admin/create-user", post(admin_create_user))
        .route("/api/admin/users", get(admin_list_users))
        .route("/api/users", get(list_users))
        .route("/api/profile", put(update_profile))
        .route("/api/profile/:id", get(get_profile).delete(delete_user))
        .route("/api/posts", get(list_posts).post(create_post))
        .route("/api/posts/share", post(share_post))
        .route("/api/posts/search", get(search_posts))
        .route("/api/posts/user/:id", get(list_user_posts))
        .route(
            "/api/posts/:id",
            get(get_post).put(update_post).delete(delete_post),
        )
        .route("/api/posts/:id/like", post(like_post))
        .route("/api/posts/:id/comments", post(add_comment))
        .route("/api/posts/:id/comments/:cid", delete(delete_comment))
        .route("/api/posts/:id/comments/:cid/like", post(like_comment))
        .route("/api/comments/:cid", get(get_comment))
        .route("/api/friends", get(list_friends))
        .route("/api/friends/request", post(send_friend_request))
        .route("/api/friends/respond", post(respond_friend_request))
        .route("/api/friends/pending", get(pending_friend_requests))
        .route("/api/friends/suggestions", get(friend_suggestions))
        .route("/api/friends/:id", delete(unfriend))
        .route(
            "/api/notifications",
            get(list_notifications).delete(delete_all_notifications),
        )
        .route("/api/notifications/unread-count", get(unread_notifications))
        .route("/api/notifications/read-all", put(mark_all_notifications_read))
        .route("/api/notifications/:id", delete(delete_notification))
        .route("/api/notifications/:id/read", put(mark_notification_read))
        .route("/api/messages", post(send_message))
        .route("/api/messages/unread", get(unread_messages))
        .route("/api/messages/:id", get(conversation))
        .route("/api/messages/:id/read", put(mark_conversation_read))
        .route("/api/upload", post(upload))
        .route("/api/feed", get(feed))
        .nest_service("/uploads", uploads)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
