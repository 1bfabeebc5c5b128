use std::{
    fs::OpenOptions,
    net::SocketAddr,
    sync::{Arc, PoisonError},
    time::Duration,
};

use axum::{
    Router,
    extract::{MatchedPath, Request},
    middleware,
};
use axum_server::Handle;
use clap::{Parser, ValueEnum};
use rusqlite::Connection;
use time::OffsetDateTime;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{Layer, filter, layer::SubscriberExt, util::SubscriberInitExt};

use finance_manager::{
    AppState, AuthConfig, LogMailer, PasswordHash, TokenKeys, build_router, graceful_shutdown,
    logging_middleware, parse_duration, prune_expired_tokens,
};

/// How often expired tokens are deleted.
const HOUSEKEEPING_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum AppEnv {
    Development,
    Production,
}

/// The REST API server for finance_manager.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to the application SQLite database.
    #[arg(long, env = "DB_PATH")]
    db_path: String,

    /// The port to serve the API from.
    #[arg(short, long, env = "PORT", default_value_t = 3000)]
    port: u16,

    /// The secret used to encrypt cookies.
    #[arg(long, env = "SECRET", hide_env_values = true)]
    secret: String,

    /// The secret used to sign access tokens.
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    jwt_secret: String,

    /// The secret used to sign refresh tokens.
    #[arg(long, env = "JWT_REFRESH_SECRET", hide_env_values = true)]
    jwt_refresh_secret: String,

    /// How long access tokens are valid for, e.g. "15m".
    #[arg(long, env = "JWT_EXPIRES_IN", default_value = "15m", value_parser = parse_duration)]
    jwt_expires_in: time::Duration,

    /// How long refresh tokens are valid for, e.g. "7d".
    #[arg(long, env = "JWT_REFRESH_EXPIRES_IN", default_value = "7d", value_parser = parse_duration)]
    jwt_refresh_expires_in: time::Duration,

    /// The URL of the frontend, used in password reset links.
    #[arg(long, env = "FRONTEND_URL", default_value = "http://localhost:3002")]
    frontend_url: String,

    /// Production makes the refresh token cookie HTTPS only.
    #[arg(long, env = "APP_ENV", value_enum, default_value_t = AppEnv::Development)]
    app_env: AppEnv,
}

#[tokio::main]
async fn main() {
    setup_logging();

    let args = Args::parse();

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));

    let conn = Connection::open(&args.db_path).unwrap_or_else(|error| {
        panic!("Could not open the database at {}: {error}", args.db_path)
    });

    let auth_config = AuthConfig {
        access_token_ttl: args.jwt_expires_in,
        refresh_token_ttl: args.jwt_refresh_expires_in,
        password_hash_cost: PasswordHash::DEFAULT_COST,
        frontend_url: args.frontend_url,
        secure_cookies: args.app_env == AppEnv::Production,
        ..AuthConfig::default()
    };

    let state = AppState::new(
        conn,
        &args.secret,
        TokenKeys::new(&args.jwt_secret, &args.jwt_refresh_secret),
        auth_config,
        Arc::new(LogMailer),
    )
    .expect("Could not initialize the database");

    tokio::spawn(run_housekeeping(state.clone()));

    let handle = Handle::new();
    tokio::spawn(graceful_shutdown(handle.clone()));

    let router = build_router(state).layer(middleware::from_fn(logging_middleware));
    let router = add_tracing_layer(router);

    tracing::info!("HTTP server listening on {}", addr);
    axum_server::bind(addr)
        .handle(handle)
        .serve(router.into_make_service())
        .await
        .unwrap();
}

/// Delete expired tokens once every [HOUSEKEEPING_INTERVAL].
async fn run_housekeeping(state: AppState) {
    let mut interval = tokio::time::interval(HOUSEKEEPING_INTERVAL);

    loop {
        interval.tick().await;

        let connection = state
            .db_connection
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let Err(error) =
            prune_expired_tokens(&connection, &state.blacklist, OffsetDateTime::now_utc())
        {
            tracing::error!("Could not prune expired tokens: {error}");
        }
    }
}

fn setup_logging() {
    let stdout_log = tracing_subscriber::fmt::layer().pretty();

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open("debug.log")
        .expect("Could not create log file");

    let debug_log = tracing_subscriber::fmt::layer()
        .pretty()
        .with_writer(Arc::new(log_file));

    tracing_subscriber::registry()
        .with(
            stdout_log
                .with_filter(filter::LevelFilter::INFO)
                .and_then(debug_log)
                .with_filter(filter::LevelFilter::DEBUG),
        )
        .init();
}

fn add_tracing_layer(router: Router) -> Router {
    let tracing_layer = TraceLayer::new_for_http()
        .make_span_with(|req: &Request| {
            let method = req.method();
            let uri = req.uri();

            let matched_path = req
                .extensions()
                .get::<MatchedPath>()
                .map(|matched_path| matched_path.as_str());

            tracing::debug_span!("request", %method, %uri, matched_path)
        })
        // By default, `TraceLayer` will log 5xx responses but we're doing our specific
        // logging of errors so disable that
        .on_failure(());

    router.layer(tracing_layer)
}
