use std::env;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use diesel::prelude::*;
use uuid::Uuid;

use trip_planner::{
    auth::password,
    config::AppConfig,
    db::{self, PgPool},
    models::NewUser,
    schema::{refresh_tokens, users},
};

const USAGE: &str = "Usage:
  maintenance migrate
  maintenance create-user <username> <password> [user|admin|demo]
  maintenance prune-refresh-tokens";

const ROLES: &[&str] = &["user", "admin", "demo"];

fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let args: Vec<String> = env::args().skip(1).collect();
    let result = match args.first().map(String::as_str) {
        Some("migrate") => migrate(),
        Some("create-user") => match &args[1..] {
            [username, password] => create_user(username, password, "user"),
            [username, password, role] => create_user(username, password, role),
            _ => usage_error(),
        },
        Some("prune-refresh-tokens") => prune_refresh_tokens(),
        Some(cmd) => {
            eprintln!("Unknown command: {cmd}");
            usage_error()
        }
        None => usage_error(),
    };

    if let Err(err) = &result {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
    Ok(())
}

fn usage_error() -> Result<()> {
    eprintln!("{USAGE}");
    std::process::exit(2);
}

fn connect() -> Result<PgPool> {
    let config = AppConfig::from_env()?;
    tracing::info!(
        component = "maintenance",
        database_url = %config.redacted_database_url(),
        "loaded trip planner configuration"
    );
    db::init_pool(&config.database_url)
}

fn migrate() -> Result<()> {
    let pool = connect()?;
    let mut conn = pool.get().context("failed to get database connection")?;
    let applied = db::run_migrations(&mut conn)?;
    println!("Applied {applied} migration(s).");
    Ok(())
}

fn create_user(username: &str, plain_password: &str, role: &str) -> Result<()> {
    let username = username.trim();
    if username.is_empty() {
        bail!("username must not be empty");
    }
    if plain_password.len() < 8 {
        bail!("password must be at least 8 characters");
    }
    if !ROLES.contains(&role) {
        bail!("role must be one of: {}", ROLES.join(", "));
    }

    let pool = connect()?;
    let mut conn = pool.get().context("failed to get database connection")?;
    let password_hash = password::hash_password(plain_password)?;

    let id: Uuid = diesel::insert_into(users::table)
        .values(&NewUser {
            id: Uuid::new_v4(),
            username: username.to_string(),
            email: None,
            display_name: None,
            password_hash: Some(password_hash),
            open_id: None,
            role: role.to_string(),
        })
        .returning(users::id)
        .get_result(&mut conn)
        .with_context(|| format!("failed to create user {username}"))?;

    println!("Created {role} {username} ({id}).");
    Ok(())
}

fn prune_refresh_tokens() -> Result<()> {
    let pool = connect()?;
    let mut conn = pool.get().context("failed to get database connection")?;
    let now = Utc::now().naive_utc();

    let removed = diesel::delete(
        refresh_tokens::table.filter(
            refresh_tokens::expires_at
                .le(now)
                .or(refresh_tokens::revoked_at.is_not_null()),
        ),
    )
    .execute(&mut conn)
    .context("failed to prune refresh tokens")?;

    println!("Removed {removed} refresh token(s).");
    Ok(())
}
