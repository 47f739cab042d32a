// haven/server/src/bin/haven_admin.rs

//! Operator commands: schema migrations, package seeding and account fixes.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use haven_server::catalogue::DEFAULT_PACKAGES;
use haven_server::config::LogFormat;
use haven_server::gating;
use haven_server::models::{Listing, Package, Role, SubscriptionStatus, User};
use haven_server::services::auth;
use haven_server::{db, seo, telemetry};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "haven-admin")]
#[command(about = "Administrative tasks for the Haven marketplace")]
struct Cli {
  /// Postgres connection string
  #[arg(long, env = "DATABASE_URL")]
  database_url: String,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Apply pending schema migrations
  Migrate,

  /// Insert or refresh the default package catalogue
  SeedPackages,

  /// Create an account directly, bypassing email verification if asked
  CreateUser {
    #[arg(long)]
    email: String,
    #[arg(long)]
    password: String,
    #[arg(long, default_value = "Haven User")]
    name: String,
    #[arg(long, default_value = "USER")]
    role: Role,
    /// Package name for the role, e.g. "Professional"
    #[arg(long)]
    package: Option<String>,
    #[arg(long)]
    verified: bool,
  },

  /// Attach a package to an existing account without going through Stripe
  SetPackage {
    #[arg(long)]
    email: String,
    #[arg(long)]
    package: String,
  },

  /// Print accounts, optionally for one role
  ListUsers {
    #[arg(long)]
    role: Option<Role>,
  },

  /// Recompute meta descriptions for every listing
  RegenerateSeo,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  let cli = Cli::parse();
  telemetry::init_tracing(LogFormat::Pretty);

  let pool = db::connect_url(&cli.database_url, 2).await.context("connecting to the database")?;
  match cli.command {
    Command::Migrate => db::run_migrations(&pool).await?,
    Command::SeedPackages => seed_packages(&pool).await?,
    Command::CreateUser { email, password, name, role, package, verified } => {
      create_user(&pool, &email, &password, &name, role, package.as_deref(), verified).await?
    }
    Command::SetPackage { email, package } => set_package(&pool, &email, &package).await?,
    Command::ListUsers { role } => list_users(&pool, role).await?,
    Command::RegenerateSeo => regenerate_seo(&pool).await?,
  }
  Ok(())
}

async fn seed_packages(pool: &PgPool) -> anyhow::Result<()> {
  for seed in DEFAULT_PACKAGES {
    let features: Vec<String> = seed.features.iter().map(|f| f.to_string()).collect();
    sqlx::query(
      "INSERT INTO packages (id, name, role, price_cents, listings_max, featured_max, features, sort_order)
       VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
       ON CONFLICT (role, name) DO UPDATE SET
         price_cents = EXCLUDED.price_cents,
         listings_max = EXCLUDED.listings_max,
         featured_max = EXCLUDED.featured_max,
         features = EXCLUDED.features,
         sort_order = EXCLUDED.sort_order,
         is_active = TRUE",
    )
    .bind(Uuid::new_v4())
    .bind(seed.name)
    .bind(seed.role)
    .bind(seed.price_cents)
    .bind(seed.listings_max)
    .bind(seed.featured_max)
    .bind(&features)
    .bind(seed.sort_order)
    .execute(pool)
    .await
    .with_context(|| format!("seeding {} {}", seed.role, seed.name))?;
  }
  info!(count = DEFAULT_PACKAGES.len(), "Package catalogue seeded.");
  Ok(())
}

async fn resolve_package(pool: &PgPool, role: Role, name: &str) -> anyhow::Result<Package> {
  let package = Package::find_by_name(pool, role, name)
    .await?
    .with_context(|| format!("no {} package named '{}' (run seed-packages first?)", role, name))?;
  if !gating::package_assignable(role, &package) {
    bail!("package '{}' is inactive", package.name);
  }
  Ok(package)
}

/// Manually granted paid packages count as active subscriptions.
fn granted_status(package: &Package) -> SubscriptionStatus {
  if package.is_free() {
    SubscriptionStatus::Inactive
  } else {
    SubscriptionStatus::Active
  }
}

async fn create_user(
  pool: &PgPool,
  email: &str,
  password: &str,
  name: &str,
  role: Role,
  package: Option<&str>,
  verified: bool,
) -> anyhow::Result<()> {
  let email = email.trim().to_lowercase();
  if User::find_by_email(pool, &email).await?.is_some() {
    bail!("an account for {} already exists", email);
  }
  let package = match package {
    Some(name) => Some(resolve_package(pool, role, name).await?),
    None => None,
  };
  let password_hash = auth::hash_password(password)?;

  let user = sqlx::query_as::<_, User>(
    "INSERT INTO users (id, email, password_hash, name, role, email_verified, package_id, subscription_status)
     VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
     RETURNING *",
  )
  .bind(Uuid::new_v4())
  .bind(&email)
  .bind(&password_hash)
  .bind(name.trim())
  .bind(role)
  .bind(verified)
  .bind(package.as_ref().map(|p| p.id))
  .bind(package.as_ref().map(granted_status).unwrap_or(SubscriptionStatus::Inactive))
  .fetch_one(pool)
  .await?;

  println!("created {} ({}) id={}", user.email, user.role, user.id);
  Ok(())
}

async fn set_package(pool: &PgPool, email: &str, package_name: &str) -> anyhow::Result<()> {
  let user = User::find_by_email(pool, email)
    .await?
    .with_context(|| format!("no account for {}", email))?;
  let package = resolve_package(pool, user.role, package_name).await?;

  sqlx::query("UPDATE users SET package_id = $2, subscription_status = $3, updated_at = NOW() WHERE id = $1")
    .bind(user.id)
    .bind(package.id)
    .bind(granted_status(&package))
    .execute(pool)
    .await?;
  println!("{} now on {} {}", user.email, package.role, package.name);
  Ok(())
}

async fn list_users(pool: &PgPool, role: Option<Role>) -> anyhow::Result<()> {
  let users = sqlx::query_as::<_, User>(
    "SELECT * FROM users WHERE ($1::user_role IS NULL OR role = $1) ORDER BY created_at",
  )
  .bind(role)
  .fetch_all(pool)
  .await?;

  println!("{:<38} {:<32} {:<7} {:<9} {}", "id", "email", "role", "verified", "subscription");
  for u in &users {
    println!(
      "{:<38} {:<32} {:<7} {:<9} {:?}",
      u.id, u.email, u.role, u.email_verified, u.subscription_status
    );
  }
  println!("{} account(s)", users.len());
  Ok(())
}

async fn regenerate_seo(pool: &PgPool) -> anyhow::Result<()> {
  let listings = sqlx::query_as::<_, Listing>("SELECT * FROM listings ORDER BY created_at").fetch_all(pool).await?;
  let mut changed = 0usize;
  for listing in &listings {
    let meta = seo::meta_description(listing);
    if meta == listing.meta_description {
      continue;
    }
    sqlx::query("UPDATE listings SET meta_description = $2 WHERE id = $1")
      .bind(listing.id)
      .bind(&meta)
      .execute(pool)
      .await?;
    changed += 1;
  }
  info!(total = listings.len(), changed, "Meta descriptions regenerated.");
  println!("{} of {} listing(s) updated", changed, listings.len());
  Ok(())
}
