use anyhow::Context;
use clap::{Parser, Subcommand};

use academia::authz::{load_principal, roles};
use academia::db;
use academia::reports::{generate_report, ReportConfig, ReportFilters, ReportKind, ReportRequest, SqliteReportSource};
use academia::utils::{hash_password, utc_now};

#[derive(Parser, Debug)]
#[command(author, version, about = "academia operator tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create an active account holding the Administrador role
    CreateAdmin {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        email: Option<String>,
    },
    /// Generate a PDF report offline, authorized as an existing user
    Report {
        /// students, grades, instructors, careers or enrollments
        kind: ReportKind,
        #[arg(long = "as", value_name = "USERNAME")]
        as_user: String,
        #[arg(long)]
        career_id: Option<i64>,
        #[arg(long)]
        active: Option<bool>,
        #[arg(long)]
        year: Option<i32>,
        #[arg(long)]
        enrollment_id: Option<i64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // The binary may run outside the crate directory; fall back to the crate-local `.env`.
    if dotenvy::dotenv().is_err() {
        let crate_env = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(crate_env);
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let pool = db::init().await?;

    match cli.command {
        Commands::CreateAdmin {
            username,
            password,
            email,
        } => {
            let user_id = create_admin(&pool, &username, &password, email).await?;
            println!("Created administrator {username} (id {user_id})");
        }
        Commands::Report {
            kind,
            as_user,
            career_id,
            active,
            year,
            enrollment_id,
        } => {
            let user_id: i64 = sqlx::query_scalar("SELECT id FROM users WHERE username = ?")
                .bind(&as_user)
                .fetch_optional(&pool)
                .await?
                .with_context(|| format!("no user named {as_user}"))?;
            let principal = load_principal(&pool, user_id)
                .await?
                .with_context(|| format!("user {as_user} is inactive"))?;

            let request = ReportRequest::new(
                kind,
                ReportFilters {
                    career_id,
                    active,
                    year,
                    enrollment_id,
                },
            );
            let source = SqliteReportSource::new(pool.clone());
            let config = ReportConfig::from_env();

            let handle = generate_report(&source, &config, &request, Some(&principal))
                .await
                .context("report could not be generated")?;
            println!("{}", handle.path.display());
        }
    }

    Ok(())
}

async fn create_admin(
    pool: &sqlx::SqlitePool,
    username: &str,
    password: &str,
    email: Option<String>,
) -> anyhow::Result<i64> {
    let password_hash = hash_password(password).map_err(|err| anyhow::anyhow!("{err}"))?;
    let now = utc_now();

    let mut tx = pool.begin().await?;
    let user_id = sqlx::query(
        "INSERT INTO users (username, email, password_hash, active, created_at) VALUES (?, ?, ?, 1, ?)",
    )
    .bind(username)
    .bind(email)
    .bind(password_hash)
    .bind(now)
    .execute(&mut *tx)
    .await
    .with_context(|| format!("could not create user {username}"))?
    .last_insert_rowid();

    let assigned = sqlx::query(
        "INSERT OR IGNORE INTO user_roles (user_id, role_id, assigned_at) \
         SELECT ?, id, ? FROM roles WHERE name = ?",
    )
    .bind(user_id)
    .bind(now)
    .bind(roles::ADMINISTRATOR)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    if assigned == 0 {
        anyhow::bail!("role {} is missing; run the migrations first", roles::ADMINISTRATOR);
    }

    tx.commit().await?;
    Ok(user_id)
}
