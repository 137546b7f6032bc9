use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use gatehouse::config::Config;
use gatehouse::db::{AppState, queries};
use gatehouse::error::AppError;
use gatehouse::handlers;
use gatehouse::models::CreateFirmware;
use gatehouse::util::sha256_file;
use gatehouse::version::FirmwareVersion;

#[derive(Parser)]
#[command(name = "gatehouse", about = "Device licensing and firmware delivery server")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (the default).
    Serve,
    /// Create a tenant and print its id.
    CreateTenant {
        company_code: String,
        #[arg(long, default_value = "")]
        erp_url: String,
        /// Subscription length from now, in days.
        #[arg(long, default_value_t = 365)]
        subscription_days: i64,
    },
    /// Issue (or rotate to) a license secret for a tenant. The plaintext is
    /// printed once and never stored.
    IssueSecret { company_code: String },
    /// Copy a binary into the firmware directory and register the release.
    RegisterFirmware {
        device_type: String,
        version: String,
        #[arg(long, default_value_t = 1)]
        build_number: i64,
        #[arg(long)]
        file: PathBuf,
        #[arg(long, default_value_t = false)]
        stable: bool,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        min_current_version: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();
    let state = AppState::from_config(&config)?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config, state).await,
        Command::CreateTenant {
            company_code,
            erp_url,
            subscription_days,
        } => {
            let conn = state.db.get()?;
            let tenant = queries::create_tenant(
                &conn,
                &gatehouse::models::CreateTenant {
                    company_code,
                    erp_url,
                    erp_api_key: None,
                    erp_api_secret: None,
                    subscription_expires_at: queries::now() + subscription_days * 86400,
                },
                &state.keyring,
            )?;
            println!("created tenant {} ({})", tenant.company_code, tenant.id);
            Ok(())
        }
        Command::IssueSecret { company_code } => {
            let mut conn = state.db.get()?;
            let tenant = queries::get_tenant_by_code(&conn, &company_code)?
                .ok_or_else(|| AppError::NotFound(format!("tenant '{company_code}' not found")))?;
            let (secret, plaintext) =
                queries::issue_license_secret(&mut conn, &tenant.id, &state.keyring)?;
            println!("issued secret {} for tenant {}", secret.id, tenant.company_code);
            println!("license key (shown once): {plaintext}");
            Ok(())
        }
        Command::RegisterFirmware {
            device_type,
            version,
            build_number,
            file,
            stable,
            description,
            min_current_version,
        } => {
            if FirmwareVersion::parse(&version).is_none() {
                anyhow::bail!("version must be MAJOR.MINOR.PATCH");
            }

            let binary_path = format!("{device_type}/v{version}.bin");
            let dest = state.firmware_dir.join(&binary_path);
            if let Some(parent) = dest.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::copy(&file, &dest)?;

            let file_size = std::fs::metadata(&dest)?.len() as i64;
            let file_hash = sha256_file(&dest)?;

            let conn = state.db.get()?;
            let release = queries::create_firmware(
                &conn,
                &CreateFirmware {
                    device_type,
                    version,
                    build_number,
                    filename: dest
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default(),
                    file_size,
                    file_hash,
                    binary_path,
                    description,
                    release_notes: None,
                    is_stable: stable,
                    min_current_version,
                },
            )?;
            println!(
                "registered firmware {} v{} build {} (id {})",
                release.device_type, release.version, release.build_number, release.id
            );
            Ok(())
        }
    }
}

async fn serve(config: Config, state: AppState) -> anyhow::Result<()> {
    if config.secret_key_is_default() && !config.dev_mode {
        tracing::warn!("SECRET_KEY is unset; tokens will not survive redeploys securely");
    }
    if state.admin_token.is_none() {
        tracing::warn!("ADMIN_TOKEN is unset; the admin surface is disabled");
    }

    let rate_limit = Some((config.rate_limit_per_second, config.rate_limit_burst));
    let app = handlers::app(state, rate_limit);

    let addr = config.addr();
    tracing::info!("listening on {addr}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}
