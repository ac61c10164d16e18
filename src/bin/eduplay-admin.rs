//! Operator console for account maintenance that cannot go through the API,
//! such as appointing the first owner.

use clap::{Parser, Subcommand};
use eduplay_api::{
    config::AppConfig,
    models::UserFilter,
    repository::{self, RepositoryError, RepositoryState},
    roles::Role,
    rut,
};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(name = "eduplay-admin", version, about = "EduPlay account administration")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print every registered account.
    ListUsers,
    /// Promote the account with this email to owner (dueno).
    SetOwner {
        email: String,
    },
}

async fn list_users(repo: RepositoryState) -> Result<(), RepositoryError> {
    let users = repo.list_users(&UserFilter::default()).await?;
    if users.is_empty() {
        println!("No hay usuarios registrados.");
        return Ok(());
    }

    for (index, user) in users.iter().enumerate() {
        println!("{}. {}", index + 1, user.nombre_completo());
        println!("   - Email: {}", user.email);
        println!("   - RUT: {}", rut::format(&user.rut));
        println!("   - Rol: {}", user.role.display_name());
        println!(
            "   - Estado: {}",
            if user.is_active { "Activo" } else { "Inactivo" }
        );
    }
    println!("\nTotal: {} usuario(s)", users.len());
    Ok(())
}

/// Returns `Ok(false)` when no account has that email.
async fn set_owner(repo: RepositoryState, email: &str) -> Result<bool, RepositoryError> {
    let email = email.trim().to_lowercase();
    let Some(mut user) = repo.find_user_by_email(&email).await? else {
        eprintln!("Usuario no encontrado con email: {email}");
        return Ok(false);
    };

    println!(
        "{} <{}> rol actual: {}",
        user.nombre_completo(),
        user.email,
        user.role.display_name()
    );

    if user.role == Role::Dueno {
        println!("El usuario ya tiene rol de Dueño.");
        return Ok(true);
    }

    user.role = Role::Dueno;
    repo.update_user(&user).await?;
    tracing::info!(user_id = %user.id, email = %user.email, "account promoted to owner");
    println!("{} ahora es Dueño del sistema.", user.nombre_completo());
    Ok(true)
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "eduplay_api=warn,eduplay_admin=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load();

    let repo = match repository::connect(&config).await {
        Ok(repo) => repo,
        Err(e) => {
            eprintln!("No se pudo conectar a la base de datos: {e}");
            return ExitCode::FAILURE;
        }
    };

    let outcome = match cli.command {
        Command::ListUsers => list_users(repo).await.map(|_| true),
        Command::SetOwner { email } => set_owner(repo, &email).await,
    };

    match outcome {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error de base de datos: {e}");
            ExitCode::FAILURE
        }
    }
}
