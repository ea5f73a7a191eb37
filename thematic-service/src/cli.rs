//! Command-line interface.

use clap::{Parser, Subcommand};
use rusqlite::Connection;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use crate::config::ServiceConfig;
use crate::db::{Database, migrations};
use crate::error::{DatabaseError, ServiceError};

type CliResult = Result<(), Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "thematic-service")]
#[command(about = "Document management service for thematic analysis projects")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server (default)
    Serve,

    /// Inspect or move along the schema revision chain
    Migrate {
        #[command(subcommand)]
        command: MigrateCommands,
    },

    /// Manage users
    User {
        #[command(subcommand)]
        command: UserCommands,
    },

    /// Manage projects and their members
    Project {
        #[command(subcommand)]
        command: ProjectCommands,
    },
}

#[derive(Subcommand)]
enum MigrateCommands {
    /// Apply revisions up to a target (head when omitted)
    Upgrade {
        #[arg(long)]
        to: Option<String>,
    },
    /// Revert revisions down to a target revision, or `base` for an empty schema
    Downgrade {
        #[arg(long)]
        to: String,
    },
    /// Show the applied revision
    Current,
    /// List the revision chain, oldest first
    History,
}

#[derive(Subcommand)]
enum UserCommands {
    /// Create a user
    Add {
        username: String,
        #[arg(long)]
        email: Option<String>,
    },
}

#[derive(Subcommand)]
enum ProjectCommands {
    /// Create a project
    Add {
        name: String,
        /// Owning user ID
        #[arg(long)]
        owner: i64,
        #[arg(long)]
        description: Option<String>,
    },
    /// Give a user access to a project
    AddMember { project_id: i64, user_id: i64 },
}

impl Cli {
    pub async fn run(self, config: ServiceConfig) -> CliResult {
        match self.command.unwrap_or(Commands::Serve) {
            Commands::Serve => serve(config).await,
            Commands::Migrate { command } => migrate(&config, command),
            Commands::User { command } => user(&config, command),
            Commands::Project { command } => project(&config, command),
        }
    }
}

async fn serve(config: ServiceConfig) -> CliResult {
    let db_path = config.storage.database_path();
    let db = Arc::new(Database::open(&db_path)?);
    info!(path = %db_path.display(), "Database initialized");

    let metrics = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| ServiceError::Config {
            message: format!("Failed to install metrics recorder: {}", e),
        })?;

    let app = crate::api::router(db, &config, Some(metrics));

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

fn migrate(config: &ServiceConfig, command: MigrateCommands) -> CliResult {
    if let MigrateCommands::History = command {
        for revision in migrations::history() {
            println!(
                "{} -> {}  {}",
                revision.down_revision.unwrap_or("base"),
                revision.id,
                revision.description
            );
        }
        return Ok(());
    }

    let db_path = config.storage.database_path();
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let conn = Connection::open(&db_path).map_err(DatabaseError::Connection)?;

    match command {
        MigrateCommands::Upgrade { to } => {
            let applied = migrations::upgrade(&conn, to.as_deref())?;
            if applied.is_empty() {
                println!("Already at target revision");
            }
            for id in applied {
                println!("Upgraded to {}", id);
            }
        }
        MigrateCommands::Downgrade { to } => {
            let target = (to != "base").then_some(to.as_str());
            let reverted = migrations::downgrade(&conn, target)?;
            if reverted.is_empty() {
                println!("Already at target revision");
            }
            for id in reverted {
                println!("Reverted {}", id);
            }
        }
        MigrateCommands::Current => {
            let current = migrations::current_revision(&conn)?;
            let current = current.as_deref().unwrap_or("base");
            if current == migrations::head() {
                println!("{} (head)", current);
            } else {
                println!("{}", current);
            }
        }
        MigrateCommands::History => {}
    }

    Ok(())
}

fn user(config: &ServiceConfig, command: UserCommands) -> CliResult {
    let db = Database::open(&config.storage.database_path())?;

    match command {
        UserCommands::Add { username, email } => {
            let user = db.insert_user(&username, email.as_deref())?;
            println!("Created user {} ({})", user.id, user.username);
        }
    }

    Ok(())
}

fn project(config: &ServiceConfig, command: ProjectCommands) -> CliResult {
    let db = Database::open(&config.storage.database_path())?;

    match command {
        ProjectCommands::Add {
            name,
            owner,
            description,
        } => {
            let project = db.insert_project(&name, description.as_deref(), owner)?;
            println!("Created project {} ({})", project.id, project.name);
        }
        ProjectCommands::AddMember {
            project_id,
            user_id,
        } => {
            if db.get_project(project_id)?.is_none() {
                return Err(ServiceError::ProjectNotFound { project_id }.into());
            }
            db.add_project_member(project_id, user_id)?;
            println!("Added user {} to project {}", user_id, project_id);
        }
    }

    Ok(())
}
