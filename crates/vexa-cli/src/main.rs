//! Vexa CLI - terminal front end for the Vexa assistant.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use vexa_client::{AccessLevel, DatasetType, ModelUpdate};

mod app;
mod commands;
mod presenter;

use app::App;
use presenter::Presenter;

/// Vexa - chat with your assistant and fine-tune expert models
#[derive(Parser)]
#[command(name = "vexa")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Backend URL (overrides VEXA_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in and remember the session
    Login {
        username: String,
        #[arg(short, long)]
        password: String,
    },

    /// Create an account
    Register {
        username: String,
        #[arg(short, long)]
        password: String,
        #[arg(short, long)]
        email: Option<String>,
    },

    /// Forget the stored session
    Logout,

    /// Show the signed-in user
    Whoami,

    /// Ask the assistant a question
    Ask {
        /// The message
        text: String,
        /// Extra context for the question
        #[arg(short, long)]
        context: Option<String>,
        /// Answer with a fine-tuned model
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Show past questions
    History {
        #[arg(long, default_value_t = 0)]
        skip: u32,
        #[arg(short, long, default_value_t = 20)]
        limit: u32,
    },

    /// Delete a question from the history
    Delete {
        /// Query id
        id: i64,
    },

    /// Manage installed LLM models
    Models {
        #[command(subcommand)]
        command: ModelsCommand,
    },

    /// Fine-tune expert models
    Train {
        #[command(subcommand)]
        command: TrainCommand,
    },

    /// Check backend health
    Health {
        /// Keep checking until interrupted
        #[arg(short, long)]
        watch: bool,
    },

    /// Show usage statistics
    Dashboard {
        /// Keep refreshing until interrupted
        #[arg(short, long)]
        watch: bool,
    },

    /// Search the web
    Search {
        query: String,
        /// Weather lookup instead of a general search
        #[arg(long)]
        weather: bool,
    },
}

#[derive(Subcommand)]
enum ModelsCommand {
    /// List installed models
    List,
    /// Make a model the default
    Switch { name: String },
}

#[derive(Subcommand)]
enum TrainCommand {
    /// List fine-tuned models
    List {
        #[arg(short, long)]
        specialization: Option<String>,
    },
    /// Create a fine-tuned model
    Create {
        name: String,
        #[arg(short, long)]
        base_model: String,
        #[arg(short, long)]
        specialization: String,
        #[arg(short, long)]
        description: Option<String>,
    },
    /// Start training a model
    Start {
        id: String,
        #[arg(long)]
        max_steps: Option<u32>,
        #[arg(long)]
        epochs: Option<u32>,
        #[arg(long)]
        learning_rate: Option<f64>,
        /// Wait until training finishes
        #[arg(short, long)]
        watch: bool,
    },
    /// Stop a running training
    Stop { id: String },
    /// Show training status of a model
    Status { id: String },
    /// Show training logs
    Logs {
        id: String,
        #[arg(short, long, default_value_t = 50)]
        limit: u32,
        #[arg(long)]
        level: Option<String>,
    },
    /// Wait for models to finish training
    Watch {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Delete a fine-tuned model
    Delete { id: String },
    /// List base models available for fine-tuning
    BaseModels,
    /// Rename, describe, or (de)activate a model
    Update {
        id: String,
        #[arg(short, long)]
        name: Option<String>,
        #[arg(short, long)]
        description: Option<String>,
        #[arg(short, long)]
        specialization: Option<String>,
        /// Enable or disable the model for chat
        #[arg(long)]
        active: Option<bool>,
    },
    /// Show usage statistics of a model
    Stats { id: String },
    /// Manage training datasets
    Dataset {
        #[command(subcommand)]
        command: DatasetCommand,
    },
    /// Share a model with other users
    Access {
        #[command(subcommand)]
        command: AccessCommand,
    },
}

#[derive(Subcommand)]
enum DatasetCommand {
    /// Upload a training file (jsonl, csv, pdf or txt)
    Upload {
        /// Model id
        id: String,
        file: PathBuf,
        /// Dataset type; taken from the file extension when omitted
        #[arg(short = 't', long = "type", value_parser = parse_dataset_type)]
        dataset_type: Option<DatasetType>,
        #[arg(short, long)]
        description: Option<String>,
    },
    /// List datasets of a model
    List {
        /// Model id
        id: String,
    },
    /// Check a dataset again
    Validate { dataset_id: String },
}

#[derive(Subcommand)]
enum AccessCommand {
    /// Show who can use a model
    List { id: String },
    /// Give a user access to a model
    Grant {
        id: String,
        user_id: i64,
        #[arg(short, long, default_value = "read", value_parser = parse_access_level)]
        level: AccessLevel,
        /// Expiry timestamp (ISO 8601)
        #[arg(long)]
        expires_at: Option<String>,
    },
    /// Take access away from a user
    Revoke { id: String, user_id: i64 },
}

fn parse_dataset_type(value: &str) -> Result<DatasetType, String> {
    DatasetType::from_extension(value)
        .ok_or_else(|| format!("unknown dataset type '{}' (jsonl, csv, pdf, txt)", value))
}

fn parse_access_level(value: &str) -> Result<AccessLevel, String> {
    match value.to_ascii_lowercase().as_str() {
        "read" => Ok(AccessLevel::Read),
        "write" => Ok(AccessLevel::Write),
        "admin" => Ok(AccessLevel::Admin),
        _ => Err(format!("unknown access level '{}' (read, write, admin)", value)),
    }
}

fn main() -> miette::Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose { "debug" } else { "warn" };
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();

    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| miette::miette!("Failed to start async runtime: {}", e))?;
    runtime.block_on(run(cli))
}

async fn run(cli: Cli) -> miette::Result<()> {
    let app = App::new(cli.api_url.as_deref())?;

    // Signing out needs no presenter.
    if let Commands::Logout = cli.command {
        return commands::auth::logout(&app);
    }

    let presenter = Presenter::spawn(app.notifications.clone(), app.sync.exit_transition);

    let result = match cli.command {
        Commands::Login { username, password } => {
            commands::auth::login(&app, &username, &password).await
        }
        Commands::Register {
            username,
            password,
            email,
        } => commands::auth::register(&app, &username, &password, email.as_deref()).await,
        Commands::Logout => Ok(()),
        Commands::Whoami => commands::auth::whoami(&app),
        Commands::Ask {
            text,
            context,
            model,
        } => commands::chat::ask(&app, &text, context.as_deref(), model.as_deref()).await,
        Commands::History { skip, limit } => commands::chat::history(&app, skip, limit).await,
        Commands::Delete { id } => commands::chat::delete(&app, id).await,
        Commands::Models { command } => match command {
            ModelsCommand::List => commands::models::list(&app).await,
            ModelsCommand::Switch { name } => commands::models::switch(&app, &name).await,
        },
        Commands::Train { command } => match command {
            TrainCommand::List { specialization } => {
                commands::train::list(&app, specialization.as_deref()).await
            }
            TrainCommand::Create {
                name,
                base_model,
                specialization,
                description,
            } => commands::train::create(&app, name, base_model, specialization, description).await,
            TrainCommand::Start {
                id,
                max_steps,
                epochs,
                learning_rate,
                watch,
            } => {
                let params = vexa_client::TrainingParams {
                    max_steps,
                    epochs,
                    learning_rate,
                };
                commands::train::start(&app, &id, &params, watch).await
            }
            TrainCommand::Stop { id } => commands::train::stop(&app, &id).await,
            TrainCommand::Status { id } => commands::train::status(&app, &id).await,
            TrainCommand::Logs { id, limit, level } => {
                commands::train::logs(&app, &id, limit, level.as_deref()).await
            }
            TrainCommand::Watch { ids } => commands::train::watch(&app, &ids).await,
            TrainCommand::Delete { id } => commands::train::delete(&app, &id).await,
            TrainCommand::BaseModels => commands::train::base_models(&app).await,
            TrainCommand::Update {
                id,
                name,
                description,
                specialization,
                active,
            } => {
                let update = ModelUpdate {
                    name,
                    description,
                    is_active: active,
                    specialization,
                };
                commands::train::update(&app, &id, &update).await
            }
            TrainCommand::Stats { id } => commands::train::stats(&app, &id).await,
            TrainCommand::Dataset { command } => match command {
                DatasetCommand::Upload {
                    id,
                    file,
                    dataset_type,
                    description,
                } => {
                    commands::train::dataset_upload(
                        &app,
                        &id,
                        &file,
                        dataset_type,
                        description.as_deref(),
                    )
                    .await
                }
                DatasetCommand::List { id } => commands::train::dataset_list(&app, &id).await,
                DatasetCommand::Validate { dataset_id } => {
                    commands::train::dataset_validate(&app, &dataset_id).await
                }
            },
            TrainCommand::Access { command } => match command {
                AccessCommand::List { id } => commands::train::access(&app, &id).await,
                AccessCommand::Grant {
                    id,
                    user_id,
                    level,
                    expires_at,
                } => commands::train::grant(&app, &id, user_id, level, expires_at).await,
                AccessCommand::Revoke { id, user_id } => {
                    commands::train::revoke(&app, &id, user_id).await
                }
            },
        },
        Commands::Health { watch } => commands::health::run(&app, watch).await,
        Commands::Dashboard { watch } => commands::dashboard::run(&app, watch).await,
        Commands::Search { query, weather } => commands::search::run(&app, &query, weather).await,
    };

    presenter.finish().await;
    app.notifications.shutdown();
    result
}
