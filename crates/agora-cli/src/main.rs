use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use agora_agents::AgentRegistry;
use agora_client::{HttpRunService, RunService, SendOptions, SessionManager, StreamAuditLog};
use agora_core::config::{Config, data_dir, load_env_file};
use agora_core::logging::init_logging;
use agora_core::protocol::StreamMode;
use agora_gateway::GatewayState;

mod console;
mod smoke;
mod talk;

#[derive(Parser)]
#[command(
    name = "agora",
    about = "Talk to conversational agents over the streaming run protocol",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path (default: ~/.agora/config.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Connection flags shared by every client command.
#[derive(clap::Args)]
struct Connection {
    /// Run service base URL
    #[arg(short = 'u', long, env = "LANGGRAPH_BASE_URL")]
    base_url: Option<String>,

    /// Value for configurable.user_email
    #[arg(long, env = "USER_EMAIL")]
    user_email: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with an assistant (one-shot with -m, interactive otherwise)
    Talk {
        #[command(flatten)]
        connection: Connection,

        /// Assistant name or id
        #[arg(short, long, env = "LANGGRAPH_ASSISTANT")]
        assistant: Option<String>,

        /// Send a single message (words are joined by spaces)
        #[arg(short, long, num_args = 1..)]
        message: Vec<String>,

        /// Start an interactive chat session
        #[arg(short, long)]
        interactive: bool,

        /// Create a new thread and overwrite the saved thread id
        #[arg(long)]
        reset_thread: bool,

        /// File to persist the thread id
        #[arg(long)]
        thread_file: Option<PathBuf>,

        /// Streaming mode: updates, values, messages or events
        #[arg(long, env = "STREAM_MODE")]
        stream_mode: Option<StreamMode>,

        /// Print raw stream events
        #[arg(long)]
        debug_stream: bool,

        /// Append every stream event to this JSONL file
        #[arg(long)]
        stream_log: Option<PathBuf>,
    },

    /// List the assistants a run service offers
    Assistants {
        #[command(flatten)]
        connection: Connection,
    },

    /// Run a scripted conversation against a run service
    Smoke {
        #[command(flatten)]
        connection: Connection,
    },

    /// Serve the built-in agents locally
    Serve {
        /// Port to listen on (default: 2024)
        #[arg(long)]
        port: Option<u16>,
    },
}

impl Connection {
    fn base_url(&self, config: &Config) -> String {
        self.base_url.clone().unwrap_or_else(|| config.base_url())
    }

    fn user_email(&self, config: &Config) -> String {
        self.user_email.clone().unwrap_or_else(|| config.user_email())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_env_file();
    let cli = Cli::parse();

    let config_path = cli.config.unwrap_or_else(Config::default_path);
    let config = Config::load(&config_path)?;
    init_logging(config.logging.as_ref(), cli.verbose);
    tracing::debug!(path = %config_path.display(), "Config loaded");

    match cli.command {
        Commands::Talk {
            connection,
            assistant,
            message,
            interactive,
            reset_thread,
            thread_file,
            stream_mode,
            debug_stream,
            stream_log,
        } => {
            let base_url = connection.base_url(&config);
            let talk = talk::Talk {
                service: HttpRunService::new(&base_url),
                base_url,
                sessions: SessionManager::new(thread_file.unwrap_or_else(|| config.thread_file())),
                options: SendOptions {
                    assistant_id: assistant.unwrap_or_else(|| config.assistant()),
                    user_email: connection.user_email(&config),
                    stream_mode: stream_mode.unwrap_or_else(|| config.stream_mode()),
                    audit: stream_log.map(StreamAuditLog::new),
                },
                debug_stream,
            };

            if !message.is_empty() && !interactive {
                talk.one_shot(&message.join(" "), reset_thread).await;
            } else {
                talk.interactive(reset_thread).await?;
            }
        }
        Commands::Assistants { connection } => {
            let service = HttpRunService::new(&connection.base_url(&config));
            for assistant in service.list_assistants().await? {
                println!(
                    "{}\t{}",
                    assistant.assistant_id,
                    assistant.description.as_deref().unwrap_or("")
                );
            }
        }
        Commands::Smoke { connection } => {
            let service = HttpRunService::new(&connection.base_url(&config));
            let sessions = SessionManager::new(data_dir().join("smoke_thread_id.txt"));
            smoke::run(&service, &sessions, &connection.user_email(&config)).await?;
        }
        Commands::Serve { port } => {
            let port = port.unwrap_or_else(|| config.gateway_port());
            let state = Arc::new(GatewayState::new(AgentRegistry::from_config(&config)));
            agora_gateway::start_gateway(state, &config.gateway_bind(), port).await?;
        }
    }

    Ok(())
}
