use std::error::Error;

use chrono::{Local, TimeZone, Utc};
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use tokio::sync::mpsc;
use utrabajo_chat::common::ChatMessage;
use utrabajo_chat::config::{self, AppConfig};
use utrabajo_chat::storage::LocalStore;
use utrabajo_chat::sync::messages::temp_message_id;
use utrabajo_chat::sync::{ChatClient, SyncWorker};
use utrabajo_chat::ui::{AppState, ChatApp};

#[derive(Parser)]
#[command(
    name = "utrabajo_chat",
    version,
    about = "UTrabajo student/company chat client"
)]
struct Cli {
    /// Path to JSON config file
    #[arg(long, default_value = config::DEFAULT_CONFIG_PATH, value_name = "FILE")]
    config: String,
    /// Act as this user instead of the configured one
    #[arg(long)]
    user: Option<String>,
    /// Document store file
    #[arg(long, value_name = "FILE")]
    db: Option<String>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Clone, PartialEq, Eq)]
enum Command {
    /// Open the chat window (default)
    Ui,
    /// Remember a user as the default for later runs
    Login { user: String },
    /// Fill the store with demo chats and messages
    Seed,
    /// Print the merged chat list of the user
    Chats,
    /// Print the messages of a chat
    Messages { chat_id: String },
    /// Send a message without opening the window
    Send { chat_id: String, text: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv().ok();
    env_logger::init();

    let cli = Cli::parse();
    let mut app_config = config::load_config(&cli.config);
    app_config.apply_env_overrides();
    if let Some(db) = &cli.db {
        app_config.database_path = db.clone();
    }
    if let Some(user) = &cli.user {
        app_config.user_id = Some(user.clone());
    }

    let command = cli.command.clone().unwrap_or(Command::Ui);
    if let Command::Login { user } = &command {
        config::persist_user(&cli.config, user);
        return Ok(());
    }

    let store = LocalStore::open(&app_config.database_path)?;
    let client = ChatClient::new(store);
    log::info!("Using document store {}", app_config.database_path);

    match command {
        Command::Seed => seed_demo_data(&client)?,
        Command::Chats => print_chats(&client, &require_user(&app_config)?)?,
        Command::Messages { chat_id } => print_messages(&client, &chat_id)?,
        Command::Send { chat_id, text } => {
            let message = ChatMessage {
                id: temp_message_id(),
                chat_id,
                sender_id: require_user(&app_config)?,
                text,
                timestamp: Some(Utc::now().timestamp_millis()),
            };
            let id = client.send_message(&message)?;
            println!("sent {id}");
        }
        Command::Ui => {
            let user_id = require_user(&app_config)?;
            run_full_client(client, user_id, &app_config).await?;
        }
        Command::Login { .. } => {}
    }

    Ok(())
}

fn require_user(config: &AppConfig) -> Result<String, Box<dyn Error>> {
    config.user_id.clone().ok_or_else(|| {
        format!(
            "no user configured: pass --user, set {} or run `login`",
            config::ENV_USER
        )
        .into()
    })
}

async fn run_full_client(
    client: ChatClient<LocalStore>,
    user_id: String,
    app_config: &AppConfig,
) -> Result<(), eframe::Error> {
    // UI -> worker
    let (cmd_tx, cmd_rx) = mpsc::channel(app_config.channel_capacity);
    // worker -> UI
    let (event_tx, event_rx) = mpsc::channel(app_config.channel_capacity);

    let worker_user = user_id.clone();
    tokio::spawn(async move {
        let worker = SyncWorker::new(client, worker_user, event_tx, cmd_rx);
        if let Err(err) = worker.run().await {
            log::error!("Sync worker terminated: {err}");
        }
    });

    let options = eframe::NativeOptions::default();
    let mut event_rx = Some(event_rx);
    let match_window_ms = app_config.match_window_ms;

    eframe::run_native(
        "UTrabajo Chat",
        options,
        Box::new(move |cc| {
            let event_receiver = event_rx
                .take()
                .expect("ChatApp should only be initialized once");

            log::info!("Chat window opened for user {user_id}");
            let state = AppState::new(user_id.clone(), match_window_ms);
            Ok(Box::new(ChatApp::new(cc, state, cmd_tx.clone(), event_receiver)))
        }),
    )
}

fn print_chats(client: &ChatClient<LocalStore>, user_id: &str) -> Result<(), Box<dyn Error>> {
    let chats = client.load_chats(user_id)?;
    if chats.is_empty() {
        println!("no chats for {user_id}");
    }
    for chat in chats {
        println!(
            "{}  {:<28} {:<12} {}  {}",
            chat.id,
            chat.job_title.as_deref().unwrap_or("-"),
            chat.counterpart(user_id).unwrap_or("-"),
            format_time(chat.effective_timestamp()),
            chat.last_message.as_deref().unwrap_or(""),
        );
    }
    Ok(())
}

fn print_messages(client: &ChatClient<LocalStore>, chat_id: &str) -> Result<(), Box<dyn Error>> {
    for message in client.load_messages(chat_id)? {
        println!(
            "{}  {:<10} {}",
            format_time(message.timestamp.unwrap_or(0)),
            message.sender_id,
            message.text
        );
    }
    Ok(())
}

fn format_time(timestamp_ms: i64) -> String {
    if timestamp_ms <= 0 {
        return "-".to_string();
    }
    Local
        .timestamp_millis_opt(timestamp_ms)
        .single()
        .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn seed_demo_data(client: &ChatClient<LocalStore>) -> Result<(), Box<dyn Error>> {
    let conversations = [
        ("s1", "k1", "job-backend", "Backend intern", "Hola, sigue abierta la vacante?"),
        ("s1", "k2", "job-data", "Data analyst trainee", "Adjunto mi CV actualizado."),
        ("s2", "k1", "job-backend", "Backend intern", "Buenas tardes, me interesa el puesto."),
    ];

    for (student, company, job_id, job_title, opening) in conversations {
        let chat = client.create_or_get_chat(student, company, job_id, job_title)?;
        let message = ChatMessage {
            id: temp_message_id(),
            chat_id: chat.id.clone(),
            sender_id: student.to_string(),
            text: opening.to_string(),
            timestamp: Some(Utc::now().timestamp_millis()),
        };
        client.send_message(&message)?;
        println!("seeded chat {} ({student} <-> {company})", chat.id);
    }
    Ok(())
}
