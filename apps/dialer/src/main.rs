use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use client_core::{
    config::normalize_database_url, load_settings, HttpCallService, SessionStore, SignupForm,
    StaleCallReaper, StoreOptions, VoiceReadyPoller,
};
use shared::{
    domain::{CallStatus, ContactId, NewContact, SettingsPatch, Theme},
    phone,
};
use storage::Storage;
use tracing::info;

#[derive(Parser, Debug)]
#[command(about = "Protected outbound calling from the terminal")]
struct Cli {
    /// Overrides the configured backend base URL.
    #[arg(long)]
    api_url: Option<String>,
    /// Overrides the configured local database.
    #[arg(long)]
    database_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Signup {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        phone: String,
        #[arg(long)]
        pin: String,
        #[arg(long)]
        verbal_code: String,
    },
    /// Signs in to an existing account.
    Login {
        #[arg(long)]
        email: String,
    },
    Whoami,
    Logout,
    /// Places a call and keeps it active until Ctrl-C or `--hangup-after`.
    Call {
        number: String,
        #[arg(long)]
        hangup_after: Option<u64>,
    },
    History,
    Contacts,
    AddContact {
        name: String,
        number: String,
        #[arg(long)]
        pin: Option<String>,
    },
    RemoveContact {
        id: i64,
    },
    Message {
        number: String,
        body: String,
    },
    VoiceReady,
    Settings {
        #[arg(long)]
        notifications: Option<bool>,
        #[arg(long)]
        sound: Option<bool>,
        #[arg(long)]
        vibration: Option<bool>,
        #[arg(long, value_parser = parse_theme)]
        theme: Option<Theme>,
        #[arg(long)]
        language: Option<String>,
    },
}

fn parse_theme(raw: &str) -> Result<Theme, String> {
    match raw.to_ascii_lowercase().as_str() {
        "light" => Ok(Theme::Light),
        "dark" => Ok(Theme::Dark),
        "system" => Ok(Theme::System),
        other => Err(format!("unknown theme '{other}'")),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();
    let cli = Cli::parse();

    let mut settings = load_settings()?;
    if let Some(api_url) = cli.api_url {
        settings.api_base_url = api_url;
    }
    if let Some(database_url) = cli.database_url {
        settings.database_url = database_url;
    }
    settings.validate()?;

    let database_url = normalize_database_url(&settings.database_url);
    let storage = Storage::new(&database_url)
        .await
        .with_context(|| format!("failed to open local store '{database_url}'"))?;
    storage.health_check().await?;
    info!("dialer: using api={} database={database_url}", settings.api_base_url);

    let service = HttpCallService::new(settings.api_base_url.clone())
        .with_history_fallback(settings.history_fallback);
    let store = SessionStore::with_options(
        Arc::new(service),
        Arc::new(storage),
        StoreOptions {
            history_page_size: settings.history_page_size,
        },
    );
    store.initialize().await;

    match cli.command {
        Command::Signup {
            name,
            email,
            phone,
            pin,
            verbal_code,
        } => {
            let profile = store
                .signup(SignupForm {
                    name,
                    email,
                    real_phone_number: phone,
                    pin,
                    verbal_code,
                })
                .await?;
            println!(
                "signed up user_id={} defense_number={}",
                profile.user_id,
                profile.assigned_number.as_deref().unwrap_or("pending")
            );
        }
        Command::Login { email } => {
            let profile = store.login(&email).await?;
            println!("logged in user_id={} name={}", profile.user_id, profile.display_name);
        }
        Command::Whoami => {
            let state = store.state().await;
            match state.user_id() {
                Some(user_id) => println!(
                    "user_id={user_id} name={} defense_number={}",
                    state.session.display_name,
                    state.session.assigned_number.as_deref().unwrap_or("pending")
                ),
                None => println!("not signed in"),
            }
        }
        Command::Logout => {
            store.logout().await;
            println!("logged out");
        }
        Command::Call {
            number,
            hangup_after,
        } => {
            let reaper = StaleCallReaper::new(
                settings.stale_call_threshold(),
                settings.reaper_interval(),
            )
            .spawn(store.clone());
            let poller = VoiceReadyPoller::new(settings.voice_ready_interval()).spawn(store.clone());

            let call = store.initiate_call(&number).await?;
            println!(
                "calling {} from {} (call {})",
                phone::format_display(&call.target_number),
                call.caller_id_shown.as_deref().unwrap_or("unknown"),
                call.id
            );

            let hung_up = match hangup_after {
                Some(secs) => {
                    tokio::select! {
                        _ = tokio::time::sleep(Duration::from_secs(secs)) => true,
                        _ = tokio::signal::ctrl_c() => false,
                    }
                }
                None => {
                    tokio::signal::ctrl_c().await?;
                    false
                }
            };

            let elapsed = store
                .state()
                .await
                .active_call(call.id)
                .map(|active| active.elapsed_seconds(Utc::now()))
                .unwrap_or_default();
            let status = if hung_up {
                CallStatus::Completed
            } else {
                CallStatus::Cancelled
            };
            match store.complete_call(call.id, elapsed, status).await? {
                Some(record) => println!(
                    "call {} {} after {}s",
                    record.id, record.status, record.duration_seconds
                ),
                None => println!("call {} had already ended", call.id),
            }
            reaper.abort();
            poller.abort();
        }
        Command::History => {
            let state = store.state().await;
            if state.call_history.is_empty() {
                println!("no calls yet");
            }
            for call in &state.call_history {
                println!(
                    "{}  {:<16} {:<14} {:>5}s",
                    call.start_time.format("%Y-%m-%d %H:%M"),
                    phone::format_display(&call.target_number),
                    call.status.as_str(),
                    call.duration_seconds
                );
            }
        }
        Command::Contacts => {
            for contact in store.state().await.contacts.iter() {
                println!(
                    "{:>4}  {:<20} {}{}",
                    contact.id.0,
                    contact.name,
                    phone::format_display(&contact.phone_number),
                    if contact.auto_whitelisted { "  (auto)" } else { "" }
                );
            }
        }
        Command::AddContact { name, number, pin } => {
            let contact = store
                .add_contact(NewContact {
                    name,
                    phone_number: number,
                    custom_pin: pin,
                })
                .await?;
            println!("added contact id={} {}", contact.id, contact.name);
        }
        Command::RemoveContact { id } => {
            store.remove_contact(ContactId(id)).await?;
            println!("removed contact id={id}");
        }
        Command::Message { number, body } => {
            let receipt = store.send_message(&number, &body).await?;
            println!(
                "message sent sid={}",
                receipt.message_sid.as_deref().unwrap_or("unknown")
            );
        }
        Command::VoiceReady => {
            let ready = store.check_voice_ready().await;
            println!("voice ready: {ready}");
        }
        Command::Settings {
            notifications,
            sound,
            vibration,
            theme,
            language,
        } => {
            let updated = store
                .update_settings(SettingsPatch {
                    notifications,
                    sound,
                    vibration,
                    theme,
                    language,
                })
                .await?;
            println!("{}", serde_json::to_string_pretty(&updated)?);
        }
    }

    Ok(())
}
