use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use dotenv::dotenv;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use appointment_cell::{allowed_actions, AppointmentAction, BookingService};
use auth_cell::{AuthService, LoginRequest};
use doctor_cell::{DoctorDirectoryService, DoctorSearchFilters, SlotService};
use report_cell::api::{ChatService, DocumentService};
use report_cell::TriageSubmission;
use shared_config::AppConfig;
use shared_models::{Role, SessionContext};
use video_call_cell::{derive_participant_id, ChannelId, CredentialProvider, HttpCredentialProvider};

#[derive(Parser)]
#[command(name = "nextopinion", about = "NextOpinion telehealth client console")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct Login {
    #[arg(long)]
    email: String,
    #[arg(long)]
    password: String,
}

#[derive(Clone, Copy, ValueEnum)]
enum Response {
    Accept,
    Reject,
}

#[derive(Subcommand)]
enum Command {
    /// Search the doctor directory
    Doctors {
        #[arg(long)]
        speciality: Option<String>,
        #[arg(long)]
        keyword: Option<String>,
        #[arg(long)]
        location: Option<String>,
    },
    /// List a doctor's open slots
    Slots { doctor_id: i64 },
    /// List your appointments with the actions each one allows
    Appointments {
        #[command(flatten)]
        login: Login,
    },
    /// Accept or reject a requested appointment (doctors only)
    Respond {
        #[command(flatten)]
        login: Login,
        appointment_id: i64,
        #[arg(value_enum)]
        response: Response,
    },
    /// Upload a medical document for AI triage
    Triage {
        #[command(flatten)]
        login: Login,
        #[arg(long)]
        file: PathBuf,
    },
    /// Show or extend the chat thread of a report
    Chat {
        #[command(flatten)]
        login: Login,
        report_id: i64,
        #[arg(long)]
        send: Option<String>,
    },
    /// Fetch a call credential for a channel
    Token {
        #[command(flatten)]
        login: Login,
        channel: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env();
    info!("Using NextOpinion backend at {}", config.api_base_url);

    match Cli::parse().command {
        Command::Doctors { speciality, keyword, location } => {
            let filters = DoctorSearchFilters { speciality, keyword, location };
            let doctors = DoctorDirectoryService::new(&config)?.search(&filters).await?;
            for doctor in doctors {
                println!(
                    "{:>5}  {}  {}",
                    doctor.id,
                    doctor.name,
                    doctor.speciality.as_deref().unwrap_or("-")
                );
            }
        }
        Command::Slots { doctor_id } => {
            let slots = SlotService::new(&config)?.available_slots(doctor_id).await?;
            for slot in slots {
                println!("{:>5}  {} - {}", slot.id, slot.start, slot.end);
            }
        }
        Command::Appointments { login } => {
            let ctx = sign_in(&config, login).await?;
            let bookings = BookingService::new(&config)?;
            let appointments = match ctx.role() {
                Role::Doctor => bookings.doctor_appointments(&ctx).await?,
                Role::Patient => bookings.patient_appointments(&ctx).await?,
            };
            for appointment in appointments {
                let actions: Vec<String> = allowed_actions(&appointment.status, ctx.role())
                    .iter()
                    .map(ToString::to_string)
                    .collect();
                println!(
                    "{:>5}  {:<10} {:<15} [{}]",
                    appointment.id,
                    appointment.status,
                    appointment.slot_label(),
                    actions.join(", ")
                );
            }
        }
        Command::Respond { login, appointment_id, response } => {
            let ctx = sign_in(&config, login).await?;
            let bookings = BookingService::new(&config)?;
            let appointment = bookings.get_appointment(&ctx, appointment_id).await?;
            let action = match response {
                Response::Accept => AppointmentAction::Accept,
                Response::Reject => AppointmentAction::Reject,
            };
            let status = bookings.respond(&ctx, &appointment, action).await?;
            println!("Appointment {} is now {}", appointment_id, status);
        }
        Command::Triage { login, file } => {
            let mut ctx = sign_in(&config, login).await?;
            let bytes = std::fs::read(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let filename = file
                .file_name()
                .and_then(|n| n.to_str())
                .context("file path has no usable name")?
                .to_string();
            let submission = TriageSubmission::File {
                mime: mime_for(&filename).to_string(),
                filename,
                bytes,
            };

            let result = DocumentService::new(&config)?
                .submit_for_triage(&mut ctx, submission)
                .await?;
            println!("Report {}", result.report_id);
            for prediction in &result.ai_result {
                let risk = prediction
                    .risk_percent()
                    .map(|r| format!("{}%", r))
                    .unwrap_or_else(|| "?".to_string());
                println!("  {:<30} {}", prediction.disease, risk);
            }
            if !result.recommended_doctor_ids().is_empty() {
                println!("Recommended doctors: {:?}", result.recommended_doctor_ids());
            }
        }
        Command::Chat { login, report_id, send } => {
            let ctx = sign_in(&config, login).await?;
            let chat = ChatService::new(&config)?;
            if let Some(message) = send {
                chat.send(&ctx, report_id, &ctx.role().to_string(), &message).await?;
            }
            for message in chat.history(&ctx, report_id).await? {
                println!("{}: {}", message.sender, message.message);
            }
        }
        Command::Token { login, channel } => {
            let ctx = sign_in(&config, login).await?;
            let channel = ChannelId::new(channel)?;
            let (participant, source) = derive_participant_id(Some(&ctx));
            let credential = HttpCredentialProvider::new(&config)?
                .with_auth_token(ctx.token())
                .fetch(&channel, participant)
                .await?;
            println!(
                "participant {} ({:?}) app {} token {}",
                credential.participant_id, source, credential.application_id, credential.session_token
            );
        }
    }

    Ok(())
}

async fn sign_in(config: &AppConfig, login: Login) -> Result<SessionContext> {
    let ctx = AuthService::new(config)?
        .login(LoginRequest {
            email: login.email,
            password: login.password,
        })
        .await?;
    if ctx.token().is_empty() {
        bail!("backend returned an empty session token");
    }
    Ok(ctx)
}

fn mime_for(filename: &str) -> &'static str {
    let extension = filename.rsplit('.').next().unwrap_or_default().to_ascii_lowercase();
    match extension.as_str() {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "txt" => "text/plain",
        _ => "application/octet-stream",
    }
}
