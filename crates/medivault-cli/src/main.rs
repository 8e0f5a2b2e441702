//! MediVault command line
//!
//! Patients answer access requests, doctors request and break glass, admins
//! review emergencies and manage accounts. Tokens persist in a JSON file
//! between invocations.

mod commands;
mod render;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use colored::*;
use medivault_client::config::{DEFAULT_API_URL, DEFAULT_POLL_SECS, DEFAULT_TIMEOUT_SECS};
use medivault_client::{ClientConfig, MediVaultClient};
use medivault_core::records::UserToggle;
use medivault_core::{EmergencyReason, RequestFilter, ResponseKind, Role, ScopeTag};
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "medivault", version)]
#[command(about = "MediVault access lifecycle from the terminal")]
struct Cli {
    /// API root
    #[arg(long, env = "MEDIVAULT_API_URL", default_value = DEFAULT_API_URL, global = true)]
    api_url: String,

    /// Request timeout in seconds
    #[arg(long, env = "MEDIVAULT_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT_SECS, global = true)]
    timeout: u64,

    /// Notification poll interval in seconds (with --watch)
    #[arg(long, env = "MEDIVAULT_POLL_SECS", default_value_t = DEFAULT_POLL_SECS, global = true)]
    poll_secs: u64,

    /// Token file (default: ~/.medivault/tokens.json)
    #[arg(long, env = "MEDIVAULT_TOKEN_FILE", global = true)]
    token_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Sign in with email and password, or with phone and OTP
    Login {
        #[arg(long, conflicts_with = "phone")]
        email: Option<String>,

        #[arg(long, env = "MEDIVAULT_PASSWORD", hide_env_values = true)]
        password: Option<String>,

        /// Patient phone login; without --otp a code is requested
        #[arg(long)]
        phone: Option<String>,

        #[arg(long, requires = "phone")]
        otp: Option<String>,
    },

    /// Forget the saved session
    Logout,

    /// Show the signed-in account
    Whoami,

    /// Ask a patient for access to their records (doctor)
    Request {
        /// Patient id, e.g. MV48213377
        patient_id: String,

        /// Document categories, comma separated (ALL, PRESCRIPTION, REPORT, SCAN, DISCHARGE, VACCINATION)
        #[arg(long, value_delimiter = ',', default_value = "PRESCRIPTION")]
        scope: Vec<ScopeTag>,

        #[arg(long)]
        reason: String,

        /// Requested duration in hours (1-720)
        #[arg(long, default_value_t = 24)]
        hours: u32,
    },

    /// List access requests: incoming for patients, sent for doctors
    Requests {
        /// pending, approved, active or all
        #[arg(long, default_value = "all")]
        filter: RequestFilter,
    },

    /// Approve, reject or revoke an access request (patient)
    Respond {
        id: Uuid,

        /// approve, reject or revoke
        action: ResponseKind,

        /// Approval length in hours (24, 48, 168 or 720 offered)
        #[arg(long, default_value_t = 24)]
        hours: u32,

        #[arg(long)]
        note: Option<String>,
    },

    /// Break-glass emergency access
    #[command(subcommand)]
    Emergency(EmergencyCommand),

    /// Show notifications and mark them read
    Notifications {
        /// Keep polling until interrupted
        #[arg(long)]
        watch: bool,
    },

    /// Show the audit trail
    Audit {
        /// Filter on actor, action or document title
        #[arg(long)]
        search: Option<String>,

        /// Only emergency entries
        #[arg(long)]
        emergency: bool,
    },

    /// Account management (admin)
    #[command(subcommand)]
    Admin(AdminCommand),

    /// Emergency summary: own, or a patient's by id
    Summary { patient_id: Option<String> },
}

#[derive(Subcommand, Debug)]
enum EmergencyCommand {
    /// Grant yourself one hour of access to a patient's critical records (doctor)
    Grant {
        patient_id: String,

        /// LIFE_THREATENING, UNCONSCIOUS, MASS_CASUALTY, CRITICAL_PROCEDURE or OTHER
        #[arg(long)]
        reason: EmergencyReason,

        #[arg(long)]
        detail: String,

        /// OPD/ER token or admission id
        #[arg(long)]
        admit_id: String,
    },

    /// Own grants for doctors; every grant by review status for admins
    List,

    /// Clear or flag a grant (admin)
    Review {
        id: Uuid,

        /// Flag as misuse instead of clearing
        #[arg(long)]
        flag: bool,

        #[arg(long, default_value = "")]
        note: String,
    },
}

#[derive(Subcommand, Debug)]
enum AdminCommand {
    /// List accounts
    Users {
        #[arg(long)]
        role: Option<Role>,
    },

    /// block, unblock or approve an account
    Toggle { id: Uuid, action: UserToggle },

    /// Platform counters and the latest emergencies
    Stats,
}

fn default_token_file() -> PathBuf {
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(".medivault").join("tokens.json"),
        None => PathBuf::from(".medivault-tokens.json"),
    }
}

impl Cli {
    fn client_config(&self) -> anyhow::Result<ClientConfig> {
        let mut config = ClientConfig::new(&self.api_url)?;
        config.timeout = std::time::Duration::from_secs(self.timeout.max(1));
        config.poll_interval = std::time::Duration::from_secs(self.poll_secs.max(1));
        config.token_file = Some(self.token_file.clone().unwrap_or_else(default_token_file));
        Ok(config)
    }
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = cli.client_config()?;
    log::debug!("API {} (timeout {:?})", config.base_url, config.timeout);
    let client = MediVaultClient::new(config)?;

    match cli.command {
        Commands::Login { email, password, phone, otp } => {
            commands::login(&client, email, password, phone, otp).await
        }
        Commands::Logout => commands::logout(&client).await,
        Commands::Whoami => commands::whoami(&client).await,
        Commands::Request { patient_id, scope, reason, hours } => {
            commands::request(&client, patient_id, scope, reason, hours).await
        }
        Commands::Requests { filter } => commands::requests(&client, filter).await,
        Commands::Respond { id, action, hours, note } => {
            commands::respond(&client, id, action, hours, note).await
        }
        Commands::Emergency(EmergencyCommand::Grant { patient_id, reason, detail, admit_id }) => {
            commands::emergency_grant(&client, patient_id, reason, detail, admit_id).await
        }
        Commands::Emergency(EmergencyCommand::List) => commands::emergency_list(&client).await,
        Commands::Emergency(EmergencyCommand::Review { id, flag, note }) => {
            commands::emergency_review(&client, id, flag, note).await
        }
        Commands::Notifications { watch } => commands::notifications(&client, watch).await,
        Commands::Audit { search, emergency } => commands::audit(&client, search, emergency).await,
        Commands::Admin(AdminCommand::Users { role }) => commands::admin_users(&client, role).await,
        Commands::Admin(AdminCommand::Toggle { id, action }) => {
            commands::admin_toggle(&client, id, action).await
        }
        Commands::Admin(AdminCommand::Stats) => commands::admin_stats(&client).await,
        Commands::Summary { patient_id } => commands::summary(&client, patient_id).await,
    }
}
