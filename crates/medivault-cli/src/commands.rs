use anyhow::{bail, Context, Result};
use colored::*;
use medivault_client::{AdminDashboard, AdminEmergencyBoard, DoctorBoard, MediVaultClient, NotificationPoller, PatientAccessBoard};
use medivault_core::audit::{emergency_entries, filter_entries};
use medivault_core::records::UserToggle;
use medivault_core::{
    AuditLogEntry, EmergencyGrant, EmergencyReason, NewAccessRequest, RequestFilter, Response, ResponseKind, ReviewDecision, Role,
    ScopeSelection, ScopeTag, User,
};
use uuid::Uuid;

use crate::render;

/// Signed-in user, restored from the token file
async fn signed_in(client: &MediVaultClient) -> Result<User> {
    match client.restore().await? {
        Some(user) => Ok(user),
        None => bail!("not signed in; run `medivault login` first"),
    }
}

pub async fn login(
    client: &MediVaultClient,
    email: Option<String>,
    password: Option<String>,
    phone: Option<String>,
    otp: Option<String>,
) -> Result<()> {
    let user = match (email, phone, otp) {
        (_, Some(phone), None) => {
            let sent = client.request_otp(&phone).await?;
            println!("{}", sent.message);
            if let Some(code) = sent.otp {
                println!("  Development code: {}", code.yellow().bold());
            }
            println!("Run `medivault login --phone {} --otp <code>` to finish.", phone);
            return Ok(());
        }
        (_, Some(phone), Some(otp)) => client.verify_otp(&phone, &otp).await?,
        (Some(email), None, _) => {
            let password = password.context("--password (or MEDIVAULT_PASSWORD) is required")?;
            client.login(&email, &password).await?
        }
        (None, None, _) => bail!("pass --email and --password, or --phone"),
    };
    println!("{} {}", "Signed in:".green().bold(), render::user_line(&user));
    if user.role == Role::Doctor && !user.is_approved {
        println!("{}", "Your account is awaiting admin approval; requests and emergency access are disabled.".yellow());
    }
    Ok(())
}

pub async fn logout(client: &MediVaultClient) -> Result<()> {
    client.logout().await;
    println!("Signed out.");
    Ok(())
}

pub async fn whoami(client: &MediVaultClient) -> Result<()> {
    let user = signed_in(client).await?;
    println!("{}", render::user_line(&user));
    let actions = medivault_core::session::permitted_actions(&user);
    if !actions.is_empty() {
        println!("  May: {}", actions.iter().map(|a| a.to_string()).collect::<Vec<_>>().join(", "));
    }
    Ok(())
}

pub async fn request(
    client: &MediVaultClient,
    patient_id: String,
    scope: Vec<ScopeTag>,
    reason: String,
    hours: u32,
) -> Result<()> {
    signed_in(client).await?;
    let selection: ScopeSelection = scope.into_iter().collect();
    let form = NewAccessRequest::new(patient_id, selection, reason, hours);
    let created = client.create_access_request(&form).await?;
    println!(
        "{} request {} for {} [{}], {}h",
        "Sent".green().bold(),
        created.id,
        created.patient_name,
        created.scope_label(),
        hours
    );
    Ok(())
}

pub async fn requests(client: &MediVaultClient, filter: RequestFilter) -> Result<()> {
    let user = signed_in(client).await?;
    let now = client.now();
    match user.role {
        Role::Patient => {
            let board = PatientAccessBoard::load(client).await;
            render::heading(&format!(
                "ACCESS REQUESTS  ({} pending, {} active)",
                board.pending_count(),
                board.active_count(now)
            ));
            for request in board.filtered(filter, now) {
                println!("{}", render::access_request_line(request, Role::Patient, now));
            }
        }
        Role::Doctor => {
            let board = DoctorBoard::load(client).await;
            render::heading(&format!(
                "MY REQUESTS  ({} pending, {} active)",
                board.pending_requests(now).len(),
                board.active_requests(now).len()
            ));
            for request in filter.apply(&board.requests, now) {
                println!("{}", render::access_request_line(request, Role::Doctor, now));
            }
        }
        Role::Admin => bail!("admins do not have access requests; see `medivault emergency list`"),
    }
    Ok(())
}

pub async fn respond(
    client: &MediVaultClient,
    id: Uuid,
    action: ResponseKind,
    hours: u32,
    note: Option<String>,
) -> Result<()> {
    signed_in(client).await?;
    let response = match action {
        ResponseKind::Approve => Response::Approve { duration_hours: hours },
        ResponseKind::Reject => Response::Reject,
        ResponseKind::Revoke => Response::Revoke,
    };
    let mut board = PatientAccessBoard::load(client).await;
    let updated = board.respond(client, id, &response, note).await?;
    println!(
        "{} {}",
        format!("{}:", updated.badge(client.now())).green().bold(),
        render::access_request_line(&updated, Role::Patient, client.now())
    );
    Ok(())
}

pub async fn emergency_grant(
    client: &MediVaultClient,
    patient_id: String,
    reason: EmergencyReason,
    detail: String,
    admit_id: String,
) -> Result<()> {
    signed_in(client).await?;
    let grant = EmergencyGrant::new(patient_id, reason, detail, admit_id);
    let granted = client.grant_emergency(&grant).await?;
    println!("{}", "EMERGENCY ACCESS GRANTED".red().bold());
    println!("  {}", render::emergency_line(&granted, client.now()));
    println!("  This access is logged and will be reviewed by an administrator.");
    Ok(())
}

pub async fn emergency_list(client: &MediVaultClient) -> Result<()> {
    let user = signed_in(client).await?;
    let now = client.now();
    if user.role == Role::Admin {
        let board = AdminEmergencyBoard::load(client).await;
        render::heading(&format!("EMERGENCY ACCESS  ({} awaiting review)", board.unreviewed_count()));
        for (title, grants) in [
            ("Pending Review", &board.buckets.pending_review),
            ("Reviewed", &board.buckets.cleared),
            ("Flagged", &board.buckets.flagged),
        ] {
            if grants.is_empty() {
                continue;
            }
            println!("{}", title.bold());
            for grant in grants {
                println!("  {}", render::emergency_line(grant, now));
            }
        }
    } else {
        let board = DoctorBoard::load(client).await;
        render::heading(&format!("MY EMERGENCY ACCESS  ({} active)", board.active_emergencies(now).len()));
        for grant in &board.emergencies {
            println!("{}", render::emergency_line(grant, now));
        }
    }
    Ok(())
}

pub async fn emergency_review(client: &MediVaultClient, id: Uuid, flag: bool, note: String) -> Result<()> {
    signed_in(client).await?;
    let decision = if flag {
        ReviewDecision::flag(note)
    } else {
        ReviewDecision::clear(note)
    };
    let mut board = AdminEmergencyBoard::load(client).await;
    let reviewed = board.review(client, id, &decision).await?;
    println!("{}", render::emergency_line(&reviewed, client.now()));
    println!("{} still awaiting review.", board.unreviewed_count());
    Ok(())
}

pub async fn notifications(client: &MediVaultClient, watch: bool) -> Result<()> {
    signed_in(client).await?;
    let mut feed = client.notification_feed().await?;
    render::heading(&format!("NOTIFICATIONS  ({} unread)", feed.unread_count));
    for notification in &feed.items {
        println!("{}", render::notification_line(notification));
    }
    let marked = client.open_notifications(&mut feed).await?;
    if marked > 0 {
        println!("Marked {} as read.", marked);
    }

    if watch {
        let poller = NotificationPoller::spawn(client.clone());
        let mut updates = poller.subscribe();
        let mut session = client.session().subscribe();
        println!("{}", "Watching for notifications (Ctrl-C to stop)...".dimmed());
        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => break,
                changed = session.changed() => {
                    if changed.is_err() || !client.session().is_logged_in() {
                        println!("{}", "Session ended.".yellow());
                        break;
                    }
                }
                changed = updates.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let mut latest = updates.borrow_and_update().clone();
                    for notification in latest.unread() {
                        println!("{}", render::notification_line(notification));
                    }
                    client.open_notifications(&mut latest).await?;
                }
            }
        }
        poller.cancel();
    }
    Ok(())
}

pub async fn audit(client: &MediVaultClient, search: Option<String>, emergency: bool) -> Result<()> {
    signed_in(client).await?;
    let entries = client.audit_log().await?;
    let pool: Vec<AuditLogEntry> = if emergency {
        emergency_entries(&entries).into_iter().cloned().collect()
    } else {
        entries.clone()
    };
    let shown = filter_entries(&pool, search.as_deref().unwrap_or(""));
    render::heading(&format!("AUDIT LOG  ({} of {})", shown.len(), entries.len()));
    for entry in shown {
        println!("{}", render::audit_line(entry));
    }
    Ok(())
}

pub async fn admin_users(client: &MediVaultClient, role: Option<Role>) -> Result<()> {
    signed_in(client).await?;
    let users = client.admin_users(role).await?;
    render::heading(&format!("USERS  ({})", users.len()));
    for user in &users {
        println!("{}  {}", user.id, render::user_line(user));
    }
    Ok(())
}

pub async fn admin_toggle(client: &MediVaultClient, id: Uuid, action: UserToggle) -> Result<()> {
    signed_in(client).await?;
    let user = client.toggle_user(id, action).await?;
    println!("{} {}", "Updated:".green().bold(), render::user_line(&user));
    Ok(())
}

pub async fn admin_stats(client: &MediVaultClient) -> Result<()> {
    signed_in(client).await?;
    let dashboard = AdminDashboard::load(client).await;
    render::heading("PLATFORM");
    render::print_stats(&dashboard.stats);
    if !dashboard.recent_emergencies.is_empty() {
        println!();
        println!("{}", "Recent emergency access".bold());
        for grant in &dashboard.recent_emergencies {
            println!("  {}", render::emergency_line(grant, client.now()));
        }
    }
    Ok(())
}

pub async fn summary(client: &MediVaultClient, patient_id: Option<String>) -> Result<()> {
    signed_in(client).await?;
    let summary = client.emergency_summary(patient_id.as_deref()).await?;
    render::print_summary(&summary);
    Ok(())
}
