//! Terminal rendering

use chrono::{DateTime, Utc};
use colored::*;
use medivault_core::records::{AdminStats, EmergencySummary};
use medivault_core::{AccessRequest, AuditLogEntry, EmergencyAccess, Notification, ReviewStatus, Role, User};

pub fn rule() -> String {
    "─".repeat(60)
}

pub fn heading(title: &str) {
    println!("{}", rule());
    println!("{}", title.green().bold());
    println!("{}", rule());
}

pub fn user_line(user: &User) -> String {
    let mut line = format!("{} <{}> [{}]", user.display_name(), user.email, user.role);
    if let Some(patient_id) = &user.patient_id {
        line.push_str(&format!(" {}", patient_id));
    }
    if !user.is_active {
        line.push_str(" blocked");
    } else if !user.is_approved {
        line.push_str(" awaiting approval");
    }
    line
}

fn badge(label: &str) -> ColoredString {
    match label {
        "Pending" | "Pending Review" => label.yellow(),
        "Active" | "Reviewed" => label.green(),
        "Flagged" => label.red().bold(),
        _ => label.dimmed(),
    }
}

/// The other party on a request, as seen by `viewer`
fn counterpart(request: &AccessRequest, viewer: Role) -> String {
    match viewer {
        Role::Patient => format!("Dr. {}", request.doctor_name.trim_start_matches("Dr. ")),
        Role::Doctor | Role::Admin => match &request.patient_id_code {
            Some(code) => format!("{} ({})", request.patient_name, code),
            None => request.patient_name.clone(),
        },
    }
}

pub fn access_request_line(request: &AccessRequest, viewer: Role, now: DateTime<Utc>) -> String {
    let counterpart = counterpart(request, viewer);
    let mut line = format!(
        "{}  {:<9} {}  [{}]  {}",
        request.id,
        badge(request.badge(now)),
        counterpart,
        request.scope_label(),
        request.reason
    );
    if request.is_active(now) {
        line.push_str(&format!("  ({})", request.time_left_label(now)));
    }
    line
}

pub fn emergency_line(grant: &EmergencyAccess, now: DateTime<Utc>) -> String {
    let window = if grant.is_active(now) {
        format!("{} left", grant.countdown_label(now)).red().bold().to_string()
    } else {
        "expired".dimmed().to_string()
    };
    let status: ReviewStatus = grant.review_status();
    format!(
        "{}  {:<14} {} → {}  {} ({})  {}",
        grant.id,
        badge(status.label()),
        grant.doctor_name,
        grant.patient_name,
        grant.reason_code.label(),
        grant.patient_admit_id,
        window
    )
}

pub fn notification_line(notification: &Notification) -> String {
    let marker = if notification.is_read { " " } else { "●" };
    let title = if notification.notification_type.is_alert() {
        notification.title.red().bold()
    } else if notification.is_read {
        notification.title.normal()
    } else {
        notification.title.bold()
    };
    format!(
        "{} {}  {}  {}",
        marker.cyan(),
        notification.created_at.format("%Y-%m-%d %H:%M"),
        title,
        notification.message
    )
}

pub fn audit_line(entry: &AuditLogEntry) -> String {
    let action = if entry.is_emergency {
        entry.action.label().red().bold()
    } else {
        entry.action.label().normal()
    };
    let mut line = format!(
        "{}  {:<20} {}",
        entry.created_at.format("%Y-%m-%d %H:%M"),
        entry.actor_name,
        action
    );
    if let Some(patient) = &entry.patient_name {
        line.push_str(&format!("  patient: {}", patient));
    }
    if !entry.document_title.is_empty() {
        line.push_str(&format!("  \"{}\"", entry.document_title));
    }
    line
}

pub fn print_stats(stats: &AdminStats) {
    println!("  Patients:                 {}", stats.total_patients.to_string().cyan());
    println!("  Doctors:                  {}", stats.total_doctors.to_string().cyan());
    println!("  Documents:                {}", stats.total_documents.to_string().cyan());
    println!("  Emergency accesses today: {}", stats.emergency_accesses_today.to_string().red());
    println!("  Pending access requests:  {}", stats.pending_access_requests.to_string().yellow());
    println!("  Doctors awaiting approval: {}", stats.pending_doctor_approvals.to_string().yellow());
}

pub fn print_summary(summary: &EmergencySummary) {
    heading(&format!("EMERGENCY SUMMARY: {}", summary.full_name.to_uppercase()));
    if let Some(patient_id) = &summary.patient_id {
        println!("  Patient id:   {}", patient_id);
    }
    println!("  Blood group:  {}", summary.blood_group.red().bold());
    println!("  Allergies:    {}", or_none(&summary.allergy_list().join(", ")));
    println!("  Conditions:   {}", or_none(&summary.condition_list().join(", ")));
    println!("  Medications:  {}", or_none(&summary.current_medications));
    if !summary.special_notes.is_empty() {
        println!("  Notes:        {}", summary.special_notes);
    }
    let contact = &summary.emergency_contact;
    if !contact.name.is_empty() {
        println!("  Contact:      {} ({}) {}", contact.name, contact.relation, contact.phone);
    }
    if !summary.critical_documents.is_empty() {
        println!("  Critical documents:");
        for document in &summary.critical_documents {
            println!("    {}  {}  {}", document.document_date, document.document_type.wire_name(), document.title);
        }
    }
}

fn or_none(value: &str) -> String {
    if value.trim().is_empty() {
        "none recorded".dimmed().to_string()
    } else {
        value.to_string()
    }
}
