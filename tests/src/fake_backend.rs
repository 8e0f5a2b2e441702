//! In-Memory MediVault Server
//!
//! Implements [`Transport`] so an unmodified [`MediVaultClient`] can run
//! whole lifecycles without a network:
//! - JWT-style token pairs that expire on the shared clock, with rotation
//! - Role checks on every endpoint the scenarios touch
//! - Notifications and audit entries written as side effects
//! - Optional paginated list envelopes and a switch to drop offline

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use medivault_client::client::REFRESH_PATH;
use medivault_client::{
    ApiError, ApiRequest, ApiResponse, ClientConfig, Clock, FixedClock, MediVaultClient, Method, Session, Transport,
};
use medivault_core::access::{CreateAccessRequestBody, RespondBody};
use medivault_core::audit::{AuditAction, AuditLogEntry, MarkReadBody, Notification, NotificationType};
use medivault_core::emergency::expiry_for;
use medivault_core::{AccessRequest, AccessStatus, EmergencyAccess, EmergencyGrant, ReviewDecision, Role, User};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

pub const ACCESS_TTL_HOURS: i64 = 8;
pub const REFRESH_TTL_DAYS: i64 = 7;

/// Saturday morning, 2026-03-14 09:00 UTC
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 14, 9, 0, 0).unwrap()
}

struct Account {
    user: User,
    password: String,
}

#[derive(Clone, Copy)]
struct Issued {
    user: Uuid,
    at: DateTime<Utc>,
}

#[derive(Default)]
struct State {
    accounts: Vec<Account>,
    access_tokens: HashMap<String, Issued>,
    refresh_tokens: HashMap<String, Issued>,
    requests: Vec<AccessRequest>,
    emergencies: Vec<EmergencyAccess>,
    notifications: Vec<(Uuid, Notification)>,
    audit: Vec<AuditLogEntry>,
    issued: u64,
    paginate: bool,
}

pub struct FakeBackend {
    clock: Arc<FixedClock>,
    state: Mutex<State>,
    refresh_calls: AtomicUsize,
    offline: AtomicBool,
    calls: Mutex<Vec<(Method, String)>>,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Self::at(t0())
    }

    pub fn at(now: DateTime<Utc>) -> Arc<Self> {
        Arc::new(Self {
            clock: Arc::new(FixedClock::new(now)),
            state: Mutex::new(State::default()),
            refresh_calls: AtomicUsize::new(0),
            offline: AtomicBool::new(false),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Client wired to this backend and its clock, with an empty session
    pub fn client(self: &Arc<Self>) -> MediVaultClient {
        MediVaultClient::with_parts(
            ClientConfig::default(),
            self.clone(),
            Arc::new(Session::in_memory()),
            self.clock.clone(),
        )
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn advance(&self, by: Duration) {
        self.clock.advance(by);
    }

    pub fn add_patient(&self, full_name: &str, email: &str, password: &str) -> User {
        self.add_account(Role::Patient, full_name, email, password, true)
    }

    pub fn add_doctor(&self, full_name: &str, email: &str, password: &str, approved: bool) -> User {
        self.add_account(Role::Doctor, full_name, email, password, approved)
    }

    pub fn add_admin(&self, full_name: &str, email: &str, password: &str) -> User {
        self.add_account(Role::Admin, full_name, email, password, true)
    }

    fn add_account(&self, role: Role, full_name: &str, email: &str, password: &str, approved: bool) -> User {
        let now = self.now();
        let mut state = self.state();
        let patient_id = (role == Role::Patient).then(|| format!("MV{:08}", 48_213_377 + state.accounts.len()));
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            full_name: full_name.to_string(),
            phone: None,
            role,
            patient_id,
            is_active: true,
            is_approved: approved,
            date_joined: Some(now),
            patient_profile: None,
            doctor_profile: None,
        };
        state.accounts.push(Account {
            user: user.clone(),
            password: password.to_string(),
        });
        user
    }

    /// Wrap every list in a `{count, next, previous, results}` envelope
    pub fn set_paginated(&self, paginate: bool) {
        self.state().paginate = paginate;
    }

    /// Fail every request with a network error
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Invalidate every refresh token, as a server-side logout would
    pub fn revoke_refresh_tokens(&self) {
        self.state().refresh_tokens.clear();
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    /// Requests received for `method path`
    pub fn calls_to(&self, method: Method, path: &str) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|(m, p)| *m == method && p == path)
            .count()
    }

    pub fn access_requests(&self) -> Vec<AccessRequest> {
        self.state().requests.clone()
    }

    pub fn emergencies(&self) -> Vec<EmergencyAccess> {
        self.state().emergencies.clone()
    }

    pub fn audit_entries(&self) -> Vec<AuditLogEntry> {
        self.state().audit.clone()
    }

    pub fn notifications_for(&self, user: Uuid) -> Vec<Notification> {
        self.state()
            .notifications
            .iter()
            .filter(|(recipient, _)| *recipient == user)
            .map(|(_, n)| n.clone())
            .collect()
    }

    /// Drop a notification into `user`'s bell
    pub fn push_notification(&self, user: Uuid, kind: NotificationType, title: &str) -> Notification {
        let notification = notification(kind, title, String::new(), "System", None, self.now());
        self.state().notifications.push((user, notification.clone()));
        notification
    }
}

#[async_trait]
impl Transport for FakeBackend {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        // Concurrent callers interleave here the way real round trips would
        tokio::task::yield_now().await;

        if self.offline.load(Ordering::SeqCst) {
            return Err(ApiError::Network("connection refused".to_string()));
        }
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((request.method, request.path.clone()));
        if request.method == Method::Post && request.path == REFRESH_PATH {
            self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        }

        let now = self.now();
        Ok(self.state().handle(&request, now))
    }
}

impl State {
    fn handle(&mut self, request: &ApiRequest, now: DateTime<Utc>) -> ApiResponse {
        let segments: Vec<&str> = request.path.trim_matches('/').split('/').collect();

        match (request.method, segments.as_slice()) {
            (Method::Post, ["auth", "login"]) => return self.login(request, now),
            (Method::Post, ["auth", "refresh"]) => return self.refresh(request, now),
            _ => {}
        }

        let Some(user) = self.authenticate(request.bearer.as_deref(), now) else {
            return detail(401, "Given token not valid for any token type");
        };

        match (request.method, segments.as_slice()) {
            (Method::Get, ["auth", "me"]) => ok(&user),
            (Method::Post, ["access", "request"]) => self.create_request(&user, request, now),
            (Method::Get, ["access", "my-requests"]) => {
                let mine = self.requests_where(|r| r.doctor == user.id, now);
                self.list(mine)
            }
            (Method::Get, ["access", "incoming"]) => {
                let status = query_param(request, "status");
                let incoming = self.requests_where(
                    |r| r.patient == user.id && status.as_ref().map_or(true, |s| r.status.to_string() == *s),
                    now,
                );
                self.list(incoming)
            }
            (Method::Post, ["access", "emergency"]) => self.grant(&user, request, now),
            (Method::Get, ["access", "emergency", "my"]) => {
                let mine = self.emergencies_where(|g| g.doctor == user.id, now);
                self.list(mine)
            }
            (Method::Get, ["access", "emergency", "all"]) => {
                if user.role != Role::Admin {
                    return forbidden();
                }
                let all = self.emergencies_where(|_| true, now);
                self.list(all)
            }
            (Method::Post, ["access", "emergency", id, "review"]) => self.review(&user, id, request),
            (Method::Post, ["access", id, "respond"]) => self.respond(&user, id, request, now),
            (Method::Get, ["notifications"]) => {
                let mine: Vec<Notification> = self
                    .notifications
                    .iter()
                    .rev()
                    .filter(|(recipient, _)| *recipient == user.id)
                    .map(|(_, n)| n.clone())
                    .collect();
                self.list(mine)
            }
            (Method::Get, ["notifications", "unread"]) => {
                let unread = self
                    .notifications
                    .iter()
                    .filter(|(recipient, n)| *recipient == user.id && !n.is_read)
                    .count();
                ok(&json!({ "unread_count": unread }))
            }
            (Method::Post, ["notifications", "mark-read"]) => self.mark_read(&user, request),
            (Method::Get, ["audit"]) => {
                let visible: Vec<AuditLogEntry> = self
                    .audit
                    .iter()
                    .rev()
                    .filter(|e| {
                        user.role == Role::Admin || e.actor == Some(user.id) || e.target_patient == Some(user.id)
                    })
                    .cloned()
                    .collect();
                self.list(visible)
            }
            _ => detail(404, "Not found."),
        }
    }

    fn account(&self, id: Uuid) -> Option<&Account> {
        self.accounts.iter().find(|a| a.user.id == id)
    }

    fn patient_by_code(&self, code: &str) -> Option<User> {
        self.accounts
            .iter()
            .map(|a| &a.user)
            .find(|u| u.role == Role::Patient && u.patient_id.as_deref() == Some(code.trim()))
            .cloned()
    }

    fn authenticate(&self, bearer: Option<&str>, now: DateTime<Utc>) -> Option<User> {
        let issued = self.access_tokens.get(bearer?)?;
        if now - issued.at >= Duration::hours(ACCESS_TTL_HOURS) {
            return None;
        }
        self.account(issued.user)
            .map(|a| a.user.clone())
            .filter(|u| u.is_active)
    }

    fn next_token(&mut self, kind: &str) -> String {
        self.issued += 1;
        format!("{}-{}", kind, self.issued)
    }

    fn login(&mut self, request: &ApiRequest, now: DateTime<Utc>) -> ApiResponse {
        let body = request.json().cloned().unwrap_or(Value::Null);
        let email = body["email"].as_str().unwrap_or_default();
        let password = body["password"].as_str().unwrap_or_default();
        let found = self
            .accounts
            .iter()
            .find(|a| a.user.email == email && a.password == password && a.user.is_active)
            .map(|a| a.user.id);
        let Some(user) = found else {
            return detail(401, "No active account found with the given credentials");
        };

        let access = self.next_token("access");
        let refresh = self.next_token("refresh");
        self.access_tokens.insert(access.clone(), Issued { user, at: now });
        self.refresh_tokens.insert(refresh.clone(), Issued { user, at: now });
        ok(&json!({ "access": access, "refresh": refresh }))
    }

    /// Rotating refresh: the presented token is spent
    fn refresh(&mut self, request: &ApiRequest, now: DateTime<Utc>) -> ApiResponse {
        let presented = request
            .json()
            .and_then(|body| body["refresh"].as_str())
            .unwrap_or_default()
            .to_string();
        let issued = match self.refresh_tokens.remove(&presented) {
            Some(issued) if now - issued.at < Duration::days(REFRESH_TTL_DAYS) => issued,
            _ => return detail(401, "Token is invalid or expired"),
        };

        let access = self.next_token("access");
        let refresh = self.next_token("refresh");
        self.access_tokens.insert(access.clone(), Issued { user: issued.user, at: now });
        self.refresh_tokens.insert(refresh.clone(), Issued { user: issued.user, at: now });
        ok(&json!({ "access": access, "refresh": refresh }))
    }

    fn requests_where(&self, keep: impl Fn(&AccessRequest) -> bool, now: DateTime<Utc>) -> Vec<AccessRequest> {
        self.requests
            .iter()
            .rev()
            .filter(|r| keep(r))
            .cloned()
            .map(|mut r| {
                r.server_is_active = r.is_active(now);
                r
            })
            .collect()
    }

    fn emergencies_where(&self, keep: impl Fn(&EmergencyAccess) -> bool, now: DateTime<Utc>) -> Vec<EmergencyAccess> {
        self.emergencies
            .iter()
            .rev()
            .filter(|g| keep(g))
            .cloned()
            .map(|mut g| {
                g.server_is_active = g.is_active(now);
                g
            })
            .collect()
    }

    fn list<T: Serialize>(&self, items: Vec<T>) -> ApiResponse {
        if self.paginate {
            ok(&json!({
                "count": items.len(),
                "next": null,
                "previous": null,
                "results": items,
            }))
        } else {
            ok(&items)
        }
    }

    fn create_request(&mut self, doctor: &User, request: &ApiRequest, now: DateTime<Utc>) -> ApiResponse {
        if doctor.role != Role::Doctor || !doctor.is_approved {
            return forbidden();
        }
        let body: CreateAccessRequestBody = match parse(request) {
            Ok(body) => body,
            Err(rejected) => return rejected,
        };
        let Some(patient) = self.patient_by_code(&body.patient_id) else {
            return no_such_patient();
        };

        let created = AccessRequest {
            id: Uuid::new_v4(),
            doctor: doctor.id,
            doctor_name: doctor.full_name.clone(),
            patient: patient.id,
            patient_name: patient.full_name.clone(),
            patient_id_code: patient.patient_id.clone(),
            status: AccessStatus::Pending,
            scope: body.scope,
            reason: body.reason,
            patient_note: String::new(),
            requested_at: now,
            responded_at: None,
            expires_at: None,
            server_is_active: false,
        };
        self.notifications.push((
            patient.id,
            notification(
                NotificationType::AccessRequest,
                "New access request",
                format!("Dr. {} requested access to your records", doctor.full_name),
                &doctor.full_name,
                Some(created.id),
                now,
            ),
        ));
        self.record(doctor, &patient, AuditAction::AccessRequest, false, now);
        self.requests.push(created.clone());
        respond_json(201, &created)
    }

    fn respond(&mut self, patient: &User, id: &str, request: &ApiRequest, now: DateTime<Utc>) -> ApiResponse {
        let body: RespondBody = match parse(request) {
            Ok(body) => body,
            Err(rejected) => return rejected,
        };
        let id = Uuid::parse_str(id).ok();
        let Some(index) = self
            .requests
            .iter()
            .position(|r| Some(r.id) == id && r.patient == patient.id)
        else {
            return detail(404, "Not found.");
        };

        let mut updated = self.requests[index].clone();
        if let Err(e) = updated.apply_response(&body.to_response(), now) {
            return respond_json(400, &json!({ "error": e.to_string() }));
        }
        if let Some(note) = body.patient_note {
            updated.patient_note = note;
        }
        self.requests[index] = updated.clone();

        let (kind, verb, action) = match updated.status {
            AccessStatus::Approved => (NotificationType::AccessApproved, "approved", AuditAction::AccessApprove),
            AccessStatus::Rejected => (NotificationType::AccessRejected, "rejected", AuditAction::AccessReject),
            _ => (NotificationType::AccessRevoked, "revoked", AuditAction::AccessRevoke),
        };
        self.notifications.push((
            updated.doctor,
            notification(
                kind,
                &format!("Access {}", verb),
                format!("{} {} your access request", patient.full_name, verb),
                &patient.full_name,
                Some(updated.id),
                now,
            ),
        ));
        self.record(patient, patient, action, false, now);
        ok(&updated)
    }

    fn grant(&mut self, doctor: &User, request: &ApiRequest, now: DateTime<Utc>) -> ApiResponse {
        if doctor.role != Role::Doctor || !doctor.is_approved {
            return forbidden();
        }
        let body: EmergencyGrant = match parse(request) {
            Ok(body) => body,
            Err(rejected) => return rejected,
        };
        let Some(patient) = self.patient_by_code(&body.patient_id) else {
            return no_such_patient();
        };

        let granted = EmergencyAccess {
            id: Uuid::new_v4(),
            doctor: doctor.id,
            doctor_name: doctor.full_name.clone(),
            patient: patient.id,
            patient_name: patient.full_name.clone(),
            reason_code: body.reason_code,
            reason_detail: body.reason_detail,
            patient_admit_id: body.patient_admit_id,
            granted_at: now,
            expires_at: expiry_for(now),
            server_is_active: true,
            is_reviewed_by_admin: false,
            is_flagged_misuse: false,
            admin_note: String::new(),
        };

        let admins: Vec<Uuid> = self
            .accounts
            .iter()
            .filter(|a| a.user.role == Role::Admin)
            .map(|a| a.user.id)
            .collect();
        for recipient in std::iter::once(patient.id).chain(admins) {
            self.notifications.push((
                recipient,
                notification(
                    NotificationType::EmergencyAccess,
                    "Emergency access",
                    format!("Dr. {} used emergency access to {}", doctor.full_name, patient.full_name),
                    &doctor.full_name,
                    Some(granted.id),
                    now,
                ),
            ));
        }
        self.record(doctor, &patient, AuditAction::EmergencyAccess, true, now);
        self.emergencies.push(granted.clone());
        respond_json(201, &granted)
    }

    fn review(&mut self, admin: &User, id: &str, request: &ApiRequest) -> ApiResponse {
        if admin.role != Role::Admin {
            return forbidden();
        }
        let decision: ReviewDecision = match parse(request) {
            Ok(decision) => decision,
            Err(rejected) => return rejected,
        };
        let id = Uuid::parse_str(id).ok();
        let Some(grant) = self.emergencies.iter_mut().find(|g| Some(g.id) == id) else {
            return detail(404, "Not found.");
        };
        if let Err(e) = grant.apply_review(&decision) {
            return respond_json(400, &json!({ "error": e.to_string() }));
        }
        ok(&*grant)
    }

    fn mark_read(&mut self, user: &User, request: &ApiRequest) -> ApiResponse {
        let body: MarkReadBody = match parse(request) {
            Ok(body) => body,
            Err(rejected) => return rejected,
        };
        for (recipient, n) in self.notifications.iter_mut() {
            if *recipient == user.id && (body.ids.is_empty() || body.ids.contains(&n.id)) {
                n.is_read = true;
            }
        }
        ok(&json!({ "status": "ok" }))
    }

    fn record(&mut self, actor: &User, patient: &User, action: AuditAction, is_emergency: bool, now: DateTime<Utc>) {
        self.audit.push(AuditLogEntry {
            id: Uuid::new_v4(),
            actor: Some(actor.id),
            actor_name: actor.full_name.clone(),
            target_patient: Some(patient.id),
            patient_name: Some(patient.full_name.clone()),
            action,
            document_id: None,
            document_title: String::new(),
            is_emergency,
            ip_address: Some("127.0.0.1".to_string()),
            extra_data: json!({}),
            created_at: now,
        });
    }
}

fn notification(
    kind: NotificationType,
    title: &str,
    message: String,
    actor: &str,
    reference: Option<Uuid>,
    now: DateTime<Utc>,
) -> Notification {
    Notification {
        id: Uuid::new_v4(),
        notification_type: kind,
        title: title.to_string(),
        message,
        is_read: false,
        actor_name: actor.to_string(),
        reference_id: reference,
        created_at: now,
    }
}

fn query_param(request: &ApiRequest, name: &str) -> Option<String> {
    request
        .query
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.clone())
}

fn parse<T: DeserializeOwned>(request: &ApiRequest) -> Result<T, ApiResponse> {
    let body = request.json().cloned().unwrap_or(Value::Null);
    serde_json::from_value(body).map_err(|e| respond_json(400, &json!({ "non_field_errors": [e.to_string()] })))
}

fn respond_json<T: Serialize + ?Sized>(status: u16, body: &T) -> ApiResponse {
    ApiResponse::new(status, serde_json::to_vec(body).unwrap_or_default())
}

fn ok<T: Serialize + ?Sized>(body: &T) -> ApiResponse {
    respond_json(200, body)
}

fn detail(status: u16, message: &str) -> ApiResponse {
    respond_json(status, &json!({ "detail": message }))
}

fn forbidden() -> ApiResponse {
    detail(403, "You do not have permission to perform this action.")
}

fn no_such_patient() -> ApiResponse {
    respond_json(400, &json!({ "patient_id": ["No patient found with this ID."] }))
}
