//! Authenticated request pipeline
//!
//! Every call goes through [`MediVaultClient::send`], which attaches the
//! bearer token and, on a 401, refreshes once and retries once. Concurrent
//! 401s are serialised on the session's refresh lock; a caller that waited
//! re-uses the token the first caller obtained instead of refreshing again.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use medivault_core::session::{self as gate, Action};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::clock::{Clock, SystemClock};
use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::inflight::InFlight;
use crate::session::{FileTokenStore, MemoryTokenStore, RefreshedTokens, Session, TokenStore};
use crate::transport::{ApiRequest, ApiResponse, ReqwestTransport, Transport};

pub const REFRESH_PATH: &str = "/auth/refresh/";

/// List body: a bare array or a paginated `{ "results": [...] }` envelope
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ListPayload<T> {
    Bare(Vec<T>),
    Page { results: Vec<T> },
}

impl<T> ListPayload<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            ListPayload::Page { results } => results,
            ListPayload::Bare(items) => items,
        }
    }
}

#[derive(Clone)]
pub struct MediVaultClient {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    session: Arc<Session>,
    clock: Arc<dyn Clock>,
    inflight: InFlight,
}

impl std::fmt::Debug for MediVaultClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediVaultClient")
            .field("base_url", &self.config.base_url)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

impl MediVaultClient {
    /// Client over HTTP, with tokens in `config.token_file` when set
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        let transport = ReqwestTransport::new(&config)?;
        let store: Box<dyn TokenStore> = match &config.token_file {
            Some(path) => Box::new(FileTokenStore::new(path)),
            None => Box::new(MemoryTokenStore::new()),
        };
        let session = Session::new(store);
        Ok(Self::with_parts(
            config,
            Arc::new(transport),
            Arc::new(session),
            Arc::new(SystemClock),
        ))
    }

    pub fn with_parts(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        session: Arc<Session>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            transport,
            session,
            clock,
            inflight: InFlight::new(),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn inflight(&self) -> &InFlight {
        &self.inflight
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Local role gate against the cached user. Without a cached user the
    /// server decides alone.
    pub async fn require_action(&self, action: Action) -> Result<(), ApiError> {
        match self.session.user().await {
            Some(user) => Ok(gate::require(&user, action)?),
            None => Ok(()),
        }
    }

    /// Authenticated request with one refresh-and-retry on 401
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let token = self.session.access_token().await;
        let response = self
            .transport
            .execute(request.clone().with_bearer(token.clone()))
            .await?;
        if response.status != 401 {
            return check(response);
        }
        let Some(stale) = token else {
            return Err(ApiError::from_response(response.status, &response.body));
        };

        log::debug!("{} {} returned 401, refreshing", request.method, request.path);
        let fresh = self.refresh_access(&stale).await?;
        let retried = self.transport.execute(request.with_bearer(Some(fresh))).await?;
        check(retried)
    }

    /// Request without credentials: login, registration, OTP
    pub async fn send_public(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        check(self.transport.execute(request.with_bearer(None)).await?)
    }

    async fn refresh_access(&self, stale: &str) -> Result<String, ApiError> {
        let _refreshing = self.session.lock_refresh().await;

        match self.session.tokens().await {
            None => Err(ApiError::Auth("session ended".to_string())),
            Some(tokens) if tokens.access != stale => {
                log::debug!("Re-using token refreshed by a concurrent request");
                Ok(tokens.access)
            }
            Some(tokens) => {
                let outcome = self.exchange_refresh(&tokens.refresh).await;
                match outcome {
                    Ok(refreshed) => match self.session.apply_refresh(refreshed).await {
                        Some(pair) => {
                            log::info!("Access token refreshed");
                            Ok(pair.access)
                        }
                        None => Err(ApiError::Auth("session ended".to_string())),
                    },
                    Err(e) => {
                        log::warn!("Token refresh failed, ending session: {}", e);
                        self.session.teardown().await;
                        Err(ApiError::Auth(format!("session expired: {}", e)))
                    }
                }
            }
        }
    }

    async fn exchange_refresh(&self, refresh: &str) -> Result<RefreshedTokens, ApiError> {
        let request = ApiRequest::post(REFRESH_PATH, json!({ "refresh": refresh }));
        let response = self.transport.execute(request).await?;
        check(response)?.json()
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.send(ApiRequest::get(path)).await?.json()
    }

    pub async fn get_with<T: DeserializeOwned>(
        &self,
        path: &str,
        query: Vec<(String, String)>,
    ) -> Result<T, ApiError> {
        self.send(ApiRequest::get(path).with_query(query)).await?.json()
    }

    pub async fn get_list<T: DeserializeOwned>(
        &self,
        path: &str,
        query: Vec<(String, String)>,
    ) -> Result<Vec<T>, ApiError> {
        let payload: ListPayload<T> = self.get_with(path, query).await?;
        Ok(payload.into_vec())
    }

    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        let body = serde_json::to_value(body)?;
        self.send(ApiRequest::post(path, body)).await?.json()
    }

    pub async fn patch<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        let body = serde_json::to_value(body)?;
        self.send(ApiRequest::patch(path, body)).await?.json()
    }

    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.send(ApiRequest::delete(path)).await?;
        Ok(())
    }
}

fn check(response: ApiResponse) -> Result<ApiResponse, ApiError> {
    if response.is_success() {
        Ok(response)
    } else {
        Err(ApiError::from_response(response.status, &response.body))
    }
}
