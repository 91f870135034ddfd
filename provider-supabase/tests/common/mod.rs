#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use bridge_traits::storage::SecureStore;
use bridge_traits::time::Clock;
use bytes::Bytes;
use chrono::{DateTime, Duration, TimeZone, Utc};
use provider_supabase::{SessionStore, SupabaseClient, SupabaseDriverDirectory, SupabaseIdentityProvider};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

pub const BASE_URL: &str = "https://fleet.supabase.co";
pub const ANON_KEY: &str = "anon-key";
pub const USER_ID: &str = "5d1c0a7e-driver";

pub fn driver_path(id: &str) -> String {
    format!("/rest/v1/drivers?id=eq.{id}&select=*")
}

type Scripted = Result<(u16, String), String>;

/// A request as the backend saw it.
#[derive(Debug, Clone)]
pub struct Seen {
    pub method: HttpMethod,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub body: serde_json::Value,
}

/// In-process Supabase stand-in with scripted answers per method and path.
///
/// Answers queued for a route are served in order. An unscripted route
/// answers 500.
#[derive(Default)]
pub struct FakeBackend {
    routes: Mutex<HashMap<(String, String), VecDeque<Scripted>>>,
    seen: Mutex<Vec<Seen>>,
}

fn method_key(method: HttpMethod) -> String {
    format!("{method:?}")
}

impl FakeBackend {
    pub fn on(&self, method: HttpMethod, path: &str, status: u16, body: serde_json::Value) {
        self.push(method, path, Ok((status, body.to_string())));
    }

    pub fn on_transport_error(&self, method: HttpMethod, path: &str) {
        self.push(method, path, Err("connection reset".to_string()));
    }

    fn push(&self, method: HttpMethod, path: &str, answer: Scripted) {
        self.routes
            .lock()
            .unwrap()
            .entry((method_key(method), path.to_string()))
            .or_default()
            .push_back(answer);
    }

    pub fn seen(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }

    pub fn seen_paths(&self) -> Vec<String> {
        self.seen().into_iter().map(|s| s.path).collect()
    }

    pub fn last(&self, path: &str) -> Seen {
        self.seen()
            .into_iter()
            .rev()
            .find(|s| s.path == path)
            .unwrap_or_else(|| panic!("no request to {path}"))
    }
}

#[async_trait]
impl HttpClient for FakeBackend {
    async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
        let path = request
            .url
            .strip_prefix(BASE_URL)
            .unwrap_or(&request.url)
            .to_string();
        let body = request
            .body
            .as_ref()
            .and_then(|b| serde_json::from_slice(b).ok())
            .unwrap_or(serde_json::Value::Null);

        self.seen.lock().unwrap().push(Seen {
            method: request.method,
            path: path.clone(),
            headers: request.headers.clone(),
            body,
        });

        let answer = self
            .routes
            .lock()
            .unwrap()
            .get_mut(&(method_key(request.method), path))
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Ok((500, r#"{"message":"unscripted route"}"#.to_string())));

        match answer {
            Ok((status, body)) => Ok(HttpResponse {
                status,
                headers: HashMap::new(),
                body: Bytes::from(body),
            }),
            Err(message) => Err(BridgeError::OperationFailed(message)),
        }
    }
}

#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn raw(&self, key: &str) -> Option<Vec<u8>> {
        self.entries.lock().unwrap().get(key).cloned()
    }
}

#[async_trait]
impl SecureStore for MemoryStore {
    async fn set_secret(&self, key: &str, value: &[u8]) -> BridgeResult<()> {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn get_secret(&self, key: &str) -> BridgeResult<Option<Vec<u8>>> {
        Ok(self.raw(key))
    }

    async fn delete_secret(&self, key: &str) -> BridgeResult<()> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }
}

pub struct ManualClock(Mutex<DateTime<Utc>>);

impl ManualClock {
    pub fn new() -> Self {
        Self(Mutex::new(
            Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap(),
        ))
    }

    pub fn now_plus(&self, seconds: i64) -> DateTime<Utc> {
        *self.0.lock().unwrap() + Duration::seconds(seconds)
    }

    pub fn advance(&self, by: Duration) {
        *self.0.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

/// GoTrue token answer whose expiry is derived from the client clock.
pub fn token_body(user_id: &str, access_token: &str, expires_in: i64) -> serde_json::Value {
    serde_json::json!({
        "access_token": access_token,
        "token_type": "bearer",
        "expires_in": expires_in,
        "refresh_token": format!("refresh-{access_token}"),
        "user": { "id": user_id, "email": "ada@fleet.test", "aud": "authenticated" }
    })
}

pub fn driver_row(user_id: &str) -> serde_json::Value {
    serde_json::json!({
        "id": user_id,
        "email": "ada@fleet.test",
        "full_name": "Ada Rider",
        "phone": "+15550100",
        "business_id": "biz-42",
        "is_verified": true,
        "is_active": true,
        "vehicle_type": "scooter",
        "vehicle_plate": "CR-1042",
        "total_deliveries": 318,
        "total_earnings": 4120.75,
        "is_available": true,
        "avatar_url": null,
        "created_at": "2025-11-04T09:12:00Z",
        "updated_at": "2026-02-28T17:40:00Z"
    })
}

pub struct Backend {
    pub http: Arc<FakeBackend>,
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
    pub identity: Arc<SupabaseIdentityProvider>,
    pub directory: SupabaseDriverDirectory,
}

pub fn backend() -> Backend {
    let http = Arc::new(FakeBackend::default());
    let store = Arc::new(MemoryStore::default());
    let clock = Arc::new(ManualClock::new());

    let client = SupabaseClient::new(http.clone(), BASE_URL, ANON_KEY).unwrap();
    let identity = Arc::new(
        SupabaseIdentityProvider::new(client.clone(), SessionStore::new(store.clone()))
            .with_clock(clock.clone()),
    );
    let directory = SupabaseDriverDirectory::new(client, identity.clone());

    Backend {
        http,
        store,
        clock,
        identity,
        directory,
    }
}

pub const PASSWORD_GRANT: &str = "/auth/v1/token?grant_type=password";
pub const REFRESH_GRANT: &str = "/auth/v1/token?grant_type=refresh_token";
pub const SIGNUP: &str = "/auth/v1/signup";
pub const LOGOUT: &str = "/auth/v1/logout";
pub const DRIVERS: &str = "/rest/v1/drivers";
