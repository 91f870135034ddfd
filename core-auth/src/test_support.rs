//! Fixtures shared by the unit tests of this crate.

use async_trait::async_trait;
use bridge_traits::backend::{
    AuthSession, Credentials, DriverDirectory, DriverLogin, DriverRecord, Identity, Registration,
    UserId,
};
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use chrono::{Duration as ChronoDuration, Utc};
use core_async::time::{Duration, Instant};
use std::sync::Mutex;

pub fn session(user_id: &str) -> AuthSession {
    AuthSession {
        access_token: format!("access-{user_id}"),
        refresh_token: format!("refresh-{user_id}"),
        token_type: "bearer".to_string(),
        expires_at: Utc::now() + ChronoDuration::hours(1),
        user: Identity {
            id: UserId::from(user_id),
            email: Some(format!("{user_id}@fleet.test")),
        },
    }
}

pub fn driver(user_id: &str) -> DriverRecord {
    DriverRecord {
        id: UserId::from(user_id),
        email: format!("{user_id}@fleet.test"),
        full_name: "Test Driver".to_string(),
        phone: None,
        business_id: None,
        is_verified: true,
        is_active: true,
        vehicle_type: Some("bike".to_string()),
        vehicle_plate: None,
        total_deliveries: 12,
        total_earnings: 240.5,
        is_available: false,
        avatar_url: None,
        created_at: None,
        updated_at: None,
    }
}

#[derive(Default)]
struct Script {
    /// Lookups that still fail before the first success. `None` fails forever.
    failures_left: Option<u32>,
    calls: Vec<Instant>,
    in_flight: usize,
    max_in_flight: usize,
}

/// Driver directory whose lookups fail a scripted number of times.
pub struct ScriptedDirectory {
    script: Mutex<Script>,
}

impl ScriptedDirectory {
    pub fn succeeding_after(failures: u32) -> Self {
        Self {
            script: Mutex::new(Script {
                failures_left: Some(failures),
                ..Script::default()
            }),
        }
    }

    pub fn always_failing() -> Self {
        Self {
            script: Mutex::new(Script::default()),
        }
    }

    pub fn succeed_from_now(&self) {
        self.script.lock().unwrap().failures_left = Some(0);
    }

    pub fn calls(&self) -> usize {
        self.script.lock().unwrap().calls.len()
    }

    pub fn call_offsets(&self, start: Instant) -> Vec<Duration> {
        self.script
            .lock()
            .unwrap()
            .calls
            .iter()
            .map(|at| at.duration_since(start))
            .collect()
    }

    pub fn max_in_flight(&self) -> usize {
        self.script.lock().unwrap().max_in_flight
    }
}

struct InFlight<'a>(&'a Mutex<Script>);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.lock().unwrap().in_flight -= 1;
    }
}

#[async_trait]
impl DriverDirectory for ScriptedDirectory {
    async fn get_driver_by_id(&self, id: &UserId) -> BridgeResult<DriverRecord> {
        let fail = {
            let mut script = self.script.lock().unwrap();
            script.calls.push(Instant::now());
            script.in_flight += 1;
            script.max_in_flight = script.max_in_flight.max(script.in_flight);
            match script.failures_left {
                Some(0) => false,
                Some(n) => {
                    script.failures_left = Some(n - 1);
                    true
                }
                None => true,
            }
        };
        let _guard = InFlight(&self.script);
        core_async::task::yield_now().await;

        if fail {
            Err(BridgeError::backend("upstream timeout"))
        } else {
            Ok(driver(id.as_str()))
        }
    }

    async fn login(&self, _credentials: &Credentials) -> BridgeResult<DriverLogin> {
        Err(BridgeError::NotAvailable("login".to_string()))
    }

    async fn register(&self, _registration: &Registration) -> BridgeResult<DriverLogin> {
        Err(BridgeError::NotAvailable("register".to_string()))
    }
}
