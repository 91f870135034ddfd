#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::backend::{
    AuthChange, AuthSession, AuthSubscription, Credentials, DriverDirectory, DriverLogin,
    DriverRecord, Identity, IdentityProvider, Registration, UserId,
};
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use chrono::{Duration as ChronoDuration, Utc};
use core_async::sync::broadcast;
use core_async::time::{Duration, Instant};
use core_auth::{AuthStore, SessionBootstrapper};
use core_runtime::config::ReconcilePolicy;
use core_runtime::events::{CoreEvent, EventBus, Receiver};
use mockall::mock;
use std::sync::{Arc, Mutex};

pub const DRIVER_ID: &str = "5d1c0a7e-driver";

mock! {
    pub Provider {}

    #[async_trait]
    impl IdentityProvider for Provider {
        async fn get_session(&self) -> BridgeResult<Option<AuthSession>>;
        fn on_auth_state_change(&self) -> AuthSubscription;
        async fn sign_in_with_password(&self, credentials: &Credentials) -> BridgeResult<AuthSession>;
        async fn sign_up(&self, registration: &Registration) -> BridgeResult<AuthSession>;
        async fn sign_out(&self) -> BridgeResult<()>;
    }
}

pub fn session(user_id: &str) -> AuthSession {
    AuthSession {
        access_token: format!("access-{user_id}"),
        refresh_token: format!("refresh-{user_id}"),
        token_type: "bearer".to_string(),
        expires_at: Utc::now() + ChronoDuration::hours(1),
        user: Identity {
            id: UserId::from(user_id),
            email: Some("a@b.com".to_string()),
        },
    }
}

pub fn driver(user_id: &str) -> DriverRecord {
    DriverRecord {
        id: UserId::from(user_id),
        email: "a@b.com".to_string(),
        full_name: "Ada Rider".to_string(),
        phone: Some("+15550100".to_string()),
        business_id: Some("biz-42".to_string()),
        is_verified: true,
        is_active: true,
        vehicle_type: Some("scooter".to_string()),
        vehicle_plate: Some("CR-1042".to_string()),
        total_deliveries: 318,
        total_earnings: 4120.75,
        is_available: true,
        avatar_url: None,
        created_at: None,
        updated_at: None,
    }
}

#[derive(Default)]
struct Script {
    /// Lookups that still fail before lookups start succeeding. `None` fails forever.
    failures_left: Option<u32>,
    lookup_delay: Duration,
    /// Answer lookups with this identity's row instead of the requested one.
    answer_as: Option<String>,
    calls: Vec<Instant>,
    in_flight: usize,
    max_in_flight: usize,
}

/// Driver directory with scripted lookup failures and a fixed account.
///
/// `login` accepts password `pw` for [`DRIVER_ID`]; `register` creates
/// `driver-new`.
pub struct FakeDirectory {
    script: Mutex<Script>,
}

impl FakeDirectory {
    pub fn succeeding() -> Arc<Self> {
        Self::succeeding_after(0)
    }

    pub fn succeeding_after(failures: u32) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(Script {
                failures_left: Some(failures),
                ..Script::default()
            }),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(Script::default()),
        })
    }

    pub fn with_lookup_delay(self: Arc<Self>, delay: Duration) -> Arc<Self> {
        self.script.lock().unwrap().lookup_delay = delay;
        self
    }

    /// Lookups succeed but return the profile of `other_id`.
    pub fn answering_as(other_id: &str) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(Script {
                failures_left: Some(0),
                answer_as: Some(other_id.to_string()),
                ..Script::default()
            }),
        })
    }

    pub fn fail_forever(&self) {
        self.script.lock().unwrap().failures_left = None;
    }

    pub fn lookups(&self) -> usize {
        self.script.lock().unwrap().calls.len()
    }

    pub fn lookup_offsets(&self, start: Instant) -> Vec<Duration> {
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
impl DriverDirectory for FakeDirectory {
    async fn get_driver_by_id(&self, id: &UserId) -> BridgeResult<DriverRecord> {
        let (fail, delay, answer_as) = {
            let mut script = self.script.lock().unwrap();
            script.calls.push(Instant::now());
            script.in_flight += 1;
            script.max_in_flight = script.max_in_flight.max(script.in_flight);
            let fail = match script.failures_left {
                Some(0) => false,
                Some(n) => {
                    script.failures_left = Some(n - 1);
                    true
                }
                None => true,
            };
            (fail, script.lookup_delay, script.answer_as.clone())
        };
        let _guard = InFlight(&self.script);

        if delay.is_zero() {
            core_async::task::yield_now().await;
        } else {
            core_async::time::sleep(delay).await;
        }

        if fail {
            Err(BridgeError::backend("driver not found"))
        } else {
            Ok(driver(answer_as.as_deref().unwrap_or(id.as_str())))
        }
    }

    async fn login(&self, credentials: &Credentials) -> BridgeResult<DriverLogin> {
        if credentials.password != "pw" {
            return Err(BridgeError::Backend {
                status: Some(400),
                message: "Invalid login credentials".to_string(),
            });
        }
        Ok(DriverLogin {
            session: session(DRIVER_ID),
            driver: driver(DRIVER_ID),
        })
    }

    async fn register(&self, registration: &Registration) -> BridgeResult<DriverLogin> {
        if registration.email.is_empty() {
            return Err(BridgeError::Backend {
                status: Some(422),
                message: "Email is required".to_string(),
            });
        }
        let mut record = driver("driver-new");
        record.full_name = registration.full_name.clone();
        record.total_deliveries = 0;
        record.total_earnings = 0.0;
        Ok(DriverLogin {
            session: session("driver-new"),
            driver: record,
        })
    }
}

pub struct Harness {
    pub bootstrapper: Arc<SessionBootstrapper>,
    pub directory: Arc<FakeDirectory>,
    pub events: Receiver<CoreEvent>,
}

pub fn harness(identity: MockProvider, directory: Arc<FakeDirectory>) -> Harness {
    let event_bus = EventBus::new(64);
    let events = event_bus.subscribe();
    let bootstrapper = Arc::new(SessionBootstrapper::new(
        Arc::new(identity),
        directory.clone(),
        AuthStore::new(),
        event_bus,
        ReconcilePolicy::default(),
    ));

    Harness {
        bootstrapper,
        directory,
        events,
    }
}

/// Identity provider whose persisted session is `session`.
pub fn identity_with_session(session: Option<AuthSession>) -> MockProvider {
    let mut identity = MockProvider::new();
    identity
        .expect_get_session()
        .returning(move || Ok(session.clone()));
    identity
}

/// Identity provider that pushes changes sent on the returned channel.
pub fn identity_with_changes() -> (MockProvider, broadcast::Sender<AuthChange>) {
    let (tx, _) = broadcast::channel(16);
    let sender = tx.clone();
    let mut identity = MockProvider::new();
    identity
        .expect_on_auth_state_change()
        .returning(move || AuthSubscription::new(sender.subscribe()));
    (identity, tx)
}

pub fn drain(events: &mut Receiver<CoreEvent>) -> Vec<CoreEvent> {
    let mut drained = Vec::new();
    while let Ok(event) = events.try_recv() {
        drained.push(event);
    }
    drained
}
