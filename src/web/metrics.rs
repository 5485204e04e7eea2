use std::sync::atomic::{AtomicU64, Ordering};

use salvo::http::header::{CONTENT_TYPE, HeaderValue};
use salvo::prelude::*;

use crate::relay::bus::events_published;
use crate::web::web_state;

static WEBHOOKS_ACCEPTED: AtomicU64 = AtomicU64::new(0);
static WEBHOOKS_REJECTED: AtomicU64 = AtomicU64::new(0);
static LOGINS_GRANTED: AtomicU64 = AtomicU64::new(0);
static LOGINS_DENIED: AtomicU64 = AtomicU64::new(0);
static LOGINS_FAILED: AtomicU64 = AtomicU64::new(0);
static PANELS_POSTED: AtomicU64 = AtomicU64::new(0);

pub struct Metrics;

impl Metrics {
    pub fn webhook_accepted() {
        WEBHOOKS_ACCEPTED.fetch_add(1, Ordering::Relaxed);
    }

    pub fn webhook_rejected() {
        WEBHOOKS_REJECTED.fetch_add(1, Ordering::Relaxed);
    }

    pub fn login_granted() {
        LOGINS_GRANTED.fetch_add(1, Ordering::Relaxed);
    }

    pub fn login_denied() {
        LOGINS_DENIED.fetch_add(1, Ordering::Relaxed);
    }

    pub fn login_failed() {
        LOGINS_FAILED.fetch_add(1, Ordering::Relaxed);
    }

    pub fn panel_posted() {
        PANELS_POSTED.fetch_add(1, Ordering::Relaxed);
    }
}

/// Point-in-time values that live outside the counters.
pub struct Gauges {
    pub uptime_seconds: u64,
    pub active_sessions: usize,
    pub live_subscribers: usize,
}

pub fn format_prometheus(gauges: &Gauges) -> String {
    format!(
        r#"# HELP dashboard_uptime_seconds Number of seconds the dashboard has been running
# TYPE dashboard_uptime_seconds gauge
dashboard_uptime_seconds {}

# HELP dashboard_active_sessions Staff sessions currently held in memory
# TYPE dashboard_active_sessions gauge
dashboard_active_sessions {}

# HELP dashboard_live_subscribers Open live-update connections
# TYPE dashboard_live_subscribers gauge
dashboard_live_subscribers {}

# HELP webhooks_accepted_total Bot webhook deliveries applied
# TYPE webhooks_accepted_total counter
webhooks_accepted_total {}

# HELP webhooks_rejected_total Bot webhook deliveries refused for bad credentials
# TYPE webhooks_rejected_total counter
webhooks_rejected_total {}

# HELP logins_granted_total Logins that produced a staff session
# TYPE logins_granted_total counter
logins_granted_total {}

# HELP logins_denied_total Logins refused by the staff allow-list
# TYPE logins_denied_total counter
logins_denied_total {}

# HELP logins_failed_total Logins aborted by an identity provider failure
# TYPE logins_failed_total counter
logins_failed_total {}

# HELP ticket_events_published_total Ticket events handed to the live-update bus
# TYPE ticket_events_published_total counter
ticket_events_published_total {}

# HELP panels_posted_total Ticket panels posted to Discord
# TYPE panels_posted_total counter
panels_posted_total {}
"#,
        gauges.uptime_seconds,
        gauges.active_sessions,
        gauges.live_subscribers,
        WEBHOOKS_ACCEPTED.load(Ordering::Relaxed),
        WEBHOOKS_REJECTED.load(Ordering::Relaxed),
        LOGINS_GRANTED.load(Ordering::Relaxed),
        LOGINS_DENIED.load(Ordering::Relaxed),
        LOGINS_FAILED.load(Ordering::Relaxed),
        events_published(),
        PANELS_POSTED.load(Ordering::Relaxed),
    )
}

#[handler]
pub async fn metrics_endpoint(depot: &mut Depot, res: &mut Response) {
    let state = match web_state(depot) {
        Ok(state) => state,
        Err(err) => return err.render(res),
    };

    let gauges = Gauges {
        uptime_seconds: state.started_at.elapsed().as_secs(),
        active_sessions: state.sessions.len(),
        live_subscribers: state.relay.bus().subscriber_count(),
    };

    res.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; version=0.0.4; charset=utf-8"),
    );
    res.body(format_prometheus(&gauges));
}
