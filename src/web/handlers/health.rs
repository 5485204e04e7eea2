use salvo::prelude::*;
use serde_json::json;

use crate::web::web_state;

#[handler]
pub async fn health_check(res: &mut Response) {
    res.render(Json(json!({ "status": "ok" })));
}

#[handler]
pub async fn get_status(depot: &mut Depot, res: &mut Response) {
    let state = match web_state(depot) {
        Ok(state) => state,
        Err(err) => return err.render(res),
    };

    res.render(Json(json!({
        "dashboard": {
            "status": "running",
            "uptime_seconds": state.started_at.elapsed().as_secs(),
            "version": env!("CARGO_PKG_VERSION"),
            "active_sessions": state.sessions.len(),
            "live_subscribers": state.relay.bus().subscriber_count(),
        }
    })));
}
