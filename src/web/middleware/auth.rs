use salvo::prelude::*;
use secrecy::ExposeSecret;
use subtle::ConstantTimeEq;
use tracing::warn;

use crate::auth::Principal;
use crate::web::error::{ApiError, render_error};
use crate::web::metrics::Metrics;
use crate::web::{SESSION_COOKIE, web_state};

/// Resolves the session cookie to a staff `Principal` and injects it into the depot.
#[handler]
pub async fn require_staff(
    req: &mut Request,
    depot: &mut Depot,
    res: &mut Response,
    ctrl: &mut FlowCtrl,
) {
    let state = match web_state(depot) {
        Ok(state) => state.clone(),
        Err(err) => {
            err.render(res);
            ctrl.skip_rest();
            return;
        }
    };

    let principal = req
        .cookie(SESSION_COOKIE)
        .and_then(|cookie| state.sessions.current_principal(cookie.value()));
    let Some(principal) = principal else {
        res.render(Redirect::found("/login"));
        ctrl.skip_rest();
        return;
    };

    // The allow-list may have changed since login.
    if let Err(err) = state.policy.authorize(&principal) {
        warn!(
            "staff check failed user_id={} path={}",
            principal.id,
            req.uri().path()
        );
        ApiError::from(err).render(res);
        ctrl.skip_rest();
        return;
    }

    depot.inject(principal);
    ctrl.call_next(req, depot, res).await;
}

pub fn current_principal(depot: &Depot) -> Option<&Principal> {
    depot.obtain::<Principal>().ok()
}

/// Bot ingress must present `Authorization: Bearer <webhook secret>`.
#[handler]
pub async fn require_webhook_secret(
    req: &mut Request,
    depot: &mut Depot,
    res: &mut Response,
    ctrl: &mut FlowCtrl,
) {
    let state = match web_state(depot) {
        Ok(state) => state.clone(),
        Err(err) => {
            err.render(res);
            ctrl.skip_rest();
            return;
        }
    };

    let provided = req
        .header::<String>("authorization")
        .and_then(|value| value.strip_prefix("Bearer ").map(|token| token.trim().to_string()));

    let reason = match provided {
        None => Some("missing bearer token"),
        Some(token) if !constant_time_compare(&token, state.webhook_secret.expose_secret()) => {
            Some("bad bearer token")
        }
        Some(_) => None,
    };

    if let Some(reason) = reason {
        warn!(
            "webhook rejected path={} reason={}",
            req.uri().path(),
            reason
        );
        Metrics::webhook_rejected();
        render_error(res, StatusCode::UNAUTHORIZED, "unauthorized");
        ctrl.skip_rest();
        return;
    }

    ctrl.call_next(req, depot, res).await;
}

pub(crate) fn constant_time_compare(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::constant_time_compare;

    #[test]
    fn compares_whole_secret() {
        assert!(constant_time_compare("s3cret", "s3cret"));
        assert!(!constant_time_compare("s3cret", "s3creT"));
        assert!(!constant_time_compare("s3cret", "s3cret-longer"));
        assert!(!constant_time_compare("", "s3cret"));
    }
}
