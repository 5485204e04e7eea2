use salvo::http::cookie::{Cookie, SameSite};
use salvo::prelude::*;
use serde_json::json;
use uuid::Uuid;

use crate::auth::{AuthError, authenticate};
use crate::web::error::{ApiError, render_error};
use crate::web::metrics::Metrics;
use crate::web::middleware::auth::{constant_time_compare, current_principal};
use crate::web::{LOGIN_STATE_COOKIE, SESSION_COOKIE, WebState, web_state};

const LOGIN_STATE_TTL_SECS: i64 = 600;

fn build_cookie(state: &WebState, name: &'static str, value: String) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.config.server.cookie_secure)
        .build()
}

fn expired_cookie(state: &WebState, name: &'static str) -> Cookie<'static> {
    let mut cookie = build_cookie(state, name, String::new());
    cookie.set_max_age(time::Duration::ZERO);
    cookie
}

#[handler]
pub async fn login(req: &mut Request, depot: &mut Depot, res: &mut Response) {
    let state = match web_state(depot) {
        Ok(state) => state,
        Err(err) => return err.render(res),
    };

    let logged_in = req
        .cookie(SESSION_COOKIE)
        .and_then(|cookie| state.sessions.current_principal(cookie.value()))
        .is_some();
    if logged_in {
        res.render(Redirect::found(state.config.server.post_login_redirect.clone()));
        return;
    }

    let login_state = Uuid::new_v4().simple().to_string();
    let mut cookie = build_cookie(state, LOGIN_STATE_COOKIE, login_state.clone());
    cookie.set_max_age(time::Duration::seconds(LOGIN_STATE_TTL_SECS));
    res.add_cookie(cookie);
    res.render(Redirect::found(state.identity.authorize_url(&login_state)));
}

#[handler]
pub async fn callback(req: &mut Request, depot: &mut Depot, res: &mut Response) {
    let state = match web_state(depot) {
        Ok(state) => state.clone(),
        Err(err) => return err.render(res),
    };

    let expected = req
        .cookie(LOGIN_STATE_COOKIE)
        .map(|cookie| cookie.value().to_string());
    let returned = req.query::<String>("state");
    res.add_cookie(expired_cookie(&state, LOGIN_STATE_COOKIE));

    let state_ok = match (expected.as_deref(), returned.as_deref()) {
        (Some(expected), Some(returned)) => {
            !expected.is_empty() && constant_time_compare(expected, returned)
        }
        _ => false,
    };
    if !state_ok {
        return ApiError::from(AuthError::InvalidState).render(res);
    }

    let Some(code) = req.query::<String>("code") else {
        return ApiError::from(AuthError::MissingCode).render(res);
    };

    match authenticate(state.identity.as_ref(), &state.policy, &code).await {
        Ok(principal) => {
            Metrics::login_granted();
            let token = state.sessions.create(principal);
            res.add_cookie(build_cookie(&state, SESSION_COOKIE, token));
            res.render(Redirect::found(state.config.server.post_login_redirect.clone()));
        }
        Err(AuthError::AccessDenied {
            user_id,
            roles,
            is_owner,
        }) => {
            Metrics::login_denied();
            if state.config.auth.expose_denial_details {
                res.status_code(StatusCode::FORBIDDEN);
                res.render(Json(json!({
                    "error": "access denied",
                    "user_id": user_id,
                    "roles": roles.iter().map(u64::to_string).collect::<Vec<_>>(),
                    "is_owner": is_owner,
                })));
            } else {
                render_error(res, StatusCode::FORBIDDEN, "access denied");
            }
        }
        Err(err) => {
            if matches!(err, AuthError::Provider { .. }) {
                Metrics::login_failed();
            }
            ApiError::from(err).render(res);
        }
    }
}

#[handler]
pub async fn logout(req: &mut Request, depot: &mut Depot, res: &mut Response) {
    let state = match web_state(depot) {
        Ok(state) => state,
        Err(err) => return err.render(res),
    };

    if let Some(cookie) = req.cookie(SESSION_COOKIE) {
        state.sessions.revoke(cookie.value());
    }
    res.add_cookie(expired_cookie(state, SESSION_COOKIE));
    res.render(Redirect::found("/login"));
}

#[handler]
pub async fn me(depot: &mut Depot, res: &mut Response) {
    match current_principal(depot) {
        Some(principal) => res.render(Json(principal.clone())),
        None => render_error(res, StatusCode::UNAUTHORIZED, "not logged in"),
    }
}
