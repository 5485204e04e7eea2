use salvo::affix_state;
use salvo::prelude::*;

use crate::web::WebState;
use crate::web::handlers::{
    auth::{callback, login, logout, me},
    categories::{create_category, delete_category, get_category, list_categories, update_category},
    health::{get_status, health_check},
    live::live_updates,
    panels::{create_panel, delete_panel, get_panel, list_panels, send_panel, update_panel},
    settings::{delete_setting, get_setting, list_settings, put_setting},
    tickets::{close_ticket, get_stats, get_ticket, list_tickets, update_ticket},
    toggles::{config_status, get_subsystem, set_subsystem, toggle_subsystem},
    webhook::{ticket_closed, ticket_created, ticket_message},
};
use crate::web::metrics::metrics_endpoint;
use crate::web::middleware::auth::{require_staff, require_webhook_secret};

pub fn create_router(state: WebState) -> Router {
    Router::new()
        .hoop(affix_state::inject(state))
        .push(Router::with_path("health").get(health_check))
        .push(Router::with_path("metrics").get(metrics_endpoint))
        .push(Router::with_path("status").get(get_status))
        .push(Router::with_path("login").get(login))
        .push(Router::with_path("callback").get(callback))
        .push(Router::with_path("logout").get(logout))
        .push(Router::with_path("api/config/status").get(config_status))
        .push(
            Router::with_path("api/webhook")
                .hoop(require_webhook_secret)
                .push(Router::with_path("ticket-created").post(ticket_created))
                .push(Router::with_path("ticket-message").post(ticket_message))
                .push(Router::with_path("ticket-closed").post(ticket_closed)),
        )
        .push(staff_router())
}

fn staff_router() -> Router {
    Router::new()
        .hoop(require_staff)
        .push(Router::with_path("ws").goal(live_updates))
        .push(
            Router::with_path("api")
                .push(Router::with_path("me").get(me))
                .push(Router::with_path("stats").get(get_stats))
                .push(Router::with_path("tickets").get(list_tickets))
                .push(
                    Router::with_path("ticket/{id}")
                        .get(get_ticket)
                        .patch(update_ticket),
                )
                .push(Router::with_path("ticket/{id}/close").post(close_ticket))
                .push(
                    Router::with_path("categories")
                        .get(list_categories)
                        .post(create_category),
                )
                .push(
                    Router::with_path("categories/{id}")
                        .get(get_category)
                        .put(update_category)
                        .delete(delete_category),
                )
                .push(Router::with_path("panels").get(list_panels).post(create_panel))
                .push(
                    Router::with_path("panels/{id}")
                        .get(get_panel)
                        .put(update_panel)
                        .delete(delete_panel),
                )
                .push(Router::with_path("discord/send-panel").post(send_panel))
                .push(Router::with_path("config/toggle/{system}").post(toggle_subsystem))
                .push(
                    Router::with_path("config/{system}")
                        .get(get_subsystem)
                        .put(set_subsystem),
                )
                .push(Router::with_path("settings").get(list_settings))
                .push(
                    Router::with_path("settings/{key}")
                        .get(get_setting)
                        .put(put_setting)
                        .delete(delete_setting),
                ),
        )
}
