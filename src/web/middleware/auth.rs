use salvo::http::StatusCode;
use salvo::prelude::*;
use secrecy::ExposeSecret;
use serde_json::json;

use crate::web::handlers::{
    activity::list_activity,
    bookings::{
        availability, book_room, bulk_book, create_booking, delete_booking, list_bookings,
        list_room_bookings, release_booking, release_room, reserve_booking, toggle_booking,
    },
    health::{get_status, health_check},
    metrics::metrics,
    resources::{create_resource, delete_resource, get_resource, list_resources, update_resource},
    users::{create_user, delete_user, get_user, list_users, mark_leave, update_user},
};
use crate::web::web_state;

use super::trace::trace_request;

fn bearer_token(req: &Request) -> Option<String> {
    req.headers()
        .get("authorization")?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(|token| token.trim().to_string())
}

fn reject(res: &mut Response, ctrl: &mut FlowCtrl, status: StatusCode, message: &str) {
    res.status_code(status);
    res.render(Json(json!({ "error": message })));
    ctrl.skip_rest();
}

/// Accepts the api token or the admin token on every /api route.
#[handler]
pub async fn require_api_token(req: &mut Request, res: &mut Response, ctrl: &mut FlowCtrl) {
    let auth = &web_state().config.auth;
    match bearer_token(req) {
        Some(token)
            if token == auth.api_token.expose_secret()
                || token == auth.admin_token.expose_secret() => {}
        Some(_) => reject(res, ctrl, StatusCode::UNAUTHORIZED, "invalid bearer token"),
        None => reject(res, ctrl, StatusCode::UNAUTHORIZED, "missing bearer token"),
    }
}

#[handler]
pub async fn require_admin_token(req: &mut Request, res: &mut Response, ctrl: &mut FlowCtrl) {
    let auth = &web_state().config.auth;
    match bearer_token(req) {
        Some(token) if token == auth.admin_token.expose_secret() => {}
        Some(_) => reject(res, ctrl, StatusCode::FORBIDDEN, "admin token required"),
        None => reject(res, ctrl, StatusCode::UNAUTHORIZED, "missing bearer token"),
    }
}

pub fn create_router() -> Router {
    let user_api = Router::new()
        .push(
            Router::with_path("bookings")
                .get(list_bookings)
                .push(Router::with_path("availability").get(availability))
                .push(Router::with_path("toggle").post(toggle_booking))
                .push(Router::with_path("reserve").post(reserve_booking))
                .push(Router::with_path("release").post(release_booking)),
        )
        .push(
            Router::with_path("rooms/{id}")
                .push(Router::with_path("book").post(book_room))
                .push(
                    Router::with_path("bookings")
                        .get(list_room_bookings)
                        .push(Router::with_path("{booking_id}").delete(release_room)),
                ),
        )
        .push(
            Router::with_path("resources")
                .get(list_resources)
                .push(Router::with_path("{id}").get(get_resource)),
        )
        .push(Router::with_path("activity").get(list_activity))
        .push(Router::with_path("users/{id}/leave").post(mark_leave));

    let admin_api = Router::new()
        .hoop(require_admin_token)
        .push(
            Router::with_path("resources")
                .post(create_resource)
                .push(
                    Router::with_path("{id}")
                        .put(update_resource)
                        .delete(delete_resource),
                ),
        )
        .push(
            Router::with_path("users")
                .get(list_users)
                .post(create_user)
                .push(
                    Router::with_path("{id}")
                        .get(get_user)
                        .put(update_user)
                        .delete(delete_user),
                ),
        )
        .push(
            Router::with_path("bookings")
                .post(create_booking)
                .push(Router::with_path("bulk").post(bulk_book))
                .push(Router::with_path("{id}").delete(delete_booking)),
        );

    Router::new()
        .hoop(trace_request)
        .push(Router::with_path("health").get(health_check))
        .push(Router::with_path("status").get(get_status))
        .push(Router::with_path("metrics").get(metrics))
        .push(
            Router::with_path("api")
                .hoop(require_api_token)
                .push(user_api)
                .push(admin_api),
        )
}
