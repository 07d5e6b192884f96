use chrono::Utc;
use salvo::http::StatusCode;
use salvo::prelude::*;
use serde::Deserialize;
use serde_json::json;

use crate::db::models::{Role, User};
use crate::db::DatabaseError;
use crate::web::web_state;

use super::{pagination, parse_iso_date, render_booking_error, render_error};

#[derive(Debug, Deserialize)]
struct UserRequest {
    username: String,
    display_name: String,
    #[serde(default)]
    email: Option<String>,
    role: String,
    #[serde(default = "default_true")]
    is_active: bool,
}

#[derive(Debug, Deserialize)]
struct LeaveRequest {
    date: String,
}

fn default_true() -> bool {
    true
}

#[handler]
pub async fn list_users(req: &mut Request, res: &mut Response) {
    let (page, limit, offset) = pagination(req);
    let store = web_state().db_manager.user_store();

    let listed = futures::try_join!(store.list_users(limit, offset), store.count_users());
    match listed {
        Ok((users, total)) => {
            res.render(Json(json!({
                "users": users,
                "total": total,
                "page": page,
                "limit": limit,
            })));
        }
        Err(err) => {
            render_error(
                res,
                StatusCode::INTERNAL_SERVER_ERROR,
                &format!("database error: {}", err),
            );
        }
    }
}

#[handler]
pub async fn get_user(req: &mut Request, res: &mut Response) {
    let id = match req.param::<i64>("id") {
        Some(v) if v > 0 => v,
        _ => {
            render_error(res, StatusCode::BAD_REQUEST, "invalid user id");
            return;
        }
    };

    match web_state().db_manager.user_store().get_user(id).await {
        Ok(Some(user)) => {
            res.render(Json(json!({ "user": user })));
        }
        Ok(None) => {
            render_error(res, StatusCode::NOT_FOUND, "user not found");
        }
        Err(err) => {
            render_error(
                res,
                StatusCode::INTERNAL_SERVER_ERROR,
                &format!("database error: {}", err),
            );
        }
    }
}

#[handler]
pub async fn create_user(req: &mut Request, res: &mut Response) {
    let body = match req.parse_json::<UserRequest>().await {
        Ok(body) => body,
        Err(err) => {
            render_error(
                res,
                StatusCode::BAD_REQUEST,
                &format!("invalid request body: {}", err),
            );
            return;
        }
    };
    if body.username.trim().is_empty() {
        render_error(res, StatusCode::BAD_REQUEST, "username cannot be empty");
        return;
    }
    let Some(role) = Role::parse(&body.role) else {
        render_error(
            res,
            StatusCode::BAD_REQUEST,
            &format!("unknown role: {}", body.role),
        );
        return;
    };

    let store = web_state().db_manager.user_store();
    let now = Utc::now();
    let user = User {
        id: 0,
        username: body.username,
        display_name: body.display_name,
        email: body.email,
        role,
        is_active: body.is_active,
        created_at: now,
        updated_at: now,
    };

    match store.create_user(&user).await {
        Ok(()) => {}
        Err(DatabaseError::Conflict(_)) => {
            render_error(res, StatusCode::CONFLICT, "username already exists");
            return;
        }
        Err(err) => {
            render_error(
                res,
                StatusCode::INTERNAL_SERVER_ERROR,
                &format!("database error: {}", err),
            );
            return;
        }
    }

    match store.get_user_by_username(&user.username).await {
        Ok(Some(stored)) => {
            res.status_code(StatusCode::CREATED);
            res.render(Json(json!({ "user": stored })));
        }
        Ok(None) => {
            render_error(
                res,
                StatusCode::INTERNAL_SERVER_ERROR,
                "user missing after insert",
            );
        }
        Err(err) => {
            render_error(
                res,
                StatusCode::INTERNAL_SERVER_ERROR,
                &format!("database error: {}", err),
            );
        }
    }
}

#[handler]
pub async fn update_user(req: &mut Request, res: &mut Response) {
    let id = match req.param::<i64>("id") {
        Some(v) if v > 0 => v,
        _ => {
            render_error(res, StatusCode::BAD_REQUEST, "invalid user id");
            return;
        }
    };
    let body = match req.parse_json::<UserRequest>().await {
        Ok(body) => body,
        Err(err) => {
            render_error(
                res,
                StatusCode::BAD_REQUEST,
                &format!("invalid request body: {}", err),
            );
            return;
        }
    };
    let Some(role) = Role::parse(&body.role) else {
        render_error(
            res,
            StatusCode::BAD_REQUEST,
            &format!("unknown role: {}", body.role),
        );
        return;
    };

    let store = web_state().db_manager.user_store();
    let existing = match store.get_user(id).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            render_error(res, StatusCode::NOT_FOUND, "user not found");
            return;
        }
        Err(err) => {
            render_error(
                res,
                StatusCode::INTERNAL_SERVER_ERROR,
                &format!("database error: {}", err),
            );
            return;
        }
    };

    // Usernames are immutable; the body's username is ignored on update.
    let updated = User {
        id: existing.id,
        username: existing.username,
        display_name: body.display_name,
        email: body.email,
        role,
        is_active: body.is_active,
        created_at: existing.created_at,
        updated_at: Utc::now(),
    };

    match store.update_user(&updated).await {
        Ok(()) => {
            res.render(Json(json!({ "user": updated })));
        }
        Err(err) => {
            render_error(
                res,
                StatusCode::INTERNAL_SERVER_ERROR,
                &format!("database error: {}", err),
            );
        }
    }
}

#[handler]
pub async fn delete_user(req: &mut Request, res: &mut Response) {
    let id = match req.param::<i64>("id") {
        Some(v) if v > 0 => v,
        _ => {
            render_error(res, StatusCode::BAD_REQUEST, "invalid user id");
            return;
        }
    };

    let store = web_state().db_manager.user_store();
    match store.get_user(id).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            render_error(res, StatusCode::NOT_FOUND, "user not found");
            return;
        }
        Err(err) => {
            render_error(
                res,
                StatusCode::INTERNAL_SERVER_ERROR,
                &format!("database error: {}", err),
            );
            return;
        }
    }

    match store.delete_user(id).await {
        Ok(()) => {
            res.render(Json(json!({ "ok": true, "id": id })));
        }
        Err(err) => {
            render_error(
                res,
                StatusCode::INTERNAL_SERVER_ERROR,
                &format!("database error: {}", err),
            );
        }
    }
}

#[handler]
pub async fn mark_leave(req: &mut Request, res: &mut Response) {
    let id = match req.param::<i64>("id") {
        Some(v) if v > 0 => v,
        _ => {
            render_error(res, StatusCode::BAD_REQUEST, "invalid user id");
            return;
        }
    };
    let body = match req.parse_json::<LeaveRequest>().await {
        Ok(body) => body,
        Err(err) => {
            render_error(
                res,
                StatusCode::BAD_REQUEST,
                &format!("invalid request body: {}", err),
            );
            return;
        }
    };
    let Some(date) = parse_iso_date(&body.date) else {
        render_error(res, StatusCode::BAD_REQUEST, "date must be YYYY-MM-DD");
        return;
    };

    match web_state().engine.mark_leave(id, date).await {
        Ok(released) => {
            res.render(Json(json!({
                "ok": true,
                "released_booking": released,
            })));
        }
        Err(err) => render_booking_error(res, err),
    }
}
