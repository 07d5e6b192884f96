use chrono::Utc;
use salvo::http::StatusCode;
use salvo::prelude::*;
use serde::Deserialize;
use serde_json::json;

use crate::db::models::{Resource, ResourceKind};
use crate::db::DatabaseError;
use crate::web::web_state;

use super::{pagination, render_error};

#[derive(Debug, Deserialize)]
struct ResourceRequest {
    name: String,
    kind: ResourceKind,
    #[serde(default)]
    units: i32,
    #[serde(default)]
    seats_per_unit: i32,
    #[serde(default)]
    open_minute: Option<i32>,
    #[serde(default)]
    close_minute: Option<i32>,
    #[serde(default)]
    slot_minutes: Option<i32>,
    #[serde(default = "default_true")]
    is_active: bool,
}

fn default_true() -> bool {
    true
}

fn validate_resource(body: &ResourceRequest) -> Result<(), String> {
    if body.name.trim().is_empty() {
        return Err("name cannot be empty".to_string());
    }
    match body.kind {
        ResourceKind::SeatBank => {
            if body.units < 1 || body.seats_per_unit < 1 {
                return Err(
                    "seat banks need units and seats_per_unit of at least 1".to_string()
                );
            }
        }
        ResourceKind::Room => match (body.open_minute, body.close_minute, body.slot_minutes) {
            (Some(open), Some(close), Some(slot)) => {
                if !(0..1440).contains(&open) || !(1..=1440).contains(&close) || close <= open {
                    return Err("room window must fall within one day".to_string());
                }
                if slot < 1 {
                    return Err("slot_minutes must be at least 1".to_string());
                }
            }
            _ => {
                return Err(
                    "rooms need open_minute, close_minute and slot_minutes".to_string()
                );
            }
        },
    }
    Ok(())
}

fn resource_json(resource: &Resource) -> serde_json::Value {
    let mut value = serde_json::to_value(resource).unwrap_or_else(|_| json!({}));
    if let serde_json::Value::Object(ref mut map) = value {
        map.insert(
            "total_capacity".to_string(),
            json!(resource.total_capacity()),
        );
    }
    value
}

#[handler]
pub async fn list_resources(req: &mut Request, res: &mut Response) {
    let (page, limit, offset) = pagination(req);
    let store = web_state().db_manager.resource_store();

    let listed = futures::try_join!(store.list_resources(limit, offset), store.count_resources());
    match listed {
        Ok((resources, total)) => {
            let payload: Vec<_> = resources.iter().map(resource_json).collect();
            res.render(Json(json!({
                "resources": payload,
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
pub async fn get_resource(req: &mut Request, res: &mut Response) {
    let id = match req.param::<i64>("id") {
        Some(v) if v > 0 => v,
        _ => {
            render_error(res, StatusCode::BAD_REQUEST, "invalid resource id");
            return;
        }
    };

    match web_state().db_manager.resource_store().get_resource(id).await {
        Ok(Some(resource)) => {
            res.render(Json(json!({ "resource": resource_json(&resource) })));
        }
        Ok(None) => {
            render_error(res, StatusCode::NOT_FOUND, "resource not found");
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
pub async fn create_resource(req: &mut Request, res: &mut Response) {
    let body = match req.parse_json::<ResourceRequest>().await {
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
    if let Err(message) = validate_resource(&body) {
        render_error(res, StatusCode::BAD_REQUEST, &message);
        return;
    }

    let store = web_state().db_manager.resource_store();
    let now = Utc::now();
    let resource = Resource {
        id: 0,
        name: body.name,
        kind: body.kind,
        units: body.units,
        seats_per_unit: body.seats_per_unit,
        open_minute: body.open_minute,
        close_minute: body.close_minute,
        slot_minutes: body.slot_minutes,
        is_active: body.is_active,
        created_at: now,
        updated_at: now,
    };

    match store.create_resource(&resource).await {
        Ok(()) => {}
        Err(DatabaseError::Conflict(_)) => {
            render_error(res, StatusCode::CONFLICT, "resource name already exists");
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

    web_state().engine.invalidate_pool();

    match store.get_resource_by_name(&resource.name).await {
        Ok(Some(stored)) => {
            res.status_code(StatusCode::CREATED);
            res.render(Json(json!({ "resource": resource_json(&stored) })));
        }
        Ok(None) => {
            render_error(
                res,
                StatusCode::INTERNAL_SERVER_ERROR,
                "resource missing after insert",
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
pub async fn update_resource(req: &mut Request, res: &mut Response) {
    let id = match req.param::<i64>("id") {
        Some(v) if v > 0 => v,
        _ => {
            render_error(res, StatusCode::BAD_REQUEST, "invalid resource id");
            return;
        }
    };
    let body = match req.parse_json::<ResourceRequest>().await {
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
    if let Err(message) = validate_resource(&body) {
        render_error(res, StatusCode::BAD_REQUEST, &message);
        return;
    }

    let store = web_state().db_manager.resource_store();
    let existing = match store.get_resource(id).await {
        Ok(Some(resource)) => resource,
        Ok(None) => {
            render_error(res, StatusCode::NOT_FOUND, "resource not found");
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

    let updated = Resource {
        id: existing.id,
        name: body.name,
        kind: body.kind,
        units: body.units,
        seats_per_unit: body.seats_per_unit,
        open_minute: body.open_minute,
        close_minute: body.close_minute,
        slot_minutes: body.slot_minutes,
        is_active: body.is_active,
        created_at: existing.created_at,
        updated_at: Utc::now(),
    };

    match store.update_resource(&updated).await {
        Ok(()) => {
            web_state().engine.invalidate_pool();
            res.render(Json(json!({ "resource": resource_json(&updated) })));
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
pub async fn delete_resource(req: &mut Request, res: &mut Response) {
    let id = match req.param::<i64>("id") {
        Some(v) if v > 0 => v,
        _ => {
            render_error(res, StatusCode::BAD_REQUEST, "invalid resource id");
            return;
        }
    };

    let store = web_state().db_manager.resource_store();
    match store.get_resource(id).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            render_error(res, StatusCode::NOT_FOUND, "resource not found");
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

    match store.delete_resource(id).await {
        Ok(()) => {
            web_state().engine.invalidate_pool();
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
