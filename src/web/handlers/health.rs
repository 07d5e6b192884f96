use salvo::http::StatusCode;
use salvo::prelude::*;
use serde_json::json;

use crate::config::DbType;
use crate::web::web_state;

use super::render_error;

#[handler]
pub async fn health_check(res: &mut Response) {
    res.render(Json(json!({ "status": "ok" })));
}

#[handler]
pub async fn get_status(res: &mut Response) {
    let state = web_state();
    let uptime_seconds = state.started_at.elapsed().as_secs();
    let db_type = match state.config.database.db_type() {
        DbType::Postgres => "postgres",
        DbType::Sqlite => "sqlite",
    };

    let resource_store = state.db_manager.resource_store();
    let user_store = state.db_manager.user_store();
    let counts = futures::try_join!(
        resource_store.count_resources(),
        user_store.count_users(),
    );

    match counts {
        Ok((resources, users)) => {
            res.render(Json(json!({
                "service": {
                    "status": "running",
                    "version": env!("CARGO_PKG_VERSION"),
                    "uptime_seconds": uptime_seconds,
                },
                "database": db_type,
                "resources": resources,
                "users": users,
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
