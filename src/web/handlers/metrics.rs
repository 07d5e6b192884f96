use chrono::Local;
use salvo::http::StatusCode;
use salvo::prelude::*;
use serde_json::json;

use crate::web::web_state;

use super::render_error;

#[handler]
pub async fn metrics(res: &mut Response) {
    let state = web_state();
    let uptime_seconds = state.started_at.elapsed().as_secs();
    let today = Local::now().date_naive();

    match state.engine.availability(today).await {
        Ok(availability) => {
            res.render(Json(json!({
                "service": {
                    "status": "running",
                    "uptime_seconds": uptime_seconds,
                    "version": env!("CARGO_PKG_VERSION"),
                },
                "today": availability,
            })));
        }
        Err(err) => {
            render_error(
                res,
                StatusCode::INTERNAL_SERVER_ERROR,
                &format!("availability error: {}", err),
            );
        }
    }
}
