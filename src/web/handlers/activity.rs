use salvo::http::StatusCode;
use salvo::prelude::*;
use serde_json::json;

use crate::db::stores::ActivityFilter;
use crate::web::web_state;

use super::{pagination, parse_iso_date, render_error};

#[handler]
pub async fn list_activity(req: &mut Request, res: &mut Response) {
    let (page, limit, offset) = pagination(req);

    let mut filter = ActivityFilter {
        user_id: req.query::<i64>("user_id"),
        from: None,
        to: None,
    };
    if let Some(from) = req.query::<String>("from") {
        match parse_iso_date(&from) {
            Some(date) => filter.from = Some(date),
            None => {
                render_error(res, StatusCode::BAD_REQUEST, "from must be YYYY-MM-DD");
                return;
            }
        }
    }
    if let Some(to) = req.query::<String>("to") {
        match parse_iso_date(&to) {
            Some(date) => filter.to = Some(date),
            None => {
                render_error(res, StatusCode::BAD_REQUEST, "to must be YYYY-MM-DD");
                return;
            }
        }
    }

    match web_state()
        .db_manager
        .activity_store()
        .list(&filter, limit, offset)
        .await
    {
        Ok(entries) => {
            res.render(Json(json!({
                "activity": entries,
                "count": entries.len(),
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
