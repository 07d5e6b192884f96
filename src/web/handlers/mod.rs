use chrono::NaiveDate;
use salvo::http::StatusCode;
use salvo::prelude::*;
use serde_json::json;
use tracing::error;

use crate::booking::BookingError;

pub mod activity;
pub mod bookings;
pub mod health;
pub mod metrics;
pub mod resources;
pub mod users;

pub(crate) fn render_error(res: &mut Response, status: StatusCode, message: &str) {
    res.status_code(status);
    res.render(Json(json!({ "error": message })));
}

pub(crate) fn render_booking_error(res: &mut Response, err: BookingError) {
    let (status, message) = match &err {
        BookingError::UserNotFound(_)
        | BookingError::ResourceNotFound(_)
        | BookingError::BookingNotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
        BookingError::AlreadyBooked
        | BookingError::NotBooked
        | BookingError::SeatTaken
        | BookingError::SlotTaken => (StatusCode::CONFLICT, err.to_string()),
        BookingError::AccessDenied(_) => (StatusCode::FORBIDDEN, err.to_string()),
        BookingError::CapacityExhausted
        | BookingError::UserInactive(_)
        | BookingError::InvalidSlot(_) => (StatusCode::BAD_REQUEST, err.to_string()),
        BookingError::Database(db_err) => {
            error!("database error: {db_err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal error".to_string(),
            )
        }
    };
    render_error(res, status, &message);
}

/// `page`/`limit` query parameters, clamped; returns (page, limit, offset).
pub(crate) fn pagination(req: &mut Request) -> (i64, i64, i64) {
    let page = req.query::<i64>("page").unwrap_or(1).max(1);
    let limit = req.query::<i64>("limit").unwrap_or(50).clamp(1, 500);
    (page, limit, (page - 1) * limit)
}

pub(crate) fn parse_iso_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}
