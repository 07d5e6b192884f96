use chrono::Local;
use salvo::http::StatusCode;
use salvo::prelude::*;
use serde::Deserialize;
use serde_json::json;

use crate::booking::parse_selector;
use crate::db::stores::BookingFilter;
use crate::web::web_state;

use super::{pagination, parse_iso_date, render_booking_error, render_error};

#[derive(Debug, Deserialize)]
struct BookingIntentRequest {
    user_id: i64,
    date: String,
}

#[derive(Debug, Deserialize)]
struct AdminBookingRequest {
    user_id: i64,
    resource_id: i64,
    seat_number: i32,
    date: String,
}

#[derive(Debug, Deserialize)]
struct BulkBookingRequest {
    user_ids: Vec<i64>,
    weekdays: Vec<String>,
    start_date: String,
    end_date: String,
}

#[derive(Debug, Deserialize)]
struct RoomBookingRequest {
    user_id: i64,
    slot_number: i32,
    date: String,
}

#[handler]
pub async fn list_bookings(req: &mut Request, res: &mut Response) {
    let (page, limit, offset) = pagination(req);

    let mut filter = BookingFilter {
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
        .booking_store()
        .list_bookings(&filter, limit, offset)
        .await
    {
        Ok(bookings) => {
            res.render(Json(json!({
                "bookings": bookings,
                "count": bookings.len(),
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
pub async fn availability(req: &mut Request, res: &mut Response) {
    let date = match req.query::<String>("date") {
        Some(value) => match parse_iso_date(&value) {
            Some(date) => date,
            None => {
                render_error(res, StatusCode::BAD_REQUEST, "date must be YYYY-MM-DD");
                return;
            }
        },
        None => Local::now().date_naive(),
    };

    match web_state().engine.availability(date).await {
        Ok(avail) => {
            res.render(Json(avail));
        }
        Err(err) => render_booking_error(res, err),
    }
}

#[handler]
pub async fn toggle_booking(req: &mut Request, res: &mut Response) {
    let body = match req.parse_json::<BookingIntentRequest>().await {
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

    match web_state()
        .engine
        .toggle(body.user_id, date, Local::now())
        .await
    {
        Ok((action, booking)) => {
            res.render(Json(json!({
                "action": action.as_str(),
                "booking": booking,
            })));
        }
        Err(err) => render_booking_error(res, err),
    }
}

#[handler]
pub async fn reserve_booking(req: &mut Request, res: &mut Response) {
    let body = match req.parse_json::<BookingIntentRequest>().await {
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

    match web_state()
        .engine
        .reserve(body.user_id, date, Local::now())
        .await
    {
        Ok(booking) => {
            res.status_code(StatusCode::CREATED);
            res.render(Json(json!({ "booking": booking })));
        }
        Err(err) => render_booking_error(res, err),
    }
}

#[handler]
pub async fn release_booking(req: &mut Request, res: &mut Response) {
    let body = match req.parse_json::<BookingIntentRequest>().await {
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

    match web_state().engine.release(body.user_id, date).await {
        Ok(booking) => {
            res.render(Json(json!({ "released": booking })));
        }
        Err(err) => render_booking_error(res, err),
    }
}

#[handler]
pub async fn create_booking(req: &mut Request, res: &mut Response) {
    let body = match req.parse_json::<AdminBookingRequest>().await {
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

    match web_state()
        .engine
        .reserve_for(body.user_id, body.resource_id, body.seat_number, date)
        .await
    {
        Ok(booking) => {
            res.status_code(StatusCode::CREATED);
            res.render(Json(json!({ "booking": booking })));
        }
        Err(err) => render_booking_error(res, err),
    }
}

#[handler]
pub async fn delete_booking(req: &mut Request, res: &mut Response) {
    let id = match req.param::<i64>("id") {
        Some(v) if v > 0 => v,
        _ => {
            render_error(res, StatusCode::BAD_REQUEST, "invalid booking id");
            return;
        }
    };

    match web_state().engine.cancel_booking(id).await {
        Ok(booking) => {
            res.render(Json(json!({ "ok": true, "cancelled": booking })));
        }
        Err(err) => render_booking_error(res, err),
    }
}

#[handler]
pub async fn bulk_book(req: &mut Request, res: &mut Response) {
    let body = match req.parse_json::<BulkBookingRequest>().await {
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
    if body.user_ids.is_empty() {
        render_error(res, StatusCode::BAD_REQUEST, "user_ids cannot be empty");
        return;
    }
    if body.weekdays.is_empty() {
        render_error(res, StatusCode::BAD_REQUEST, "weekdays cannot be empty");
        return;
    }
    let (Some(start), Some(end)) = (
        parse_iso_date(&body.start_date),
        parse_iso_date(&body.end_date),
    ) else {
        render_error(
            res,
            StatusCode::BAD_REQUEST,
            "start_date and end_date must be YYYY-MM-DD",
        );
        return;
    };

    let mut selectors = Vec::with_capacity(body.weekdays.len());
    for token in &body.weekdays {
        match parse_selector(token) {
            Ok(selector) => selectors.push(selector),
            Err(err) => {
                render_error(res, StatusCode::BAD_REQUEST, &err.to_string());
                return;
            }
        }
    }

    match web_state()
        .engine
        .bulk_book(&body.user_ids, &selectors, start, end)
        .await
    {
        Ok(outcome) => {
            res.render(Json(outcome));
        }
        Err(err) => render_booking_error(res, err),
    }
}

#[handler]
pub async fn book_room(req: &mut Request, res: &mut Response) {
    let room_id = match req.param::<i64>("id") {
        Some(v) if v > 0 => v,
        _ => {
            render_error(res, StatusCode::BAD_REQUEST, "invalid room id");
            return;
        }
    };
    let body = match req.parse_json::<RoomBookingRequest>().await {
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

    match web_state()
        .engine
        .book_room(body.user_id, room_id, body.slot_number, date)
        .await
    {
        Ok(booking) => {
            res.status_code(StatusCode::CREATED);
            res.render(Json(json!({ "booking": booking })));
        }
        Err(err) => render_booking_error(res, err),
    }
}

#[handler]
pub async fn list_room_bookings(req: &mut Request, res: &mut Response) {
    let room_id = match req.param::<i64>("id") {
        Some(v) if v > 0 => v,
        _ => {
            render_error(res, StatusCode::BAD_REQUEST, "invalid room id");
            return;
        }
    };
    let date = match req.query::<String>("date") {
        Some(value) => match parse_iso_date(&value) {
            Some(date) => date,
            None => {
                render_error(res, StatusCode::BAD_REQUEST, "date must be YYYY-MM-DD");
                return;
            }
        },
        None => Local::now().date_naive(),
    };

    match web_state()
        .db_manager
        .booking_store()
        .room_bookings_for(room_id, date)
        .await
    {
        Ok(bookings) => {
            res.render(Json(json!({
                "room_id": room_id,
                "date": date,
                "bookings": bookings,
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
pub async fn release_room(req: &mut Request, res: &mut Response) {
    let room_id = match req.param::<i64>("id") {
        Some(v) if v > 0 => v,
        _ => {
            render_error(res, StatusCode::BAD_REQUEST, "invalid room id");
            return;
        }
    };
    let booking_id = match req.param::<i64>("booking_id") {
        Some(v) if v > 0 => v,
        _ => {
            render_error(res, StatusCode::BAD_REQUEST, "invalid booking id");
            return;
        }
    };

    match web_state().engine.release_room(room_id, booking_id).await {
        Ok(booking) => {
            res.render(Json(json!({ "ok": true, "cancelled": booking })));
        }
        Err(err) => render_booking_error(res, err),
    }
}
