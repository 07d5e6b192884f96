use salvo::http::HeaderValue;
use salvo::prelude::*;
use tracing::debug;
use uuid::Uuid;

/// Tags every request with a correlation id, echoed back in the
/// `x-request-id` response header.
#[handler]
pub async fn trace_request(req: &mut Request, res: &mut Response) {
    let request_id = Uuid::new_v4();
    debug!(%request_id, method = %req.method(), path = %req.uri().path(), "request received");
    if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
        res.headers_mut().insert("x-request-id", value);
    }
}
