use crate::{auth::auth::AuthUser, utils::notify::NotificationHub};
use actix_web::{HttpResponse, http::header, web, web::Bytes};
use futures::{StreamExt, future::ready, stream};

/// Server-Sent Events feed for the caller's own room and role room
#[utoipa::path(
    get,
    path = "/api/notifications/stream",
    responses(
        (status = 200, description = "text/event-stream of `{event, payload, timestamp}` frames"),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Notifications"
)]
pub async fn stream_notifications(
    auth: AuthUser,
    hub: web::Data<NotificationHub>,
) -> HttpResponse {
    let rooms = [auth.employee_number.clone(), auth.role.room()];
    let rx = hub.subscribe(&rooms);
    tracing::debug!(employee_number = %auth.employee_number, "Notification stream opened");

    let hello = stream::once(ready(Ok::<_, actix_web::Error>(Bytes::from_static(
        b": connected\n\n",
    ))));
    let events = rx.map(|n| Ok::<_, actix_web::Error>(n.to_sse()));

    HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header((header::CACHE_CONTROL, "no-cache"))
        .streaming(hello.chain(events))
}
