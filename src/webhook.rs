//! Identity-provider webhook: keeps local users in step with the provider's
//! `user.created`, `user.updated` and `user.deleted` events.

use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;
use tracing::info;
use utoipa::ToSchema;

use crate::actions::user as users;
use crate::error::ApiError;
use crate::models::{NewUser, UpdateUser};
use crate::routes::AppState;

pub const SVIX_HEADERS: [&str; 3] = ["svix-id", "svix-timestamp", "svix-signature"];

#[derive(Debug, Deserialize, ToSchema)]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct EmailAddress {
    email_address: String,
}

#[derive(Debug, Deserialize)]
struct IdentityUser {
    id: String,
    #[serde(default)]
    email_addresses: Vec<EmailAddress>,
    #[serde(default)]
    image_url: String,
    username: Option<String>,
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DeletedUser {
    id: String,
}

impl IdentityUser {
    fn display_name(&self) -> String {
        let first = self.first_name.as_deref().unwrap_or_default().trim();
        match self.last_name.as_deref().map(str::trim).filter(|l| !l.is_empty()) {
            Some(last) if !first.is_empty() => format!("{first} {last}"),
            Some(last) => last.to_string(),
            None => first.to_string(),
        }
    }

    fn username(&self) -> String {
        self.username.clone().filter(|u| !u.is_empty()).unwrap_or_else(|| self.id.clone())
    }

    fn email(&self) -> String {
        self.email_addresses.first().map(|e| e.email_address.clone()).unwrap_or_default()
    }
}

fn payload<T: serde::de::DeserializeOwned>(data: serde_json::Value) -> Result<T, ApiError> {
    serde_json::from_value(data).map_err(|e| ApiError::BadRequest(format!("malformed event data: {e}")))
}

#[utoipa::path(
    post,
    path = "/api/webhooks/identity",
    request_body = WebhookEvent,
    responses(
        (status = 200, description = "Event applied or ignored"),
        (status = 400, description = "Missing svix headers or malformed event"),
        (status = 503, description = "Webhook not configured")
    )
)]
pub async fn identity_webhook(
    req: HttpRequest,
    data: web::Data<AppState>,
    event: web::Json<WebhookEvent>,
) -> Result<HttpResponse, ApiError> {
    if data.webhook_secret.is_none() {
        return Err(ApiError::ServiceUnavailable("webhook not configured"));
    }
    if SVIX_HEADERS.iter().any(|h| !req.headers().contains_key(*h)) {
        return Err(ApiError::BadRequest("missing svix headers".into()));
    }
    // TODO: verify svix-signature (HMAC-SHA256 over id.timestamp.body) against WEBHOOK_SECRET

    let event = event.into_inner();
    let repo = &*data.repo;
    match event.kind.as_str() {
        "user.created" => {
            let u: IdentityUser = payload(event.data)?;
            let user = users::create(
                repo,
                NewUser {
                    name: u.display_name(),
                    username: u.username(),
                    email: u.email(),
                    picture: u.image_url.clone(),
                    clerk_id: u.id,
                },
            )
            .await?;
            info!(clerk_id = %user.clerk_id, "user created from webhook");
            Ok(HttpResponse::Ok().json(user))
        }
        "user.updated" => {
            let u: IdentityUser = payload(event.data)?;
            let upd = UpdateUser {
                name: Some(u.display_name()),
                username: Some(u.username()),
                email: Some(u.email()),
                picture: Some(u.image_url.clone()),
                ..Default::default()
            };
            let user = users::update(repo, &u.id, upd).await?;
            Ok(HttpResponse::Ok().json(user))
        }
        "user.deleted" => {
            let u: DeletedUser = payload(event.data)?;
            let user = users::delete(repo, &u.id).await?;
            info!(clerk_id = %user.clerk_id, "user deleted from webhook");
            Ok(HttpResponse::Ok().json(user))
        }
        _ => Ok(HttpResponse::Ok().finish()),
    }
}
