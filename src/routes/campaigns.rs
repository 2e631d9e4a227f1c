//! src/routes/campaigns.rs

use crate::campaign::{CampaignError, CampaignRequest, Dispatcher};
use crate::error::AppResult;
use actix_web::{web, HttpResponse};
use secrecy::Secret;

/// Missing fields deserialize to empty strings, so a request without a
/// passcode is answered with 401 rather than a decoding error.
#[derive(serde::Deserialize, Default)]
#[serde(default)]
pub struct CampaignBody {
    link: String,
    passcode: String,
}

#[tracing::instrument(
    name = "Start a campaign",
    skip(body, dispatcher),
    fields(link = %body.link)
)]
pub async fn send_campaign(
    body: web::Json<CampaignBody>,
    dispatcher: web::Data<Dispatcher>,
) -> AppResult<HttpResponse> {
    let CampaignBody { link, passcode } = body.into_inner();
    let request = CampaignRequest {
        source_url: link,
        auth_token: Secret::new(passcode),
    };
    let result = dispatcher.dispatch(request).await?;
    if result.halted {
        return Err(CampaignError::Provider(result.summary()).into());
    }
    Ok(HttpResponse::Ok()
        .content_type("text/plain; charset=utf-8")
        .body(result.summary()))
}
