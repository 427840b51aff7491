use anyhow::{anyhow, Context, Result};
use oauth2::{
    basic::BasicClient, AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken,
    EndpointNotSet, EndpointSet, RedirectUrl, Scope, TokenResponse, TokenUrl,
};
use serde::Deserialize;
use serde_json::Value;

use crate::config::OAuthConfig;

pub type OAuthClient =
    BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

pub fn build_client(config: &OAuthConfig) -> Result<OAuthClient> {
    let client = BasicClient::new(ClientId::new(config.client_id.clone()))
        .set_client_secret(ClientSecret::new(config.client_secret.clone()))
        .set_auth_uri(AuthUrl::new(config.auth_url.clone()).context("invalid OAUTH_AUTH_URL")?)
        .set_token_uri(
            TokenUrl::new(config.token_url.clone()).context("invalid OAUTH_TOKEN_URL")?,
        )
        .set_redirect_uri(
            RedirectUrl::new(config.redirect_url.clone()).context("invalid OAUTH_REDIRECT_URL")?,
        );
    Ok(client)
}

/// Authorization URL carrying the given (already signed) state value.
pub fn authorize_url(client: &OAuthClient, state: String) -> String {
    let (url, _) = client
        .authorize_url(move || CsrfToken::new(state))
        .add_scope(Scope::new("openid".to_string()))
        .add_scope(Scope::new("profile".to_string()))
        .add_scope(Scope::new("email".to_string()))
        .url();
    url.to_string()
}

/// Identity returned by the provider's userinfo endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderIdentity {
    pub subject: String,
    pub email: Option<String>,
    pub name: Option<String>,
}

#[derive(Deserialize)]
struct UserInfoPayload {
    #[serde(alias = "id", alias = "openId", alias = "open_id")]
    sub: Value,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

pub async fn exchange_code(
    client: &OAuthClient,
    userinfo_url: &str,
    code: String,
) -> Result<ProviderIdentity> {
    // Redirects stay disabled for the token exchange to avoid SSRF.
    let http_client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .context("failed to build OAuth HTTP client")?;

    let token = client
        .exchange_code(AuthorizationCode::new(code))
        .request_async(&http_client)
        .await
        .map_err(|err| anyhow!("failed to exchange authorization code: {err}"))?;

    let payload: Value = http_client
        .get(userinfo_url)
        .bearer_auth(token.access_token().secret())
        .send()
        .await
        .context("failed to call userinfo endpoint")?
        .error_for_status()
        .context("userinfo endpoint returned an error")?
        .json()
        .await
        .context("userinfo response was not JSON")?;

    parse_identity(payload)
}

fn parse_identity(payload: Value) -> Result<ProviderIdentity> {
    let info: UserInfoPayload =
        serde_json::from_value(payload).context("userinfo response is missing a subject")?;
    let subject = match info.sub {
        Value::String(s) if !s.trim().is_empty() => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        other => return Err(anyhow!("unsupported subject value {other}")),
    };

    Ok(ProviderIdentity {
        subject,
        email: info.email.filter(|e| !e.trim().is_empty()),
        name: info.name.filter(|n| !n.trim().is_empty()),
    })
}
