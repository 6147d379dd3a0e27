//! APIC-EM API client implementation.
//!
//! This module provides the HTTP client for the controller's PnP REST API.
//! The client is the session object for a run: it owns the base URL and the
//! service ticket obtained at login, and attaches the ticket to every call.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, multipart};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::config::ControllerSettings;
use crate::error::{ApicError, Result, ZtdError};

use super::api::Controller;
use super::types::{
    DeviceRule, DeviceRulePatch, Envelope, Image, NewDeviceRule, RawRuleResponse, RuleOutcome,
    Site, StoredFile, TaskStatus,
};

/// Header carrying the service ticket.
pub const AUTH_HEADER: &str = "X-Auth-Token";

/// Page size used for list calls.
const PAGE_LIMIT: &str = "500";

/// Namespace holding configuration artifacts.
const CONFIG_NAMESPACE: &str = "config";

/// APIC-EM API client.
#[derive(Debug, Clone)]
pub struct ApicClient {
    /// HTTP client.
    http: Client,
    /// API base URL ending in `/api/v1/`.
    base_url: Url,
    /// Service ticket, set after login.
    ticket: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TicketResponse {
    #[serde(default)]
    service_ticket: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    id: String,
}

impl ApicClient {
    /// Creates an unauthenticated client from connection settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(settings: &ControllerSettings) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .danger_accept_invalid_certs(settings.accept_invalid_certs)
            .build()
            .map_err(|e| ApicError::network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self::with_client(http, settings.base_url.clone()))
    }

    /// Creates an unauthenticated client around a pre-built `reqwest::Client`.
    #[must_use]
    pub const fn with_client(http: Client, base_url: Url) -> Self {
        Self {
            http,
            base_url,
            ticket: None,
        }
    }

    /// Creates a client and logs in with the configured credentials.
    ///
    /// # Errors
    ///
    /// Returns an error if the client cannot be built or login fails.
    pub async fn connect(settings: &ControllerSettings) -> Result<Self> {
        let mut client = Self::new(settings)?;
        client
            .authenticate(&settings.username, &settings.password)
            .await?;
        Ok(client)
    }

    /// Logs in and stores the service ticket for subsequent calls.
    ///
    /// # Errors
    ///
    /// Returns [`ApicError::AuthenticationFailed`] on a non-success status or
    /// when the response carries no ticket.
    pub async fn authenticate(&mut self, username: &str, password: &SecretString) -> Result<()> {
        let url = self.url("ticket")?;
        debug!("POST {url}");

        let body = serde_json::json!({
            "username": username,
            "password": password.expose_secret(),
        });

        let response = self
            .http
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ApicError::network(format!("Login request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(auth_failed(format!("HTTP {status}: {body}")));
        }

        let envelope: Envelope<TicketResponse> = response
            .json()
            .await
            .map_err(|e| auth_failed(format!("Unreadable login response: {e}")))?;

        let ticket = envelope
            .response
            .service_ticket
            .ok_or_else(|| auth_failed(String::from("No service ticket in login response")))?;

        info!("Authenticated to {} as {username}", self.base_url);
        self.ticket = Some(ticket);
        Ok(())
    }

    /// Returns true once a ticket has been obtained.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.ticket.is_some()
    }

    /// The API base URL.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolves an API path against the base URL.
    fn url(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| ZtdError::internal(format!("Invalid API path '{path}': {e}")))
    }

    /// Starts a request with the service ticket attached.
    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        debug!("{method} {url}");
        let builder = self.http.request(method, url);
        match self.ticket.as_deref() {
            Some(ticket) => builder.header(AUTH_HEADER, ticket),
            None => builder,
        }
    }

    /// Sends a request and unwraps the response envelope.
    async fn execute<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let response = builder
            .send()
            .await
            .map_err(|e| ApicError::network(format!("Request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApicError::request_failed(status.as_u16(), body).into());
        }

        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|e| ApicError::invalid_response(format!("Failed to parse response: {e}")))?;

        Ok(envelope.response)
    }

    /// Sends a rule mutation.
    ///
    /// Inline errors may arrive with any status, so the body is inspected
    /// before the status decides.
    async fn execute_rule(&self, builder: RequestBuilder) -> Result<RuleOutcome> {
        let response = builder
            .send()
            .await
            .map_err(|e| ApicError::network(format!("Request failed: {e}")))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        trace!("Rule response ({status}): {body}");

        match serde_json::from_str::<Envelope<RawRuleResponse>>(&body) {
            Ok(envelope) => Ok(envelope.response.into()),
            Err(_) if !status.is_success() => {
                Err(ApicError::request_failed(status.as_u16(), body).into())
            }
            Err(e) => Err(ApicError::invalid_response(format!(
                "Failed to parse rule response: {e}"
            ))
            .into()),
        }
    }

    /// Sends a request whose outcome does not matter.
    async fn fire_and_forget(&self, builder: RequestBuilder) {
        match builder.send().await {
            Ok(response) if !response.status().is_success() => {
                debug!("Ignoring failed request: HTTP {}", response.status());
            }
            Ok(_) => {}
            Err(e) => debug!("Ignoring failed request: {e}"),
        }
    }

    fn sites_request(&self, site_name: Option<&str>) -> Result<RequestBuilder> {
        let builder = self.request(Method::GET, self.url("pnp-project")?);
        Ok(match site_name {
            Some(name) => builder.query(&[("siteName", name), ("offset", "1"), ("limit", PAGE_LIMIT)]),
            None => builder.query(&[("offset", "1"), ("limit", PAGE_LIMIT)]),
        })
    }
}

fn auth_failed(message: String) -> ZtdError {
    ZtdError::Apic(ApicError::AuthenticationFailed { message })
}

#[async_trait]
impl Controller for ApicClient {
    async fn list_sites(&self) -> Result<HashMap<String, Site>> {
        let sites: Vec<Site> = self.execute(self.sites_request(None)?).await?;
        debug!("Found {} sites", sites.len());

        Ok(sites.into_iter().map(|s| (s.name.clone(), s)).collect())
    }

    async fn find_site(&self, name: &str) -> Result<Option<Site>> {
        let sites: Vec<Site> = self.execute(self.sites_request(Some(name))?).await?;
        Ok(sites.into_iter().find(|s| s.name == name))
    }

    async fn create_site(&self, name: &str) -> Result<Site> {
        let body = serde_json::json!([{ "siteName": name }]);
        let builder = self.request(Method::POST, self.url("pnp-project")?).json(&body);
        let _: serde_json::Value = self.execute(builder).await?;

        // The create response only carries a task; fetch the canonical record.
        self.find_site(name)
            .await?
            .ok_or_else(|| ApicError::SiteNotFound { name: name.to_string() }.into())
    }

    async fn list_configs(&self) -> Result<HashMap<String, String>> {
        let namespaces: Vec<String> = self
            .execute(self.request(Method::GET, self.url("file/namespace/")?))
            .await?;

        if !namespaces.iter().any(|n| n == CONFIG_NAMESPACE) {
            debug!("No '{CONFIG_NAMESPACE}' namespace on controller");
            return Ok(HashMap::new());
        }

        let files: Vec<StoredFile> = self
            .execute(self.request(Method::GET, self.url("file/namespace/config")?))
            .await?;

        Ok(files.into_iter().map(|f| (f.name, f.id)).collect())
    }

    async fn upload_config(
        &self,
        file_name: &str,
        content: &str,
        existing_id: Option<String>,
    ) -> Result<String> {
        let (method, url) = match existing_id.as_deref() {
            Some(id) => (Method::PUT, self.url(&format!("file/config/{id}"))?),
            None => (Method::POST, self.url("file/config")?),
        };

        let file_part = multipart::Part::text(content.to_string())
            .file_name(file_name.to_string())
            .mime_str("text/plain")
            .map_err(|e| ZtdError::internal(format!("Bad MIME type: {e}")))?;

        let form = multipart::Form::new()
            .text("configPreference", file_name.to_string())
            .part("fileUpload", file_part);

        let uploaded: UploadResponse = self.execute(self.request(method, url).multipart(form)).await?;
        Ok(uploaded.id)
    }

    async fn delete_config(&self, config_id: &str) {
        match self.url(&format!("file/file/{config_id}")) {
            Ok(url) => self.fire_and_forget(self.request(Method::DELETE, url)).await,
            Err(e) => debug!("Skipping config delete: {e}"),
        }
    }

    async fn list_images(&self) -> Result<HashMap<String, Image>> {
        let images: Vec<Image> = self
            .execute(self.request(Method::GET, self.url("file/namespace/image")?))
            .await?;
        debug!("Found {} images", images.len());

        Ok(images.into_iter().map(|i| (i.name.clone(), i)).collect())
    }

    async fn list_devices(&self, site_id: &str) -> Result<Vec<DeviceRule>> {
        let url = self.url(&format!("pnp-project/{site_id}/device"))?;
        let builder = self
            .request(Method::GET, url)
            .query(&[("offset", "1"), ("limit", PAGE_LIMIT)]);

        self.execute(builder).await
    }

    async fn create_device_rule(&self, site_id: &str, rule: &NewDeviceRule) -> Result<RuleOutcome> {
        let url = self.url(&format!("pnp-project/{site_id}/device"))?;
        let builder = self.request(Method::POST, url).json(&[rule]);

        let outcome = self.execute_rule(builder).await?;
        if let RuleOutcome::Rejected { code, message } = &outcome {
            warn!("Error creating ZTD rule for {}: {code} {message}", rule.host_name);
        }
        Ok(outcome)
    }

    async fn update_device_rule(
        &self,
        site_id: &str,
        device_id: &str,
        patch: &DeviceRulePatch,
    ) -> Result<RuleOutcome> {
        let mut body = serde_json::to_value(patch)
            .map_err(|e| ZtdError::internal(format!("Failed to encode patch: {e}")))?;
        body["id"] = serde_json::json!(device_id);

        let url = self.url(&format!("pnp-project/{site_id}/device"))?;
        self.execute_rule(self.request(Method::PUT, url).json(&[body]))
            .await
    }

    async fn delete_device_rule(&self, site_id: &str, device_id: &str) {
        match self.url(&format!("pnp-project/{site_id}/device/{device_id}")) {
            Ok(url) => self.fire_and_forget(self.request(Method::DELETE, url)).await,
            Err(e) => debug!("Skipping rule delete: {e}"),
        }
    }

    async fn delete_all_devices_in_site(&self, site_name: &str) -> Result<usize> {
        let Some(site) = self.find_site(site_name).await? else {
            warn!("Site {site_name} not found, nothing to clear");
            return Ok(0);
        };

        let devices = self.list_devices(&site.id).await?;
        let mut issued = 0;
        for device in &devices {
            if let Some(device_id) = device.id.as_deref() {
                self.delete_device_rule(&site.id, device_id).await;
                issued += 1;
            }
        }

        debug!("Issued {issued} deletes in site {site_name}");
        Ok(issued)
    }

    async fn task_status(&self, task_id: &str) -> Result<TaskStatus> {
        self.execute(self.request(Method::GET, self.url(&format!("task/{task_id}"))?))
            .await
    }
}
