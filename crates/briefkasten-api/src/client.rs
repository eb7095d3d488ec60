// Mailbox HTTP client
//
// Wraps `reqwest::Client` with base-URL joining, status checking and
// JSON decoding. One inherent method per endpoint; every endpoint except
// `/status` is a JSON POST.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::models::{
    Ack, DeviceRef, ErrorBody, FlapPoll, LetterRecord, LettersRequest, LettersResponse,
    NewLetterRequest, RegisterRequest, SerialRequest, ServiceStatus, UnlockPoll,
};
use crate::transport::TransportConfig;

/// HTTP client for the mailbox service.
///
/// Cheap to clone; the underlying connection pool is shared.
#[derive(Debug, Clone)]
pub struct MailboxClient {
    http: reqwest::Client,
    base_url: Url,
}

impl MailboxClient {
    /// Create a client from a `TransportConfig`.
    ///
    /// `base_url` is the service root, e.g. `http://192.168.5.1:5000`.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::with_client(http, base_url))
    }

    /// Create a client around a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, mut base_url: Url) -> Self {
        // `Url::join` replaces the last path segment unless it ends in '/'.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self { http, base_url }
    }

    /// The service base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── Endpoints ────────────────────────────────────────────────────

    /// `GET /status`
    pub async fn status(&self) -> Result<ServiceStatus, Error> {
        let url = self.url("status")?;
        debug!("GET {}", url);
        let resp = self.http.get(url).send().await?;
        Self::decode(resp).await
    }

    /// `POST /register`
    pub async fn register(&self, mac_address: &str, serial_number: &str) -> Result<Ack, Error> {
        let body = RegisterRequest {
            mac_address: mac_address.to_owned(),
            serial_number: serial_number.to_owned(),
        };
        self.post("register", &body).await
    }

    /// `POST /letters` -- letter history of the device registered under `mac_address`.
    pub async fn letters(&self, mac_address: &str) -> Result<Vec<LetterRecord>, Error> {
        let body = LettersRequest {
            mac_address: mac_address.to_owned(),
        };
        let resp: LettersResponse = self.post("letters", &body).await?;
        Ok(resp.letters)
    }

    /// `POST /new_letter`
    pub async fn new_letter(
        &self,
        serial_number: &str,
        time: Option<DateTime<Utc>>,
    ) -> Result<Ack, Error> {
        let body = NewLetterRequest {
            serial_number: serial_number.to_owned(),
            time,
        };
        self.post("new_letter", &body).await
    }

    /// `POST /entriegeln` -- ask the device to unlock its flap.
    pub async fn request_unlock(&self, device: &DeviceRef) -> Result<Ack, Error> {
        self.post("entriegeln", device).await
    }

    /// `POST /frage_entriegeln` -- consume a pending unlock request.
    ///
    /// Returns `true` at most once per unlock request.
    pub async fn poll_unlock(&self, serial_number: &str) -> Result<bool, Error> {
        let resp: UnlockPoll = self
            .post("frage_entriegeln", &Self::serial(serial_number))
            .await?;
        Ok(resp.entriegeln)
    }

    /// `POST /open` -- report that the flap is open.
    pub async fn report_open(&self, serial_number: &str) -> Result<Ack, Error> {
        self.post("open", &Self::serial(serial_number)).await
    }

    /// `POST /close` -- report that the flap is closed.
    pub async fn report_close(&self, serial_number: &str) -> Result<Ack, Error> {
        self.post("close", &Self::serial(serial_number)).await
    }

    /// `POST /frage_offen` -- last reported flap state.
    pub async fn flap_open(&self, device: &DeviceRef) -> Result<bool, Error> {
        let resp: FlapPoll = self.post("frage_offen", device).await?;
        Ok(resp.offen)
    }

    // ── Request helpers ──────────────────────────────────────────────

    fn url(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(path)?)
    }

    fn serial(serial_number: &str) -> SerialRequest {
        SerialRequest {
            serial_number: serial_number.to_owned(),
        }
    }

    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &impl Serialize,
    ) -> Result<T, Error> {
        let url = self.url(path)?;
        debug!("POST {}", url);
        let resp = self.http.post(url).json(body).send().await?;
        Self::decode(resp).await
    }

    /// Check the status code, then decode the JSON body.
    ///
    /// Non-2xx responses become `Error::Status`, using the server's
    /// `{"error": ...}` message when one is present.
    async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorBody>(&body)
                .map(|e| e.error)
                .unwrap_or_else(|_| body.clone());
            return Err(Error::Status {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body,
        })
    }
}
