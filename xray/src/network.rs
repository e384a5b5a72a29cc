use log::debug;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::fmt;
use std::io;
use std::time::Duration;

pub fn client(timeout: Duration) -> reqwest::Result<Client> {
    Client::builder()
        .user_agent(concat!("xray-upload/", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .build()
}

/// Why a remote call did not produce a usable response.
#[derive(Debug)]
pub enum Failure {
    /// The service answered with an error status.
    Status {
        status: StatusCode,
        url: String,
        body: Value,
    },
    /// The service answered successfully with a body that could not be decoded.
    Undecodable {
        status: StatusCode,
        url: String,
        body: String,
        message: String,
    },
    Request(reqwest::Error),
    Io(io::Error),
}

impl Failure {
    /// Whether the failure carries a response from the remote service.
    pub fn is_structured(&self) -> bool {
        matches!(self, Failure::Status { .. } | Failure::Undecodable { .. })
    }

    /// The diagnostics document describing this failure.
    pub fn to_json(&self) -> Value {
        match self {
            Failure::Status { status, url, body } => json!({
                "error": {
                    "message": format!("Request failed with status code {}", status.as_u16()),
                    "status": status.as_u16(),
                    "url": url,
                },
                "response": body,
            }),
            Failure::Undecodable {
                status,
                url,
                body,
                message,
            } => json!({
                "error": {
                    "message": message,
                    "status": status.as_u16(),
                    "url": url,
                },
                "response": body,
            }),
            Failure::Request(e) => json!({
                "message": e.to_string(),
                "url": e.url().map(|x| x.as_str()),
                "timeout": e.is_timeout(),
                "connect": e.is_connect(),
            }),
            Failure::Io(e) => json!({
                "message": e.to_string(),
                "kind": format!("{:?}", e.kind()),
            }),
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Failure::Status { status, url, .. } => write!(f, "{} returned {}", url, status),
            Failure::Undecodable {
                status,
                url,
                message,
                ..
            } => write!(f, "unexpected response from {} ({}): {}", url, status, message),
            Failure::Request(e) => write!(f, "{}", e),
            Failure::Io(e) => write!(f, "{}", e),
        }
    }
}

impl From<reqwest::Error> for Failure {
    fn from(error: reqwest::Error) -> Failure {
        Failure::Request(error)
    }
}

impl From<io::Error> for Failure {
    fn from(error: io::Error) -> Failure {
        Failure::Io(error)
    }
}

/// Send a request, turning error statuses into a [`Failure::Status`]
/// carrying the response body.
pub fn send(req: RequestBuilder) -> Result<Response, Failure> {
    let resp = req.send()?;
    let status = resp.status();
    debug!("{} {}", status, resp.url());
    if status.is_client_error() || status.is_server_error() {
        let url = resp.url().to_string();
        let text = resp.text()?;
        let body = serde_json::from_str(&text).unwrap_or(Value::String(text));
        return Err(Failure::Status { status, url, body });
    }
    Ok(resp)
}

pub fn json<T>(resp: Response) -> Result<T, Failure>
where
    T: DeserializeOwned,
{
    let status = resp.status();
    let url = resp.url().to_string();
    let text = resp.text()?;
    debug!("{}", text);
    serde_json::from_str(&text).map_err(|e| Failure::Undecodable {
        status,
        url,
        body: text,
        message: e.to_string(),
    })
}
