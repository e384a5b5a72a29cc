pub mod client;
pub mod config;
pub mod credentials;
pub mod diagnostics;
pub mod error;
pub mod feature;
pub mod heartbeat;
pub mod network;
pub mod normalize;
pub mod report;
pub mod result;
pub mod run;
pub mod timestamp;
pub mod upload;
pub mod wire;

use error::Result;
use url::Url;

pub use client::{CloudClient, Dialect, Operation, ServerClient, XrayClient};
pub use error::Error;
pub use report::{ExecutionReport, ReportBuilder};
pub use upload::{Upload, UploadContext, UploadOutcome};

/// Join `path` onto `base`, keeping any path `base` already has.
pub(crate) fn endpoint(base: &Url, path: &str) -> Result<Url> {
    Ok(Url::parse(&format!(
        "{}/{}",
        base.as_str().trim_end_matches('/'),
        path.trim_start_matches('/')
    ))?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_keeps_base_path() {
        let base = Url::parse("https://xray.cloud.getxray.app/api/v2").unwrap();
        assert_eq!(
            endpoint(&base, "import/execution").unwrap().as_str(),
            "https://xray.cloud.getxray.app/api/v2/import/execution"
        );
        let base = Url::parse("http://127.0.0.1:8080/").unwrap();
        assert_eq!(
            endpoint(&base, "/authenticate").unwrap().as_str(),
            "http://127.0.0.1:8080/authenticate"
        );
    }
}
