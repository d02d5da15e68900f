use crate::config::ConsoleConfig;
use crate::downloader::{
    HeaderTrailer, OutputFormat, ReportRow, parse_report_rows, to_flat_file, to_xlsx,
};
use crate::error::{FetchFailure, ReportError};
use crate::loader::DropdownSource;
use crate::report::{REPORT_TYPE_FIELD, ReportProfile};
use async_trait::async_trait;
use log::{debug, warn};
use serde_json::{Value, json};

/// HTTP client for the reporting API.
#[derive(Clone)]
pub struct ApiClient {
    config: ConsoleConfig,
    http: reqwest::Client,
}

impl ApiClient {
    pub fn new(config: ConsoleConfig) -> Self {
        ApiClient {
            config,
            http: reqwest::Client::new(),
        }
    }

    pub fn dropdown_url(&self, profile: &ReportProfile) -> Option<String> {
        let path = profile.dropdown_path.as_deref()?;
        let mut url = self.config.endpoint(path);
        if let Some(report_type) = &profile.report_type {
            url.push_str("?reportType=");
            url.push_str(&urlencoding::encode(report_type));
        }
        Some(url)
    }

    /// POST the request body and return the report rows.
    ///
    /// The status is checked before the body is decoded. An error response
    /// carrying a JSON `message` surfaces that message as `Upstream`.
    pub async fn generate(
        &self,
        profile: &ReportProfile,
        body: &Value,
    ) -> Result<Vec<ReportRow>, ReportError> {
        let url = self.config.endpoint(&profile.generate_path);
        debug!("POST {} {}", url, body);

        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| FetchFailure::Transport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| FetchFailure::Transport(e.to_string()))?;

        if !status.is_success() {
            if let Some(message) = upstream_message(&text) {
                return Err(ReportError::Upstream(message));
            }
            return Err(FetchFailure::Status {
                url,
                status: status.as_u16(),
            }
            .into());
        }

        let payload: Value =
            serde_json::from_str(&text).map_err(|e| FetchFailure::Decode(e.to_string()))?;
        parse_report_rows(payload)
    }

    /// Generate the report and render it in the profile's output format.
    ///
    /// Flat files are wrapped in the header and trailer fetched for the body's
    /// `reportType`.
    pub async fn download(
        &self,
        profile: &ReportProfile,
        body: &Value,
    ) -> Result<Vec<u8>, ReportError> {
        let rows = self.generate(profile, body).await?;
        match &profile.output {
            OutputFormat::Xlsx(layout) => to_xlsx(&rows, layout),
            OutputFormat::FlatFile(layout) => {
                let wrap = match body.get(REPORT_TYPE_FIELD).and_then(Value::as_str) {
                    Some(report_type) => self.header_trailer(report_type).await,
                    None => HeaderTrailer::default(),
                };
                Ok(to_flat_file(&rows, layout, &wrap).into_bytes())
            }
        }
    }

    /// Header and trailer lines for a flat-file report. Blank on any failure.
    pub async fn header_trailer(&self, report_type: &str) -> HeaderTrailer {
        self.fetch_header_trailer(report_type)
            .await
            .unwrap_or_else(|e| {
                warn!("could not fetch header/trailer for '{}': {}", report_type, e);
                HeaderTrailer::default()
            })
    }

    async fn fetch_header_trailer(&self, report_type: &str) -> Result<HeaderTrailer, FetchFailure> {
        let url = self.config.endpoint("/get-report-header-trailer");
        let response = self
            .http
            .post(&url)
            .json(&json!({ REPORT_TYPE_FIELD: report_type }))
            .send()
            .await
            .map_err(|e| FetchFailure::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(FetchFailure::Status {
                url,
                status: response.status().as_u16(),
            });
        }

        response
            .json::<HeaderTrailer>()
            .await
            .map_err(|e| FetchFailure::Decode(e.to_string()))
    }
}

fn upstream_message(text: &str) -> Option<String> {
    let payload: Value = serde_json::from_str(text).ok()?;
    payload
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[async_trait]
impl DropdownSource for ApiClient {
    async fn fetch_dropdowns(&self, profile: &ReportProfile) -> Result<Value, FetchFailure> {
        let url = self
            .dropdown_url(profile)
            .ok_or_else(|| FetchFailure::NoEndpoint(profile.name.clone()))?;
        debug!("GET {}", url);

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| FetchFailure::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(FetchFailure::Status {
                url,
                status: response.status().as_u16(),
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| FetchFailure::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::builtin_profile;

    #[test]
    fn test_dropdown_url() {
        let client = ApiClient::new(ConsoleConfig {
            api_url: "http://reports.local/".to_string(),
            ..ConsoleConfig::default()
        });

        let mut profile = builtin_profile("death").unwrap();
        assert_eq!(
            client.dropdown_url(&profile).as_deref(),
            Some("http://reports.local/api/dropdown-data-deathreport")
        );

        profile.report_type = Some("Loan Book".to_string());
        assert_eq!(
            client.dropdown_url(&profile).as_deref(),
            Some("http://reports.local/api/dropdown-data-deathreport?reportType=Loan%20Book")
        );

        assert!(client.dropdown_url(&builtin_profile("regulatory").unwrap()).is_none());
    }
}
