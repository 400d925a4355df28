//! Extraction job specification

use crate::extract::config::DEFAULT_PAGE_SIZE;
use crate::extract::ExtractError;

/// Parameters for one extraction run.
#[derive(Debug, Clone)]
pub struct ExtractionJob {
    /// Scan/job identifier stamped onto records and handed to the hooks.
    pub scan_id: String,
    /// Owning organization; doubles as the tenant id on output records.
    pub organization_id: String,
    /// Page size requested from the API.
    pub page_size: u32,
    /// Property allow-list; `None` applies the default schema mapping.
    pub properties: Option<Vec<String>>,
    /// Endpoint override; `None` uses the deals collection path.
    pub endpoint: Option<String>,
    /// Per-job token override; `None` uses the client's default token.
    pub access_token: Option<String>,
}

impl ExtractionJob {
    /// Create a job with default page size and mapping.
    pub fn new(scan_id: impl Into<String>, organization_id: impl Into<String>) -> Self {
        Self {
            scan_id: scan_id.into(),
            organization_id: organization_id.into(),
            page_size: DEFAULT_PAGE_SIZE,
            properties: None,
            endpoint: None,
            access_token: None,
        }
    }

    /// Override the page size.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Restrict output records to the given top-level properties.
    pub fn with_properties(mut self, properties: Vec<String>) -> Self {
        self.properties = Some(properties);
        self
    }

    /// Fetch from a different endpoint path or absolute URL.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Use a job-specific access token for every request of this run.
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Validate job parameters before any network activity.
    pub fn validate(&self) -> Result<(), ExtractError> {
        if self.scan_id.trim().is_empty() {
            return Err(ExtractError::Configuration(
                "scan id must be provided".to_string(),
            ));
        }
        if self.organization_id.trim().is_empty() {
            return Err(ExtractError::Configuration(
                "organization id must be provided".to_string(),
            ));
        }
        if let Some(token) = &self.access_token {
            if token.trim().is_empty() {
                return Err(ExtractError::Configuration(
                    "access token override must not be empty".to_string(),
                ));
            }
        }
        if self.page_size == 0 {
            return Err(ExtractError::Configuration(
                "page size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
