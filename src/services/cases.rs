//! Caseworker case operations.

use crate::client::{CaseworkClient, RequestOptions};
use crate::errors::{CaseworkError, CaseworkResult};
use serde::Serialize;
use serde_json::Value;
use url::Url;

/// Sort order for case searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    /// Newest first.
    #[default]
    Descending,
    /// Oldest first.
    Ascending,
}

impl SortDirection {
    fn as_str(self) -> &'static str {
        match self {
            Self::Descending => "desc",
            Self::Ascending => "asc",
        }
    }
}

#[derive(Serialize)]
struct StartMultipleRequest {
    case_details: MultipleCaseDetails,
}

#[derive(Serialize)]
struct MultipleCaseDetails {
    case_data: MultipleCaseData,
    case_type_id: String,
}

#[derive(Serialize)]
struct MultipleCaseData {
    #[serde(rename = "caseRefNumberCount")]
    case_ref_number_count: String,
}

/// Service for caseworker case operations.
pub struct CasesService<'a> {
    client: &'a CaseworkClient,
}

impl<'a> CasesService<'a> {
    /// Creates a new cases service.
    pub(crate) fn new(client: &'a CaseworkClient) -> Self {
        Self { client }
    }

    /// Initiates case creation, returning the event-trigger token response.
    pub async fn start_case_creation(
        &self,
        case_type_id: &str,
        extra: &RequestOptions,
    ) -> CaseworkResult<Value> {
        let event_id = self.client.config().initiate_claim_event_id.clone();
        let url = self.event_trigger_url(case_type_id, &event_id).await?;
        self.client
            .get_json_with_login(&url, "Start case creation", extra)
            .await
    }

    /// Initiates a bulk-action case, returning the event-trigger token
    /// response.
    pub async fn start_bulk_creation(
        &self,
        case_type_id: &str,
        extra: &RequestOptions,
    ) -> CaseworkResult<Value> {
        let event_id = self.client.config().initiate_bulk_event_id.clone();
        let url = self.event_trigger_url(case_type_id, &event_id).await?;
        self.client
            .get_json_with_login(&url, "Start bulk creation", extra)
            .await
    }

    /// Creates a case from a prepared payload.
    pub async fn create_case(
        &self,
        data: &Value,
        case_type_id: &str,
        extra: &RequestOptions,
    ) -> CaseworkResult<Value> {
        let url = self.cases_url(case_type_id).await?;
        self.client
            .post_json_with_login(&url, data, "Case worker create case", extra)
            .await
    }

    /// Finds a case by its id.
    pub async fn case(
        &self,
        case_id: &str,
        case_type_id: &str,
        extra: &RequestOptions,
    ) -> CaseworkResult<Value> {
        let url = format!("{}/{case_id}", self.cases_url(case_type_id).await?);
        self.client
            .get_json_with_login(&url, "Caseworker get by id", extra)
            .await
    }

    /// Searches for cases by fee-group reference.
    pub async fn search_by_reference(
        &self,
        reference: &str,
        case_type_id: &str,
        page: u32,
        sort_direction: SortDirection,
        extra: &RequestOptions,
    ) -> CaseworkResult<Value> {
        let url = self
            .search_url(
                case_type_id,
                "case.feeGroupReference",
                reference,
                page,
                sort_direction,
            )
            .await?;
        self.client
            .get_json_with_login(&url, "Caseworker search by reference", extra)
            .await
    }

    /// Returns the latest case matching the fee-group reference.
    pub async fn search_latest_by_reference(
        &self,
        reference: &str,
        case_type_id: &str,
        extra: &RequestOptions,
    ) -> CaseworkResult<Option<Value>> {
        let results = self
            .search_by_reference(reference, case_type_id, 1, SortDirection::Descending, extra)
            .await?;
        Ok(first_result(results))
    }

    /// Searches for cases by multiples reference.
    pub async fn search_by_multiple_reference(
        &self,
        reference: &str,
        case_type_id: &str,
        page: u32,
        sort_direction: SortDirection,
        extra: &RequestOptions,
    ) -> CaseworkResult<Value> {
        let url = self
            .search_url(
                case_type_id,
                "case.multipleReference",
                reference,
                page,
                sort_direction,
            )
            .await?;
        self.client
            .get_json_with_login(&url, "Caseworker search by multiple reference", extra)
            .await
    }

    /// Returns the latest case matching the multiples reference.
    pub async fn search_latest_by_multiple_reference(
        &self,
        reference: &str,
        case_type_id: &str,
        extra: &RequestOptions,
    ) -> CaseworkResult<Option<Value>> {
        let results = self
            .search_by_multiple_reference(
                reference,
                case_type_id,
                1,
                SortDirection::Descending,
                extra,
            )
            .await?;
        Ok(first_result(results))
    }

    /// Searches for cases by ethos case reference. Document-store URLs in the
    /// result are rewritten back to their internal form when rewriting is
    /// enabled.
    pub async fn search_by_ethos_case_reference(
        &self,
        reference: &str,
        case_type_id: &str,
        page: u32,
        sort_direction: SortDirection,
        extra: &RequestOptions,
    ) -> CaseworkResult<Value> {
        let url = self
            .search_url(
                case_type_id,
                "case.ethosCaseReference",
                reference,
                page,
                sort_direction,
            )
            .await?;
        let results = self
            .client
            .get_json_with_login(&url, "Caseworker search by ethos case reference", extra)
            .await?;
        self.client.rewriter().rewrite_inbound(results)
    }

    /// Returns the latest case matching the ethos case reference.
    pub async fn search_latest_by_ethos_case_reference(
        &self,
        reference: &str,
        case_type_id: &str,
        extra: &RequestOptions,
    ) -> CaseworkResult<Option<Value>> {
        let results = self
            .search_by_ethos_case_reference(
                reference,
                case_type_id,
                1,
                SortDirection::Descending,
                extra,
            )
            .await?;
        Ok(first_result(results))
    }

    /// Fetches pagination metadata for a case search.
    pub async fn pagination_metadata(
        &self,
        case_type_id: &str,
        query: &[(String, String)],
        extra: &RequestOptions,
    ) -> CaseworkResult<Value> {
        let base = format!(
            "{}/pagination_metadata",
            self.cases_url(case_type_id).await?
        );
        let mut url = parse_url(&base)?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (name, value) in query {
                pairs.append_pair(name, value);
            }
        }
        self.client
            .get_json_with_login(url.as_str(), "Caseworker cases pagination metadata", extra)
            .await
    }

    /// Starts a multiple of `quantity` cases.
    pub async fn start_multiple(
        &self,
        case_type_id: &str,
        quantity: u32,
        extra: &RequestOptions,
    ) -> CaseworkResult<Value> {
        let url = self
            .client
            .config()
            .start_multiple_url
            .clone()
            .ok_or_else(|| CaseworkError::configuration("start_multiple_url is not configured"))?;
        let payload = StartMultipleRequest {
            case_details: MultipleCaseDetails {
                case_data: MultipleCaseData {
                    case_ref_number_count: quantity.to_string(),
                },
                case_type_id: case_type_id.to_owned(),
            },
        };
        self.client
            .post_json_with_login(&url, &payload, "Start multiple", extra)
            .await
    }

    // URL builders

    async fn caseworker_url(&self, case_type_id: &str) -> CaseworkResult<String> {
        let config = self.client.config();
        let details = self.client.provider().user_details().await?;
        Ok(format!(
            "{}/caseworkers/{}/jurisdictions/{}/case-types/{}",
            config.base_url.trim_end_matches('/'),
            details.id,
            config.jurisdiction_id,
            case_type_id,
        ))
    }

    async fn cases_url(&self, case_type_id: &str) -> CaseworkResult<String> {
        Ok(format!("{}/cases", self.caseworker_url(case_type_id).await?))
    }

    async fn event_trigger_url(
        &self,
        case_type_id: &str,
        event_id: &str,
    ) -> CaseworkResult<String> {
        Ok(format!(
            "{}/event-triggers/{}/token",
            self.caseworker_url(case_type_id).await?,
            event_id,
        ))
    }

    async fn search_url(
        &self,
        case_type_id: &str,
        reference_field: &str,
        reference: &str,
        page: u32,
        sort_direction: SortDirection,
    ) -> CaseworkResult<String> {
        let mut url = parse_url(&self.cases_url(case_type_id).await?)?;
        url.query_pairs_mut()
            .append_pair(reference_field, reference)
            .append_pair("page", &page.to_string())
            .append_pair("sortDirection", sort_direction.as_str());
        Ok(url.into())
    }
}

fn parse_url(url: &str) -> CaseworkResult<Url> {
    Url::parse(url).map_err(|e| CaseworkError::configuration(format!("invalid URL {url}: {e}")))
}

fn first_result(results: Value) -> Option<Value> {
    match results {
        Value::Array(mut items) => {
            if items.is_empty() {
                None
            } else {
                Some(items.swap_remove(0))
            }
        }
        _ => None,
    }
}
