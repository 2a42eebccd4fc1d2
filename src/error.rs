use thiserror::Error;

use crate::fetcher::FetchError;

/// Load-level failures. Either one suppresses the chart and table until the
/// next successful load.
#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("Failed to parse ABI: {0}")]
    InterfaceParse(String),

    /// The user sees only the generic text; the cause is logged.
    #[error("Failed to fetch logs.")]
    Fetch(#[from] FetchError),
}
