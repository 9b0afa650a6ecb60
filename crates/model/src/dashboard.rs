use crate::Document;
use serde::{Deserialize, Serialize};

/// Counters returned by the backend's `get_dashboard_data` procedure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardData {
    pub total_documents: u64,
    pub pdf_count: u64,
    pub image_count: u64,
    pub total_bytes: u64,
    pub favorite_count: u64,
    pub folder_count: u64,
    #[serde(default)]
    pub recent_documents: Vec<Document>,
}
