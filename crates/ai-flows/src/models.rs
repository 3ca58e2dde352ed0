use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::llm::FlowId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OkResponse {
    pub ok: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

/// Published description of one flow and its JSON contracts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowDescriptor {
    pub flow_id: FlowId,
    pub request_schema: Value,
    pub response_schema: Value,
}

impl FlowDescriptor {
    pub fn for_flow(flow_id: FlowId) -> Self {
        Self {
            flow_id,
            request_schema: crate::llm::request_schema(flow_id),
            response_schema: crate::llm::output_schema(flow_id),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListFlowsResponse {
    pub flows: Vec<FlowDescriptor>,
}
