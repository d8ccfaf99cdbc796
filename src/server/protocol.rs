//! Wire types and result codec for the query protocol.
//!
//! The protocol is one JSON object per line in each direction. A request
//! carries a query vector plus `k` (k-NN) or `maxRange` (range search); the
//! response is either `{"results": [...]}` or `{"error": {...}}`. Error
//! kinds mirror [`VantageError::kind`].

use serde::{Deserialize, Serialize};

use crate::error::{Result, VantageError};
use crate::vptree::Neighbor;

/// A single k-NN or range query.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    /// Query vector; must match the indexed dimensionality.
    pub query_vector: Vec<f32>,
    /// Number of nearest neighbors to return.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub k: Option<usize>,
    /// Radius for a range search. `k` takes precedence when both are given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_range: Option<f32>,
}

impl QueryRequest {
    /// Build a k-NN request.
    pub fn knn(query_vector: Vec<f32>, k: usize) -> Self {
        Self {
            query_vector,
            k: Some(k),
            max_range: None,
        }
    }

    /// Build a range request.
    pub fn range(query_vector: Vec<f32>, max_range: f32) -> Self {
        Self {
            query_vector,
            k: None,
            max_range: Some(max_range),
        }
    }
}

/// One scored hit on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireNeighbor {
    /// Row index of the matched point.
    pub point_index: u32,
    /// Distance from the query.
    pub distance: f32,
}

impl From<Neighbor> for WireNeighbor {
    fn from(n: Neighbor) -> Self {
        Self {
            point_index: n.index,
            distance: n.distance,
        }
    }
}

/// Error payload mirrored onto the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Stable machine-readable kind, e.g. `dimension_mismatch`.
    pub kind: String,
    /// Human-readable description.
    pub message: String,
}

/// Server reply: either an ordered result list or an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryResponse {
    Results { results: Vec<WireNeighbor> },
    Error { error: ErrorBody },
}

impl QueryResponse {
    /// Wrap search hits for the wire.
    pub fn from_neighbors(neighbors: Vec<Neighbor>) -> Self {
        QueryResponse::Results {
            results: neighbors.into_iter().map(WireNeighbor::from).collect(),
        }
    }

    /// Convert a failure into its wire representation.
    pub fn from_error(err: &VantageError) -> Self {
        QueryResponse::Error {
            error: ErrorBody {
                kind: err.kind().to_string(),
                message: err.to_string(),
            },
        }
    }
}

/// Decode one request line.
pub fn decode_request(line: &str) -> Result<QueryRequest> {
    Ok(serde_json::from_str(line)?)
}

/// Encode one response line, newline terminator included.
pub fn encode_response(response: &QueryResponse) -> Result<String> {
    let mut line = serde_json::to_string(response)?;
    line.push('\n');
    Ok(line)
}
