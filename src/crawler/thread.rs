//! Reply chain walker
//!
//! Twitter favorites are often replies; the tweets they answer are archived
//! with them by following `in_reply_to_status_id_str` upwards.

use crate::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashSet;

/// Fetches a single status by ID
#[async_trait]
pub trait StatusLookup: Send + Sync {
    async fn lookup_status(&self, id: &str) -> Result<Value>;
}

fn status_id(status: &Value) -> Option<&str> {
    status.get("id_str").and_then(Value::as_str)
}

fn parent_id(status: &Value) -> Option<&str> {
    status
        .get("in_reply_to_status_id_str")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
}

/// Returns `leaf` followed by its ancestors in the order they were reached
///
/// The walk stops at an ancestor already visited in this run, at a status
/// without a parent, on a cycle, or when a lookup fails. A failed lookup
/// truncates the chain and is not reported as an error.
pub async fn walk_reply_chain(
    lookup: &dyn StatusLookup,
    leaf: Value,
    visited: &HashSet<String>,
) -> Vec<Value> {
    let mut in_chain: HashSet<String> = status_id(&leaf).map(str::to_string).into_iter().collect();
    let mut next = parent_id(&leaf).map(str::to_string);
    let mut chain = vec![leaf];

    while let Some(id) = next.take() {
        if visited.contains(&id) || !in_chain.insert(id.clone()) {
            break;
        }

        match lookup.lookup_status(&id).await {
            Ok(status) => {
                next = parent_id(&status).map(str::to_string);
                chain.push(status);
            }
            Err(e) => {
                tracing::debug!("Reply chain truncated at {}: {}", id, e);
                break;
            }
        }
    }

    chain
}
