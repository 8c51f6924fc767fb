//! Query response envelope

use serde::{Deserialize, Serialize};

/// One page of results plus paging and execution metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse<T> {
    pub items: Vec<T>,
    pub page: PageInfo,
    pub meta: ResponseMeta,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    /// Effective page size after clamping
    pub size: u32,
    /// Present iff another page exists
    pub next_cursor: Option<String>,
    /// Best-effort; `None` when not requested or when counting failed
    pub total_count: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMeta {
    pub from_cache: bool,
    pub rows_examined: u64,
}

impl<T> QueryResponse<T> {
    /// Number of items in this page
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// True when a further page can be requested
    pub fn has_more(&self) -> bool {
        self.page.next_cursor.is_some()
    }

    /// Converts the items while keeping paging metadata
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> QueryResponse<U> {
        QueryResponse {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            meta: self.meta,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_shape() {
        let response = QueryResponse {
            items: vec![json!({"Id": 1})],
            page: PageInfo {
                size: 10,
                next_cursor: Some("abc".into()),
                total_count: None,
            },
            meta: ResponseMeta {
                from_cache: false,
                rows_examined: 11,
            },
        };

        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["page"]["nextCursor"], "abc");
        assert_eq!(value["page"]["totalCount"], serde_json::Value::Null);
        assert_eq!(value["meta"]["rowsExamined"], 11);
        assert!(response.has_more());
    }
}
