use axum::{http::StatusCode, Json};
use serde::Serialize;

/// Uniform JSON wrapper: `{success, data?, error?}`.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> Envelope<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

impl Envelope<()> {
    pub fn failure(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }

    pub fn empty() -> Self {
        Self {
            success: true,
            data: None,
            error: None,
        }
    }
}

pub fn ok<T: Serialize>(data: T) -> Json<Envelope<T>> {
    Json(Envelope::success(data))
}

pub fn ok_empty() -> Json<Envelope<()>> {
    Json(Envelope::empty())
}

pub fn created<T: Serialize>(data: T) -> (StatusCode, Json<Envelope<T>>) {
    (StatusCode::CREATED, Json(Envelope::success(data)))
}

#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub meta: PageMeta,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct PageMeta {
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub pages: i64,
}

impl PageMeta {
    pub fn new(total: i64, page: i64, limit: i64) -> Self {
        Self {
            total,
            page,
            limit,
            pages: (total + limit - 1) / limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_envelope_omits_error() {
        let json = serde_json::to_string(&Envelope::success(42)).unwrap();
        assert_eq!(json, r#"{"success":true,"data":42}"#);
    }

    #[test]
    fn failure_envelope_omits_data() {
        let json = serde_json::to_string(&Envelope::failure("nope".into())).unwrap();
        assert_eq!(json, r#"{"success":false,"error":"nope"}"#);
    }

    #[test]
    fn empty_envelope_is_bare_success() {
        let json = serde_json::to_string(&Envelope::empty()).unwrap();
        assert_eq!(json, r#"{"success":true}"#);
    }

    #[test]
    fn page_meta_rounds_up() {
        assert_eq!(PageMeta::new(0, 1, 10).pages, 0);
        assert_eq!(PageMeta::new(10, 1, 10).pages, 1);
        assert_eq!(PageMeta::new(11, 1, 10).pages, 2);
        assert_eq!(PageMeta::new(21, 3, 10).pages, 3);
    }
}
