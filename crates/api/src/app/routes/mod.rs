use axum::http::HeaderMap;

use crate::app::errors::FieldIssue;

pub mod engagement;
pub mod internal;
pub mod system;

pub const IDEMPOTENCY_KEY_HEADER: &str = "x-idempotency-key";

const MAX_IDEMPOTENCY_KEY_LEN: usize = 128;

/// Read `X-Idempotency-Key`. `Ok(None)` when absent.
pub(crate) fn idempotency_key(headers: &HeaderMap) -> Result<Option<String>, FieldIssue> {
    let Some(raw) = headers.get(IDEMPOTENCY_KEY_HEADER) else {
        return Ok(None);
    };
    let key = raw
        .to_str()
        .map_err(|_| FieldIssue::new("X-Idempotency-Key", "must be visible ASCII"))?
        .trim();
    if key.is_empty() {
        return Err(FieldIssue::new("X-Idempotency-Key", "must not be empty"));
    }
    if key.len() > MAX_IDEMPOTENCY_KEY_LEN {
        return Err(FieldIssue::new(
            "X-Idempotency-Key",
            format!("must be at most {MAX_IDEMPOTENCY_KEY_LEN} characters"),
        ));
    }
    Ok(Some(key.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn idempotency_key_is_optional_but_not_blank() {
        let mut headers = HeaderMap::new();
        assert_eq!(idempotency_key(&headers), Ok(None));

        headers.insert(IDEMPOTENCY_KEY_HEADER, HeaderValue::from_static(" evt-1 "));
        assert_eq!(idempotency_key(&headers), Ok(Some("evt-1".to_string())));

        headers.insert(IDEMPOTENCY_KEY_HEADER, HeaderValue::from_static(""));
        assert!(idempotency_key(&headers).is_err());

        let long = "k".repeat(MAX_IDEMPOTENCY_KEY_LEN + 1);
        headers.insert(IDEMPOTENCY_KEY_HEADER, HeaderValue::from_str(&long).unwrap());
        assert!(idempotency_key(&headers).is_err());
    }
}
