//! Decoding of successful response bodies.

use serde::de::DeserializeOwned;

use super::{HttpResponse, RequestError};

/// A decoded success body.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    /// Body of a response with a JSON content type.
    Json(serde_json::Value),
    /// Body of any other response, as text.
    Text(String),
}

impl ResponseBody {
    /// Decodes `response` according to its declared content type.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::Decode`] if the content type is JSON but the
    /// body is not.
    pub fn decode(endpoint: &str, response: &HttpResponse) -> Result<Self, RequestError> {
        if !response.content_type().is_some_and(is_json_content_type) {
            return Ok(Self::Text(response.body_text()));
        }

        serde_json::from_slice(&response.body)
            .map(Self::Json)
            .map_err(|source| RequestError::Decode {
                endpoint: endpoint.to_string(),
                source,
            })
    }

    /// Returns the JSON value, if this is a JSON body.
    #[must_use]
    pub const fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Json(value) => Some(value),
            Self::Text(_) => None,
        }
    }

    /// Returns the text, if this is a text body.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Json(_) => None,
            Self::Text(text) => Some(text),
        }
    }

    /// Deserializes the body into `T`.
    ///
    /// Text bodies are parsed as JSON, which covers servers that omit the
    /// content type.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::Decode`] if the body does not match `T`.
    pub fn into_typed<T: DeserializeOwned>(self, endpoint: &str) -> Result<T, RequestError> {
        let result = match self {
            Self::Json(value) => serde_json::from_value(value),
            Self::Text(text) => serde_json::from_str(&text),
        };

        result.map_err(|source| RequestError::Decode {
            endpoint: endpoint.to_string(),
            source,
        })
    }

    /// Converts the body into a JSON value, wrapping text in a string.
    #[must_use]
    pub fn into_json(self) -> serde_json::Value {
        match self {
            Self::Json(value) => value,
            Self::Text(text) => serde_json::Value::String(text),
        }
    }
}

/// Returns true for `application/json` and its `+json` / `json` variants.
#[must_use]
pub fn is_json_content_type(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    essence == "application/json" || essence.ends_with("+json") || essence.ends_with("/json")
}
