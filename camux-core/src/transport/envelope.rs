//! Response normalization for generate/extend
//!
//! The upstream may return the grant fields either at the top level of the
//! JSON body or nested under `results`. Nested values win when both exist.

use crate::error::TransportError;
use crate::types::{GrantRenewal, StreamGrant};
use serde::Deserialize;

/// Grant fields as they appear on the wire
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantFields {
    pub answer_sdp: Option<String>,
    pub stream_token: Option<String>,
    pub stream_extension_token: Option<String>,
    pub expires_at: Option<String>,
}

impl GrantFields {
    fn or(self, fallback: Self) -> Self {
        Self {
            answer_sdp: self.answer_sdp.or(fallback.answer_sdp),
            stream_token: self.stream_token.or(fallback.stream_token),
            stream_extension_token: self
                .stream_extension_token
                .or(fallback.stream_extension_token),
            expires_at: self.expires_at.or(fallback.expires_at),
        }
    }
}

/// Body of a generate or extend response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    pub results: Option<GrantFields>,
    #[serde(flatten)]
    pub top_level: GrantFields,
}

impl GenerateResponse {
    /// Merge both locations, preferring `results`
    #[must_use]
    pub fn fields(self) -> GrantFields {
        match self.results {
            Some(results) => results.or(self.top_level),
            None => self.top_level,
        }
    }

    /// Build a grant from a generate response.
    ///
    /// The answer SDP and both tokens are required.
    pub fn into_grant(self) -> Result<StreamGrant, TransportError> {
        let fields = self.fields();
        let answer_sdp = non_empty(fields.answer_sdp).ok_or(TransportError::MissingField("answerSdp"))?;
        let stream_token =
            non_empty(fields.stream_token).ok_or(TransportError::MissingField("streamToken"))?;
        let extension_token = non_empty(fields.stream_extension_token)
            .ok_or(TransportError::MissingField("streamExtensionToken"))?;

        let mut grant = StreamGrant::new(answer_sdp, stream_token, extension_token);
        grant.expires_at = fields.expires_at;
        Ok(grant)
    }

    /// Build a renewal from an extend response.
    ///
    /// Only the extension token is required; a missing stream token keeps
    /// the previous one.
    pub fn into_renewal(self) -> Result<GrantRenewal, TransportError> {
        let fields = self.fields();
        let stream_extension_token = non_empty(fields.stream_extension_token)
            .ok_or(TransportError::MissingField("streamExtensionToken"))?;
        Ok(GrantRenewal {
            stream_token: non_empty(fields.stream_token),
            stream_extension_token,
            expires_at: fields.expires_at,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
