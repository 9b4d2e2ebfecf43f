pub mod gemini;
pub mod mock;
pub mod openai;

use std::time::Duration;

use crate::DirectingError;

#[derive(Clone, Debug)]
pub enum ProviderConfig {
    OpenAi(openai::OpenAiConfig),
    Gemini(gemini::GeminiConfig),
    Mock(mock::MockConfig),
}

pub(crate) fn build_agent() -> ureq::Agent {
    ureq::AgentBuilder::new()
        .timeout_connect(Duration::from_secs(20))
        .timeout_read(Duration::from_secs(120))
        .timeout_write(Duration::from_secs(20))
        .build()
}

/// POST a JSON payload and return the response body.
///
/// HTTP error statuses carry the body text so provider messages reach the user.
pub(crate) fn post_json(
    request: ureq::Request,
    payload: &serde_json::Value,
    provider: &str,
) -> Result<String, DirectingError> {
    let response = request
        .set("Content-Type", "application/json")
        .set("Accept", "application/json")
        .send_string(&payload.to_string());
    match response {
        Ok(response) => response.into_string().map_err(|err| {
            DirectingError::unavailable(format!("Read {provider} response failed: {err}"))
        }),
        Err(ureq::Error::Status(code, response)) => {
            let body = response.into_string().unwrap_or_default();
            Err(DirectingError::unavailable(format!(
                "{provider} returned HTTP {code}: {}",
                body.trim()
            )))
        }
        // Transport errors render the request URL; report only kind and message.
        Err(ureq::Error::Transport(transport)) => Err(DirectingError::unavailable(format!(
            "{provider} request failed: {}{}",
            transport.kind(),
            transport.message().map(|m| format!(": {m}")).unwrap_or_default()
        ))),
    }
}
