pub mod gemini;
pub mod openai;

use super::{api_error_message, LlmError};
use serde_json::Value;

/// JSON body of a successful response; non-2xx becomes [`LlmError::Api`].
async fn read_json(response: reqwest::Response) -> Result<Value, LlmError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(LlmError::Api {
            status: status.as_u16(),
            message: api_error_message(&body),
        });
    }
    Ok(serde_json::from_str(&body)?)
}
