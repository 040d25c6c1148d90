//! System instruction sources

use async_trait::async_trait;

use crate::error::Result;

/// Somewhere system instructions can be fetched from by name
/// (a tool server's prompt endpoint, a file, a constant).
#[async_trait]
pub trait PromptSource: Send + Sync {
    async fn fetch_prompt(&self, name: &str) -> Result<String>;
}
