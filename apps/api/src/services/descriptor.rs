//! Marketing copy for recommended products.
//!
//! Always produces a description: the generation model is used when it is
//! up, otherwise one of two fixed sentences. Which one depends on whether
//! the model was never available or was available and the call failed.

use crate::services::gemini::TextGenerator;
use crate::services::lifecycle::ServiceStatus;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub const MAX_DESCRIPTION_CHARS: usize = 300;
const ELLIPSIS: &str = "...";

#[derive(Clone)]
pub struct DescriptorGenerator {
    model: ServiceStatus<Arc<dyn TextGenerator>>,
    timeout: Duration,
}

impl DescriptorGenerator {
    pub fn new(model: ServiceStatus<Arc<dyn TextGenerator>>, timeout: Duration) -> Self {
        Self { model, timeout }
    }

    /// Generator that only ever uses the "never configured" sentence.
    pub fn template_only() -> Self {
        Self::new(ServiceStatus::Unconfigured, Duration::from_secs(30))
    }

    pub fn is_ready(&self) -> bool {
        self.model.is_ready()
    }

    pub async fn describe(&self, title: &str, brand: &str, price: f64) -> String {
        let Some(model) = self.model.ready() else {
            return unavailable_description(title, brand);
        };

        let prompt = build_prompt(title, brand, price);
        match tokio::time::timeout(self.timeout, model.generate(&prompt)).await {
            Ok(Ok(text)) => match finalize(&text) {
                Some(description) => description,
                None => {
                    warn!("Empty generated description for '{}'", title);
                    failed_call_description(title, brand)
                }
            },
            Ok(Err(e)) => {
                warn!("Error generating creative description for '{}': {}", title, e);
                failed_call_description(title, brand)
            }
            Err(_) => {
                warn!(
                    "Creative description for '{}' timed out after {:?}",
                    title, self.timeout
                );
                failed_call_description(title, brand)
            }
        }
    }
}

pub fn build_prompt(title: &str, brand: &str, price: f64) -> String {
    format!(
        "You are a creative furniture marketing expert. Write a compelling, concise product description (2-3 sentences max) for this furniture item. Focus on benefits, style, and emotional appeal. Be enthusiastic but professional.\n\
         \n\
         Product: {title}\n\
         Brand: {brand}\n\
         Price: ${price:.2}\n\
         \n\
         Creative Description:"
    )
}

/// Used when no generation model was ever available.
pub fn unavailable_description(title: &str, brand: &str) -> String {
    clamp_length(format!(
        "Discover the {} by {}, expertly crafted to enhance your living space with style and functionality.",
        title, brand
    ))
}

/// Used when the model is up but this particular call did not produce text.
pub fn failed_call_description(title: &str, brand: &str) -> String {
    clamp_length(format!(
        "Elevate your space with the {} from {}. Quality craftsmanship meets modern design at an exceptional value.",
        title, brand
    ))
}

fn finalize(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(clamp_length(trimmed.to_string()))
}

/// Cut to 297 characters plus an ellipsis when over the limit.
fn clamp_length(text: String) -> String {
    if text.chars().count() <= MAX_DESCRIPTION_CHARS {
        return text;
    }

    debug!("Truncating description of {} characters", text.chars().count());
    let keep = MAX_DESCRIPTION_CHARS - ELLIPSIS.len();
    let mut truncated: String = text.chars().take(keep).collect();
    truncated.push_str(ELLIPSIS);
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ApiError, Result};
    use async_trait::async_trait;

    struct FixedText(String);

    #[async_trait]
    impl TextGenerator for FixedText {
        async fn generate(&self, _prompt: &str) -> Result<String> {
            Ok(self.0.clone())
        }
    }

    struct Failing;

    #[async_trait]
    impl TextGenerator for Failing {
        async fn generate(&self, _prompt: &str) -> Result<String> {
            Err(ApiError::ExternalServiceError("quota exceeded".into()))
        }
    }

    struct Hanging;

    #[async_trait]
    impl TextGenerator for Hanging {
        async fn generate(&self, _prompt: &str) -> Result<String> {
            std::future::pending::<()>().await;
            Ok(String::new())
        }
    }

    fn with_model(model: impl TextGenerator + 'static) -> DescriptorGenerator {
        let model: Arc<dyn TextGenerator> = Arc::new(model);
        DescriptorGenerator::new(ServiceStatus::Ready(model), Duration::from_millis(200))
    }

    #[tokio::test]
    async fn test_unconfigured_uses_discover_template() {
        let description = DescriptorGenerator::template_only()
            .describe("Oak Chair", "Acme", 49.0)
            .await;
        assert_eq!(
            description,
            "Discover the Oak Chair by Acme, expertly crafted to enhance your living space with style and functionality."
        );
    }

    #[tokio::test]
    async fn test_failed_init_uses_discover_template() {
        let generator = DescriptorGenerator::new(
            ServiceStatus::Failed("bad key".into()),
            Duration::from_secs(1),
        );
        let description = generator.describe("Oak Chair", "Acme", 49.0).await;
        assert!(description.starts_with("Discover the Oak Chair by Acme"));
    }

    #[tokio::test]
    async fn test_call_failure_uses_elevate_template() {
        let description = with_model(Failing).describe("Oak Chair", "Acme", 49.0).await;
        assert_eq!(
            description,
            "Elevate your space with the Oak Chair from Acme. Quality craftsmanship meets modern design at an exceptional value."
        );
    }

    #[tokio::test]
    async fn test_timeout_uses_elevate_template() {
        let description = with_model(Hanging).describe("Oak Chair", "Acme", 49.0).await;
        assert!(description.starts_with("Elevate your space with the Oak Chair"));
    }

    #[tokio::test]
    async fn test_generated_text_is_trimmed() {
        let description = with_model(FixedText("  A chair to love.\n".into()))
            .describe("Oak Chair", "Acme", 49.0)
            .await;
        assert_eq!(description, "A chair to love.");
    }

    #[tokio::test]
    async fn test_blank_generation_falls_back() {
        let description = with_model(FixedText(" \n ".into()))
            .describe("Oak Chair", "Acme", 49.0)
            .await;
        assert!(description.starts_with("Elevate your space"));
    }

    #[tokio::test]
    async fn test_long_generation_is_truncated() {
        let long = "é".repeat(400);
        let description = with_model(FixedText(long)).describe("Oak Chair", "Acme", 49.0).await;

        assert_eq!(description.chars().count(), 300);
        assert!(description.ends_with("..."));
        assert_eq!(description.chars().filter(|c| *c == 'é').count(), 297);
    }

    #[tokio::test]
    async fn test_exactly_300_chars_is_kept() {
        let exact = "a".repeat(300);
        let description = with_model(FixedText(exact.clone()))
            .describe("Oak Chair", "Acme", 49.0)
            .await;
        assert_eq!(description, exact);
    }

    #[test]
    fn test_fallback_never_exceeds_limit() {
        let title = "Sectional ".repeat(50);
        let description = unavailable_description(&title, "Acme");
        assert_eq!(description.chars().count(), MAX_DESCRIPTION_CHARS);
    }

    #[test]
    fn test_prompt_formats_price_with_two_decimals() {
        let prompt = build_prompt("Oak Chair", "Acme", 49.5);
        assert!(prompt.contains("Product: Oak Chair\n"));
        assert!(prompt.contains("Brand: Acme\n"));
        assert!(prompt.contains("Price: $49.50\n"));
        assert!(prompt.ends_with("Creative Description:"));
    }
}
