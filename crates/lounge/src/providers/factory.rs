use super::{
    anthropic::AnthropicProvider, base::BoxedProvider, configs::ProviderConfig,
    openai::OpenAiProvider,
};
use crate::errors::ProviderResult;

pub fn get_provider(config: ProviderConfig) -> ProviderResult<BoxedProvider> {
    match config {
        ProviderConfig::OpenAi(openai_config) => Ok(Box::new(OpenAiProvider::new(openai_config)?)),
        ProviderConfig::Anthropic(anthropic_config) => {
            Ok(Box::new(AnthropicProvider::new(anthropic_config)?))
        }
    }
}
