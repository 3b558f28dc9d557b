//! OpenAI 兼容 API 客户端
//!
//! 通过 async_openai 调用任意 OpenAI 兼容端点（可配置 base_url）；
//! 每次调用的 model / temperature / max_tokens 来自 Agent 的 ModelParams。

use async_openai::config::OpenAIConfig;
use async_openai::types::chat::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use async_trait::async_trait;

use crate::llm::{Message, Role, TextGenerator};
use crate::model::ModelParams;

/// OpenAI 兼容客户端：持有 Client 与默认模型名；Agent 未指定模型时回退到默认
pub struct OpenAiGenerator {
    client: Client<OpenAIConfig>,
    default_model: String,
}

impl OpenAiGenerator {
    pub fn new(base_url: Option<&str>, default_model: &str, api_key: Option<&str>) -> Self {
        let api_key = api_key
            .map(String::from)
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .unwrap_or_else(|| "sk-placeholder".to_string());

        let config = if let Some(url) = base_url {
            OpenAIConfig::new().with_api_base(url).with_api_key(api_key)
        } else {
            OpenAIConfig::new().with_api_key(api_key)
        };

        Self {
            client: Client::with_config(config),
            default_model: default_model.to_string(),
        }
    }

    fn to_openai_messages(
        &self,
        system: &str,
        history: &[Message],
    ) -> Result<Vec<ChatCompletionRequestMessage>, String> {
        let mut out = Vec::with_capacity(history.len() + 1);
        if !system.is_empty() {
            out.push(ChatCompletionRequestMessage::System(
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(system.to_string())
                    .build()
                    .map_err(|e| e.to_string())?,
            ));
        }
        for m in history {
            let msg = match m.role {
                Role::System => ChatCompletionRequestMessage::System(
                    ChatCompletionRequestSystemMessageArgs::default()
                        .content(m.content.clone())
                        .build()
                        .map_err(|e| e.to_string())?,
                ),
                Role::User => ChatCompletionRequestMessage::User(
                    ChatCompletionRequestUserMessageArgs::default()
                        .content(m.content.clone())
                        .build()
                        .map_err(|e| e.to_string())?,
                ),
                Role::Assistant => ChatCompletionRequestMessage::Assistant(
                    ChatCompletionRequestAssistantMessageArgs::default()
                        .content(m.content.clone())
                        .build()
                        .map_err(|e| e.to_string())?,
                ),
            };
            out.push(msg);
        }
        Ok(out)
    }
}

#[async_trait]
impl TextGenerator for OpenAiGenerator {
    async fn generate(
        &self,
        system: &str,
        history: &[Message],
        params: &ModelParams,
    ) -> Result<String, String> {
        let model = if params.model.is_empty() {
            self.default_model.as_str()
        } else {
            params.model.as_str()
        };

        let request = CreateChatCompletionRequestArgs::default()
            .model(model)
            .temperature(params.temperature)
            .max_completion_tokens(params.max_output_tokens)
            .messages(self.to_openai_messages(system, history)?)
            .build()
            .map_err(|e| format!("Request build failed: {}", e))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| format!("Chat completion failed: {}", e))?;

        let content = response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default();

        tracing::debug!(model = %model, chars = content.len(), "llm completion");
        Ok(content)
    }
}
