use crate::llm_client::{ChatMessage, LLMClient};
use crate::module::ModuleId;
use crate::settings::Settings;
use tracing::warn;

/// Produces the message shown when a module is entered.
///
/// A disabled module answers with its fixed disabled greeting and no model
/// call. Otherwise the module's greeting prompt is completed, falling back to
/// the fixed greeting when the completion fails or comes back empty.
pub async fn generate_greeting(llm: &dyn LLMClient, module: ModuleId, settings: &Settings) -> String {
    let spec = module.spec();
    if spec.gated && !settings.is_module_enabled(module) {
        return spec.disabled_greeting.to_string();
    }

    match llm.complete(vec![ChatMessage::system(spec.greeting_prompt)]).await {
        Ok(greeting) if !greeting.trim().is_empty() => greeting.trim().to_string(),
        Ok(_) => spec.greeting_fallback.to_string(),
        Err(e) => {
            warn!(%module, error = ?e, "Greeting completion failed, using fallback");
            spec.greeting_fallback.to_string()
        }
    }
}
