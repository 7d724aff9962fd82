use std::sync::Arc;

use tracing::{error, info, warn};

use outreach_core::config::{AppConfig, CampaignConfig};
use outreach_core::domain::conversation::{ConversationId, Turn, UserProfile};
use outreach_core::{text, Clock, SystemClock};
use outreach_db::{ConversationStore, RepositoryError};

use crate::decision::{DecisionRecord, HistoryFlags};
use crate::engine::{GenerationEngine, RetryPolicy};
use crate::enrichment::extract_profile;
use crate::fallback::{FallbackLibrary, RandomSelector, TemplateSelector};
use crate::guardrails::ResponsePolicy;
use crate::intent::IntentClassifier;
use crate::llm::GenerationProvider;
use crate::prompt::build_instruction;

/// Everything read from the store that a reply depends on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageContext {
    pub profile: UserProfile,
    pub history: Vec<Turn>,
    pub decision: DecisionRecord,
}

pub struct AgentRuntime {
    campaign: CampaignConfig,
    store: Arc<dyn ConversationStore>,
    engine: GenerationEngine,
    classifier: IntentClassifier,
    fallbacks: FallbackLibrary,
    policy: ResponsePolicy,
}

impl AgentRuntime {
    pub fn new(
        campaign: CampaignConfig,
        store: Arc<dyn ConversationStore>,
        engine: GenerationEngine,
        clock: Arc<dyn Clock>,
        selector: Box<dyn TemplateSelector>,
    ) -> Self {
        let policy = ResponsePolicy::new(&campaign, clock);
        let fallbacks = FallbackLibrary::new(campaign.link_url.trim(), selector);
        Self { campaign, store, engine, classifier: IntentClassifier::default(), fallbacks, policy }
    }

    pub fn from_config(
        config: &AppConfig,
        store: Arc<dyn ConversationStore>,
        provider: Arc<dyn GenerationProvider>,
    ) -> Self {
        let engine = GenerationEngine::new(provider, RetryPolicy::from_config(&config.llm));
        Self::new(
            config.campaign.clone(),
            store,
            engine,
            Arc::new(SystemClock),
            Box::new(RandomSelector),
        )
    }

    pub async fn handle_message(&self, identity: &ConversationId, message: &str) -> String {
        let correlation_id = uuid::Uuid::new_v4().to_string();
        self.handle_message_with_correlation(identity, message, &correlation_id).await
    }

    /// Never fails: any internal error resolves to a policy-compliant fallback reply.
    pub async fn handle_message_with_correlation(
        &self,
        identity: &ConversationId,
        message: &str,
        correlation_id: &str,
    ) -> String {
        let conversation = identity.redacted();
        info!(event_name = "agent.message.received", correlation_id, conversation = %conversation, "message received");

        if text::is_blank(message) {
            return self.reply_to_blank(identity, correlation_id).await;
        }

        match self.respond(identity, message, correlation_id).await {
            Ok(reply) => reply,
            Err(source) => {
                error!(
                    event_name = "agent.message.failed",
                    correlation_id,
                    conversation = %conversation,
                    error = %source,
                    "store failure before reply, using greeting fallback"
                );
                self.fallback_reply(&DecisionRecord::first_contact(), None)
            }
        }
    }

    /// Reads profile and history flags, classifies `message` and resolves the decision.
    pub async fn load_context(
        &self,
        identity: &ConversationId,
        message: &str,
    ) -> Result<MessageContext, RepositoryError> {
        let profile = self.store.get_profile(identity).await?;
        let flags = HistoryFlags {
            has_any_history: self.store.has_any_history(identity).await?,
            link_sent_before: self
                .store
                .has_link_been_sent(identity, self.campaign.link_domain())
                .await?,
        };
        let history = self.store.get_recent_history(identity, self.campaign.history_limit).await?;
        let intent = self.classifier.classify(&text::normalize(message));

        Ok(MessageContext { profile, history, decision: DecisionRecord::resolve(intent, flags) })
    }

    async fn respond(
        &self,
        identity: &ConversationId,
        message: &str,
        correlation_id: &str,
    ) -> Result<String, RepositoryError> {
        self.store.ensure_user(identity).await?;
        if self.campaign.profile_enrichment {
            self.enrich_profile(identity, message, correlation_id).await;
        }

        let context = self.load_context(identity, message).await?;
        let decision = context.decision;
        let name = context.profile.display_name();
        let instruction = build_instruction(&self.campaign, &context.profile, &decision);

        let reply = match self.engine.generate(&instruction, &context.history, message).await {
            Ok(generation) => self.policy.enforce(&generation.text, &decision, name),
            Err(source) => {
                error!(
                    event_name = "agent.generation.exhausted",
                    correlation_id,
                    category = decision.fallback_category().as_str(),
                    error = %source,
                    "generation failed, using fallback template"
                );
                self.fallback_reply(&decision, name)
            }
        };

        if let Err(source) = self.store.save_interaction(identity, message, &reply).await {
            warn!(
                event_name = "agent.persistence.failed",
                correlation_id,
                conversation = %identity.redacted(),
                error = %source,
                "interaction was not saved"
            );
        }

        info!(
            event_name = "agent.message.replied",
            correlation_id,
            should_send_link = decision.should_send_link,
            should_block_link = decision.should_block_link,
            "reply ready"
        );
        Ok(reply)
    }

    async fn reply_to_blank(&self, identity: &ConversationId, correlation_id: &str) -> String {
        let has_any_history = match self.store.has_any_history(identity).await {
            Ok(found) => found,
            Err(source) => {
                warn!(event_name = "agent.history.failed", correlation_id, error = %source, "history lookup failed");
                false
            }
        };
        let decision = DecisionRecord::resolve(
            Default::default(),
            HistoryFlags { has_any_history, link_sent_before: false },
        );
        self.fallback_reply(&decision, None)
    }

    fn fallback_reply(&self, decision: &DecisionRecord, name: Option<&str>) -> String {
        let template =
            self.fallbacks.render(decision.fallback_category(), name, self.policy.salutation());
        self.policy.enforce(&template, decision, name)
    }

    async fn enrich_profile(&self, identity: &ConversationId, message: &str, correlation_id: &str) {
        let update = match extract_profile(&self.engine, message).await {
            Ok(update) if !update.is_empty() => update,
            Ok(_) => return,
            Err(source) => {
                warn!(event_name = "agent.enrichment.failed", correlation_id, error = %source, "profile extraction skipped");
                return;
            }
        };

        if let Err(source) = self.store.update_profile(identity, &update).await {
            warn!(event_name = "agent.enrichment.failed", correlation_id, error = %source, "profile update failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};
    use outreach_core::config::CampaignConfig;
    use outreach_core::domain::conversation::{ConversationId, ProfileUpdate, Turn, UserProfile};
    use outreach_core::FixedClock;
    use outreach_db::{ConversationStore, InMemoryConversationStore, RepositoryError};

    use super::AgentRuntime;
    use crate::engine::tests::{policy, ScriptedProvider, Step};
    use crate::engine::GenerationEngine;
    use crate::fallback::FixedSelector;
    use crate::guardrails::opens_with_greeting;

    const URL: &str = "https://campana.example/formulario/viaje";
    const MARKER: &str = "campana.example/formulario/viaje";

    fn campaign(profile_enrichment: bool) -> CampaignConfig {
        CampaignConfig { link_url: URL.to_string(), profile_enrichment, ..CampaignConfig::default() }
    }

    fn runtime(
        store: Arc<dyn ConversationStore>,
        steps: Vec<Step>,
        profile_enrichment: bool,
    ) -> (AgentRuntime, Arc<ScriptedProvider>) {
        let provider = Arc::new(ScriptedProvider::new(steps));
        let engine = GenerationEngine::new(provider.clone(), policy(0));
        // 14:15 UTC is morning in UTC-5.
        let instant = Utc.with_ymd_and_hms(2026, 3, 10, 14, 15, 0).single().expect("valid instant");
        let runtime = AgentRuntime::new(
            campaign(profile_enrichment),
            store,
            engine,
            Arc::new(FixedClock(instant)),
            Box::new(FixedSelector(0)),
        );
        (runtime, provider)
    }

    fn sender() -> ConversationId {
        ConversationId("573001112233".to_string())
    }

    async fn store_with_link_sent() -> Arc<InMemoryConversationStore> {
        let store = Arc::new(InMemoryConversationStore::default());
        store.ensure_user(&sender()).await.expect("ensure");
        store
            .save_interaction(&sender(), "hola", &format!("¡Buenos días! Inscríbete aquí:\n{URL}"))
            .await
            .expect("seed");
        store
    }

    fn links(reply: &str) -> usize {
        reply.matches(MARKER).count()
    }

    #[tokio::test]
    async fn first_contact_gets_greeting_and_exactly_one_link() {
        let store = Arc::new(InMemoryConversationStore::default());
        let (runtime, _) =
            runtime(store.clone(), vec![Step::Reply("Con gusto te cuento del sorteo.")], false);

        let context = runtime.load_context(&sender(), "hola").await.expect("context");
        assert!(context.decision.is_first_interaction);
        assert!(context.decision.should_send_link);

        let reply = runtime.handle_message(&sender(), "hola").await;
        assert!(reply.starts_with("¡Buenos días! 👋\n\nCon gusto te cuento del sorteo."));
        assert_eq!(links(&reply), 1);

        let history = store.get_recent_history(&sender(), 10).await.expect("history");
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].text, reply);
    }

    #[tokio::test]
    async fn registered_sender_gets_no_link() {
        let store = store_with_link_sent().await;
        let (runtime, _) = runtime(
            store.clone(),
            vec![Step::Reply("¡Hola! Felicitaciones por inscribirte, mucha suerte. https://campana.example/formulario/viaje")],
            false,
        );

        let context = runtime.load_context(&sender(), "ya me registré").await.expect("context");
        assert!(context.decision.is_registered);
        assert!(context.decision.link_sent_before);
        assert!(context.decision.should_block_link);

        let reply = runtime.handle_message(&sender(), "ya me registré").await;
        assert_eq!(reply, "¡Hola! Felicitaciones por inscribirte, mucha suerte.");
        assert_eq!(links(&reply), 0);
    }

    #[tokio::test]
    async fn bare_no_repeats_the_link() {
        let store = store_with_link_sent().await;
        let (runtime, _) = runtime(store, vec![Step::Reply("Claro que sí, aquí lo tienes.")], false);

        let context = runtime.load_context(&sender(), "no").await.expect("context");
        assert!(context.decision.wants_link);
        assert!(context.decision.should_send_link);

        let reply = runtime.handle_message(&sender(), "no").await;
        assert!(opens_with_greeting(&reply));
        assert!(reply.ends_with(&format!("Aquí le adjunto el enlace de inscripción 👇:\n{URL}")));
        assert_eq!(links(&reply), 1);
    }

    #[tokio::test]
    async fn exclusive_farewell_strips_the_link() {
        let store = store_with_link_sent().await;
        let (runtime, _) = runtime(
            store,
            vec![Step::Reply("Es un placer atenderle, feliz día. Recuerda campana.example/formulario/viaje")],
            false,
        );

        let context = runtime.load_context(&sender(), "gracias, feliz día").await.expect("context");
        assert!(context.decision.is_farewell_exclusive);
        assert!(!context.decision.should_send_link);

        let reply = runtime.handle_message(&sender(), "gracias, feliz día").await;
        assert!(opens_with_greeting(&reply));
        assert_eq!(links(&reply), 0);
        assert!(reply.contains("Es un placer atenderle, feliz día. Recuerda"));
    }

    #[tokio::test]
    async fn exhausted_generation_uses_enforced_fallback_template() {
        let store = store_with_link_sent().await;
        let (runtime, provider) =
            runtime(store.clone(), vec![Step::Fail(Some(500)), Step::Reply("")], false);

        let reply = runtime.handle_message(&sender(), "hola").await;
        assert_eq!(reply, "¡Hola! 👋 Te compartí el enlace en el mensaje anterior 👆. ¿Pudiste verlo?");
        assert_eq!(provider.calls(), vec!["primary", "secondary"]);

        let history = store.get_recent_history(&sender(), 10).await.expect("history");
        assert_eq!(history.last().map(|turn| turn.text.as_str()), Some(reply.as_str()));
    }

    #[tokio::test]
    async fn exhausted_generation_for_new_sender_sends_greeting_with_link() {
        let store = Arc::new(InMemoryConversationStore::default());
        let (runtime, _) =
            runtime(store, vec![Step::Fail(Some(404)), Step::Fail(Some(429))], false);

        let reply = runtime.handle_message(&sender(), "buenas").await;
        assert!(reply.starts_with("¡Buenos días! 👋 Es un gusto saludarte."));
        assert!(reply.ends_with(URL));
        assert_eq!(links(&reply), 1);
    }

    #[tokio::test]
    async fn blank_message_skips_generation_and_persistence() {
        let store = store_with_link_sent().await;
        let (runtime, provider) = runtime(store.clone(), Vec::new(), false);

        let reply = runtime.handle_message(&sender(), "   \n").await;
        assert!(reply.starts_with("¡Hola! 👋 Te compartí el enlace"));
        assert_eq!(links(&reply), 0);
        assert!(provider.calls().is_empty());
        assert_eq!(store.get_recent_history(&sender(), 10).await.expect("history").len(), 2);

        let fresh = ConversationId("573000000001".to_string());
        let reply = runtime.handle_message(&fresh, "").await;
        assert!(reply.starts_with("¡Buenos días! 👋 Es un gusto saludarte."));
        assert_eq!(links(&reply), 1);
        assert!(!store.has_any_history(&fresh).await.expect("history flag"));
    }

    #[tokio::test]
    async fn enrichment_updates_profile_and_personalizes_greeting() {
        let store = Arc::new(InMemoryConversationStore::default());
        let (runtime, provider) = runtime(
            store.clone(),
            vec![
                Step::Reply("```json\n{\"name\": \"Ana\", \"municipality\": \"Girón\"}\n```"),
                Step::Reply("Qué alegría saludarte."),
            ],
            true,
        );

        let reply = runtime.handle_message(&sender(), "Soy Ana de Girón").await;
        assert!(reply.starts_with("¡Buenos días, Ana! 👋\n\nQué alegría saludarte."));
        assert_eq!(provider.calls(), vec!["primary", "primary"]);

        let profile = store.get_profile(&sender()).await.expect("profile");
        assert_eq!(profile.municipality.as_deref(), Some("Girón"));
    }

    #[tokio::test]
    async fn failed_enrichment_does_not_block_the_reply() {
        let store = Arc::new(InMemoryConversationStore::default());
        let (runtime, _) = runtime(
            store.clone(),
            vec![Step::Reply("no es json"), Step::Reply("Hola, bienvenido.")],
            true,
        );

        let reply = runtime.handle_message(&sender(), "hola").await;
        assert!(reply.starts_with("Hola, bienvenido."));
        assert_eq!(links(&reply), 1);
        assert_eq!(store.get_profile(&sender()).await.expect("profile"), UserProfile::default());
    }

    struct UnavailableStore;

    #[async_trait::async_trait]
    impl ConversationStore for UnavailableStore {
        async fn ensure_user(&self, _id: &ConversationId) -> Result<(), RepositoryError> {
            Err(RepositoryError::Decode("store offline".to_string()))
        }

        async fn get_profile(&self, _id: &ConversationId) -> Result<UserProfile, RepositoryError> {
            Err(RepositoryError::Decode("store offline".to_string()))
        }

        async fn update_profile(
            &self,
            _id: &ConversationId,
            _update: &ProfileUpdate,
        ) -> Result<(), RepositoryError> {
            Err(RepositoryError::Decode("store offline".to_string()))
        }

        async fn has_any_history(&self, _id: &ConversationId) -> Result<bool, RepositoryError> {
            Err(RepositoryError::Decode("store offline".to_string()))
        }

        async fn has_link_been_sent(
            &self,
            _id: &ConversationId,
            _link_domain: &str,
        ) -> Result<bool, RepositoryError> {
            Err(RepositoryError::Decode("store offline".to_string()))
        }

        async fn get_recent_history(
            &self,
            _id: &ConversationId,
            _limit: u32,
        ) -> Result<Vec<Turn>, RepositoryError> {
            Err(RepositoryError::Decode("store offline".to_string()))
        }

        async fn save_interaction(
            &self,
            _id: &ConversationId,
            _user_text: &str,
            _assistant_text: &str,
        ) -> Result<(), RepositoryError> {
            Err(RepositoryError::Decode("store offline".to_string()))
        }
    }

    #[tokio::test]
    async fn store_outage_resolves_to_greeting_fallback() {
        let (runtime, provider) =
            runtime(Arc::new(UnavailableStore), vec![Step::Reply("nunca usado")], false);

        let reply = runtime.handle_message(&sender(), "hola").await;
        assert!(reply.starts_with("¡Buenos días! 👋 Es un gusto saludarte."));
        assert_eq!(links(&reply), 1);
        assert!(provider.calls().is_empty());

        let reply = runtime.handle_message(&sender(), "").await;
        assert!(opens_with_greeting(&reply));
        assert_eq!(links(&reply), 1);
    }

    /// Persists nothing but otherwise answers like an empty store.
    struct ReadOnlyStore(InMemoryConversationStore);

    #[async_trait::async_trait]
    impl ConversationStore for ReadOnlyStore {
        async fn ensure_user(&self, id: &ConversationId) -> Result<(), RepositoryError> {
            self.0.ensure_user(id).await
        }

        async fn get_profile(&self, id: &ConversationId) -> Result<UserProfile, RepositoryError> {
            self.0.get_profile(id).await
        }

        async fn update_profile(
            &self,
            id: &ConversationId,
            update: &ProfileUpdate,
        ) -> Result<(), RepositoryError> {
            self.0.update_profile(id, update).await
        }

        async fn has_any_history(&self, id: &ConversationId) -> Result<bool, RepositoryError> {
            self.0.has_any_history(id).await
        }

        async fn has_link_been_sent(
            &self,
            id: &ConversationId,
            link_domain: &str,
        ) -> Result<bool, RepositoryError> {
            self.0.has_link_been_sent(id, link_domain).await
        }

        async fn get_recent_history(
            &self,
            id: &ConversationId,
            limit: u32,
        ) -> Result<Vec<Turn>, RepositoryError> {
            self.0.get_recent_history(id, limit).await
        }

        async fn save_interaction(
            &self,
            _id: &ConversationId,
            _user_text: &str,
            _assistant_text: &str,
        ) -> Result<(), RepositoryError> {
            Err(RepositoryError::Decode("disk full".to_string()))
        }
    }

    #[tokio::test]
    async fn failed_save_still_returns_generated_reply() {
        let store = Arc::new(ReadOnlyStore(InMemoryConversationStore::default()));
        let (runtime, _) = runtime(store, vec![Step::Reply("Hola, bienvenido.")], false);

        let reply = runtime.handle_message(&sender(), "hola").await;
        assert!(reply.starts_with("Hola, bienvenido."));
        assert_eq!(links(&reply), 1);
    }
}
