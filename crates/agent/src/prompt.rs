use outreach_core::config::CampaignConfig;
use outreach_core::UserProfile;

use crate::decision::DecisionRecord;

fn flag(value: bool) -> &'static str {
    if value {
        "SÍ"
    } else {
        "NO"
    }
}

/// One line naming who the bot is talking to.
pub fn user_context(profile: &UserProfile) -> String {
    let name = profile.display_name().unwrap_or("Ciudadano");
    match profile.municipality.as_deref().map(str::trim).filter(|value| !value.is_empty()) {
        Some(municipality) => format!("Hablas con **{name}** del municipio de {municipality}."),
        None => format!("Hablas con **{name}**."),
    }
}

/// System instruction handed to the generation provider for one message.
pub fn build_instruction(
    campaign: &CampaignConfig,
    profile: &UserProfile,
    decision: &DecisionRecord,
) -> String {
    let link_rule = if decision.should_send_link {
        "En esta respuesta DEBES incluir el enlace de inscripción."
    } else {
        "En esta respuesta NO incluyas el enlace de inscripción."
    };

    format!(
        "ROL: Eres {bot}, asistente oficial de la campaña de {candidate}.\n\
         \n\
         USUARIO: {user}\n\
         \n\
         BIO CONTEXTO: {bio}\n\
         \n\
         TONO DE VOZ:\n\
         - Cordial, paciente y servicial (usa \"Con gusto\", \"Claro que sí\").\n\
         - Formal pero cercano, con emojis moderados (👋, ✅, 📩).\n\
         - Si el usuario agradece, despídete con amabilidad.\n\
         \n\
         OBJETIVO PRINCIPAL:\n\
         Facilitar la inscripción en: {url}\n\
         \n\
         ESTADO DEL USUARIO:\n\
         - ¿Es su primer mensaje?: {first}\n\
         - ¿Ya tiene el link?: {sent}\n\
         - ¿Está pidiendo el link?: {wants}\n\
         - ¿Ya se registró?: {registered}\n\
         \n\
         INSTRUCCIONES LÓGICAS (PRIORIDAD ALTA):\n\
         1. Si pide el link, dice \"quiero inscribirme\" o dice \"no lo veo\": entrégalo siempre.\n\
         2. Si saluda y ya tiene el link (y no lo pide): recuérdale que está en el mensaje anterior 👆.\n\
         3. Si dice \"ya me registré\": felicítalo, agradece el apoyo y desea suerte.\n\
         4. Si agradece o se despide: responde con amabilidad y desea un feliz día.\n\
         \n\
         {link_rule}",
        bot = campaign.bot_name,
        candidate = campaign.candidate_name,
        user = user_context(profile),
        bio = campaign.bio_snippet,
        url = campaign.link_url,
        first = flag(decision.is_first_interaction),
        sent = flag(decision.link_sent_before),
        wants = flag(decision.wants_link),
        registered = flag(decision.is_registered),
    )
}

/// Extraction prompt for the profile enricher.
pub fn build_extraction_prompt(message: &str) -> String {
    format!(
        "Analiza el siguiente mensaje del usuario y extrae, si existen, los siguientes datos:\n\
         - Nombre de la persona\n\
         - Municipio o ciudad\n\
         \n\
         Mensaje: \"{message}\"\n\
         \n\
         Responde ÚNICAMENTE con este formato JSON:\n\
         {{ \"name\": \"Nombre o null\", \"municipality\": \"Municipio o null\" }}"
    )
}

#[cfg(test)]
mod tests {
    use outreach_core::config::CampaignConfig;
    use outreach_core::UserProfile;

    use super::{build_extraction_prompt, build_instruction, user_context};
    use crate::decision::{DecisionRecord, HistoryFlags};
    use crate::intent::IntentSignals;

    #[test]
    fn user_context_defaults_to_generic_citizen() {
        assert_eq!(user_context(&UserProfile::default()), "Hablas con **Ciudadano**.");

        let profile =
            UserProfile { name: Some("Ana".to_string()), municipality: Some("Girón".to_string()) };
        assert_eq!(user_context(&profile), "Hablas con **Ana** del municipio de Girón.");
    }

    #[test]
    fn instruction_carries_campaign_and_decision_flags() {
        let campaign = CampaignConfig::default();
        let decision = DecisionRecord::resolve(
            IntentSignals { wants_link: true, ..Default::default() },
            HistoryFlags { has_any_history: true, link_sent_before: true },
        );

        let instruction = build_instruction(&campaign, &UserProfile::default(), &decision);
        assert!(instruction.starts_with("ROL: Eres Cami, asistente oficial de la campaña de Óscar Hernández."));
        assert!(instruction.contains(&campaign.link_url));
        assert!(instruction.contains(&campaign.bio_snippet));
        assert!(instruction.contains("- ¿Es su primer mensaje?: NO"));
        assert!(instruction.contains("- ¿Ya tiene el link?: SÍ"));
        assert!(instruction.contains("- ¿Está pidiendo el link?: SÍ"));
        assert!(instruction.contains("- ¿Ya se registró?: NO"));
        assert!(instruction.ends_with("DEBES incluir el enlace de inscripción."));
    }

    #[test]
    fn extraction_prompt_embeds_message_and_json_shape() {
        let prompt = build_extraction_prompt("Soy Luis de Floridablanca");
        assert!(prompt.contains("Mensaje: \"Soy Luis de Floridablanca\""));
        assert!(prompt.ends_with("{ \"name\": \"Nombre o null\", \"municipality\": \"Municipio o null\" }"));
    }
}
