use rand::Rng;

use crate::decision::FallbackCategory;

/// Chooses one template index out of `len` candidates. `len` is always non-zero.
pub trait TemplateSelector: Send + Sync {
    fn pick(&self, len: usize) -> usize;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct RandomSelector;

impl TemplateSelector for RandomSelector {
    fn pick(&self, len: usize) -> usize {
        rand::thread_rng().gen_range(0..len)
    }
}

/// Always picks the same position, wrapped to the number of templates.
#[derive(Clone, Copy, Debug, Default)]
pub struct FixedSelector(pub usize);

impl TemplateSelector for FixedSelector {
    fn pick(&self, len: usize) -> usize {
        self.0 % len
    }
}

// `{greeting}` is the time-of-day salutation and `{name}` is either empty or a
// space followed by the sender's name.
const GREETING: &[&str] = &[
    "¡{greeting}{name}! 👋 Es un gusto saludarte. Para participar en el sorteo del viaje a San Andrés, por favor completa el siguiente formulario:",
    "¡Hola{name}! 🌊✈️ Qué alegría que quieras participar. Para inscribirte oficialmente, ingresa tus datos aquí:",
    "¡{greeting}{name}! No te quedes por fuera del sorteo. Regístrate en este enlace:",
];

const RESEND: &[&str] = &[
    "¡Con mucho gusto{name}! Aquí tienes nuevamente el enlace de inscripción 👇:",
    "Claro que sí. Te comparto el enlace de nuevo para que puedas registrarte sin problemas 📝:",
    "Por supuesto, aquí te envío el enlace para que puedas participar:",
];

const ALREADY_SENT: &[&str] = &[
    "¡Hola{name}! 👋 Te compartí el enlace en el mensaje anterior 👆. ¿Pudiste verlo?",
    "El link de inscripción se encuentra un poco más arriba en este chat 👆.",
    "Ya te había enviado el enlace anteriormente. Revísalo arriba 👆 y, si no te funciona, avísame.",
];

const FAREWELL: &[&str] = &[
    "¡Con mucho gusto{name}! Estamos para servirle. ¡Mucha suerte en el sorteo! 🎉",
    "Ha sido un placer atenderte. Quedamos atentos. ¡{greeting}! 👋",
    "¡Gracias a ti por participar! Esperamos que seas el ganador/a. ¡Bendiciones! ✨",
];

pub fn templates(category: FallbackCategory) -> &'static [&'static str] {
    match category {
        FallbackCategory::Greeting => GREETING,
        FallbackCategory::Resend => RESEND,
        FallbackCategory::AlreadySent => ALREADY_SENT,
        FallbackCategory::Farewell => FAREWELL,
    }
}

pub struct FallbackLibrary {
    link_url: String,
    selector: Box<dyn TemplateSelector>,
}

impl FallbackLibrary {
    pub fn new(link_url: impl Into<String>, selector: Box<dyn TemplateSelector>) -> Self {
        Self { link_url: link_url.into(), selector }
    }

    pub fn with_random_selection(link_url: impl Into<String>) -> Self {
        Self::new(link_url, Box::new(RandomSelector))
    }

    /// Renders one template of `category`. Link-bearing categories end with the URL on
    /// its own line.
    pub fn render(&self, category: FallbackCategory, name: Option<&str>, salutation: &str) -> String {
        let candidates = templates(category);
        let template = candidates[self.selector.pick(candidates.len()) % candidates.len()];
        let name = name.map(|name| format!(" {name}")).unwrap_or_default();
        let text = template.replace("{greeting}", salutation).replace("{name}", &name);

        if category.includes_link() {
            format!("{text}\n{}", self.link_url)
        } else {
            text
        }
    }
}
