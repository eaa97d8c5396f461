//! Prompt assembly — policy + history + new question.
//!
//! The policy template carries the persona, topical scope, the referral
//! script for personalized or medical requests, Markdown rules and the
//! closing disclaimer. `{context}` and `{question}` are substituted per turn;
//! `{disclaimer}` is substituted once at construction.

use anmi_core::message::Message;
use std::path::Path;

pub const CONTEXT_PLACEHOLDER: &str = "{context}";
pub const QUESTION_PLACEHOLDER: &str = "{question}";
pub const DISCLAIMER_PLACEHOLDER: &str = "{disclaimer}";

/// Default behavioral policy.
pub const DEFAULT_POLICY_TEMPLATE: &str = r#"Eres 'ANMI: Asistente Nutricional Materno Infantil'.

TUS REGLAS DE COMPORTAMIENTO:
1.  **SÉ PRÁCTICO:** Los usuarios buscan ayuda real. Si preguntan cómo cocinar algo, dales la receta paso a paso de forma clara.
2.  **SALUDOS:** Si el usuario solo saluda, responde corto, amable y sin disclaimer.
3.  **TONO:** Empático, motivador y educativo.

TU BASE DE CONOCIMIENTO:
- Responde basándote *exclusivamente* en el "CONTEXTO" adjunto.
- Si el CONTEXTO tiene recetas o menús, **ÚSALOS Y COMPÁRTELOS**.
- Si la respuesta no está en el CONTEXTO, di: "Lo siento, no tengo esa receta o información específica en mis guías oficiales."

ALCANCE Y LÍMITES:
✅ **PERMITIDO:** Recetas completas, menús de ejemplo y cantidades referenciales (ej: "2 cucharadas") que aparezcan en los documentos.
❌ **PROHIBIDO:** Dietas personalizadas para casos médicos (ej: "Mi bebé pesa 6kg, ¿cuánto le doy?"). En esos casos, deriva al pediatra.

FORMATO DE RESPUESTA (USAR MARKDOWN):
- Usa **Negritas** para resaltar ingredientes clave o conceptos importantes.
- Usa listas con viñetas (-) para listas de ingredientes o alimentos.
- Usa listas numeradas (1., 2.) para pasos de preparación o instrucciones secuenciales.
- SIEMPRE termina con esta frase en una línea nueva y en cursiva:
  {disclaimer}

Instrucción de Tarea:
Responde la "PREGUNTA DEL USUARIO" usando el "CONTEXTO".

---
CONTEXTO:
{context}
---
PREGUNTA DEL USUARIO:
{question}
"#;

#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    #[error("Policy template is missing the {0} placeholder")]
    MissingPlaceholder(&'static str),

    #[error("Failed to read policy template {path}: {reason}")]
    Read { path: String, reason: String },
}

#[derive(Debug, Clone)]
pub struct PromptAssembler {
    template: String,
}

impl PromptAssembler {
    /// Build from a template; both per-turn placeholders must be present.
    pub fn new(template: impl Into<String>, disclaimer: &str) -> Result<Self, PromptError> {
        let template = template.into();
        for placeholder in [CONTEXT_PLACEHOLDER, QUESTION_PLACEHOLDER] {
            if !template.contains(placeholder) {
                return Err(PromptError::MissingPlaceholder(placeholder));
            }
        }
        Ok(Self {
            template: template.replace(DISCLAIMER_PLACEHOLDER, disclaimer),
        })
    }

    pub fn from_file(path: &Path, disclaimer: &str) -> Result<Self, PromptError> {
        let template = std::fs::read_to_string(path).map_err(|e| PromptError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::new(template, disclaimer)
    }

    /// The policy message for one turn.
    ///
    /// Substitution is single-pass: placeholder-like text inside the context
    /// or question is left alone.
    pub fn render_policy(&self, context: &str, question: &str) -> String {
        self.template
            .split(CONTEXT_PLACEHOLDER)
            .map(|piece| piece.replace(QUESTION_PLACEHOLDER, question))
            .collect::<Vec<_>>()
            .join(context)
    }

    /// System policy first, then the prior history verbatim, then the new question.
    pub fn assemble(&self, context: &str, history: &[Message], question: &str) -> Vec<Message> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(Message::system(self.render_policy(context, question)));
        messages.extend(history.iter().cloned());
        messages.push(Message::user(question));
        messages
    }
}

impl Default for PromptAssembler {
    fn default() -> Self {
        Self {
            template: DEFAULT_POLICY_TEMPLATE
                .replace(DISCLAIMER_PLACEHOLDER, anmi_config::DEFAULT_DISCLAIMER),
        }
    }
}
