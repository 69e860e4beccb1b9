//! Self-referential keyword detection and per-language strings.
//!
//! A user message like "summarize my notes on X" should surface the user's
//! own material; the keyword table is the trigger for pre-seeding a lookup.

/// Keyword tables per language code. Matching is lowercase substring.
const SELF_REFERENTIAL: &[(&str, &[&str])] = &[
    (
        "en",
        &[
            "my notes", "my note", "my vault", "my files", "my folders",
            "my data", "i wrote", "i noted", "have i written",
        ],
    ),
    (
        "es",
        &["mis notas", "mi nota", "mis archivos", "mis carpetas", "mis datos", "he escrito"],
    ),
    (
        "fr",
        &["mes notes", "ma note", "mes fichiers", "mes dossiers", "mes données", "j'ai écrit"],
    ),
    (
        "de",
        &["meine notizen", "meine notiz", "meine dateien", "meine ordner", "meine daten", "ich habe geschrieben"],
    ),
    (
        "it",
        &["le mie note", "la mia nota", "i miei file", "le mie cartelle", "i miei dati", "ho scritto"],
    ),
    (
        "pt",
        &["minhas notas", "minha nota", "meus arquivos", "minhas pastas", "meus dados", "eu escrevi"],
    ),
];

const LANGUAGE_LABELS: &[(&str, &str)] = &[
    ("en", "English"),
    ("es", "Español"),
    ("fr", "Français"),
    ("de", "Deutsch"),
    ("it", "Italiano"),
    ("pt", "Português"),
];

const INITIAL_MESSAGES: &[(&str, &str)] = &[
    ("en", "Hi, how can I help you with your notes today?"),
    ("es", "Hola, ¿cómo puedo ayudarte con tus notas hoy?"),
    ("fr", "Bonjour, comment puis-je vous aider avec vos notes aujourd'hui ?"),
    ("de", "Hallo, wie kann ich dir heute mit deinen Notizen helfen?"),
    ("it", "Ciao, come posso aiutarti con le tue note oggi?"),
    ("pt", "Olá, como posso ajudar com as suas notas hoje?"),
];

/// Whether `text` contains a self-referential keyword for `lang`.
/// Unknown languages fall back to the English table.
pub fn contains_self_referential_keywords(text: &str, lang: &str) -> bool {
    let keywords = SELF_REFERENTIAL
        .iter()
        .find(|(code, _)| *code == lang)
        .or_else(|| SELF_REFERENTIAL.iter().find(|(code, _)| *code == "en"))
        .map(|(_, words)| *words)
        .unwrap_or_default();
    let lowered = text.to_lowercase();
    keywords.iter().any(|kw| lowered.contains(kw))
}

/// `(code, label)` pairs for a language dropdown.
pub fn language_options() -> Vec<(&'static str, &'static str)> {
    LANGUAGE_LABELS.to_vec()
}

/// Greeting shown when a thread opens, in the thread language.
pub fn initial_message(lang: &str) -> &'static str {
    INITIAL_MESSAGES
        .iter()
        .find(|(code, _)| *code == lang)
        .or_else(|| INITIAL_MESSAGES.iter().find(|(code, _)| *code == "en"))
        .map(|(_, msg)| *msg)
        .unwrap_or("Hi, how can I help you with your notes today?")
}
