use serde::{Deserialize, Serialize};

/// Interface language. Passed explicitly to whatever renders user-facing strings.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    En,
    Fr,
}

impl Locale {
    pub fn code(self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Fr => "fr",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_lowercase().as_str() {
            "en" => Some(Self::En),
            "fr" => Some(Self::Fr),
            _ => None,
        }
    }

    /// Date format used in history listings.
    pub fn date_format(self) -> &'static str {
        match self {
            Self::En => "%b %-d, %Y %H:%M",
            Self::Fr => "%-d %b %Y %H:%M",
        }
    }
}

// (key, en, fr)
static MESSAGES: &[(&str, &str, &str)] = &[
    ("nav.translation", "Translation", "Traduction"),
    ("nav.terminology", "Terminology", "Terminologie"),
    ("common.copied", "Copied!", "Copié !"),
    ("common.exported", "Exported!", "Exporté !"),
    ("common.error", "Error", "Erreur"),
    ("translation.read_failed", "Could not read file", "Impossible de lire le fichier"),
    (
        "translation.docx_only",
        "Could not read this Word file. Only .docx format is supported.",
        "Impossible de lire ce fichier Word. Seul le format .docx est supporté.",
    ),
    ("translation.empty", "Nothing to translate", "Rien à traduire"),
    (
        "translation.print_fallback",
        "PDF renderer unavailable; open the print-ready file and print it to PDF:",
        "Moteur PDF indisponible ; ouvrez le fichier prêt à imprimer et imprimez-le en PDF :",
    ),
    ("letters.header", "Letter templates", "Modèles de lettres"),
    ("terms.header", "Terminology Bank", "Banque terminologique"),
    ("terms.definition", "Definition", "Définition"),
    ("terms.example", "Example", "Exemple"),
    ("terms.none", "No terms found.", "Aucun terme trouvé."),
    ("quiz.title", "Terminology Quiz", "Quiz Terminologique"),
    ("quiz.need_terms", "Need at least 4 terms", "Il faut au moins 4 termes"),
    ("quiz.type.multiple_choice", "Multiple Choice", "Choix multiple"),
    ("quiz.type.fill_blank", "Fill the Blank", "Compléter"),
    ("quiz.type.match_definition", "Match Terms", "Associer les termes"),
    ("quiz.correct", "Correct!", "Correct !"),
    ("quiz.incorrect", "Incorrect", "Incorrect"),
    ("quiz.correct_answer", "Correct answer:", "Réponse correcte :"),
    ("quiz.so_far", "correct so far", "correctes jusqu'ici"),
    ("quiz.suggestions", "Suggestions:", "Suggestions :"),
    (
        "quiz.answer_prompt",
        "Type your answer (or 'stop')",
        "Tapez votre réponse (ou 'stop')",
    ),
    (
        "quiz.match_prompt",
        "Pair a term on the left with its match on the right, e.g. 1-b (or 'stop')",
        "Associez un terme à gauche avec sa correspondance à droite, ex. 1-b (ou 'stop')",
    ),
    ("quiz.matched", "matched", "associés"),
    ("quiz.complete", "Quiz Complete!", "Quiz terminé !"),
    ("quiz.correct_answers", "correct answers", "réponses correctes"),
    ("quiz.stopped_at", "Stopped at question", "Arrêté à la question"),
    ("quiz.history", "Quiz History", "Historique des quiz"),
    ("quiz.no_history", "No quizzes taken yet.", "Aucun quiz passé pour le moment."),
    ("quiz.completed", "quizzes completed", "quiz complétés"),
    ("quiz.best", "Best:", "Meilleur :"),
    ("quiz.correct_short", "correct", "correctes"),
];

/// Looks up a user-facing string; an unknown key is returned unchanged.
pub fn tr<'a>(locale: Locale, key: &'a str) -> &'a str {
    MESSAGES
        .iter()
        .find(|(k, _, _)| *k == key)
        .map(|(_, en, fr)| match locale {
            Locale::En => *en,
            Locale::Fr => *fr,
        })
        .unwrap_or(key)
}
