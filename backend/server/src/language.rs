//! # Language detection
//!
//! Tags every review with the language of its description.
//!
//! - Classifier answers ISO 639-3 codes (`eng`, `deu`, ...) or `und`
//! - Only a handful of codes get a label, everything else shows as `-`
//! - Texts shorter than `MIN_DETECT_CHARS` are `und`, short snippets are too noisy to call
use records::{LanguageLabel, reviews::UNDETERMINED_CODE};
use tracing::debug;

pub trait LanguageClassifier: Send + Sync {
    /// Pure: the same text always yields the same code.
    fn classify(&self, text: &str) -> String;
}

pub struct WhatlangClassifier {
    min_chars: usize,
}

impl WhatlangClassifier {
    pub fn new(min_chars: usize) -> Self {
        Self { min_chars }
    }
}

impl LanguageClassifier for WhatlangClassifier {
    fn classify(&self, text: &str) -> String {
        if text.trim().chars().count() < self.min_chars {
            return UNDETERMINED_CODE.to_string();
        }

        whatlang::detect(text)
            .map(|info| info.lang().code())
            .unwrap_or(UNDETERMINED_CODE)
            .to_string()
    }
}

pub fn classify_language(classifier: &dyn LanguageClassifier, text: &str) -> LanguageLabel {
    let code = classifier.classify(text);
    let label = LanguageLabel::from_code(&code);

    debug!("Classified description as {code} ({label})");
    label
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(&'static str);

    impl LanguageClassifier for Fixed {
        fn classify(&self, _text: &str) -> String {
            self.0.to_string()
        }
    }

    #[test]
    fn test_known_codes() {
        assert_eq!(classify_language(&Fixed("eng"), "x"), LanguageLabel::English);
        assert_eq!(classify_language(&Fixed("deu"), "x"), LanguageLabel::Deutsch);
    }

    #[test]
    fn test_undetermined_and_unknown_codes() {
        assert_eq!(classify_language(&Fixed("und"), "x"), LanguageLabel::Undetermined);
        assert_eq!(classify_language(&Fixed("fra"), "x"), LanguageLabel::Undetermined);
        assert_eq!(classify_language(&Fixed("jpn"), "x"), LanguageLabel::Undetermined);
    }

    #[test]
    fn test_deterministic() {
        let classifier = WhatlangClassifier::new(10);
        let text = "The food was wonderful and the staff were very friendly to everyone.";

        assert_eq!(
            classify_language(&classifier, text),
            classify_language(&classifier, text)
        );
    }

    #[test]
    fn test_whatlang_detects_english_and_german() {
        let classifier = WhatlangClassifier::new(10);

        assert_eq!(
            classifier.classify(
                "The food was wonderful and the staff were very friendly to everyone who came in."
            ),
            "eng"
        );
        assert_eq!(
            classifier.classify(
                "Das Essen war wirklich ausgezeichnet und die Bedienung war sehr freundlich zu uns."
            ),
            "deu"
        );
    }

    #[test]
    fn test_short_text_is_undetermined() {
        let classifier = WhatlangClassifier::new(10);

        assert_eq!(classifier.classify("Great!"), UNDETERMINED_CODE);
        assert_eq!(classifier.classify("          "), UNDETERMINED_CODE);
    }
}
