// src/middleware/i18n.rs

use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts};

use crate::common::i18n::DEFAULT_LANG;

const SUPPORTED_LANGS: [&str; 2] = ["pt", "en"];

// Extrator de idioma a partir do Accept-Language
#[derive(Debug, Clone)]
pub struct Locale(pub String);

impl<S> FromRequestParts<S> for Locale
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let lang = parts
            .headers
            .get(header::ACCEPT_LANGUAGE)
            .and_then(|header_value| header_value.to_str().ok())
            .map(negotiate)
            .unwrap_or_else(|| DEFAULT_LANG.to_string());

        Ok(Locale(lang))
    }
}

/// Primeiro idioma suportado do cabeçalho ("pt-BR" -> "pt"), ou o padrão.
pub fn negotiate(header_str: &str) -> String {
    accept_language::parse(header_str)
        .iter()
        .filter_map(|tag| tag.split('-').next())
        .map(|primary| primary.to_ascii_lowercase())
        .find(|primary| SUPPORTED_LANGS.contains(&primary.as_str()))
        .unwrap_or_else(|| DEFAULT_LANG.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_first_supported_language() {
        assert_eq!(negotiate("pt-BR,pt;q=0.9,en;q=0.8"), "pt");
        assert_eq!(negotiate("fr-FR, en;q=0.5"), "en");
        assert_eq!(negotiate("de"), DEFAULT_LANG);
        assert_eq!(negotiate(""), DEFAULT_LANG);
    }
}
