// src/common/i18n.rs

use std::{collections::HashMap, sync::Arc};

pub const DEFAULT_LANG: &str = "en";

// Catálogo de mensagens em memória, carregado uma vez no startup.
// Placeholders seguem o formato `{nome}`.
#[derive(Clone)]
pub struct I18nStore {
    catalog: Arc<HashMap<&'static str, HashMap<&'static str, &'static str>>>,
}

impl I18nStore {
    pub fn new() -> Self {
        let mut catalog = HashMap::new();
        catalog.insert("en", EN.iter().copied().collect());
        catalog.insert("pt", PT.iter().copied().collect());
        Self { catalog: Arc::new(catalog) }
    }

    /// Busca a mensagem no idioma pedido, caindo para o inglês e por fim para a própria chave.
    pub fn translate(&self, lang: &str, key: &str, args: &[(&str, String)]) -> String {
        let template = self
            .lookup(lang, key)
            .or_else(|| self.lookup(DEFAULT_LANG, key))
            .unwrap_or(key);

        args.iter().fold(template.to_string(), |message, (name, value)| {
            message.replace(&format!("{{{}}}", name), value)
        })
    }

    fn lookup(&self, lang: &str, key: &str) -> Option<&'static str> {
        self.catalog.get(lang).and_then(|messages| messages.get(key)).copied()
    }
}

impl Default for I18nStore {
    fn default() -> Self {
        Self::new()
    }
}

const EN: &[(&str, &str)] = &[
    ("validation", "One or more fields are invalid."),
    ("invalid_token", "Invalid or missing authentication token."),
    ("user_not_found", "User not found."),
    ("not_found", "{resource} not found."),
    ("permission_denied", "You do not have permission to perform this action."),
    ("request_not_editable", "Only pending requests can be edited."),
    ("request_not_pending", "The request is no longer pending."),
    ("wrong_level", "The request is not awaiting level {level} approval."),
    ("proforma_exists", "A proforma has already been uploaded for this request."),
    ("request_not_approved", "Receipts can only be uploaded for approved requests."),
    ("purchase_order_missing", "No purchase order exists for this request."),
    ("invalid_upload", "Invalid upload: {reason}."),
    ("conflict", "The request was modified concurrently. Please retry."),
    ("duplicate", "A record with the same unique value already exists."),
    ("processing_failed", "Failed to process the document."),
    ("internal", "An unexpected error occurred."),
];

const PT: &[(&str, &str)] = &[
    ("validation", "Um ou mais campos são inválidos."),
    ("invalid_token", "Token de autenticação inválido ou ausente."),
    ("user_not_found", "Usuário não encontrado."),
    ("not_found", "{resource} não encontrado(a)."),
    ("permission_denied", "Você não tem permissão para realizar esta ação."),
    ("request_not_editable", "Apenas requisições pendentes podem ser editadas."),
    ("request_not_pending", "A requisição não está mais pendente."),
    ("wrong_level", "A requisição não aguarda aprovação de nível {level}."),
    ("proforma_exists", "Já existe uma proforma para esta requisição."),
    ("request_not_approved", "Recibos só podem ser enviados para requisições aprovadas."),
    ("purchase_order_missing", "Não existe ordem de compra para esta requisição."),
    ("invalid_upload", "Upload inválido: {reason}."),
    ("conflict", "A requisição foi alterada por outra operação. Tente novamente."),
    ("duplicate", "Já existe um registro com este valor único."),
    ("processing_failed", "Falha ao processar o documento."),
    ("internal", "Ocorreu um erro inesperado."),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_to_english_then_key() {
        let store = I18nStore::new();
        assert_eq!(store.translate("pt", "internal", &[]), "Ocorreu um erro inesperado.");
        assert_eq!(store.translate("fr", "internal", &[]), "An unexpected error occurred.");
        assert_eq!(store.translate("pt", "unknown_key", &[]), "unknown_key");
    }

    #[test]
    fn replaces_placeholders() {
        let store = I18nStore::new();
        let message = store.translate("en", "wrong_level", &[("level", "2".to_string())]);
        assert_eq!(message, "The request is not awaiting level 2 approval.");
    }
}
