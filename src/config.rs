// src/config.rs

use std::{env, sync::Arc, time::Duration};

use anyhow::Context;
use sqlx::{PgPool, postgres::PgPoolOptions};

use crate::{
    common::i18n::I18nStore,
    db::{DocumentRepository, PurchaseOrderRepository, RequestRepository, UserRepository},
    services::{
        approval_service::ApprovalService,
        auth::AuthService,
        document_service::DocumentService,
        extraction::{AiExtractor, ExtractionEngine, OpenAiCompletionClient, PdfExtractReader, StructuredExtractor, text},
        file_store::{FileStore, LocalFileStore},
        pdf_renderer::{DocumentRenderer, GenPdfRenderer},
        purchase_order_service::PurchaseOrderService,
        request_service::RequestService,
    },
};

// =============================================================================
//  CONFIGURAÇÃO
// =============================================================================

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt_secret: String,
    pub bind_addr: String,
    pub db_max_connections: u32,
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub extraction_model: String,
    pub extraction_timeout: Duration,
    pub media_root: String,
    pub media_url: String,
    pub pdf_font_dir: String,
    pub pdf_font_name: String,
    pub max_upload_bytes: usize,
}

impl AppConfig {
    /// Lê as variáveis de ambiente (e o `.env`, se existir).
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL deve ser definida")?,
            jwt_secret: env::var("JWT_SECRET").context("JWT_SECRET deve ser definido")?,
            bind_addr: var_or("BIND_ADDR", "0.0.0.0:3000"),
            db_max_connections: parse_or("DB_MAX_CONNECTIONS", 5)?,
            openai_api_key: env::var("OPENAI_API_KEY").ok().filter(|k| !k.trim().is_empty()),
            openai_base_url: var_or("OPENAI_BASE_URL", "https://api.openai.com/v1"),
            extraction_model: var_or("EXTRACTION_MODEL", "gpt-4o-mini"),
            extraction_timeout: Duration::from_secs(parse_or("EXTRACTION_TIMEOUT_SECS", 60)?),
            media_root: var_or("MEDIA_ROOT", "./media"),
            media_url: var_or("MEDIA_URL", "/media"),
            pdf_font_dir: var_or("PDF_FONT_DIR", "./fonts"),
            pdf_font_name: var_or("PDF_FONT_NAME", "Roboto"),
            max_upload_bytes: parse_or("MAX_UPLOAD_BYTES", 10 * 1024 * 1024)?,
        })
    }
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().with_context(|| format!("{key} inválida: {raw}")),
        Err(_) => Ok(default),
    }
}

// =============================================================================
//  ESTADO DA APLICAÇÃO
// =============================================================================

#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub config: AppConfig,
    pub i18n_store: I18nStore,
    pub auth_service: AuthService,
    pub request_service: RequestService,
    pub approval_service: ApprovalService,
    pub document_service: DocumentService,
    pub po_service: PurchaseOrderService,
}

impl AppState {
    pub async fn new(config: AppConfig) -> anyhow::Result<Self> {
        let db_pool = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&config.database_url)
            .await
            .context("Falha ao conectar ao banco de dados")?;

        tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

        // --- Monta o gráfico de dependências ---
        let user_repo = UserRepository::new(db_pool.clone());
        let request_repo = RequestRepository::new(db_pool.clone());
        let document_repo = DocumentRepository::new(db_pool.clone());
        let po_repo = PurchaseOrderRepository::new(db_pool.clone());

        let files: Arc<dyn FileStore> = Arc::new(LocalFileStore::new(&config.media_root, &config.media_url));
        let renderer: Arc<dyn DocumentRenderer> =
            Arc::new(GenPdfRenderer::new(&config.pdf_font_dir, &config.pdf_font_name));

        let primary: Option<Arc<dyn StructuredExtractor>> = match &config.openai_api_key {
            Some(key) => {
                let client = OpenAiCompletionClient::new(
                    &config.openai_base_url,
                    key,
                    &config.extraction_model,
                    config.extraction_timeout,
                )?;
                tracing::info!(model = %config.extraction_model, "🤖 Extração por IA habilitada");
                Some(Arc::new(AiExtractor::new(Arc::new(client))))
            }
            None => {
                tracing::warn!("OPENAI_API_KEY ausente, usando apenas a extração por texto");
                None
            }
        };
        let engine = ExtractionEngine::new(Arc::new(PdfExtractReader), text::default_ocr(), primary);

        let auth_service = AuthService::new(user_repo.clone(), config.jwt_secret.clone());
        let po_service = PurchaseOrderService::new(
            db_pool.clone(),
            po_repo.clone(),
            request_repo.clone(),
            document_repo.clone(),
            user_repo.clone(),
            renderer,
            files.clone(),
        );
        let request_service = RequestService::new(
            db_pool.clone(),
            request_repo.clone(),
            document_repo.clone(),
            po_repo.clone(),
            user_repo,
        );
        let approval_service = ApprovalService::new(db_pool.clone(), request_repo.clone(), po_service.clone());
        let document_service = DocumentService::new(db_pool.clone(), request_repo, document_repo, po_repo, engine, files);

        Ok(Self {
            db_pool,
            config,
            i18n_store: I18nStore::new(),
            auth_service,
            request_service,
            approval_service,
            document_service,
            po_service,
        })
    }
}
