use a3s_docguard::{
    telemetry, DocGuardConfig, DocumentInput, DocumentType, InMemoryPages, PageContent,
    PageSize, PageSource, PdfMetadata, Redactor, SecureAnalyzer, TamperDetector,
};
use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A3S DocGuard - Secure financial document analysis
#[derive(Debug, Parser)]
#[command(name = "a3s-docguard", version, about)]
struct Cli {
    /// TOML config file (environment variables override it)
    #[arg(long, global = true, env = "DOCGUARD_CONFIG")]
    config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the full pipeline and print the analysis result as JSON
    Analyze {
        /// Extracted document text
        #[arg(long)]
        input: PathBuf,

        /// bank_statement, pay_stub, tax_return or other
        #[arg(long)]
        doc_type: DocumentType,

        /// Provider to try ("anthropic", "openai" or "local")
        #[arg(long)]
        provider: Option<String>,

        /// Document snapshot JSON with PDF metadata and pages
        #[arg(long)]
        document: Option<PathBuf>,

        /// Print the session's audit entries to stderr
        #[arg(long)]
        show_audit: bool,
    },

    /// Redact a text file and print the redacted text
    Redact {
        #[arg(long)]
        input: PathBuf,

        #[arg(long, default_value = "other")]
        doc_type: DocumentType,
    },

    /// Print the sensitivity assessment of a text file
    Assess {
        #[arg(long)]
        input: PathBuf,
    },

    /// Run the tamper detector over a document snapshot
    Tamper {
        #[arg(long)]
        document: PathBuf,

        /// Pages to fingerprint (defaults to the configured limit)
        #[arg(long)]
        max_pages: Option<usize>,
    },
}

/// PDF facts gathered by the upstream extractor
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DocumentSnapshot {
    metadata: PdfMetadata,
    pages: Vec<PageSnapshot>,
    encrypted: bool,
    repaired: bool,
    extraction_error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PageSnapshot {
    text: String,
    /// Decoded page content stream
    content_stream: String,
    image_count: u32,
    xobject_count: u32,
    page_size: PageSize,
}

impl DocumentSnapshot {
    async fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read document snapshot {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Invalid document snapshot {}", path.display()))
    }

    fn into_parts(self) -> (PdfMetadata, InMemoryPages, Option<String>) {
        let pages = self
            .pages
            .into_iter()
            .map(|p| PageContent {
                text: p.text,
                content_stream: p.content_stream.into_bytes(),
                image_count: p.image_count,
                xobject_count: p.xobject_count,
                page_size: p.page_size,
            })
            .collect();
        let pages = InMemoryPages::new(pages)
            .encrypted(self.encrypted)
            .repaired(self.repaired);
        (self.metadata, pages, self.extraction_error)
    }
}

async fn read_text(path: &Path) -> anyhow::Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    telemetry::init_tracing(cli.json_logs);

    let config = DocGuardConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Analyze {
            input,
            doc_type,
            provider,
            document,
            show_audit,
        } => {
            let text = read_text(&input).await?;
            let mut request = DocumentInput::new(text, doc_type);
            if let Some(name) = provider {
                request = request.with_provider(name);
            }
            if let Some(path) = document {
                let (metadata, pages, extraction_error) =
                    DocumentSnapshot::load(&path).await?.into_parts();
                request = request.with_metadata(metadata).with_pages(Arc::new(pages));
                if let Some(error) = extraction_error {
                    request = request.with_extraction_error(error);
                }
            }

            let analyzer = SecureAnalyzer::new(config);
            let result = analyzer.analyze_document(request).await;

            println!("{}", serde_json::to_string_pretty(&result)?);
            if let (true, Some(log)) = (show_audit, analyzer.audit()) {
                eprintln!("{}", serde_json::to_string_pretty(&log.entries())?);
            }
        }
        Commands::Redact { input, doc_type } => {
            let text = read_text(&input).await?;
            let categories = config.redaction.categories_for(doc_type);
            let (redacted, session) = Redactor::new().redact(&text, &categories);

            println!("{}", redacted);
            eprintln!("Session {}: {} tokens", session.id(), session.len());
            for (category, count) in session.category_counts() {
                eprintln!("  {:<16} {}", category.as_str(), count);
            }
        }
        Commands::Assess { input } => {
            let text = read_text(&input).await?;
            let assessment = a3s_docguard::assess_detailed(&text);
            println!("{}", serde_json::to_string_pretty(&assessment)?);
        }
        Commands::Tamper {
            document,
            max_pages,
        } => {
            let (metadata, pages, _) = DocumentSnapshot::load(&document).await?.into_parts();
            let detector =
                TamperDetector::new(max_pages.unwrap_or(config.max_fingerprint_pages));
            let report = detector.detect(&metadata, Some(&pages as &dyn PageSource));
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}
