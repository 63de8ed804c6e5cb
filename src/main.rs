use std::sync::Arc;

use lead_assist::auth::SessionGate;
use lead_assist::config::AppConfig;
use lead_assist::crm::{CrmSink, HubSpotClient};
use lead_assist::http::{AppState, build_router};
use lead_assist::llm::{ReplyDrafter, create_provider};
use lead_assist::mail::{MailSender, SmtpMailer};
use lead_assist::notify::{Notifier, SlackNotifier};
use lead_assist::records::ApprovalWorkflow;
use lead_assist::store::{LibSqlBackend, RecordStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = AppConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        eprintln!("  Required: ADMIN_PASSWORD, SESSION_SECRET, SMTP_HOST, ANTHROPIC_API_KEY");
        std::process::exit(1);
    });

    eprintln!("📬 Lead Assist v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {}", config.llm.model);
    eprintln!("   Base URL: {}", config.base_url);

    // ── LLM + drafter ───────────────────────────────────────────────────
    let model = create_provider(&config.llm)?;
    let drafter = Arc::new(ReplyDrafter::new(model, config.drafter.clone()));

    // ── Database ────────────────────────────────────────────────────────
    let store: Arc<dyn RecordStore> = Arc::new(
        LibSqlBackend::new_local(&config.db_path)
            .await
            .unwrap_or_else(|e| {
                eprintln!(
                    "Error: Failed to open database at {}: {}",
                    config.db_path.display(),
                    e
                );
                std::process::exit(1);
            }),
    );
    eprintln!("   Database: {}", config.db_path.display());

    // ── Collaborators ───────────────────────────────────────────────────
    let mail: Arc<dyn MailSender> = Arc::new(SmtpMailer::new(config.mail.clone()));
    eprintln!(
        "   Mail: SMTP {}:{} (from {})",
        config.mail.smtp_host, config.mail.smtp_port, config.mail.from_address
    );

    let notifier: Option<Arc<dyn Notifier>> = match config.slack.clone() {
        Some(slack) => {
            eprintln!("   Slack: enabled (channel {})", slack.channel_id);
            Some(Arc::new(SlackNotifier::new(slack)))
        }
        None => {
            eprintln!("   Slack: disabled (SLACK_BOT_TOKEN not set)");
            None
        }
    };

    let crm: Option<Arc<dyn CrmSink>> = match config.hubspot.clone() {
        Some(hubspot) => {
            eprintln!("   HubSpot: enabled");
            Some(Arc::new(HubSpotClient::new(hubspot)))
        }
        None => {
            eprintln!("   HubSpot: disabled (HUBSPOT_API_KEY not set)");
            None
        }
    };

    // ── Workflow + HTTP server ──────────────────────────────────────────
    let gate = Arc::new(SessionGate::new(
        config.admin_password.clone(),
        config.session_secret.clone(),
    ));

    let workflow = Arc::new(ApprovalWorkflow::new(
        store,
        mail,
        drafter,
        Arc::clone(&gate),
        crm,
        notifier,
        config.base_url.clone(),
    ));

    let app = build_router(AppState { workflow, gate });

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    eprintln!("   Listening on http://0.0.0.0:{}\n", config.port);
    tracing::info!(port = config.port, "HTTP server started");

    axum::serve(listener, app).await?;

    Ok(())
}
