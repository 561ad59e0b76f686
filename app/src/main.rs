mod ocr;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use pipeline::notifier::HttpCallbackNotifier;
use pipeline::store::Store;
use pipeline::VerificationPipeline;
use provider::abyssinia::AbyssiniaClient;
use provider::cbe::CbeClient;
use provider::dashen::DashenClient;
use provider::fetch::RetryPolicy;
use provider::telebirr::TelebirrClient;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use verifier_core::models::{BankType, ReceiverAccount, VerifyRequest};

#[derive(Parser)]
#[command(name = "et-receipt-verifier", about = "Ethiopian bank receipt verification service")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Verify one receipt by bank tag and transaction reference
    Verify(VerifyArgs),
    /// Recognize a receipt screenshot, then verify what it names
    Screenshot(ScreenshotArgs),
    /// Administer and rotate receiving accounts
    Accounts {
        #[command(subcommand)]
        command: AccountsCommand,
    },
    /// List verified payments, newest first
    Payments,
    /// List failed verification attempts, newest first
    Failed,
}

#[derive(Args)]
struct VerifyArgs {
    /// Bank tag: TELEBIRR, CBE, ABYSSINIA or DASHEN
    #[arg(long)]
    bank: String,
    /// Transaction reference printed on the receipt
    #[arg(long)]
    reference: String,
    /// Account suffix some banks require alongside the reference
    #[arg(long)]
    suffix: Option<String>,
    /// Identifier of the party that submitted the receipt
    #[arg(long)]
    sender: String,
    /// Merchant-side correlation id passed through to the callback
    #[arg(long = "merchant-ref")]
    merchant_ref: Option<String>,
}

#[derive(Args)]
struct ScreenshotArgs {
    /// Path to the receipt screenshot image
    #[arg(long)]
    file: PathBuf,
    #[arg(long)]
    sender: String,
    #[arg(long)]
    suffix: Option<String>,
    #[arg(long = "merchant-ref")]
    merchant_ref: Option<String>,
}

#[derive(Subcommand)]
enum AccountsCommand {
    /// Print the least-recently-used account per bank and stamp it
    Next {
        #[arg(long)]
        bank: Option<String>,
    },
    /// Add or replace a receiving account
    Add {
        #[arg(long)]
        bank: String,
        #[arg(long)]
        number: String,
        #[arg(long)]
        name: String,
    },
}

fn init_tracing() {
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(env_filter))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn callback_secret() -> Result<String> {
    std::env::var("VERIFIER_CALLBACK_SECRET")
        .or_else(|_| config::get_secret("callback_secret"))
        .map_err(|_| anyhow!("Callback secret not found in env or keychain"))
}

fn ocr_api_key() -> Result<String> {
    std::env::var("VERIFIER_OCR_API_KEY")
        .or_else(|_| config::get_secret("ocr_api_key"))
        .map_err(|_| anyhow!("OCR service is not configured"))
}

fn build_pipeline(cfg: &config::AppConfig) -> Result<VerificationPipeline> {
    let callback_url = cfg
        .callback
        .url
        .clone()
        .ok_or_else(|| anyhow!("Callback URL is not configured"))?;
    let secret = callback_secret()?;

    let store = Store::open(&cfg.data_dir)?;
    let notifier = HttpCallbackNotifier::new(callback_url, secret);
    let mut pipeline = VerificationPipeline::new(store, notifier);

    pipeline.register_provider(
        BankType::Telebirr,
        TelebirrClient::new(
            cfg.telebirr.primary_url.clone(),
            cfg.telebirr.fallback_url.clone(),
            cfg.telebirr.skip_primary,
            RetryPolicy::single(Duration::from_millis(cfg.telebirr.timeout_ms)),
        ),
    );
    pipeline.register_provider(
        BankType::Cbe,
        CbeClient::new(
            cfg.cbe.url.clone(),
            RetryPolicy::single(Duration::from_millis(cfg.cbe.timeout_ms)),
        )?,
    );
    pipeline.register_provider(
        BankType::Abyssinia,
        AbyssiniaClient::new(
            cfg.abyssinia.url.clone(),
            RetryPolicy::fixed(
                cfg.abyssinia.max_attempts as u32,
                Duration::from_millis(cfg.abyssinia.retry_delay_ms),
                Duration::from_millis(cfg.abyssinia.timeout_ms),
            ),
        ),
    );
    pipeline.register_provider(
        BankType::Dashen,
        DashenClient::new(
            cfg.dashen.url.clone(),
            RetryPolicy::single(Duration::from_millis(cfg.dashen.timeout_ms)),
        )?,
    );

    Ok(pipeline)
}

async fn run_verification(cfg: &config::AppConfig, request: VerifyRequest) -> Result<bool> {
    let pipeline = build_pipeline(cfg)?;
    let outcome = pipeline.process(&request).await;
    println!("{}", outcome.message);
    Ok(outcome.success)
}

async fn run_screenshot(cfg: &config::AppConfig, args: ScreenshotArgs) -> Result<bool> {
    let api_key = ocr_api_key()?;
    let image = tokio::fs::read(&args.file)
        .await
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    let mime = ocr::mime_for_path(&args.file);

    let recognized = ocr::OcrClient::new(api_key).recognize(&image, mime).await?;
    tracing::info!(bank = %recognized.bank_type, reference = %recognized.reference, "screenshot recognized");

    run_verification(
        cfg,
        VerifyRequest {
            bank_type: recognized.bank_type,
            reference: recognized.reference,
            suffix: args.suffix,
            sender_id: args.sender,
            merchant_reference_id: args.merchant_ref,
        },
    )
    .await
}

fn print_next_account(store: &Store, bank: BankType) -> Result<()> {
    match store.next_account(bank)? {
        Some(account) => println!("{}: {} ({})", bank, account.account_number, account.account_name),
        None => println!("{}: no accounts configured", bank),
    }
    Ok(())
}

async fn run_accounts(cfg: &config::AppConfig, command: AccountsCommand) -> Result<()> {
    let store = Store::open(&cfg.data_dir)?;
    match command {
        AccountsCommand::Next { bank } => match bank {
            Some(tag) => print_next_account(&store, tag.parse()?)?,
            None => {
                for bank in BankType::ALL {
                    print_next_account(&store, bank)?;
                }
            }
        },
        AccountsCommand::Add { bank, number, name } => {
            let bank: BankType = bank.parse()?;
            store.upsert_account(&ReceiverAccount {
                bank_type: bank,
                account_number: number.clone(),
                account_name: name,
                last_used_at: None,
            })?;
            println!("Added {} account {}", bank, number);
        }
    }
    Ok(())
}

async fn run_payments(cfg: &config::AppConfig) -> Result<()> {
    let store = Store::open(&cfg.data_dir)?;
    let payments = store.list_payments()?;
    if payments.is_empty() {
        println!("No verified payments recorded");
        return Ok(());
    }
    for payment in payments {
        println!(
            "{} {} {} sender={} amount={}",
            payment.verified_at.to_rfc3339(),
            payment.bank_type,
            payment.reference,
            payment.sender_id,
            payment
                .amount
                .map(|a| a.to_string())
                .unwrap_or_else(|| "-".to_string())
        );
    }
    Ok(())
}

async fn run_failed(cfg: &config::AppConfig) -> Result<()> {
    let store = Store::open(&cfg.data_dir)?;
    let failures = store.list_failures()?;
    if failures.is_empty() {
        println!("No failed verifications recorded");
        return Ok(());
    }
    for failure in failures {
        println!(
            "{} {} {} sender={} reason={}",
            failure.failed_at.to_rfc3339(),
            failure.bank_type,
            failure.reference,
            failure.sender_id,
            failure.reason
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let cfg = config::load().unwrap_or_default();

    let success = match cli.command {
        Command::Verify(args) => {
            run_verification(
                &cfg,
                VerifyRequest {
                    bank_type: args.bank,
                    reference: args.reference,
                    suffix: args.suffix,
                    sender_id: args.sender,
                    merchant_reference_id: args.merchant_ref,
                },
            )
            .await?
        }
        Command::Screenshot(args) => run_screenshot(&cfg, args).await?,
        Command::Accounts { command } => {
            run_accounts(&cfg, command).await?;
            true
        }
        Command::Payments => {
            run_payments(&cfg).await?;
            true
        }
        Command::Failed => {
            run_failed(&cfg).await?;
            true
        }
    };

    if !success {
        std::process::exit(1);
    }
    Ok(())
}
