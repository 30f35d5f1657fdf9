use std::{path::PathBuf, process::ExitCode, sync::Arc};

use anyhow::{bail, Context};
use clap::Parser;
use tokio_util::sync::CancellationToken;

use emotecopy_core::{
    config::Config,
    copier::EmoteSetCopier,
    domain::{EmoteSet, EmoteSetId, UserId},
    plan::{plan_copy, PlanOptions},
    ports::{EmoteSetReader, TokioSleeper},
    token::{self, AuthToken},
};
use emotecopy_seventv::SevenTvClient;

mod summary;

/// Copy every emote from one 7tv emote set into another.
#[derive(Debug, Parser)]
#[command(name = "emotecopy", version)]
struct Cli {
    /// Emote set to copy from.
    #[arg(long, value_name = "SET_ID")]
    from: String,

    /// Emote set to copy into.
    #[arg(long, value_name = "SET_ID")]
    to: String,

    /// 7tv session token (falls back to EMOTECOPY_TOKEN, then the token file).
    #[arg(long, env = "EMOTECOPY_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[arg(long, value_name = "PATH")]
    token_file: Option<PathBuf>,

    /// Write the token to the token file in plain text.
    #[arg(long)]
    save_token: bool,

    /// Replace destination emotes that use the same name.
    #[arg(long)]
    replace_conflicts: bool,

    /// Only copy as many emotes as the destination has free slots for.
    #[arg(long)]
    only_fitting: bool,

    /// Copy even when the token's user is not an owner or editor of the
    /// destination set.
    #[arg(long)]
    allow_any_editor: bool,

    #[arg(long, value_name = "URL")]
    endpoint: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = emotecopy_core::logging::init("emotecopy") {
        eprintln!("warning: {e}");
    }

    match run(Cli::parse()).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let mut cfg = Config::load()?;
    if let Some(endpoint) = cli.endpoint.clone() {
        cfg.gql_endpoint = endpoint;
    }
    if let Some(path) = cli.token_file.clone() {
        cfg.token_file = path;
    }

    let token = resolve_token(cli.token.as_deref(), &cfg)?;
    let claims = token.validate().context("the 7tv token cannot be used")?;
    tracing::info!(user = %claims.user_id.0, expires = %claims.expires_at, "token accepted");

    if cli.save_token {
        token::save_token_file(&cfg.token_file, &token)
            .with_context(|| format!("saving token to {}", cfg.token_file.display()))?;
        println!("Token saved to {}.", cfg.token_file.display());
    }

    let from = token::parse_set_id(&cli.from)?;
    let to = token::parse_set_id(&cli.to)?;
    if from == to {
        bail!("the destination emote set cannot be the same as the origin emote set");
    }

    let client = Arc::new(SevenTvClient::new(
        cfg.gql_endpoint.clone(),
        token,
        cfg.request_timeout,
    )?);

    let (source, destination) =
        load_sets(&*client, &from, &to, &claims.user_id, cli.allow_any_editor).await?;

    let plan = plan_copy(
        &source,
        &destination,
        PlanOptions {
            replace_conflicts: cli.replace_conflicts,
            only_fitting: cli.only_fitting,
        },
    );
    print!("{}", summary::render_plan(&plan));

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });
    }

    let copier = EmoteSetCopier::new(client.clone(), Arc::new(TokioSleeper), cfg.copy_policy())
        .with_cancellation(cancel);

    let report = copier
        .execute(&destination.id, &plan, &mut |ev| {
            if let Some(line) = summary::render_event(&ev) {
                println!("{line}");
            }
        })
        .await;

    print!("{}", summary::render_report(&report));

    Ok(if report.was_cancelled() {
        ExitCode::from(130)
    } else if report.has_failures() {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    })
}

/// Token precedence: `--token`, then `EMOTECOPY_TOKEN`, then the token file.
fn resolve_token(flag: Option<&str>, cfg: &Config) -> anyhow::Result<AuthToken> {
    if let Some(raw) = flag.or(cfg.token.as_deref()) {
        return Ok(AuthToken::new(raw)?);
    }
    match token::load_token_file(&cfg.token_file)? {
        Some(t) => {
            println!("Token loaded from {}.", cfg.token_file.display());
            Ok(t)
        }
        None => bail!(
            "no 7tv token given; pass --token, set EMOTECOPY_TOKEN, or save one with --save-token"
        ),
    }
}

/// Fetch both sets and refuse runs that must not or cannot write into the
/// destination.
async fn load_sets(
    reader: &dyn EmoteSetReader,
    from: &EmoteSetId,
    to: &EmoteSetId,
    user: &UserId,
    allow_any_editor: bool,
) -> anyhow::Result<(EmoteSet, EmoteSet)> {
    let source = reader
        .fetch_emote_set(from)
        .await
        .context("fetching the origin emote set")?;
    println!(
        "Found origin emote set: '{}' ({}/{})",
        source.name,
        source.len(),
        source.capacity
    );

    let destination = reader
        .fetch_emote_set(to)
        .await
        .context("fetching the destination emote set")?;
    println!(
        "Found destination emote set: '{}' ({}/{})",
        destination.name,
        destination.len(),
        destination.capacity
    );

    // Legacy ObjectIDs and ULIDs can name the same set.
    if source.id == destination.id {
        bail!("the destination emote set cannot be the same as the origin emote set");
    }
    if !allow_any_editor && !destination.is_editable_by(user) {
        bail!("you are not the owner or an editor of the destination emote set");
    }

    Ok((source, destination))
}
