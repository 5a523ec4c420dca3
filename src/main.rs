// suggestshot: batch autosuggest screenshot capture
//
// Fetches the keyword list, opens one emulated mobile browser session,
// processes every keyword sequentially, prints the summary, and always
// closes the browser before exiting regardless of how the batch ended.

use anyhow::Result;
use tracing::info;

use suggestshot::{
    ArtifactStore, BatchOrchestrator, Config, KeywordProvider, RunEnvironment, SearchSession,
    load_yaml_config,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config: Config = load_yaml_config()?.apply_env_overrides();
    let environment = RunEnvironment::resolve();
    info!(
        "starting capture run ({:?}, output: {})",
        environment,
        config.capture.output_dir.display()
    );

    let keywords = KeywordProvider::new(config.sheet.clone()).fetch().await;
    let store = ArtifactStore::open(&config.capture.output_dir)?;

    let session = SearchSession::open(&config.browser, environment).await?;

    // The batch never errors: per-keyword failures become records and a
    // lost session just ends the loop early. Scope the orchestrator so the
    // session can be closed on this path no matter what happened inside.
    let report = {
        let mut orchestrator = BatchOrchestrator::new(&config, &session, store);
        orchestrator.run(&keywords).await
    };
    session.close().await;

    print!("{}", report.render_summary());
    Ok(())
}
