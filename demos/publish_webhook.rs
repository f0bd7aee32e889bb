use std::sync::Arc;

use eventgrid_readiness::{
    ArmKeySource, ExecutionMode, LogObserver, PollOptions, ReadinessGate, Resolution,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let hostname = std::env::var("AZURE_FUNCTION_HOSTNAME")?;
    let scope = std::env::var("EVENTGRID_SCOPE")?;

    let options = PollOptions::from_env()?;
    let source = ArmKeySource::from_env()?.with_options(options.clone());

    let gate = ReadinessGate::new(ExecutionMode::from_env(), scope)
        .with_options(options)
        .with_observer(Arc::new(LogObserver));

    match gate.publish(&source, &hostname).await? {
        Resolution::Known(published) => {
            println!("{}", serde_json::to_string_pretty(&published.subscription)?);
        }
        Resolution::Unknown => println!("plan-only run: webhook url unknown until apply"),
    }

    Ok(())
}
