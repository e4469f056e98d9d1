//! Implementation of the `mb bootstrap` command.

use crate::bootstrap::{
    BootstrapOptions, LockOptions, NodeBootstrapResult, ShellConnector, bootstrap_environment,
    results_of,
};
use crate::cli::BootstrapArgs;
use crate::context::AppContext;
use crate::error::{MbError, Result};
use serde_json::Value;
use std::sync::Arc;

/// Execute `mb bootstrap <environment> <hosts>...`.
///
/// Runs the bootstrap as a job holding the environment lock and prints one
/// line per host. Fails if any host failed.
pub async fn cmd_bootstrap(ctx: &AppContext, args: BootstrapArgs) -> Result<()> {
    let options = BootstrapOptions {
        environment: args.environment,
        attributes: parse_attributes(args.attributes.as_deref())?,
    };
    let lock = LockOptions {
        force: args.force,
        unlock_on_failure: !args.keep_lock_on_failure,
    };

    let connector = Arc::new(ShellConnector::new(&ctx.config));
    let spawned = bootstrap_environment(
        ctx,
        args.hosts,
        options,
        lock,
        connector.clone(),
        connector,
    )
    .await?;

    let record = spawned.join().await?;
    let results = results_of(&record)?;
    for result in &results {
        println!("{}", result);
    }

    check_results(&results)
}

/// Parse `--attributes` into a JSON object. Absent means `{}`.
fn parse_attributes(raw: Option<&str>) -> Result<Value> {
    let Some(raw) = raw else {
        return Ok(Value::Object(Default::default()));
    };

    match serde_json::from_str::<Value>(raw) {
        Ok(value @ Value::Object(_)) => Ok(value),
        Ok(_) => Err(MbError::UserError(
            "--attributes must be a JSON object".to_string(),
        )),
        Err(e) => Err(MbError::UserError(format!(
            "--attributes is not valid JSON: {}",
            e
        ))),
    }
}

fn check_results(results: &[NodeBootstrapResult]) -> Result<()> {
    let failed = results.iter().filter(|r| !r.is_ok()).count();
    if failed > 0 {
        return Err(MbError::RemoteCommand(format!(
            "{} of {} nodes failed",
            failed,
            results.len()
        )));
    }
    Ok(())
}
