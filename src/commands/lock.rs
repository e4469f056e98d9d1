//! Implementation of the `mb lock`, `mb unlock` and `mb locks` commands.

use crate::cli::LockArgs;
use crate::context::AppContext;
use crate::error::{MbError, Result};
use crate::locks::{LockInfo, Ownership};

/// Execute `mb lock <environment>`.
///
/// The lock item stays in the store after the process exits; release it
/// with `mb unlock`.
pub async fn cmd_lock(ctx: &AppContext, args: LockArgs) -> Result<()> {
    let mutex = ctx
        .mutex()
        .chef_environment(args.environment)
        .force(args.force)
        .build()?;

    if !mutex.lock().await? {
        return Err(mutex.locked_error().await);
    }

    println!("Locked {}", mutex);
    Ok(())
}

/// Execute `mb unlock <environment>`.
///
/// Unlocking an environment nobody holds succeeds.
pub async fn cmd_unlock(ctx: &AppContext, args: LockArgs) -> Result<()> {
    let mutex = ctx
        .mutex()
        .chef_environment(args.environment)
        .force(args.force)
        .build()?;

    if mutex.unlock().await? {
        println!("Unlocked {}", mutex);
        return Ok(());
    }

    match mutex.ownership().await? {
        Ownership::Absent => {
            println!("{} is not locked", mutex);
            Ok(())
        }
        Ownership::Ours => Err(MbError::Store(format!(
            "lock item for {} could not be deleted",
            mutex
        ))),
        Ownership::Theirs => Err(MbError::ResourceLocked(format!(
            "{}\n\
             Locks are owned by the client and process that took them.\n\
             To remove it anyway, run:\n  mb unlock {} --force",
            mutex.locked_error().await,
            mutex.name()
        ))),
    }
}

/// Execute `mb locks`.
pub async fn cmd_locks(ctx: &AppContext) -> Result<()> {
    let locks = ctx.list_locks().await?;
    print!("{}", render_locks(&locks, ctx.config.locks.stale_minutes));
    Ok(())
}

fn render_locks(locks: &[LockInfo], stale_minutes: u32) -> String {
    if locks.is_empty() {
        return "No locks held.\n".to_string();
    }

    let mut out = format!("Locks ({}):\n", locks.len());
    for lock in locks {
        out.push_str(&format!("  {}\n", lock));
    }

    let stale = locks.iter().filter(|l| l.is_stale).count();
    if stale > 0 {
        out.push_str(&format!(
            "\nNote: {} lock(s) older than {} min. Use `mb unlock <environment> --force` to clear.\n",
            stale, stale_minutes
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locks::MemoryStore;
    use crate::test_support::{foreign_lock_context, lock_context};
    use std::sync::Arc;

    fn context(store: Arc<MemoryStore>, client: &str) -> AppContext {
        let mut config = crate::config::Config::default();
        config.chef.client_name = client.to_string();
        let mut ctx = AppContext::new(config, store);
        ctx.locks = ctx.locks.with_test_mode(false);
        ctx
    }

    fn args(environment: &str, force: bool) -> LockArgs {
        LockArgs {
            environment: environment.to_string(),
            force,
        }
    }

    #[tokio::test]
    async fn test_lock_then_unlock() {
        let store = Arc::new(MemoryStore::new());
        let ctx = context(store, "alice");

        cmd_lock(&ctx, args("prod", false)).await.unwrap();
        assert_eq!(ctx.list_locks().await.unwrap().len(), 1);

        cmd_unlock(&ctx, args("prod", false)).await.unwrap();
        assert!(ctx.list_locks().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_lock_held_by_other_client_fails_with_holder() {
        let store = Arc::new(MemoryStore::new());
        let bob = lock_context(store.clone(), "bob");
        let held = bob.mutex().chef_environment("prod").build().unwrap();
        assert!(held.lock().await.unwrap());

        let ctx = context(store, "alice");
        let err = cmd_lock(&ctx, args("prod", false)).await.unwrap_err();

        assert_eq!(err.exit_code(), crate::exit_codes::LOCK_FAILURE);
        assert!(err.to_string().starts_with("Resource environment-prod locked by bob"));
    }

    #[tokio::test]
    async fn test_unlock_not_locked_is_ok() {
        let ctx = context(Arc::new(MemoryStore::new()), "alice");
        cmd_unlock(&ctx, args("prod", false)).await.unwrap();
    }

    #[tokio::test]
    async fn test_unlock_other_process_suggests_force() {
        let store = Arc::new(MemoryStore::new());
        let earlier = foreign_lock_context(store.clone(), "alice");
        let held = earlier.mutex().chef_environment("prod").build().unwrap();
        assert!(held.lock().await.unwrap());

        let ctx = context(store, "alice");
        let err = cmd_unlock(&ctx, args("prod", false)).await.unwrap_err();
        assert!(matches!(err, MbError::ResourceLocked(_)));
        assert!(err.to_string().contains("mb unlock prod --force"));

        cmd_unlock(&ctx, args("prod", true)).await.unwrap();
        assert!(ctx.list_locks().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_render_locks() {
        assert_eq!(render_locks(&[], 60), "No locks held.\n");

        let store = Arc::new(MemoryStore::new());
        let ctx = context(store, "alice");
        cmd_lock(&ctx, args("prod", false)).await.unwrap();

        let rendered = render_locks(&ctx.list_locks().await.unwrap(), 60);
        assert!(rendered.starts_with("Locks (1):\n  environment-prod (owner: alice"));
        assert!(!rendered.contains("Note:"));
    }
}
