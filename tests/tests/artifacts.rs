use std::fs;

use alloy::primitives::Address;
use deploy_scripts::{
    artifacts::{artifact_path, ArtifactStore, FileArtifactStore},
    errors::DeployError,
    plan::{run_plan, RunOptions},
    testing::FakeChain,
    types::{NetworkId, OverwritePolicy, ResolvedArg},
};
use eyre::Result;
use tempfile::tempdir;
use tests::{
    plans::market_plan,
    utils::{recorded, setup_context},
};

#[tokio::test]
async fn test_run_writes_record_files() -> Result<()> {
    let dir = tempdir()?;
    let store = FileArtifactStore::new(dir.path(), OverwritePolicy::Overwrite);
    let ctx = setup_context("dev", true, None, FakeChain::new())?;

    run_plan(&market_plan(), &ctx, &store, &RunOptions::default()).await?;

    let path = artifact_path(dir.path(), &NetworkId::from("dev"), "AccessControl")?;
    assert_eq!(path.file_name().unwrap(), "AccessControl.dev.json");

    let record: serde_json::Value = serde_json::from_str(&fs::read_to_string(path)?)?;
    assert_eq!(record["contractName"], "AccessControl");
    assert_eq!(record["network"], "dev");
    assert_eq!(
        record["address"].as_str().unwrap().parse::<Address>()?,
        recorded(&store, "dev", "AccessControl")?
    );
    assert!(record["deployedAt"].is_string());
    assert_eq!(record["args"], serde_json::json!([]));

    let market = fs::read_to_string(artifact_path(
        dir.path(),
        &NetworkId::from("dev"),
        "Market",
    )?)?;
    let market: serde_json::Value = serde_json::from_str(&market)?;
    assert_eq!(
        market["args"][0].as_str().unwrap().parse::<Address>()?,
        recorded(&store, "dev", "AccessControl")?
    );

    // Only the two records, no leftover temporary files
    assert_eq!(fs::read_dir(dir.path())?.count(), 2);

    Ok(())
}

#[tokio::test]
async fn test_address_only_records_resolve() -> Result<()> {
    let dir = tempdir()?;
    let access = Address::with_last_byte(0x77);
    fs::write(
        dir.path().join("AccessControl.dev.json"),
        format!(r#"{{ "address": "{access:#x}" }}"#),
    )?;

    let store = FileArtifactStore::new(dir.path(), OverwritePolicy::Overwrite);
    let ctx = setup_context("dev", true, None, FakeChain::new())?;
    let from_market = RunOptions {
        from_step: Some(1),
        ..Default::default()
    };
    run_plan(&market_plan(), &ctx, &store, &from_market).await?;

    assert_eq!(ctx.client.calls()[0].args, [ResolvedArg::Address(access)]);
    assert_eq!(
        ctx.client.deployments_of("Market")[0].args,
        [ResolvedArg::Address(access)]
    );

    Ok(())
}

#[tokio::test]
async fn test_reject_policy_keeps_first_record() -> Result<()> {
    let dir = tempdir()?;
    let store = FileArtifactStore::new(dir.path(), OverwritePolicy::Reject);
    let ctx = setup_context("dev", true, None, FakeChain::new())?;

    run_plan(&market_plan(), &ctx, &store, &RunOptions::default()).await?;
    let first = recorded(&store, "dev", "AccessControl")?;
    let sent = ctx.client.transaction_count();

    let err = run_plan(&market_plan(), &ctx, &store, &RunOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err.root(), DeployError::RecordExists { .. }));
    assert_eq!(recorded(&store, "dev", "AccessControl")?, first);
    assert_eq!(ctx.client.transaction_count(), sent);

    Ok(())
}

#[test]
fn test_direct_write_under_reject() -> Result<()> {
    let dir = tempdir()?;
    let store = FileArtifactStore::new(dir.path(), OverwritePolicy::Reject);
    let network = NetworkId::from("dev");

    store.write(&network, "Box", Address::with_last_byte(1))?;
    let err = store
        .write(&network, "Box", Address::with_last_byte(2))
        .unwrap_err();

    assert!(matches!(err, DeployError::RecordExists { .. }));
    assert_eq!(store.read(&network, "Box")?.address, Address::with_last_byte(1));

    Ok(())
}
