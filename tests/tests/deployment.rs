use deploy_scripts::{
    errors::DeployError,
    plan::{run_plan, DeploymentPlan, PlanStep, RedeployPolicy, RunOptions},
    testing::{FakeChain, MemoryArtifactStore},
    types::{DeploymentStep, ResolvedArg, SignerSource},
};
use eyre::Result;
use tests::{
    plans::{market_plan, reference, release_plan, release_plan_path},
    utils::{
        configured_context, recorded, seed_external_contracts, setup_context, KODA_OWNER,
        OPERATOR,
    },
};

// ---------------------
// | DEPENDENCY ORDER |
// ---------------------

#[tokio::test]
async fn test_dependent_deploy_and_wiring() -> Result<()> {
    let store = MemoryArtifactStore::default();
    let ctx = setup_context("dev", true, None, FakeChain::new())?;

    let report = run_plan(&market_plan(), &ctx, &store, &RunOptions::default()).await?;
    assert_eq!(report.records.len(), 2);
    assert_eq!(report.receipts.len(), 1);
    assert_eq!(ctx.client.calls().len(), 1);

    let access = recorded(&store, "dev", "AccessControl")?;
    let market = recorded(&store, "dev", "Market")?;
    assert_ne!(access, market);
    assert_eq!(
        ctx.client.deployments_of("Market")[0].args,
        vec![ResolvedArg::Address(access)]
    );

    let call = &ctx.client.calls()[0];
    assert_eq!(call.target, market);
    assert_eq!(call.args, vec![ResolvedArg::Address(access)]);

    Ok(())
}

#[tokio::test]
async fn test_rerun_deploys_new_instances() -> Result<()> {
    let store = MemoryArtifactStore::default();
    let ctx = setup_context("dev", true, None, FakeChain::new())?;

    run_plan(&market_plan(), &ctx, &store, &RunOptions::default()).await?;
    let first = recorded(&store, "dev", "Market")?;
    run_plan(&market_plan(), &ctx, &store, &RunOptions::default()).await?;
    let second = recorded(&store, "dev", "Market")?;

    assert_eq!(ctx.client.deployments().len(), 4);
    assert_ne!(first, second);
    // The second wiring call targets the new instance
    assert_eq!(ctx.client.calls()[1].target, second);

    Ok(())
}

#[tokio::test]
async fn test_unresolved_dependency_sends_nothing() -> Result<()> {
    let store = MemoryArtifactStore::default();
    let ctx = setup_context("dev", true, None, FakeChain::new())?;
    let plan = DeploymentPlan::new(
        "market-only",
        vec![PlanStep::Deploy(DeploymentStep::direct(
            "Market",
            vec![reference("AccessControl")],
        ))],
    );

    let err = run_plan(&plan, &ctx, &store, &RunOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(
        err.root(),
        DeployError::UnresolvedDependency { contract, network }
            if contract == "AccessControl" && network.as_str() == "dev"
    ));
    assert_eq!(ctx.client.transaction_count(), 0);
    assert!(store.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_records_are_scoped_by_network() -> Result<()> {
    let store = MemoryArtifactStore::default();
    let dev = setup_context("dev", true, None, FakeChain::new())?;
    run_plan(&market_plan(), &dev, &store, &RunOptions::default()).await?;

    // Only the wiring step, on a network where nothing was deployed
    let fork = setup_context("kovan_fork", true, None, FakeChain::new())?;
    let wiring_only = RunOptions {
        from_step: Some(2),
        ..Default::default()
    };
    let err = run_plan(&market_plan(), &fork, &store, &wiring_only)
        .await
        .unwrap_err();

    assert!(matches!(
        err.root(),
        DeployError::UnresolvedDependency { network, .. } if network.as_str() == "kovan_fork"
    ));
    assert_eq!(fork.client.transaction_count(), 0);

    Ok(())
}

// --------------------
// | FAILURE HANDLING |
// --------------------

#[tokio::test]
async fn test_failure_stops_the_run() -> Result<()> {
    let store = MemoryArtifactStore::default();
    let ctx = setup_context("dev", true, None, FakeChain::new().fail_deploy("Market"))?;

    let err = run_plan(&market_plan(), &ctx, &store, &RunOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, DeployError::StepFailed { index: 1, .. }));
    assert!(matches!(
        err.root(),
        DeployError::DeploymentFailed { contract, .. } if contract == "Market"
    ));

    // Earlier records are kept, nothing after the failure ran
    assert!(recorded(&store, "dev", "AccessControl").is_ok());
    assert!(recorded(&store, "dev", "Market").is_err());
    assert!(ctx.client.calls().is_empty());

    Ok(())
}

// ----------------
// | RUN OPTIONS |
// ----------------

#[tokio::test]
async fn test_skip_existing_deploys_nothing_new() -> Result<()> {
    let store = MemoryArtifactStore::default();
    let ctx = setup_context("dev", true, None, FakeChain::new())?;
    let skip = RunOptions {
        redeploy: RedeployPolicy::SkipExisting,
        ..Default::default()
    };

    run_plan(&market_plan(), &ctx, &store, &skip).await?;
    let market = recorded(&store, "dev", "Market")?;
    let report = run_plan(&market_plan(), &ctx, &store, &skip).await?;

    assert!(report.records.is_empty());
    assert_eq!(report.skipped.len(), 2);
    assert_eq!(ctx.client.deployments().len(), 2);
    assert_eq!(recorded(&store, "dev", "Market")?, market);

    Ok(())
}

#[tokio::test]
async fn test_partial_run() -> Result<()> {
    let store = MemoryArtifactStore::default();
    let ctx = setup_context("dev", true, None, FakeChain::new())?;
    run_plan(&market_plan(), &ctx, &store, &RunOptions::default()).await?;

    let wiring_only = RunOptions {
        from_step: Some(2),
        to_step: Some(2),
        ..Default::default()
    };
    let report = run_plan(&market_plan(), &ctx, &store, &wiring_only).await?;

    assert!(report.records.is_empty());
    assert_eq!(report.receipts.len(), 1);
    assert_eq!(ctx.client.deployments().len(), 2);
    assert_eq!(ctx.client.calls().len(), 2);

    Ok(())
}

// -----------------
// | FULL RELEASE |
// -----------------

#[test]
fn test_release_plan_matches_checked_in_plan() -> Result<()> {
    let loaded = DeploymentPlan::load(release_plan_path())?;
    assert_eq!(loaded, release_plan());

    Ok(())
}

#[tokio::test]
async fn test_release_on_fork() -> Result<()> {
    let store = MemoryArtifactStore::default();
    seed_external_contracts(&store, "kovan_fork")?;
    let ctx = configured_context("kovan_fork", FakeChain::new())?;
    assert_eq!(ctx.signer_source, SignerSource::Impersonated(KODA_OWNER));

    let report = run_plan(&release_plan(), &ctx, &store, &RunOptions::default()).await?;

    let deployed: Vec<_> = report
        .records
        .iter()
        .map(|record| record.contract_name.as_str())
        .collect();
    assert_eq!(
        deployed,
        ["AccessControl", "CANFTMarket", "EditionCurationMinter", "Box"]
    );

    // The market is owned by the operator, who sends every deployment
    let market_args = &ctx.client.deployments_of("CANFTMarket")[0].args;
    assert_eq!(market_args[2], ResolvedArg::Address(OPERATOR));

    // Every wiring call goes through the owner configured for the fork
    let signers: Vec<_> = report.receipts.iter().map(|r| r.signer).collect();
    assert_eq!(signers, [KODA_OWNER, KODA_OWNER, KODA_OWNER]);
    assert_eq!(ctx.client.impersonated(), [KODA_OWNER, KODA_OWNER, KODA_OWNER]);

    Ok(())
}

#[tokio::test]
async fn test_release_on_dev_uses_the_operator() -> Result<()> {
    let store = MemoryArtifactStore::default();
    seed_external_contracts(&store, "dev")?;
    let ctx = configured_context("dev", FakeChain::new())?;
    assert_eq!(ctx.signer_source, SignerSource::Default);

    let report = run_plan(&release_plan(), &ctx, &store, &RunOptions::default()).await?;

    let signers: Vec<_> = report.receipts.iter().map(|r| r.signer).collect();
    assert_eq!(signers, [OPERATOR, OPERATOR, OPERATOR]);
    assert!(ctx
        .client
        .calls()
        .iter()
        .all(|call| call.signer == SignerSource::Default));
    assert!(ctx.client.impersonated().is_empty());

    Ok(())
}
