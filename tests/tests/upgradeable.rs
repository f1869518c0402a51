use deploy_scripts::{
    deployer::ContractDeployer,
    errors::DeployError,
    plan::{run_plan, RunOptions},
    testing::{FakeChain, MemoryArtifactStore},
    types::ResolvedArg,
};
use eyre::Result;
use tests::{
    plans::box_plan,
    utils::{recorded, setup_context},
};

#[tokio::test]
async fn test_initializer_runs_once() -> Result<()> {
    let store = MemoryArtifactStore::default();
    let ctx = setup_context("dev", true, None, FakeChain::new())?;

    let report = run_plan(&box_plan(), &ctx, &store, &RunOptions::default()).await?;
    assert_eq!(report.records.len(), 1);

    // The implementation, then the proxy pointing at it, constructed with the
    // initializer's arguments
    let deployments = ctx.client.deployments_of("Box");
    assert_eq!(deployments.len(), 2);
    let (implementation, proxy) = (&deployments[0], &deployments[1]);
    assert!(implementation.args.is_empty());
    assert_eq!(proxy.implementation, Some(implementation.address));
    assert_eq!(
        proxy.args,
        [
            ResolvedArg::Address(implementation.address),
            ResolvedArg::Literal("43".to_string()),
        ]
    );

    // No separate initialization transaction follows the proxy's creation
    assert_eq!(ctx.client.transaction_count(), 2);

    // The proxy is the canonical address
    let box_address = recorded(&store, "dev", "Box")?;
    assert_eq!(box_address, proxy.address);
    assert_eq!(ctx.client.init_calls(), [("Box".to_string(), box_address)]);

    let err = ctx
        .client
        .initialize(
            "Box",
            box_address,
            "initialize",
            &[ResolvedArg::Literal("43".to_string())],
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DeployError::AlreadyInitialized { proxy, .. } if proxy == box_address
    ));
    assert_eq!(ctx.client.init_calls().len(), 1);
    assert_eq!(ctx.client.transaction_count(), 2);

    Ok(())
}

#[tokio::test]
async fn test_redeploy_initializes_fresh_proxy() -> Result<()> {
    let store = MemoryArtifactStore::default();
    let ctx = setup_context("dev", true, None, FakeChain::new())?;

    run_plan(&box_plan(), &ctx, &store, &RunOptions::default()).await?;
    let first = recorded(&store, "dev", "Box")?;
    run_plan(&box_plan(), &ctx, &store, &RunOptions::default()).await?;
    let second = recorded(&store, "dev", "Box")?;

    assert_ne!(first, second);
    let proxies: Vec<_> = ctx.client.init_calls().into_iter().map(|(_, p)| p).collect();
    assert_eq!(proxies, [first, second]);

    Ok(())
}
