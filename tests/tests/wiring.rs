use deploy_scripts::{
    errors::DeployError,
    plan::{run_plan, DeploymentPlan, PlanStep, RunOptions},
    testing::{FakeChain, MemoryArtifactStore},
    types::{DeploymentStep, ExecutionContext, SignerSource, WiringStep},
    wiring,
};
use eyre::Result;
use tests::{
    plans::{literal, market_plan, reference},
    utils::{global_setup, seed_external_contracts, setup_context, KODA_OWNER, OPERATOR},
};

/// Deploy a token and a sale, then grant the sale the minter role and open it
fn sale_plan(grant_first: bool) -> DeploymentPlan {
    let grant = PlanStep::Wire(WiringStep::new(
        "Token",
        "grantMinter(address)",
        vec![reference("Sale")],
    ));
    let open = PlanStep::Wire(WiringStep::new(
        "Token",
        "openSale(address,uint256)",
        vec![reference("Sale"), literal("100")],
    ));
    let wiring = if grant_first {
        vec![grant, open]
    } else {
        vec![open, grant]
    };

    let mut steps = vec![
        PlanStep::Deploy(DeploymentStep::direct("Token", vec![])),
        PlanStep::Deploy(DeploymentStep::direct("Sale", vec![reference("Token")])),
    ];
    steps.extend(wiring);
    DeploymentPlan::new("sale", steps)
}

#[tokio::test]
async fn test_wiring_runs_in_declared_order() -> Result<()> {
    let chain = || FakeChain::new().require_before("openSale", "grantMinter");

    let store = MemoryArtifactStore::default();
    let ctx = setup_context("dev", true, None, chain())?;
    let report = run_plan(&sale_plan(true), &ctx, &store, &RunOptions::default()).await?;
    let methods: Vec<_> = report.receipts.iter().map(|r| r.method.as_str()).collect();
    assert_eq!(methods, ["grantMinter(address)", "openSale(address,uint256)"]);

    let store = MemoryArtifactStore::default();
    let ctx = setup_context("dev", true, None, chain())?;
    let err = run_plan(&sale_plan(false), &ctx, &store, &RunOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, DeployError::StepFailed { index: 2, .. }));
    assert!(matches!(
        err.root(),
        DeployError::WiringFailed { contract, method, .. }
            if contract == "Token" && method == "openSale(address,uint256)"
    ));
    // The grant after the failing call never ran
    assert!(ctx.client.calls().is_empty());

    Ok(())
}

#[tokio::test]
async fn test_reverting_call_is_reported() -> Result<()> {
    let store = MemoryArtifactStore::default();
    let ctx = setup_context(
        "dev",
        true,
        None,
        FakeChain::new().revert_method("setAccessControl"),
    )?;

    let err = run_plan(&market_plan(), &ctx, &store, &RunOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, DeployError::StepFailed { index: 2, .. }));
    assert!(matches!(err.root(), DeployError::WiringFailed { .. }));

    Ok(())
}

// -----------------
// | IMPERSONATION |
// -----------------

#[test]
fn test_impersonation_refused_outside_forks() {
    global_setup();
    let res = ExecutionContext::new(
        "mainnet".into(),
        false, /* fork */
        OPERATOR,
        Some(KODA_OWNER),
        FakeChain::new(),
    );

    assert!(matches!(
        res,
        Err(DeployError::ImpersonationRefused { network, account })
            if network.as_str() == "mainnet" && account == KODA_OWNER
    ));
}

#[tokio::test]
async fn test_required_signer_refused_on_mainnet() -> Result<()> {
    let store = MemoryArtifactStore::default();
    seed_external_contracts(&store, "mainnet")?;
    let ctx = setup_context("mainnet", false, None, FakeChain::new())?;
    let grant = WiringStep {
        required_signer: Some(KODA_OWNER),
        ..WiringStep::new(
            "SelfServiceFrequencyControls",
            "addAddressToWhitelist(address)",
            vec![reference("KnownOriginDigitalAssetV2")],
        )
    };
    let plan = DeploymentPlan::new("grant", vec![PlanStep::Wire(grant)]);

    let err = run_plan(&plan, &ctx, &store, &RunOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(
        err.root(),
        DeployError::ImpersonationRefused { account, .. } if *account == KODA_OWNER
    ));
    assert!(ctx.client.impersonated().is_empty());
    assert_eq!(ctx.client.transaction_count(), 0);

    Ok(())
}

#[tokio::test]
async fn test_context_impersonation_on_fork() -> Result<()> {
    let store = MemoryArtifactStore::default();
    let ctx = setup_context("kovan_fork", true, Some(KODA_OWNER), FakeChain::new())?;

    let report = run_plan(&market_plan(), &ctx, &store, &RunOptions::default()).await?;

    // Deployments are always sent by the operator, wiring by the impersonated account
    assert_eq!(report.receipts[0].signer, KODA_OWNER);
    assert_eq!(ctx.client.calls()[0].signer, SignerSource::Impersonated(KODA_OWNER));
    assert_eq!(ctx.client.impersonated(), [KODA_OWNER]);

    Ok(())
}

#[tokio::test]
async fn test_execute_single_step() -> Result<()> {
    let store = MemoryArtifactStore::default();
    let ctx = setup_context("dev", true, None, FakeChain::new())?;
    run_plan(&market_plan(), &ctx, &store, &RunOptions::default()).await?;

    let step = WiringStep::new("Market", "pause()", vec![]);
    let receipt = wiring::execute(&step, &ctx, &store, SignerSource::Default).await?;

    assert_eq!(receipt.signer, OPERATOR);
    assert_eq!(receipt.target, "Market");
    assert_eq!(ctx.client.calls().last().map(|c| c.method.as_str()), Some("pause()"));

    Ok(())
}
