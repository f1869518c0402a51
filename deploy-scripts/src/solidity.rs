//! ABI encoding of constructor, initializer and wiring calls

use alloy::{
    dyn_abi::{DynSolType, DynSolValue, JsonAbiExt, Specifier},
    json_abi::{Function, JsonAbi, Param},
    primitives::{hex, Address, Bytes},
    sol,
};

use crate::{compiled::CompiledContract, errors::DeployError, types::ResolvedArg};

sol! {
    /// Raised by OpenZeppelin's `Initializable` when an initializer runs twice
    #[allow(missing_docs)]
    error InvalidInitialization();
}

/// Coerce resolved arguments to the types of the given ABI parameters
pub fn encode_values(
    params: &[Param],
    args: &[ResolvedArg],
) -> Result<Vec<DynSolValue>, DeployError> {
    if params.len() != args.len() {
        return Err(DeployError::CalldataConstruction(format!(
            "expected {} arguments, got {}",
            params.len(),
            args.len()
        )));
    }

    params
        .iter()
        .zip(args)
        .map(|(param, arg)| {
            let ty = param
                .resolve()
                .map_err(|e| DeployError::CalldataConstruction(e.to_string()))?;

            match (arg, &ty) {
                (ResolvedArg::Address(address), DynSolType::Address) => {
                    Ok(DynSolValue::Address(*address))
                }
                (ResolvedArg::Address(address), _) => {
                    Err(DeployError::CalldataConstruction(format!(
                        "cannot pass address {address:#x} as `{}` of type {ty}",
                        param.name
                    )))
                }
                (ResolvedArg::Literal(value), _) => ty.coerce_str(value).map_err(|e| {
                    DeployError::CalldataConstruction(format!(
                        "invalid value {value:?} for `{}` of type {ty}: {e}",
                        param.name
                    ))
                }),
            }
        })
        .collect()
}

/// Build the creation code of a contract: its bytecode followed by the encoded constructor args
pub fn creation_code(
    compiled: &CompiledContract,
    args: &[ResolvedArg],
) -> Result<Bytes, DeployError> {
    let encoded_args = match &compiled.abi.constructor {
        Some(constructor) => {
            let values = encode_values(&constructor.inputs, args)?;
            constructor
                .abi_encode_input(&values)
                .map_err(|e| DeployError::CalldataConstruction(e.to_string()))?
        }
        None if args.is_empty() => Vec::new(),
        None => {
            return Err(DeployError::CalldataConstruction(format!(
                "contract has no constructor but {} arguments were given",
                args.len()
            )))
        }
    };

    Ok([&compiled.bytecode[..], encoded_args.as_slice()]
        .concat()
        .into())
}

/// Build the creation code of a transparent upgradeable proxy
///
/// The proxy is constructed as `(implementation, admin, init_data)`, so the initializer
/// runs in the same transaction that creates the proxy.
pub fn proxy_creation_code(
    proxy: &CompiledContract,
    implementation: Address,
    admin: Address,
    init_data: &Bytes,
) -> Result<Bytes, DeployError> {
    creation_code(
        proxy,
        &[
            ResolvedArg::Address(implementation),
            ResolvedArg::Address(admin),
            ResolvedArg::Literal(hex::encode_prefixed(init_data)),
        ],
    )
}

/// Build the calldata for a method given its Solidity signature, e.g. `setAuction(address)`
pub fn method_calldata(signature: &str, args: &[ResolvedArg]) -> Result<Bytes, DeployError> {
    let function = Function::parse(signature)
        .map_err(|e| DeployError::CalldataConstruction(format!("{signature}: {e}")))?;
    function_calldata(&function, args)
}

/// Build the calldata for the initializer of an upgradeable contract
///
/// Overloads are disambiguated by the number of arguments.
pub fn initializer_calldata(
    abi: &JsonAbi,
    initializer: &str,
    args: &[ResolvedArg],
) -> Result<Bytes, DeployError> {
    let function = abi
        .function(initializer)
        .and_then(|overloads| overloads.iter().find(|f| f.inputs.len() == args.len()))
        .ok_or_else(|| {
            DeployError::CalldataConstruction(format!(
                "no `{initializer}` taking {} arguments in ABI",
                args.len()
            ))
        })?;

    function_calldata(function, args)
}

/// Encode a call to the given function
fn function_calldata(function: &Function, args: &[ResolvedArg]) -> Result<Bytes, DeployError> {
    let values = encode_values(&function.inputs, args)?;
    function
        .abi_encode_input(&values)
        .map(Bytes::from)
        .map_err(|e| DeployError::CalldataConstruction(e.to_string()))
}
