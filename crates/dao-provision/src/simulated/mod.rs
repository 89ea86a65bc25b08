//! Simulated capability gateway.
//!
//! An in-memory chain that implements [`CapabilityGateway`] for development
//! and tests. It models only the behaviour the pipeline relies on: address
//! derivation, the controller's scheme table and generic calls, owner- and
//! minter-gated mutators, `start()` preconditions, reserve buys, UBI claims
//! and voting parameter tables. Every rejected call is a revert with a
//! reason, as on a real chain.

mod economy;
mod governance;
mod org;
mod ubi;

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::context::SignerSet;
use crate::gateway::{CapabilityGateway, GatewayError, GatewayResult, UnitKind};
use crate::types::{Address, ParamsHash, PermissionFlags, Value};

use economy::{Contribution, FundManager, MarketMaker, Reserve, Staking};
use governance::{ProposalScheme, VotingMachine};
use org::{Avatar, Controller, Factory, FeeFormula, Identity, Token};
use ubi::{FirstClaimPool, UbiScheme};

const SECONDS_PER_DAY: u64 = 86_400;

/// In-memory chain implementing the capability gateway.
#[derive(Clone)]
pub struct SimulatedChain {
    state: Arc<Mutex<ChainState>>,
}

impl SimulatedChain {
    /// Creates a chain whose clock starts at the current wall time.
    #[must_use]
    pub fn new() -> Self {
        let now = u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default();
        Self::with_clock(now)
    }

    /// Creates a chain whose clock starts at `now` (unix seconds).
    #[must_use]
    pub fn with_clock(now: u64) -> Self {
        Self {
            state: Arc::new(Mutex::new(ChainState {
                now,
                nonces: HashMap::new(),
                units: HashMap::new(),
            })),
        }
    }

    /// Deterministic externally-owned account `index`.
    #[must_use]
    pub fn account(index: u32) -> Address {
        Address::derive(&[b"account", &index.to_be_bytes()])
    }

    /// Signer set with `founders` founder accounts.
    ///
    /// The first founder doubles as deployer; the operator is a separate
    /// account that the bootstrap stage seeds as a scheme.
    #[must_use]
    pub fn signers(founders: u32) -> SignerSet {
        SignerSet {
            deployer: Self::account(0),
            operator: Self::account(u32::MAX),
            founders: (0..founders.max(1)).map(Self::account).collect(),
        }
    }

    /// Current chain time.
    pub async fn now(&self) -> u64 {
        self.state.lock().await.now
    }

    /// Moves the clock forward.
    pub async fn advance_time(&self, seconds: u64) {
        let mut state = self.state.lock().await;
        state.now = state.now.saturating_add(seconds);
        debug!(now = state.now, seconds, "simulated clock advanced");
    }

    /// Number of deployed units, including ones created by the factory.
    pub async fn unit_count(&self) -> usize {
        self.state.lock().await.units.len()
    }

    /// Artifact label of the unit at `address`, if any.
    pub async fn unit_label(&self, address: Address) -> Option<&'static str> {
        self.state.lock().await.units.get(&address).map(Unit::label)
    }
}

impl Default for SimulatedChain {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SimulatedChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedChain").finish_non_exhaustive()
    }
}

impl CapabilityGateway for SimulatedChain {
    async fn deploy(&self, from: Address, unit: UnitKind, args: Vec<Value>) -> GatewayResult<Address> {
        let mut state = self.state.lock().await;
        let result = state.deploy(from, unit, &args);
        if let Err(e) = &result {
            debug!(%unit, error = %e, "simulated deployment reverted");
        }
        result
    }

    async fn call(
        &self,
        from: Address,
        target: Address,
        method: &str,
        args: Vec<Value>,
    ) -> GatewayResult<Value> {
        let mut state = self.state.lock().await;
        let result = state.execute(from, target, method, &args);
        if let Err(e) = &result {
            debug!(%target, method, error = %e, "simulated call reverted");
        }
        result
    }
}

/// A deployed unit.
#[derive(Debug)]
enum Unit {
    Token(Token),
    Identity(Identity),
    FeeFormula(FeeFormula),
    FoundersHelper,
    Factory(Factory),
    Avatar(Avatar),
    Controller(Controller),
    Contribution(Contribution),
    FundManager(FundManager),
    MarketMaker(MarketMaker),
    Reserve(Reserve),
    Staking(Staking),
    VotingMachine(VotingMachine),
    SchemeRegistrar(ProposalScheme),
    UpgradeScheme(ProposalScheme),
    FirstClaimPool(FirstClaimPool),
    UbiScheme(UbiScheme),
}

impl Unit {
    const fn label(&self) -> &'static str {
        match self {
            Self::Token(_) => "Token",
            Self::Identity(_) => "Identity",
            Self::FeeFormula(_) => "FeeFormula",
            Self::FoundersHelper => "AddFounders",
            Self::Factory(_) => "DaoCreator",
            Self::Avatar(_) => "Avatar",
            Self::Controller(_) => "Controller",
            Self::Contribution(_) => "ContributionCalculation",
            Self::FundManager(_) => "FundManager",
            Self::MarketMaker(_) => "MarketMaker",
            Self::Reserve(_) => "Reserve",
            Self::Staking(_) => "Staking",
            Self::VotingMachine(_) => "AbsoluteVote",
            Self::SchemeRegistrar(_) => "SchemeRegistrar",
            Self::UpgradeScheme(_) => "UpgradeScheme",
            Self::FirstClaimPool(_) => "FirstClaimPool",
            Self::UbiScheme(_) => "UBIScheme",
        }
    }
}

/// One method invocation on a unit.
struct Call<'a> {
    sender: Address,
    this: Address,
    method: &'a str,
    args: Args<'a>,
}

impl Call<'_> {
    fn unknown(&self, label: &str) -> GatewayError {
        GatewayError::revert(format!("{label}: unknown method {}", self.method))
    }
}

type Handler = fn(&mut ChainState, &Call<'_>) -> GatewayResult<Value>;

/// Positional argument reader.
#[derive(Clone, Copy)]
struct Args<'a> {
    context: &'a str,
    values: &'a [Value],
}

impl<'a> Args<'a> {
    const fn new(context: &'a str, values: &'a [Value]) -> Self {
        Self { context, values }
    }

    fn get(&self, index: usize, expected: &str) -> GatewayResult<&'a Value> {
        self.values.get(index).ok_or_else(|| {
            GatewayError::revert(format!(
                "{}: missing argument {index} ({expected})",
                self.context
            ))
        })
    }

    fn mismatch(&self, index: usize, expected: &str, actual: &Value) -> GatewayError {
        GatewayError::revert(format!(
            "{}: argument {index} must be {expected}, got {}",
            self.context,
            actual.type_name()
        ))
    }

    fn address(&self, index: usize) -> GatewayResult<Address> {
        match self.get(index, "address")? {
            Value::Address(a) => Ok(*a),
            other => Err(self.mismatch(index, "address", other)),
        }
    }

    fn uint(&self, index: usize) -> GatewayResult<u128> {
        match self.get(index, "uint")? {
            Value::Uint(v) => Ok(*v),
            other => Err(self.mismatch(index, "uint", other)),
        }
    }

    fn hash(&self, index: usize) -> GatewayResult<ParamsHash> {
        match self.get(index, "hash")? {
            Value::Hash(h) => Ok(*h),
            other => Err(self.mismatch(index, "hash", other)),
        }
    }

    fn string(&self, index: usize) -> GatewayResult<&'a str> {
        match self.get(index, "string")? {
            Value::Str(s) => Ok(s),
            other => Err(self.mismatch(index, "string", other)),
        }
    }

    fn bytes(&self, index: usize) -> GatewayResult<&'a [u8]> {
        match self.get(index, "bytes")? {
            Value::Bytes(b) => Ok(b),
            other => Err(self.mismatch(index, "bytes", other)),
        }
    }

    fn flags(&self, index: usize) -> GatewayResult<PermissionFlags> {
        match self.get(index, "flags")? {
            Value::Flags(f) => Ok(*f),
            other => Err(self.mismatch(index, "flags", other)),
        }
    }

    fn addresses(&self, index: usize) -> GatewayResult<&'a [Address]> {
        match self.get(index, "address[]")? {
            Value::Addresses(list) => Ok(list),
            other => Err(self.mismatch(index, "address[]", other)),
        }
    }

    fn uints(&self, index: usize) -> GatewayResult<&'a [u128]> {
        match self.get(index, "uint[]")? {
            Value::Uints(list) => Ok(list),
            other => Err(self.mismatch(index, "uint[]", other)),
        }
    }

    fn hashes(&self, index: usize) -> GatewayResult<&'a [ParamsHash]> {
        match self.get(index, "hash[]")? {
            Value::Hashes(list) => Ok(list),
            other => Err(self.mismatch(index, "hash[]", other)),
        }
    }

    fn u32(&self, index: usize) -> GatewayResult<u32> {
        let value = self.uint(index)?;
        u32::try_from(value).map_err(|_| {
            GatewayError::revert(format!("{}: argument {index} overflows u32", self.context))
        })
    }

    fn u64(&self, index: usize) -> GatewayResult<u64> {
        let value = self.uint(index)?;
        u64::try_from(value).map_err(|_| {
            GatewayError::revert(format!("{}: argument {index} overflows u64", self.context))
        })
    }
}

fn require(condition: bool, reason: impl Into<String>) -> GatewayResult<()> {
    if condition {
        Ok(())
    } else {
        Err(GatewayError::revert(reason))
    }
}

macro_rules! unit_accessors {
    ($($get:ident $(, $get_mut:ident)? => $variant:ident($ty:ty);)*) => {
        $(
            fn $get(&self, address: Address) -> GatewayResult<&$ty> {
                match self.units.get(&address) {
                    Some(Unit::$variant(inner)) => Ok(inner),
                    Some(other) => Err(GatewayError::revert(format!(
                        "{address} is a {}, not a {}",
                        other.label(),
                        stringify!($variant)
                    ))),
                    None => Err(GatewayError::revert(format!("no unit at {address}"))),
                }
            }

            $(
                fn $get_mut(&mut self, address: Address) -> GatewayResult<&mut $ty> {
                    match self.units.get_mut(&address) {
                        Some(Unit::$variant(inner)) => Ok(inner),
                        Some(other) => Err(GatewayError::revert(format!(
                            "{address} is a {}, not a {}",
                            other.label(),
                            stringify!($variant)
                        ))),
                        None => Err(GatewayError::revert(format!("no unit at {address}"))),
                    }
                }
            )?
        )*
    };
}

/// Everything the simulated chain knows.
#[derive(Debug)]
struct ChainState {
    now: u64,
    nonces: HashMap<Address, u64>,
    units: HashMap<Address, Unit>,
}

impl ChainState {
    unit_accessors! {
        token, token_mut => Token(Token);
        identity, identity_mut => Identity(Identity);
        factory, factory_mut => Factory(Factory);
        avatar => Avatar(Avatar);
        controller, controller_mut => Controller(Controller);
        fund_manager, fund_manager_mut => FundManager(FundManager);
        market_maker, market_maker_mut => MarketMaker(MarketMaker);
        reserve, reserve_mut => Reserve(Reserve);
        staking, staking_mut => Staking(Staking);
        voting_machine, voting_machine_mut => VotingMachine(VotingMachine);
        first_claim_pool, first_claim_pool_mut => FirstClaimPool(FirstClaimPool);
        ubi_scheme, ubi_scheme_mut => UbiScheme(UbiScheme);
    }

    /// Address of the next unit created by `creator`.
    fn create_address(&mut self, creator: Address) -> Address {
        let nonce = self.nonces.entry(creator).or_insert(0);
        let address = Address::derive(&[b"create", creator.as_bytes(), &nonce.to_be_bytes()]);
        *nonce += 1;
        address
    }

    fn is_unit(&self, address: Address) -> bool {
        self.units.contains_key(&address)
    }

    fn deploy(&mut self, from: Address, kind: UnitKind, values: &[Value]) -> GatewayResult<Address> {
        let args = Args::new(kind.artifact(), values);
        let unit = match kind {
            UnitKind::CollateralToken => Unit::Token(Token::open(args.string(0)?, None)),
            UnitKind::YieldToken => {
                let underlying = args.address(0)?;
                self.token(underlying)?;
                Unit::Token(Token::open("cDAI", Some(underlying)))
            }
            UnitKind::Identity => Unit::Identity(Identity::new(from)),
            UnitKind::FeeFormula => Unit::FeeFormula(FeeFormula { fee: args.uint(0)? }),
            UnitKind::FoundersHelper => Unit::FoundersHelper,
            UnitKind::OrganizationFactory => Unit::Factory(Factory::construct(self, args)?),
            UnitKind::ContributionCalculation => {
                Unit::Contribution(Contribution::construct(self, args)?)
            }
            UnitKind::FundManager => Unit::FundManager(FundManager::construct(self, args)?),
            UnitKind::MarketMaker => Unit::MarketMaker(MarketMaker::construct(self, from, args)?),
            UnitKind::Reserve => Unit::Reserve(Reserve::construct(self, args)?),
            UnitKind::Staking => Unit::Staking(Staking::construct(self, args)?),
            UnitKind::VotingMachine => Unit::VotingMachine(VotingMachine::default()),
            UnitKind::SchemeRegistrar => Unit::SchemeRegistrar(ProposalScheme::default()),
            UnitKind::UpgradeScheme => Unit::UpgradeScheme(ProposalScheme::default()),
            UnitKind::FirstClaimPool => Unit::FirstClaimPool(FirstClaimPool::construct(self, args)?),
            UnitKind::UbiScheme => Unit::UbiScheme(UbiScheme::construct(self, args)?),
        };
        let address = self.create_address(from);
        self.units.insert(address, unit);
        Ok(address)
    }

    fn execute(
        &mut self,
        sender: Address,
        target: Address,
        method: &str,
        values: &[Value],
    ) -> GatewayResult<Value> {
        let handler: Handler = match self.units.get(&target) {
            Some(Unit::Token(_)) => org::token_call,
            Some(Unit::Identity(_)) => org::identity_call,
            Some(Unit::FeeFormula(_)) => org::fee_formula_call,
            Some(Unit::Factory(_)) => org::factory_call,
            Some(Unit::Avatar(_)) => org::avatar_call,
            Some(Unit::Controller(_)) => org::controller_call,
            Some(Unit::Contribution(_)) => economy::contribution_call,
            Some(Unit::FundManager(_)) => economy::fund_manager_call,
            Some(Unit::MarketMaker(_)) => economy::market_maker_call,
            Some(Unit::Reserve(_)) => economy::reserve_call,
            Some(Unit::Staking(_)) => economy::staking_call,
            Some(Unit::VotingMachine(_)) => governance::voting_machine_call,
            Some(Unit::SchemeRegistrar(_)) => governance::scheme_registrar_call,
            Some(Unit::UpgradeScheme(_)) => governance::upgrade_scheme_call,
            Some(Unit::FirstClaimPool(_)) => ubi::first_claim_pool_call,
            Some(Unit::UbiScheme(_)) => ubi::ubi_scheme_call,
            Some(Unit::FoundersHelper) => {
                return Err(GatewayError::revert(format!("AddFounders: unknown method {method}")));
            }
            None => return Err(GatewayError::revert(format!("no unit at {target}"))),
        };
        let call = Call {
            sender,
            this: target,
            method,
            args: Args::new(method, values),
        };
        handler(self, &call)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_target_reverts() {
        let chain = SimulatedChain::with_clock(1_000);
        let result = chain
            .call(SimulatedChain::account(0), Address::from_bytes([7; 20]), "start", Vec::new())
            .await;
        assert!(matches!(result, Err(GatewayError::Revert { .. })));
    }

    #[tokio::test]
    async fn deploy_derives_distinct_addresses() {
        let chain = SimulatedChain::with_clock(1_000);
        let deployer = SimulatedChain::account(0);
        let a = chain
            .deploy(deployer, UnitKind::CollateralToken, vec![Value::from("DAI")])
            .await
            .expect("deploy DAI");
        let b = chain
            .deploy(deployer, UnitKind::CollateralToken, vec![Value::from("COMP")])
            .await
            .expect("deploy COMP");
        assert_ne!(a, b);
        assert_eq!(chain.unit_count().await, 2);
        assert_eq!(chain.unit_label(a).await, Some("Token"));
    }

    #[tokio::test]
    async fn constructor_argument_types_are_checked() {
        let chain = SimulatedChain::with_clock(1_000);
        let result = chain
            .deploy(SimulatedChain::account(0), UnitKind::FeeFormula, vec![Value::from("zero")])
            .await;
        let reason = result.err().map(|e| e.reason().to_string()).unwrap_or_default();
        assert!(reason.contains("must be uint"), "{reason}");
    }

    #[tokio::test]
    async fn unknown_method_reverts() {
        let chain = SimulatedChain::with_clock(1_000);
        let deployer = SimulatedChain::account(0);
        let formula = chain
            .deploy(deployer, UnitKind::FeeFormula, vec![Value::Uint(0)])
            .await
            .expect("deploy");
        let result = chain.call(deployer, formula, "selfDestruct", Vec::new()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn clock_advances() {
        let chain = SimulatedChain::with_clock(1_000);
        chain.advance_time(500).await;
        assert_eq!(chain.now().await, 1_500);
    }

    #[test]
    fn signers_are_distinct_accounts() {
        let signers = SimulatedChain::signers(3);
        assert_eq!(signers.founders.len(), 3);
        assert_eq!(signers.founders[0], signers.deployer);
        assert!(!signers.founders.contains(&signers.operator));
    }
}
