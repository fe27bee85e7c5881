use std::error::Error;

use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use engine::{
    AdjustBalanceCmd, AdjustPointsCmd, ApproveOrderCmd, BranchWalletSettingsCmd,
    CatalogProductCmd, CreateOrderCmd, EarningSource, Engine, EngineError, Money, OrderPayment,
    OrderStatus, PaymentMethod, PayoutMethod, Points, PointsCmd, ReceiveStockCmd,
    RecordEarningCmd, SettlementStatus, StockLocation, TopUpCmd, WalletOwner, WalletPaymentCmd,
};
use migration::{Migrator, MigratorTrait};
use serde::Serialize;
use uuid::Uuid;

mod settings;

type AppResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

#[derive(Parser, Debug)]
#[command(name = "trimledger")]
#[command(about = "Branch wallets, purchase orders, settlements and loyalty points")]
struct Cli {
    /// Settings file (TOML), `settings.toml` when omitted.
    #[arg(long)]
    config: Option<String>,
    /// Override the configured database URL.
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Branch and customer wallets.
    Wallet(Wallet),
    /// Central warehouse products and stock.
    Catalog(Catalog),
    /// Branch stock.
    Branch(Branch),
    /// Purchase orders from branches.
    Order(Order),
    /// Branch earnings.
    Earning(Earning),
    /// Payout settlements.
    Settlement(Settlement),
    /// Loyalty points.
    Points(PointsArgs),
    /// Loyalty tiers.
    Tiers(Tiers),
}

#[derive(Args, Debug)]
struct Wallet {
    #[command(subcommand)]
    command: WalletCommand,
}

#[derive(Subcommand, Debug)]
enum WalletCommand {
    Show {
        /// `branch:<id>` or `customer:<id>`.
        owner: WalletOwner,
    },
    History {
        owner: WalletOwner,
    },
    TopUp {
        owner: WalletOwner,
        amount: Money,
        #[arg(long)]
        actor: String,
        #[arg(long)]
        reference: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        idempotency_key: Option<String>,
    },
    Adjust {
        owner: WalletOwner,
        #[arg(allow_hyphen_values = true)]
        amount: Money,
        #[arg(long)]
        reason: String,
        #[arg(long)]
        actor: String,
        #[arg(long)]
        allow_negative: bool,
    },
    Reconcile {
        owner: WalletOwner,
    },
}

#[derive(Args, Debug)]
struct Catalog {
    #[command(subcommand)]
    command: CatalogCommand,
}

#[derive(Subcommand, Debug)]
enum CatalogCommand {
    Add {
        name: String,
        price: Money,
        #[arg(long)]
        cost: Option<Money>,
    },
    List {
        /// Include inactive products.
        #[arg(long)]
        all: bool,
    },
    Receive {
        product: Uuid,
        quantity: i64,
        #[arg(long)]
        actor: String,
        #[arg(long)]
        unit_cost: Option<Money>,
        #[arg(long)]
        supplier: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },
    Activate {
        product: Uuid,
    },
    Deactivate {
        product: Uuid,
    },
    Batches {
        product: Uuid,
        /// Branch lots instead of warehouse lots.
        #[arg(long)]
        branch: Option<String>,
    },
}

#[derive(Args, Debug)]
struct Branch {
    #[command(subcommand)]
    command: BranchCommand,
}

#[derive(Subcommand, Debug)]
enum BranchCommand {
    Products {
        branch: String,
    },
    Consume {
        product: Uuid,
        quantity: i64,
        #[arg(long)]
        reason: Option<String>,
    },
}

#[derive(Args, Debug)]
struct Order {
    #[command(subcommand)]
    command: OrderCommand,
}

#[derive(Subcommand, Debug)]
enum OrderCommand {
    Create {
        branch: String,
        #[arg(long)]
        actor: String,
        /// `<catalog product id>=<quantity>`, repeatable.
        #[arg(long = "item", value_parser = parse_line, required = true)]
        items: Vec<(Uuid, i64)>,
        #[arg(long)]
        notes: Option<String>,
        /// HQ-initiated order: no wallet hold.
        #[arg(long)]
        manual: bool,
        #[arg(long, requires = "manual")]
        auto_approve: bool,
        #[arg(long, requires = "manual", value_parser = parse_payment_method)]
        paid_with: Option<PaymentMethod>,
        #[arg(long, requires = "paid_with")]
        payment_reference: Option<String>,
    },
    Approve {
        order: Uuid,
        #[arg(long)]
        actor: String,
        /// `<catalog product id>=<approved quantity>`, repeatable.
        #[arg(long = "quantity", value_parser = parse_line)]
        quantities: Vec<(Uuid, i64)>,
    },
    Reject {
        order: Uuid,
        #[arg(long)]
        actor: String,
        #[arg(long)]
        reason: String,
    },
    Cancel {
        order: Uuid,
        #[arg(long)]
        actor: String,
        #[arg(long)]
        reason: Option<String>,
    },
    Ship {
        order: Uuid,
        #[arg(long)]
        actor: String,
    },
    Receive {
        order: Uuid,
        #[arg(long)]
        actor: String,
    },
    Pay {
        order: Uuid,
        #[arg(value_parser = parse_payment_method)]
        method: PaymentMethod,
        #[arg(long)]
        actor: String,
        #[arg(long)]
        reference: Option<String>,
    },
    Show {
        order: Uuid,
    },
    List {
        #[arg(long)]
        branch: Option<String>,
        #[arg(long, value_parser = parse_order_status)]
        status: Option<OrderStatus>,
    },
}

#[derive(Args, Debug)]
struct Earning {
    #[command(subcommand)]
    command: EarningCommand,
}

#[derive(Subcommand, Debug)]
enum EarningCommand {
    /// Record a payment collected outside the wallet.
    Record {
        branch: String,
        gross: Money,
        #[arg(long)]
        source_id: String,
        #[arg(long)]
        customer: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// A customer pays a branch from their wallet.
    PayWithWallet {
        customer: String,
        branch: String,
        amount: Money,
        #[arg(long)]
        source_id: String,
        #[arg(long)]
        actor: String,
    },
    Summary {
        branch: String,
    },
}

#[derive(Args, Debug)]
struct Settlement {
    #[command(subcommand)]
    command: SettlementCommand,
}

#[derive(Subcommand, Debug)]
enum SettlementCommand {
    /// Replace commission override and payout destination of a branch.
    Configure {
        branch: String,
        #[arg(long)]
        commission: Option<i64>,
        #[arg(long, value_parser = parse_payout_method, requires_all = ["account_number", "account_name"])]
        method: Option<PayoutMethod>,
        #[arg(long)]
        account_number: Option<String>,
        #[arg(long)]
        account_name: Option<String>,
        #[arg(long)]
        bank_name: Option<String>,
    },
    Request {
        branch: String,
        #[arg(long)]
        actor: String,
        #[arg(long)]
        notes: Option<String>,
    },
    Approve {
        settlement: Uuid,
        #[arg(long)]
        actor: String,
        #[arg(long)]
        notes: Option<String>,
    },
    Process {
        settlement: Uuid,
        #[arg(long)]
        actor: String,
    },
    Complete {
        settlement: Uuid,
        #[arg(long)]
        actor: String,
        #[arg(long)]
        transfer_reference: String,
    },
    Reject {
        settlement: Uuid,
        #[arg(long)]
        actor: String,
        #[arg(long)]
        reason: String,
    },
    Show {
        settlement: Uuid,
    },
    Earnings {
        settlement: Uuid,
    },
    List {
        branch: String,
    },
    /// Settlements in one status across branches, oldest first.
    Queue {
        #[arg(long, value_parser = parse_settlement_status, default_value = "pending")]
        status: SettlementStatus,
    },
}

#[derive(Args, Debug)]
struct PointsArgs {
    #[command(subcommand)]
    command: PointsCommand,
}

#[derive(Args, Debug)]
struct PointsMovement {
    user: String,
    amount: Points,
    #[arg(long)]
    source: String,
    #[arg(long)]
    source_id: Option<String>,
    #[arg(long)]
    branch: Option<String>,
    #[arg(long)]
    notes: Option<String>,
    #[arg(long)]
    actor: Option<String>,
}

impl From<PointsMovement> for PointsCmd {
    fn from(args: PointsMovement) -> Self {
        let mut cmd = PointsCmd::new(args.user, args.amount, args.source);
        cmd.source_id = args.source_id;
        cmd.branch_id = args.branch;
        cmd.notes = args.notes;
        cmd.actor = args.actor;
        cmd
    }
}

#[derive(Subcommand, Debug)]
enum PointsCommand {
    Earn(PointsMovement),
    Redeem(PointsMovement),
    Adjust {
        user: String,
        #[arg(allow_hyphen_values = true)]
        amount: Points,
        #[arg(long)]
        reason: String,
        #[arg(long)]
        actor: String,
        #[arg(long)]
        allow_negative: bool,
    },
    Show {
        user: String,
    },
    History {
        user: String,
    },
    /// Zero balances inactive longer than the configured expiry window.
    Expire {
        /// Report without changing anything.
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Args, Debug)]
struct Tiers {
    #[command(subcommand)]
    command: TiersCommand,
}

#[derive(Subcommand, Debug)]
enum TiersCommand {
    /// Insert the default Bronze/Silver/Gold/Platinum tiers.
    Seed,
    List,
}

fn parse_line(raw: &str) -> Result<(Uuid, i64), String> {
    let (product, quantity) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected <product id>=<quantity>, got {raw}"))?;
    let product = product
        .trim()
        .parse::<Uuid>()
        .map_err(|err| format!("invalid product id {product}: {err}"))?;
    let quantity = quantity
        .trim()
        .parse::<i64>()
        .map_err(|err| format!("invalid quantity {quantity}: {err}"))?;
    Ok((product, quantity))
}

fn parse_payment_method(raw: &str) -> Result<PaymentMethod, String> {
    PaymentMethod::try_from(raw).map_err(|err| err.to_string())
}

fn parse_payout_method(raw: &str) -> Result<PayoutMethod, String> {
    PayoutMethod::try_from(raw).map_err(|err| err.to_string())
}

fn parse_order_status(raw: &str) -> Result<OrderStatus, String> {
    OrderStatus::try_from(raw).map_err(|err| err.to_string())
}

fn parse_settlement_status(raw: &str) -> Result<SettlementStatus, String> {
    SettlementStatus::try_from(raw).map_err(|err| err.to_string())
}

fn print<T: Serialize>(value: &T) -> AppResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(engine: &Engine, command: Command) -> AppResult<()> {
    match command {
        Command::Wallet(Wallet { command }) => match command {
            WalletCommand::Show { owner } => print(&engine.wallet(&owner).await?),
            WalletCommand::History { owner } => print(&engine.wallet_transactions(&owner).await?),
            WalletCommand::TopUp {
                owner,
                amount,
                actor,
                reference,
                description,
                idempotency_key,
            } => {
                let mut cmd = TopUpCmd::new(owner, amount.minor(), actor);
                cmd.reference_id = reference;
                cmd.description = description;
                cmd.idempotency_key = idempotency_key;
                print(&engine.top_up(cmd).await?)
            }
            WalletCommand::Adjust {
                owner,
                amount,
                reason,
                actor,
                allow_negative,
            } => {
                let mut cmd = AdjustBalanceCmd::new(owner, amount.minor(), reason, actor);
                cmd.allow_negative = allow_negative;
                print(&engine.adjust_balance(cmd).await?)
            }
            WalletCommand::Reconcile { owner } => print(&engine.reconcile_wallet(&owner).await?),
        },
        Command::Catalog(Catalog { command }) => match command {
            CatalogCommand::Add { name, price, cost } => {
                let mut cmd = CatalogProductCmd::new(name, price.minor());
                if let Some(cost) = cost {
                    cmd = cmd.cost(cost.minor());
                }
                print(&engine.create_catalog_product(cmd).await?)
            }
            CatalogCommand::List { all } => print(&engine.catalog_products(all).await?),
            CatalogCommand::Receive {
                product,
                quantity,
                actor,
                unit_cost,
                supplier,
                notes,
            } => {
                let mut cmd = ReceiveStockCmd::new(product, quantity, actor);
                cmd.unit_cost = unit_cost.map(Money::minor);
                cmd.supplier = supplier;
                cmd.notes = notes;
                print(&engine.receive_central_stock(cmd).await?)
            }
            CatalogCommand::Activate { product } => {
                print(&engine.set_catalog_product_active(product, true).await?)
            }
            CatalogCommand::Deactivate { product } => {
                print(&engine.set_catalog_product_active(product, false).await?)
            }
            CatalogCommand::Batches { product, branch } => {
                let location = branch.map_or(StockLocation::Central, StockLocation::Branch);
                print(&engine.batches(&location, product).await?)
            }
        },
        Command::Branch(Branch { command }) => match command {
            BranchCommand::Products { branch } => print(&engine.branch_products(&branch).await?),
            BranchCommand::Consume {
                product,
                quantity,
                reason,
            } => print(
                &engine
                    .consume_branch_stock(product, quantity, reason.as_deref())
                    .await?,
            ),
        },
        Command::Order(Order { command }) => run_order(engine, command).await,
        Command::Earning(Earning { command }) => match command {
            EarningCommand::Record {
                branch,
                gross,
                source_id,
                customer,
                description,
            } => {
                let mut cmd = RecordEarningCmd::new(
                    branch,
                    EarningSource::ExternalPayment,
                    source_id,
                    gross.minor(),
                );
                cmd.customer_id = customer;
                cmd.description = description;
                print(&engine.record_earning(cmd).await?)
            }
            EarningCommand::PayWithWallet {
                customer,
                branch,
                amount,
                source_id,
                actor,
            } => print(
                &engine
                    .pay_with_wallet(WalletPaymentCmd::new(
                        customer,
                        branch,
                        amount.minor(),
                        source_id,
                        actor,
                    ))
                    .await?,
            ),
            EarningCommand::Summary { branch } => {
                print(&engine.pending_earnings_summary(&branch).await?)
            }
        },
        Command::Settlement(Settlement { command }) => run_settlement(engine, command).await,
        Command::Points(PointsArgs { command }) => match command {
            PointsCommand::Earn(args) => print(&engine.earn_points(args.into()).await?),
            PointsCommand::Redeem(args) => print(&engine.redeem_points(args.into()).await?),
            PointsCommand::Adjust {
                user,
                amount,
                reason,
                actor,
                allow_negative,
            } => {
                let mut cmd = AdjustPointsCmd::new(user, amount, reason, actor);
                cmd.allow_negative = allow_negative;
                print(&engine.adjust_points(cmd).await?)
            }
            PointsCommand::Show { user } => print(&engine.points_ledger(&user).await?),
            PointsCommand::History { user } => print(&engine.points_history(&user).await?),
            PointsCommand::Expire { dry_run } => {
                print(&engine.expire_points(Utc::now(), dry_run).await?)
            }
        },
        Command::Tiers(Tiers { command }) => match command {
            TiersCommand::Seed => print(&engine.seed_default_tiers().await?),
            TiersCommand::List => print(&engine.tiers().await?),
        },
    }
}

async fn run_order(engine: &Engine, command: OrderCommand) -> AppResult<()> {
    match command {
        OrderCommand::Create {
            branch,
            actor,
            items,
            notes,
            manual,
            auto_approve,
            paid_with,
            payment_reference,
        } => {
            let mut cmd = CreateOrderCmd::new(branch, actor);
            cmd.items = items;
            cmd.notes = notes;
            if manual {
                cmd = cmd.manual();
            }
            if auto_approve {
                cmd = cmd.auto_approve();
            }
            if let Some(method) = paid_with {
                let mut payment = OrderPayment::new(method);
                payment.reference = payment_reference;
                cmd = cmd.mark_as_paid(payment);
            }
            print(&engine.create_order(cmd).await?)
        }
        OrderCommand::Approve {
            order,
            actor,
            quantities,
        } => {
            let mut cmd = ApproveOrderCmd::new(order, actor);
            cmd.quantities = quantities;
            print(&engine.approve_order(cmd).await?)
        }
        OrderCommand::Reject {
            order,
            actor,
            reason,
        } => print(&engine.reject_order(order, &actor, &reason).await?),
        OrderCommand::Cancel {
            order,
            actor,
            reason,
        } => print(
            &engine
                .cancel_order(order, &actor, reason.as_deref())
                .await?,
        ),
        OrderCommand::Ship { order, actor } => print(&engine.ship_order(order, &actor).await?),
        OrderCommand::Receive { order, actor } => {
            print(&engine.receive_order(order, &actor).await?)
        }
        OrderCommand::Pay {
            order,
            method,
            actor,
            reference,
        } => {
            let mut payment = OrderPayment::new(method);
            payment.reference = reference;
            print(&engine.mark_order_paid(order, payment, &actor).await?)
        }
        OrderCommand::Show { order } => print(&engine.order(order).await?),
        OrderCommand::List { branch, status } => match (branch, status) {
            (Some(branch), status) => print(&engine.orders_for_branch(&branch, status).await?),
            (None, Some(status)) => print(&engine.orders_by_status(status).await?),
            (None, None) => Err("order list needs --branch or --status".into()),
        },
    }
}

async fn run_settlement(engine: &Engine, command: SettlementCommand) -> AppResult<()> {
    match command {
        SettlementCommand::Configure {
            branch,
            commission,
            method,
            account_number,
            account_name,
            bank_name,
        } => {
            let cmd = BranchWalletSettingsCmd {
                branch_id: branch,
                commission_override: commission,
                payout_method: method,
                payout_account_number: account_number,
                payout_account_name: account_name,
                payout_bank_name: bank_name,
            };
            print(&engine.set_branch_wallet_settings(cmd).await?)
        }
        SettlementCommand::Request {
            branch,
            actor,
            notes,
        } => print(
            &engine
                .request_settlement(&branch, &actor, notes.as_deref())
                .await?,
        ),
        SettlementCommand::Approve {
            settlement,
            actor,
            notes,
        } => print(
            &engine
                .approve_settlement(settlement, &actor, notes.as_deref())
                .await?,
        ),
        SettlementCommand::Process { settlement, actor } => {
            print(&engine.mark_settlement_processing(settlement, &actor).await?)
        }
        SettlementCommand::Complete {
            settlement,
            actor,
            transfer_reference,
        } => print(
            &engine
                .complete_settlement(settlement, &actor, &transfer_reference)
                .await?,
        ),
        SettlementCommand::Reject {
            settlement,
            actor,
            reason,
        } => print(
            &engine
                .reject_settlement(settlement, &actor, &reason)
                .await?,
        ),
        SettlementCommand::Show { settlement } => print(&engine.settlement(settlement).await?),
        SettlementCommand::Earnings { settlement } => {
            print(&engine.settlement_earnings(settlement).await?)
        }
        SettlementCommand::List { branch } => print(&engine.branch_settlements(&branch).await?),
        SettlementCommand::Queue { status } => {
            print(&engine.settlements_by_status(status).await?)
        }
    }
}

async fn connect_db(database_url: &str) -> AppResult<sea_orm::DatabaseConnection> {
    let db = sea_orm::Database::connect(database_url).await?;
    Migrator::up(&db, None).await?;
    Ok(db)
}

#[tokio::main]
async fn main() -> AppResult<()> {
    let cli = Cli::parse();
    let mut settings = settings::Settings::load(cli.config.as_deref())?;
    if let Some(url) = cli.database_url {
        settings.database_url = url;
    }

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(format!(
            "trimledger={level},engine={level}",
            level = settings.level
        ))
        .init();

    let db = connect_db(&settings.database_url).await?;
    let engine = Engine::builder()
        .database(db)
        .config(settings.engine.clone())
        .build()
        .await?;
    tracing::debug!(database_url = %settings.database_url, "engine ready");

    if let Err(err) = run(&engine, cli.command).await {
        match err.downcast_ref::<EngineError>() {
            Some(engine_err) => eprintln!(
                "{}",
                serde_json::json!({
                    "error": engine_err.kind().as_str(),
                    "message": engine_err.to_string(),
                })
            ),
            None => eprintln!("{err}"),
        }
        std::process::exit(1);
    }
    Ok(())
}
