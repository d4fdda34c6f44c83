use std::{
    fs,
    path::{Path, PathBuf},
    process::ExitCode,
};

use clap::{Args, Parser, Subcommand, ValueEnum};
use ed25519_dalek::SigningKey;
use rand::{rngs::OsRng, RngCore};
use tracing::info;
use tracing_subscriber::EnvFilter;

use galai_ledger::{
    policy::DEFAULT_OWNERSHIP_LIMIT_BPS,
    store::{load_config, StateFile, StoreError},
    Address, Amount, LedgerConfig, LimitBasis, OwnershipLimit, TokenLedger,
};

//==================== CLI definition ====================//

#[derive(Parser)]
#[command(name = "galai", version, about = "Capped token ledger with ownership limits and transfer fees")]
struct Cli {
    /// Ledger state file
    #[arg(long, global = true, default_value = "galai-state.json")]
    state: PathBuf,

    /// Raise log verbosity (-v debug, -vv trace). RUST_LOG wins when set.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a new ledger state file
    Init(InitArgs),
    /// Mint new tokens to a recipient
    Mint {
        recipient: Address,
        #[arg(value_parser = parse_amount)]
        amount: Amount,
        /// Address presented to the mint authority (defaults to the recipient)
        #[arg(long)]
        minter: Option<Address>,
    },
    /// Transfer tokens, paying the configured fee
    Transfer {
        sender: Address,
        recipient: Address,
        #[arg(value_parser = parse_amount)]
        amount: Amount,
    },
    /// Print the balance of an address
    Balance { address: Address },
    /// Print token parameters and current supply
    Info,
    /// List every holder with a non-zero balance
    Holders,
    /// Print the journal of applied operations as JSON lines
    History,
    /// Reload the state file and re-check its root and invariants
    Verify,
    /// Generate an ed25519 keypair and print its ledger address
    Keygen {
        #[arg(long, default_value = "keys")]
        out_dir: PathBuf,
    },
}

#[derive(Args)]
struct InitArgs {
    /// JSON configuration file; replaces the individual flags below
    #[arg(
        long,
        conflicts_with_all = [
            "name",
            "symbol",
            "cap",
            "fee_rate_bps",
            "fee_recipient",
            "limit_bps",
            "limit_basis",
        ]
    )]
    config: Option<PathBuf>,
    #[arg(long, required_unless_present = "config")]
    name: Option<String>,
    #[arg(long, required_unless_present = "config")]
    symbol: Option<String>,
    #[arg(long, required_unless_present = "config", value_parser = parse_amount)]
    cap: Option<Amount>,
    #[arg(long, required_unless_present = "config")]
    fee_rate_bps: Option<u16>,
    #[arg(long, required_unless_present = "config")]
    fee_recipient: Option<Address>,
    /// Ownership limit in basis points
    #[arg(long, default_value_t = DEFAULT_OWNERSHIP_LIMIT_BPS)]
    limit_bps: u16,
    /// What the ownership limit is measured against
    #[arg(long, value_enum, default_value_t = BasisArg::Cap)]
    limit_basis: BasisArg,
    /// Overwrite an existing state file
    #[arg(long)]
    force: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum BasisArg {
    Supply,
    Cap,
}

impl From<BasisArg> for LimitBasis {
    fn from(arg: BasisArg) -> Self {
        match arg {
            BasisArg::Supply => LimitBasis::Supply,
            BasisArg::Cap => LimitBasis::Cap,
        }
    }
}

/// Accepts plain integers with optional `_` separators and an optional
/// `e<exp>` scale suffix, so `500000e18` is 500,000 whole 18-decimal tokens.
fn parse_amount(raw: &str) -> Result<Amount, String> {
    let cleaned = raw.trim().replace('_', "");
    let (mantissa, exp) = match cleaned.split_once(['e', 'E']) {
        Some((m, e)) => (m, e.parse::<u32>().map_err(|e| format!("bad exponent: {e}"))?),
        None => (cleaned.as_str(), 0),
    };
    let mantissa: Amount = mantissa
        .parse()
        .map_err(|e| format!("bad amount {raw:?}: {e}"))?;
    10u128
        .checked_pow(exp)
        .and_then(|scale| mantissa.checked_mul(scale))
        .ok_or_else(|| format!("amount {raw:?} overflows"))
}

//==================== commands ====================//

fn init_cmd(store: &StateFile, args: InitArgs) -> Result<(), StoreError> {
    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => {
            // clap guarantees these are present when --config is absent
            let (Some(name), Some(symbol), Some(cap), Some(fee_rate_bps), Some(fee_recipient)) = (
                args.name,
                args.symbol,
                args.cap,
                args.fee_rate_bps,
                args.fee_recipient,
            ) else {
                return Err(galai_ledger::LedgerError::InvalidConfiguration(
                    "missing token parameters".into(),
                )
                .into());
            };
            LedgerConfig::new(name, symbol, cap, fee_rate_bps, fee_recipient).with_ownership_limit(
                OwnershipLimit {
                    bps: args.limit_bps,
                    basis: args.limit_basis.into(),
                },
            )
        }
    };
    let ledger = store.init(config, args.force)?;
    println!(
        "initialised {} ({}) → {}",
        ledger.name(),
        ledger.symbol(),
        store.path().display()
    );
    Ok(())
}

fn mint_cmd(
    store: &StateFile,
    recipient: Address,
    amount: Amount,
    minter: Option<Address>,
) -> Result<(), StoreError> {
    let mut ledger = store.load()?;
    let receipt = ledger.mint_by(minter.unwrap_or(recipient), recipient, amount)?;
    store.save(&ledger)?;
    info!(%recipient, %amount, supply = %receipt.total_supply, "minted");
    println!(
        "minted {amount} → {recipient} (balance {}, supply {})",
        receipt.balance, receipt.total_supply
    );
    Ok(())
}

fn transfer_cmd(
    store: &StateFile,
    sender: Address,
    recipient: Address,
    amount: Amount,
) -> Result<(), StoreError> {
    let mut ledger = store.load()?;
    let receipt = ledger.transfer(sender, recipient, amount)?;
    store.save(&ledger)?;
    info!(%sender, %recipient, %amount, fee = %receipt.fee, "transferred");
    println!(
        "transferred {amount}: {} → {recipient}, fee {} → {}",
        receipt.net,
        receipt.fee,
        ledger.fee_recipient()
    );
    Ok(())
}

fn info_cmd(ledger: &TokenLedger) {
    let limit = ledger.ownership_limit();
    let basis = match limit.basis {
        LimitBasis::Supply => "supply",
        LimitBasis::Cap => "cap",
    };
    println!("name:            {}", ledger.name());
    println!("symbol:          {}", ledger.symbol());
    println!("cap:             {}", ledger.cap());
    println!("total supply:    {}", ledger.total_supply());
    println!("mintable:        {}", ledger.mintable());
    println!("fee rate:        {} bps", ledger.fee_rate_bps());
    println!("fee recipient:   {}", ledger.fee_recipient());
    println!("ownership limit: {} bps of {basis} (now {})", limit.bps, ledger.ownership_threshold());
    println!("height:          {}", ledger.height());
    println!("state root:      {}", hex::encode(ledger.state_root()));
}

fn history_cmd(ledger: &TokenLedger) -> Result<(), StoreError> {
    for event in ledger.events() {
        let line = serde_json::to_string(event).map_err(|source| StoreError::Json {
            path: PathBuf::from("<stdout>"),
            source,
        })?;
        println!("{line}");
    }
    Ok(())
}

fn keygen_cmd(out_dir: &Path) -> Result<(), StoreError> {
    let io = |source| StoreError::Io {
        path: out_dir.to_path_buf(),
        source,
    };
    fs::create_dir_all(out_dir).map_err(io)?;

    let mut sk_bytes = [0u8; 32];
    OsRng.fill_bytes(&mut sk_bytes);
    let sk = SigningKey::from_bytes(&sk_bytes);
    let pk = sk.verifying_key();
    let address = Address::from_verifying_key(&pk);

    fs::write(out_dir.join("sk.hex"), hex::encode(sk_bytes)).map_err(io)?;
    fs::write(out_dir.join("pk.hex"), hex::encode(pk.as_bytes())).map_err(io)?;
    fs::write(out_dir.join("address.hex"), address.to_hex()).map_err(io)?;
    println!("keypair written → {}", out_dir.display());
    println!("address: {address}");
    Ok(())
}

//==================== main ====================//

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "galai=info,galai_ledger=info",
        1 => "galai=debug,galai_ledger=debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<(), StoreError> {
    let store = StateFile::new(cli.state);
    match cli.command {
        Command::Init(args) => init_cmd(&store, args),
        Command::Mint {
            recipient,
            amount,
            minter,
        } => mint_cmd(&store, recipient, amount, minter),
        Command::Transfer {
            sender,
            recipient,
            amount,
        } => transfer_cmd(&store, sender, recipient, amount),
        Command::Balance { address } => {
            let ledger = store.load()?;
            println!("{}", ledger.balance_of(&address));
            Ok(())
        }
        Command::Info => {
            info_cmd(&store.load()?);
            Ok(())
        }
        Command::Holders => {
            let ledger = store.load()?;
            for (holder, balance) in ledger.holders() {
                println!("{holder} {balance}");
            }
            Ok(())
        }
        Command::History => history_cmd(&store.load()?),
        Command::Verify => {
            let ledger = store.load()?;
            println!(
                "verify: OK (height {}, root {})",
                ledger.height(),
                hex::encode(ledger.state_root())
            );
            Ok(())
        }
        Command::Keygen { out_dir } => keygen_cmd(&out_dir),
    }
}

/// 1 when the ledger rejected the operation, 2 for usage and IO failures.
fn exit_status(err: &StoreError) -> u8 {
    match err {
        StoreError::Ledger(_) => 1,
        _ => 2,
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(exit_status(&err))
        }
    }
}
