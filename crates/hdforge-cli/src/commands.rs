//! CLI command implementations.

use bip39::{Language, Mnemonic};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use dialoguer::Password;
use hdforge_crypto::{harden, Crypto};
use hdforge_storage::Database;
use hdforge_types::constants::{EXTERNAL, INTERNAL};
use hdforge_types::{Discrimination, RowId, WalletScheme};
use hdforge_wallet::{create_standard_wallet, StandardWalletRequest};
use rand::RngCore;
use std::path::PathBuf;
use zeroize::Zeroizing;

use crate::config::CliConfig;
use crate::output::*;

/// Main CLI.
#[derive(Parser)]
#[command(name = "hdforge")]
#[command(about = "hdforge - hierarchical deterministic wallet builder")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Wallet database directory
    #[arg(long, global = true, env = "HDFORGE_DB")]
    pub db: Option<PathBuf>,

    /// Address network (mainnet or testnet)
    #[arg(long, global = true)]
    pub network: Option<Discrimination>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Wallet management
    #[command(subcommand)]
    Wallet(WalletCommands),

    /// Configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

/// Wallet commands.
#[derive(Subcommand)]
pub enum WalletCommands {
    /// Create a new wallet from a fresh or existing recovery phrase
    Create {
        /// Wallet name
        #[arg(short, long)]
        name: Option<String>,
        /// Account name
        #[arg(long, default_value = "Account 0")]
        account_name: String,
        /// Account number (hardened automatically)
        #[arg(long, default_value_t = 0)]
        account: u32,
        /// Existing recovery phrase to restore from
        #[arg(long)]
        mnemonic: Option<String>,
        /// Words in a newly generated recovery phrase
        #[arg(long, default_value_t = 24)]
        words: usize,
        /// Derivation scheme (defaults to the configured one)
        #[arg(long, value_enum)]
        scheme: Option<SchemeArg>,
        /// Spending password
        #[arg(long, env = "HDFORGE_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// List wallets
    List,
    /// Show wallet details
    Show {
        /// Conceptual wallet id
        id: RowId,
    },
}

/// Configuration commands.
#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Write the default configuration
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Show the effective configuration
    Show,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum SchemeArg {
    Cip1852,
    Bip44,
}

impl From<SchemeArg> for WalletScheme {
    fn from(arg: SchemeArg) -> Self {
        match arg {
            SchemeArg::Cip1852 => WalletScheme::Cip1852,
            SchemeArg::Bip44 => WalletScheme::Bip44,
        }
    }
}

/// Apply global flags on top of the loaded configuration.
pub fn effective_config(cli: &Cli, mut config: CliConfig) -> CliConfig {
    if let Some(db) = &cli.db {
        config.db_dir = db.clone();
    }
    if let Some(network) = cli.network {
        config.network = network;
    }
    if cli.verbose {
        config.log_level = "debug".to_string();
    }
    if cli.json_logs {
        config.json_logs = true;
    }
    config
}

/// Execute a command.
pub async fn execute(cmd: Commands, config: &CliConfig) -> anyhow::Result<()> {
    match cmd {
        Commands::Wallet(cmd) => execute_wallet(cmd, config).await,
        Commands::Config(cmd) => execute_config(cmd, config),
    }
}

/// Execute wallet commands.
async fn execute_wallet(cmd: WalletCommands, config: &CliConfig) -> anyhow::Result<()> {
    match cmd {
        WalletCommands::Create {
            name,
            account_name,
            account,
            mnemonic,
            words,
            scheme,
            password,
        } => {
            let name = name.unwrap_or_else(|| "wallet".to_string());
            let scheme = scheme.map(WalletScheme::from).unwrap_or(config.scheme);

            let generated = mnemonic.is_none();
            let mnemonic = match mnemonic {
                Some(phrase) => Mnemonic::parse_in_normalized(Language::English, &phrase)?,
                None => generate_mnemonic(words)?,
            };

            let password = match password {
                Some(password) => Zeroizing::new(password),
                None => Zeroizing::new(
                    Password::new()
                        .with_prompt("Set spending password")
                        .with_confirmation("Confirm password", "Passwords don't match")
                        .interact()?,
                ),
            };
            if password.is_empty() {
                anyhow::bail!("Spending password must not be empty");
            }

            let crypto = Crypto::with_kdf_params(config.kdf);
            let seed = Zeroizing::new(mnemonic.to_seed(""));
            let root_key = crypto.deriver().master_from_seed(&seed[..])?;
            let account_index = harden(account)?;

            tracing::debug!("Opening wallet database at {}", config.db_dir.display());
            let db = Database::open(&config.db_dir)?;
            let state = create_standard_wallet(
                &db,
                &crypto,
                StandardWalletRequest {
                    discrimination: config.network,
                    root_key,
                    password,
                    account_index,
                    wallet_name: name.clone(),
                    account_name,
                    scheme,
                },
            )
            .await?;

            let wallet_id = state.conceptual_wallet.conceptual_wallet_id;
            print_success(&format!("Created wallet '{}' (id {})", name, wallet_id));
            println!(
                "Account path: {}",
                format_path(&scheme.account_path(account_index)).bright_cyan()
            );
            let receive = db
                .children_of(state.public_deriver.key_derivation_id())
                .into_iter()
                .find(|chain| chain.index == Some(EXTERNAL))
                .and_then(|chain| db.addresses_for_chain(chain.key_derivation_id).into_iter().next());
            if let Some((_, row)) = receive {
                println!("Receive address: {}", format_address(&row.hash).bright_green());
            }

            if generated {
                print_warning("IMPORTANT: Write down your recovery phrase and keep it safe!");
                println!("{}", mnemonic.to_string().bold());
            }
        }

        WalletCommands::List => {
            let db = Database::open(&config.db_dir)?;
            let wallets = db.conceptual_wallets();

            if wallets.is_empty() {
                println!("{}", "No wallets found".yellow());
                println!("Create a wallet with: hdforge wallet create");
            } else {
                println!("{}", "Wallets:".bold());
                for wallet in &wallets {
                    let accounts = db.public_derivers_for_wallet(wallet.conceptual_wallet_id);
                    println!(
                        "  • [{}] {} - {} account(s)",
                        wallet.conceptual_wallet_id,
                        wallet.name.bright_green(),
                        accounts.len()
                    );
                }
                println!("\nTotal: {} wallet(s)", wallets.len());
            }
        }

        WalletCommands::Show { id } => {
            let db = Database::open(&config.db_dir)?;
            show_wallet(&db, id)?;
        }
    }

    Ok(())
}

fn show_wallet(db: &Database, id: RowId) -> anyhow::Result<()> {
    let wallet = db
        .conceptual_wallets()
        .into_iter()
        .find(|wallet| wallet.conceptual_wallet_id == id)
        .ok_or_else(|| anyhow::anyhow!("Wallet not found: {}", id))?;

    println!("{}", "Wallet Details".bold());
    println!("{}", "=".repeat(50));
    println!("Name:        {}", wallet.name.bright_green());
    println!("Coin type:   {}", format_index(wallet.coin_type));

    if let Some(wrapper) = db.wrapper_for_wallet(id) {
        println!("Signer lvl:  {}", wrapper.signer_level);
        println!("Account lvl: {}", wrapper.public_deriver_level);
        match wrapper.private_deriver_level {
            Some(level) => println!("Private lvl: {}", level),
            None => print_info("Watch-only wallet (no private deriver)"),
        }
    }

    for deriver in db.public_derivers_for_wallet(id) {
        let path: Vec<u32> = db
            .path_to(deriver.key_derivation_id)?
            .iter()
            .filter_map(|node| node.index)
            .collect();
        println!();
        println!(
            "{} {}",
            deriver.name.bold(),
            format_path(&path).bright_cyan()
        );

        for chain in db.children_of(deriver.key_derivation_id) {
            let title = match chain.index {
                Some(EXTERNAL) => "External",
                Some(INTERNAL) => "Internal",
                _ => "Chain",
            };
            let cutoff = db
                .chain_meta(chain.key_derivation_id)
                .and_then(|meta| meta.display_cutoff);
            let addresses: Vec<(u32, String)> = db
                .addresses_for_chain(chain.key_derivation_id)
                .into_iter()
                .map(|(index, row)| (index, row.hash))
                .collect();
            print_address_table(title, cutoff, &addresses);
        }
    }

    Ok(())
}

/// Fresh English recovery phrase with `words` words.
fn generate_mnemonic(words: usize) -> anyhow::Result<Mnemonic> {
    if !matches!(words, 12 | 15 | 18 | 21 | 24) {
        anyhow::bail!("Recovery phrase must have 12, 15, 18, 21 or 24 words");
    }
    let mut entropy = Zeroizing::new(vec![0u8; words * 4 / 3]);
    rand::thread_rng().fill_bytes(&mut entropy);
    Ok(Mnemonic::from_entropy_in(Language::English, &entropy)?)
}

/// Execute config commands.
fn execute_config(cmd: ConfigCommands, config: &CliConfig) -> anyhow::Result<()> {
    match cmd {
        ConfigCommands::Init { force } => {
            let path = CliConfig::config_path()?;
            if path.exists() && !force {
                print_warning(&format!(
                    "Config already exists at {} (use --force to overwrite)",
                    path.display()
                ));
                return Ok(());
            }
            let path = CliConfig::default().save()?;
            print_success(&format!("Wrote default config to {}", path.display()));
        }

        ConfigCommands::Show => {
            println!("{}", "Current Configuration:".bold());
            println!("Database:    {}", config.db_dir.display().to_string().bright_cyan());
            println!("Network:     {:?}", config.network);
            println!("Scheme:      {:?}", config.scheme);
            println!("Log level:   {}", config.log_level.bright_yellow());
            println!("JSON logs:   {}", config.json_logs);
            println!(
                "KDF:         memory={} KiB, time={}, parallelism={}",
                config.kdf.memory_cost, config.kdf.time_cost, config.kdf.parallelism
            );
        }
    }

    Ok(())
}
