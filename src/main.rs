use std::{path::PathBuf, sync::Arc};

use clap::Parser;
use realmguard::{
    AuthenticationToken, SecurityConfig, SecurityManager,
    auth::{
        DEFAULT_SALT_LEN, HashAlgorithm, HashedCredentialsMatcher, SaltStyle, StoredEncoding,
        generate_salt,
    },
    observability::{self, metrics},
    realm::RealmFactory,
};

const DEFAULT_CONFIG_PATH: &str = "realmguard.toml";

/// CLI arguments for realmguard
#[derive(Parser, Debug)]
#[command(version, about = "Realm-based authentication and authorization", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Path to config file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Load and validate the config, then build every realm
    CheckConfig,
    /// Authenticate a username/password and optionally run access checks
    Login {
        username: String,
        password: String,
        /// Permission to check after login (repeatable)
        #[arg(short, long = "permission")]
        permissions: Vec<String>,
        /// Role to check after login (repeatable)
        #[arg(short, long = "role")]
        roles: Vec<String>,
        /// Print collected counters in Prometheus text format
        #[arg(long)]
        metrics: bool,
    },
    /// Produce stored credential material for a password
    Hash {
        password: String,
        #[arg(long, default_value = "sha-256", value_parser = parse_algorithm)]
        algorithm: HashAlgorithm,
        #[arg(long, default_value = "1")]
        iterations: u32,
        #[arg(long, value_enum, default_value = "hex")]
        encoding: EncodingArg,
        #[arg(long, value_enum, default_value = "none")]
        salt_style: SaltArg,
        /// Salt to use; generated when the salt style needs one
        #[arg(long)]
        salt: Option<String>,
    },
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum EncodingArg {
    Hex,
    Base64,
}

impl From<EncodingArg> for StoredEncoding {
    fn from(arg: EncodingArg) -> Self {
        match arg {
            EncodingArg::Hex => StoredEncoding::Hex,
            EncodingArg::Base64 => StoredEncoding::Base64,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum SaltArg {
    None,
    Account,
    Crypt,
}

impl From<SaltArg> for SaltStyle {
    fn from(arg: SaltArg) -> Self {
        match arg {
            SaltArg::None => SaltStyle::None,
            SaltArg::Account => SaltStyle::Account,
            SaltArg::Crypt => SaltStyle::Crypt,
        }
    }
}

fn parse_algorithm(value: &str) -> Result<HashAlgorithm, String> {
    value.parse().map_err(|e| format!("{e}"))
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    match args.command {
        Command::CheckConfig => run_check_config(&args.config),
        Command::Login {
            username,
            password,
            permissions,
            roles,
            metrics,
        } => run_login(&args.config, username, password, permissions, roles, metrics).await,
        Command::Hash {
            password,
            algorithm,
            iterations,
            encoding,
            salt_style,
            salt,
        } => run_hash(&password, algorithm, iterations, encoding, salt_style, salt),
    }
}

fn load_config(path: &PathBuf) -> SecurityConfig {
    match SecurityConfig::from_file(path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", path.display(), e);
            std::process::exit(1);
        }
    }
}

fn build_manager(config: &SecurityConfig) -> SecurityManager {
    match SecurityManager::from_config(config, &RealmFactory::default()) {
        Ok(manager) => manager,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

fn run_check_config(path: &PathBuf) {
    let config = load_config(path);
    let manager = build_manager(&config);

    println!("Config OK: {}", path.display());
    println!(
        "  strategy: {}",
        manager.authenticator().strategy().as_str()
    );
    for realm in &config.realms {
        println!(
            "  realm {} (type {}, matcher {}, caching {})",
            realm.name,
            realm.kind,
            realm.credentials_matcher.as_deref().unwrap_or("simple"),
            config.cache.enabled && realm.authorization_caching()
        );
    }
    if !config.roles.is_empty() {
        println!("  roles: {}", config.roles.len());
    }
}

async fn run_login(
    path: &PathBuf,
    username: String,
    password: String,
    permissions: Vec<String>,
    roles: Vec<String>,
    print_metrics: bool,
) {
    let config = load_config(path);

    if let Err(e) = observability::init_tracing(&config.observability) {
        eprintln!("Warning: {}", e);
    }
    if print_metrics && let Err(e) = metrics::init_metrics(&config.observability.metrics) {
        eprintln!("Warning: {}", e);
    }

    let manager = Arc::new(build_manager(&config));
    let token = AuthenticationToken::username_password(username, password);

    let subject = match manager.login(&token).await {
        Ok(subject) => subject,
        Err(e) => {
            eprintln!("{}", e);
            if print_metrics && let Some(rendered) = metrics::render_metrics() {
                print!("{rendered}");
            }
            std::process::exit(2);
        }
    };
    println!("Authenticated: {}", subject.principals());

    let mut denied = false;
    for permission in &permissions {
        match subject.is_permitted_str(permission).await {
            Ok(allowed) => {
                denied |= !allowed;
                println!("  permission {permission}: {}", verdict(allowed));
            }
            Err(e) => {
                denied = true;
                println!("  permission {permission}: error ({e})");
            }
        }
    }
    for role in &roles {
        let allowed = subject.has_role(role).await;
        denied |= !allowed;
        println!("  role {role}: {}", verdict(allowed));
    }

    subject.logout();

    if print_metrics && let Some(rendered) = metrics::render_metrics() {
        print!("{rendered}");
    }
    if denied {
        std::process::exit(3);
    }
}

fn verdict(allowed: bool) -> &'static str {
    if allowed { "granted" } else { "denied" }
}

fn run_hash(
    password: &str,
    algorithm: HashAlgorithm,
    iterations: u32,
    encoding: EncodingArg,
    salt_style: SaltArg,
    salt: Option<String>,
) {
    if iterations == 0 {
        eprintln!("Error: --iterations must be at least 1");
        std::process::exit(1);
    }

    let matcher = HashedCredentialsMatcher::new(algorithm)
        .with_iterations(iterations)
        .with_encoding(encoding.into())
        .with_salt_style(salt_style.into());

    // Account salts live in TOML strings, so generated ones are hex text
    let salt: Option<Vec<u8>> = match (salt_style, salt) {
        (SaltArg::None, _) => None,
        (_, Some(salt)) => Some(salt.into_bytes()),
        (SaltArg::Account, None) => Some(hex::encode(generate_salt(DEFAULT_SALT_LEN)).into_bytes()),
        (SaltArg::Crypt, None) => Some(generate_salt(DEFAULT_SALT_LEN)),
    };

    match matcher.hash_password(password.as_bytes(), salt.as_deref()) {
        Ok(stored) => {
            println!("{stored}");
            if let (SaltArg::Account, Some(salt)) = (salt_style, &salt) {
                println!("salt = \"{}\"", String::from_utf8_lossy(salt));
            }
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
