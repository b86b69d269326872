//! # Probe Phases
//!
//! Purpose: Establish connectivity with a bounded retry loop, then exercise
//! each capability in turn and report pass/fail per phase.
//!
//! ## Design Principles
//! 1. **Fixed Backoff**: a constant delay between a bounded number of pings.
//! 2. **Independent Phases**: every phase runs and reports even if an earlier
//!    one failed; the overall result is their conjunction.
//! 3. **Self-Cleaning**: phases remove the keys and index they create.

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::thread;
use std::time::Duration;

use anyhow::{bail, ensure, Context};
use serde_json::json;
use stackkv_client::{fixtures, ConnectionSettings, DropOutcome, StackClient};
use tracing::debug;

use crate::container;

/// Variable naming the container whose logs are shown on failure.
pub const CONTAINER_VAR: &str = "REDIS_CONTAINER";
pub const DEFAULT_CONTAINER: &str = "redis-llm";

const TEST_KEY: &str = "test:hello";
const SEARCH_MODULE: &str = "search";
const INDEX_NAME: &str = "blog-idx";
const INDEX_PREFIX: &str = "blog:";
const DOC_KEY: &str = "blog:1";
const JSON_KEY: &str = "user:1";

/// Retry and diagnostics settings for one probe run.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    pub max_attempts: u32,
    pub retry_delay: Duration,
    pub container: String,
    /// Settings file to load; `None` means `.env` at the workspace root.
    pub env_file: Option<PathBuf>,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        ProbeConfig {
            max_attempts: 5,
            retry_delay: Duration::from_secs(2),
            container: DEFAULT_CONTAINER.to_string(),
            env_file: None,
        }
    }
}

impl ProbeConfig {
    pub fn from_env() -> Self {
        let mut config = ProbeConfig::default();
        if let Some(container) = env::var(CONTAINER_VAR).ok().filter(|name| !name.is_empty()) {
            config.container = container;
        }
        config
    }
}

type Phase = fn(&mut StackClient) -> anyhow::Result<()>;

/// Process exit status for a run.
pub fn exit_code(all_passed: bool) -> ExitCode {
    if all_passed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Runs the whole probe. Returns true when every phase passed.
pub fn run(config: &ProbeConfig) -> bool {
    let settings = match ConnectionSettings::from_env_file(config.env_file.as_deref()) {
        Ok(settings) => settings,
        Err(err) => {
            println!("❌ Error: {err}");
            return false;
        }
    };

    match settings.password() {
        Some(_) => println!("Using Redis password: {}", settings.password_preview()),
        None => println!("❌ No Redis password found in environment!"),
    }
    debug!(?settings, "resolved connection settings");

    check_store(settings, config)
}

/// Connects with retries, then runs every phase against the store.
pub fn check_store(settings: ConnectionSettings, config: &ProbeConfig) -> bool {
    let mut client = StackClient::new(settings);

    println!("Testing Redis connection...");
    if !wait_for_store(&mut client, config) {
        println!("❌ Failed to connect to Redis after multiple attempts");
        container::print_logs(&config.container);
        return false;
    }
    println!("✅ Successfully connected to Redis");

    show_server_info(&mut client);

    let phases: [(&str, Phase); 4] = [
        ("Basic Redis operations", basic_keys),
        ("RediSearch", search_index),
        ("RedisJSON", json_document),
        ("Cleanup", cleanup),
    ];

    let mut all_passed = true;
    for (name, phase) in phases {
        match phase(&mut client) {
            Ok(()) => println!("✅ {name} test successful"),
            Err(err) => {
                println!("❌ {name} test failed: {err:#}");
                all_passed = false;
            }
        }
    }

    client.close();
    all_passed
}

/// Pings until the store answers or the attempts run out.
fn wait_for_store(client: &mut StackClient, config: &ProbeConfig) -> bool {
    let max_attempts = config.max_attempts;
    retry(
        max_attempts,
        config.retry_delay,
        || match client.ping() {
            Ok(true) => Ok(()),
            Ok(false) => Err("store did not answer PING".to_string()),
            Err(err) => Err(err.to_string()),
        },
        |attempt, error| {
            println!("Waiting for Redis to be ready... (attempt {attempt}/{max_attempts})");
            println!("Error: {error}");
            container::print_logs(&config.container);
        },
    )
}

/// Calls `attempt` up to `max_attempts` times with a fixed `delay` between
/// tries. `on_failure` runs after every failed try that will be retried.
pub fn retry<A, F>(max_attempts: u32, delay: Duration, mut attempt: A, mut on_failure: F) -> bool
where
    A: FnMut() -> Result<(), String>,
    F: FnMut(u32, &str),
{
    for n in 1..=max_attempts {
        match attempt() {
            Ok(()) => return true,
            Err(error) if n < max_attempts => {
                on_failure(n, &error);
                thread::sleep(delay);
            }
            Err(error) => debug!(attempt = n, %error, "giving up"),
        }
    }
    false
}

fn show_server_info(client: &mut StackClient) {
    let result = client.get_version().and_then(|version| {
        let modules = client.list_modules()?;
        Ok((version, modules))
    });
    match result {
        Ok((version, modules)) => {
            println!("\nRedis Version: {version}");
            println!("\nLoaded Modules:");
            println!("{}", "-".repeat(50));
            for module in modules {
                println!("- {:<15} version: {}", module.name, module.version);
            }
            println!("{}\n", "-".repeat(50));
        }
        Err(err) => println!("❌ Error getting Redis information: {err}"),
    }
}

fn basic_keys(client: &mut StackClient) -> anyhow::Result<()> {
    let value = format!("Hello World! Timestamp: {}", chrono::Local::now());
    if !client.set_key(TEST_KEY, &value)? {
        bail!("SET {TEST_KEY} was not acknowledged");
    }
    let stored = client
        .get_key(TEST_KEY)?
        .with_context(|| format!("{TEST_KEY} missing right after SET"))?;
    ensure!(stored == value, "read back {stored:?}, expected {value:?}");
    Ok(())
}

fn search_index(client: &mut StackClient) -> anyhow::Result<()> {
    println!("Testing RediSearch functionality...");
    ensure!(
        client.has_module(SEARCH_MODULE)?,
        "RediSearch module is not loaded"
    );
    println!("✅ RediSearch module is loaded");

    match client.drop_search_index(INDEX_NAME)? {
        DropOutcome::Dropped => println!("✅ Dropped existing index"),
        DropOutcome::Missing => println!("No existing index to drop"),
    }

    println!("Creating search index...");
    client
        .create_search_index(INDEX_NAME, INDEX_PREFIX, &fixtures::blog_schema())
        .context("creating search index")?;
    println!("✅ Created search index");

    // Tear down even when populating or querying failed.
    let outcome = populate_and_query(client);
    let teardown = remove_search_data(client);
    outcome.and(teardown)
}

fn remove_search_data(client: &mut StackClient) -> anyhow::Result<()> {
    client
        .drop_search_index(INDEX_NAME)
        .context("dropping search index")?;
    client.delete_keys(&[DOC_KEY]).context("deleting test document")?;
    Ok(())
}

fn populate_and_query(client: &mut StackClient) -> anyhow::Result<()> {
    println!("Adding test document...");
    client
        .add_document(DOC_KEY, &fixtures::sample_blog_post())
        .context("adding test document")?;
    println!("✅ Added test document");

    println!("Performing search...");
    let results = client.search(INDEX_NAME, "Redis").context("searching")?;
    println!("Found {} documents", results.total);
    if let Some(first) = results.docs.first() {
        println!("First result: {}", serde_json::to_string(first)?);
    }
    ensure!(results.total > 0, "search for \"Redis\" matched nothing");
    Ok(())
}

fn json_document(client: &mut StackClient) -> anyhow::Result<()> {
    let user = fixtures::sample_user();
    client
        .set_json_value(JSON_KEY, "$", &user)
        .context("storing JSON document")?;

    let stored = client.get_json_value(JSON_KEY, None)?;
    ensure!(stored.as_ref() == Some(&user), "stored document differs: {stored:?}");

    let age = client.get_json_value(JSON_KEY, Some("$.profile.age"))?;
    let interests = client.get_json_value(JSON_KEY, Some("$.profile.interests"))?;
    println!("Retrieved age: {}", age.clone().unwrap_or_default());
    println!("Retrieved interests: {}", interests.unwrap_or_default());
    ensure!(age == Some(json!([30])), "unexpected age {age:?}");

    client.delete_keys(&[JSON_KEY])?;
    Ok(())
}

fn cleanup(client: &mut StackClient) -> anyhow::Result<()> {
    client.delete_keys(&[TEST_KEY, DOC_KEY, JSON_KEY])?;
    println!("✅ Cleaned up test data");
    Ok(())
}
