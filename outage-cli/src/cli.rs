use std::{
    io::{IsTerminal, Write},
    path::PathBuf,
    time::Duration,
};

use clap::{Parser, Subcommand};
use outage_core::{
    Address, ConfigStore, Error, OutageProvider, ProviderOptions, provider::DEFAULT_BASE_URL,
    provider_from_options,
};
use serde_json::json;

use crate::render;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(
    name = "outage-checker",
    version,
    about = "Check DTEK electricity outage schedules from the command line"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Print machine-readable JSON instead of text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Config file to use instead of the per-user default.
    #[arg(long, global = true, env = "OUTAGE_CHECKER_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Provider base URL.
    #[arg(long, global = true, env = "OUTAGE_CHECKER_BASE_URL", default_value = DEFAULT_BASE_URL, hide = true)]
    pub base_url: String,

    /// Request timeout in seconds.
    #[arg(long, global = true, env = "OUTAGE_CHECKER_TIMEOUT", default_value_t = 30, value_name = "SECS")]
    pub timeout: u64,

    /// Log debug information to stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Check the outage schedule for an address.
    Check {
        /// Address as "city, street, house". Uses the default address if omitted.
        address: Option<String>,
    },

    /// Save the default address used by `check`.
    SetAddress {
        /// Address as "city, street, house".
        address: String,

        /// Save without asking the provider whether the house exists.
        #[arg(long)]
        no_verify: bool,
    },

    /// Show the saved default address.
    ShowAddress,

    /// Forget the saved default address.
    ClearAddress,

    /// List all available cities/settlements.
    ListCities,

    /// List the streets of a city.
    ListStreets {
        /// City/settlement name.
        city: String,
    },

    /// List the houses on a street.
    ListHouses {
        /// City/settlement name.
        city: String,
        /// Street name.
        street: String,
    },
}

/// What a command needs to run.
pub struct Session<'a> {
    pub store: ConfigStore,
    pub provider: &'a dyn OutageProvider,
    pub json: bool,
    /// Whether we may prompt on the terminal.
    pub interactive: bool,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let store = match &self.config {
            Some(path) => ConfigStore::new(path),
            None => ConfigStore::from_default_location()?,
        };
        let provider = provider_from_options(&ProviderOptions {
            base_url: self.base_url.clone(),
            timeout: Duration::from_secs(self.timeout),
        })?;

        let session = Session {
            store,
            provider: provider.as_ref(),
            json: self.json,
            interactive: std::io::stdin().is_terminal() && std::io::stdout().is_terminal(),
        };

        let mut stdout = std::io::stdout();
        self.command.execute(&session, &mut stdout).await?;
        stdout.flush()?;
        Ok(())
    }
}

impl Command {
    pub async fn execute(self, session: &Session<'_>, out: render::Out<'_>) -> anyhow::Result<()> {
        match self {
            Command::Check { address } => {
                let address = resolve_address(session, address.as_deref(), out).await?;
                tracing::info!(%address, "checking schedule");

                let windows =
                    session.provider.get_outages(&address.city, &address.street, &address.house).await?;

                if session.json {
                    render::json(out, &json!({ "address": address, "outages": windows }))
                } else {
                    render::outages(out, &address, &windows)
                }
            }
            Command::SetAddress { address, no_verify } => {
                let address: Address = address.parse()?;
                let group = if no_verify { None } else { Some(verify(session, &address).await?) };

                session.store.update(|cfg| cfg.set_default_address(address.clone()))?;

                if session.json {
                    return render::json(out, &json!({ "default_address": address, "group": group }));
                }
                writeln!(out, "Default address set to: {address}")?;
                if let Some(group) = group {
                    writeln!(out, "Power group: {group}")?;
                }
                Ok(())
            }
            Command::ShowAddress => {
                let cfg = session.store.load()?;
                if session.json {
                    return render::json(out, &json!({ "default_address": cfg.default_address }));
                }
                match cfg.default_address {
                    Some(address) => writeln!(out, "Default address: {address}")?,
                    None => {
                        writeln!(out, "No default address configured.")?;
                        writeln!(out, "Use `outage-checker set-address \"city, street, house\"` to set one.")?;
                    }
                }
                Ok(())
            }
            Command::ClearAddress => {
                let mut removed = None;
                session.store.update(|cfg| removed = cfg.clear_default_address())?;

                if session.json {
                    return render::json(out, &json!({ "cleared": removed }));
                }
                match removed {
                    Some(_) => writeln!(out, "Default address cleared.")?,
                    None => writeln!(out, "No default address was set.")?,
                }
                Ok(())
            }
            Command::ListCities => {
                let cities = session.provider.list_cities().await?;
                if session.json { render::json(out, &cities) } else { render::cities(out, &cities) }
            }
            Command::ListStreets { city } => {
                let streets = session.provider.list_streets(&city).await?;
                if session.json { render::json(out, &streets) } else { render::streets(out, &city, &streets) }
            }
            Command::ListHouses { city, street } => {
                let houses = session.provider.list_houses(&city, &street).await?;
                if session.json {
                    render::json(out, &houses)
                } else {
                    render::houses(out, &city, &street, &houses)
                }
            }
        }
    }
}

/// Explicit argument, else the saved default, else (on a terminal) ask.
async fn resolve_address(
    session: &Session<'_>,
    explicit: Option<&str>,
    out: render::Out<'_>,
) -> anyhow::Result<Address> {
    if let Some(raw) = explicit {
        return Ok(raw.parse()?);
    }

    if let Some(address) = session.store.load()?.default_address {
        tracing::debug!(%address, "using default address");
        return Ok(address);
    }

    if session.interactive && !session.json {
        if let Some(address) = prompt_default_address(session, out).await? {
            return Ok(address);
        }
    }

    Err(Error::usage(
        "no address provided and no default set\n\
         Hint: run `outage-checker check \"city, street, house\"` or `outage-checker set-address \"city, street, house\"`.",
    )
    .into())
}

/// First-run flow: offer to save a default address.
async fn prompt_default_address(
    session: &Session<'_>,
    out: render::Out<'_>,
) -> anyhow::Result<Option<Address>> {
    writeln!(out, "No default address configured.")?;
    let wanted = inquire::Confirm::new("Set a default address now?")
        .with_default(true)
        .with_help_message("It is saved so you don't have to type it every time.")
        .prompt()
        .map_err(|e| prompt_failed("answer", e))?;

    if !wanted {
        return Ok(None);
    }

    writeln!(
        out,
        "Tip: use `list-cities`, `list-streets <CITY>` and `list-houses <CITY> <STREET>` to find your address."
    )?;
    let raw = inquire::Text::new("Your address (city, street, house):")
        .prompt()
        .map_err(|e| prompt_failed("address", e))?;
    let address: Address = raw.parse()?;

    let group = verify(session, &address).await?;
    session.store.update(|cfg| cfg.set_default_address(address.clone()))?;
    writeln!(out, "Default address saved (power group: {group}).\n")?;

    Ok(Some(address))
}

/// A prompt that cannot be answered (closed stdin, Ctrl-C) is a usage error.
fn prompt_failed(what: &str, err: inquire::InquireError) -> Error {
    Error::usage(format!("Failed to read {what}: {err}"))
}

/// Ask the provider for the house's power group; unknown houses are an error.
async fn verify(session: &Session<'_>, address: &Address) -> anyhow::Result<String> {
    let group = session
        .provider
        .resolve_group(address)
        .await?
        .ok_or_else(|| Error::not_found("house", address.to_string()))?;
    Ok(group)
}

/// Exit code for a failed command.
///
/// Failures that did not come from an [`Error`] (I/O on stdout, for one)
/// exit with 1.
pub fn exit_code(err: &anyhow::Error) -> u8 {
    err.downcast_ref::<Error>().map_or(1, Error::exit_code)
}

pub fn hint(err: &anyhow::Error) -> Option<&'static str> {
    err.downcast_ref::<Error>().and_then(Error::hint)
}
