//! Clinic Portal Identity
//!
//! Runs the identity core against the hosted auth service and logs every
//! identity transition, with the landing the root route would choose for it,
//! until Ctrl-C.
//!
//! ## Configuration
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `CLINIC_PORTAL_CONFIG` | - | Optional config file (toml/json/yaml) |
//! | `CLINIC_PORTAL__PROVIDER__URL` | - | Hosted project URL (required) |
//! | `CLINIC_PORTAL__PROVIDER__ANON_KEY` | - | Public API key (required) |
//! | `CLINIC_PORTAL__PROFILES__SOURCE` | `rest` | `rest` or `postgres` |
//! | `CLINIC_PORTAL__DATABASE__URL` | - | Required for `postgres` |
//! | `CLINIC_PORTAL__LOG__JSON` | `false` | JSON log lines |
//! | `RUST_LOG` | `info` | Log filter |

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::info;

use clinic_portal_identity::adapters::{GoTrueSessionProvider, PgProfileResolver, RestProfileResolver};
use clinic_portal_identity::application::{IdentityRuntime, IdentityStateMachine};
use clinic_portal_identity::config::{PortalConfig, ProfileSource};
use clinic_portal_identity::domain::access::{AccessGate, RootLanding};
use clinic_portal_identity::ports::ProfileResolver;
use clinic_portal_identity::telemetry;

#[tokio::main]
async fn main() -> Result<()> {
    let config = PortalConfig::load().context("failed to load configuration")?;
    telemetry::init_tracing(&config.log).context("failed to install tracing subscriber")?;
    config.validate().context("invalid configuration")?;

    info!(
        environment = config.environment.as_str(),
        provider = %config.provider.url,
        "Starting clinic portal identity core"
    );

    let provider = Arc::new(GoTrueSessionProvider::new(config.provider.gotrue())?);

    let resolver: Arc<dyn ProfileResolver> = match config.profiles.source {
        ProfileSource::Rest => Arc::new(
            RestProfileResolver::new(config.provider.rest_profiles(&config.profiles.table))?
                .with_session_source(provider.clone()),
        ),
        ProfileSource::Postgres => {
            let database = config
                .database
                .as_ref()
                .context("profiles.source = postgres requires a database section")?;
            Arc::new(PgProfileResolver::connect(database, &config.profiles.table).await?)
        }
    };
    info!(source = ?config.profiles.source, table = %config.profiles.table, "Profile resolver initialized");

    let runtime = IdentityRuntime::start(IdentityStateMachine::new(provider, resolver));
    let mut reader = runtime.reader();
    let gate = AccessGate::default();

    loop {
        tokio::select! {
            _ = signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
            changed = reader.changed() => {
                let Some(state) = changed else {
                    break;
                };
                let landing = RootLanding::for_state(&gate, &state);
                info!(
                    phase = state.phase().as_str(),
                    principal_id = ?state.principal().map(|p| p.id.as_str()),
                    landing = ?landing,
                    "Identity updated"
                );
            }
        }
    }

    runtime.shutdown().await;
    Ok(())
}
