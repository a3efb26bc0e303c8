//! `dsl-transport`: inspect the route policy from the command line.
//!
//! ```bash
//! dsl-transport routes
//! dsl-transport landing driver
//! dsl-transport nav broker --json
//! dsl-transport check driver /payroll --explain
//! DSL_ROUTE_TABLE=./routes.json dsl-transport check none /profile
//! ```

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;

use dsl_app::AppConfig;
use dsl_auth::{AccessGate, GateOutcome, Navigator, Principal, RoleClaim, RoutePolicy};
use dsl_core::{RoutePath, UserId};
use dsl_observability::LogFormat;

#[derive(Parser)]
#[command(name = "dsl-transport")]
#[command(version)]
#[command(about = "Inspect the DSL Transport role-based route policy")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Route table JSON; overrides DSL_ROUTE_TABLE (defaults to the built-in table)
    #[arg(long, global = true)]
    routes: Option<PathBuf>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Command {
    /// List every route rule in declaration order
    Routes,

    /// Default landing route for a role
    Landing {
        /// admin, driver, broker, none, or any other string to test rejection
        role: String,
    },

    /// Navigation links shown to a role
    Nav { role: String },

    /// Gate decision for a role requesting a path
    Check {
        role: String,
        path: String,

        /// Include the reason behind the decision
        #[arg(long)]
        explain: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    dsl_observability::tracing::init(if cli.json { LogFormat::Json } else { LogFormat::Pretty });

    let mut config = AppConfig::from_env();
    if let Some(routes) = cli.routes.clone() {
        config = config.with_route_table(routes);
    }
    let policy = config.load_policy().context("loading route policy")?;

    match cli.command {
        Command::Routes => routes(&policy, cli.json),
        Command::Landing { role } => landing(&policy, &role, cli.json),
        Command::Nav { role } => nav(&policy, &role, cli.json),
        Command::Check { role, path, explain } => check(policy, &role, &path, explain, cli.json),
    }
}

/// `none` (or `anonymous`) is a principal without a role.
fn claim_from_arg(raw: &str) -> RoleClaim {
    match raw {
        "none" | "anonymous" => RoleClaim::Unassigned,
        other => RoleClaim::from_raw(Some(other)),
    }
}

fn principal_for(claim: RoleClaim) -> Principal {
    match claim {
        RoleClaim::Unassigned => Principal::anonymous(),
        claim => Principal::authenticated(UserId::new(), "cli@dsltransport.local", claim),
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn routes(policy: &RoutePolicy, json: bool) -> anyhow::Result<()> {
    if json {
        let rules: Vec<_> = policy.rules().collect();
        return print_json(&rules);
    }

    for rule in policy.rules() {
        match &rule.nav {
            Some(nav) => println!("{:<22} {:<24} nav: {}", rule.path, rule.access.to_string(), nav.label),
            None => println!("{:<22} {}", rule.path, rule.access),
        }
    }
    Ok(())
}

fn landing(policy: &RoutePolicy, role: &str, json: bool) -> anyhow::Result<()> {
    let claim = claim_from_arg(role);
    let landing = policy.default_landing_for(&claim);

    if json {
        #[derive(Serialize)]
        struct Landing<'a> {
            role: &'a RoleClaim,
            landing: &'a RoutePath,
        }
        return print_json(&Landing { role: &claim, landing });
    }

    println!("{landing}");
    Ok(())
}

fn nav(policy: &RoutePolicy, role: &str, json: bool) -> anyhow::Result<()> {
    let links = Navigator::links_for(policy, &principal_for(claim_from_arg(role)));

    if json {
        return print_json(&links);
    }

    if links.is_empty() {
        println!("(no navigation)");
    }
    for link in &links {
        println!("{:<22} {}", link.path, link.label);
    }
    Ok(())
}

fn check(policy: RoutePolicy, role: &str, path: &str, explain: bool, json: bool) -> anyhow::Result<()> {
    let path = RoutePath::parse(path).with_context(|| format!("invalid path '{path}'"))?;
    let principal = principal_for(claim_from_arg(role));
    let gate = AccessGate::new(policy.into());

    if explain {
        let explanation = gate.explain(&principal, &path);
        if json {
            return print_json(&explanation);
        }
        println!("{}", describe(&explanation.decision.outcome));
        println!("  {}", explanation.reason);
        if let Some(denial) = &explanation.denial {
            for suggestion in &denial.suggestions {
                println!("  hint: {suggestion}");
            }
        }
        return Ok(());
    }

    let decision = gate.decide(&principal, &path);
    if json {
        return print_json(&decision);
    }
    println!("{}", describe(&decision.outcome));
    Ok(())
}

fn describe(outcome: &GateOutcome) -> String {
    match outcome {
        GateOutcome::Loading => "loading".to_string(),
        GateOutcome::Render(path) => format!("render {path}"),
        GateOutcome::Redirect(path) => format!("redirect {path}"),
    }
}
