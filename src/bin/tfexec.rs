use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tfexec::{shared_writer, Context, Opt, Session, SessionConfig};
use tracing::{debug, error, info};

/// Drive the Terraform CLI from the command line
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// TOML file with session settings
    #[arg(long, global = true, env = "TFEXEC_CONFIG")]
    config: Option<PathBuf>,

    /// Terraform working directory
    #[arg(short = 'C', long, global = true, env = "TFEXEC_WORKING_DIR")]
    working_dir: Option<PathBuf>,

    /// Terraform executable, as a path or a name on PATH
    #[arg(long, global = true, env = "TFEXEC_PATH")]
    terraform: Option<PathBuf>,

    /// Give up after this many seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Seconds between interrupt and kill on cancellation; 0 kills at once
    #[arg(long, global = true)]
    graceful_timeout: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the engine and provider versions
    Version,

    /// Prepare the working directory
    Init {
        /// Upgrade modules and providers
        #[arg(long)]
        upgrade: bool,

        /// Partial backend configuration, repeatable
        #[arg(long = "backend-config")]
        backend_config: Vec<String>,
    },

    /// Compute a plan; exits 2 when there are changes
    Plan {
        /// Save the plan to this file
        #[arg(long)]
        out: Option<String>,

        /// Plan a destroy
        #[arg(long)]
        destroy: bool,

        #[command(flatten)]
        inputs: Inputs,
    },

    /// Apply changes, optionally from a saved plan
    Apply {
        /// Saved plan file
        plan: Option<String>,

        #[command(flatten)]
        inputs: Inputs,
    },

    /// Destroy everything in the state
    Destroy {
        #[command(flatten)]
        inputs: Inputs,
    },

    /// Print state, or a saved plan with --plan, as JSON
    Show {
        /// Plan file to render instead of the current state
        #[arg(long)]
        plan: Option<String>,
    },

    /// Print root module outputs as JSON
    Output {
        /// Single output to print
        name: Option<String>,
    },

    /// Validate the configuration and print diagnostics as JSON
    Validate,

    /// Check or rewrite formatting
    Fmt {
        /// Only report files that need formatting
        #[arg(long)]
        check: bool,

        /// Descend into subdirectories
        #[arg(long)]
        recursive: bool,
    },

    /// Manage workspaces
    Workspace {
        #[command(subcommand)]
        action: WorkspaceAction,
    },

    /// Inspect the state
    State {
        #[command(subcommand)]
        action: StateAction,
    },
}

#[derive(Subcommand)]
enum WorkspaceAction {
    /// List workspaces, marking the current one
    List,
    /// Print the current workspace
    Show,
    /// Create a workspace
    New { name: String },
    /// Switch to a workspace
    Select { name: String },
    /// Delete a workspace
    Delete {
        name: String,
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand)]
enum StateAction {
    /// List resource addresses
    List { addresses: Vec<String> },
    /// Print the raw state document
    Pull,
}

/// Variable and targeting flags shared by plan, apply and destroy
#[derive(clap::Args)]
struct Inputs {
    /// Input variable as NAME=VALUE, repeatable
    #[arg(long = "var")]
    vars: Vec<String>,

    /// Variable definitions file, repeatable
    #[arg(long = "var-file")]
    var_files: Vec<String>,

    /// Resource address to target, repeatable
    #[arg(long)]
    target: Vec<String>,
}

impl Commands {
    /// Commands whose engine output is shown live. The rest print a result
    /// of their own, so forwarding stdout too would show it twice.
    fn streams_output(&self) -> bool {
        matches!(
            self,
            Self::Init { .. }
                | Self::Plan { .. }
                | Self::Apply { .. }
                | Self::Destroy { .. }
                | Self::Fmt { check: false, .. }
                | Self::Workspace {
                    action: WorkspaceAction::New { .. }
                        | WorkspaceAction::Select { .. }
                        | WorkspaceAction::Delete { .. }
                }
        )
    }
}

impl Inputs {
    fn into_opts(self) -> Vec<Opt> {
        self.vars
            .into_iter()
            .map(Opt::Var)
            .chain(self.var_files.into_iter().map(Opt::VarFile))
            .chain(self.target.into_iter().map(Opt::Target))
            .collect()
    }
}

impl Cli {
    fn session(&self) -> Result<Session> {
        let mut config = match &self.config {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("reading {}", path.display()))?;
                toml::from_str::<SessionConfig>(&raw)
                    .with_context(|| format!("parsing {}", path.display()))?
            }
            None => SessionConfig::default(),
        };
        if let Some(dir) = &self.working_dir {
            config.working_dir = dir.clone();
        }
        if let Some(exec) = &self.terraform {
            config.exec_path = exec.clone();
        }
        if let Some(secs) = self.graceful_timeout {
            config.graceful_timeout_secs = secs;
        }
        debug!(?config, "session configuration");

        let mut session = Session::from_config(config)?;
        if self.command.streams_output() {
            session.set_stdout(Some(shared_writer(std::io::stdout())));
        }
        session.set_stderr(Some(shared_writer(std::io::stderr())));
        Ok(session)
    }

    fn context(&self) -> Context {
        let ctx = Context::new();
        match self.timeout {
            Some(secs) => ctx.with_timeout(Duration::from_secs(secs)),
            None => ctx,
        }
    }

    /// Run the selected command; returns the process exit code.
    async fn execute(self) -> Result<i32> {
        let session = self.session()?;
        let ctx = self.context();

        let interrupt = ctx.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupt received, stopping terraform");
                interrupt.cancel();
            }
        });

        match self.command {
            Commands::Version => {
                let info = session.version(&ctx, true).await?;
                println!("Terraform v{}", info.core);
                for (provider, version) in &info.providers {
                    println!("+ provider {provider} v{version}");
                }
            }
            Commands::Init {
                upgrade,
                backend_config,
            } => {
                let opts = std::iter::once(Opt::Upgrade(upgrade))
                    .chain(backend_config.into_iter().map(Opt::BackendConfig));
                session.init(&ctx, opts).await?;
            }
            Commands::Plan {
                out,
                destroy,
                inputs,
            } => {
                let mut opts = inputs.into_opts();
                opts.push(Opt::Destroy(destroy));
                if let Some(out) = out {
                    opts.push(Opt::Out(out));
                }
                if session.plan(&ctx, opts).await? {
                    return Ok(2);
                }
            }
            Commands::Apply { plan, inputs } => {
                let mut opts = inputs.into_opts();
                if let Some(plan) = plan {
                    opts.push(Opt::DirOrPlan(plan));
                }
                session.apply(&ctx, opts).await?;
            }
            Commands::Destroy { inputs } => session.destroy(&ctx, inputs.into_opts()).await?,
            Commands::Show { plan: Some(plan) } => {
                print_json(&session.show_plan_file(&ctx, &plan, []).await?)?;
            }
            Commands::Show { plan: None } => print_json(&session.show(&ctx, []).await?)?,
            Commands::Output { name: Some(name) } => {
                print_json(&session.output_named(&ctx, &name, []).await?)?;
            }
            Commands::Output { name: None } => print_json(&session.output(&ctx, []).await?)?,
            Commands::Validate => {
                let report = session.validate(&ctx, []).await?;
                print_json(&report)?;
                if !report.valid {
                    return Ok(1);
                }
            }
            Commands::Fmt { check: true, recursive } => {
                let check = session
                    .format_check(&ctx, [Opt::Recursive(recursive)])
                    .await?;
                for file in &check.unformatted_files {
                    println!("{file}");
                }
                if !check.formatted {
                    return Ok(3);
                }
            }
            Commands::Fmt {
                check: false,
                recursive,
            } => session.format_write(&ctx, [Opt::Recursive(recursive)]).await?,
            Commands::Workspace { action } => match action {
                WorkspaceAction::List => {
                    let workspaces = session.workspace_list(&ctx, []).await?;
                    for name in &workspaces.all {
                        let marker = if *name == workspaces.current { '*' } else { ' ' };
                        println!("{marker} {name}");
                    }
                }
                WorkspaceAction::Show => println!("{}", session.workspace_show(&ctx, []).await?),
                WorkspaceAction::New { name } => session.workspace_new(&ctx, &name, []).await?,
                WorkspaceAction::Select { name } => {
                    session.workspace_select(&ctx, &name, []).await?
                }
                WorkspaceAction::Delete { name, force } => {
                    session
                        .workspace_delete(&ctx, &name, [Opt::Force(force)])
                        .await?
                }
            },
            Commands::State { action } => match action {
                StateAction::List { addresses } => {
                    let addresses: Vec<&str> = addresses.iter().map(String::as_str).collect();
                    for address in session.state_list(&ctx, &addresses, []).await? {
                        println!("{address}");
                    }
                }
                StateAction::Pull => print!("{}", session.state_pull(&ctx, []).await?),
            },
        }
        Ok(0)
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with environment-based filtering
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.execute().await {
        Ok(0) => Ok(()),
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!("command failed: {:?}", e);
            eprintln!("Error: {e:#}");
            std::process::exit(1);
        }
    }
}
