use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::info;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use crate::auth::{FlyRc, Token};
use crate::concourse::ConcourseClient;
use crate::config::{ConcourseConfig, Config, OutputFormat};
use crate::error::BlockersError;
use crate::output::{export_report, Export};
use crate::pipeline::DedupMode;
use crate::report::PipelineInspector;

#[derive(Parser)]
#[command(name = "concourse-blockers")]
#[command(author, version, about = "What is holding back your Concourse jobs", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to ./blockers.{toml,json,yaml,yml})
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Write the report to a file instead of stdout
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    #[arg(long, global = true, value_enum)]
    format: Option<OutputFormat>,

    /// Pretty-print JSON output
    #[arg(long, global = true, default_value_t = false)]
    pretty: bool,
}

#[derive(Args, Debug, Clone)]
struct ConnectionArgs {
    /// fly target to read the URL, team and token from, e.g. ci
    #[arg(short, long)]
    target: Option<String>,

    /// Concourse URL; takes precedence over the fly target
    #[arg(long, env = "CONCOURSE_URL")]
    url: Option<String>,

    #[arg(long)]
    team: Option<String>,

    #[arg(long, env = "CONCOURSE_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Skip TLS certificate verification
    #[arg(short = 'k', long, default_value_t = false)]
    insecure: bool,

    /// Pipeline name, e.g. master
    #[arg(short, long)]
    pipeline: String,
}

#[derive(Subcommand)]
enum Commands {
    /// List the jobs that must pass each resource before a job triggers
    Prereqs {
        #[command(flatten)]
        connection: ConnectionArgs,

        /// Only this job
        #[arg(short, long)]
        job: Option<String>,

        /// Only this resource
        #[arg(short, long)]
        resource: Option<String>,

        #[arg(long, value_enum)]
        mode: Option<DedupMode>,
    },
    /// Enumerate every passed chain into a job
    Paths {
        #[command(flatten)]
        connection: ConnectionArgs,

        #[arg(short, long)]
        job: String,

        /// Only this resource
        #[arg(short, long)]
        resource: Option<String>,
    },
    /// Show the latest build of every gating job for the newest resource versions
    Status {
        #[command(flatten)]
        connection: ConnectionArgs,

        #[arg(short, long)]
        job: String,

        #[arg(long, value_enum)]
        mode: Option<DedupMode>,
    },
}

/// Where and how to reach Concourse, after merging flags, config and fly target.
#[derive(Debug)]
struct Connection {
    url: String,
    team: String,
    token: Option<Token>,
    insecure: bool,
}

/// Resolves the connection: an explicit URL (flag, env or config) wins,
/// otherwise the fly target is read from the flyrc.
fn resolve_connection(
    args: &ConnectionArgs,
    config: &ConcourseConfig,
) -> crate::error::Result<Connection> {
    let token = args.token.clone().or_else(|| config.token.clone());

    if let Some(url) = args.url.clone().or_else(|| config.url.clone()) {
        return Ok(Connection {
            url,
            team: args.team.clone().unwrap_or_else(|| config.team.clone()),
            token: token.map(Token::from),
            insecure: args.insecure || config.insecure,
        });
    }

    let Some(name) = args.target.as_deref().or(config.target.as_deref()) else {
        return Err(BlockersError::Config(
            "No Concourse URL or fly target given; pass --url or -t".to_string(),
        ));
    };

    let flyrc = FlyRc::load(config.flyrc.as_deref())?;
    let target = flyrc.target(name)?;
    info!("Using fly target {name} at {}", target.api);

    Ok(Connection {
        url: target.api.clone(),
        team: args.team.clone().unwrap_or_else(|| target.team.clone()),
        token: token.map(Token::from).or_else(|| target.token()),
        insecure: args.insecure || config.insecure || target.insecure,
    })
}

impl Cli {
    fn inspector(&self, args: &ConnectionArgs, config: &Config) -> Result<PipelineInspector> {
        let connection = resolve_connection(args, &config.concourse)?;
        let client = ConcourseClient::new(
            &connection.url,
            &connection.team,
            connection.token,
            connection.insecure,
        )?;
        Ok(PipelineInspector::new(client, args.pipeline.clone()))
    }

    fn emit<R: Export>(&self, report: &R, config: &Config) -> Result<()> {
        let format = self.format.unwrap_or(config.output.format);
        let pretty = self.pretty || config.output.pretty;

        if let Some(output_path) = &self.output {
            let file = File::create(output_path)
                .with_context(|| format!("Failed to create {}", output_path.display()))?;
            let mut writer = BufWriter::new(file);
            export_report(report, format, pretty, &mut writer)?;
            writer.flush()?;
            info!("Report written to: {}", output_path.display());
        } else {
            let stdout = std::io::stdout();
            let mut handle = stdout.lock();
            export_report(report, format, pretty, &mut handle)?;
        }

        Ok(())
    }

    pub async fn execute(&self) -> Result<()> {
        let config = Config::load(self.config.as_deref())?;

        match &self.command {
            Commands::Prereqs {
                connection,
                job,
                resource,
                mode,
            } => {
                let inspector = self.inspector(connection, &config)?;
                let report = inspector
                    .prerequisites(
                        job.as_deref(),
                        resource.as_deref(),
                        mode.unwrap_or(config.resolver.mode),
                    )
                    .await?;
                self.emit(&report, &config)
            }
            Commands::Paths {
                connection,
                job,
                resource,
            } => {
                let inspector = self.inspector(connection, &config)?;
                let report = inspector.paths(job, resource.as_deref()).await?;
                self.emit(&report, &config)
            }
            Commands::Status {
                connection,
                job,
                mode,
            } => {
                let inspector = self.inspector(connection, &config)?;
                let report = inspector
                    .blockers(job, mode.unwrap_or(config.resolver.mode))
                    .await?;
                self.emit(&report, &config)
            }
        }
    }
}
