mod logging;

use anyhow::{Context, Result, anyhow, bail};
use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use indexmap::IndexMap;
use scl_stencil::SclDocument;
use scl_stencil::discovery::{DiscoveryOptions, discover_pairs};
use scl_stencil::matcher::MatchOptions;
use scl_stencil::model::StencilData;
use scl_stencil::stencil::{
    ApplicationMeta, ApplyOptions, ExcludedControlBlock, StencilApplication, candidate_ieds,
    ied_description,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Discover and re-apply GOOSE/SV subscription stencils in SCL files", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the IEDs of an SCL file
    Ieds {
        #[arg(value_name = "SCL_FILE")]
        scl: Utf8PathBuf,
    },
    /// Print the subscriptions between IEDs as JSON
    Discover {
        #[arg(value_name = "SCL_FILE")]
        scl: Utf8PathBuf,
        /// IED to include (at least two)
        #[arg(short, long = "ied", required = true)]
        ieds: Vec<String>,
        /// Ignore ExtRefs without serviceType
        #[arg(long)]
        strict: bool,
    },
    /// Capture the subscriptions between IEDs into a stencil file
    Capture {
        #[arg(value_name = "SCL_FILE")]
        scl: Utf8PathBuf,
        /// Stencil JSON file, created when missing
        #[arg(short, long)]
        stencil: Utf8PathBuf,
        /// IED=FUNCTION assignment, one per captured IED
        #[arg(short, long = "function", value_parser = parse_key_value, required = true)]
        functions: Vec<(String, String)>,
        /// Control block to leave out, as ID,FROM,TO
        #[arg(long = "exclude", value_parser = parse_excluded)]
        excluded: Vec<ExcludedControlBlock>,
        #[arg(long)]
        category: String,
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long = "app-version")]
        app_version: String,
        #[arg(long, default_value = "")]
        version_description: String,
        #[arg(long)]
        deprecated: bool,
        /// Ignore ExtRefs without serviceType
        #[arg(long)]
        strict: bool,
    },
    /// List the applications of a stencil, or the functions of one version
    Functions {
        #[arg(value_name = "STENCIL_FILE")]
        stencil: Utf8PathBuf,
        #[arg(long, requires_all = ["name", "app_version"])]
        category: Option<String>,
        #[arg(long)]
        name: Option<String>,
        #[arg(long = "app-version")]
        app_version: Option<String>,
        /// Show candidate IEDs from this SCL file
        #[arg(long)]
        scl: Option<Utf8PathBuf>,
        /// Include deprecated versions
        #[arg(long)]
        all: bool,
    },
    /// Apply a stencil application to an SCL file
    Apply {
        #[arg(value_name = "SCL_FILE")]
        scl: Utf8PathBuf,
        #[arg(short, long)]
        stencil: Utf8PathBuf,
        #[arg(long)]
        category: String,
        #[arg(long)]
        name: String,
        #[arg(long = "app-version")]
        app_version: String,
        /// FUNCTION=IED binding
        #[arg(short, long = "bind", value_parser = parse_key_value, required = true)]
        bindings: Vec<(String, String)>,
        /// Output file; the input is overwritten when omitted
        #[arg(short, long)]
        output: Option<Utf8PathBuf>,
    },
}

fn parse_key_value(s: &str) -> Result<(String, String)> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| anyhow!("expected KEY=VALUE, got {}", s))?;
    Ok((key.to_string(), value.to_string()))
}

fn parse_excluded(s: &str) -> Result<ExcludedControlBlock> {
    let parts: Vec<&str> = s.split(',').collect();
    let [id, from, to] = parts.as_slice() else {
        bail!("expected ID,FROM,TO, got {}", s);
    };
    Ok(ExcludedControlBlock {
        id: id.to_string(),
        from: from.to_string(),
        to: to.to_string(),
    })
}

fn discovery_options(strict: bool) -> DiscoveryOptions {
    DiscoveryOptions {
        matching: if strict {
            MatchOptions::strict()
        } else {
            MatchOptions::default()
        },
        ..Default::default()
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose).context("Failed to initialise logging")?;

    match cli.command {
        Command::Ieds { scl } => {
            let doc = SclDocument::from_path(&scl)?;
            for ied in doc.ieds() {
                let (first, second) = ied_description(&doc, ied);
                println!("{}", first);
                if !second.is_empty() {
                    println!("    {}", second);
                }
            }
        }
        Command::Discover { scl, ieds, strict } => {
            let doc = SclDocument::from_path(&scl)?;
            let infos = discover_pairs(&doc, &ieds, &discovery_options(strict))?;
            println!("{}", serde_json::to_string_pretty(&infos)?);
        }
        Command::Capture {
            scl,
            stencil,
            functions,
            excluded,
            category,
            name,
            description,
            app_version,
            version_description,
            deprecated,
            strict,
        } => {
            let doc = SclDocument::from_path(&scl)?;
            let functions: IndexMap<String, String> = functions.into_iter().collect();
            let ieds: Vec<String> = functions.keys().cloned().collect();
            let infos = discover_pairs(&doc, &ieds, &discovery_options(strict))?;
            let mut data = if stencil.exists() {
                StencilData::load(&stencil)?
            } else {
                StencilData::default()
            };
            let meta = ApplicationMeta {
                category,
                name,
                description,
                version: app_version,
                version_description,
                deprecated,
            };
            data.add_application(&doc, &infos, &functions, &excluded, &meta)?;
            data.save(&stencil)?;
            println!(
                "{}/{} version {} saved to {}",
                meta.category, meta.name, meta.version, stencil
            );
        }
        Command::Functions {
            stencil,
            category,
            name,
            app_version,
            scl,
            all,
        } => {
            let data = StencilData::load(&stencil)?;
            let (Some(category), Some(name), Some(app_version)) = (category, name, app_version) else {
                println!("{} {}", data.name, data.version);
                for (app, versions) in data.applications(all) {
                    println!("{} / {}: {}", app.category, app.name, app.description);
                    for version in versions {
                        let mark = if version.deprecated { " (deprecated)" } else { "" };
                        println!("    {}{} {}", version.version, mark, version.description);
                    }
                }
                return Ok(());
            };
            let application = data
                .find_version(&category, &name, &app_version)
                .ok_or_else(|| anyhow!("No application {}/{} version {}", category, name, app_version))?;
            let doc = scl.as_ref().map(|p| SclDocument::from_path(p)).transpose()?;
            for (function, requirement) in &application.ieds {
                println!(
                    "{}: {} {} (captured from {})",
                    function, requirement.manufacturer, requirement.ied_type, requirement.original_name
                );
                if let Some(doc) = &doc {
                    let candidates: Vec<&str> = candidate_ieds(doc, requirement)
                        .into_iter()
                        .map(|ied| doc.attribute_or_empty(ied, "name"))
                        .collect();
                    println!("    candidates: {}", candidates.join(", "));
                }
            }
        }
        Command::Apply {
            scl,
            stencil,
            category,
            name,
            app_version,
            bindings,
            output,
        } => {
            let mut doc = SclDocument::from_path(&scl)?;
            let data = StencilData::load(&stencil)?;
            let application = data
                .find_version(&category, &name, &app_version)
                .ok_or_else(|| anyhow!("No application {}/{} version {}", category, name, app_version))?;
            let mut run = StencilApplication::new(application);
            for (function, ied) in &bindings {
                run.bind(&doc, function, ied)?;
            }
            let report = run.apply(&mut doc, &ApplyOptions::default())?;
            let target = output.unwrap_or(scl);
            doc.save(&target)
                .with_context(|| format!("Failed to write {}", target))?;
            println!("{}", report.summary());
            for error in &report.errors {
                println!("    {}", error);
            }
        }
    }
    Ok(())
}
