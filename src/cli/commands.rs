//! Command dispatch: resolves the member document, loads settings and runs
//! one subcommand against the service container.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use clap::CommandFactory;
use clap_complete::generate;
use tracing::{debug, instrument};

use crate::application::services::NewMember;
use crate::application::ApplicationError;
use crate::cli::args::{Cli, Commands, ConfigCommands};
use crate::cli::error::{CliError, CliResult};
use crate::cli::output;
use crate::config::{global_config_path, local_config_path, Settings};
use crate::domain::MemberId;
use crate::infrastructure::di::ServiceContainer;
use crate::infrastructure::{InfraError, InfraResult};
use crate::tree_traits::TreeNodeConvert;

pub fn execute_command(cli: &Cli) -> CliResult<()> {
    match &cli.command {
        Commands::Completion { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(*shell, &mut cmd, name, &mut io::stdout());
            Ok(())
        }
        Commands::Config { command } => {
            let (settings, document) = load_settings(cli.file.as_deref())?;
            run_config(command, &settings, document.as_deref())
        }
        command => {
            let (settings, document) = load_settings(cli.file.as_deref())?;
            let document = document.ok_or_else(|| {
                CliError::Usage(
                    "no member document: pass --file or set `default_document`".to_string(),
                )
            })?;
            let container = ServiceContainer::new(settings);
            run_document_command(command, &container, &document)
        }
    }
}

/// The document flag wins over `default_document`; settings are reloaded with
/// the local config next to whichever document was chosen.
fn load_settings(file: Option<&Path>) -> CliResult<(Settings, Option<PathBuf>)> {
    let settings = Settings::load(file.and_then(Path::parent))?;
    let document = file
        .map(Path::to_path_buf)
        .or_else(|| settings.default_document.clone());

    let settings = match (file, document.as_deref().and_then(Path::parent)) {
        (None, Some(dir)) => Settings::load(Some(dir))?,
        _ => settings,
    };
    debug!("load_settings: document={:?}", document);
    Ok((settings, document))
}

#[instrument(level = "debug", skip(container))]
fn run_document_command(
    command: &Commands,
    container: &ServiceContainer,
    document: &Path,
) -> CliResult<()> {
    let settings = &container.settings;
    match command {
        Commands::Tree => {
            let Some(genogram) = container.family_service().build(document)? else {
                output::warning("empty family");
                return Ok(());
            };
            write_stdout(&genogram.to_tree_string().to_string())?;
            let problems = genogram.diagnostics().len();
            if problems > 0 {
                output::warning(&format!(
                    "{problems} problem(s) found, run `genotree check` for details"
                ));
            }
            Ok(())
        }
        Commands::Layout { width } => {
            let mut params = settings.layout.clone();
            if let Some(width) = width {
                params.width = *width;
            }
            let Some(layout) = container.family_service().layout(document, &params)? else {
                output::warning("empty family");
                return Ok(());
            };
            let json = serde_json::to_string_pretty(&layout).map_err(|e| {
                ApplicationError::OperationFailed {
                    context: "serialize layout".to_string(),
                    source: Box::new(e),
                }
            })?;
            Ok(write_stdout(&json)?)
        }
        Commands::Spouses => {
            let Some(genogram) = container.family_service().build(document)? else {
                output::warning("empty family");
                return Ok(());
            };
            // mutual links print once
            let couples = genogram
                .spouses()
                .iter()
                .filter(|&(a, b)| a < b || genogram.spouse_of(b) != Some(a));
            for (member, spouse) in couples {
                let name = |id: &MemberId| {
                    genogram
                        .member(id)
                        .map(|m| m.display_name().to_string())
                        .unwrap_or_default()
                };
                output::info(&format!(
                    "{} ({}) ⚭ {} ({})",
                    name(member),
                    member,
                    name(spouse),
                    spouse
                ));
            }
            Ok(())
        }
        Commands::Check => {
            let Some(genogram) = container.family_service().build(document)? else {
                output::success("empty family, nothing to check");
                return Ok(());
            };
            let diagnostics = genogram.diagnostics();
            if diagnostics.is_empty() {
                output::success(&format!("{} member(s), no problems", genogram.member_count()));
                return Ok(());
            }
            output::header(&document.display());
            for diagnostic in diagnostics {
                output::failure(diagnostic);
            }
            Err(CliError::Diagnostics(diagnostics.len()))
        }
        Commands::Show { id } => {
            let details = container
                .family_service()
                .member_details(document, id, &settings.photos)?;
            output::header(&format!("{} ({})", details.name, details.id));
            output::field("gender", &details.gender);
            let role = if details.is_admin {
                format!("{} (admin)", details.role)
            } else {
                details.role.clone()
            };
            output::field("role", &role);
            output::field("photo", &details.photo);
            if let Some(spouse) = &details.spouse {
                output::field("spouse", spouse);
            }
            if !details.parents.is_empty() {
                output::field("parents", &details.parents.join(", "));
            }
            for (label, value) in &details.custom_fields {
                output::field(label, value);
            }
            Ok(())
        }
        Commands::Add {
            name,
            gender,
            birth_year,
            photo_url,
            relation,
        } => {
            if name.trim().is_empty() {
                return Err(CliError::InvalidArgs("name must not be empty".to_string()));
            }
            let new_member = NewMember {
                name: name.clone(),
                gender: gender.clone(),
                birth_year: *birth_year,
                photo_url: photo_url.clone(),
            };
            let id = container
                .member_service()
                .add_member(document, new_member, relation)?;
            output::action("Added", &id);
            Ok(())
        }
        Commands::Link { id, relation } => {
            container.member_service().link(document, id, relation)?;
            output::action("Linked", &format!("{id} {relation}"));
            Ok(())
        }
        Commands::Unlink { id } => {
            container.member_service().unlink(document, id)?;
            output::action("Unlinked", id);
            Ok(())
        }
        Commands::Config { .. } | Commands::Completion { .. } => Err(CliError::Usage(
            "command does not operate on a member document".to_string(),
        )),
    }
}

fn run_config(
    command: &ConfigCommands,
    settings: &Settings,
    document: Option<&Path>,
) -> CliResult<()> {
    match command {
        ConfigCommands::Show => Ok(write_stdout(&settings.to_toml()?)?),
        ConfigCommands::Path => {
            match global_config_path() {
                Some(path) => output::field("global", &path.display()),
                None => output::field("global", "<no config directory>"),
            }
            if let Some(dir) = document.and_then(Path::parent) {
                output::field("local", &local_config_path(dir).display());
            }
            Ok(())
        }
    }
}

fn write_stdout(content: &str) -> InfraResult<()> {
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{content}").map_err(|e| InfraError::io("write stdout", e))
}
