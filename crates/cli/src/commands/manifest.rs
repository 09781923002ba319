// `folio commands`: the slash-command registration manifest.
//
// The gateway registers these per workspace; JSON output is the payload it
// expects, human output is a usage table.

use clap::Args;
use folio_common::protocol::command::{command_spec, CommandSpec, COMMANDS};

use crate::output::{self, OutputFormat};

#[derive(Debug, Args)]
pub struct ManifestArgs {
    /// Show a single command with its options.
    pub name: Option<String>,

    /// Force JSON output.
    #[arg(long)]
    json: bool,
}

pub fn run(args: ManifestArgs) -> anyhow::Result<()> {
    let format = OutputFormat::detect(args.json);

    let specs: Vec<&CommandSpec> = match args.name.as_deref() {
        None => COMMANDS.iter().collect(),
        Some(name) => match command_spec(name.trim_start_matches('/')) {
            Some(spec) => vec![spec],
            None => {
                let error = anyhow::anyhow!("unknown command `{name}`");
                output::print_anyhow_error(format, &error);
                return Err(error);
            }
        },
    };

    output::print_output(format, &specs, |specs| format_human(specs))?;
    Ok(())
}

fn format_human(specs: &[&CommandSpec]) -> String {
    if let [spec] = specs {
        return format_detail(spec);
    }

    let width = specs.iter().map(|spec| spec.usage().len()).max().unwrap_or(0);
    specs
        .iter()
        .map(|spec| format!("{:<width$}  {}", spec.usage(), spec.description))
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_detail(spec: &CommandSpec) -> String {
    let mut lines = vec![spec.usage(), format!("  {}", spec.description)];
    for option in spec.options {
        let mut flags = Vec::new();
        if option.required {
            flags.push("required");
        }
        if option.autocomplete {
            flags.push("autocomplete");
        }
        let flags = if flags.is_empty() { String::new() } else { format!(" ({})", flags.join(", ")) };
        lines.push(format!("  {:<12} {:?}{flags}  {}", option.name, option.kind, option.description));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_lists_every_command() {
        let specs: Vec<&CommandSpec> = COMMANDS.iter().collect();
        let table = format_human(&specs);
        assert_eq!(table.lines().count(), COMMANDS.len());
        assert!(table.lines().any(|line| line.starts_with("/page-rename query title [keep_slug]")));
    }

    #[test]
    fn detail_marks_autocomplete_options() {
        let spec = command_spec("page-open").expect("page-open is registered");
        let detail = format_human(&[spec]);
        assert!(detail.starts_with("/page-open query\n"));
        assert!(detail.contains("(required, autocomplete)"));
    }

    #[test]
    fn manifest_serializes_for_registration() {
        let value = serde_json::to_value(COMMANDS).expect("manifest should serialize");
        let rename = value
            .as_array()
            .expect("array")
            .iter()
            .find(|spec| spec["name"] == "page-rename")
            .expect("page-rename listed");
        assert_eq!(rename["options"][2]["name"], "keep_slug");
        assert_eq!(rename["options"][2]["kind"], "boolean");
    }
}
