//! `mofa-capacity list` command implementation

use crate::output::{self, Table};
use colored::Colorize;
use mofa_capacity::{ArchitectureDescriptor, builtin_registry};

/// Execute the `mofa-capacity list` command
pub fn run(json: bool) -> anyhow::Result<()> {
    let registry = builtin_registry()?;
    let architectures: Vec<&ArchitectureDescriptor> = registry.list().collect();

    if json {
        output::print_json(&architectures)?;
        return Ok(());
    }

    println!("{} Registered architectures", "→".green());
    println!();

    let mut table = Table::builder().headers(&[
        "Architecture",
        "Default encoding",
        "Encodings (cache strategies)",
        "Weights format",
        "Example repos",
    ]);
    for arch in &architectures {
        table = table.add_row(vec![
            arch.name.clone(),
            arch.default_encoding.to_string(),
            encodings_cell(arch),
            arch.default_weights_format.to_string(),
            arch.example_repo_ids.join(", "),
        ]);
    }
    println!("{}", table.build());

    Ok(())
}

fn encodings_cell(arch: &ArchitectureDescriptor) -> String {
    arch.supported_encodings
        .iter()
        .map(|(encoding, strategies)| {
            let strategies: Vec<&str> = strategies.iter().map(|s| s.as_str()).collect();
            format!("{encoding} ({})", strategies.join(", "))
        })
        .collect::<Vec<_>>()
        .join("\n")
}
