//! `schemes` command implementation.

use anyhow::{Context, Result};
use outputs::{Registry, SchemeInfo};

use crate::cli::SchemesArgs;

/// Execute the `schemes` command
pub fn run_schemes(args: &SchemesArgs) -> Result<()> {
    let schemes = Registry::new().schemes();

    if args.json {
        let json = serde_json::to_string_pretty(&schemes).context("Failed to serialize schemes")?;
        println!("{}", json);
    } else {
        print!("{}", render_table(&schemes));
    }
    Ok(())
}

fn render_table(schemes: &[SchemeInfo]) -> String {
    let mut out = String::from("SCHEME        KIND    ARGUMENT              ALIAS\n");
    for scheme in schemes {
        let kind = if scheme.listener { "listen" } else { "dial" };
        out.push_str(&format!(
            "{:<13} {:<7} {:<21} {}\n",
            scheme.name,
            kind,
            scheme.usage,
            scheme.alias.as_deref().unwrap_or("-")
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_lists_every_builtin() {
        let table = render_table(&Registry::new().schemes());
        assert_eq!(table.lines().count(), 14);
        assert!(table.contains("tcp-server"));
        assert!(table.lines().any(|l| l.starts_with("ws-listen") && l.contains("listen")));
    }
}
