//! # Checklist Subcommand
//!
//! Prints the documents required for a product type. Evaluated locally from
//! the same static checklist the service uses, so no token is needed.

use anyhow::Result;
use clap::{Args, ValueEnum};
use dossier_core::{evaluate_checklist, ChecklistEntry, ProductType};

/// Arguments for the `dossier checklist` subcommand.
#[derive(Args, Debug)]
pub struct ChecklistArgs {
    /// Product type.
    #[arg(long, value_enum)]
    pub product_type: ProductKind,

    /// The product is sold under a licensed brand.
    #[arg(long)]
    pub brand: bool,

    /// Print JSON instead of a table.
    #[arg(long)]
    pub json: bool,
}

/// Product types accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProductKind {
    Food,
    Industrial,
}

impl From<ProductKind> for ProductType {
    fn from(kind: ProductKind) -> Self {
        match kind {
            ProductKind::Food => ProductType::Food,
            ProductKind::Industrial => ProductType::Industrial,
        }
    }
}

/// Execute the checklist subcommand.
pub fn run_checklist(args: &ChecklistArgs) -> Result<u8> {
    let entries: Vec<&ChecklistEntry> =
        evaluate_checklist(args.product_type.into(), args.brand).collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else {
        print!("{}", render_table(&entries));
    }
    Ok(0)
}

fn render_table(entries: &[&ChecklistEntry]) -> String {
    let width = entries
        .iter()
        .map(|e| e.document_type.as_str().len())
        .max()
        .unwrap_or(0);
    let mut out = String::new();
    for entry in entries {
        let flag = if entry.required { "required" } else { "optional" };
        out.push_str(&format!(
            "{:<width$}  {flag:<8}  {}\n",
            entry.document_type.as_str(),
            entry.label
        ));
    }
    out
}
