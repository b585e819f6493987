//! Command-line front end, gated behind the `cli` feature. A thin shell
//! around the parser: it never touches the raster/stream/SQL engine
//! directly, since real row sources are external collaborators (§6).

use std::sync::Arc;

use clap::{Parser, Subcommand};
use strum_macros::{Display, EnumString};

use sheetql_parser::{Column, Expression, Locale, Value};

use crate::sql::{Dialect, GenericDialect, SqliteDialect};

#[derive(Parser)]
#[command(name = "sheetql", version, about = "Spreadsheet-like data-transformation engine")]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse a formula and print its expression tree.
    Parse {
        /// Formula text, including the leading '='.
        formula: String,
    },
    /// Parse and evaluate a formula with no row context.
    Eval {
        formula: String,
        /// The "current cell" value `Identity` resolves to, if any.
        #[arg(long)]
        cell: Option<String>,
    },
    /// Print the inference candidates that turn `from` into `to`.
    Infer {
        from: Option<String>,
        to: String,
        #[arg(long, default_value_t = 2)]
        level: u32,
        #[arg(long, default_value_t = 6)]
        complexity_bound: u32,
    },
    /// Show the SQL a `calculate` step lowers to under a given dialect.
    Lower {
        formula: String,
        /// Name of the computed column.
        #[arg(long, default_value = "result")]
        column: String,
        #[arg(long, value_enum, default_value_t = DialectKind::Generic)]
        dialect: DialectKind,
    },
}

/// Selects which [`Dialect`] a `Lower` invocation targets.
#[derive(Clone, Copy, Debug, EnumString, Display, clap::ValueEnum)]
#[strum(serialize_all = "snake_case")]
enum DialectKind {
    Generic,
    Sqlite,
}

impl DialectKind {
    fn dialect(self) -> Arc<dyn Dialect> {
        match self {
            DialectKind::Generic => Arc::new(GenericDialect),
            DialectKind::Sqlite => Arc::new(SqliteDialect),
        }
    }
}

pub fn main() -> anyhow::Result<()> {
    env_logger::builder().format_timestamp(None).init();
    let cli = Cli::parse();
    let locale = Locale::english();

    match cli.command {
        Command::Parse { formula } => match sheetql_parser::parse(&formula, &locale) {
            Some(expr) => println!("{expr:#?}"),
            None => anyhow::bail!("could not parse formula: {formula}"),
        },
        Command::Eval { formula, cell } => {
            let expr = sheetql_parser::parse(&formula, &locale)
                .ok_or_else(|| anyhow::anyhow!("could not parse formula: {formula}"))?;
            let input = cell.map(Value::string);
            let result = expr.apply(&[], &[], input.as_ref());
            println!("{result}");
        }
        Command::Infer { from, to, level, complexity_bound } => {
            let from_expr: Option<Expression> = match from {
                Some(f) => Some(
                    sheetql_parser::parse(&f, &locale)
                        .ok_or_else(|| anyhow::anyhow!("could not parse formula: {f}"))?,
                ),
                None => None,
            };
            let to_value = Value::string(to);
            let candidates = sheetql_parser::infer(
                from_expr.as_ref(),
                &to_value,
                &[],
                &[],
                level,
                complexity_bound,
            );
            if candidates.is_empty() {
                println!("(no candidates found)");
            }
            for candidate in candidates {
                println!("{candidate:?}");
            }
        }
        Command::Lower { formula, column, dialect } => {
            let expr = sheetql_parser::parse(&formula, &locale)
                .ok_or_else(|| anyhow::anyhow!("could not parse formula: {formula}"))?;
            let input = crate::sql::SqlData::from_table("input", vec![], dialect.dialect());
            match input.calculate(&[(Column::new(column), expr)]) {
                Some(lowered) => println!("{}", lowered.sql),
                None => println!("(not representable in {dialect}; falls back to the stream/raster engine)"),
            }
        }
    }
    Ok(())
}
