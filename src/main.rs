use std::fs;
use std::process;

use clap::Parser;

use jsonata_eval::ast::Node;
use jsonata_eval::functions::Registry;
use jsonata_eval::Evaluator;

/// Evaluate a pre-parsed expression tree against a JSON document.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Expression tree as JSON. Prefix with @ to read from a file.
    ast: String,
    /// Input JSON document. Prefix with @ to read from a file; defaults to null.
    input: Option<String>,
    /// Pretty-print the result
    #[arg(long)]
    pretty: bool,
}

fn load(arg: &str) -> String {
    if let Some(path) = arg.strip_prefix('@') {
        match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                eprintln!("cannot read {path}: {e}");
                process::exit(1);
            }
        }
    } else {
        arg.to_string()
    }
}

fn main() {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let node: Node = match serde_json::from_str(&load(&args.ast)) {
        Ok(node) => node,
        Err(e) => {
            eprintln!("invalid expression tree: {e}");
            process::exit(1);
        }
    };

    let input: serde_json::Value = match args.input.as_deref() {
        Some(text) => match serde_json::from_str(&load(text)) {
            Ok(v) => v,
            Err(e) => {
                eprintln!("invalid input JSON: {e}");
                process::exit(1);
            }
        },
        None => serde_json::Value::Null,
    };

    let evaluator = Evaluator::new(Registry::with_builtins());
    match evaluator.evaluate_json(&node, &input) {
        // No value is distinct from null: print nothing.
        Ok(None) => {}
        Ok(Some(v)) => {
            let text = if args.pretty {
                serde_json::to_string_pretty(&v)
            } else {
                serde_json::to_string(&v)
            };
            match text {
                Ok(text) => println!("{text}"),
                Err(e) => {
                    eprintln!("cannot serialize result: {e}");
                    process::exit(1);
                }
            }
        }
        Err(e) => {
            eprintln!("evaluation error: {e}");
            process::exit(1);
        }
    }
}
