//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `footnote_core` linkage against a real store file.
//! - Keep output deterministic for quick local sanity checks.
//!
//! Usage:
//!   footnote_cli <db_path> [list]
//!   footnote_cli <db_path> search <filter>
//!   footnote_cli <db_path> add <text> <title> <author>

use footnote_core::{bootstrap, CoreConfig, NewQuote, Quote};
use std::process::ExitCode;

fn main() -> ExitCode {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let Some((db_path, command)) = args.split_first() else {
        eprintln!("usage: footnote_cli <db_path> [list | search <filter> | add <text> <title> <author>]");
        return ExitCode::from(2);
    };

    println!("footnote_core version={}", footnote_core::core_version());
    let service = match bootstrap(&CoreConfig::new(db_path)) {
        Ok(service) => service,
        Err(err) => {
            eprintln!("open failed: {err}");
            return ExitCode::FAILURE;
        }
    };

    let result = match command {
        [] => service.list_all(),
        [verb] if verb == "list" => service.list_all(),
        [verb, filter] if verb == "search" => service.search(filter),
        [verb, text, title, author] if verb == "add" => service
            .add_quote(&NewQuote::new(text.as_str(), title.as_str(), author.as_str()))
            .map(|quote| vec![quote]),
        _ => {
            eprintln!("unknown command: {}", command.join(" "));
            return ExitCode::from(2);
        }
    };

    match result {
        Ok(quotes) => {
            print_quotes(&quotes);
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn print_quotes(quotes: &[Quote]) {
    if quotes.is_empty() {
        println!("(no quotes)");
        return;
    }
    for quote in quotes {
        println!(
            "{} {} | {} | {} | {}",
            quote.date_created, quote.id, quote.text, quote.title, quote.author
        );
    }
}
