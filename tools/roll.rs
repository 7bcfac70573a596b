/// Roll — interactive shell for evaluating placeholders against content.
///
/// Usage: roll --content <dir> [--seed <n>] [--typeset] [--escape]
///
/// Commands:
///   roll <token>    — roll a placeholder without expanding nested entities
///   expand <token>  — roll and expand the full entity tree
///   show <token>    — print an entity or tree without rolling anything
///   tree <token>    — print the expansion tree structure
///   seed <n>        — set RNG seed
///   help            — list commands
///   quit            — exit

use curly_engine::core::engine::CurlyEngine;
use curly_engine::core::expansion::Expansion;
use curly_engine::core::render::TextType;
use std::io::{self, BufRead, Write};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "curly_engine=info".into()),
        )
        .with_writer(io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        print_usage();
        return;
    }

    let mut content_dirs = Vec::new();
    let mut seed: u64 = 42;
    let mut text_type = TextType::Markdown;
    let mut escape = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--content" if i + 1 < args.len() => {
                i += 1;
                content_dirs.push(args[i].clone());
            }
            "--seed" if i + 1 < args.len() => {
                i += 1;
                seed = match args[i].parse() {
                    Ok(s) => s,
                    Err(_) => {
                        eprintln!("Invalid seed: {}", args[i]);
                        std::process::exit(1);
                    }
                };
            }
            "--typeset" => text_type = TextType::Typeset,
            "--escape" => escape = true,
            other => {
                eprintln!("Unknown argument: {}", other);
                print_usage();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let mut builder = CurlyEngine::builder()
        .seed(seed)
        .text_type(text_type)
        .escape_for_output(escape);
    for dir in &content_dirs {
        builder = builder.content_dir(dir);
    }
    let mut engine = match builder.build() {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            std::process::exit(1);
        }
    };

    println!("Loaded {} entities", engine.store().len());
    println!("Seed: {}", seed);
    println!("Type 'help' for commands.\n");

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("roll> ");
        stdout.flush().ok();

        let mut line = String::new();
        if stdin.lock().read_line(&mut line).is_err() || line.is_empty() {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let (cmd, rest) = match line.split_once(char::is_whitespace) {
            Some((cmd, rest)) => (cmd.to_lowercase(), rest.trim()),
            None => (line.to_lowercase(), ""),
        };

        match cmd.as_str() {
            "quit" | "exit" | "q" => {
                println!("Goodbye.");
                break;
            }
            "help" | "h" | "?" => print_help(),
            "roll" | "expand" | "show" => {
                if rest.is_empty() {
                    println!("Usage: {} <token>", cmd);
                    continue;
                }
                let (expand_entities, roll_dice) = match cmd.as_str() {
                    "roll" => (false, true),
                    "expand" => (true, true),
                    _ => (true, false),
                };
                match engine.evaluate_one(rest, expand_entities, roll_dice) {
                    Ok(text) => println!("\n{}\n", text),
                    Err(e) => println!("ERROR: {}", e),
                }
            }
            "tree" => {
                if rest.is_empty() {
                    println!("Usage: tree <token>");
                    continue;
                }
                match engine.expand(rest, true, true) {
                    Ok(expansion) => print_tree(&expansion),
                    Err(e) => println!("ERROR: {}", e),
                }
            }
            "seed" => match rest.parse() {
                Ok(s) => {
                    engine.set_seed(s);
                    println!("Seed set to {}", s);
                }
                Err(_) => println!("Usage: seed <n>"),
            },
            _ => {
                // A bare token is rolled and expanded.
                match engine.evaluate_one(line, true, true) {
                    Ok(text) => println!("\n{}\n", text),
                    Err(e) => println!("Unknown command or token: {} ({})", line, e),
                }
            }
        }
    }
}

fn print_tree(expansion: &Expansion) {
    fn walk(expansion: &Expansion, id: usize, depth: usize) {
        if let Some(node) = expansion.tree.get(id) {
            let marker = if node.unique { "*" } else { " " };
            println!("{}{} [{}] {}", "  ".repeat(depth), marker, node.id, node.entity);
            for &child in &node.children {
                walk(expansion, child, depth + 1);
            }
        }
    }

    println!();
    // Nodes without a parent are the roots: the whole first group.
    let children: std::collections::HashSet<usize> = expansion
        .tree
        .iter()
        .flat_map(|n| n.children.iter().copied())
        .collect();
    for node in expansion.tree.iter().filter(|n| !children.contains(&n.id)) {
        walk(expansion, node.id, 0);
    }
    println!(
        "\n{} nodes, {} non-unique entities (* = unique)\n",
        expansion.tree.len(),
        expansion.non_unique.len()
    );
}

fn print_usage() {
    println!("Usage: roll --content <dir> [--seed <n>] [--typeset] [--escape]");
    println!();
    println!("Interactive shell for rolling placeholders against a content directory.");
    println!("--content may be given more than once.");
}

fn print_help() {
    println!("Commands:");
    println!("  roll <token>    Roll a placeholder, e.g. 'roll 2d6' or 'roll {{1d4 goblin}}'");
    println!("  expand <token>  Roll and expand every nested entity");
    println!("  show <token>    Show an entity and its references without rolling");
    println!("  tree <token>    Print the structure of an expansion");
    println!("  seed <n>        Set the RNG seed");
    println!("  help            Show this help");
    println!("  quit            Exit");
    println!();
    println!("Anything else is treated as a token and expanded.");
}
