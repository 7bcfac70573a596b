/// Content Linter — validates entity references, tables and dice in a
/// content directory.
///
/// Usage: content_linter <content_dir>

use curly_engine::core::curly::parse_curlies;
use curly_engine::core::dice::DiceRoll;
use curly_engine::core::render::{EntityRenderer, RenderOptions, Renderer};
use curly_engine::core::store::{ContentStore, EntityLookup};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::Path;
use std::process;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "curly_engine=info".into()),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        println!("Usage: content_linter <content_dir>");
        process::exit(0);
    }

    let content_path = Path::new(&args[1]);
    let loaded = if content_path.is_file() {
        ContentStore::load_from_ron(content_path)
    } else if content_path.is_dir() {
        ContentStore::load_from_dir(content_path)
    } else {
        eprintln!("ERROR: Path '{}' does not exist", args[1]);
        process::exit(1);
    };

    let store = match loaded {
        Ok(store) => store,
        Err(e) => {
            eprintln!("ERROR: Failed to load content: {}", e);
            process::exit(1);
        }
    };

    println!("Loaded {} entities", store.len());

    let (errors, warnings) = lint_content(&store);

    println!("\n=== Content Lint Report ===\n");

    if errors.is_empty() && warnings.is_empty() {
        println!("All checks passed!");
    }

    for warning in &warnings {
        println!("WARNING: {}", warning);
    }

    for error in &errors {
        println!("ERROR: {}", error);
    }

    println!(
        "\nSummary: {} errors, {} warnings",
        errors.len(),
        warnings.len()
    );

    if errors.is_empty() {
        process::exit(0);
    } else {
        process::exit(1);
    }
}

fn lint_content(store: &ContentStore) -> (Vec<String>, Vec<String>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    // 1. Names shared by several entities can never be looked up
    for (name, count) in store.ambiguous_names() {
        errors.push(format!("{} entities share the name '{}'", count, name));
    }

    // Rolls only matter for their errors here, any seed will do
    let mut rng = StdRng::seed_from_u64(0);
    let options = RenderOptions {
        include_full_text: true,
        ..RenderOptions::markdown()
    };

    for entity in store.entities() {
        if entity.name.trim().is_empty() {
            errors.push("entity with an empty name".to_string());
            continue;
        }

        // 2. Tables: empty, unreadable roll, gaps
        if let Some(table) = &entity.table {
            if table.expanded_outcomes.is_empty() {
                errors.push(format!("'{}': table has no outcomes", entity.name));
            }
            if let Some(roll) = &table.roll {
                if let Err(e) = DiceRoll::parse(roll) {
                    errors.push(format!("'{}': table roll: {}", entity.name, e));
                }
            }
            let gaps = table.gaps();
            if !gaps.is_empty() {
                warnings.push(format!(
                    "'{}': table has no outcome for rolls {:?}",
                    entity.name, gaps
                ));
            }
        }

        // 3. Placeholders in the rendered text
        let text = EntityRenderer.render(entity, &options);
        let curlies = match parse_curlies(&text, &mut rng) {
            Ok(curlies) => curlies,
            Err(e) => {
                errors.push(format!("'{}': {}", entity.name, e));
                continue;
            }
        };

        for curly in curlies.iter().filter(|c| !c.is_bare_roll()) {
            if curly.entity_name == entity.clean_name {
                warnings.push(format!(
                    "'{}': references itself with {}, expansion will stop at the node cap",
                    entity.name, curly.raw_match
                ));
                continue;
            }
            if let Err(e) = store.find_by_normalized_name(&curly.entity_name) {
                errors.push(format!("'{}': {} ({})", entity.name, curly.raw_match, e));
            }
        }
    }

    (errors, warnings)
}
