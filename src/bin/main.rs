//! The `pkgctl` binary: translates CLI arguments into calls against the
//! library's `Config` record and `Orchestrator`, per §6's CLI surface
//! table. Argument parsing itself is the one out-of-scope external
//! collaborator spec.md names explicitly; `clap` is the teacher's own
//! choice of parser crate (`Cargo.toml`'s `clap = "2"`), used here the way
//! any `clap`-based CLI wires subcommands to a core library.

extern crate clap;
extern crate pkgctl;
extern crate slog;

use std::path::PathBuf;
use std::process;

use clap::{App, Arg, SubCommand};

use pkgctl::config::Config;
use pkgctl::index::Catalog;
use pkgctl::util::errors::ErrorKind;
use pkgctl::{default_logger, Orchestrator};

fn main() {
    let matches = App::new("pkgctl")
        .version("0.1.0")
        .about("a source-based package manager")
        .arg(Arg::with_name("force").long("force").global(true))
        .arg(Arg::with_name("assume-yes").long("assume-yes").global(true))
        .arg(Arg::with_name("skip-deps").long("skip-deps").global(true))
        .arg(
            Arg::with_name("parallel")
                .long("parallel")
                .takes_value(true)
                .global(true),
        )
        .arg(Arg::with_name("root").long("root").takes_value(true).global(true))
        .arg(
            Arg::with_name("config")
                .long("config")
                .takes_value(true)
                .global(true),
        )
        .subcommand(SubCommand::with_name("install").arg(Arg::with_name("name").required(true)))
        .subcommand(SubCommand::with_name("remove").arg(Arg::with_name("name").required(true)))
        .subcommand(SubCommand::with_name("update").arg(Arg::with_name("name")))
        .subcommand(SubCommand::with_name("list").arg(Arg::with_name("pattern")))
        .subcommand(SubCommand::with_name("query").arg(Arg::with_name("name").required(true)))
        .subcommand(SubCommand::with_name("search").arg(Arg::with_name("pattern").required(true)))
        .subcommand(SubCommand::with_name("sync"))
        .subcommand(SubCommand::with_name("clean"))
        .get_matches();

    let log = default_logger();
    let mut config = load_config(&matches);

    if matches.is_present("force") {
        config.force_mode = true;
    }
    if matches.is_present("skip-deps") {
        config.skip_dependencies = true;
    }
    if let Some(n) = matches.value_of("parallel").and_then(|v| v.parse().ok()) {
        config.parallel_jobs = n;
    }
    if let Some(root) = matches.value_of("root") {
        config.root_dir = root.to_owned();
    }

    let code = run(&matches, config, log);
    process::exit(code);
}

fn load_config(matches: &clap::ArgMatches) -> Config {
    match matches.value_of("config") {
        Some(path) => Config::from_file(&PathBuf::from(path)).unwrap_or_else(|e| {
            eprintln!("warning: could not read config at {}: {}", path, e);
            Config::default()
        }),
        None => Config::default(),
    }
}

fn run(matches: &clap::ArgMatches, config: Config, log: slog::Logger) -> i32 {
    let catalog = Catalog::new(config.catalog_dir(), config.repositories.clone(), log.clone());
    let force = config.force_mode;

    let result = match matches.subcommand() {
        ("install", Some(sub)) => Orchestrator::new(config, catalog, log)
            .and_then(|mut orch| orch.install(sub.value_of("name").unwrap(), force)),
        ("remove", Some(sub)) => Orchestrator::new(config, catalog, log)
            .and_then(|mut orch| orch.remove(sub.value_of("name").unwrap(), force)),
        ("update", Some(sub)) => Orchestrator::new(config, catalog, log).and_then(|mut orch| match sub.value_of("name") {
            Some(name) => orch.update(name, force),
            None => orch.update_all(force).map(|_| ()),
        }),
        ("list", Some(sub)) => {
            let db = pkgctl::db::Database::load(config.database_path(), log.clone());
            db.map(|db| {
                for entry in db.list(sub.value_of("pattern")) {
                    println!("{}\t{}\t{:?}", entry.name, entry.version, entry.state);
                }
            })
        }
        ("query", Some(sub)) => {
            let db = pkgctl::db::Database::load(config.database_path(), log.clone());
            db.and_then(|db| match db.find(sub.value_of("name").unwrap()) {
                Some(entry) => {
                    println!("{:#?}", entry);
                    Ok(())
                }
                None => Err(ErrorKind::NotFound(sub.value_of("name").unwrap().to_owned()).into()),
            })
        }
        ("search", Some(sub)) => {
            for name in catalog.search(sub.value_of("pattern").unwrap()) {
                println!("{}", name);
            }
            Ok(())
        }
        ("sync", Some(_)) => {
            let mut catalog = catalog;
            catalog.sync()
        }
        ("clean", Some(_)) => clean(&config),
        _ => {
            eprintln!("no subcommand given; see --help");
            Ok(())
        }
    };

    match result {
        Ok(()) => 0,
        Err(e) => {
            match e.kind() {
                ErrorKind::Cancelled => {
                    eprintln!("interrupted");
                    130
                }
                other => {
                    eprintln!("error: {}", other);
                    1
                }
            }
        }
    }
}

/// Supplemented `clean` operation (§10): empties `cache/sources` and any
/// `cache/builds/*` workspace not referenced by an installed entry's
/// `build_dir` naming convention (`<name>-<version>`).
fn clean(config: &Config) -> Result<(), pkgctl::util::errors::Error> {
    use std::fs;

    let db = pkgctl::db::Database::load(config.database_path(), pkgctl::default_logger())?;
    let keep: Vec<String> = db
        .all()
        .iter()
        .map(|e| format!("{}-{}", e.name, e.version))
        .collect();

    if let Ok(entries) = fs::read_dir(config.sources_dir()) {
        for entry in entries.filter_map(|e| e.ok()) {
            let _ = fs::remove_file(entry.path());
        }
    }

    if let Ok(entries) = fs::read_dir(config.builds_dir()) {
        for entry in entries.filter_map(|e| e.ok()) {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if !keep.iter().any(|k| k == name.as_ref()) {
                let _ = fs::remove_dir_all(entry.path());
            }
        }
    }

    Ok(())
}
